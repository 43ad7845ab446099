//! Error taxonomy for the gathering pipeline.
//!
//! Every remote failure is wrapped with the name of the operation that
//! produced it so a failed poll cycle can be traced back to a single API call.

use thiserror::Error;

/// Boxed cause carried by remote API failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors produced while gathering ECS, autoscaling and CloudWatch data.
#[derive(Debug, Error)]
pub enum GatherError {
    /// A call to ECS, Application Auto Scaling or CloudWatch failed.
    #[error("{operation} failed: {source}")]
    RemoteApi {
        operation: &'static str,
        #[source]
        source: BoxError,
    },

    /// A scalable target resource id did not split into exactly three segments.
    #[error("invalid scalable target resource id ({0})")]
    MalformedIdentifier(String),

    /// The AWS session or credentials could not be set up.
    #[error("error creating aws session: {0}")]
    Session(String),
}

impl GatherError {
    /// Wraps a backend failure, keeping it as the error source.
    pub fn remote(operation: &'static str, source: impl Into<BoxError>) -> Self {
        Self::RemoteApi {
            operation,
            source: source.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, GatherError>;
