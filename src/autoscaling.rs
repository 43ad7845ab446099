//! Autoscaling gatherer: scalable targets correlated back to ECS clusters.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

use crate::aws::AutoScalingApi;
use crate::batch::paginate;
use crate::error::{GatherError, Result};
use crate::model::{Cluster, ScalableTarget};

/// Application Auto Scaling namespace for ECS services.
pub const ECS_SERVICE_NAMESPACE: &str = "ecs";

/// Parsed scalable target resource id: `<namespace>/<cluster>/<service>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScalableResourceId {
    pub namespace: String,
    pub cluster: String,
    pub service: String,
}

impl FromStr for ScalableResourceId {
    type Err = GatherError;

    fn from_str(s: &str) -> Result<Self> {
        match s.split('/').collect::<Vec<_>>().as_slice() {
            [namespace, cluster, service] => Ok(Self {
                namespace: namespace.to_string(),
                cluster: cluster.to_string(),
                service: service.to_string(),
            }),
            _ => Err(GatherError::MalformedIdentifier(s.to_string())),
        }
    }
}

impl fmt::Display for ScalableResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.namespace, self.cluster, self.service)
    }
}

/// Gathers scalable targets through an [`AutoScalingApi`].
#[derive(Clone)]
pub struct AutoScalingGatherer {
    api: Arc<dyn AutoScalingApi>,
}

impl AutoScalingGatherer {
    pub fn new(api: Arc<dyn AutoScalingApi>) -> Self {
        Self { api }
    }

    /// Lists the scalable targets that belong to `cluster`.
    ///
    /// The listing is region-wide; targets of other clusters are dropped by
    /// exact cluster name match.
    ///
    /// # Errors
    /// Fails on any remote error, and with [`GatherError::MalformedIdentifier`]
    /// as soon as one resource id does not have exactly three segments.
    pub async fn list_scalable_targets(&self, cluster: &Cluster) -> Result<Vec<ScalableTarget>> {
        debug!(cluster = %cluster.name, "Getting scalable targets");
        let records = paginate(|token| {
            self.api
                .describe_scalable_targets(ECS_SERVICE_NAMESPACE, token)
        })
        .await?;

        let mut targets = Vec::new();
        for record in records {
            let id: ScalableResourceId = record.resource_id.parse()?;
            if id.cluster != cluster.name {
                continue;
            }
            targets.push(ScalableTarget {
                cluster_name: cluster.name.clone(),
                service_name: id.service,
                min_capacity: record.min_capacity,
                max_capacity: record.max_capacity,
            });
        }

        debug!(cluster = %cluster.name, "Got {} scalable targets", targets.len());
        Ok(targets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_resource_id() {
        let id: ScalableResourceId = "service/cluster-a/svc-1".parse().unwrap();
        assert_eq!(id.namespace, "service");
        assert_eq!(id.cluster, "cluster-a");
        assert_eq!(id.service, "svc-1");
        assert_eq!(id.to_string(), "service/cluster-a/svc-1");
    }

    #[test]
    fn test_parse_resource_id_wrong_segment_count() {
        for raw in ["service/cluster-a", "service/a/b/c", "", "service"] {
            let err = raw.parse::<ScalableResourceId>().unwrap_err();
            assert!(
                matches!(err, GatherError::MalformedIdentifier(ref s) if s == raw),
                "{raw}"
            );
        }
    }

    #[test]
    fn test_parse_resource_id_keeps_empty_segments() {
        let id: ScalableResourceId = "service//svc".parse().unwrap();
        assert_eq!(id.cluster, "");
        assert_eq!(id.service, "svc");
    }
}
