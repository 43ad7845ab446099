//! ECS Exporter - periodic collection of AWS ECS state as Prometheus gauges.
//!
//! Each polling cycle lists clusters, fans out to services, container
//! instances and autoscaling targets per cluster, reads utilization metrics
//! from CloudWatch, and hands a [`model::Snapshot`] to the [`exporter::Exporter`].

pub mod autoscaling;
pub mod aws;
pub mod batch;
pub mod cloudwatch;
pub mod collector;
pub mod config;
pub mod ecs;
pub mod error;
pub mod exporter;
pub mod model;

pub use autoscaling::{AutoScalingGatherer, ScalableResourceId};
pub use aws::{AutoScalingApi, CloudWatchApi, EcsApi, Page, ScalableTargetRecord};
pub use cloudwatch::{CloudWatchGatherer, Datapoint, StatisticsQuery};
pub use collector::Collector;
pub use config::Config;
pub use ecs::EcsGatherer;
pub use error::GatherError;
pub use exporter::Exporter;
pub use model::*;
