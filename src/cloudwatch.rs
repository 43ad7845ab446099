//! Metrics gatherer: single representative values out of CloudWatch statistics.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::debug;

use crate::aws::CloudWatchApi;
use crate::error::Result;
use crate::model::{Cluster, ClusterMetrics, ContainerInstance, InstanceMetrics, MetricBag};

/// Namespace holding cluster level ECS metrics.
pub const ECS_METRICS_NAMESPACE: &str = "AWS/ECS";
/// Namespace holding per-instance EC2 metrics.
pub const EC2_METRICS_NAMESPACE: &str = "AWS/EC2";

pub const CLUSTER_DIMENSION: &str = "ClusterName";
pub const INSTANCE_DIMENSION: &str = "InstanceId";

/// How far back each statistics query looks.
pub const LOOKBACK_MINUTES: i64 = 20;
/// Granularity of the returned datapoints, in seconds.
pub const PERIOD_SECONDS: i32 = 60;

/// A `Maximum` statistics request over a single dimension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatisticsQuery {
    pub namespace: &'static str,
    pub metric_name: String,
    pub dimension_name: &'static str,
    pub dimension_value: String,
    /// Window start, Unix seconds
    pub start_time: i64,
    /// Window end, Unix seconds
    pub end_time: i64,
    pub period: i32,
}

impl StatisticsQuery {
    /// Builds the query for the [`LOOKBACK_MINUTES`] window ending at `now`.
    pub fn new(
        namespace: &'static str,
        dimension_name: &'static str,
        dimension_value: &str,
        metric_name: &str,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            namespace,
            metric_name: metric_name.to_string(),
            dimension_name,
            dimension_value: dimension_value.to_string(),
            start_time: (now - Duration::minutes(LOOKBACK_MINUTES)).timestamp(),
            end_time: now.timestamp(),
            period: PERIOD_SECONDS,
        }
    }
}

/// A CloudWatch datapoint reduced to what the gatherer reads.
#[derive(Debug, Clone, PartialEq)]
pub struct Datapoint {
    /// Unix seconds
    pub timestamp: i64,
    pub maximum: Option<f64>,
}

/// Value of the chronologically last datapoint's maximum, or 0.0 with no data.
///
/// CloudWatch does not sort datapoints; ties on timestamp resolve to the one
/// returned last.
pub fn last_maximum(datapoints: &[Datapoint]) -> f64 {
    datapoints
        .iter()
        .max_by_key(|dp| dp.timestamp)
        .and_then(|dp| dp.maximum)
        .unwrap_or(0.0)
}

/// Gathers metric values through a [`CloudWatchApi`].
#[derive(Clone)]
pub struct CloudWatchGatherer {
    api: Arc<dyn CloudWatchApi>,
    instance_metrics: Vec<String>,
    cluster_metrics: Vec<String>,
}

impl CloudWatchGatherer {
    /// `instance_metrics` and `cluster_metrics` are the metric names to fill
    /// into each bag; names a bag does not know are skipped.
    pub fn new(
        api: Arc<dyn CloudWatchApi>,
        instance_metrics: Vec<String>,
        cluster_metrics: Vec<String>,
    ) -> Self {
        Self {
            api,
            instance_metrics,
            cluster_metrics,
        }
    }

    /// Returns the latest maximum of `metric_name` for `cluster`.
    pub async fn get_cluster_metric(&self, cluster: &Cluster, metric_name: &str) -> Result<f64> {
        self.get_metric(
            ECS_METRICS_NAMESPACE,
            CLUSTER_DIMENSION,
            &cluster.name,
            metric_name,
        )
        .await
    }

    /// Fills the cluster metric bag for every configured cluster metric.
    pub async fn get_cluster_metrics(&self, cluster: &Cluster) -> Result<ClusterMetrics> {
        self.fill(
            &self.cluster_metrics,
            ECS_METRICS_NAMESPACE,
            CLUSTER_DIMENSION,
            &cluster.name,
        )
        .await
    }

    /// Fills the instance metric bag for every configured instance metric.
    pub async fn get_container_instance_metrics(
        &self,
        instance: &ContainerInstance,
    ) -> Result<InstanceMetrics> {
        self.fill(
            &self.instance_metrics,
            EC2_METRICS_NAMESPACE,
            INSTANCE_DIMENSION,
            &instance.instance_id,
        )
        .await
    }

    async fn fill<B: MetricBag>(
        &self,
        metric_names: &[String],
        namespace: &'static str,
        dimension_name: &'static str,
        dimension_value: &str,
    ) -> Result<B> {
        let mut bag = B::default();
        for name in metric_names {
            let Some(set) = B::setter(name) else {
                debug!(metric = %name, "Ignoring unknown metric");
                continue;
            };
            let value = self
                .get_metric(namespace, dimension_name, dimension_value, name)
                .await?;
            set(&mut bag, value);
        }
        Ok(bag)
    }

    async fn get_metric(
        &self,
        namespace: &'static str,
        dimension_name: &'static str,
        dimension_value: &str,
        metric_name: &str,
    ) -> Result<f64> {
        debug!(metric = %metric_name, target = %dimension_value, "Getting metric");
        let query = StatisticsQuery::new(
            namespace,
            dimension_name,
            dimension_value,
            metric_name,
            Utc::now(),
        );
        let datapoints = self.api.get_metric_statistics(&query).await?;
        Ok(last_maximum(&datapoints))
    }
}
