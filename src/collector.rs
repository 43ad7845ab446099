//! Collection orchestrator: one consistent [`Snapshot`] per polling cycle.

use chrono::Utc;
use futures::future::join_all;
use regex::Regex;
use tracing::{debug, info};

use crate::autoscaling::AutoScalingGatherer;
use crate::cloudwatch::CloudWatchGatherer;
use crate::ecs::EcsGatherer;
use crate::error::{GatherError, Result};
use crate::model::{
    Cluster, ClusterMetrics, ClusterSnapshot, InstanceMetrics, InstanceSnapshot, Snapshot,
};

/// Runs the gatherers for every cluster and assembles the snapshot.
pub struct Collector {
    ecs: EcsGatherer,
    autoscaling: AutoScalingGatherer,
    /// `None` when CloudWatch collection is disabled; metric bags stay at zero.
    metrics: Option<CloudWatchGatherer>,
    cluster_filter: Regex,
}

impl Collector {
    pub fn new(
        ecs: EcsGatherer,
        autoscaling: AutoScalingGatherer,
        metrics: Option<CloudWatchGatherer>,
        cluster_filter: Regex,
    ) -> Self {
        Self {
            ecs,
            autoscaling,
            metrics,
            cluster_filter,
        }
    }

    /// Gathers a full snapshot.
    ///
    /// Clusters whose name does not match the cluster filter are skipped.
    ///
    /// # Errors
    /// The first gatherer error fails the whole cycle; no partial snapshot is
    /// returned.
    pub async fn collect(&self) -> Result<Snapshot> {
        let taken_at = Utc::now();
        let clusters = self.ecs.list_clusters().await?;

        let mut snapshots = Vec::with_capacity(clusters.len());
        for cluster in clusters {
            if !self.cluster_filter.is_match(&cluster.name) {
                debug!(cluster = %cluster.name, "Skipping cluster filtered out by configuration");
                continue;
            }
            snapshots.push(self.collect_cluster(cluster).await?);
        }

        let snapshot = Snapshot {
            taken_at,
            clusters: snapshots,
        };
        info!(
            clusters = snapshot.clusters.len(),
            services = snapshot.service_count(),
            container_instances = snapshot.container_instance_count(),
            "Collected snapshot"
        );
        Ok(snapshot)
    }

    async fn collect_cluster(&self, cluster: Cluster) -> Result<ClusterSnapshot> {
        // Every gatherer runs to completion before the first error is reported,
        // so no describe call is dropped mid-flight.
        let (services, instances, scalable_targets) = tokio::join!(
            self.ecs.list_services(&cluster),
            self.ecs.list_container_instances(&cluster),
            self.autoscaling.list_scalable_targets(&cluster),
        );
        let services = services?;
        let instances = instances?;
        let scalable_targets = scalable_targets?;

        let (container_instances, metrics) = match &self.metrics {
            Some(cloudwatch) => {
                let container_instances =
                    join_all(instances.into_iter().map(|instance| async move {
                        let metrics = cloudwatch.get_container_instance_metrics(&instance).await?;
                        Ok::<_, GatherError>(InstanceSnapshot { instance, metrics })
                    }))
                    .await
                    .into_iter()
                    .collect::<Result<Vec<_>>>()?;
                let metrics = cloudwatch.get_cluster_metrics(&cluster).await?;
                (container_instances, metrics)
            }
            None => (
                instances
                    .into_iter()
                    .map(|instance| InstanceSnapshot {
                        instance,
                        metrics: InstanceMetrics::default(),
                    })
                    .collect(),
                ClusterMetrics::default(),
            ),
        };

        Ok(ClusterSnapshot {
            cluster,
            services,
            scalable_targets,
            container_instances,
            metrics,
        })
    }
}
