//! Orchestration gatherer: clusters, services and container instances.

use std::sync::Arc;
use tracing::debug;

use crate::aws::EcsApi;
use crate::batch::{describe_in_batches, paginate};
use crate::error::Result;
use crate::model::{Cluster, ContainerInstance, Service};

/// DescribeServices accepts at most this many services per call.
pub const MAX_SERVICES_PER_DESCRIBE: usize = 10;

/// DescribeClusters accepts at most this many clusters per call.
pub const MAX_CLUSTERS_PER_DESCRIBE: usize = 100;

/// DescribeContainerInstances accepts at most this many instances per call.
pub const MAX_CONTAINER_INSTANCES_PER_DESCRIBE: usize = 100;

/// Gathers ECS resources through an [`EcsApi`].
#[derive(Clone)]
pub struct EcsGatherer {
    api: Arc<dyn EcsApi>,
}

impl EcsGatherer {
    pub fn new(api: Arc<dyn EcsApi>) -> Self {
        Self { api }
    }

    /// Lists every cluster in the region.
    ///
    /// # Errors
    /// Fails if any ListClusters page or DescribeClusters batch fails.
    pub async fn list_clusters(&self) -> Result<Vec<Cluster>> {
        debug!("Getting cluster list for region");
        let arns = paginate(|token| self.api.list_cluster_arns(token)).await?;

        debug!(count = arns.len(), "Getting cluster descriptions");
        let clusters = describe_in_batches(arns, MAX_CLUSTERS_PER_DESCRIBE, |batch| {
            self.api.describe_clusters(batch)
        })
        .await?;

        debug!("Got {} clusters", clusters.len());
        Ok(clusters)
    }

    /// Lists every service of `cluster`.
    ///
    /// Services are described in concurrent batches of
    /// [`MAX_SERVICES_PER_DESCRIBE`]. Order across batches is not guaranteed.
    ///
    /// # Errors
    /// One failing batch fails the whole call.
    pub async fn list_services(&self, cluster: &Cluster) -> Result<Vec<Service>> {
        debug!(cluster = %cluster.name, "Getting service list");
        let arns = paginate(|token| self.api.list_service_arns(&cluster.id, token)).await?;

        if arns.is_empty() {
            debug!(cluster = %cluster.name, "Ignoring services fetching, no services in cluster");
            return Ok(Vec::new());
        }

        let services = describe_in_batches(arns, MAX_SERVICES_PER_DESCRIBE, |batch| {
            self.api.describe_services(&cluster.id, batch)
        })
        .await?;

        debug!(cluster = %cluster.name, "Got {} services", services.len());
        Ok(services)
    }

    /// Lists every container instance registered with `cluster`.
    ///
    /// # Errors
    /// Fails if any list page or describe batch fails.
    pub async fn list_container_instances(
        &self,
        cluster: &Cluster,
    ) -> Result<Vec<ContainerInstance>> {
        debug!(cluster = %cluster.name, "Getting container instance list");
        let arns =
            paginate(|token| self.api.list_container_instance_arns(&cluster.id, token)).await?;

        if arns.is_empty() {
            debug!(
                cluster = %cluster.name,
                "Ignoring container instance fetching, no instances in cluster"
            );
            return Ok(Vec::new());
        }

        let instances =
            describe_in_batches(arns, MAX_CONTAINER_INSTANCES_PER_DESCRIBE, |batch| {
                self.api.describe_container_instances(&cluster.id, batch)
            })
            .await?;

        debug!(cluster = %cluster.name, "Got {} container instances", instances.len());
        Ok(instances)
    }
}
