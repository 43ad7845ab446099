//! AWS ECS, Application Auto Scaling and CloudWatch integration module.
//!
//! The gatherers talk to AWS through the [`EcsApi`], [`AutoScalingApi`] and
//! [`CloudWatchApi`] traits. This module provides the SDK-backed
//! implementations of those traits and the session setup that produces them.

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_applicationautoscaling::types::ServiceNamespace;
use aws_sdk_cloudwatch::primitives::DateTime;
use aws_sdk_cloudwatch::types::{Dimension, Statistic};
use tracing::debug;

use crate::cloudwatch::{Datapoint, StatisticsQuery};
use crate::error::{GatherError, Result};
use crate::model::{Cluster, ContainerInstance, Service};

/// Maximum page size accepted by the ECS list operations.
pub const ECS_API_MAX_RESULTS: i32 = 100;

/// Session name used when assuming a role.
const ASSUME_ROLE_SESSION_NAME: &str = "ecs-exporter";

/// One page of a paginated list call.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Continuation token; `None` or empty means this was the last page
    pub next_token: Option<String>,
}

impl<T> Page<T> {
    /// Returns the token for the following page, treating an empty token as absent.
    pub fn continuation(&self) -> Option<String> {
        self.next_token.clone().filter(|t| !t.is_empty())
    }
}

/// A scalable target as returned by Application Auto Scaling, before it is
/// correlated with a cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScalableTargetRecord {
    /// Resource id of the form `service/<cluster>/<service>`
    pub resource_id: String,
    pub min_capacity: u32,
    pub max_capacity: u32,
}

/// Container orchestration API surface used by the gatherers.
#[async_trait]
pub trait EcsApi: Send + Sync {
    async fn list_cluster_arns(&self, next_token: Option<String>) -> Result<Page<String>>;

    async fn describe_clusters(&self, cluster_arns: Vec<String>) -> Result<Vec<Cluster>>;

    async fn list_service_arns(
        &self,
        cluster_arn: &str,
        next_token: Option<String>,
    ) -> Result<Page<String>>;

    async fn describe_services(
        &self,
        cluster_arn: &str,
        service_arns: Vec<String>,
    ) -> Result<Vec<Service>>;

    async fn list_container_instance_arns(
        &self,
        cluster_arn: &str,
        next_token: Option<String>,
    ) -> Result<Page<String>>;

    async fn describe_container_instances(
        &self,
        cluster_arn: &str,
        instance_arns: Vec<String>,
    ) -> Result<Vec<ContainerInstance>>;
}

/// Application Auto Scaling API surface.
#[async_trait]
pub trait AutoScalingApi: Send + Sync {
    async fn describe_scalable_targets(
        &self,
        namespace: &str,
        next_token: Option<String>,
    ) -> Result<Page<ScalableTargetRecord>>;
}

/// CloudWatch metrics API surface.
#[async_trait]
pub trait CloudWatchApi: Send + Sync {
    async fn get_metric_statistics(&self, query: &StatisticsQuery) -> Result<Vec<Datapoint>>;
}

/// Loads the shared AWS SDK configuration.
///
/// # Arguments
/// * `region` - Optional AWS region override (e.g., "us-east-1")
/// * `profile` - Optional AWS profile name from ~/.aws/credentials
/// * `role_arn` - Optional role to assume on top of the resolved credentials
///
/// # Errors
/// Returns [`GatherError::Session`] if no region can be resolved from the
/// arguments or the environment.
pub async fn load_sdk_config(
    region: Option<String>,
    profile: Option<String>,
    role_arn: Option<String>,
) -> Result<SdkConfig> {
    let base = config_loader(region.clone(), profile.clone()).load().await;
    if base.region().is_none() {
        return Err(GatherError::Session("no aws region configured".to_string()));
    }

    let Some(role_arn) = role_arn.filter(|r| !r.is_empty()) else {
        debug!("Using default credential chain");
        return Ok(base);
    };

    debug!(role_arn = %role_arn, "Assuming role");
    let provider = aws_config::sts::AssumeRoleProvider::builder(role_arn)
        .session_name(ASSUME_ROLE_SESSION_NAME)
        .configure(&base)
        .build()
        .await;

    Ok(config_loader(region, profile)
        .credentials_provider(provider)
        .load()
        .await)
}

fn config_loader(region: Option<String>, profile: Option<String>) -> aws_config::ConfigLoader {
    let mut config_loader = aws_config::from_env();

    if let Some(region_str) = region {
        config_loader = config_loader.region(aws_config::Region::new(region_str));
    }

    if let Some(profile_name) = profile {
        config_loader = config_loader.profile_name(profile_name);
    }

    config_loader
}

/// Clamps a count reported by AWS to a non-negative value.
fn count(value: i32) -> u32 {
    u32::try_from(value).unwrap_or(0)
}

pub(crate) fn cluster_from_sdk(c: &aws_sdk_ecs::types::Cluster) -> Cluster {
    Cluster {
        id: c.cluster_arn().unwrap_or_default().to_string(),
        name: c.cluster_name().unwrap_or_default().to_string(),
    }
}

pub(crate) fn service_from_sdk(s: &aws_sdk_ecs::types::Service) -> Service {
    Service {
        id: s.service_arn().unwrap_or_default().to_string(),
        name: s.service_name().unwrap_or_default().to_string(),
        desired_tasks: count(s.desired_count()),
        running_tasks: count(s.running_count()),
        pending_tasks: count(s.pending_count()),
    }
}

pub(crate) fn container_instance_from_sdk(
    c: &aws_sdk_ecs::types::ContainerInstance,
) -> ContainerInstance {
    ContainerInstance {
        id: c.container_instance_arn().unwrap_or_default().to_string(),
        instance_id: c.ec2_instance_id().unwrap_or_default().to_string(),
        agent_connected: c.agent_connected(),
        active: ContainerInstance::is_active_status(c.status().unwrap_or_default()),
        pending_tasks: count(c.pending_tasks_count()),
    }
}

/// ECS client backed by the AWS SDK.
pub struct EcsClient {
    client: aws_sdk_ecs::Client,
}

impl EcsClient {
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            client: aws_sdk_ecs::Client::new(config),
        }
    }
}

#[async_trait]
impl EcsApi for EcsClient {
    async fn list_cluster_arns(&self, next_token: Option<String>) -> Result<Page<String>> {
        let resp = self
            .client
            .list_clusters()
            .max_results(ECS_API_MAX_RESULTS)
            .set_next_token(next_token)
            .send()
            .await
            .map_err(|e| GatherError::remote("ListClusters", aws_sdk_ecs::Error::from(e)))?;

        Ok(Page {
            items: resp.cluster_arns().to_vec(),
            next_token: resp.next_token().map(str::to_string),
        })
    }

    async fn describe_clusters(&self, cluster_arns: Vec<String>) -> Result<Vec<Cluster>> {
        let resp = self
            .client
            .describe_clusters()
            .set_clusters(Some(cluster_arns))
            .send()
            .await
            .map_err(|e| GatherError::remote("DescribeClusters", aws_sdk_ecs::Error::from(e)))?;

        Ok(resp.clusters().iter().map(cluster_from_sdk).collect())
    }

    async fn list_service_arns(
        &self,
        cluster_arn: &str,
        next_token: Option<String>,
    ) -> Result<Page<String>> {
        let resp = self
            .client
            .list_services()
            .cluster(cluster_arn)
            .max_results(ECS_API_MAX_RESULTS)
            .set_next_token(next_token)
            .send()
            .await
            .map_err(|e| GatherError::remote("ListServices", aws_sdk_ecs::Error::from(e)))?;

        Ok(Page {
            items: resp.service_arns().to_vec(),
            next_token: resp.next_token().map(str::to_string),
        })
    }

    async fn describe_services(
        &self,
        cluster_arn: &str,
        service_arns: Vec<String>,
    ) -> Result<Vec<Service>> {
        let resp = self
            .client
            .describe_services()
            .cluster(cluster_arn)
            .set_services(Some(service_arns))
            .send()
            .await
            .map_err(|e| GatherError::remote("DescribeServices", aws_sdk_ecs::Error::from(e)))?;

        if !resp.failures().is_empty() {
            debug!(
                cluster = cluster_arn,
                failures = resp.failures().len(),
                "Some services could not be described"
            );
        }

        Ok(resp.services().iter().map(service_from_sdk).collect())
    }

    async fn list_container_instance_arns(
        &self,
        cluster_arn: &str,
        next_token: Option<String>,
    ) -> Result<Page<String>> {
        let resp = self
            .client
            .list_container_instances()
            .cluster(cluster_arn)
            .max_results(ECS_API_MAX_RESULTS)
            .set_next_token(next_token)
            .send()
            .await
            .map_err(|e| {
                GatherError::remote("ListContainerInstances", aws_sdk_ecs::Error::from(e))
            })?;

        Ok(Page {
            items: resp.container_instance_arns().to_vec(),
            next_token: resp.next_token().map(str::to_string),
        })
    }

    async fn describe_container_instances(
        &self,
        cluster_arn: &str,
        instance_arns: Vec<String>,
    ) -> Result<Vec<ContainerInstance>> {
        let resp = self
            .client
            .describe_container_instances()
            .cluster(cluster_arn)
            .set_container_instances(Some(instance_arns))
            .send()
            .await
            .map_err(|e| {
                GatherError::remote("DescribeContainerInstances", aws_sdk_ecs::Error::from(e))
            })?;

        Ok(resp
            .container_instances()
            .iter()
            .map(container_instance_from_sdk)
            .collect())
    }
}

/// Application Auto Scaling client backed by the AWS SDK.
pub struct AutoScalingClient {
    client: aws_sdk_applicationautoscaling::Client,
}

impl AutoScalingClient {
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            client: aws_sdk_applicationautoscaling::Client::new(config),
        }
    }
}

#[async_trait]
impl AutoScalingApi for AutoScalingClient {
    async fn describe_scalable_targets(
        &self,
        namespace: &str,
        next_token: Option<String>,
    ) -> Result<Page<ScalableTargetRecord>> {
        let resp = self
            .client
            .describe_scalable_targets()
            .service_namespace(ServiceNamespace::from(namespace))
            .set_next_token(next_token)
            .send()
            .await
            .map_err(|e| {
                GatherError::remote(
                    "DescribeScalableTargets",
                    aws_sdk_applicationautoscaling::Error::from(e),
                )
            })?;

        let items = resp
            .scalable_targets()
            .iter()
            .map(|t| ScalableTargetRecord {
                resource_id: t.resource_id().to_string(),
                min_capacity: count(t.min_capacity()),
                max_capacity: count(t.max_capacity()),
            })
            .collect();

        Ok(Page {
            items,
            next_token: resp.next_token().map(str::to_string),
        })
    }
}

/// Builds the single CloudWatch dimension a statistics query filters on.
pub fn statistics_dimension(query: &StatisticsQuery) -> Dimension {
    Dimension::builder()
        .name(query.dimension_name)
        .value(&query.dimension_value)
        .build()
}

/// CloudWatch metrics client backed by the AWS SDK.
pub struct CloudWatchClient {
    client: aws_sdk_cloudwatch::Client,
}

impl CloudWatchClient {
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            client: aws_sdk_cloudwatch::Client::new(config),
        }
    }
}

#[async_trait]
impl CloudWatchApi for CloudWatchClient {
    async fn get_metric_statistics(&self, query: &StatisticsQuery) -> Result<Vec<Datapoint>> {
        let resp = self
            .client
            .get_metric_statistics()
            .namespace(query.namespace)
            .metric_name(&query.metric_name)
            .dimensions(statistics_dimension(query))
            .start_time(DateTime::from_secs(query.start_time))
            .end_time(DateTime::from_secs(query.end_time))
            .period(query.period)
            .statistics(Statistic::Maximum)
            .send()
            .await
            .map_err(|e| {
                GatherError::remote("GetMetricStatistics", aws_sdk_cloudwatch::Error::from(e))
            })?;

        Ok(resp
            .datapoints()
            .iter()
            .map(|dp| Datapoint {
                timestamp: dp.timestamp().map(|t| t.secs()).unwrap_or(0),
                maximum: dp.maximum(),
            })
            .collect())
    }
}
