//! Domain entities produced by one polling cycle.
//!
//! Every value here is built fresh by a gathering call and never mutated once
//! it lands in a [`Snapshot`].

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Status string ECS reports for a container instance that accepts tasks.
pub const CONTAINER_INSTANCE_STATUS_ACTIVE: &str = "ACTIVE";

/// An ECS cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cluster {
    /// Cluster ARN
    pub id: String,
    /// Cluster name
    pub name: String,
}

/// An ECS service and its task counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Service {
    /// Service ARN
    pub id: String,
    /// Service name
    pub name: String,
    /// Number of tasks that should be running
    pub desired_tasks: u32,
    /// Number of tasks currently running
    pub running_tasks: u32,
    /// Number of tasks pending startup
    pub pending_tasks: u32,
}

/// Autoscaling bounds registered for one service of a cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScalableTarget {
    pub cluster_name: String,
    pub service_name: String,
    pub min_capacity: u32,
    pub max_capacity: u32,
}

/// A compute host registered with a cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContainerInstance {
    /// Container instance ARN
    pub id: String,
    /// EC2 instance id backing the container instance
    pub instance_id: String,
    /// Whether the ECS agent is connected
    pub agent_connected: bool,
    /// Whether the instance status is `ACTIVE`
    pub active: bool,
    /// Number of tasks pending on this instance
    pub pending_tasks: u32,
}

impl ContainerInstance {
    /// Only the exact `ACTIVE` status counts as active.
    pub fn is_active_status(status: &str) -> bool {
        status == CONTAINER_INSTANCE_STATUS_ACTIVE
    }
}

/// Setter bound to a single metric name.
pub type MetricSetter<T> = fn(&mut T, f64);

/// A bag of named metric values filled from CloudWatch.
///
/// The metric name is the source of truth: each bag lists the names it knows
/// and names that are not listed are skipped by the gatherer.
pub trait MetricBag: Default + 'static {
    /// Metric names this bag accepts, each with the field setter it maps to.
    fn fields() -> &'static [(&'static str, MetricSetter<Self>)];

    fn setter(metric_name: &str) -> Option<MetricSetter<Self>> {
        Self::fields()
            .iter()
            .find(|(name, _)| *name == metric_name)
            .map(|(_, setter)| *setter)
    }
}

/// Metrics for a single container instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InstanceMetrics {
    pub cpu_utilization: f64,
}

fn set_instance_cpu(metrics: &mut InstanceMetrics, value: f64) {
    metrics.cpu_utilization = value;
}

const INSTANCE_METRIC_FIELDS: &[(&str, MetricSetter<InstanceMetrics>)] =
    &[("CPUUtilization", set_instance_cpu)];

impl MetricBag for InstanceMetrics {
    fn fields() -> &'static [(&'static str, MetricSetter<Self>)] {
        INSTANCE_METRIC_FIELDS
    }
}

/// Cluster-wide utilization metrics.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ClusterMetrics {
    pub cpu_utilization: f64,
    pub memory_utilization: f64,
}

fn set_cluster_cpu(metrics: &mut ClusterMetrics, value: f64) {
    metrics.cpu_utilization = value;
}

fn set_cluster_memory(metrics: &mut ClusterMetrics, value: f64) {
    metrics.memory_utilization = value;
}

const CLUSTER_METRIC_FIELDS: &[(&str, MetricSetter<ClusterMetrics>)] = &[
    ("CPUUtilization", set_cluster_cpu),
    ("MemoryUtilization", set_cluster_memory),
];

impl MetricBag for ClusterMetrics {
    fn fields() -> &'static [(&'static str, MetricSetter<Self>)] {
        CLUSTER_METRIC_FIELDS
    }
}

/// A container instance together with the metrics gathered for it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstanceSnapshot {
    pub instance: ContainerInstance,
    pub metrics: InstanceMetrics,
}

/// Everything gathered for one cluster during a cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterSnapshot {
    pub cluster: Cluster,
    pub services: Vec<Service>,
    pub scalable_targets: Vec<ScalableTarget>,
    pub container_instances: Vec<InstanceSnapshot>,
    pub metrics: ClusterMetrics,
}

/// The complete result of one polling cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub taken_at: DateTime<Utc>,
    pub clusters: Vec<ClusterSnapshot>,
}

impl Snapshot {
    pub fn service_count(&self) -> usize {
        self.clusters.iter().map(|c| c.services.len()).sum()
    }

    pub fn container_instance_count(&self) -> usize {
        self.clusters.iter().map(|c| c.container_instances.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_status_exact_match() {
        assert!(ContainerInstance::is_active_status("ACTIVE"));
        assert!(!ContainerInstance::is_active_status("DRAINING"));
        assert!(!ContainerInstance::is_active_status("active"));
        assert!(!ContainerInstance::is_active_status(""));
    }

    #[test]
    fn test_instance_metric_setter_by_name() {
        let mut metrics = InstanceMetrics::default();
        let setter = InstanceMetrics::setter("CPUUtilization").unwrap();
        setter(&mut metrics, 42.5);
        assert_eq!(metrics.cpu_utilization, 42.5);
    }

    #[test]
    fn test_unknown_metric_has_no_setter() {
        assert!(InstanceMetrics::setter("MemoryUtilization").is_none());
        assert!(InstanceMetrics::setter("cpuutilization").is_none());
        assert!(ClusterMetrics::setter("DiskReadOps").is_none());
    }

    #[test]
    fn test_cluster_metric_setters() {
        let mut metrics = ClusterMetrics::default();
        ClusterMetrics::setter("CPUUtilization").unwrap()(&mut metrics, 10.0);
        ClusterMetrics::setter("MemoryUtilization").unwrap()(&mut metrics, 20.0);
        assert_eq!(metrics.cpu_utilization, 10.0);
        assert_eq!(metrics.memory_utilization, 20.0);
    }

    #[test]
    fn test_snapshot_counts() {
        let cluster = Cluster {
            id: "arn:aws:ecs:us-east-1:123456789012:cluster/a".to_string(),
            name: "a".to_string(),
        };
        let service = Service {
            id: "svc-arn".to_string(),
            name: "svc".to_string(),
            desired_tasks: 2,
            running_tasks: 2,
            pending_tasks: 0,
        };
        let snapshot = Snapshot {
            taken_at: Utc::now(),
            clusters: vec![ClusterSnapshot {
                cluster,
                services: vec![service.clone(), service],
                scalable_targets: Vec::new(),
                container_instances: Vec::new(),
                metrics: ClusterMetrics::default(),
            }],
        };

        assert_eq!(snapshot.service_count(), 2);
        assert_eq!(snapshot.container_instance_count(), 0);
    }
}
