//! Prometheus exposition of the latest snapshot.

use anyhow::{Context, Result};
use prometheus::{Encoder, GaugeVec, Opts, Registry, TextEncoder};
use std::fs;
use std::path::Path;

use crate::model::Snapshot;

const CLUSTER_LABELS: &[&str] = &["region", "cluster"];
const SERVICE_LABELS: &[&str] = &["region", "cluster", "service"];
const INSTANCE_LABELS: &[&str] = &["region", "cluster", "instance"];

/// Gauges rendered from the snapshot of the last successful cycle.
///
/// A failed cycle only flips `ecs_up` to 0; every other gauge keeps the
/// values of the last good snapshot.
pub struct Exporter {
    region: String,
    registry: Registry,
    up: GaugeVec,
    clusters: GaugeVec,
    services: GaugeVec,
    service_desired: GaugeVec,
    service_running: GaugeVec,
    service_pending: GaugeVec,
    service_min_capacity: GaugeVec,
    service_max_capacity: GaugeVec,
    container_instances: GaugeVec,
    instance_agent_connected: GaugeVec,
    instance_active: GaugeVec,
    instance_pending: GaugeVec,
    instance_cpu: GaugeVec,
    cluster_cpu: GaugeVec,
    cluster_memory: GaugeVec,
}

fn gauge_vec(registry: &Registry, name: &str, help: &str, labels: &[&str]) -> Result<GaugeVec> {
    let gauge = GaugeVec::new(Opts::new(name, help), labels)
        .with_context(|| format!("Failed to create gauge {name}"))?;
    registry
        .register(Box::new(gauge.clone()))
        .with_context(|| format!("Failed to register gauge {name}"))?;
    Ok(gauge)
}

fn flag(value: bool) -> f64 {
    if value {
        1.0
    } else {
        0.0
    }
}

impl Exporter {
    pub fn new(region: impl Into<String>) -> Result<Self> {
        let registry = Registry::new();
        let r = &registry;

        Ok(Self {
            region: region.into(),
            up: gauge_vec(r, "ecs_up", "Was the last ECS query successful", &["region"])?,
            clusters: gauge_vec(r, "ecs_clusters", "Number of ECS clusters", &["region"])?,
            services: gauge_vec(r, "ecs_services", "Number of services per cluster", CLUSTER_LABELS)?,
            service_desired: gauge_vec(
                r,
                "ecs_service_desired_tasks",
                "Desired number of tasks of a service",
                SERVICE_LABELS,
            )?,
            service_running: gauge_vec(
                r,
                "ecs_service_running_tasks",
                "Running tasks of a service",
                SERVICE_LABELS,
            )?,
            service_pending: gauge_vec(
                r,
                "ecs_service_pending_tasks",
                "Pending tasks of a service",
                SERVICE_LABELS,
            )?,
            service_min_capacity: gauge_vec(
                r,
                "ecs_service_scalable_min_capacity",
                "Autoscaling minimum capacity of a service",
                SERVICE_LABELS,
            )?,
            service_max_capacity: gauge_vec(
                r,
                "ecs_service_scalable_max_capacity",
                "Autoscaling maximum capacity of a service",
                SERVICE_LABELS,
            )?,
            container_instances: gauge_vec(
                r,
                "ecs_container_instances",
                "Number of container instances per cluster",
                CLUSTER_LABELS,
            )?,
            instance_agent_connected: gauge_vec(
                r,
                "ecs_container_instance_agent_connected",
                "Is the ECS agent of the container instance connected",
                INSTANCE_LABELS,
            )?,
            instance_active: gauge_vec(
                r,
                "ecs_container_instance_active",
                "Is the container instance status ACTIVE",
                INSTANCE_LABELS,
            )?,
            instance_pending: gauge_vec(
                r,
                "ecs_container_instance_pending_tasks",
                "Pending tasks on the container instance",
                INSTANCE_LABELS,
            )?,
            instance_cpu: gauge_vec(
                r,
                "ecs_container_instance_cpu_utilization",
                "Maximum CPU utilization of the container instance",
                INSTANCE_LABELS,
            )?,
            cluster_cpu: gauge_vec(
                r,
                "ecs_cluster_cpu_utilization",
                "Maximum CPU utilization of the cluster",
                CLUSTER_LABELS,
            )?,
            cluster_memory: gauge_vec(
                r,
                "ecs_cluster_memory_utilization",
                "Maximum memory utilization of the cluster",
                CLUSTER_LABELS,
            )?,
            registry,
        })
    }

    /// Replaces every gauge with the values of `snapshot`.
    pub fn update(&self, snapshot: &Snapshot) {
        for gauge in [
            &self.services,
            &self.service_desired,
            &self.service_running,
            &self.service_pending,
            &self.service_min_capacity,
            &self.service_max_capacity,
            &self.container_instances,
            &self.instance_agent_connected,
            &self.instance_active,
            &self.instance_pending,
            &self.instance_cpu,
            &self.cluster_cpu,
            &self.cluster_memory,
        ] {
            gauge.reset();
        }

        let region = self.region.as_str();
        self.up.with_label_values(&[region]).set(1.0);
        self.clusters
            .with_label_values(&[region])
            .set(snapshot.clusters.len() as f64);

        for c in &snapshot.clusters {
            let cluster = c.cluster.name.as_str();

            self.services
                .with_label_values(&[region, cluster])
                .set(c.services.len() as f64);
            for s in &c.services {
                let labels = [region, cluster, s.name.as_str()];
                self.service_desired
                    .with_label_values(&labels)
                    .set(f64::from(s.desired_tasks));
                self.service_running
                    .with_label_values(&labels)
                    .set(f64::from(s.running_tasks));
                self.service_pending
                    .with_label_values(&labels)
                    .set(f64::from(s.pending_tasks));
            }

            for t in &c.scalable_targets {
                let labels = [region, cluster, t.service_name.as_str()];
                self.service_min_capacity
                    .with_label_values(&labels)
                    .set(f64::from(t.min_capacity));
                self.service_max_capacity
                    .with_label_values(&labels)
                    .set(f64::from(t.max_capacity));
            }

            self.container_instances
                .with_label_values(&[region, cluster])
                .set(c.container_instances.len() as f64);
            for i in &c.container_instances {
                let labels = [region, cluster, i.instance.instance_id.as_str()];
                self.instance_agent_connected
                    .with_label_values(&labels)
                    .set(flag(i.instance.agent_connected));
                self.instance_active
                    .with_label_values(&labels)
                    .set(flag(i.instance.active));
                self.instance_pending
                    .with_label_values(&labels)
                    .set(f64::from(i.instance.pending_tasks));
                self.instance_cpu
                    .with_label_values(&labels)
                    .set(i.metrics.cpu_utilization);
            }

            self.cluster_cpu
                .with_label_values(&[region, cluster])
                .set(c.metrics.cpu_utilization);
            self.cluster_memory
                .with_label_values(&[region, cluster])
                .set(c.metrics.memory_utilization);
        }
    }

    /// Flags the last cycle as failed.
    pub fn mark_failed(&self) {
        self.up.with_label_values(&[self.region.as_str()]).set(0.0);
    }

    /// Renders all gauges in the Prometheus text format.
    pub fn render(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buffer)
            .context("Failed to encode metrics")?;
        String::from_utf8(buffer).context("Encoded metrics are not valid UTF-8")
    }

    /// Writes the rendered gauges to `path`, replacing it atomically.
    pub fn write_textfile(&self, path: &Path) -> Result<()> {
        let rendered = self.render()?;
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");

        fs::write(&tmp, rendered).with_context(|| format!("Failed to write {tmp:?}"))?;
        fs::rename(&tmp, path).with_context(|| format!("Failed to move textfile into {path:?}"))?;
        Ok(())
    }
}
