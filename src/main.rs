//! ECS Exporter binary.
//!
//! Loads the configuration, sets up the AWS clients and polls ECS on a fixed
//! interval until interrupted, publishing every cycle through the exporter.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{error, info, warn};

use ecs_exporter::aws::{load_sdk_config, AutoScalingClient, CloudWatchClient, EcsClient};
use ecs_exporter::{
    AutoScalingGatherer, CloudWatchGatherer, Collector, Config, EcsGatherer, Exporter, Snapshot,
};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;
    init_tracing(&config.output.log_filter);

    let sdk_config = load_sdk_config(
        config.aws.region.clone(),
        config.aws.profile.clone(),
        config.aws.role_arn.clone(),
    )
    .await?;
    let region = sdk_config
        .region()
        .map(|r| r.as_ref().to_string())
        .unwrap_or_default();
    info!(region = %region, "Starting ECS exporter");

    let metrics = config.metrics.enabled.then(|| {
        CloudWatchGatherer::new(
            Arc::new(CloudWatchClient::new(&sdk_config)),
            config.metrics.instance_metrics.clone(),
            config.metrics.cluster_metrics.clone(),
        )
    });
    let collector = Collector::new(
        EcsGatherer::new(Arc::new(EcsClient::new(&sdk_config))),
        AutoScalingGatherer::new(Arc::new(AutoScalingClient::new(&sdk_config))),
        metrics,
        config.collector.cluster_regex()?,
    );
    let exporter = Exporter::new(region)?;

    let mut interval = tokio::time::interval(config.collector.poll_interval());
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    loop {
        // Shutdown is checked while a cycle is running, not only between cycles.
        tokio::select! {
            _ = async {
                interval.tick().await;
                poll(&collector, &exporter, &config).await;
            } => {}
            _ = &mut shutdown => {
                info!("Shutting down");
                return Ok(());
            }
        }
    }
}

/// Runs one cycle and publishes its outcome. Failures are logged, never fatal.
///
/// An interrupt abandons the cycle in progress; the textfile is left as the
/// previous cycle wrote it.
async fn poll(collector: &Collector, exporter: &Exporter, config: &Config) {
    match collector.collect().await {
        Ok(snapshot) => {
            exporter.update(&snapshot);
            if let Some(path) = &config.output.snapshot_path {
                if let Err(e) = write_snapshot(&snapshot, path) {
                    warn!("Failed to write snapshot: {e:#}");
                }
            }
        }
        Err(e) => {
            error!(error = %e, "Polling cycle failed");
            exporter.mark_failed();
        }
    }

    if let Some(path) = &config.output.textfile_path {
        if let Err(e) = exporter.write_textfile(path) {
            warn!("Failed to write textfile: {e:#}");
        }
    }
}

fn write_snapshot(snapshot: &Snapshot, path: &std::path::Path) -> Result<()> {
    let json = serde_json::to_string_pretty(snapshot).context("Failed to serialize snapshot")?;
    std::fs::write(path, json).with_context(|| format!("Failed to write snapshot: {path:?}"))
}

fn init_tracing(default_filter: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
