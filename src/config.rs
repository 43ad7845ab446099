//! Configuration management for the ECS exporter.
//!
//! This module handles loading configuration from a TOML file located at
//! `~/.ecs-exporter/config.toml`, or at the path named by the
//! `ECS_EXPORTER_CONFIG` environment variable. Configuration includes AWS
//! settings, collection behavior, CloudWatch metric selection and output.

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable that overrides the config file location.
pub const CONFIG_PATH_ENV: &str = "ECS_EXPORTER_CONFIG";

/// Main configuration structure for the ECS exporter.
///
/// All configuration options are optional and will fall back to sensible defaults
/// if not specified in the configuration file.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// AWS-specific configuration options
    #[serde(default)]
    pub aws: AwsConfig,

    /// Polling behavior
    #[serde(default)]
    pub collector: CollectorConfig,

    /// CloudWatch metrics configuration
    #[serde(default)]
    pub metrics: MetricsConfig,

    /// Output and logging configuration
    #[serde(default)]
    pub output: OutputConfig,
}

/// AWS SDK configuration options.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AwsConfig {
    /// AWS region (e.g., "us-east-1")
    /// If not specified, will use AWS SDK's default resolution (env vars, profile, etc.)
    pub region: Option<String>,

    /// AWS profile name to use from ~/.aws/credentials
    pub profile: Option<String>,

    /// Role to assume before calling AWS
    pub role_arn: Option<String>,
}

/// Polling behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorConfig {
    /// Seconds between polling cycles
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,

    /// Only clusters whose name matches this regex are collected
    #[serde(default = "default_cluster_filter")]
    pub cluster_filter: String,
}

/// CloudWatch metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Query CloudWatch at all
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Metric names gathered per container instance
    #[serde(default = "default_instance_metrics")]
    pub instance_metrics: Vec<String>,

    /// Metric names gathered per cluster
    #[serde(default = "default_cluster_metrics")]
    pub cluster_metrics: Vec<String>,
}

/// Output and logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Prometheus textfile written after every cycle
    pub textfile_path: Option<PathBuf>,

    /// JSON dump of the last successful snapshot
    pub snapshot_path: Option<PathBuf>,

    /// Log filter used when RUST_LOG is not set
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

// Default value functions for serde
fn default_poll_interval() -> u64 {
    60
}

fn default_cluster_filter() -> String {
    ".*".to_string()
}

fn default_true() -> bool {
    true
}

fn default_instance_metrics() -> Vec<String> {
    vec!["CPUUtilization".to_string()]
}

fn default_cluster_metrics() -> Vec<String> {
    vec![
        "CPUUtilization".to_string(),
        "MemoryUtilization".to_string(),
    ]
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            cluster_filter: default_cluster_filter(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            instance_metrics: default_instance_metrics(),
            cluster_metrics: default_cluster_metrics(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            textfile_path: None,
            snapshot_path: None,
            log_filter: default_log_filter(),
        }
    }
}

impl CollectorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval.max(1))
    }

    /// Compiles the cluster filter.
    pub fn cluster_regex(&self) -> Result<Regex> {
        Regex::new(&self.cluster_filter)
            .with_context(|| format!("Invalid cluster_filter regex: {}", self.cluster_filter))
    }
}

impl Config {
    /// Returns the path to the configuration directory (~/.ecs-exporter/)
    pub fn config_dir() -> Result<PathBuf> {
        let home_dir = dirs::home_dir().context("Failed to determine home directory")?;
        Ok(home_dir.join(".ecs-exporter"))
    }

    /// Returns the config file path, honoring `ECS_EXPORTER_CONFIG`.
    pub fn config_file_path() -> Result<PathBuf> {
        match std::env::var_os(CONFIG_PATH_ENV) {
            Some(path) => Ok(PathBuf::from(path)),
            None => Ok(Self::config_dir()?.join("config.toml")),
        }
    }

    /// Loads configuration, creating a default file if none exists.
    ///
    /// # Errors
    /// This function will return an error if:
    /// - Home directory cannot be determined
    /// - File I/O operations fail
    /// - TOML parsing fails
    /// - The cluster filter is not a valid regex
    pub fn load() -> Result<Self> {
        let config_path = Self::config_file_path()?;

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            let default_config = Config::default();
            default_config.create_default_config(&config_path)?;
            Ok(default_config)
        }
    }

    /// Loads and validates the configuration at `path`.
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path:?}"))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {path:?}"))?;

        config.collector.cluster_regex()?;
        Ok(config)
    }

    /// Writes a commented default configuration file to `config_path`.
    ///
    /// # Errors
    /// This function will return an error if:
    /// - Directory creation fails
    /// - File write operations fail
    pub fn create_default_config(&self, config_path: &Path) -> Result<()> {
        if let Some(config_dir) = config_path.parent() {
            if !config_dir.as_os_str().is_empty() && !config_dir.exists() {
                fs::create_dir_all(config_dir).with_context(|| {
                    format!("Failed to create config directory: {config_dir:?}")
                })?;
            }
        }

        let default_toml = r#"# ECS Exporter Configuration File
# This file is automatically generated with default values.

[aws]
# AWS region to collect from (optional)
# If not specified, uses AWS SDK's default resolution (env vars, ~/.aws/config, etc.)
# region = "us-east-1"

# AWS profile to use from ~/.aws/credentials (optional)
# profile = "default"

# Role to assume before calling AWS (optional)
# role_arn = "arn:aws:iam::123456789012:role/ecs-exporter"

[collector]
# Seconds between polling cycles
poll_interval = 60

# Only clusters whose name matches this regex are collected
cluster_filter = ".*"

[metrics]
# Query CloudWatch for utilization metrics
enabled = true

# Metrics gathered per container instance (AWS/EC2 namespace)
instance_metrics = ["CPUUtilization"]

# Metrics gathered per cluster (AWS/ECS namespace)
cluster_metrics = ["CPUUtilization", "MemoryUtilization"]

[output]
# Prometheus textfile written after every cycle (optional)
# textfile_path = "/var/lib/node_exporter/textfile/ecs.prom"

# JSON dump of the last successful snapshot (optional)
# snapshot_path = "/tmp/ecs-snapshot.json"

# Log filter used when RUST_LOG is not set
log_filter = "info"
"#;

        fs::write(config_path, default_toml)
            .with_context(|| format!("Failed to write config file: {config_path:?}"))?;

        Ok(())
    }
}
