//! In-memory fakes of the AWS API traits shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use ecs_exporter::{
    AutoScalingApi, CloudWatchApi, Cluster, ContainerInstance, Datapoint, EcsApi, GatherError,
    Page, ScalableTargetRecord, Service, StatisticsQuery,
};

type Result<T> = std::result::Result<T, GatherError>;

pub fn cluster_arn(name: &str) -> String {
    format!("arn:aws:ecs:us-east-1:123456789012:cluster/{name}")
}

pub fn service_arn(cluster: &str, service: &str) -> String {
    format!("arn:aws:ecs:us-east-1:123456789012:service/{cluster}/{service}")
}

pub fn instance_arn(cluster: &str, index: usize) -> String {
    format!("arn:aws:ecs:us-east-1:123456789012:container-instance/{cluster}/{index}")
}

pub fn cluster(name: &str) -> Cluster {
    Cluster {
        id: cluster_arn(name),
        name: name.to_string(),
    }
}

/// Serves `items` in pages of `page_size`; tokens are page indexes.
fn page_of<T: Clone>(items: &[T], page_size: usize, token: Option<String>) -> Page<T> {
    let index: usize = token.map(|t| t.parse().unwrap()).unwrap_or(0);
    let pages: Vec<&[T]> = items.chunks(page_size).collect();
    Page {
        items: pages.get(index).map(|p| p.to_vec()).unwrap_or_default(),
        next_token: (index + 1 < pages.len()).then(|| (index + 1).to_string()),
    }
}

pub struct FakeEcs {
    page_size: usize,
    cluster_arns: Vec<String>,
    clusters: HashMap<String, Cluster>,
    service_arns: HashMap<String, Vec<String>>,
    services: HashMap<String, Service>,
    instance_arns: HashMap<String, Vec<String>>,
    instances: HashMap<String, ContainerInstance>,
    failing_arns: HashSet<String>,
    describe_delay: Option<Duration>,
    pub describe_cluster_calls: AtomicUsize,
    pub service_list_tokens: Mutex<Vec<Option<String>>>,
    pub service_batches: Mutex<Vec<Vec<String>>>,
    pub services_described: AtomicUsize,
    pub instance_batches: Mutex<Vec<Vec<String>>>,
}

impl FakeEcs {
    pub fn new() -> Self {
        Self {
            page_size: 100,
            cluster_arns: Vec::new(),
            clusters: HashMap::new(),
            service_arns: HashMap::new(),
            services: HashMap::new(),
            instance_arns: HashMap::new(),
            instances: HashMap::new(),
            failing_arns: HashSet::new(),
            describe_delay: None,
            describe_cluster_calls: AtomicUsize::new(0),
            service_list_tokens: Mutex::new(Vec::new()),
            service_batches: Mutex::new(Vec::new()),
            services_described: AtomicUsize::new(0),
            instance_batches: Mutex::new(Vec::new()),
        }
    }

    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Adds a cluster with `services` services and `instances` container instances.
    pub fn cluster(mut self, name: &str, services: usize, instances: usize) -> Self {
        let arn = cluster_arn(name);
        self.cluster_arns.push(arn.clone());
        self.clusters.insert(arn.clone(), cluster(name));

        let mut s_arns = Vec::new();
        for i in 0..services {
            let s_name = format!("svc-{i}");
            let s_arn = service_arn(name, &s_name);
            self.services.insert(
                s_arn.clone(),
                Service {
                    id: s_arn.clone(),
                    name: s_name,
                    desired_tasks: 2,
                    running_tasks: 2,
                    pending_tasks: 0,
                },
            );
            s_arns.push(s_arn);
        }
        self.service_arns.insert(arn.clone(), s_arns);

        let mut i_arns = Vec::new();
        for i in 0..instances {
            let i_arn = instance_arn(name, i);
            self.instances.insert(
                i_arn.clone(),
                ContainerInstance {
                    id: i_arn.clone(),
                    instance_id: format!("i-{name}-{i}"),
                    agent_connected: true,
                    active: i % 2 == 0,
                    pending_tasks: 0,
                },
            );
            i_arns.push(i_arn);
        }
        self.instance_arns.insert(arn, i_arns);
        self
    }

    /// Every DescribeServices call sleeps for `delay` before answering.
    pub fn describe_delay(mut self, delay: Duration) -> Self {
        self.describe_delay = Some(delay);
        self
    }

    /// Any describe call whose batch contains `arn` fails.
    pub fn fail_on(mut self, arn: String) -> Self {
        self.failing_arns.insert(arn);
        self
    }

    fn check(&self, operation: &'static str, arns: &[String]) -> Result<()> {
        match arns.iter().find(|a| self.failing_arns.contains(*a)) {
            Some(arn) => Err(GatherError::remote(operation, format!("access denied for {arn}"))),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl EcsApi for FakeEcs {
    async fn list_cluster_arns(&self, next_token: Option<String>) -> Result<Page<String>> {
        Ok(page_of(&self.cluster_arns, self.page_size, next_token))
    }

    async fn describe_clusters(&self, cluster_arns: Vec<String>) -> Result<Vec<Cluster>> {
        self.describe_cluster_calls.fetch_add(1, Ordering::SeqCst);
        self.check("DescribeClusters", &cluster_arns)?;
        Ok(cluster_arns
            .iter()
            .filter_map(|a| self.clusters.get(a).cloned())
            .collect())
    }

    async fn list_service_arns(
        &self,
        cluster_arn: &str,
        next_token: Option<String>,
    ) -> Result<Page<String>> {
        self.service_list_tokens
            .lock()
            .unwrap()
            .push(next_token.clone());
        let arns = self.service_arns.get(cluster_arn).cloned().unwrap_or_default();
        Ok(page_of(&arns, self.page_size, next_token))
    }

    async fn describe_services(
        &self,
        _cluster_arn: &str,
        service_arns: Vec<String>,
    ) -> Result<Vec<Service>> {
        self.service_batches
            .lock()
            .unwrap()
            .push(service_arns.clone());
        match self.describe_delay {
            Some(delay) => tokio::time::sleep(delay).await,
            None => tokio::task::yield_now().await,
        }
        self.services_described.fetch_add(1, Ordering::SeqCst);
        self.check("DescribeServices", &service_arns)?;
        Ok(service_arns
            .iter()
            .filter_map(|a| self.services.get(a).cloned())
            .collect())
    }

    async fn list_container_instance_arns(
        &self,
        cluster_arn: &str,
        next_token: Option<String>,
    ) -> Result<Page<String>> {
        let arns = self
            .instance_arns
            .get(cluster_arn)
            .cloned()
            .unwrap_or_default();
        Ok(page_of(&arns, self.page_size, next_token))
    }

    async fn describe_container_instances(
        &self,
        _cluster_arn: &str,
        instance_arns: Vec<String>,
    ) -> Result<Vec<ContainerInstance>> {
        self.instance_batches
            .lock()
            .unwrap()
            .push(instance_arns.clone());
        self.check("DescribeContainerInstances", &instance_arns)?;
        Ok(instance_arns
            .iter()
            .filter_map(|a| self.instances.get(a).cloned())
            .collect())
    }
}

pub struct FakeAutoScaling {
    page_size: usize,
    records: Vec<ScalableTargetRecord>,
    pub namespaces: Mutex<Vec<String>>,
    pub calls: AtomicUsize,
}

impl FakeAutoScaling {
    pub fn new() -> Self {
        Self {
            page_size: 50,
            records: Vec::new(),
            namespaces: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn target(mut self, resource_id: &str, min_capacity: u32, max_capacity: u32) -> Self {
        self.records.push(ScalableTargetRecord {
            resource_id: resource_id.to_string(),
            min_capacity,
            max_capacity,
        });
        self
    }
}

#[async_trait]
impl AutoScalingApi for FakeAutoScaling {
    async fn describe_scalable_targets(
        &self,
        namespace: &str,
        next_token: Option<String>,
    ) -> Result<Page<ScalableTargetRecord>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.namespaces.lock().unwrap().push(namespace.to_string());
        Ok(page_of(&self.records, self.page_size, next_token))
    }
}

#[derive(Default)]
pub struct FakeCloudWatch {
    /// Datapoints keyed by (dimension value, metric name)
    datapoints: HashMap<(String, String), Vec<Datapoint>>,
    fail: bool,
    failing_dimensions: HashSet<String>,
    delay: Option<Duration>,
    /// Queries that ran to completion and answered with data
    pub answered: AtomicUsize,
    pub queries: Mutex<Vec<StatisticsQuery>>,
}

impl FakeCloudWatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers maxima in chronological order, one minute apart.
    pub fn series(mut self, dimension_value: &str, metric: &str, maxima: &[f64]) -> Self {
        let points = maxima
            .iter()
            .enumerate()
            .map(|(i, m)| Datapoint {
                timestamp: 1_700_000_000 + 60 * i as i64,
                maximum: Some(*m),
            })
            .collect();
        self.datapoints
            .insert((dimension_value.to_string(), metric.to_string()), points);
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    /// Queries against `dimension_value` fail; others still answer.
    pub fn fail_for(mut self, dimension_value: &str) -> Self {
        self.failing_dimensions.insert(dimension_value.to_string());
        self
    }

    /// Successful queries sleep for `delay` before answering.
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn query_count(&self) -> usize {
        self.queries.lock().unwrap().len()
    }
}

#[async_trait]
impl CloudWatchApi for FakeCloudWatch {
    async fn get_metric_statistics(&self, query: &StatisticsQuery) -> Result<Vec<Datapoint>> {
        self.queries.lock().unwrap().push(query.clone());
        if self.fail || self.failing_dimensions.contains(&query.dimension_value) {
            return Err(GatherError::remote("GetMetricStatistics", "throttled"));
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.answered.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .datapoints
            .get(&(query.dimension_value.clone(), query.metric_name.clone()))
            .cloned()
            .unwrap_or_default())
    }
}
