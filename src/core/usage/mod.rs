pub mod http;
pub mod snapshot;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::config::SourceConfig;
use crate::core::models::window::UsageWindow;

pub const S3_NAMESPACE: &str = "AWS/S3";
pub const LAMBDA_NAMESPACE: &str = "AWS/Lambda";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum UsageError {
    #[error("resource not found: {0}")]
    ResourceNotFound(String),
    #[error("usage unavailable: {0}")]
    Unavailable(String),
}

/// Size and count of the objects under one prefix.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectStats {
    pub total_bytes: u64,
    pub object_count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Statistic {
    Sum,
    Average,
}

/// One aggregated sample of a metric series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Datapoint {
    pub timestamp: DateTime<Utc>,
    pub sum: f64,
    #[serde(default = "default_sample_count")]
    pub sample_count: f64,
}

fn default_sample_count() -> f64 {
    1.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestClass {
    Put,
    Get,
}

impl RequestClass {
    pub fn metric_name(&self) -> &'static str {
        match self {
            Self::Put => "PutRequests",
            Self::Get => "GetRequests",
        }
    }
}

/// Identity of a metric series: namespace, name and dimension set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MetricQuery {
    pub namespace: String,
    pub metric_name: String,
    #[serde(default)]
    pub dimensions: BTreeMap<String, String>,
}

impl MetricQuery {
    pub fn new(namespace: impl Into<String>, metric_name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            metric_name: metric_name.into(),
            dimensions: BTreeMap::new(),
        }
    }

    pub fn dimension(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.dimensions.insert(name.into(), value.into());
        self
    }

    /// Request-metrics series for one filter on the bucket.
    pub fn s3_requests(bucket: &str, filter_id: &str, class: RequestClass) -> Self {
        Self::new(S3_NAMESPACE, class.metric_name())
            .dimension("BucketName", bucket)
            .dimension("FilterId", filter_id)
    }

    pub fn function_invocations(function: &str) -> Self {
        Self::new(LAMBDA_NAMESPACE, "Invocations").dimension("FunctionName", function)
    }

    /// Execution time in milliseconds.
    pub fn function_duration(function: &str) -> Self {
        Self::new(LAMBDA_NAMESPACE, "Duration").dimension("FunctionName", function)
    }
}

impl std::fmt::Display for MetricQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.metric_name)?;
        let dims: Vec<String> = self
            .dimensions
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        if !dims.is_empty() {
            write!(f, " [{}]", dims.join(", "))?;
        }
        Ok(())
    }
}

/// Collapse datapoints into one statistic. `None` means there was no data,
/// which callers must not confuse with a measured zero.
pub fn reduce_datapoints<'a, I>(points: I, statistic: Statistic) -> Option<f64>
where
    I: IntoIterator<Item = &'a Datapoint>,
{
    let mut sum = 0.0;
    let mut samples = 0.0;
    let mut seen = false;
    for point in points {
        sum += point.sum;
        samples += point.sample_count;
        seen = true;
    }
    if !seen {
        return None;
    }
    match statistic {
        Statistic::Sum => Some(sum),
        Statistic::Average if samples > 0.0 => Some(sum / samples),
        Statistic::Average => None,
    }
}

/// Read-only view of the cloud account the engine costs.
#[async_trait]
pub trait UsageSource: Send + Sync {
    /// Totals for every object whose key starts with `prefix`. No objects is `(0, 0)`.
    async fn object_stats(&self, prefix: &str) -> Result<ObjectStats, UsageError>;

    /// A statistic over the datapoints inside `window`, or `None` when there are none.
    async fn metric_statistics(
        &self,
        query: &MetricQuery,
        window: &UsageWindow,
        statistic: Statistic,
    ) -> Result<Option<f64>, UsageError>;

    /// Configured memory of a function; `ResourceNotFound` when it does not exist.
    async fn function_memory_mb(&self, function: &str) -> Result<u32, UsageError>;
}

/// Build the configured usage source for `bucket`.
pub fn from_config(config: &SourceConfig, bucket: &str) -> Result<Arc<dyn UsageSource>> {
    match config {
        SourceConfig::Snapshot { path } => {
            let source = snapshot::SnapshotSource::load(path)?;
            Ok(Arc::new(source))
        }
        SourceConfig::Http {
            endpoint,
            timeout_seconds,
            token_env,
        } => {
            let token = match token_env {
                Some(var) => {
                    let value = std::env::var(var)
                        .with_context(|| format!("{} env var not set", var))?;
                    if value.is_empty() {
                        anyhow::bail!("{} is empty", var);
                    }
                    Some(value)
                }
                None => None,
            };
            let source = http::HttpSource::new(
                endpoint,
                bucket,
                Duration::from_secs(*timeout_seconds),
                token,
            )?;
            Ok(Arc::new(source))
        }
    }
}
