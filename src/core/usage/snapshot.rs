use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::models::window::UsageWindow;
use crate::core::usage::{
    reduce_datapoints, Datapoint, MetricQuery, ObjectStats, Statistic, UsageError, UsageSource,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectEntry {
    pub key: String,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSeries {
    #[serde(flatten)]
    pub query: MetricQuery,
    #[serde(default)]
    pub datapoints: Vec<Datapoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionEntry {
    pub name: String,
    pub memory_mb: u32,
}

/// Point-in-time export of bucket listing, metric series and function
/// configuration, as written by an external exporter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageSnapshot {
    #[serde(default)]
    pub objects: Vec<ObjectEntry>,
    #[serde(default)]
    pub metrics: Vec<MetricSeries>,
    #[serde(default)]
    pub functions: Vec<FunctionEntry>,
}

/// Usage source backed by a [`UsageSnapshot`] held in memory.
pub struct SnapshotSource {
    snapshot: UsageSnapshot,
}

impl SnapshotSource {
    pub fn new(snapshot: UsageSnapshot) -> Self {
        Self { snapshot }
    }

    /// Read a JSON snapshot from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read usage snapshot {}", path.display()))?;
        let snapshot: UsageSnapshot = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse usage snapshot {}", path.display()))?;
        tracing::debug!(
            path = %path.display(),
            objects = snapshot.objects.len(),
            series = snapshot.metrics.len(),
            functions = snapshot.functions.len(),
            "loaded usage snapshot"
        );
        Ok(Self::new(snapshot))
    }
}

#[async_trait]
impl UsageSource for SnapshotSource {
    async fn object_stats(&self, prefix: &str) -> Result<ObjectStats, UsageError> {
        Ok(self
            .snapshot
            .objects
            .iter()
            .filter(|o| o.key.starts_with(prefix))
            .fold(ObjectStats::default(), |mut stats, o| {
                stats.total_bytes += o.size;
                stats.object_count += 1;
                stats
            }))
    }

    async fn metric_statistics(
        &self,
        query: &MetricQuery,
        window: &UsageWindow,
        statistic: Statistic,
    ) -> Result<Option<f64>, UsageError> {
        let points = self
            .snapshot
            .metrics
            .iter()
            .filter(|series| series.query == *query)
            .flat_map(|series| series.datapoints.iter())
            .filter(|p| window.contains(&p.timestamp));
        Ok(reduce_datapoints(points, statistic))
    }

    async fn function_memory_mb(&self, function: &str) -> Result<u32, UsageError> {
        self.snapshot
            .functions
            .iter()
            .find(|f| f.name == function)
            .map(|f| f.memory_mb)
            .ok_or_else(|| UsageError::ResourceNotFound(format!("function '{}'", function)))
    }
}
