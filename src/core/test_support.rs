//! Fixtures shared by the engine, estimator and source tests.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::core::cost::pricing::{PricingModel, PricingTable};
use crate::core::models::datafeed::Datafeed;
use crate::core::models::window::UsageWindow;
use crate::core::usage::snapshot::{
    FunctionEntry, MetricSeries, ObjectEntry, SnapshotSource, UsageSnapshot,
};
use crate::core::usage::{
    Datapoint, MetricQuery, ObjectStats, RequestClass, Statistic, UsageError, UsageSource,
};

pub const BUCKET: &str = "etl-lake";
pub const GIB: u64 = 1 << 30;

pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap()
}

pub fn hours_ago(hours: i64) -> DateTime<Utc> {
    now() - Duration::hours(hours)
}

pub fn day_window() -> UsageWindow {
    UsageWindow::trailing(24, now()).unwrap()
}

/// Storage $0.023/GB-month, PUT $0.005/1k, GET $0.0004/1k,
/// compute $0.0000166667/GB-s, invocations $0.20/M.
pub fn list_pricing() -> PricingModel {
    PricingModel::from_table(&PricingTable::us_east_1()).unwrap()
}

pub fn free_pricing() -> PricingModel {
    PricingModel::from_table(&PricingTable {
        storage_per_gb_month: Some(0.0),
        put_request_per_1000: Some(0.0),
        get_request_per_1000: Some(0.0),
        duration_per_gb_second: Some(0.0),
        request_per_million: Some(0.0),
    })
    .unwrap()
}

pub fn orders_feed() -> Datafeed {
    Datafeed::new("orders", "orders/")
        .with_functions(["orders-processor"])
        .with_request_filter("orders")
}

/// Split `total` across two in-window hourly datapoints.
pub fn series(query: MetricQuery, total: f64, samples: f64) -> MetricSeries {
    MetricSeries {
        query,
        datapoints: vec![
            Datapoint {
                timestamp: hours_ago(2),
                sum: total * 0.75,
                sample_count: samples * 0.75,
            },
            Datapoint {
                timestamp: hours_ago(1),
                sum: total * 0.25,
                sample_count: samples * 0.25,
            },
        ],
    }
}

/// 100 GiB under `orders/`, 2M GET requests, no PUT datapoints, and
/// `orders-processor` with 500k invocations averaging 200ms at 512MB.
pub fn orders_snapshot() -> UsageSnapshot {
    UsageSnapshot {
        objects: (0..4)
            .map(|i| ObjectEntry {
                key: format!("orders/2026/10/part-{}.parquet", i),
                size: 25 * GIB,
            })
            .collect(),
        metrics: vec![
            series(
                MetricQuery::s3_requests(BUCKET, "orders", RequestClass::Get),
                2_000_000.0,
                24.0,
            ),
            series(
                MetricQuery::function_invocations("orders-processor"),
                500_000.0,
                500_000.0,
            ),
            series(
                MetricQuery::function_duration("orders-processor"),
                500_000.0 * 200.0,
                500_000.0,
            ),
        ],
        functions: vec![FunctionEntry {
            name: "orders-processor".into(),
            memory_mb: 512,
        }],
    }
}

pub fn orders_source() -> SnapshotSource {
    SnapshotSource::new(orders_snapshot())
}

/// Wraps a snapshot and injects failures for chosen prefixes, metrics and functions.
pub struct FlakySource {
    inner: SnapshotSource,
    pub failing_prefixes: HashSet<String>,
    /// Matched against `"<metric_name>:<FunctionName or FilterId>"`.
    pub failing_metrics: HashSet<String>,
    pub failing_functions: HashSet<String>,
    pub panic_prefix: Option<String>,
}

impl FlakySource {
    pub fn new(snapshot: UsageSnapshot) -> Self {
        Self {
            inner: SnapshotSource::new(snapshot),
            failing_prefixes: HashSet::new(),
            failing_metrics: HashSet::new(),
            failing_functions: HashSet::new(),
            panic_prefix: None,
        }
    }

    fn metric_key(query: &MetricQuery) -> String {
        let target = query
            .dimensions
            .get("FunctionName")
            .or_else(|| query.dimensions.get("FilterId"))
            .cloned()
            .unwrap_or_default();
        format!("{}:{}", query.metric_name, target)
    }
}

#[async_trait]
impl UsageSource for FlakySource {
    async fn object_stats(&self, prefix: &str) -> Result<ObjectStats, UsageError> {
        if self.panic_prefix.as_deref() == Some(prefix) {
            panic!("listing exploded for {}", prefix);
        }
        if self.failing_prefixes.contains(prefix) {
            return Err(UsageError::Unavailable(format!("throttled listing '{}'", prefix)));
        }
        self.inner.object_stats(prefix).await
    }

    async fn metric_statistics(
        &self,
        query: &MetricQuery,
        window: &UsageWindow,
        statistic: Statistic,
    ) -> Result<Option<f64>, UsageError> {
        if self.failing_metrics.contains(&Self::metric_key(query)) {
            return Err(UsageError::Unavailable(format!("throttled {}", query)));
        }
        self.inner.metric_statistics(query, window, statistic).await
    }

    async fn function_memory_mb(&self, function: &str) -> Result<u32, UsageError> {
        if self.failing_functions.contains(function) {
            return Err(UsageError::Unavailable(format!("timeout reading '{}'", function)));
        }
        self.inner.function_memory_mb(function).await
    }
}
