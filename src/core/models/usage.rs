use serde::Serialize;

pub const BYTES_PER_GB: f64 = 1_073_741_824.0;

/// What the storage estimator saw under a feed's prefix.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StorageUsage {
    pub total_bytes: u64,
    pub object_count: u64,
    /// Unprorated storage run-rate for the current size.
    pub monthly_storage_cost: f64,
    /// Request counts in the window; `None` when not attributed or no data.
    pub put_requests: Option<f64>,
    pub get_requests: Option<f64>,
}

/// Per-function usage behind a feed's invocation and compute costs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionUsage {
    pub name: String,
    pub invocations: f64,
    pub avg_duration_ms: Option<f64>,
    pub memory_mb: Option<u32>,
    pub gb_seconds: f64,
    pub invocation_cost: f64,
    pub compute_cost: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FeedUsage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage: Option<StorageUsage>,
    pub functions: Vec<FunctionUsage>,
}
