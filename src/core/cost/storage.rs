use async_trait::async_trait;
use tracing::{debug, warn};

use crate::core::cost::pricing::{PriceDimension, PricingModel};
use crate::core::cost::{non_negative, Estimate, Estimator, UsageDetail};
use crate::core::models::cost::{CostComponent, FeedWarning};
use crate::core::models::datafeed::Datafeed;
use crate::core::models::usage::{StorageUsage, BYTES_PER_GB};
use crate::core::models::window::UsageWindow;
use crate::core::usage::{MetricQuery, ObjectStats, RequestClass, Statistic, UsageSource};

const COMPONENTS: &[CostComponent] = &[
    CostComponent::Storage,
    CostComponent::PutRequests,
    CostComponent::GetRequests,
];

/// Monthly cost of keeping `total_bytes` stored.
pub fn monthly_storage_cost(total_bytes: u64, pricing: &PricingModel) -> f64 {
    let size_gb = total_bytes as f64 / BYTES_PER_GB;
    non_negative(size_gb * pricing.price_for(PriceDimension::StorageGbMonth))
}

/// Storage held under `total_bytes`, prorated to the window.
///
/// The listing is a point-in-time size, so this approximates the monthly
/// average the bill is based on.
pub fn storage_cost(total_bytes: u64, window: &UsageWindow, pricing: &PricingModel) -> f64 {
    non_negative(monthly_storage_cost(total_bytes, pricing) * window.month_fraction())
}

pub fn request_cost(requests: f64, price_per_1k: f64) -> f64 {
    non_negative(requests / 1000.0 * price_per_1k)
}

/// Storage and request costs for the part of the bucket under a feed's prefix.
pub struct StorageEstimator {
    bucket: String,
}

impl StorageEstimator {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
        }
    }

    async fn request_count(
        &self,
        feed: &Datafeed,
        filter: &str,
        class: RequestClass,
        window: &UsageWindow,
        source: &dyn UsageSource,
        warnings: &mut Vec<FeedWarning>,
    ) -> Option<f64> {
        let query = MetricQuery::s3_requests(&self.bucket, filter, class);
        match source.metric_statistics(&query, window, Statistic::Sum).await {
            Ok(value) => value.map(non_negative),
            Err(err) => {
                let component = match class {
                    RequestClass::Put => CostComponent::PutRequests,
                    RequestClass::Get => CostComponent::GetRequests,
                };
                warn!(datafeed = %feed.name, %component, error = %err, "request metrics unavailable");
                warnings.push(FeedWarning::unavailable(Some(component), err.to_string()));
                None
            }
        }
    }
}

#[async_trait]
impl Estimator for StorageEstimator {
    fn name(&self) -> &'static str {
        "storage"
    }

    fn components(&self) -> &'static [CostComponent] {
        COMPONENTS
    }

    async fn estimate(
        &self,
        feed: &Datafeed,
        window: &UsageWindow,
        pricing: &PricingModel,
        source: &dyn UsageSource,
    ) -> Estimate {
        let mut warnings = Vec::new();

        let stats = match source.object_stats(&feed.prefix).await {
            Ok(stats) => stats,
            Err(err) => {
                warn!(datafeed = %feed.name, prefix = %feed.prefix, error = %err, "object listing unavailable");
                warnings.push(FeedWarning::unavailable(
                    Some(CostComponent::Storage),
                    err.to_string(),
                ));
                ObjectStats::default()
            }
        };

        let (put_requests, get_requests) = match &feed.request_metrics_filter {
            Some(filter) => (
                self.request_count(feed, filter, RequestClass::Put, window, source, &mut warnings)
                    .await,
                self.request_count(feed, filter, RequestClass::Get, window, source, &mut warnings)
                    .await,
            ),
            None => {
                debug!(datafeed = %feed.name, "no request metrics filter, request costs not attributed");
                (None, None)
            }
        };

        let storage = storage_cost(stats.total_bytes, window, pricing);
        let put_cost = request_cost(
            put_requests.unwrap_or(0.0),
            pricing.price_for(PriceDimension::Put1k),
        );
        let get_cost = request_cost(
            get_requests.unwrap_or(0.0),
            pricing.price_for(PriceDimension::Get1k),
        );

        Estimate {
            components: vec![
                (CostComponent::Storage, storage),
                (CostComponent::PutRequests, put_cost),
                (CostComponent::GetRequests, get_cost),
            ],
            usage: UsageDetail::Storage(StorageUsage {
                total_bytes: stats.total_bytes,
                object_count: stats.object_count,
                monthly_storage_cost: monthly_storage_cost(stats.total_bytes, pricing),
                put_requests,
                get_requests,
            }),
            warnings,
        }
    }
}
