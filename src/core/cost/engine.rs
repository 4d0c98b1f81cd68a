use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, error, info};

use crate::core::config::ConfigError;
use crate::core::cost::compute::ComputeEstimator;
use crate::core::cost::pricing::PricingModel;
use crate::core::cost::storage::StorageEstimator;
use crate::core::cost::{non_negative, Estimator, UsageDetail};
use crate::core::models::cost::{CostComponent, DatafeedCostReport, FeedWarning};
use crate::core::models::datafeed::{validate_datafeeds, Datafeed};
use crate::core::models::usage::FeedUsage;
use crate::core::models::window::UsageWindow;
use crate::core::usage::UsageSource;

/// Runs every registered estimator over every datafeed and ranks the results.
///
/// Cheap to clone; all state is shared.
#[derive(Clone)]
pub struct CostEngine {
    pricing: Arc<PricingModel>,
    source: Arc<dyn UsageSource>,
    estimators: Arc<Vec<Box<dyn Estimator>>>,
}

impl CostEngine {
    /// Engine with the storage and compute estimators registered.
    pub fn new(pricing: PricingModel, source: Arc<dyn UsageSource>, bucket: &str) -> Self {
        Self::with_estimators(
            pricing,
            source,
            vec![
                Box::new(StorageEstimator::new(bucket)),
                Box::new(ComputeEstimator),
            ],
        )
    }

    pub fn with_estimators(
        pricing: PricingModel,
        source: Arc<dyn UsageSource>,
        estimators: Vec<Box<dyn Estimator>>,
    ) -> Self {
        Self {
            pricing: Arc::new(pricing),
            source,
            estimators: Arc::new(estimators),
        }
    }

    /// One report per feed, sorted by total descending then name.
    ///
    /// Feeds are costed concurrently. Upstream failures degrade the affected
    /// components to zero with a warning; the only error is an invalid feed set.
    pub async fn compute_costs(
        &self,
        feeds: &[Datafeed],
        window: &UsageWindow,
    ) -> Result<Vec<DatafeedCostReport>, ConfigError> {
        validate_datafeeds(feeds)?;
        info!(
            feeds = feeds.len(),
            start = %window.start,
            end = %window.end,
            "computing datafeed costs"
        );

        let window = *window;
        let handles: Vec<_> = feeds
            .iter()
            .cloned()
            .map(|feed| {
                let engine = self.clone();
                let name = feed.name.clone();
                let handle = tokio::spawn(async move { engine.cost_feed(&feed, &window).await });
                (name, handle)
            })
            .collect();

        let mut reports = Vec::with_capacity(handles.len());
        for (name, handle) in handles {
            match handle.await {
                Ok(report) => reports.push(report),
                Err(err) => {
                    error!(datafeed = %name, error = %err, "cost estimation task failed");
                    reports.push(self.failed_report(&name, &err.to_string()));
                }
            }
        }

        sort_reports(&mut reports);
        Ok(reports)
    }

    async fn cost_feed(&self, feed: &Datafeed, window: &UsageWindow) -> DatafeedCostReport {
        let mut components = self.zeroed_components();
        let mut usage = FeedUsage::default();
        let mut warnings = Vec::new();

        for estimator in self.estimators.iter() {
            let estimate = estimator
                .estimate(feed, window, &self.pricing, self.source.as_ref())
                .await;
            debug!(
                datafeed = %feed.name,
                estimator = estimator.name(),
                warnings = estimate.warnings.len(),
                "estimate complete"
            );

            for (component, value) in estimate.components {
                *components.entry(component).or_insert(0.0) += non_negative(value);
            }
            match estimate.usage {
                UsageDetail::Storage(storage) => usage.storage = Some(storage),
                UsageDetail::Compute(functions) => usage.functions.extend(functions),
            }
            warnings.extend(estimate.warnings);
        }

        let report = DatafeedCostReport::new(&feed.name, components, usage, warnings);
        debug!(datafeed = %feed.name, total = report.total(), "datafeed costed");
        report
    }

    fn zeroed_components(&self) -> BTreeMap<CostComponent, f64> {
        self.estimators
            .iter()
            .flat_map(|e| e.components().iter().copied())
            .map(|c| (c, 0.0))
            .collect()
    }

    fn failed_report(&self, name: &str, reason: &str) -> DatafeedCostReport {
        DatafeedCostReport::new(
            name,
            self.zeroed_components(),
            FeedUsage::default(),
            vec![FeedWarning::unavailable(
                None,
                format!("cost estimation failed: {}", reason),
            )],
        )
    }
}

/// Total descending, ties broken by datafeed name ascending.
pub fn sort_reports(reports: &mut [DatafeedCostReport]) {
    reports.sort_by(|a, b| {
        b.total()
            .total_cmp(&a.total())
            .then_with(|| a.datafeed().cmp(b.datafeed()))
    });
}
