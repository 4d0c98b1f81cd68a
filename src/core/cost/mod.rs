pub mod compute;
pub mod engine;
pub mod pricing;
pub mod storage;

use async_trait::async_trait;

use crate::core::cost::pricing::PricingModel;
use crate::core::models::cost::{CostComponent, FeedWarning};
pub use crate::core::models::cost::non_negative;
use crate::core::models::datafeed::Datafeed;
use crate::core::models::usage::{FunctionUsage, StorageUsage};
use crate::core::models::window::UsageWindow;
use crate::core::usage::UsageSource;

/// Usage detail an estimator attaches to its components.
#[derive(Debug, Clone)]
pub enum UsageDetail {
    Storage(StorageUsage),
    Compute(Vec<FunctionUsage>),
}

/// One estimator's contribution to a feed's report.
#[derive(Debug, Clone)]
pub struct Estimate {
    pub components: Vec<(CostComponent, f64)>,
    pub usage: UsageDetail,
    pub warnings: Vec<FeedWarning>,
}

/// A source of cost components for a single datafeed.
///
/// Estimators never fail: upstream problems are folded into zero-valued
/// components plus a [`FeedWarning`], so one bad feed cannot sink a pass.
#[async_trait]
pub trait Estimator: Send + Sync {
    fn name(&self) -> &'static str;

    /// Components this estimator is responsible for. Every one of them is
    /// present on the report, even when the estimate leaves it out.
    fn components(&self) -> &'static [CostComponent];

    async fn estimate(
        &self,
        feed: &Datafeed,
        window: &UsageWindow,
        pricing: &PricingModel,
        source: &dyn UsageSource,
    ) -> Estimate;
}
