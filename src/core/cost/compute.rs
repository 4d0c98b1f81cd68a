use async_trait::async_trait;
use tracing::warn;

use crate::core::cost::pricing::{PriceDimension, PricingModel};
use crate::core::cost::{non_negative, Estimate, Estimator, UsageDetail};
use crate::core::models::cost::{sum_amounts, CostComponent, FeedWarning};
use crate::core::models::datafeed::Datafeed;
use crate::core::models::usage::FunctionUsage;
use crate::core::models::window::UsageWindow;
use crate::core::usage::{MetricQuery, Statistic, UsageError, UsageSource};

const COMPONENTS: &[CostComponent] = &[CostComponent::Invocations, CostComponent::Compute];

/// Memory-time consumed by `invocations` runs of a function.
pub fn gb_seconds(invocations: f64, avg_duration_ms: f64, memory_mb: u32) -> f64 {
    non_negative(invocations * (avg_duration_ms / 1000.0) * (f64::from(memory_mb) / 1024.0))
}

pub fn invocation_cost(invocations: f64, pricing: &PricingModel) -> f64 {
    non_negative(invocations / 1_000_000.0 * pricing.price_for(PriceDimension::InvocationsMillion))
}

pub fn compute_cost(gb_seconds: f64, pricing: &PricingModel) -> f64 {
    non_negative(gb_seconds * pricing.price_for(PriceDimension::ComputeGbSecond))
}

/// Invocation and compute-time costs summed over a feed's functions.
pub struct ComputeEstimator;

/// Outcome of costing one function.
struct FunctionEstimate {
    usage: FunctionUsage,
    missing: bool,
}

impl ComputeEstimator {
    async fn estimate_function(
        &self,
        feed: &Datafeed,
        function: &str,
        window: &UsageWindow,
        pricing: &PricingModel,
        source: &dyn UsageSource,
        warnings: &mut Vec<FeedWarning>,
    ) -> FunctionEstimate {
        let invocations = match source
            .metric_statistics(
                &MetricQuery::function_invocations(function),
                window,
                Statistic::Sum,
            )
            .await
        {
            Ok(value) => non_negative(value.unwrap_or(0.0)),
            Err(err) => {
                warn!(datafeed = %feed.name, function, error = %err, "invocation metrics unavailable");
                warnings.push(FeedWarning::unavailable(
                    Some(CostComponent::Invocations),
                    err.to_string(),
                ));
                0.0
            }
        };

        let avg_duration_ms = match source
            .metric_statistics(
                &MetricQuery::function_duration(function),
                window,
                Statistic::Average,
            )
            .await
        {
            Ok(value) => value.map(non_negative),
            Err(err) => {
                warn!(datafeed = %feed.name, function, error = %err, "duration metrics unavailable");
                warnings.push(FeedWarning::unavailable(
                    Some(CostComponent::Compute),
                    err.to_string(),
                ));
                None
            }
        };

        let mut missing = false;
        let memory_mb = match source.function_memory_mb(function).await {
            Ok(memory) => Some(memory),
            Err(UsageError::ResourceNotFound(detail)) => {
                warn!(datafeed = %feed.name, function, "function does not exist, compute cost zeroed");
                warnings.push(FeedWarning::not_found(
                    CostComponent::Compute,
                    format!("{} does not exist", detail),
                ));
                missing = true;
                None
            }
            Err(err) => {
                warn!(datafeed = %feed.name, function, error = %err, "function configuration unavailable");
                warnings.push(FeedWarning::unavailable(
                    Some(CostComponent::Compute),
                    err.to_string(),
                ));
                None
            }
        };

        let gb_seconds = match (avg_duration_ms, memory_mb) {
            (Some(duration), Some(memory)) => gb_seconds(invocations, duration, memory),
            _ => 0.0,
        };

        FunctionEstimate {
            usage: FunctionUsage {
                name: function.to_string(),
                invocations,
                avg_duration_ms,
                memory_mb,
                gb_seconds,
                invocation_cost: invocation_cost(invocations, pricing),
                compute_cost: compute_cost(gb_seconds, pricing),
            },
            missing,
        }
    }
}

#[async_trait]
impl Estimator for ComputeEstimator {
    fn name(&self) -> &'static str {
        "compute"
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
        let mut functions = Vec::with_capacity(feed.functions.len());
        let mut any_missing = false;

        for function in &feed.functions {
            let estimate = self
                .estimate_function(feed, function, window, pricing, source, &mut warnings)
                .await;
            any_missing |= estimate.missing;
            functions.push(estimate.usage);
        }

        // A function that does not exist means the feed's mapping is wrong,
        // so none of its compute time is trusted for this pass.
        if any_missing {
            for function in &mut functions {
                function.gb_seconds = 0.0;
                function.compute_cost = 0.0;
            }
        }

        let invocations = sum_amounts(functions.iter().map(|f| f.invocation_cost));
        let compute = sum_amounts(functions.iter().map(|f| f.compute_cost));

        Estimate {
            components: vec![
                (CostComponent::Invocations, invocations),
                (CostComponent::Compute, compute),
            ],
            usage: UsageDetail::Compute(functions),
            warnings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::cost::WarningKind;
    use crate::core::test_support::{
        day_window, free_pricing, list_pricing, orders_feed, orders_snapshot, orders_source,
        series, FlakySource,
    };
    use crate::core::usage::snapshot::{FunctionEntry, SnapshotSource};

    fn component(estimate: &Estimate, component: CostComponent) -> f64 {
        estimate
            .components
            .iter()
            .find(|(c, _)| *c == component)
            .map(|(_, v)| *v)
            .unwrap()
    }

    fn functions(estimate: &Estimate) -> &[FunctionUsage] {
        match &estimate.usage {
            UsageDetail::Compute(functions) => functions,
            UsageDetail::Storage(_) => panic!("expected compute usage"),
        }
    }

    #[test]
    fn gb_seconds_formula() {
        // 500k x 0.2s x 0.5GB
        assert!((gb_seconds(500_000.0, 200.0, 512) - 50_000.0).abs() < 1e-9);
    }

    #[test]
    fn zero_invocations_cost_nothing() {
        assert_eq!(gb_seconds(0.0, 200.0, 512), 0.0);
        assert_eq!(invocation_cost(0.0, &list_pricing()), 0.0);
    }

    #[tokio::test]
    async fn orders_scenario() {
        let estimate = ComputeEstimator
            .estimate(&orders_feed(), &day_window(), &list_pricing(), &orders_source())
            .await;

        assert!((component(&estimate, CostComponent::Invocations) - 0.10).abs() < 1e-9);
        assert!((component(&estimate, CostComponent::Compute) - 0.833335).abs() < 1e-9);
        assert!(estimate.warnings.is_empty());

        let f = &functions(&estimate)[0];
        assert_eq!(f.name, "orders-processor");
        assert_eq!(f.invocations, 500_000.0);
        assert_eq!(f.memory_mb, Some(512));
        assert!((f.avg_duration_ms.unwrap() - 200.0).abs() < 1e-9);
        assert!((f.gb_seconds - 50_000.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn feed_without_functions_is_zero() {
        let mut feed = orders_feed();
        feed.functions.clear();
        let estimate = ComputeEstimator
            .estimate(&feed, &day_window(), &list_pricing(), &orders_source())
            .await;

        assert_eq!(component(&estimate, CostComponent::Invocations), 0.0);
        assert_eq!(component(&estimate, CostComponent::Compute), 0.0);
        assert!(component(&estimate, CostComponent::Compute).is_sign_positive());
        assert!(estimate.warnings.is_empty());
        assert!(functions(&estimate).is_empty());
    }

    #[tokio::test]
    async fn absent_duration_zeroes_compute_without_warning() {
        let mut snapshot = orders_snapshot();
        snapshot.metrics.retain(|s| s.query.metric_name != "Duration");
        let estimate = ComputeEstimator
            .estimate(
                &orders_feed(),
                &day_window(),
                &list_pricing(),
                &SnapshotSource::new(snapshot),
            )
            .await;

        let compute = component(&estimate, CostComponent::Compute);
        assert_eq!(compute, 0.0);
        assert!(!compute.is_nan());
        assert!((component(&estimate, CostComponent::Invocations) - 0.10).abs() < 1e-9);
        assert!(estimate.warnings.is_empty());
        assert_eq!(functions(&estimate)[0].avg_duration_ms, None);
    }

    #[tokio::test]
    async fn unknown_function_zeroes_feed_compute() {
        let mut snapshot = orders_snapshot();
        snapshot.metrics.push(series(
            MetricQuery::function_invocations("orders-ghost"),
            1_000.0,
            1_000.0,
        ));
        let feed = orders_feed().with_functions(["orders-processor", "orders-ghost"]);

        let estimate = ComputeEstimator
            .estimate(
                &feed,
                &day_window(),
                &list_pricing(),
                &SnapshotSource::new(snapshot),
            )
            .await;

        assert_eq!(component(&estimate, CostComponent::Compute), 0.0);
        // Invocations need no memory figure and are still costed.
        let expected_invocations = 501_000.0 / 1_000_000.0 * 0.20;
        assert!(
            (component(&estimate, CostComponent::Invocations) - expected_invocations).abs()
                < 1e-9
        );
        assert_eq!(estimate.warnings.len(), 1);
        assert_eq!(estimate.warnings[0].kind, WarningKind::ResourceNotFound);
        assert_eq!(estimate.warnings[0].component, Some(CostComponent::Compute));
        // The existing function's memory-time is not reported as if it were costed.
        for function in functions(&estimate) {
            assert_eq!(function.gb_seconds, 0.0);
            assert_eq!(function.compute_cost, 0.0);
        }
    }

    #[tokio::test]
    async fn invocation_metric_failure_zeroes_that_function() {
        let mut source = FlakySource::new(orders_snapshot());
        source
            .failing_metrics
            .insert("Invocations:orders-processor".into());

        let estimate = ComputeEstimator
            .estimate(&orders_feed(), &day_window(), &list_pricing(), &source)
            .await;

        assert_eq!(component(&estimate, CostComponent::Invocations), 0.0);
        assert_eq!(component(&estimate, CostComponent::Compute), 0.0);
        assert_eq!(estimate.warnings.len(), 1);
        assert_eq!(estimate.warnings[0].kind, WarningKind::UsageUnavailable);
    }

    #[tokio::test]
    async fn memory_lookup_failure_only_zeroes_that_function() {
        let mut snapshot = orders_snapshot();
        snapshot.functions.push(FunctionEntry {
            name: "orders-enricher".into(),
            memory_mb: 1024,
        });
        snapshot.metrics.push(series(
            MetricQuery::function_invocations("orders-enricher"),
            1_000.0,
            1_000.0,
        ));
        snapshot.metrics.push(series(
            MetricQuery::function_duration("orders-enricher"),
            1_000.0 * 1_000.0,
            1_000.0,
        ));
        let mut source = FlakySource::new(snapshot);
        source.failing_functions.insert("orders-enricher".into());
        let feed = orders_feed().with_functions(["orders-processor", "orders-enricher"]);

        let estimate = ComputeEstimator
            .estimate(&feed, &day_window(), &list_pricing(), &source)
            .await;

        assert!((component(&estimate, CostComponent::Compute) - 0.833335).abs() < 1e-9);
        assert_eq!(estimate.warnings.len(), 1);
        assert_eq!(estimate.warnings[0].kind, WarningKind::UsageUnavailable);
        assert_eq!(functions(&estimate)[1].memory_mb, None);
    }

    #[tokio::test]
    async fn zero_prices_cost_nothing() {
        let estimate = ComputeEstimator
            .estimate(&orders_feed(), &day_window(), &free_pricing(), &orders_source())
            .await;
        assert_eq!(component(&estimate, CostComponent::Invocations), 0.0);
        assert_eq!(component(&estimate, CostComponent::Compute), 0.0);
    }
}
