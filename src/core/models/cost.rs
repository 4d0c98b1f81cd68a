use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::models::usage::FeedUsage;
use crate::core::models::window::UsageWindow;

/// Named sub-cost of a datafeed. Variant order is display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostComponent {
    Storage,
    PutRequests,
    GetRequests,
    Invocations,
    Compute,
}

impl CostComponent {
    pub fn id(&self) -> &'static str {
        match self {
            Self::Storage => "storage",
            Self::PutRequests => "put_requests",
            Self::GetRequests => "get_requests",
            Self::Invocations => "invocations",
            Self::Compute => "compute",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Storage => "Storage",
            Self::PutRequests => "PUT requests",
            Self::GetRequests => "GET requests",
            Self::Invocations => "Invocations",
            Self::Compute => "Compute",
        }
    }

    pub fn all() -> &'static [CostComponent] {
        &[
            CostComponent::Storage,
            CostComponent::PutRequests,
            CostComponent::GetRequests,
            CostComponent::Invocations,
            CostComponent::Compute,
        ]
    }
}

impl std::fmt::Display for CostComponent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    ResourceNotFound,
    UsageUnavailable,
}

impl std::fmt::Display for WarningKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ResourceNotFound => write!(f, "resource not found"),
            Self::UsageUnavailable => write!(f, "usage unavailable"),
        }
    }
}

/// A degradation that zeroed part of a feed's cost in this pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedWarning {
    pub kind: WarningKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component: Option<CostComponent>,
    pub message: String,
}

impl FeedWarning {
    pub fn not_found(component: CostComponent, message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::ResourceNotFound,
            component: Some(component),
            message: message.into(),
        }
    }

    pub fn unavailable(component: Option<CostComponent>, message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::UsageUnavailable,
            component,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for FeedWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.component {
            Some(component) => write!(f, "{} ({}): {}", self.kind, component, self.message),
            None => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}

/// Cost of one datafeed over one window.
///
/// `total` is derived from `components` at construction and cannot be set
/// independently. Components are clamped with [`non_negative`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatafeedCostReport {
    datafeed: String,
    components: BTreeMap<CostComponent, f64>,
    total: f64,
    usage: FeedUsage,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<FeedWarning>,
}

impl DatafeedCostReport {
    pub fn new(
        datafeed: impl Into<String>,
        components: BTreeMap<CostComponent, f64>,
        usage: FeedUsage,
        warnings: Vec<FeedWarning>,
    ) -> Self {
        let components: BTreeMap<CostComponent, f64> = components
            .into_iter()
            .map(|(component, value)| (component, non_negative(value)))
            .collect();
        let total = sum_components(&components);
        Self {
            datafeed: datafeed.into(),
            components,
            total,
            usage,
            warnings,
        }
    }

    pub fn datafeed(&self) -> &str {
        &self.datafeed
    }

    pub fn components(&self) -> &BTreeMap<CostComponent, f64> {
        &self.components
    }

    /// Value of a component, zero when the component is not on this report.
    pub fn component(&self, component: CostComponent) -> f64 {
        self.components.get(&component).copied().unwrap_or(0.0)
    }

    pub fn total(&self) -> f64 {
        self.total
    }

    pub fn usage(&self) -> &FeedUsage {
        &self.usage
    }

    pub fn warnings(&self) -> &[FeedWarning] {
        &self.warnings
    }
}

/// Clamp an amount to a non-negative finite value. NaN and infinities count as zero.
pub fn non_negative(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

/// Sum of amounts starting from `+0.0`; `Iterator::sum` on an empty `f64`
/// iterator yields `-0.0`.
pub fn sum_amounts(amounts: impl IntoIterator<Item = f64>) -> f64 {
    amounts.into_iter().fold(0.0, |acc, v| acc + v)
}

pub fn sum_components(components: &BTreeMap<CostComponent, f64>) -> f64 {
    sum_amounts(components.values().copied())
}

/// Result of one aggregation pass, reports already ranked.
#[derive(Debug, Clone, Serialize)]
pub struct CostPass {
    pub window: UsageWindow,
    pub generated_at: DateTime<Utc>,
    pub reports: Vec<DatafeedCostReport>,
}

impl CostPass {
    pub fn total_cost(&self) -> f64 {
        sum_amounts(self.reports.iter().map(|r| r.total()))
    }

    pub fn warning_count(&self) -> usize {
        self.reports.iter().map(|r| r.warnings().len()).sum()
    }
}
