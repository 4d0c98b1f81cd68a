use serde::{Deserialize, Serialize};

use crate::core::config::ConfigError;

/// Billing dimensions the engine prices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceDimension {
    StorageGbMonth,
    Put1k,
    Get1k,
    ComputeGbSecond,
    InvocationsMillion,
}

impl PriceDimension {
    pub fn all() -> &'static [PriceDimension] {
        &[
            PriceDimension::StorageGbMonth,
            PriceDimension::Put1k,
            PriceDimension::Get1k,
            PriceDimension::ComputeGbSecond,
            PriceDimension::InvocationsMillion,
        ]
    }

    /// Key under `[pricing]` in the config file.
    pub fn config_key(&self) -> &'static str {
        match self {
            Self::StorageGbMonth => "storage_per_gb_month",
            Self::Put1k => "put_request_per_1000",
            Self::Get1k => "get_request_per_1000",
            Self::ComputeGbSecond => "duration_per_gb_second",
            Self::InvocationsMillion => "request_per_million",
        }
    }

    pub fn unit(&self) -> &'static str {
        match self {
            Self::StorageGbMonth => "GB-month",
            Self::Put1k => "1,000 PUT requests",
            Self::Get1k => "1,000 GET requests",
            Self::ComputeGbSecond => "GB-second",
            Self::InvocationsMillion => "1M invocations",
        }
    }
}

impl std::fmt::Display for PriceDimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.config_key())
    }
}

/// The `[pricing]` config section. Every field is optional at parse time so
/// a missing price can be reported by name instead of defaulting to zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PricingTable {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_per_gb_month: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub put_request_per_1000: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub get_request_per_1000: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_per_gb_second: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_per_million: Option<f64>,
}

impl PricingTable {
    /// S3 Standard and Lambda (x86) list prices in us-east-1.
    pub fn us_east_1() -> Self {
        Self {
            storage_per_gb_month: Some(0.023),
            put_request_per_1000: Some(0.005),
            get_request_per_1000: Some(0.0004),
            duration_per_gb_second: Some(0.0000166667),
            request_per_million: Some(0.20),
        }
    }

    pub fn get(&self, dimension: PriceDimension) -> Option<f64> {
        match dimension {
            PriceDimension::StorageGbMonth => self.storage_per_gb_month,
            PriceDimension::Put1k => self.put_request_per_1000,
            PriceDimension::Get1k => self.get_request_per_1000,
            PriceDimension::ComputeGbSecond => self.duration_per_gb_second,
            PriceDimension::InvocationsMillion => self.request_per_million,
        }
    }
}

/// Validated per-unit prices, fixed for the life of the process.
#[derive(Debug, Clone, PartialEq)]
pub struct PricingModel {
    storage_gb_month: f64,
    put_1k: f64,
    get_1k: f64,
    compute_gb_second: f64,
    invocations_million: f64,
}

impl PricingModel {
    /// Build from a config table. Every dimension must be present, finite and >= 0.
    pub fn from_table(table: &PricingTable) -> Result<Self, ConfigError> {
        let price = |dimension: PriceDimension| -> Result<f64, ConfigError> {
            let value = table
                .get(dimension)
                .ok_or(ConfigError::MissingPrice(dimension))?;
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidPrice { dimension, value });
            }
            Ok(value)
        };

        Ok(Self {
            storage_gb_month: price(PriceDimension::StorageGbMonth)?,
            put_1k: price(PriceDimension::Put1k)?,
            get_1k: price(PriceDimension::Get1k)?,
            compute_gb_second: price(PriceDimension::ComputeGbSecond)?,
            invocations_million: price(PriceDimension::InvocationsMillion)?,
        })
    }

    pub fn price_for(&self, dimension: PriceDimension) -> f64 {
        match dimension {
            PriceDimension::StorageGbMonth => self.storage_gb_month,
            PriceDimension::Put1k => self.put_1k,
            PriceDimension::Get1k => self.get_1k,
            PriceDimension::ComputeGbSecond => self.compute_gb_second,
            PriceDimension::InvocationsMillion => self.invocations_million,
        }
    }
}
