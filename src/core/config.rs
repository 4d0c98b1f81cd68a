use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::cost::pricing::{PriceDimension, PricingModel, PricingTable};
use crate::core::models::datafeed::{validate_datafeeds, Datafeed};
use crate::core::models::window::MAX_LOOKBACK_HOURS;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),
    #[error("Missing price '{0}' in [pricing]")]
    MissingPrice(PriceDimension),
    #[error("Invalid price for '{dimension}': {value} (must be a finite number >= 0)")]
    InvalidPrice { dimension: PriceDimension, value: f64 },
    #[error("No datafeeds configured")]
    NoDatafeeds,
    #[error("Datafeed '{name}': {reason}")]
    InvalidDatafeed { name: String, reason: String },
    #[error("Datafeed '{0}' is defined more than once")]
    DuplicateDatafeed(String),
    #[error("Function '{function}' maps to unknown datafeed '{datafeed}'")]
    UnknownFunctionOwner { function: String, datafeed: String },
    #[error("Lookback of {0} hours is out of range (1..={max})", max = MAX_LOOKBACK_HOURS)]
    InvalidLookback(u32),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitoringSettings {
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_seconds: u64,
    #[serde(default = "default_lookback_hours")]
    pub lookback_hours: u32,
}

fn default_refresh_interval() -> u64 {
    300
}
fn default_lookback_hours() -> u32 {
    24
}

impl Default for MonitoringSettings {
    fn default() -> Self {
        Self {
            refresh_interval_seconds: default_refresh_interval(),
            lookback_hours: default_lookback_hours(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageSettings {
    #[serde(default)]
    pub bucket: String,
}

/// Where usage figures come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceConfig {
    /// A JSON usage snapshot on disk.
    Snapshot { path: PathBuf },
    /// A usage exporter reachable over HTTP.
    Http {
        endpoint: String,
        #[serde(default = "default_timeout")]
        timeout_seconds: u64,
        /// Name of the env var holding a bearer token.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        token_env: Option<String>,
    },
}

fn default_timeout() -> u64 {
    10
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self::Snapshot {
            path: PathBuf::from("usage.json"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatafeedConfig {
    pub name: String,
    pub prefix: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub functions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_metrics_filter: Option<String>,
}

/// `[[functions]]` entry: maps a function to the feed that owns it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionConfig {
    pub name: String,
    pub datafeed: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub monitoring: MonitoringSettings,
    #[serde(default)]
    pub pricing: PricingTable,
    #[serde(default)]
    pub storage: StorageSettings,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub datafeeds: Vec<DatafeedConfig>,
    #[serde(default)]
    pub functions: Vec<FunctionConfig>,
}

impl AppConfig {
    /// Get the config file path, respecting XDG_CONFIG_HOME
    pub fn config_path() -> PathBuf {
        let config_dir = std::env::var("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("~"))
                    .join(".config")
            });
        config_dir.join("feedcost").join("config.toml")
    }

    /// Load config from the default path, falling back to defaults if not found
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_path();
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Load config from an explicit path. A missing file is an error here.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&content)?;
        tracing::debug!(
            path = %path.display(),
            datafeeds = config.datafeeds.len(),
            "loaded config"
        );
        Ok(config)
    }

    /// Serialize and write this config to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Example config written by `feedcost config init`.
    pub fn template() -> Self {
        Self {
            monitoring: MonitoringSettings::default(),
            pricing: PricingTable::us_east_1(),
            storage: StorageSettings {
                bucket: "etl-lake".to_string(),
            },
            source: SourceConfig::default(),
            datafeeds: vec![
                DatafeedConfig {
                    name: "orders".to_string(),
                    prefix: "orders/".to_string(),
                    functions: vec!["orders-processor".to_string()],
                    request_metrics_filter: Some("orders".to_string()),
                },
                DatafeedConfig {
                    name: "clicks".to_string(),
                    prefix: "clicks/".to_string(),
                    functions: Vec::new(),
                    request_metrics_filter: Some("clicks".to_string()),
                },
            ],
            functions: vec![FunctionConfig {
                name: "clicks-sessionizer".to_string(),
                datafeed: "clicks".to_string(),
            }],
        }
    }

    pub fn pricing_model(&self) -> Result<PricingModel, ConfigError> {
        PricingModel::from_table(&self.pricing)
    }

    /// Feed definitions with `[[functions]]` entries merged in, validated.
    pub fn datafeeds(&self) -> Result<Vec<Datafeed>, ConfigError> {
        let mut feeds = Vec::with_capacity(self.datafeeds.len());
        for config in &self.datafeeds {
            let mut functions = Vec::new();
            for function in &config.functions {
                push_unique(&mut functions, function);
            }
            let feed = Datafeed::new(config.name.clone(), config.prefix.clone())
                .with_functions(functions);
            feeds.push(match &config.request_metrics_filter {
                Some(filter) => feed.with_request_filter(filter.clone()),
                None => feed,
            });
        }
        validate_datafeeds(&feeds)?;

        for mapping in &self.functions {
            let feed = feeds
                .iter_mut()
                .find(|f| f.name == mapping.datafeed)
                .ok_or_else(|| ConfigError::UnknownFunctionOwner {
                    function: mapping.name.clone(),
                    datafeed: mapping.datafeed.clone(),
                })?;
            push_unique(&mut feed.functions, &mapping.name);
        }

        Ok(feeds)
    }

    /// Validate the config
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if self.storage.bucket.trim().is_empty() {
            issues.push("[storage] bucket is not set".to_string());
        }
        let lookback = self.monitoring.lookback_hours;
        if lookback == 0 || lookback > MAX_LOOKBACK_HOURS {
            issues.push(ConfigError::InvalidLookback(lookback).to_string());
        }
        if self.monitoring.refresh_interval_seconds == 0 {
            issues.push("refresh_interval_seconds must be at least 1".to_string());
        }
        for dimension in PriceDimension::all() {
            match self.pricing.get(*dimension) {
                None => issues.push(ConfigError::MissingPrice(*dimension).to_string()),
                Some(value) if !value.is_finite() || value < 0.0 => issues.push(
                    ConfigError::InvalidPrice {
                        dimension: *dimension,
                        value,
                    }
                    .to_string(),
                ),
                Some(_) => {}
            }
        }
        match &self.source {
            SourceConfig::Snapshot { path } => {
                if !path.exists() {
                    issues.push(format!("Usage snapshot not found: {}", path.display()));
                }
            }
            SourceConfig::Http {
                endpoint,
                timeout_seconds,
                token_env,
            } => {
                if let Err(e) =
                    crate::core::usage::http::validate_endpoint(endpoint, token_env.is_some())
                {
                    issues.push(e.to_string());
                }
                if *timeout_seconds == 0 {
                    issues.push("timeout_seconds must be at least 1".to_string());
                }
            }
        }
        if let Err(e) = self.datafeeds() {
            issues.push(e.to_string());
        }
        for feed in &self.datafeeds {
            if feed.functions.is_empty()
                && !self.functions.iter().any(|f| f.datafeed == feed.name)
                && feed.request_metrics_filter.is_none()
            {
                issues.push(format!(
                    "Datafeed '{}': no functions or request_metrics_filter, only storage is costed",
                    feed.name
                ));
            }
        }
        issues
    }
}

fn push_unique(functions: &mut Vec<String>, name: &str) {
    if !functions.iter().any(|f| f == name) {
        functions.push(name.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
[monitoring]
refresh_interval_seconds = 60
lookback_hours = 48

[pricing]
storage_per_gb_month = 0.023
put_request_per_1000 = 0.005
get_request_per_1000 = 0.0004
duration_per_gb_second = 0.0000166667
request_per_million = 0.20

[storage]
bucket = "etl-lake"

[source]
kind = "http"
endpoint = "https://usage.internal.example.com"
token_env = "FEEDCOST_TOKEN"

[[datafeeds]]
name = "orders"
prefix = "orders/"
functions = ["orders-processor"]
request_metrics_filter = "orders"

[[datafeeds]]
name = "clicks"
prefix = "clicks/"

[[functions]]
name = "clicks-sessionizer"
datafeed = "clicks"

[[functions]]
name = "orders-processor"
datafeed = "orders"
"#;

    #[test]
    fn parse_full_toml() {
        let config: AppConfig = toml::from_str(FULL).unwrap();
        assert_eq!(config.monitoring.refresh_interval_seconds, 60);
        assert_eq!(config.monitoring.lookback_hours, 48);
        assert_eq!(config.storage.bucket, "etl-lake");
        assert_eq!(
            config.source,
            SourceConfig::Http {
                endpoint: "https://usage.internal.example.com".to_string(),
                timeout_seconds: 10,
                token_env: Some("FEEDCOST_TOKEN".to_string()),
            }
        );
        assert_eq!(config.datafeeds.len(), 2);
        assert_eq!(config.functions.len(), 2);
        assert!(config.pricing_model().is_ok());
    }

    #[test]
    fn parse_empty_toml_gives_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config.monitoring.refresh_interval_seconds, 300);
        assert_eq!(config.monitoring.lookback_hours, 24);
        assert_eq!(config.source, SourceConfig::default());
        assert!(config.datafeeds.is_empty());
    }

    #[test]
    fn parse_snapshot_source() {
        let toml = r#"
[source]
kind = "snapshot"
path = "/var/lib/feedcost/usage.json"
"#;
        let config: AppConfig = toml::from_str(toml).unwrap();
        assert_eq!(
            config.source,
            SourceConfig::Snapshot {
                path: PathBuf::from("/var/lib/feedcost/usage.json")
            }
        );
    }

    #[test]
    fn missing_price_is_an_error_not_zero() {
        let toml = r#"
[pricing]
storage_per_gb_month = 0.023
put_request_per_1000 = 0.005
duration_per_gb_second = 0.0000166667
request_per_million = 0.20
"#;
        let config: AppConfig = toml::from_str(toml).unwrap();
        let err = config.pricing_model().unwrap_err();
        assert!(matches!(err, ConfigError::MissingPrice(PriceDimension::Get1k)));
        assert!(err.to_string().contains("get_request_per_1000"));
    }

    #[test]
    fn function_mappings_merge_without_duplicates() {
        let config: AppConfig = toml::from_str(FULL).unwrap();
        let feeds = config.datafeeds().unwrap();
        let orders = feeds.iter().find(|f| f.name == "orders").unwrap();
        assert_eq!(orders.functions, vec!["orders-processor"]);
        let clicks = feeds.iter().find(|f| f.name == "clicks").unwrap();
        assert_eq!(clicks.functions, vec!["clicks-sessionizer"]);
        assert_eq!(clicks.request_metrics_filter, None);
    }

    #[test]
    fn function_with_unknown_owner_is_rejected() {
        let mut config = AppConfig::template();
        config.functions.push(FunctionConfig {
            name: "ghost-fn".to_string(),
            datafeed: "ghost".to_string(),
        });
        let err = config.datafeeds().unwrap_err();
        assert!(matches!(err, ConfigError::UnknownFunctionOwner { .. }));
        assert!(err.to_string().contains("ghost-fn"));
    }

    #[test]
    fn duplicate_datafeed_is_rejected() {
        let mut config = AppConfig::template();
        let first = config.datafeeds[0].clone();
        config.datafeeds.push(first);
        assert!(matches!(
            config.datafeeds(),
            Err(ConfigError::DuplicateDatafeed(name)) if name == "orders"
        ));
    }

    #[test]
    fn empty_datafeeds_are_rejected() {
        let config = AppConfig::default();
        assert!(matches!(config.datafeeds(), Err(ConfigError::NoDatafeeds)));
    }

    #[test]
    fn template_round_trips_through_toml() {
        let template = AppConfig::template();
        let text = toml::to_string_pretty(&template).unwrap();
        let parsed: AppConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, template);
        assert!(parsed.pricing_model().is_ok());
        assert_eq!(parsed.datafeeds().unwrap().len(), 2);
    }

    #[test]
    fn save_and_load_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        AppConfig::template().save_to(&path).unwrap();
        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded, AppConfig::template());
    }

    #[test]
    fn load_from_missing_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = AppConfig::load_from(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::ReadError(_)));
    }

    #[test]
    fn validate_catches_missing_bucket_and_prices() {
        let config = AppConfig::default();
        let issues = config.validate();
        assert!(issues.iter().any(|i| i.contains("bucket")));
        assert!(issues.iter().any(|i| i.contains("storage_per_gb_month")));
        assert!(issues.iter().any(|i| i.contains("No datafeeds")));
    }

    #[test]
    fn validate_catches_negative_price() {
        let mut config = AppConfig::template();
        config.pricing.request_per_million = Some(-1.0);
        let issues = config.validate();
        assert!(issues.iter().any(|i| i.contains("request_per_million")));
    }

    #[test]
    fn validate_bounds_lookback() {
        let mut config = AppConfig::template();
        config.monitoring.lookback_hours = 0;
        assert!(config.validate().iter().any(|i| i.contains("Lookback of 0 hours")));

        config.monitoring.lookback_hours = u32::MAX;
        assert!(config
            .validate()
            .iter()
            .any(|i| i.contains("out of range")));

        config.monitoring.lookback_hours = MAX_LOOKBACK_HOURS;
        assert!(!config.validate().iter().any(|i| i.contains("Lookback")));
    }

    #[test]
    fn validate_catches_plain_http_with_token() {
        let mut config = AppConfig::template();
        config.source = SourceConfig::Http {
            endpoint: "http://usage.example.com".to_string(),
            timeout_seconds: 10,
            token_env: Some("FEEDCOST_TOKEN".to_string()),
        };
        let issues = config.validate();
        assert!(issues.iter().any(|i| i.contains("HTTPS")));
    }

    #[test]
    fn validate_flags_storage_only_feed() {
        let mut config = AppConfig::template();
        config.datafeeds.push(DatafeedConfig {
            name: "archive".to_string(),
            prefix: "archive/".to_string(),
            functions: Vec::new(),
            request_metrics_filter: None,
        });
        let issues = config.validate();
        assert!(issues.iter().any(|i| i.contains("'archive'")));
    }

    #[test]
    fn config_path_uses_xdg_when_set() {
        std::env::set_var("XDG_CONFIG_HOME", "/tmp/test_xdg_config");
        let path = AppConfig::config_path();
        std::env::remove_var("XDG_CONFIG_HOME");
        assert_eq!(path, PathBuf::from("/tmp/test_xdg_config/feedcost/config.toml"));
    }
}
