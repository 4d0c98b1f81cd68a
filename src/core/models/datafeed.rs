use std::collections::HashSet;

use serde::Serialize;

use crate::core::config::ConfigError;

/// A logical stream of data that is costed on its own: one storage prefix in
/// the shared bucket plus the functions that process it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Datafeed {
    pub name: String,
    pub prefix: String,
    pub functions: Vec<String>,
    /// Request-metrics filter id on the bucket. `None` means request costs
    /// are not attributed to this feed.
    pub request_metrics_filter: Option<String>,
}

impl Datafeed {
    pub fn new(name: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prefix: prefix.into(),
            functions: Vec::new(),
            request_metrics_filter: None,
        }
    }

    pub fn with_functions<I, S>(mut self, functions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.functions = functions.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_request_filter(mut self, filter: impl Into<String>) -> Self {
        self.request_metrics_filter = Some(filter.into());
        self
    }
}

/// Check a set of feed definitions before any usage is queried.
pub fn validate_datafeeds(feeds: &[Datafeed]) -> Result<(), ConfigError> {
    if feeds.is_empty() {
        return Err(ConfigError::NoDatafeeds);
    }

    let mut seen = HashSet::new();
    for feed in feeds {
        if feed.name.trim().is_empty() {
            return Err(ConfigError::InvalidDatafeed {
                name: feed.name.clone(),
                reason: "name is empty".to_string(),
            });
        }
        if feed.prefix.is_empty() {
            return Err(ConfigError::InvalidDatafeed {
                name: feed.name.clone(),
                reason: "prefix is empty".to_string(),
            });
        }
        if !seen.insert(feed.name.as_str()) {
            return Err(ConfigError::DuplicateDatafeed(feed.name.clone()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_functions_and_filter() {
        let feed = Datafeed::new("orders", "orders/")
            .with_functions(["orders-processor", "orders-compactor"])
            .with_request_filter("orders");
        assert_eq!(feed.functions, vec!["orders-processor", "orders-compactor"]);
        assert_eq!(feed.request_metrics_filter.as_deref(), Some("orders"));
    }

    #[test]
    fn validate_accepts_distinct_feeds() {
        let feeds = vec![Datafeed::new("a", "a/"), Datafeed::new("b", "b/")];
        assert!(validate_datafeeds(&feeds).is_ok());
    }

    #[test]
    fn validate_rejects_empty_list() {
        assert!(matches!(
            validate_datafeeds(&[]),
            Err(ConfigError::NoDatafeeds)
        ));
    }

    #[test]
    fn validate_rejects_duplicates() {
        let feeds = vec![Datafeed::new("a", "a/"), Datafeed::new("a", "other/")];
        let err = validate_datafeeds(&feeds).unwrap_err();
        assert!(err.to_string().contains("'a'"));
    }

    #[test]
    fn validate_rejects_empty_prefix() {
        let feeds = vec![Datafeed::new("a", "")];
        let err = validate_datafeeds(&feeds).unwrap_err();
        assert!(err.to_string().contains("prefix is empty"));
    }

    #[test]
    fn validate_rejects_blank_name() {
        let feeds = vec![Datafeed::new("  ", "a/")];
        assert!(matches!(
            validate_datafeeds(&feeds),
            Err(ConfigError::InvalidDatafeed { .. })
        ));
    }
}
