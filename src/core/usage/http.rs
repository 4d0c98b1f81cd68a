use std::collections::HashSet;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::core::models::window::UsageWindow;
use crate::core::usage::{
    reduce_datapoints, Datapoint, MetricQuery, ObjectStats, Statistic, UsageError, UsageSource,
};

/// Datapoint granularity requested from the exporter, in seconds.
const METRIC_PERIOD_SECS: u64 = 3600;

#[derive(Deserialize)]
struct ObjectItem {
    size: u64,
}

#[derive(Deserialize)]
struct ObjectPage {
    #[serde(default)]
    contents: Vec<ObjectItem>,
    next_continuation_token: Option<String>,
}

#[derive(Deserialize)]
struct MetricResponse {
    #[serde(default)]
    datapoints: Vec<Datapoint>,
}

#[derive(Deserialize)]
struct FunctionResponse {
    memory_mb: u32,
}

/// Validate an exporter endpoint before it is used.
///
/// Plain HTTP is only accepted when no bearer token will be sent.
pub fn validate_endpoint(url: &str, has_token: bool) -> Result<()> {
    if url.starts_with("https://") {
        return Ok(());
    }
    if url.starts_with("http://") {
        if has_token {
            anyhow::bail!("usage exporter endpoint must use HTTPS when a token is configured, got: {}", url);
        }
        return Ok(());
    }
    anyhow::bail!("usage exporter endpoint must be an http(s) URL, got: {}", url)
}

/// Usage source talking to a usage exporter service over HTTP.
pub struct HttpSource {
    client: reqwest::Client,
    endpoint: Url,
    bucket: String,
    token: Option<String>,
}

impl HttpSource {
    pub fn new(endpoint: &str, bucket: &str, timeout: Duration, token: Option<String>) -> Result<Self> {
        validate_endpoint(endpoint, token.is_some())?;
        let endpoint = Url::parse(endpoint)
            .with_context(|| format!("Invalid usage exporter endpoint: {}", endpoint))?;

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            endpoint,
            bucket: bucket.to_string(),
            token,
        })
    }

    /// Endpoint URL with `segments` appended, each percent-encoded as one
    /// path segment.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.endpoint.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn get(&self, url: Url) -> RequestBuilder {
        let request = self
            .client
            .get(url)
            .header("Accept", "application/json");
        match &self.token {
            Some(token) => request.header("Authorization", format!("Bearer {}", token)),
            None => request,
        }
    }

    /// Send a request and decode the JSON body. `Ok(None)` on HTTP 404.
    async fn fetch<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        what: &str,
    ) -> Result<Option<T>, UsageError> {
        let response = request
            .send()
            .await
            .map_err(|e| UsageError::Unavailable(format!("{}: {}", what, e)))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(UsageError::Unavailable(format!(
                "{}: HTTP {}",
                what,
                status.as_u16()
            )));
        }

        response
            .json::<T>()
            .await
            .map(Some)
            .map_err(|e| UsageError::Unavailable(format!("{}: invalid response: {}", what, e)))
    }
}

#[async_trait]
impl UsageSource for HttpSource {
    async fn object_stats(&self, prefix: &str) -> Result<ObjectStats, UsageError> {
        let url = self.url(&["v1", "buckets", self.bucket.as_str(), "objects"]);
        let what = format!("object listing for '{}'", prefix);
        let mut stats = ObjectStats::default();
        let mut continuation: Option<String> = None;
        let mut seen_tokens = HashSet::new();

        loop {
            let mut request = self.get(url.clone()).query(&[("prefix", prefix)]);
            if let Some(token) = &continuation {
                request = request.query(&[("continuation_token", token.as_str())]);
            }

            let page: ObjectPage = self
                .fetch(request, &what)
                .await?
                .ok_or_else(|| UsageError::Unavailable(format!("bucket '{}' not found", self.bucket)))?;

            for object in &page.contents {
                stats.total_bytes += object.size;
                stats.object_count += 1;
            }

            match page.next_continuation_token {
                Some(token) if !token.is_empty() => {
                    if !seen_tokens.insert(token.clone()) {
                        return Err(UsageError::Unavailable(format!(
                            "{}: repeated continuation token '{}'",
                            what, token
                        )));
                    }
                    continuation = Some(token);
                }
                _ => break,
            }
        }

        tracing::debug!(prefix, bytes = stats.total_bytes, objects = stats.object_count, "listed prefix");
        Ok(stats)
    }

    async fn metric_statistics(
        &self,
        query: &MetricQuery,
        window: &UsageWindow,
        statistic: Statistic,
    ) -> Result<Option<f64>, UsageError> {
        let mut params: Vec<(&str, String)> = vec![
            ("namespace", query.namespace.clone()),
            ("metric_name", query.metric_name.clone()),
            ("start", window.start.to_rfc3339()),
            ("end", window.end.to_rfc3339()),
            ("period", METRIC_PERIOD_SECS.to_string()),
        ];
        for (name, value) in &query.dimensions {
            params.push(("dimension", format!("{}={}", name, value)));
        }

        let what = query.to_string();
        let response: Option<MetricResponse> =
            self.fetch(self.get(self.url(&["v1", "metrics"])).query(&params), &what).await?;

        // The exporter may pad the range; only in-window points count.
        Ok(response.and_then(|r| {
            reduce_datapoints(
                r.datapoints.iter().filter(|p| window.contains(&p.timestamp)),
                statistic,
            )
        }))
    }

    async fn function_memory_mb(&self, function: &str) -> Result<u32, UsageError> {
        let what = format!("function '{}'", function);
        let response: Option<FunctionResponse> = self
            .fetch(self.get(self.url(&["v1", "functions", function])), &what)
            .await?;
        response
            .map(|r| r.memory_mb)
            .ok_or(UsageError::ResourceNotFound(what))
    }
}
