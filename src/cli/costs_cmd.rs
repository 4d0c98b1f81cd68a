use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::cli::output::{to_json, OutputFormat, OutputOptions};
use crate::cli::renderer;
use crate::core::config::AppConfig;
use crate::core::cost::engine::CostEngine;
use crate::core::models::cost::{CostPass, DatafeedCostReport};
use crate::core::models::datafeed::Datafeed;
use crate::core::models::window::UsageWindow;
use crate::core::usage;

#[derive(Serialize)]
struct WindowPayload {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    hours: f64,
}

#[derive(Serialize)]
struct PassPayload<'a> {
    window: WindowPayload,
    generated_at: DateTime<Utc>,
    reports: &'a [DatafeedCostReport],
    total_cost: f64,
}

impl<'a> From<&'a CostPass> for PassPayload<'a> {
    fn from(pass: &'a CostPass) -> Self {
        Self {
            window: WindowPayload {
                start: pass.window.start,
                end: pass.window.end,
                hours: pass.window.hours(),
            },
            generated_at: pass.generated_at,
            reports: &pass.reports,
            total_cost: pass.total_cost(),
        }
    }
}

/// Everything a pass needs, resolved once from config.
pub struct CostRunner {
    engine: CostEngine,
    feeds: Vec<Datafeed>,
}

impl CostRunner {
    pub fn from_config(config: &AppConfig, feed_filter: Option<&str>) -> Result<Self> {
        let pricing = config.pricing_model()?;
        let mut feeds = config.datafeeds()?;
        if let Some(name) = feed_filter {
            feeds.retain(|f| f.name == name);
            if feeds.is_empty() {
                anyhow::bail!("Unknown datafeed: '{}'", name);
            }
        }
        let source = usage::from_config(&config.source, &config.storage.bucket)?;
        Ok(Self::new(
            CostEngine::new(pricing, source, &config.storage.bucket),
            feeds,
        ))
    }

    pub fn new(engine: CostEngine, feeds: Vec<Datafeed>) -> Self {
        Self { engine, feeds }
    }

    /// Cost every feed over the trailing `hours` ending now.
    pub async fn run_pass(&self, hours: u32) -> Result<CostPass> {
        let now = Utc::now();
        let window = UsageWindow::trailing(hours, now)?;
        let reports = self.engine.compute_costs(&self.feeds, &window).await?;
        Ok(CostPass {
            window,
            generated_at: Utc::now(),
            reports,
        })
    }
}

/// `--config` path if given, otherwise the default location.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    match path {
        Some(path) => AppConfig::load_from(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => {
            let config = AppConfig::load()?;
            if config.datafeeds.is_empty() {
                anyhow::bail!(
                    "No datafeeds configured in {}. Run `feedcost config init` to create a config.",
                    AppConfig::config_path().display()
                );
            }
            Ok(config)
        }
    }
}

pub fn pass_json(pass: &CostPass, pretty: bool) -> Result<String> {
    Ok(to_json(&PassPayload::from(pass), pretty)?)
}

pub fn print_pass(pass: &CostPass, opts: &OutputOptions) -> Result<()> {
    match opts.format {
        OutputFormat::Text => println!("{}", renderer::render_pass(pass, opts.use_color)),
        OutputFormat::Json => println!("{}", pass_json(pass, opts.pretty)?),
    }
    Ok(())
}

pub async fn run(
    config_path: Option<&Path>,
    hours: Option<u32>,
    feed: Option<String>,
    opts: &OutputOptions,
) -> Result<()> {
    let config = load_config(config_path)?;
    let hours = hours.unwrap_or(config.monitoring.lookback_hours);
    let runner = CostRunner::from_config(&config, feed.as_deref())?;

    // Show spinner on stderr (text mode only)
    let spinner = if matches!(opts.format, OutputFormat::Text) {
        Some(tokio::spawn(async move {
            let frames = ['⠋', '⠙', '⠹', '⠸', '⠼', '⠴', '⠦', '⠧', '⠇', '⠏'];
            let mut i = 0usize;
            loop {
                eprint!("\r {} Collecting usage...", frames[i % frames.len()]);
                i = i.wrapping_add(1);
                tokio::time::sleep(std::time::Duration::from_millis(80)).await;
            }
        }))
    } else {
        None
    };

    let result = runner.run_pass(hours).await;

    // Stop spinner and clear the line
    if let Some(s) = spinner {
        s.abort();
        eprint!("\r\x1b[2K");
    }

    let pass = result?;
    print_pass(&pass, opts)?;

    if opts.verbose && matches!(opts.format, OutputFormat::Json) {
        for report in &pass.reports {
            for warning in report.warnings() {
                eprintln!("Warning for {}: {}", report.datafeed(), warning);
            }
        }
    }

    Ok(())
}
