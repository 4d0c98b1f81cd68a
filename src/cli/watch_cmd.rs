use std::future::Future;
use std::io::{self, IsTerminal, Write};
use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use colored::Colorize;
use crossterm::{
    cursor,
    terminal::{self, ClearType},
    QueueableCommand,
};
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::cli::costs_cmd::{load_config, pass_json, CostRunner};
use crate::cli::output::{OutputFormat, OutputOptions};
use crate::cli::renderer;
use crate::core::models::cost::CostPass;

/// Move to the top-left of a cleared screen before redrawing.
fn clear_screen() -> io::Result<()> {
    let mut stdout = io::stdout();
    stdout
        .queue(terminal::Clear(ClearType::All))?
        .queue(cursor::MoveTo(0, 0))?;
    stdout.flush()
}

fn emit(pass: &CostPass, interval_secs: u64, opts: &OutputOptions) -> Result<()> {
    match opts.format {
        OutputFormat::Text => {
            if io::stdout().is_terminal() {
                clear_screen()?;
            }
            println!("{}", renderer::render_pass(pass, opts.use_color));
            let footer = format!(
                "Refreshing every {}s. Press Ctrl+C to exit.",
                interval_secs
            );
            println!("\n{}", if opts.use_color { footer.dimmed().to_string() } else { footer });
        }
        // One compact object per line so the stream stays line-delimited.
        OutputFormat::Json => println!("{}", pass_json(pass, false)?),
    }
    io::stdout().flush()?;
    Ok(())
}

/// Re-run the cost pass every `interval` seconds until Ctrl+C.
///
/// A failed pass is reported and retried on the next tick; the loop itself
/// only stops on the interrupt.
pub async fn run(
    config_path: Option<&Path>,
    interval: Option<u64>,
    hours: Option<u32>,
    opts: &OutputOptions,
) -> Result<()> {
    let config = load_config(config_path)?;
    let interval_secs = interval
        .unwrap_or(config.monitoring.refresh_interval_seconds)
        .max(1);
    let hours = hours.unwrap_or(config.monitoring.lookback_hours);
    let runner = CostRunner::from_config(&config, None)?;

    watch_until(&runner, hours, interval_secs, opts, tokio::signal::ctrl_c()).await
}

/// Tick loop behind [`run`]. `shutdown` is polled during a pass as well as
/// between passes.
async fn watch_until<S: Future>(
    runner: &CostRunner,
    hours: u32,
    interval_secs: u64,
    opts: &OutputOptions,
    shutdown: S,
) -> Result<()> {
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tokio::pin!(shutdown);

    info!(interval_secs, hours, "watching datafeed costs");

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("interrupted, stopping watch");
                break;
            }
            _ = ticker.tick() => {
                let result = tokio::select! {
                    _ = &mut shutdown => {
                        info!("interrupted during a pass, stopping watch");
                        break;
                    }
                    result = runner.run_pass(hours) => result,
                };
                match result {
                    Ok(pass) => emit(&pass, interval_secs, opts)?,
                    Err(e) => {
                        warn!(error = %format!("{:#}", e), "cost pass failed, retrying next tick");
                        eprintln!("Cost pass failed: {:#}. Retrying in {}s.", e, interval_secs);
                    }
                }
            }
        }
    }

    Ok(())
}
