mod cli;
mod core;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "feedcost", about = "Per-datafeed cloud cost attribution", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Config file (default: $XDG_CONFIG_HOME/feedcost/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true)]
    format: Option<String>,

    /// Shorthand for --format json
    #[arg(short = 'j', long = "json", global = true)]
    json: bool,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pretty: bool,

    /// Disable ANSI colors
    #[arg(long, global = true)]
    no_color: bool,

    /// Verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute costs for every datafeed once
    Costs {
        /// Lookback window in hours (default: [monitoring] lookback_hours)
        #[arg(long, value_parser = lookback_hours())]
        hours: Option<u32>,

        /// Only cost this datafeed
        #[arg(long)]
        feed: Option<String>,
    },
    /// Recompute costs on an interval until interrupted
    Watch {
        /// Seconds between passes (default: [monitoring] refresh_interval_seconds)
        #[arg(short, long)]
        interval: Option<u64>,

        /// Lookback window in hours
        #[arg(long, value_parser = lookback_hours())]
        hours: Option<u32>,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Write an example config file
    Init,
    /// Validate config file
    Check,
    /// Print the config file path
    Path,
}

fn lookback_hours() -> clap::builder::RangedI64ValueParser<u32> {
    clap::value_parser!(u32).range(1..=i64::from(crate::core::models::window::MAX_LOOKBACK_HOURS))
}

/// Logs go to stderr so stdout stays clean for JSON. `RUST_LOG` wins over `--verbose`.
fn init_tracing(verbose: bool) {
    let default = if verbose { "warn,feedcost=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let output_opts = cli::output::OutputOptions {
        format: cli::output::OutputFormat::resolve(cli.format.as_deref(), cli.json),
        pretty: cli.pretty,
        use_color: cli::output::detect_color(!cli.no_color),
        verbose: cli.verbose,
    };
    let config_path = cli.config.as_deref();

    match cli.command {
        None => cli::costs_cmd::run(config_path, None, None, &output_opts).await?,
        Some(Commands::Costs { hours, feed }) => {
            cli::costs_cmd::run(config_path, hours, feed, &output_opts).await?
        }
        Some(Commands::Watch { interval, hours }) => {
            cli::watch_cmd::run(config_path, interval, hours, &output_opts).await?
        }
        Some(Commands::Config { action }) => match action {
            ConfigAction::Init => cli::config_cmd::init(config_path, &output_opts)?,
            ConfigAction::Check => cli::config_cmd::check(config_path, &output_opts)?,
            ConfigAction::Path => cli::config_cmd::path(config_path),
        },
    }

    Ok(())
}
