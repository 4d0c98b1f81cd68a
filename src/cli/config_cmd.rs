use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::Serialize;

use crate::cli::output::{to_json, OutputFormat, OutputOptions};
use crate::core::config::AppConfig;
use crate::core::cost::pricing::PriceDimension;

fn resolve(path: Option<&Path>) -> PathBuf {
    path.map(Path::to_path_buf)
        .unwrap_or_else(AppConfig::config_path)
}

#[derive(Serialize)]
struct CheckReport<'a> {
    path: String,
    valid: bool,
    issues: &'a [String],
}

pub fn init(path: Option<&Path>, _opts: &OutputOptions) -> Result<()> {
    let path = resolve(path);
    if path.exists() {
        eprintln!("Config file already exists at {}", path.display());
        eprintln!("Remove it first if you want to regenerate.");
        return Ok(());
    }

    let template = AppConfig::template();
    template.save_to(&path)?;
    println!("Generated config at {}", path.display());
    println!(
        "  {} example datafeeds: {}",
        template.datafeeds.len(),
        template
            .datafeeds
            .iter()
            .map(|d| d.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!("  Edit [storage], [source] and [[datafeeds]] to match your account.");
    Ok(())
}

pub fn check(path: Option<&Path>, opts: &OutputOptions) -> Result<()> {
    let path = resolve(path);
    if !path.exists() {
        eprintln!("No config file found at {}", path.display());
        eprintln!("Run `feedcost config init` to create one.");
        std::process::exit(1);
    }

    let config = match AppConfig::load_from(&path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {}", e);
            std::process::exit(1);
        }
    };

    let issues = config.validate();

    if opts.format == OutputFormat::Json {
        let report = CheckReport {
            path: path.display().to_string(),
            valid: issues.is_empty(),
            issues: &issues,
        };
        println!("{}", to_json(&report, opts.pretty)?);
        if !issues.is_empty() {
            std::process::exit(1);
        }
        return Ok(());
    }

    if issues.is_empty() {
        println!("Config is valid: {}", path.display());
        println!("  Bucket: {}", config.storage.bucket);
        for dimension in PriceDimension::all() {
            if let Some(price) = config.pricing.get(*dimension) {
                println!("  {}: ${} per {}", dimension, price, dimension.unit());
            }
        }
        if let Ok(feeds) = config.datafeeds() {
            for feed in feeds {
                let functions = if feed.functions.is_empty() {
                    "no functions".to_string()
                } else {
                    feed.functions.join(", ")
                };
                println!("  {} ({}): {}", feed.name, feed.prefix, functions);
            }
        }
    } else {
        eprintln!("Config issues found in {}:", path.display());
        for issue in &issues {
            eprintln!("  - {}", issue);
        }
        std::process::exit(1);
    }
    Ok(())
}

pub fn path(path: Option<&Path>) {
    println!("{}", resolve(path).display());
}
