use colored::{control, Colorize};

use crate::core::formatter::{
    format_bytes, format_count, format_currency, format_duration_ms, format_share_bar,
    format_window,
};
use crate::core::models::cost::{sum_amounts, CostComponent, CostPass, DatafeedCostReport};
use crate::core::models::usage::FeedUsage;

const BAR_WIDTH: usize = 12;

/// Render one aggregation pass as a colored (or plain) string.
///
/// Layout:
/// ```text
///  Datafeed costs  2026-10-18 12:00 - 2026-10-19 12:00 UTC (24h)
///   Datafeed            Stored   Objects    Requests     Compute       Total
///   orders        100.00 GiB         4     $0.8000     $0.9333     $1.8100  [████████████]
///   clicks         10.00 GiB         1     $0.0500     $0.0000     $0.0577  [░░░░░░░░░░░░]
///
///  orders  $1.8100
///   Storage       $0.0767  100.00 GiB in 4 objects, $2.3000/month
///   PUT requests  $0.0000  no data
///   GET requests  $0.8000  2.0M requests
///   Invocations   $0.1000  500.0K invocations
///   Compute       $0.8333  50.0K GB-s
///     orders-processor  500.0K calls  200 ms  512 MB  $0.9333
///
///  Total  $1.8677 across 2 datafeeds
/// ```
pub fn render_pass(pass: &CostPass, use_color: bool) -> String {
    control::set_override(use_color);

    let mut sections: Vec<String> = Vec::new();
    let grand_total = pass.total_cost();

    let mut summary = vec![format!(
        " {}  {}",
        "Datafeed costs".bold(),
        format_window(&pass.window).dimmed()
    )];
    let name_width = pass
        .reports
        .iter()
        .map(|r| r.datafeed().chars().count())
        .max()
        .unwrap_or(0)
        .max(12);
    summary.push(format!(
        "  {:<width$}  {:>12}  {:>8}  {:>10}  {:>10}  {:>10}",
        "Datafeed",
        "Stored",
        "Objects",
        "Requests",
        "Compute",
        "Total",
        width = name_width
    ));
    for report in &pass.reports {
        let storage = report.usage().storage.as_ref();
        let requests = report.component(CostComponent::PutRequests)
            + report.component(CostComponent::GetRequests);
        let compute = report.component(CostComponent::Invocations)
            + report.component(CostComponent::Compute);
        summary.push(format!(
            "  {}  {:>12}  {:>8}  {:>10}  {:>10}  {}  {}",
            format!("{:<width$}", report.datafeed(), width = name_width).cyan(),
            storage.map(|s| format_bytes(s.total_bytes)).unwrap_or_default(),
            storage.map(|s| s.object_count.to_string()).unwrap_or_default(),
            format_currency(requests),
            format_currency(compute),
            format!("{:>10}", format_currency(report.total())).green(),
            format_share_bar(report.total(), grand_total, BAR_WIDTH).magenta()
        ));
    }
    if pass.reports.is_empty() {
        summary.push(format!("  {}", "No datafeeds".dimmed()));
    }
    sections.push(summary.join("\n"));

    for report in &pass.reports {
        sections.push(render_report(report));
    }

    let count = pass.reports.len();
    let mut footer = format!(
        " {}  {} across {} datafeed{}",
        "Total".bold(),
        format_currency(grand_total).green().bold(),
        count,
        if count == 1 { "" } else { "s" }
    );
    let warnings = pass.warning_count();
    if warnings > 0 {
        footer.push_str(&format!(
            "  {}",
            format!(
                "({} warning{})",
                warnings,
                if warnings == 1 { "" } else { "s" }
            )
            .yellow()
        ));
    }
    sections.push(footer);

    sections.join("\n\n")
}

/// Per-feed breakdown block. Expects `control::set_override` to be set.
fn render_report(report: &DatafeedCostReport) -> String {
    let mut lines = vec![format!(
        " {}  {}",
        report.datafeed().bold(),
        format_currency(report.total()).green()
    )];

    for (component, amount) in report.components() {
        let detail = component_detail(*component, report.usage());
        lines.push(format!(
            "  {}  {}  {}",
            format!("{:<12}", component.display_name()).cyan(),
            format!("{:>10}", format_currency(*amount)),
            detail.dimmed()
        ));
        if *component == CostComponent::Compute {
            for function in &report.usage().functions {
                let memory = function
                    .memory_mb
                    .map(|m| format!("{} MB", m))
                    .unwrap_or_else(|| "n/a".to_string());
                lines.push(format!(
                    "    {}  {} calls  {}  {}  {}",
                    function.name,
                    format_count(function.invocations),
                    format_duration_ms(function.avg_duration_ms),
                    memory,
                    format_currency(function.invocation_cost + function.compute_cost)
                ));
            }
        }
    }

    for warning in report.warnings() {
        lines.push(format!("  {} {}", "!".yellow().bold(), warning.to_string().yellow()));
    }

    lines.join("\n")
}

fn component_detail(component: CostComponent, usage: &FeedUsage) -> String {
    let requests = |count: Option<f64>| match count {
        Some(n) => format!("{} requests", format_count(n)),
        None => "no data".to_string(),
    };
    match component {
        CostComponent::Storage => match &usage.storage {
            Some(storage) => format!(
                "{} in {} object{}, {}/month",
                format_bytes(storage.total_bytes),
                storage.object_count,
                if storage.object_count == 1 { "" } else { "s" },
                format_currency(storage.monthly_storage_cost)
            ),
            None => String::new(),
        },
        CostComponent::PutRequests => {
            requests(usage.storage.as_ref().and_then(|s| s.put_requests))
        }
        CostComponent::GetRequests => {
            requests(usage.storage.as_ref().and_then(|s| s.get_requests))
        }
        CostComponent::Invocations => {
            let total = sum_amounts(usage.functions.iter().map(|f| f.invocations));
            format!("{} invocations", format_count(total))
        }
        CostComponent::Compute => {
            let total = sum_amounts(usage.functions.iter().map(|f| f.gb_seconds));
            format!("{} GB-s", format_count(total))
        }
    }
}
