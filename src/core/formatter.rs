use crate::core::models::window::UsageWindow;

/// Returns "$1.8100". Costs are shown to four decimals so sub-cent
/// components stay visible.
pub fn format_currency(amount: f64) -> String {
    format!("${:.4}", amount)
}

/// Returns a binary-unit size like "100.00 GiB" or "512 B".
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["KiB", "MiB", "GiB", "TiB", "PiB"];
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64;
    let mut unit = "B";
    for next in UNITS {
        if value < 1024.0 {
            break;
        }
        value /= 1024.0;
        unit = next;
    }
    format!("{:.2} {}", value, unit)
}

/// Compact count: "500", "12.5K", "2.0M", "1.3B".
pub fn format_count(count: f64) -> String {
    if count >= 1_000_000_000.0 {
        format!("{:.1}B", count / 1_000_000_000.0)
    } else if count >= 1_000_000.0 {
        format!("{:.1}M", count / 1_000_000.0)
    } else if count >= 1_000.0 {
        format!("{:.1}K", count / 1_000.0)
    } else {
        format!("{}", count.round() as u64)
    }
}

/// Returns "200 ms", "1.50 s", or "n/a" when no duration was recorded.
pub fn format_duration_ms(duration_ms: Option<f64>) -> String {
    match duration_ms {
        None => "n/a".to_string(),
        Some(ms) if ms >= 1000.0 => format!("{:.2} s", ms / 1000.0),
        Some(ms) => format!("{:.0} ms", ms),
    }
}

/// Returns "2026-10-18 12:00 - 2026-10-19 12:00 UTC (24h)".
pub fn format_window(window: &UsageWindow) -> String {
    format!(
        "{} - {} UTC ({}h)",
        window.start.format("%Y-%m-%d %H:%M"),
        window.end.format("%Y-%m-%d %H:%M"),
        window.hours().round() as u64
    )
}

/// Returns "[████░░░░░░░░]" where █ is this feed's share of the grand total.
pub fn format_share_bar(amount: f64, total: f64, width: usize) -> String {
    let share = if total > 0.0 {
        (amount / total).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let filled_blocks = (share * width as f64).round() as usize;
    let empty_blocks = width.saturating_sub(filled_blocks);

    format!("[{}{}]", "█".repeat(filled_blocks), "░".repeat(empty_blocks))
}
