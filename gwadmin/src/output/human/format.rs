const BAR_WIDTH: usize = 24;

/// Horizontal bar for a share in percent.
pub(crate) fn format_bar(share_pct: f64) -> String {
    let share = if share_pct.is_finite() {
        share_pct.clamp(0.0, 100.0)
    } else {
        0.0
    };
    let filled = ((share / 100.0) * BAR_WIDTH as f64).round() as usize;
    let mut bar = "█".repeat(filled);
    bar.push_str(&"░".repeat(BAR_WIDTH - filled));
    bar
}

pub(crate) fn format_ms(ms: f64) -> String {
    if ms.is_finite() {
        format!("{ms:.1} ms")
    } else {
        "-".to_string()
    }
}

pub(crate) fn format_pct(pct: f64) -> String {
    if pct.is_finite() {
        format!("{pct:.1}%")
    } else {
        "0.0%".to_string()
    }
}
