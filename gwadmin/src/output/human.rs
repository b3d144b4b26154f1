use std::fmt::Write as _;

use gwadmin_core::{
    ApiError, BreakdownRow, MetricsSnapshot, PlanProfile, SimulationRequest, SimulationStatus,
    StatusKind, View,
};

mod format;

use format::{format_bar, format_ms, format_pct};

use super::{OutputFormatter, SessionEvent};

pub(crate) struct HumanReadableOutput;

impl OutputFormatter for HumanReadableOutput {
    fn session(&self, event: SessionEvent<'_>) {
        println!("{}", render_session(event));
    }

    fn metrics(&self, snapshot: &MetricsSnapshot) {
        println!("{}", render_metrics(snapshot));
    }

    fn poll_error(&self, err: &ApiError) {
        eprintln!("metrics refresh failed: {err}");
    }

    fn status(&self, status: &SimulationStatus) {
        println!("{}", render_status(status));
    }

    fn simulation(&self, request: &SimulationRequest, status: &SimulationStatus) {
        println!(
            "{} requests, {} heavy, {} basic / {} premium users, {}",
            request.total_requests,
            format_pct(request.pct_heavy * 100.0),
            request.num_basic_users,
            request.num_premium_users,
            request.mode
        );
        println!("{}", render_status(status));
    }

    fn plans(&self, plans: &[PlanProfile]) {
        for plan in plans {
            println!("{plan}");
        }
    }
}

fn render_session(event: SessionEvent<'_>) -> String {
    match event {
        SessionEvent::LoggedIn { username } => format!("Logged in as {username}"),
        SessionEvent::Registered { username } => {
            format!("Registered {username}. You can now log in.")
        }
        SessionEvent::LoggedOut => "Logged out".to_string(),
        SessionEvent::Status { view, gateway_url } => match view {
            View::Dashboard => format!("Logged in to {gateway_url}"),
            View::Login => format!("Not logged in to {gateway_url}"),
        },
    }
}

fn render_status(status: &SimulationStatus) -> String {
    let marker = match status.kind {
        StatusKind::Info => "…",
        StatusKind::Success => "✓",
        StatusKind::Error => "✗",
    };
    format!("{marker} {}", status.text)
}

fn render_metrics(snapshot: &MetricsSnapshot) -> String {
    let summary = snapshot.summary();
    let mut out = String::new();

    let _ = writeln!(out, "Total requests   {}", summary.total);
    let _ = writeln!(
        out,
        "Blocked          {} ({})",
        summary.blocked,
        format_pct(summary.blocked_pct)
    );
    let _ = writeln!(out, "Light latency    {}", format_ms(summary.light_latency_ms));
    let _ = writeln!(out, "Heavy latency    {}", format_ms(summary.heavy_latency_ms));

    render_breakdown(&mut out, "Requests by Service", &summary.services);
    render_breakdown(&mut out, "Status Codes", &summary.status);
    if !summary.instances.is_empty() {
        render_breakdown(&mut out, "Requests by Server", &summary.instances);
    }

    out.truncate(out.trim_end().len());
    out
}

fn render_breakdown(out: &mut String, title: &str, rows: &[BreakdownRow]) {
    let _ = writeln!(out);
    let _ = writeln!(out, "{title}");
    if rows.is_empty() {
        let _ = writeln!(out, "  (none)");
        return;
    }

    let label_width = rows.iter().map(|r| r.label.len()).max().unwrap_or(0);
    for row in rows {
        let _ = writeln!(
            out,
            "  {:<label_width$}  {}  {} ({})",
            row.label,
            format_bar(row.share_pct),
            row.count,
            format_pct(row.share_pct)
        );
    }
}
