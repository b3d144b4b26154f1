use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanCounts {
    pub allowed: u64,
    pub blocked: u64,
}

impl PlanCounts {
    #[must_use]
    pub fn total(&self) -> u64 {
        self.allowed.saturating_add(self.blocked)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Plans {
    pub basic: PlanCounts,
    pub premium: PlanCounts,
}

/// Average upstream latency per service class, in seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Latency {
    pub light: f64,
    pub heavy: f64,
}

/// One read of the gateway's aggregate counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsSnapshot {
    pub plans: Plans,
    pub latency: Latency,
    /// Requests per service class ("light", "heavy").
    pub services: BTreeMap<String, u64>,
    /// Responses per HTTP status code ("200", "429", ...).
    pub status: BTreeMap<String, u64>,
    /// Requests per upstream instance ("light-0", "heavy-1", ...). Older gateways omit it.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub instances: BTreeMap<String, u64>,
}

impl MetricsSnapshot {
    #[must_use]
    pub fn total(&self) -> u64 {
        self.plans.basic.total().saturating_add(self.plans.premium.total())
    }

    #[must_use]
    pub fn blocked(&self) -> u64 {
        self.plans
            .basic
            .blocked
            .saturating_add(self.plans.premium.blocked)
    }

    #[must_use]
    pub fn allowed(&self) -> u64 {
        self.plans
            .basic
            .allowed
            .saturating_add(self.plans.premium.allowed)
    }

    /// Share of blocked requests in percent, one decimal. Zero when nothing was recorded.
    #[must_use]
    pub fn blocked_pct(&self) -> f64 {
        percent(self.blocked(), self.total())
    }

    #[must_use]
    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            total: self.total(),
            allowed: self.allowed(),
            blocked: self.blocked(),
            blocked_pct: self.blocked_pct(),
            light_latency_ms: round1(self.latency.light * 1000.0),
            heavy_latency_ms: round1(self.latency.heavy * 1000.0),
            services: breakdown(&self.services),
            status: breakdown(&self.status),
            instances: breakdown(&self.instances),
        }
    }
}

/// Presentation-ready aggregates derived from a [`MetricsSnapshot`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSummary {
    pub total: u64,
    pub allowed: u64,
    pub blocked: u64,
    pub blocked_pct: f64,
    pub light_latency_ms: f64,
    pub heavy_latency_ms: f64,
    pub services: Vec<BreakdownRow>,
    pub status: Vec<BreakdownRow>,
    pub instances: Vec<BreakdownRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreakdownRow {
    pub label: String,
    pub count: u64,
    /// Share of this row within its breakdown, in percent (one decimal).
    pub share_pct: f64,
}

fn breakdown(counts: &BTreeMap<String, u64>) -> Vec<BreakdownRow> {
    let total = counts.values().fold(0u64, |acc, v| acc.saturating_add(*v));
    counts
        .iter()
        .map(|(label, count)| BreakdownRow {
            label: label.clone(),
            count: *count,
            share_pct: percent(*count, total),
        })
        .collect()
}

fn percent(part: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    round1((part as f64 / total as f64) * 100.0)
}

fn round1(v: f64) -> f64 {
    if !v.is_finite() {
        return 0.0;
    }
    (v * 10.0).round() / 10.0
}
