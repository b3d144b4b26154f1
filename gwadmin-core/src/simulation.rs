//! Traffic simulation: operator input -> `/simulate-traffic` payload.
//!
//! Free-typed counts are sanitized rather than rejected. Plan rate limits are
//! enforced by the gateway; the figures in [`PLAN_PROFILES`] are labels only.

use std::fmt;
use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::api::{ApiClient, ApiError};
use crate::status::{SimulationStatus, StatusSlot};

pub const TOTAL_REQUESTS_MIN: u32 = 1;
pub const TOTAL_REQUESTS_MAX: u32 = 1000;
pub const SERVICE_MIX_MAX: u32 = 100;

pub const STATUS_STARTING: &str = "Starting simulation…";
pub const STATUS_STARTED: &str = "Simulation started!";

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SimulationMode {
    /// Every request is issued at once.
    #[default]
    Burst,
    /// Requests are spread evenly over `duration_seconds`.
    OverTime,
}

/// Body of `POST /simulate-traffic`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationRequest {
    pub total_requests: u32,
    pub pct_heavy: f64,
    pub num_basic_users: u32,
    pub num_premium_users: u32,
    pub mode: SimulationMode,
    /// Ignored by the gateway in burst mode.
    pub duration_seconds: u32,
}

/// Raw simulator controls as the operator left them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationForm {
    /// Slider, nominally 1..=1000.
    pub total_requests: u32,
    /// Heavy share slider in percent, nominally 0..=100.
    pub service_mix: u32,
    pub basic_users: String,
    pub premium_users: String,
    pub mode: SimulationMode,
    pub duration: String,
}

impl Default for SimulationForm {
    fn default() -> Self {
        Self {
            total_requests: 50,
            service_mix: 50,
            basic_users: "5".to_string(),
            premium_users: "5".to_string(),
            mode: SimulationMode::Burst,
            duration: "30".to_string(),
        }
    }
}

impl SimulationForm {
    /// Never fails: out-of-range values are coerced to the nearest valid one.
    #[must_use]
    pub fn build(&self) -> SimulationRequest {
        let mix = self.service_mix.min(SERVICE_MIX_MAX);
        SimulationRequest {
            total_requests: self
                .total_requests
                .clamp(TOTAL_REQUESTS_MIN, TOTAL_REQUESTS_MAX),
            pct_heavy: f64::from(mix) / 100.0,
            num_basic_users: parse_count(&self.basic_users),
            num_premium_users: parse_count(&self.premium_users),
            mode: self.mode,
            duration_seconds: parse_count(&self.duration),
        }
    }

    /// Light share shown next to the mix slider.
    #[must_use]
    pub fn light_pct(&self) -> u32 {
        SERVICE_MIX_MAX - self.service_mix.min(SERVICE_MIX_MAX)
    }
}

/// Keeps only ASCII digits and drops leading zeros; `""` and `"000"` become `"0"`.
pub fn sanitize_count(raw: &str) -> String {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    let trimmed = digits.trim_start_matches('0');
    if trimmed.is_empty() {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Sanitized count, saturating at `u32::MAX`.
pub fn parse_count(raw: &str) -> u32 {
    sanitize_count(raw).parse().unwrap_or(u32::MAX)
}

/// Where a built request is sent.
pub trait SimulationSink: Send + Sync {
    fn submit_simulation(
        &self,
        request: &SimulationRequest,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;
}

impl SimulationSink for ApiClient {
    fn submit_simulation(
        &self,
        request: &SimulationRequest,
    ) -> impl Future<Output = Result<(), ApiError>> + Send {
        ApiClient::submit_simulation(self, request)
    }
}

/// Submits `request`, showing progress and the outcome in `slot`.
///
/// The "starting" notice is visible before the request leaves; the returned
/// result status is the one the slot expires.
pub async fn run_simulation<S: SimulationSink>(
    sink: &S,
    request: &SimulationRequest,
    slot: &StatusSlot,
) -> SimulationStatus {
    slot.show(SimulationStatus::info(STATUS_STARTING));

    let status = match sink.submit_simulation(request).await {
        Ok(()) => {
            tracing::info!(
                total_requests = request.total_requests,
                mode = %request.mode,
                "simulation accepted"
            );
            SimulationStatus::success(STATUS_STARTED)
        }
        Err(err) => {
            tracing::warn!(error = %err, "simulation rejected");
            SimulationStatus::error(format!("Error: {err}"))
        }
    };

    slot.show(status.clone());
    status
}

/// Descriptive rate-limit figures for a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlanProfile {
    pub name: &'static str,
    pub capacity: u32,
    pub refill_per_sec: u32,
}

pub const PLAN_PROFILES: [PlanProfile; 2] = [
    PlanProfile {
        name: "Basic",
        capacity: 5,
        refill_per_sec: 1,
    },
    PlanProfile {
        name: "Premium",
        capacity: 20,
        refill_per_sec: 5,
    },
];

impl fmt::Display for PlanProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: capacity {} req/sec, refill {} req/sec",
            self.name, self.capacity, self.refill_per_sec
        )
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;
    use crate::status::StatusKind;

    #[test]
    fn sanitize_examples() {
        assert_eq!(sanitize_count("007"), "7");
        assert_eq!(sanitize_count("0"), "0");
        assert_eq!(sanitize_count(""), "0");
        assert_eq!(sanitize_count("12a3"), "123");
        assert_eq!(sanitize_count("000"), "0");
        assert_eq!(sanitize_count("-5"), "5");
        assert_eq!(sanitize_count(" 1,024 "), "1024");
        assert_eq!(sanitize_count("٣"), "0");
    }

    #[test]
    fn sanitize_is_idempotent() {
        let inputs = [
            "",
            "0",
            "00",
            "007",
            "12a3",
            "abc",
            "-0",
            "1e9",
            "0x1F",
            "  42 ",
            "0000099999999999999999999999999999999999",
        ];
        for input in inputs {
            let once = sanitize_count(input);
            assert_eq!(sanitize_count(&once), once, "input={input:?}");
        }
    }

    #[test]
    fn parse_count_saturates() {
        assert_eq!(parse_count("abc"), 0);
        assert_eq!(parse_count("0042"), 42);
        assert_eq!(parse_count("99999999999999"), u32::MAX);
    }

    #[test]
    fn slider_thirty_is_point_three() {
        let form = SimulationForm {
            service_mix: 30,
            ..SimulationForm::default()
        };
        assert_eq!(form.build().pct_heavy, 0.3);
        assert_eq!(form.light_pct(), 70);
    }

    #[test]
    fn build_coerces_out_of_range_values() {
        let form = SimulationForm {
            total_requests: 0,
            service_mix: 250,
            basic_users: "0".to_string(),
            premium_users: "150".to_string(),
            mode: SimulationMode::OverTime,
            duration: "12s".to_string(),
        };
        let req = form.build();
        assert_eq!(req.total_requests, 1);
        assert_eq!(req.pct_heavy, 1.0);
        assert_eq!(req.num_basic_users, 0);
        assert_eq!(req.num_premium_users, 150);
        assert_eq!(req.duration_seconds, 12);

        let form = SimulationForm {
            total_requests: 5000,
            ..SimulationForm::default()
        };
        assert_eq!(form.build().total_requests, 1000);
    }

    #[test]
    fn payload_uses_gateway_field_names() -> serde_json::Result<()> {
        let req = SimulationForm::default().build();
        let body = serde_json::to_value(&req)?;
        assert_eq!(
            body,
            serde_json::json!({
                "total_requests": 50,
                "pct_heavy": 0.5,
                "num_basic_users": 5,
                "num_premium_users": 5,
                "mode": "burst",
                "duration_seconds": 30,
            })
        );

        let over_time = SimulationRequest {
            mode: SimulationMode::OverTime,
            ..req
        };
        assert_eq!(serde_json::to_value(&over_time)?["mode"], "over_time");
        Ok(())
    }

    #[test]
    fn mode_parses_from_wire_names() {
        assert_eq!("over_time".parse(), Ok(SimulationMode::OverTime));
        assert_eq!("burst".parse(), Ok(SimulationMode::Burst));
        assert!("ramp".parse::<SimulationMode>().is_err());
    }

    #[test]
    fn plan_profiles_describe_bucket_figures() {
        assert_eq!(
            PLAN_PROFILES[0].to_string(),
            "Basic: capacity 5 req/sec, refill 1 req/sec"
        );
        assert_eq!(
            PLAN_PROFILES[1].to_string(),
            "Premium: capacity 20 req/sec, refill 5 req/sec"
        );
    }

    /// Records what the slot showed at the moment the request was submitted.
    struct RecordingSink {
        slot_seen: Mutex<Option<SimulationStatus>>,
        slot: std::sync::Arc<StatusSlot>,
        outcome: Result<(), ApiError>,
    }

    impl SimulationSink for RecordingSink {
        fn submit_simulation(
            &self,
            _request: &SimulationRequest,
        ) -> impl Future<Output = Result<(), ApiError>> + Send {
            let seen = self.slot.current();
            *self
                .slot_seen
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()) = seen;
            let outcome = self.outcome.clone();
            async move { outcome }
        }
    }

    fn recording_sink(outcome: Result<(), ApiError>) -> (RecordingSink, std::sync::Arc<StatusSlot>) {
        let slot = std::sync::Arc::new(StatusSlot::new(Duration::from_secs(5)));
        let sink = RecordingSink {
            slot_seen: Mutex::new(None),
            slot: slot.clone(),
            outcome,
        };
        (sink, slot)
    }

    #[tokio::test]
    async fn run_shows_starting_notice_before_submitting() {
        let (sink, slot) = recording_sink(Ok(()));
        let status = run_simulation(&sink, &SimulationForm::default().build(), &slot).await;

        let seen = sink
            .slot_seen
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        assert_eq!(seen, Some(SimulationStatus::info("Starting simulation…")));
        assert_eq!(status, SimulationStatus::success("Simulation started!"));
        assert_eq!(slot.current(), Some(status));
    }

    #[tokio::test]
    async fn run_surfaces_raw_api_error_message() {
        let (sink, slot) = recording_sink(Err(ApiError::HttpStatus {
            status: 400,
            text: "Bad Request".to_string(),
            detail: Some("duration_seconds must be > 0 for over_time".to_string()),
        }));
        let status = run_simulation(&sink, &SimulationForm::default().build(), &slot).await;
        assert_eq!(status.kind, StatusKind::Error);
        assert_eq!(status.text, "Error: Bad Request");

        let (sink, slot) = recording_sink(Err(ApiError::Unreachable("connection refused".to_string())));
        let status = run_simulation(&sink, &SimulationForm::default().build(), &slot).await;
        assert_eq!(
            status.text,
            "Error: gateway unreachable: connection refused"
        );
    }
}
