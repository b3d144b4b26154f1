use serde::Serialize;
use std::io::Write as _;

use gwadmin_core::{
    ApiError, MetricsSnapshot, MetricsSummary, PlanProfile, SimulationRequest, SimulationStatus,
};

use super::{OutputFormatter, SessionEvent};

pub(crate) struct JsonOutput;

impl OutputFormatter for JsonOutput {
    fn session(&self, event: SessionEvent<'_>) {
        emit_json_line(&build_session_line(event));
    }

    fn metrics(&self, snapshot: &MetricsSnapshot) {
        emit_json_line(&JsonMetricsLine {
            kind: "metrics",
            summary: snapshot.summary(),
        });
    }

    fn poll_error(&self, err: &ApiError) {
        emit_json_line(&JsonErrorLine {
            kind: "poll_error",
            message: err.to_string(),
            status: err.status(),
            detail: err.detail(),
        });
    }

    fn status(&self, status: &SimulationStatus) {
        emit_json_line(&JsonStatusLine {
            kind: "status",
            status,
        });
    }

    fn simulation(&self, request: &SimulationRequest, status: &SimulationStatus) {
        emit_json_line(&JsonSimulationLine {
            kind: "simulation",
            request,
            status,
        });
    }

    fn plans(&self, plans: &[PlanProfile]) {
        emit_json_line(&JsonPlansLine {
            kind: "plans",
            plans,
        });
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonSessionLine<'a> {
    pub kind: &'static str,
    pub event: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authenticated: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway_url: Option<&'a str>,
}

fn build_session_line(event: SessionEvent<'_>) -> JsonSessionLine<'_> {
    let line = JsonSessionLine {
        kind: "session",
        event: "",
        username: None,
        authenticated: None,
        gateway_url: None,
    };
    match event {
        SessionEvent::LoggedIn { username } => JsonSessionLine {
            event: "logged_in",
            username: Some(username),
            ..line
        },
        SessionEvent::Registered { username } => JsonSessionLine {
            event: "registered",
            username: Some(username),
            ..line
        },
        SessionEvent::LoggedOut => JsonSessionLine {
            event: "logged_out",
            ..line
        },
        SessionEvent::Status { view, gateway_url } => JsonSessionLine {
            event: "status",
            authenticated: Some(view == gwadmin_core::View::Dashboard),
            gateway_url: Some(gateway_url),
            ..line
        },
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonMetricsLine {
    pub kind: &'static str,
    #[serde(flatten)]
    pub summary: MetricsSummary,
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonErrorLine<'a> {
    pub kind: &'static str,
    pub message: String,
    pub status: Option<u16>,
    pub detail: Option<&'a str>,
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonStatusLine<'a> {
    pub kind: &'static str,
    pub status: &'a SimulationStatus,
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonSimulationLine<'a> {
    pub kind: &'static str,
    pub request: &'a SimulationRequest,
    pub status: &'a SimulationStatus,
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonPlansLine<'a> {
    pub kind: &'static str,
    pub plans: &'a [PlanProfile],
}

fn emit_json_line<T: Serialize>(line: &T) {
    let mut out = std::io::stdout().lock();
    if serde_json::to_writer(&mut out, line).is_ok() {
        let _ = writeln!(out);
    }
}
