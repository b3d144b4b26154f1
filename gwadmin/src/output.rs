use gwadmin_core::{ApiError, MetricsSnapshot, PlanProfile, SimulationRequest, SimulationStatus, View};

use crate::cli::OutputFormat;

mod human;
mod json;

#[derive(Debug, Clone, Copy)]
pub(crate) enum SessionEvent<'a> {
    LoggedIn { username: &'a str },
    Registered { username: &'a str },
    LoggedOut,
    Status { view: View, gateway_url: &'a str },
}

pub(crate) trait OutputFormatter: Send + Sync {
    fn session(&self, event: SessionEvent<'_>);
    fn metrics(&self, snapshot: &MetricsSnapshot);
    fn poll_error(&self, err: &ApiError);
    /// A transient simulation status shown while the request is in flight.
    fn status(&self, status: &SimulationStatus);
    fn simulation(&self, request: &SimulationRequest, status: &SimulationStatus);
    fn plans(&self, plans: &[PlanProfile]);
}

pub(crate) fn formatter(format: OutputFormat) -> Box<dyn OutputFormatter> {
    match format {
        OutputFormat::HumanReadable => Box::new(human::HumanReadableOutput),
        OutputFormat::Json => Box::new(json::JsonOutput),
    }
}
