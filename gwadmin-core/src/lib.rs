#![forbid(unsafe_code)]

mod api;
mod config;
mod console;
mod credential;
mod metrics;
mod poller;
mod session;
mod simulation;
mod status;
mod storage;

pub use api::{ApiClient, ApiError, Credentials, GatewayUrls, LoginResponse};
pub use config::{
    ConfigError, ConsoleConfig, CredentialEncoding, DEFAULT_GATEWAY_URL, DEFAULT_POLL_INTERVAL,
    DEFAULT_STATUS_TTL, TOKEN_SLOT,
};
pub use console::{Console, ConsoleError, Dashboard, View};
pub use credential::Credential;
pub use metrics::{BreakdownRow, Latency, MetricsSnapshot, MetricsSummary, PlanCounts, Plans};
pub use poller::{MetricsPoller, MetricsSource, PollSubscription, PollerState};
pub use session::{AuthError, SessionStore};
pub use simulation::{
    PLAN_PROFILES, PlanProfile, STATUS_STARTED, STATUS_STARTING, SimulationForm, SimulationMode,
    SimulationRequest, SimulationSink, TOTAL_REQUESTS_MAX, TOTAL_REQUESTS_MIN, parse_count, run_simulation, sanitize_count,
};
pub use status::{SimulationStatus, StatusKind, StatusSlot};
pub use storage::{CredentialStorage, FileStorage, MemoryStorage, StorageError};
