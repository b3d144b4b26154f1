use clap::{Args, Parser, Subcommand};
use gwadmin_core::{
    ConsoleConfig, CredentialEncoding, DEFAULT_GATEWAY_URL, SimulationForm, SimulationMode,
};
use std::path::PathBuf;
use std::time::Duration;

fn parse_duration(input: &str) -> Result<Duration, String> {
    let s = input.trim();
    if s.is_empty() {
        return Err("duration cannot be empty (expected e.g. 5s, 250ms, 1m)".to_string());
    }
    humantime::parse_duration(s).map_err(|err| format!("invalid duration '{s}': {err}"))
}

fn parse_mode(input: &str) -> Result<SimulationMode, String> {
    input
        .trim()
        .replace('-', "_")
        .parse()
        .map_err(|_| format!("invalid mode '{input}' (expected burst or over_time)"))
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text.
    HumanReadable,
    /// One JSON object per line (NDJSON) on stdout.
    Json,
}

#[derive(Debug, Parser)]
#[command(
    name = "gwadmin",
    author,
    version,
    about = "Administration console for the API gateway",
    long_about = "gwadmin authenticates against the API gateway, shows its aggregate traffic metrics and injects synthetic traffic to observe rate limiting and load balancing.\n\nThe session token is persisted between invocations; run `gwadmin login` once and the other commands reuse it until `gwadmin logout`.",
    after_help = "Examples:\n  gwadmin register --username admin --password secret\n  gwadmin login --username admin --password secret\n  gwadmin watch --ticks 3\n  gwadmin simulate --total 200 --heavy-pct 30 --premium-users 2\n  gwadmin simulate --mode over_time --duration 60 --output json"
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Args)]
pub struct GlobalArgs {
    /// Gateway base URL
    #[arg(long, global = true, env = "GWADMIN_GATEWAY_URL", default_value = DEFAULT_GATEWAY_URL)]
    pub gateway_url: String,

    /// Directory holding the persisted session token (defaults to the platform data dir)
    #[arg(long, global = true, env = "GWADMIN_TOKEN_DIR")]
    pub token_dir: Option<PathBuf>,

    /// Metrics polling interval (e.g. 5s, 500ms)
    #[arg(long, global = true, env = "GWADMIN_POLL_INTERVAL", default_value = "5s", value_parser = parse_duration)]
    pub poll_interval: Duration,

    /// Per-request timeout
    #[arg(long, global = true, env = "GWADMIN_TIMEOUT", default_value = "10s", value_parser = parse_duration)]
    pub timeout: Duration,

    /// Send login/register credentials as query parameters instead of a JSON body
    #[arg(long, global = true)]
    pub credentials_in_query: bool,

    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::HumanReadable)]
    pub output: OutputFormat,

    /// Log at debug level (overridden by GWADMIN_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

impl GlobalArgs {
    pub fn console_config(&self) -> ConsoleConfig {
        let encoding = if self.credentials_in_query {
            CredentialEncoding::Query
        } else {
            CredentialEncoding::Json
        };

        let mut config = ConsoleConfig::default()
            .with_gateway_url(self.gateway_url.clone())
            .with_poll_interval(self.poll_interval)
            .with_credential_encoding(encoding);
        config.request_timeout = Some(self.timeout);
        if let Some(dir) = &self.token_dir {
            config = config.with_token_dir(dir);
        }
        config
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Log in and persist the session token
    Login(CredentialArgs),

    /// Create an operator account (does not log in)
    Register(CredentialArgs),

    /// End the session and remove the persisted token
    Logout,

    /// Show whether a session is active
    Status,

    /// Fetch and print the gateway's metrics once
    Metrics,

    /// Poll the gateway's metrics and print every snapshot
    Watch(WatchArgs),

    /// Reset the gateway's counters and print the zeroed metrics
    Clear,

    /// Ask the gateway to generate synthetic traffic
    #[command(
        long_about = "Ask the gateway to generate synthetic traffic against its light and heavy services.\n\nUser counts and duration are free text: non-digits are dropped (\"1,000\" -> 1000) and an empty value means 0. The total is clamped to 1..=1000 and the heavy share to 0..=100."
    )]
    Simulate(SimulateArgs),

    /// Describe the plans' rate-limit figures
    Plans,
}

#[derive(Debug, Args)]
pub struct CredentialArgs {
    #[arg(long, short)]
    pub username: String,

    #[arg(long, short, env = "GWADMIN_PASSWORD", hide_env_values = true)]
    pub password: String,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Stop after this many snapshots (runs until Ctrl-C otherwise)
    #[arg(long)]
    pub ticks: Option<u64>,
}

#[derive(Debug, Args)]
pub struct SimulateArgs {
    /// Total requests (1-1000)
    #[arg(long, default_value_t = 50)]
    pub total: u32,

    /// Share of requests sent to the heavy service, in percent (0-100)
    #[arg(long, default_value_t = 50)]
    pub heavy_pct: u32,

    /// Number of simulated basic-plan users
    #[arg(long, default_value = "5")]
    pub basic_users: String,

    /// Number of simulated premium-plan users
    #[arg(long, default_value = "5")]
    pub premium_users: String,

    /// burst or over_time
    #[arg(long, default_value = "burst", value_parser = parse_mode)]
    pub mode: SimulationMode,

    /// Seconds to spread the requests over (over_time only)
    #[arg(long, default_value = "30")]
    pub duration: String,
}

impl SimulateArgs {
    pub fn form(&self) -> SimulationForm {
        SimulationForm {
            total_requests: self.total,
            service_mix: self.heavy_pct,
            basic_users: self.basic_users.clone(),
            premium_users: self.premium_users.clone(),
            mode: self.mode,
            duration: self.duration.clone(),
        }
    }
}
