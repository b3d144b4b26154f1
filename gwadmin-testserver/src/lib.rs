//! In-process fake of the API gateway's admin surface.
//!
//! Implements `/login`, `/register`, `/metrics`, `/metrics/clear` and
//! `/simulate-traffic` with the gateway's status codes and error bodies.
//! Simulated traffic is recorded synchronously (every request allowed, spread
//! round-robin over two instances per service) so tests can observe it with the
//! next `/metrics` read.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use axum::Router;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

pub const PATH_LOGIN: &str = "/login";
pub const PATH_REGISTER: &str = "/register";
pub const PATH_METRICS: &str = "/metrics";
pub const PATH_METRICS_CLEAR: &str = "/metrics/clear";
pub const PATH_SIMULATE_TRAFFIC: &str = "/simulate-traffic";

const STATUS_CODES: [&str; 4] = ["200", "429", "400", "500"];
const INSTANCES_PER_SERVICE: u64 = 2;
const LIGHT_LATENCY_SECS: f64 = 0.012;
const HEAVY_LATENCY_SECS: f64 = 0.250;

#[derive(Debug, Clone, Default)]
pub struct TestServerStats {
    requests_total: Arc<AtomicU64>,
    login_requests: Arc<AtomicU64>,
    metrics_requests: Arc<AtomicU64>,
    simulations: Arc<AtomicU64>,
    saw_query_credentials: Arc<AtomicU64>,
}

impl TestServerStats {
    fn inc(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn requests_total(&self) -> u64 {
        self.requests_total.load(Ordering::Relaxed)
    }

    pub fn login_requests(&self) -> u64 {
        self.login_requests.load(Ordering::Relaxed)
    }

    pub fn metrics_requests(&self) -> u64 {
        self.metrics_requests.load(Ordering::Relaxed)
    }

    /// Accepted `/simulate-traffic` requests.
    pub fn simulations(&self) -> u64 {
        self.simulations.load(Ordering::Relaxed)
    }

    /// `/login` or `/register` calls that carried credentials as query parameters.
    pub fn saw_query_credentials(&self) -> u64 {
        self.saw_query_credentials.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Plan {
    Basic,
    Premium,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Service {
    Light,
    Heavy,
}

impl Service {
    fn label(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Heavy => "heavy",
        }
    }

    fn latency(self) -> f64 {
        match self {
            Self::Light => LIGHT_LATENCY_SECS,
            Self::Heavy => HEAVY_LATENCY_SECS,
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct ServiceCounters {
    requests: u64,
    latency_sum: f64,
    round_robin: u64,
    per_instance: [u64; INSTANCES_PER_SERVICE as usize],
}

#[derive(Debug, Default)]
struct Counters {
    basic: (u64, u64),
    premium: (u64, u64),
    light: ServiceCounters,
    heavy: ServiceCounters,
    status: BTreeMap<String, u64>,
}

impl Counters {
    fn record_allowed(&mut self, plan: Plan, service: Service) {
        match plan {
            Plan::Basic => self.basic.0 += 1,
            Plan::Premium => self.premium.0 += 1,
        }

        let svc = match service {
            Service::Light => &mut self.light,
            Service::Heavy => &mut self.heavy,
        };
        svc.round_robin += 1;
        let idx = (svc.round_robin % INSTANCES_PER_SERVICE) as usize;
        svc.per_instance[idx] += 1;
        svc.requests += 1;
        svc.latency_sum += service.latency();

        *self.status.entry("200".to_string()).or_insert(0) += 1;
    }

    fn to_json(&self) -> serde_json::Value {
        let avg = |s: &ServiceCounters| {
            if s.requests == 0 {
                0.0
            } else {
                s.latency_sum / s.requests as f64
            }
        };

        let status: BTreeMap<&str, u64> = STATUS_CODES
            .iter()
            .map(|code| (*code, self.status.get(*code).copied().unwrap_or(0)))
            .collect();

        let mut instances = BTreeMap::new();
        for (service, counters) in [(Service::Light, &self.light), (Service::Heavy, &self.heavy)] {
            for (idx, count) in counters.per_instance.iter().enumerate() {
                instances.insert(format!("{}-{idx}", service.label()), *count);
            }
        }

        json!({
            "plans": {
                "basic": {"allowed": self.basic.0, "blocked": self.basic.1},
                "premium": {"allowed": self.premium.0, "blocked": self.premium.1},
            },
            "services": {"light": self.light.requests, "heavy": self.heavy.requests},
            "status": status,
            "latency": {"light": avg(&self.light), "heavy": avg(&self.heavy)},
            "instances": instances,
        })
    }
}

#[derive(Debug, Default)]
struct GatewayState {
    users: HashMap<String, String>,
    tokens: HashSet<String>,
    issued: u64,
    counters: Counters,
}

/// Shared state behind the fake gateway's routes.
#[derive(Debug, Clone, Default)]
pub struct Gateway {
    state: Arc<Mutex<GatewayState>>,
    stats: TestServerStats,
    fail_metrics: Arc<AtomicU64>,
    fail_logins: Arc<AtomicU64>,
}

impl Gateway {
    pub fn stats(&self) -> &TestServerStats {
        &self.stats
    }

    /// Registers a user as if `/register` had been called.
    pub fn seed_user(&self, username: &str, password: &str) {
        self.lock()
            .users
            .insert(username.to_string(), password.to_string());
    }

    /// The next `n` `/metrics` reads answer 500.
    pub fn fail_next_metrics(&self, n: u64) {
        self.fail_metrics.store(n, Ordering::SeqCst);
    }

    /// The next `n` `/login` calls answer 500 without a `detail`.
    pub fn fail_next_logins(&self, n: u64) {
        self.fail_logins.store(n, Ordering::SeqCst);
    }

    /// Forgets every issued token, as a gateway restart with a new signing key would.
    pub fn revoke_tokens(&self) {
        self.lock().tokens.clear();
    }

    fn lock(&self) -> MutexGuard<'_, GatewayState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn take_failure(counter: &AtomicU64) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn authorized(&self, headers: &HeaderMap) -> bool {
        let Some(token) = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
        else {
            return false;
        };
        self.lock().tokens.contains(token)
    }
}

fn detail(status: StatusCode, message: &str) -> Response {
    (status, axum::Json(json!({ "detail": message }))).into_response()
}

fn validation_error(message: String) -> Response {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        axum::Json(json!({ "detail": [{ "msg": message }] })),
    )
        .into_response()
}

fn unauthorized() -> Response {
    detail(StatusCode::UNAUTHORIZED, "Could not validate credentials")
}

#[derive(Debug, Deserialize)]
struct CredentialsBody {
    username: String,
    password: String,
}

/// Query parameters win; otherwise a JSON body is expected.
fn credentials(
    stats: &TestServerStats,
    query: &HashMap<String, String>,
    body: &Bytes,
) -> Result<CredentialsBody, Response> {
    if let (Some(username), Some(password)) = (query.get("username"), query.get("password")) {
        TestServerStats::inc(&stats.saw_query_credentials);
        return Ok(CredentialsBody {
            username: username.clone(),
            password: password.clone(),
        });
    }
    serde_json::from_slice(body).map_err(|err| validation_error(err.to_string()))
}

async fn handle_register(
    State(gw): State<Gateway>,
    Query(query): Query<HashMap<String, String>>,
    body: Bytes,
) -> Response {
    TestServerStats::inc(&gw.stats.requests_total);
    let creds = match credentials(&gw.stats, &query, &body) {
        Ok(v) => v,
        Err(res) => return res,
    };

    let mut state = gw.lock();
    if state.users.contains_key(&creds.username) {
        return detail(StatusCode::BAD_REQUEST, "User already exists");
    }
    state.users.insert(creds.username, creds.password);
    (
        StatusCode::CREATED,
        axum::Json(json!({ "message": "User registered" })),
    )
        .into_response()
}

async fn handle_login(
    State(gw): State<Gateway>,
    Query(query): Query<HashMap<String, String>>,
    body: Bytes,
) -> Response {
    TestServerStats::inc(&gw.stats.requests_total);
    TestServerStats::inc(&gw.stats.login_requests);
    if Gateway::take_failure(&gw.fail_logins) {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    let creds = match credentials(&gw.stats, &query, &body) {
        Ok(v) => v,
        Err(res) => return res,
    };

    let mut state = gw.lock();
    if state.users.get(&creds.username) != Some(&creds.password) {
        return detail(StatusCode::UNAUTHORIZED, "Invalid credentials");
    }

    state.issued += 1;
    let token = format!("tok-{}-{}", creds.username, state.issued);
    state.tokens.insert(token.clone());
    axum::Json(json!({ "access_token": token, "token_type": "bearer" })).into_response()
}

async fn handle_metrics(State(gw): State<Gateway>, headers: HeaderMap) -> Response {
    TestServerStats::inc(&gw.stats.requests_total);
    TestServerStats::inc(&gw.stats.metrics_requests);
    if !gw.authorized(&headers) {
        return unauthorized();
    }
    if Gateway::take_failure(&gw.fail_metrics) {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    let body = gw.lock().counters.to_json();
    axum::Json(body).into_response()
}

async fn handle_metrics_clear(State(gw): State<Gateway>, headers: HeaderMap) -> Response {
    TestServerStats::inc(&gw.stats.requests_total);
    if !gw.authorized(&headers) {
        return unauthorized();
    }

    gw.lock().counters = Counters::default();
    axum::Json(json!({ "message": "Metrics cleared" })).into_response()
}

#[derive(Debug, Deserialize)]
struct TrafficPayload {
    total_requests: u64,
    pct_heavy: f64,
    num_basic_users: u64,
    num_premium_users: u64,
    mode: String,
    #[serde(default)]
    duration_seconds: u64,
}

impl TrafficPayload {
    fn validate(&self) -> Result<(), String> {
        if self.total_requests < 1 {
            return Err("total_requests must be >= 1".to_string());
        }
        if !(0.0..=1.0).contains(&self.pct_heavy) {
            return Err("pct_heavy must be within [0, 1]".to_string());
        }
        if self.mode != "burst" && self.mode != "over_time" {
            return Err("mode must match ^(burst|over_time)$".to_string());
        }
        Ok(())
    }

    /// Heavy requests first, premium users first, as the real gateway composes its workload.
    fn workload(&self) -> impl Iterator<Item = (Plan, Service)> + '_ {
        let users = self.num_basic_users + self.num_premium_users;
        let total = self.total_requests;
        let heavy = (total as f64 * self.pct_heavy) as u64;
        let premium = if users == 0 {
            0
        } else {
            (total as f64 * (self.num_premium_users as f64 / users as f64)) as u64
        };

        (0..total)
            .filter(move |_| users > 0)
            .map(move |i| {
                let service = if i < heavy {
                    Service::Heavy
                } else {
                    Service::Light
                };
                let plan = if i < premium {
                    Plan::Premium
                } else {
                    Plan::Basic
                };
                (plan, service)
            })
    }
}

async fn handle_simulate_traffic(
    State(gw): State<Gateway>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    TestServerStats::inc(&gw.stats.requests_total);
    if !gw.authorized(&headers) {
        return unauthorized();
    }

    let payload: TrafficPayload = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(err) => return validation_error(err.to_string()),
    };
    if let Err(msg) = payload.validate() {
        return validation_error(msg);
    }
    if payload.mode == "over_time" && payload.duration_seconds == 0 {
        return detail(
            StatusCode::BAD_REQUEST,
            "duration_seconds must be > 0 for over_time",
        );
    }

    {
        let mut state = gw.lock();
        for (plan, service) in payload.workload() {
            state.counters.record_allowed(plan, service);
        }
    }
    TestServerStats::inc(&gw.stats.simulations);

    axum::Json(json!({
        "message": format!("Simulating {} requests ({})", payload.total_requests, payload.mode)
    }))
    .into_response()
}

pub fn router(gateway: Gateway) -> Router {
    Router::new()
        .route(PATH_REGISTER, post(handle_register))
        .route(PATH_LOGIN, post(handle_login))
        .route(PATH_METRICS, get(handle_metrics))
        .route(PATH_METRICS_CLEAR, post(handle_metrics_clear))
        .route(PATH_SIMULATE_TRAFFIC, post(handle_simulate_traffic))
        .with_state(gateway)
}

pub struct TestServer {
    base_url: String,
    gateway: Gateway,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl TestServer {
    pub async fn start() -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let gateway = Gateway::default();
        let app = router(gateway.clone());

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            });
            let _ = serve.await;
        });

        Ok(Self {
            base_url: format!("http://{addr}"),
            gateway,
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    pub fn stats(&self) -> &TestServerStats {
        self.gateway.stats()
    }

    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if self.shutdown_tx.is_some()
            && let Some(task) = self.task.take()
        {
            task.abort();
        }
    }
}
