use std::path::Path;
use std::process::{Command, Output};

use anyhow::Context as _;
use gwadmin_testserver::TestServer;
use serde_json::Value;

const EXIT_AUTH_FAILED: i32 = 20;
const EXIT_GATEWAY_ERROR: i32 = 21;
const EXIT_INVALID_INPUT: i32 = 30;

async fn gwadmin(base_url: &str, token_dir: &Path, args: &[&str]) -> anyhow::Result<Output> {
    let exe = env!("CARGO_BIN_EXE_gwadmin");
    let base_url = base_url.to_string();
    let token_dir = token_dir.to_path_buf();
    let args: Vec<String> = args.iter().map(|a| (*a).to_string()).collect();

    tokio::task::spawn_blocking(move || {
        Command::new(exe)
            .args(&args)
            .env("GWADMIN_GATEWAY_URL", &base_url)
            .env("GWADMIN_TOKEN_DIR", &token_dir)
            .env_remove("GWADMIN_PASSWORD")
            .env_remove("GWADMIN_LOG")
            .output()
    })
    .await
    .context("join gwadmin process")?
    .context("run gwadmin")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn json_lines(output: &Output) -> anyhow::Result<Vec<Value>> {
    stdout(output)
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str(l).with_context(|| format!("parse json line: {l}")))
        .collect()
}

#[tokio::test(flavor = "multi_thread")]
async fn e2e_login_metrics_simulate_logout() -> anyhow::Result<()> {
    let server = TestServer::start().await.context("start test server")?;
    server.gateway().seed_user("admin", "secret");
    let dir = tempfile::tempdir()?;
    let url = server.base_url().to_string();

    let out = gwadmin(&url, dir.path(), &["login", "-u", "admin", "-p", "secret"]).await?;
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    assert!(stdout(&out).contains("Logged in as admin"));
    assert!(dir.path().join("token").exists());

    let out = gwadmin(
        &url,
        dir.path(),
        &["simulate", "--total", "10", "--heavy-pct", "20", "--output", "json"],
    )
    .await?;
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    let lines = json_lines(&out)?;
    assert_eq!(lines.len(), 2, "{}", stdout(&out));
    assert_eq!(lines[0].get("kind").and_then(Value::as_str), Some("status"));
    assert_eq!(
        lines[0].pointer("/status/kind").and_then(Value::as_str),
        Some("info")
    );
    assert_eq!(
        lines[0].pointer("/status/text").and_then(Value::as_str),
        Some("Starting simulation…")
    );
    assert_eq!(lines[1].get("kind").and_then(Value::as_str), Some("simulation"));
    assert_eq!(
        lines[1].pointer("/status/text").and_then(Value::as_str),
        Some("Simulation started!")
    );

    let out = gwadmin(&url, dir.path(), &["metrics", "--output", "json"]).await?;
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    let lines = json_lines(&out)?;
    assert_eq!(lines[0].get("kind").and_then(Value::as_str), Some("metrics"));
    assert_eq!(lines[0].get("total").and_then(Value::as_u64), Some(10));

    let out = gwadmin(&url, dir.path(), &["clear"]).await?;
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    assert!(stdout(&out).contains("Total requests   0"), "{}", stdout(&out));

    let out = gwadmin(&url, dir.path(), &["logout"]).await?;
    assert!(out.status.success());
    assert!(!dir.path().join("token").exists());

    let out = gwadmin(&url, dir.path(), &["metrics"]).await?;
    assert_eq!(out.status.code(), Some(EXIT_AUTH_FAILED));
    assert!(stderr(&out).contains("not logged in"));

    server.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn e2e_invalid_credentials_exit_code_and_message() -> anyhow::Result<()> {
    let server = TestServer::start().await.context("start test server")?;
    server.gateway().seed_user("admin", "secret");
    let dir = tempfile::tempdir()?;

    let out = gwadmin(
        server.base_url(),
        dir.path(),
        &["login", "-u", "admin", "-p", "wrong"],
    )
    .await?;
    assert_eq!(out.status.code(), Some(EXIT_AUTH_FAILED));
    assert_eq!(stderr(&out).trim(), "Invalid credentials");
    assert!(!dir.path().join("token").exists());

    server.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn e2e_rejected_simulation_exits_with_gateway_error() -> anyhow::Result<()> {
    let server = TestServer::start().await.context("start test server")?;
    server.gateway().seed_user("admin", "secret");
    let dir = tempfile::tempdir()?;
    let url = server.base_url().to_string();

    let out = gwadmin(&url, dir.path(), &["login", "-u", "admin", "-p", "secret"]).await?;
    assert!(out.status.success(), "stderr: {}", stderr(&out));

    let out = gwadmin(
        &url,
        dir.path(),
        &["simulate", "--mode", "over_time", "--duration", "0"],
    )
    .await?;
    assert_eq!(out.status.code(), Some(EXIT_GATEWAY_ERROR));
    let text = stdout(&out);
    let starting = text.find("… Starting simulation…");
    let failed = text.find("✗ Error: Bad Request");
    assert!(
        matches!((starting, failed), (Some(s), Some(f)) if s < f),
        "{text}"
    );

    server.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn e2e_watch_stops_after_ticks() -> anyhow::Result<()> {
    let server = TestServer::start().await.context("start test server")?;
    server.gateway().seed_user("admin", "secret");
    let dir = tempfile::tempdir()?;
    let url = server.base_url().to_string();

    let out = gwadmin(&url, dir.path(), &["login", "-u", "admin", "-p", "secret"]).await?;
    assert!(out.status.success(), "stderr: {}", stderr(&out));

    let out = gwadmin(
        &url,
        dir.path(),
        &["watch", "--ticks", "2", "--poll-interval", "100ms", "--output", "json"],
    )
    .await?;
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    let metrics = json_lines(&out)?
        .into_iter()
        .filter(|l| l.get("kind").and_then(Value::as_str) == Some("metrics"))
        .count();
    assert_eq!(metrics, 2);

    server.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn e2e_bad_gateway_url_is_invalid_input() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let out = gwadmin("ftp://gateway", dir.path(), &["status"]).await?;
    assert_eq!(out.status.code(), Some(EXIT_INVALID_INPUT));
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn e2e_plans_need_no_gateway() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let out = gwadmin("http://127.0.0.1:9", dir.path(), &["plans"]).await?;
    assert!(out.status.success());
    assert_eq!(
        stdout(&out).lines().collect::<Vec<_>>(),
        vec![
            "Basic: capacity 5 req/sec, refill 1 req/sec",
            "Premium: capacity 20 req/sec, refill 5 req/sec",
        ]
    );
    Ok(())
}
