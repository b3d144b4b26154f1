use anyhow::Context as _;
use gwadmin_core::{
    Console, PLAN_PROFILES, STATUS_STARTING, SimulationForm, SimulationStatus, StatusKind,
    StatusSlot, View, run_simulation,
};
use tokio::sync::broadcast::error::RecvError;

use crate::cli::{Command, CredentialArgs, GlobalArgs, WatchArgs};
use crate::command_error::CommandError;
use crate::exit_codes::ExitCode;
use crate::output::{OutputFormatter, SessionEvent, formatter};

pub async fn dispatch(global: &GlobalArgs, command: Command) -> Result<ExitCode, CommandError> {
    let out = formatter(global.output);

    match command {
        Command::Plans => {
            out.plans(&PLAN_PROFILES);
            Ok(ExitCode::Success)
        }
        Command::Login(args) => login(&open_console(global)?, out.as_ref(), &args).await,
        Command::Register(args) => register(&open_console(global)?, out.as_ref(), &args).await,
        Command::Logout => {
            open_console(global)?.logout();
            out.session(SessionEvent::LoggedOut);
            Ok(ExitCode::Success)
        }
        Command::Status => {
            let console = open_console(global)?;
            out.session(SessionEvent::Status {
                view: console.active_view(),
                gateway_url: console.api().urls().base_url.as_str(),
            });
            Ok(ExitCode::Success)
        }
        Command::Metrics => {
            let console = open_console(global)?;
            require_session(&console)?;
            let snapshot = console
                .poller()
                .refresh_now()
                .await?
                .ok_or_else(session_ended)?;
            out.metrics(&snapshot);
            Ok(ExitCode::Success)
        }
        Command::Watch(args) => watch(&open_console(global)?, out.as_ref(), &args).await,
        Command::Clear => {
            let console = open_console(global)?;
            require_session(&console)?;
            let snapshot = console.clear_metrics().await?.ok_or_else(session_ended)?;
            out.metrics(&snapshot);
            Ok(ExitCode::Success)
        }
        Command::Simulate(args) => {
            let console = open_console(global)?;
            require_session(&console)?;
            simulate(&console, out.as_ref(), &args.form()).await
        }
    }
}

/// Every command except `plans` talks to the gateway.
fn open_console(global: &GlobalArgs) -> Result<Console, CommandError> {
    Ok(Console::open(global.console_config())?)
}

fn require_session(console: &Console) -> Result<(), CommandError> {
    match console.active_view() {
        View::Dashboard => Ok(()),
        View::Login => Err(CommandError::not_logged_in()),
    }
}

fn session_ended() -> CommandError {
    CommandError::Auth(anyhow::anyhow!("session ended while fetching metrics"))
}

async fn login(
    console: &Console,
    out: &dyn OutputFormatter,
    args: &CredentialArgs,
) -> Result<ExitCode, CommandError> {
    console.login(&args.username, &args.password).await?;
    out.session(SessionEvent::LoggedIn {
        username: &args.username,
    });
    Ok(ExitCode::Success)
}

async fn register(
    console: &Console,
    out: &dyn OutputFormatter,
    args: &CredentialArgs,
) -> Result<ExitCode, CommandError> {
    console.register(&args.username, &args.password).await?;
    out.session(SessionEvent::Registered {
        username: &args.username,
    });
    Ok(ExitCode::Success)
}

/// The request is built from the form before submission. The "starting" notice is
/// printed before the request leaves; the final line carries the gateway's answer.
async fn simulate(
    console: &Console,
    out: &dyn OutputFormatter,
    form: &SimulationForm,
) -> Result<ExitCode, CommandError> {
    let request = form.build();
    out.status(&SimulationStatus::info(STATUS_STARTING));

    let slot = StatusSlot::new(console.config().status_ttl);
    let status = run_simulation(console.api(), &request, &slot).await;
    slot.teardown();

    out.simulation(&request, &status);
    Ok(match status.kind {
        StatusKind::Error => ExitCode::GatewayError,
        StatusKind::Info | StatusKind::Success => ExitCode::Success,
    })
}

async fn watch(
    console: &Console,
    out: &dyn OutputFormatter,
    args: &WatchArgs,
) -> Result<ExitCode, CommandError> {
    require_session(console)?;

    let dashboard = console.open_dashboard();
    let mut snapshots = dashboard.snapshots();
    let mut errors = dashboard.poll_errors();
    let mut remaining = args.ticks;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    while remaining != Some(0) {
        tokio::select! {
            res = &mut ctrl_c => {
                res.context("listen for Ctrl-C").map_err(CommandError::Runtime)?;
                break;
            }
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let latest = snapshots.borrow_and_update().clone();
                if let Some(snapshot) = latest {
                    out.metrics(&snapshot);
                    remaining = remaining.map(|n| n.saturating_sub(1));
                }
            }
            err = errors.recv() => match err {
                Ok(err) => out.poll_error(&err),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "poll errors dropped");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    dashboard.teardown();
    Ok(ExitCode::Success)
}
