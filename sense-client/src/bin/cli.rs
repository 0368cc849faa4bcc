//! Command-line interface for sense-client.
//!
//! Logs in, persists the session to a JSON file, and queries a monitor:
//! overview, devices, usage trends, or a live feed of realtime readings.
//! The session file is rewritten whenever the client renews the access
//! token, so later runs keep working without logging in again.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use time::OffsetDateTime;
use tokio::io::{AsyncBufReadExt, BufReader};

use sense_client::tracing::{self, prelude::*};
use sense_client::types::{RealtimePayload, TrendScale};
use sense_client::{ClientConfig, ClientEvent, EventKind, LoginOutcome, SenseClient, Session};

#[derive(Parser)]
#[command(name = "sense-cli", about = "Query a Sense energy monitor")]
struct Cli {
    /// Where the session is stored between runs
    #[arg(long, env = "SENSE_SESSION_FILE", default_value = "sense-session.json")]
    session_file: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Log in and store the session
    Login {
        #[arg(long, env = "SENSE_EMAIL")]
        email: String,
        #[arg(long, env = "SENSE_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Forget the stored session
    Logout,
    /// Show monitor status
    Overview {
        #[arg(long)]
        monitor: Option<u64>,
    },
    /// List detected devices
    Devices {
        #[arg(long)]
        monitor: Option<u64>,
    },
    /// Show usage for the current period
    Trends {
        #[arg(long)]
        monitor: Option<u64>,
        #[arg(long, default_value = "DAY")]
        scale: TrendScale,
    },
    /// Stream realtime readings until interrupted
    Watch {
        #[arg(long)]
        monitor: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing::init_journald_or_stdout();
    let cli = Cli::parse();

    let session = load_session(&cli.session_file)?;
    let client = SenseClient::builder()
        .session(session)
        .config(ClientConfig::from_env()?)
        .build()?;
    persist_session_changes(&client, cli.session_file.clone());

    match cli.command {
        Command::Login { email, password } => login(&client, &email, &password).await?,
        Command::Logout => client.logout(),
        Command::Overview { monitor } => {
            let overview = client.get_monitor_overview(monitor_id(&client, monitor)?).await?;
            println!("{}", serde_json::to_string_pretty(&overview)?);
        }
        Command::Devices { monitor } => {
            let devices = client.get_monitor_devices(monitor_id(&client, monitor)?).await?;
            for device in devices {
                println!("{:<24} {}", device.id, device.name);
            }
        }
        Command::Trends { monitor, scale } => {
            let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
            let trends = client
                .get_monitor_trends(monitor_id(&client, monitor)?, scale, Some(now))
                .await?;
            println!("Consumption: {:.2} kWh", trends.consumption.total);
            println!("Production:  {:.2} kWh", trends.production.total);
            for device in trends.consumption.devices {
                println!("  {:<24} {:>8.2} kWh", device.name, device.total_kwh);
            }
        }
        Command::Watch { monitor } => watch(&client, monitor_id(&client, monitor)?).await?,
    }

    Ok(())
}

async fn login(client: &SenseClient, email: &str, password: &str) -> Result<()> {
    if let LoginOutcome::MfaRequired(mfa_token) = client.login(email, password).await? {
        eprint!("Authentication code: ");
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let code = lines
            .next_line()
            .await?
            .context("no authentication code entered")?;
        client
            .complete_mfa_login(&mfa_token, code.trim(), OffsetDateTime::now_utc())
            .await?;
    }

    if let Some(session) = client.session() {
        println!("Logged in; monitors: {:?}", session.monitor_ids);
    }
    Ok(())
}

async fn watch(client: &SenseClient, monitor_id: u64) -> Result<()> {
    let mut events = client.events().subscribe();
    client.start_realtime_updates(monitor_id).await?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => {
                let Some(event) = event else { break };
                if let ClientEvent::RealtimeUpdate { payload, .. } = event {
                    print_reading(&payload);
                }
            }
        }
    }

    trace!("Shutting down.");
    client.stop_realtime_updates();
    Ok(())
}

fn print_reading(payload: &serde_json::Value) {
    match RealtimePayload::from_value(payload) {
        Ok(RealtimePayload::RealtimeUpdate(update)) => {
            println!(
                "{:>8.0} W used  {:>8.0} W from grid  ({} devices)",
                update.w,
                update.grid_w,
                update.devices.len()
            );
        }
        Ok(other) => debug!(payload = ?other, "Feed message."),
        Err(e) => debug!(error = %e, "Unrecognized feed message."),
    }
}

fn monitor_id(client: &SenseClient, requested: Option<u64>) -> Result<u64> {
    if let Some(id) = requested {
        return Ok(id);
    }
    let Some(session) = client.session() else {
        bail!("not logged in; run `sense-cli login` first");
    };
    session
        .monitor_ids
        .first()
        .copied()
        .context("the account has no monitors")
}

fn load_session(path: &Path) -> Result<Option<Session>> {
    if !path.exists() {
        return Ok(None);
    }
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let session = serde_json::from_str(&text)
        .with_context(|| format!("parsing {}", path.display()))?;
    Ok(Some(session))
}

// Keep the session file in step with the client, including renewals made
// during other commands.
fn persist_session_changes(client: &SenseClient, path: PathBuf) {
    client.events().on(EventKind::SessionChanged, move |event| {
        let ClientEvent::SessionChanged(session) = event else {
            return;
        };
        let result = match session {
            Some(session) => serde_json::to_string_pretty(session)
                .map_err(std::io::Error::other)
                .and_then(|json| std::fs::write(&path, json)),
            None if path.exists() => std::fs::remove_file(&path),
            None => Ok(()),
        };
        if let Err(e) = result {
            error!(path = %path.display(), error = %e, "Failed to persist session.");
        }
    });
}
