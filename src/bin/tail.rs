//! Argus realtime feed follower
//!
//! Run with: argus-realtime --ws-url ws://localhost:8000/ws
//!
//! Prints one JSON line per incident event on stdout. Logs go to stderr.

use std::io::{self, Write};
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use argus_realtime::config::DEFAULT_MAX_RETRIES;
use argus_realtime::{IncidentEvent, ManagerState, RealtimeConfig, RealtimeService, RealtimeSettings};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "argus-realtime")]
#[command(about = "Follow the Argus realtime incident feed")]
#[command(version)]
struct Args {
    /// Base WebSocket URL of the Argus backend
    #[arg(long, env = "ARGUS_WS_URL")]
    ws_url: String,

    /// Reconnect attempts before giving up
    #[arg(
        long,
        env = "ARGUS_REALTIME_MAX_RETRIES",
        default_value_t = DEFAULT_MAX_RETRIES,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    max_retries: u32,

    /// Delay before the first reconnect, in seconds (doubles on each retry)
    #[arg(
        long,
        env = "ARGUS_REALTIME_INITIAL_RETRY_SECS",
        default_value = "1",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    initial_retry_secs: u64,

    /// Session token, sent as the `token` cookie
    #[arg(long, env = "ARGUS_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Keep-alive probe interval in seconds (disabled when unset)
    #[arg(long, env = "ARGUS_HEALTH_CHECK_SECS")]
    health_check_secs: Option<u64>,

    /// Log output format
    #[arg(long, value_enum, default_value = "text")]
    log_format: LogFormat,
}

impl Args {
    fn settings(&self) -> argus_realtime::Result<RealtimeSettings> {
        let mut settings = RealtimeSettings::new(&self.ws_url)?
            .with_max_retries(self.max_retries)?
            .with_initial_retry_interval(Duration::from_secs(self.initial_retry_secs))?;

        if let Some(ref token) = self.token {
            settings = settings.with_auth_token(token.clone());
        }
        if let Some(secs) = self.health_check_secs.filter(|s| *s > 0) {
            settings = settings.with_health_check_interval(Duration::from_secs(secs));
        }
        Ok(settings)
    }
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Text => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(io::stderr)
                    .with_ansi(false),
            )
            .init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(io::stderr),
            )
            .init(),
    }
}

fn print_event(event: &IncidentEvent) -> anyhow::Result<()> {
    let line = serde_json::to_string(event)?;
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{}", line)?;
    stdout.flush()?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.log_format);

    let settings = args.settings().context("invalid realtime settings")?;
    let max_retries = settings.max_retries;

    let (tx, mut incidents) = mpsc::unbounded_channel();
    let service = RealtimeService::spawn(settings, RealtimeConfig::forwarding(tx))?;
    service.set_state_observer(|previous, next| {
        tracing::info!(%previous, %next, "Realtime state changed");
    })?;
    service.connect()?;

    let mut states = service.watch_state();
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            Some(event) = incidents.recv() => print_event(&event)?,
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
                if *states.borrow_and_update() == ManagerState::Failed {
                    let _ = service.shutdown();
                    anyhow::bail!(
                        "realtime connection failed after {} reconnect attempts",
                        max_retries
                    );
                }
            }
            _ = &mut shutdown => {
                tracing::info!("Interrupted, disconnecting");
                service.shutdown()?;
                break;
            }
        }
    }

    Ok(())
}
