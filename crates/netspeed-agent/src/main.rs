//! NetSpeed Agent - network throughput monitor
//!
//! Samples the kernel's per-interface counters once per interval and
//! prints download, upload, total speed and usage labels to stdout.
//!
//! Signals: SIGUSR1 resets usage, SIGHUP reloads configuration,
//! SIGINT/SIGTERM stop the monitor and persist its baseline.

use anyhow::Result;
use netspeed_lib::collector::{MonitorBuilder, ProcNetDev, ProcUptime};
use netspeed_lib::JsonFileStore;
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;
mod panel;

const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout stays reserved for the labels
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json().with_writer(std::io::stderr))
        .init();

    info!(version = AGENT_VERSION, "Starting netspeed-agent");

    let config = config::AgentConfig::load()?;
    info!(
        host = %config.host_name,
        interfaces = ?config.settings.interfaces,
        state_path = %config.state_path.display(),
        "Agent configured"
    );
    if config.settings.interfaces.is_empty() {
        warn!("No interfaces configured, all speeds will read zero");
    }

    let mut builder = MonitorBuilder::new()
        .counter_source(Arc::new(ProcNetDev::with_path(&config.net_dev_path)))
        .uptime_source(Arc::new(ProcUptime::with_path(&config.uptime_path)))
        .store(Arc::new(JsonFileStore::new(&config.state_path)))
        .sink(panel::TerminalPanel::stdout())
        .settings(config.settings())
        .host(config.host_name.clone());
    if let Some(path) = &config.metrics_textfile {
        builder = builder.metrics_textfile(path);
    }
    let handle = builder.spawn()?;

    let mut reset = signal(SignalKind::user_defined1())?;
    let mut reload = signal(SignalKind::hangup())?;
    let mut terminate = signal(SignalKind::terminate())?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("SIGINT received");
                break;
            }
            _ = terminate.recv() => {
                info!("SIGTERM received");
                break;
            }
            _ = reset.recv() => {
                handle.reset_usage().await?;
            }
            _ = reload.recv() => match config::AgentConfig::load() {
                Ok(reloaded) => {
                    info!("Configuration reloaded");
                    handle.replace_settings(reloaded.settings()).await?;
                }
                Err(e) => warn!(error = %e, "Failed to reload configuration, keeping current settings"),
            },
        }
    }

    let state = handle.stop().await?;
    info!(
        initial_received = state.initial_receive_count,
        initial_transmitted = state.initial_transmit_count,
        "Shutting down"
    );

    Ok(())
}
