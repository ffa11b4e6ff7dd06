//! `EPGenius` Daemon
//!
//! `epgenius run` watches the configured health-check URLs and notifies on
//! state changes. The other subcommands answer one query and exit.

use std::io::{self, Write};
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::{info, warn};

use epgenius_core::config::{Config, load_config};
use epgenius_core::drive;
use epgenius_core::lookup::{LookupOutcome, LookupQuery, lookup};
use epgenius_core::resolver::FuzzyOwnerResolver;
use epgenius_core::tracing_init::{default_filter, init_tracing};
use epgenius_daemon::app::{Services, join_monitors, monitors_from_config};
use epgenius_daemon::output::{render_lookup, render_status};

#[derive(Parser, Debug)]
#[command(name = "epgenius")]
#[command(version, about = "EPGenius - playlist registry lookups, status checks and uptime alerts")]
struct Cli {
    /// Config file, merged over the global settings.json
    #[arg(long, global = true, env = "EPGENIUS_CONFIG")]
    config: Option<PathBuf>,

    /// Registry endpoint URL (overrides config)
    #[arg(long, global = true)]
    registry_url: Option<String>,

    /// Log level filter (e.g. "info", "debug", "warn").
    #[arg(long, global = true, default_value = "info", env = "EPGENIUS_LOG_LEVEL")]
    log_level: String,

    /// Output logs as JSON (for structured log aggregation).
    #[arg(long, global = true, env = "EPGENIUS_LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the availability monitors until Ctrl+C or SIGTERM.
    Run {
        /// Poll interval in seconds (overrides config)
        #[arg(long)]
        interval_secs: Option<u64>,
    },
    /// Look up playlists: `list`, `owner`, a playlist number, or an owner name.
    Lookup {
        query: String,
        /// Serve from the last fetched snapshot without contacting the registry
        #[arg(long)]
        offline: bool,
    },
    /// Show update status for a user's registered file.
    Status {
        duid: String,
        #[arg(long)]
        file_id: Option<String>,
    },
    /// Convert a Google Drive share link into a direct export link.
    ExportLink { url: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&default_filter(&cli.log_level), cli.log_json);

    let mut config = load_config(cli.config.as_deref())?;
    if let Some(url) = cli.registry_url {
        config.registry.url = Some(url);
    }

    let mut out = io::stdout().lock();
    match cli.command {
        Command::Run { interval_secs } => {
            if let Some(secs) = interval_secs {
                config.monitor.interval_secs = secs;
            }
            config.validate()?;
            drop(out);
            run(&config).await
        }
        Command::Lookup { query, offline } => {
            let services = Services::from_config(&config)?;
            let outcome = if offline {
                match services.registry.get_full_snapshot(true).await.into_snapshot() {
                    Some(snapshot) => lookup(
                        &snapshot,
                        &LookupQuery::parse(&query),
                        &FuzzyOwnerResolver::new(config.resolver.threshold),
                    ),
                    None => LookupOutcome::Unavailable,
                }
            } else {
                services.lookup.query(&query).await
            };
            render_lookup(&mut out, &outcome)?;
            Ok(())
        }
        Command::Status { duid, file_id } => {
            let services = Services::from_config(&config)?;
            let Some(status) = services.status else {
                anyhow::bail!("status requires records.url and records.token to be configured");
            };
            // A rejected bearer token is the one error that reaches the user.
            let outcome = status.status_for(&duid, file_id.as_deref()).await?;
            render_status(&mut out, &outcome)?;
            Ok(())
        }
        Command::ExportLink { url } => {
            match drive::export_link(&url) {
                Some(link) => writeln!(out, "Playlist export link:\n{link}")?,
                None => writeln!(out, "{}", drive::INVALID_LINK_HELP)?,
            }
            Ok(())
        }
    }
}

async fn run(config: &Config) -> anyhow::Result<()> {
    info!(
        version = env!("CARGO_PKG_VERSION"),
        targets = config.monitor.targets.len(),
        interval_secs = config.monitor.interval_secs,
        "Starting epgenius monitors"
    );

    if config.registry.url.is_some() {
        let services = Services::from_config(config)?;
        let read = services.registry.get_full_snapshot(false).await;
        info!(source = read.source_name(), "Registry snapshot warmed");
    }

    let monitors = monitors_from_config(config)?;
    if monitors.is_empty() {
        warn!("No monitor targets configured; waiting for shutdown only");
    }

    let (ready_tx, ready_rx) = watch::channel(false);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handles: Vec<_> = monitors
        .into_iter()
        .map(|m| m.spawn(ready_rx.clone(), shutdown_rx.clone()))
        .collect();

    #[cfg(unix)]
    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

    // Notify systemd that setup is done (unix only).
    #[cfg(unix)]
    sd_notify::notify(true, &[sd_notify::NotifyState::Ready])?;
    let _ = ready_tx.send(true);

    #[cfg(unix)]
    let sigterm_future = sigterm.recv();
    #[cfg(not(unix))]
    let sigterm_future = std::future::pending::<Option<()>>();

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C shutdown signal");
        }
        _ = sigterm_future => {
            info!("Received SIGTERM shutdown signal");
        }
    }

    let _ = shutdown_tx.send(true);
    let failed = join_monitors(handles).await;

    info!(failed, "Monitors stopped");
    Ok(())
}
