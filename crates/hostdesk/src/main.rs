//! Hostdesk CLI entry point.
//!
//! Thin wrapper over `hostdesk-core`: loads configuration, wires the
//! watcher, and exposes session maintenance commands.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use hostdesk_core::clock::{Clock, SystemClock};
use hostdesk_core::config::Config;
use hostdesk_core::gate::{AllowAll, PermissionGate, StaticGate};
use hostdesk_core::logging::{LogConfig, LogFormat, init_logging};
use hostdesk_core::notify::{ThrottledSink, TracingSink};
use hostdesk_core::session::{FileBackend, SessionBackend, SessionStore};
use hostdesk_core::watcher::{FileSnapshotProvider, Watcher};

#[derive(Parser)]
#[command(name = "hostdesk", version, about = "Change detection and notifications for rental operations")]
struct Cli {
    /// Path to hostdesk.toml (defaults to the platform config directory)
    #[arg(long, global = true, env = "HOSTDESK_CONFIG")]
    config: Option<PathBuf>,

    /// Emit JSON log lines instead of pretty output
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll snapshot files and notify about new tickets and reservations
    Watch {
        /// Ticket snapshot file (overrides config)
        #[arg(long)]
        tickets: Option<PathBuf>,

        /// Reservation snapshot file (overrides config)
        #[arg(long)]
        reservations: Option<PathBuf>,

        /// Poll interval in milliseconds (overrides config)
        #[arg(long)]
        interval_ms: Option<u64>,

        /// Run a single tick and exit
        #[arg(long)]
        once: bool,
    },

    /// Inspect or maintain the persisted session document
    Session {
        #[command(subcommand)]
        command: SessionCommands,
    },
}

#[derive(Subcommand)]
enum SessionCommands {
    /// Print the current session document
    Show {
        /// Print raw JSON
        #[arg(long)]
        json: bool,
    },

    /// Start a fresh session (clears seen-sets and watermarks)
    Reset,

    /// Delete the persisted session document
    Clear,
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<Config> {
    match path {
        Some(p) => Config::load_from(p)
            .with_context(|| format!("failed to load config from {}", p.display())),
        None => Config::load().context("failed to load config"),
    }
}

fn open_store(config: &Config) -> Arc<SessionStore> {
    let backend = FileBackend::new(config.session_path());
    Arc::new(SessionStore::new(
        Box::new(backend),
        Arc::new(SystemClock) as Arc<dyn Clock>,
    ))
}

fn build_gate(config: &Config) -> Box<dyn PermissionGate> {
    if config.permissions.granted.is_empty() {
        Box::new(AllowAll)
    } else {
        Box::new(StaticGate::new(config.permissions.granted.iter().cloned()))
    }
}

async fn run_watch(
    config: Config,
    tickets: Option<PathBuf>,
    reservations: Option<PathBuf>,
    interval_ms: Option<u64>,
    once: bool,
) -> anyhow::Result<()> {
    let ticket_path = tickets.or_else(|| config.watch.ticket_snapshot.clone());
    let reservation_path = reservations.or_else(|| config.watch.reservation_snapshot.clone());
    anyhow::ensure!(
        ticket_path.is_some() || reservation_path.is_some(),
        "no snapshot files configured; pass --tickets and/or --reservations"
    );

    let store = open_store(&config);
    let min_interval = Duration::from_secs(config.notifications.min_interval_secs);
    let mut builder = Watcher::builder(Arc::clone(&store)).gate(build_gate(&config));
    if let Some(path) = ticket_path {
        builder = builder.ticket_provider(Box::new(FileSnapshotProvider::new(path)));
    }
    if let Some(path) = reservation_path {
        builder = builder.reservation_provider(Box::new(FileSnapshotProvider::new(path)));
    }
    if !min_interval.is_zero() {
        builder = builder
            .ticket_sink(Box::new(ThrottledSink::new(TracingSink, min_interval)))
            .reservation_sink(Box::new(ThrottledSink::new(TracingSink, min_interval)));
    }
    let mut watcher = builder.build();

    if once {
        let report = watcher.tick();
        info!(?report, "single tick complete");
        return Ok(());
    }

    let interval = Duration::from_millis(interval_ms.unwrap_or(config.watch.poll_interval_ms));
    watcher.run(interval).await.context("watch loop failed")
}

fn run_session(config: &Config, command: &SessionCommands) -> anyhow::Result<()> {
    let backend = FileBackend::new(config.session_path());

    match command {
        // Read-only: inspecting the session must not create one.
        SessionCommands::Show { json } => match backend.load()? {
            Some(record) => {
                if *json {
                    println!("{}", serde_json::to_string_pretty(&record)?);
                } else {
                    println!("session started: {}", record.started_at);
                    for (kind, ids) in &record.seen {
                        println!("seen {kind}: {} ids", ids.len());
                    }
                    for (kind, mark) in &record.watermark {
                        match mark {
                            Some(at) => println!("watermark {kind}: {at}"),
                            None => println!("watermark {kind}: none"),
                        }
                    }
                }
            }
            None => println!("no active session"),
        },
        SessionCommands::Reset => {
            let store = open_store(config);
            store.create_new_session();
            println!("session reset: seen-sets and watermarks cleared");
        }
        SessionCommands::Clear => {
            backend.clear()?;
            println!("session document deleted: {}", config.session_path().display());
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;

    let log_config = LogConfig {
        level: config.general.log_level.clone(),
        format: if cli.json_logs {
            LogFormat::Json
        } else {
            LogFormat::Pretty
        },
        file: None,
    };
    init_logging(&log_config).context("failed to initialize logging")?;

    match cli.command {
        Commands::Watch {
            tickets,
            reservations,
            interval_ms,
            once,
        } => run_watch(config, tickets, reservations, interval_ms, once).await,
        Commands::Session { command } => run_session(&config, &command),
    }
}
