//! Operator command line for the fingerprint access workflow.
//!
//! Device commands open the serial port, run one operation and close it
//! again. Listing commands only touch the database.

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use fpgate_core::FingerprintId;
use fpgate_core::constants::{DEFAULT_BAUD_RATE, DEFAULT_COMMAND_TIMEOUT_MS, DEFAULT_RECENT_LOG_LIMIT};
use fpgate_device::{DeviceEvent, EngineConfig, ProtocolEngine, SerialConfig, available_ports};
use fpgate_storage::{Database, DatabaseConfig, RecordStore, SqliteRecordStore};
use fpgate_workflow::{AccessController, WorkflowError};
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Parser, Debug)]
#[command(name = "fpgate", version, about = "Fingerprint sensor access control")]
struct Cli {
    /// Serial port the sensor board is attached to
    #[arg(long, global = true, env = "FPGATE_PORT", default_value = "/dev/ttyUSB0")]
    port: String,

    #[arg(long, global = true, env = "FPGATE_BAUD", default_value_t = DEFAULT_BAUD_RATE)]
    baud: u32,

    /// SQLite database file
    #[arg(long, global = true, env = "FPGATE_DATABASE", default_value = "fpgate.db")]
    database: String,

    /// Per-command timeout in seconds
    #[arg(long, global = true, env = "FPGATE_TIMEOUT_SECS", default_value_t = DEFAULT_COMMAND_TIMEOUT_MS / 1000)]
    timeout_secs: u64,

    /// Log at info level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Enroll a finger into a sensor slot
    Enroll {
        /// Slot number, 1-127
        #[arg(long)]
        id: FingerprintId,

        #[arg(long)]
        name: String,
    },

    /// Match a finger and log the outcome
    Verify,

    /// Remove a sensor slot and its stored identity
    Delete {
        #[arg(long)]
        id: FingerprintId,
    },

    /// Number of templates stored on the sensor
    Count,

    /// Enrolled identities
    List {
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Most recent access log entries
    Logs {
        #[arg(long, default_value_t = DEFAULT_RECENT_LOG_LIMIT)]
        limit: i64,

        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Serial ports visible to the driver
    Ports {
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Ports { json } => print_ports(json),
        Commands::List { json } => {
            let store = open_store(&cli.database).await?;
            let identities = store.list_identities().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&identities)?);
            } else {
                println!("{:>3}  {:<24} {:<20} {:<20}", "ID", "NAME", "REGISTERED", "LAST ACCESS");
                for identity in &identities {
                    println!(
                        "{:>3}  {:<24} {:<20} {:<20}",
                        identity.id,
                        identity.name,
                        identity.registered_at.format("%Y-%m-%d %H:%M:%S"),
                        identity.last_access_at.format("%Y-%m-%d %H:%M:%S"),
                    );
                }
            }
            store.close().await;
            Ok(())
        }
        Commands::Logs { limit, json } => {
            let store = open_store(&cli.database).await?;
            let logs = store.list_recent_logs(limit).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&logs)?);
            } else {
                println!(
                    "{:<20} {:>3}  {:<24} {:<15} {:>5}",
                    "TIME", "ID", "NAME", "STATUS", "CONF"
                );
                for entry in &logs {
                    println!(
                        "{:<20} {:>3}  {:<24} {:<15} {:>5}",
                        entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
                        entry.fingerprint_id,
                        entry.name,
                        entry.status,
                        entry.confidence,
                    );
                }
            }
            store.close().await;
            Ok(())
        }
        ref device_command => {
            let store = open_store(&cli.database).await?;
            let serial = SerialConfig::new(&cli.port).with_baud_rate(cli.baud);
            let config =
                EngineConfig::default().with_command_timeout(Duration::from_secs(cli.timeout_secs));

            let engine = ProtocolEngine::open(&serial, config)
                .await
                .with_context(|| format!("cannot open sensor on {}", cli.port))?;
            let diagnostics = spawn_diagnostics(engine.subscribe());
            let controller = AccessController::new(engine, store);

            let result = run_device_command(&controller, device_command).await;

            controller.close().await;
            controller.store().close().await;
            diagnostics.abort();
            result
        }
    }
}

async fn run_device_command(
    controller: &AccessController<SqliteRecordStore>,
    command: &Commands,
) -> anyhow::Result<()> {
    match command {
        Commands::Enroll { id, name } => {
            let identity = controller.enroll(*id, name).await.map_err(explain)?;
            println!("Enrolled {} into slot {}", identity.name, identity.id);
        }
        Commands::Verify => {
            let access = controller.verify().await.map_err(explain)?;
            if access.is_known() {
                println!(
                    "Access granted: {} (slot {}, confidence {})",
                    access.name, access.id, access.confidence
                );
            } else {
                println!(
                    "Access granted to slot {} with no stored identity (confidence {})",
                    access.id, access.confidence
                );
            }
        }
        Commands::Delete { id } => {
            let outcome = controller.delete(*id).await.map_err(explain)?;
            if outcome.removed_from_store() {
                println!("Deleted slot {}", outcome.id);
            } else {
                println!("Deleted slot {} on the sensor; it was not in the database", outcome.id);
            }
        }
        Commands::Count => {
            let count = controller.count().await;
            if count < 0 {
                bail!("template count unavailable");
            }
            println!("{count}");
        }
        Commands::List { .. } | Commands::Logs { .. } | Commands::Ports { .. } => {
            debug!("Not a device command");
        }
    }
    Ok(())
}

fn explain(err: WorkflowError) -> anyhow::Error {
    if err.is_inconsistent() {
        anyhow::Error::new(err)
            .context("sensor and database now disagree; reconcile this slot by hand")
    } else {
        anyhow::Error::new(err)
    }
}

/// Relay sensor chatter ("Place your finger...") to the operator.
fn spawn_diagnostics(mut events: broadcast::Receiver<DeviceEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(DeviceEvent::Info(text)) => eprintln!("  {text}"),
                Ok(DeviceEvent::TransportLost(reason)) => {
                    warn!(%reason, "Sensor connection lost");
                }
                Ok(DeviceEvent::Unsolicited(response)) => {
                    info!(line = %response.to_line(), "Unsolicited sensor response");
                }
                Ok(event) => debug!(?event, "Sensor event"),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Dropped sensor diagnostics"),
                Err(RecvError::Closed) => break,
            }
        }
    })
}

async fn open_store(path: &str) -> anyhow::Result<SqliteRecordStore> {
    let db = Database::new(DatabaseConfig::new(path))
        .await
        .with_context(|| format!("cannot open database {path}"))?;
    Ok(SqliteRecordStore::new(db))
}

fn print_ports(json: bool) -> anyhow::Result<()> {
    let ports = available_ports()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&ports)?);
        return Ok(());
    }
    if ports.is_empty() {
        println!("No serial ports found");
    }
    for port in &ports {
        let usb = match (port.vid, port.pid) {
            (Some(vid), Some(pid)) => format!(" {vid:04x}:{pid:04x}"),
            _ => String::new(),
        };
        println!(
            "{}  {}{}  {}",
            port.port_name,
            port.kind,
            usb,
            port.product.as_deref().unwrap_or("")
        );
    }
    Ok(())
}
