//! tinymq - minimal MQTT broker
//!
//! Usage:
//!   tinymq [OPTIONS]
//!
//! Options:
//!   -c, --config <FILE>         Configuration file path
//!   -b, --bind <ADDR>           Bind address (default: 0.0.0.0:1883)
//!   -q, --queue-capacity <N>    Outbound packets buffered per client
//!   -l, --log-level <LEVEL>     Log level (error, warn, info, debug, trace)
//!   -h, --help                  Print help
//!
//! `RUST_LOG` takes precedence over `--log-level` when set.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use tinymq::broker::Broker;
use tinymq::config::Config;

/// Log level for CLI
#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    /// Only errors
    Error,
    /// Warnings and errors
    Warn,
    /// Informational messages
    Info,
    /// Debug messages
    Debug,
    /// Trace messages (very verbose)
    Trace,
}

impl LogLevel {
    fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// tinymq - minimal MQTT broker
#[derive(Parser, Debug)]
#[command(name = "tinymq")]
#[command(version)]
#[command(about = "Minimal MQTT broker: CONNECT, SUBSCRIBE, PUBLISH and PINGREQ over TCP")]
struct Args {
    /// Configuration file path (TOML format)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// TCP bind address
    #[arg(short, long)]
    bind: Option<SocketAddr>,

    /// Outbound packets buffered per client before deliveries are dropped
    #[arg(short, long)]
    queue_capacity: Option<usize>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, value_enum)]
    log_level: Option<LogLevel>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Environment overrides apply even without a file
    let config_path = args.config.clone().unwrap_or_default();
    let mut config = match Config::load(&config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Error loading configuration: {}", e);
            std::process::exit(1);
        }
    };

    let log_level = args
        .log_level
        .map(|level| level.as_str().to_string())
        .unwrap_or_else(|| config.log.level.to_lowercase());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_level));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    if let Some(path) = &args.config {
        info!("Loaded configuration from {:?}", path);
    }

    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }
    if let Some(capacity) = args.queue_capacity {
        config.limits.outbound_queue_capacity = capacity;
    }
    config.validate()?;

    let broker_config = config.broker_config();
    info!("Starting tinymq");
    info!("  Bind: {}", broker_config.bind_addr);
    info!(
        "  Outbound queue capacity: {}",
        broker_config.outbound_queue_capacity
    );

    let broker = Arc::new(Broker::new(broker_config));

    let signal_broker = broker.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl+C, shutting down");
                signal_broker.shutdown();
            }
            Err(e) => error!("Failed to listen for Ctrl+C: {}", e),
        }
    });

    broker.run().await?;

    Ok(())
}
