//! Main entry point for the primary binary

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::signal;

use primary::{services::RealWorkerLauncher, Primary, PrimaryError, PrimaryResult};
use shared::config::{DEFAULT_REQUEST_TIMEOUT_MS, DEFAULT_SAMPLE_INTERVAL_MS};
use shared::{logging, process_debug, HealthCheckConfig, ProcessIdentity};

/// Primary process of a worker pool with cluster-wide health checks
#[derive(Parser)]
#[command(name = "primary")]
#[command(about = "Launches a worker pool and relays health-check traffic between its processes")]
pub struct Args {
    /// Address workers connect to (port 0 picks a free port)
    #[arg(long, default_value = "127.0.0.1:0")]
    pub listen_addr: String,

    /// Number of workers to launch
    #[arg(long, default_value = "4")]
    pub workers: u32,

    /// Worker binary (defaults to `worker` next to this executable)
    #[arg(long)]
    pub worker_bin: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Log an aggregated health report every N seconds (disabled if unset)
    #[arg(long)]
    pub report_interval_secs: Option<u64>,

    /// How long a health check waits for peers
    #[arg(long, default_value_t = DEFAULT_REQUEST_TIMEOUT_MS)]
    pub request_timeout_ms: u64,

    /// Event-loop monitor sampling period
    #[arg(long, default_value_t = DEFAULT_SAMPLE_INTERVAL_MS)]
    pub sample_interval_ms: u64,
}

fn default_worker_bin() -> PrimaryResult<PathBuf> {
    let exe = std::env::current_exe()?;
    let dir = exe
        .parent()
        .ok_or_else(|| PrimaryError::config("cannot locate executable directory"))?;
    Ok(dir.join(format!("worker{}", std::env::consts::EXE_SUFFIX)))
}

#[tokio::main]
async fn main() -> PrimaryResult<()> {
    // Settings may also come from a .env file
    let _ = dotenv::dotenv();
    let args = Args::parse();

    let identity = *ProcessIdentity::init_primary();
    logging::init_tracing_with_level(Some(&args.log_level));
    logging::log_startup(&identity, &format!("primary with {} workers", args.workers));

    let config = HealthCheckConfig::from_args(
        args.request_timeout_ms,
        args.sample_interval_ms,
        args.report_interval_secs,
    )?;
    let listen_addr: SocketAddr = args
        .listen_addr
        .parse()
        .map_err(|e| PrimaryError::config(format!("Invalid listen address: {e}")))?;
    let worker_bin = match args.worker_bin {
        Some(path) => path,
        None => default_worker_bin()?,
    };
    process_debug!(identity, "Worker binary: {}", worker_bin.display());

    let launcher = RealWorkerLauncher::new(worker_bin)
        .with_log_level(args.log_level.clone())
        .with_config(config.clone());

    let mut primary = Primary::new(identity, config, launcher);
    primary.initialize(listen_addr).await?;
    primary.spawn_workers(args.workers).await?;

    // Set up graceful shutdown
    let shutdown_sender = primary.get_shutdown_sender();
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                let _ = shutdown_sender.send("received Ctrl+C".to_string()).await;
            }
            Err(err) => {
                logging::log_error(&identity, "Signal handling", &err);
            }
        }
    });

    primary.run().await?;

    logging::log_success(&identity, "Primary stopped gracefully");
    Ok(())
}
