//! Main entry point for the worker binary

use clap::Parser;
use std::net::SocketAddr;

use shared::config::{DEFAULT_REQUEST_TIMEOUT_MS, DEFAULT_SAMPLE_INTERVAL_MS};
use shared::{logging, HealthCheckConfig, ProcessIdentity, WorkerId};
use worker::{UpstreamConnection, Worker, WorkerError, WorkerResult};

/// Worker process of a pool with cluster-wide health checks
#[derive(Parser)]
#[command(name = "worker")]
#[command(about = "Pool worker that answers and issues health checks through the primary")]
pub struct Args {
    /// Worker id assigned by the primary (1-based)
    #[arg(long)]
    pub worker_id: u32,

    /// Address of the primary
    #[arg(long)]
    pub primary_addr: String,

    /// Number of workers in the pool, this one included
    #[arg(long)]
    pub pool_size: usize,

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

#[cfg(unix)]
async fn terminate_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = signal(SignalKind::terminate())?;
    tokio::select! {
        _ = term.recv() => Ok(()),
        result = tokio::signal::ctrl_c() => result,
    }
}

#[cfg(not(unix))]
async fn terminate_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}

#[tokio::main]
async fn main() -> WorkerResult<()> {
    let _ = dotenv::dotenv();
    let args = Args::parse();

    if args.worker_id == 0 {
        return Err(WorkerError::config("worker id 0 is reserved for the primary"));
    }

    let identity = *ProcessIdentity::init_worker(WorkerId(args.worker_id));
    logging::init_tracing_with_level(Some(&args.log_level));
    logging::log_startup(&identity, &format!("worker in a pool of {}", args.pool_size));

    let config = HealthCheckConfig::from_args(
        args.request_timeout_ms,
        args.sample_interval_ms,
        args.report_interval_secs,
    )?;
    let primary_addr: SocketAddr = args
        .primary_addr
        .parse()
        .map_err(|e| WorkerError::config(format!("Invalid primary address: {e}")))?;

    let mut connection = UpstreamConnection::connect(primary_addr, identity).await?;
    let mut worker = Worker::new(config, args.pool_size, connection.transport());

    let shutdown_sender = worker.get_shutdown_sender();
    tokio::spawn(async move {
        match terminate_signal().await {
            Ok(()) => {
                let _ = shutdown_sender.send("received termination signal".to_string()).await;
            }
            Err(err) => {
                logging::log_error(&identity, "Signal handling", &err);
            }
        }
    });

    worker.run(connection.closed()).await;

    logging::log_success(&identity, "Worker stopped");
    Ok(())
}
