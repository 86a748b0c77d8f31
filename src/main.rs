// SPDX-FileCopyrightText: 2026 GSI Helmholtzzentrum f. Schwerionenforschung GmbH, Darmstadt, Germany
// SPDX-License-Identifier: LGPL-3.0-or-later

use std::io::{self, Write};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod gres;
mod metrics;
mod slurm;

use gres::ParseMode;
use metrics::GpusCollector;
use slurm::{MetricsSource, ProcessRunner, SlurmGpuSource, SourceConfig};

#[derive(Parser, Debug)]
#[command(name = "slurm-gpu-exporter")]
#[command(about = "Prometheus exporter for per-type GPU allocation on a Slurm cluster")]
#[command(version)]
struct Args {
    /// Address to serve /metrics on
    #[arg(long, default_value = "0.0.0.0:8080")]
    listen_address: SocketAddr,

    /// Prefix for all exported metric names
    #[arg(long, default_value = "slurm")]
    namespace: String,

    /// Timeout in seconds for each squeue/sinfo invocation
    #[arg(long, default_value = "10")]
    command_timeout: u64,

    /// Fail the scrape on malformed squeue/sinfo output instead of counting zero
    #[arg(long)]
    strict: bool,

    /// Path to the squeue binary
    #[arg(long, default_value = "squeue")]
    squeue: String,

    /// Path to the sinfo binary
    #[arg(long, default_value = "sinfo")]
    sinfo: String,

    /// Take a single snapshot, print it as JSON and exit
    #[arg(long)]
    once: bool,
}

impl Args {
    fn source_config(&self) -> SourceConfig {
        SourceConfig {
            squeue: self.squeue.clone(),
            sinfo: self.sinfo.clone(),
            parse_mode: if self.strict {
                ParseMode::Strict
            } else {
                ParseMode::Permissive
            },
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing();

    let runner = ProcessRunner::new(Duration::from_secs(args.command_timeout));
    let source: Arc<dyn MetricsSource> = Arc::new(SlurmGpuSource::new(runner, args.source_config()));

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    if args.once {
        rt.block_on(run_once(source))
    } else {
        rt.block_on(run_exporter(&args, source))
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "slurm_gpu_exporter=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

/// Print one snapshot as JSON to stdout
async fn run_once(source: Arc<dyn MetricsSource>) -> Result<()> {
    let snapshot = source.snapshot().await.context("Failed to collect GPU snapshot")?;

    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{}", serde_json::to_string_pretty(&snapshot)?)?;
    stdout.flush()?;
    Ok(())
}

async fn run_exporter(args: &Args, source: Arc<dyn MetricsSource>) -> Result<()> {
    let collector = GpusCollector::new(source, &args.namespace)
        .with_context(|| format!("Invalid metric namespace '{}'", args.namespace))?;
    for desc in collector.describe() {
        debug!(metric = %desc.fq_name, "Exposing series");
    }
    let app = metrics::router(Arc::new(collector));

    let listener = TcpListener::bind(args.listen_address)
        .await
        .with_context(|| format!("Failed to bind {}", args.listen_address))?;

    metrics::serve(listener, app, shutdown_signal())
        .await
        .context("Metrics server failed")?;

    info!("Exporter stopped");
    Ok(())
}

/// Resolve on Ctrl-C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
