mod cli;

use std::sync::Arc;

use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use multilog::LogRouter;
use multilog::TracingSink;
use stathat::Pipeline;
use stathat::PipelineReport;
use stathat::StatHatConfig;
use stathat::StatHatSink;
use stathat::TrackingAllocator;

use crate::cli::Cli;

#[global_allocator]
static ALLOCATOR: TrackingAllocator = TrackingAllocator::new();

/// Sets up global panic hooks.
fn setup_global_hooks() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        default_hook(panic_info);
        tracing::error!("Thread panicked: {}", panic_info);
    }));
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_global_hooks();

    let cli = Cli::parse();
    let _guard = utils::logging::init(cli.log_path.clone());

    tracing::info!("Starting statmon {}", env!("CARGO_PKG_VERSION"));

    let config = cli.pipeline_config()?;
    let router = Arc::new(LogRouter::new());
    router.add(TracingSink::new(cli.log_level));

    let mut sink_config = StatHatConfig::default();
    if let Some(endpoint) = &cli.endpoint {
        sink_config = sink_config.with_endpoint(endpoint.clone());
    }
    let sink = StatHatSink::new(sink_config).context("create StatHat sink failed")?;

    let pipeline = Pipeline::builder()
        .with_config(config)
        .spawn(Arc::new(sink), router)
        .context("start metrics pipeline failed")?;

    if !pipeline.client().is_enabled() {
        tracing::warn!("No StatHat key configured (--api-key or SH_KEY), metrics are discarded");
    }
    pipeline.client().count("[statmon] started", 1);

    wait_for_shutdown_signal().await?;

    let report = pipeline.shutdown().await;
    log_report(&report);

    Ok(())
}

async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).context("install SIGTERM handler failed")?;
        let mut sigint = signal(SignalKind::interrupt()).context("install SIGINT handler failed")?;

        tokio::select! {
            _ = sigterm.recv() => {
                tracing::info!("Received SIGTERM, initiating graceful shutdown");
            }
            _ = sigint.recv() => {
                tracing::info!("Received SIGINT, initiating graceful shutdown");
            }
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .context("install Ctrl+C handler failed")?;
        tracing::info!("Received Ctrl+C, initiating graceful shutdown");
    }

    Ok(())
}

fn log_report(report: &PipelineReport) {
    tracing::info!(
        counts_shipped = report.counts.shipped,
        counts_failed = report.counts.failed,
        counts_discarded = report.counts.discarded,
        measures_shipped = report.measures.shipped,
        measures_failed = report.measures.failed,
        measures_discarded = report.measures.discarded,
        "statmon stopped"
    );
}
