mod cli;

use std::collections::HashSet;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use prometheus::{Encoder, TextEncoder};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use adder_bench_core::{
    load_config_or_default, metrics, validate_config, BenchOrchestrator, DirectoryRunStore,
    Filelist, RunPaths, RunSummary, TokioProcessInvoker,
};

use cli::Cli;

/// Exit code when the run finished but some identifier failed.
const EXIT_FAILURES: i32 = 2;

/// Exit code on a forced shutdown, as a shell reports SIGINT.
const EXIT_INTERRUPTED: i32 = 130;

#[tokio::main]
async fn main() {
    match run().await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            error!("Fatal error: {:#}", e);
            std::process::exit(1);
        }
    }
}

async fn run() -> Result<i32> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    // Load configuration
    match &cli.config {
        Some(path) => info!("Loading configuration from {:?}", path),
        None => info!("No configuration file, using defaults"),
    }
    let mut config = load_config_or_default(cli.config.as_deref())
        .with_context(|| format!("Failed to load config from {:?}", cli.config))?;
    cli.apply_overrides(&mut config);

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;
    info!("Configuration hash: {}", config.fingerprint());

    let filelist = Filelist::load(&cli.filelist)
        .await
        .context("Failed to load filelist")?;
    info!("Loaded {} identifiers from {:?}", filelist.len(), cli.filelist);

    let paths = RunPaths::new(
        cli.dataset.clone(),
        cli.filelist.clone(),
        cli.output_root.clone(),
        cli.scratch_dir.clone(),
    );
    let invoker = Arc::new(TokioProcessInvoker::from_timeout_secs(
        config.runner.step_timeout_secs,
    ));
    let store = Arc::new(
        DirectoryRunStore::new(&paths.output_root)
            .with_report_file_name(config.quality.report_file_name.clone()),
    );
    info!("Results under {:?}", store.output_root());
    let orchestrator = Arc::new(BenchOrchestrator::new(config, paths, invoker, store));

    if cli.dry_run {
        print_plan(&orchestrator, &filelist).await?;
        return Ok(0);
    }

    orchestrator
        .validate_tools()
        .await
        .context("Required program is not available")?;

    {
        let orchestrator = Arc::clone(&orchestrator);
        tokio::spawn(async move {
            let code = watch_signals(shutdown_signal, move || orchestrator.stop()).await;
            std::process::exit(code);
        });
    }

    let summary = orchestrator
        .run(&filelist)
        .await
        .context("Benchmark run failed")?;

    if let Some(path) = &cli.summary_json {
        write_summary(path, &summary).await?;
    }
    if let Some(path) = &cli.metrics_out {
        write_metrics(path).await?;
    }

    if summary.has_failures() || summary.aborted {
        warn!(
            "{} of {} identifiers failed",
            summary.failed,
            summary.items.len()
        );
        return Ok(EXIT_FAILURES);
    }
    Ok(0)
}

/// First signal stops after the current identifier, a second one forces
/// the process out. Returns the exit code for the forced exit.
async fn watch_signals<S, F>(mut next_signal: S, stop: impl FnOnce()) -> i32
where
    S: FnMut() -> F,
    F: Future<Output = ()>,
{
    next_signal().await;
    warn!("Shutdown requested, finishing the current identifier (repeat to force quit)");
    stop();

    next_signal().await;
    error!("Forced shutdown");
    EXIT_INTERRUPTED
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Prints the commands of every identifier that still needs work.
async fn print_plan(
    orchestrator: &BenchOrchestrator<TokioProcessInvoker, DirectoryRunStore>,
    filelist: &Filelist,
) -> Result<()> {
    let mut seen = HashSet::new();
    for identifier in filelist.iter() {
        if !seen.insert(identifier) {
            continue;
        }
        if !orchestrator.is_pending(identifier).await? {
            println!("# {}: already processed", identifier);
            continue;
        }
        println!("# {}", identifier);
        for invocation in orchestrator.plan(identifier) {
            println!("{}", invocation.command_line());
        }
    }
    Ok(())
}

async fn write_summary(path: &Path, summary: &RunSummary) -> Result<()> {
    let json = serde_json::to_string_pretty(summary)?;
    tokio::fs::write(path, json)
        .await
        .with_context(|| format!("Failed to write summary to {:?}", path))?;
    info!("Run summary written to {:?}", path);
    Ok(())
}

async fn write_metrics(path: &Path) -> Result<()> {
    let mut buffer = Vec::new();
    TextEncoder::new()
        .encode(&metrics::registry().gather(), &mut buffer)
        .context("Failed to encode metrics")?;
    tokio::fs::write(path, buffer)
        .await
        .with_context(|| format!("Failed to write metrics to {:?}", path))?;
    Ok(())
}
