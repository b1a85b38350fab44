use std::process::ExitCode;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use veoq_worker::{RunSummary, WorkerConfig};

const DEFAULT_LOG_FILTER: &str = "veoq_worker=debug,veoq_queue=debug,veoq_veo=info";

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    init_tracing();

    let outcome = tokio::select! {
        result = run() => result,
        () = shutdown_signal() => {
            tracing::warn!("Interrupted; unfinished jobs are abandoned");
            return ExitCode::FAILURE;
        }
    };

    match outcome {
        Ok(summary) if summary.all_succeeded() => ExitCode::SUCCESS,
        Ok(summary) => {
            if summary.credential_rejected {
                tracing::error!("Stopped early: select a valid API key and run again");
            }
            ExitCode::FAILURE
        }
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "Worker failed");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> anyhow::Result<RunSummary> {
    let config = WorkerConfig::from_env()?;
    tracing::info!(
        max_concurrent = config.queue.max_concurrent,
        max_per_minute = config.queue.max_per_minute,
        output_dir = %config.output_dir.display(),
        "Loaded worker configuration",
    );
    veoq_worker::run(config).await
}

/// Plain text logs by default; `LOG_FORMAT=json` for one JSON object per line.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    let registry = tracing_subscriber::registry().with(filter);

    if std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json")) {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Resolve on SIGINT (Ctrl-C) or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received SIGINT (Ctrl-C)"),
        () = terminate => tracing::info!("Received SIGTERM"),
    }
}
