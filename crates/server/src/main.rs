use anyhow::Context;
use clap::Parser;
use scanocr_core::init_logging;
use scanocr_server::{router, AppState, ServerConfig};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "scanocr-server")]
#[command(about = "Text recognition over HTTP with histogram-adaptive binarization")]
struct Args {
    /// Path to the server configuration file
    #[arg(long, default_value = "server.toml")]
    config: PathBuf,

    /// Listen address, overriding `bind` from the config file
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = ServerConfig::load(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    if let Some(bind) = args.bind {
        config.bind = bind;
    }

    if let Some(path) = init_logging("scanocr-server", &config.logging)? {
        tracing::info!("Logging to {}", path.display());
    }

    let factory = config.engine.build_factory()?;
    let state = AppState::new(config.clone(), factory);
    let devices = state.service.devices();
    tracing::info!(
        engine = state.service.engine_name(),
        gpu_devices = devices.gpus,
        cpu_workers = devices.cpu_workers,
        languages = %config.default_languages,
        compute = %config.default_compute,
        "Recognition service ready"
    );
    if config.limits.cpu_use_percent.is_some() || config.limits.memory_use_percent.is_some() {
        tracing::info!(
            cpu_use_percent = ?config.limits.cpu_use_percent,
            memory_use_percent = ?config.limits.memory_use_percent,
            "Resource limits configured (not enforced)"
        );
    }

    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("binding {}", config.bind))?;
    tracing::info!("scanocr-server listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
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
                tracing::error!("Failed to install SIGTERM handler: {e}");
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

    tracing::info!("Shutdown signal received, draining in-flight requests...");
}
