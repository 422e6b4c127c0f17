use anyhow::Context;
use chrono::Local;
use clap::Parser;
use scanocr_batch::{run, BatchConfig, BatchJob, BatchReport, ExtensionFilter, HttpClient, RunOptions, TracingSink};
use scanocr_core::init_logging;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "scanocr-batch")]
#[command(about = "Send every scanned image under a directory to a scanocr server")]
struct Args {
    /// Path to the batch configuration file
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    /// Directory to scan, replacing `root_path`/`source_path`
    #[arg(long)]
    root: Option<PathBuf>,

    /// Server base URL, e.g. http://127.0.0.1:5000
    #[arg(long)]
    server: Option<String>,

    /// Write the JSON report here
    #[arg(long)]
    report: Option<PathBuf>,

    /// Requests in flight at once
    #[arg(long)]
    concurrency: Option<usize>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = BatchConfig::load(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    if let Some(root) = args.root {
        config.root_path = root;
        config.source_path = None;
    }
    if let Some(server) = args.server {
        config.server_url = server;
    }
    if let Some(report) = args.report {
        config.report_path = Some(report);
    }
    if let Some(concurrency) = args.concurrency {
        config.concurrency = concurrency;
    }
    config.validate()?;

    if let Some(path) = init_logging("scanocr-batch", &config.logging)? {
        tracing::info!("Logging to {}", path.display());
    }
    tracing::info!("scanocr-batch ver {}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        languages = %config.languages,
        compute = %config.compute_mode,
        server = %config.server_url,
        concurrency = config.concurrency,
        cpu_use_percent = ?config.limits.cpu_use_percent,
        memory_use_percent = ?config.limits.memory_use_percent,
        "Batch configuration"
    );

    let client = HttpClient::new(&config).context("building HTTP client")?;
    let source = config.source_dir();
    let extensions = ExtensionFilter::new(&config.image_extensions);
    let mut job = BatchJob::discover(source.clone(), extensions, config.io_timeout())
        .await
        .with_context(|| format!("scanning {}", source.display()))?;
    tracing::info!(files = job.len(), root = %source.display(), "Discovered images");

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupted, finishing in-flight requests...");
                cancel.cancel();
            }
        }
    });

    let options = RunOptions {
        concurrency: config.concurrency,
        request_timeout: config.request_timeout(),
    };
    let started_at = Local::now();
    let completed = run(&mut job, &client, &options, &mut TracingSink, &cancel).await;
    let report = BatchReport::new(job, started_at, Local::now(), !completed);

    report.log_summary();
    if let Some(path) = &config.report_path {
        match report.write_json(path, config.io_timeout()).await {
            Ok(()) => tracing::info!("Report written to {}", path.display()),
            Err(e) => tracing::error!("{e}"),
        }
    }

    Ok(())
}
