use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use kick_live_notify::config::{AppConfig, Args};
use kick_live_notify::http::ReqwestTransport;
use kick_live_notify::publish::{GitPublisher, MarkerPublisher};
use kick_live_notify::reporter::{self, ReportFormat};
use kick_live_notify::runner::Runner;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = AppConfig::from_args(args)?;

    let mode = if config.dry_run { "dry-run" } else { "live" };
    info!(
        "Checking {} ({mode}) — window={}m dedup={} rename={}",
        config.user,
        config.window_minutes,
        config.dedup_enabled(),
        config.rename.is_some(),
    );

    let http = ReqwestTransport::new()?;
    let git = config
        .persistence
        .as_ref()
        .map(|p| GitPublisher::new(p, "."));
    let publisher = git.as_ref().map(|g| g as &dyn MarkerPublisher);

    let report = Runner::new(&config, &http, publisher)
        .run_once(chrono::Utc::now())
        .await;
    reporter::report_run(&report, ReportFormat::for_run(config.dry_run))?;

    Ok(if report.outcome.is_failure() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
