//! Beacon binary entrypoint: one queue pop, one fan-out, then exit.

use std::fs::OpenOptions;
use std::process::ExitCode;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

use beacon_common::config::AppConfig;
use beacon_notifier::Dispatcher;
use beacon_notifier::transport::DingTalkConnector;

const LOG_FILE: &str = "run.log";

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "Beacon aborted");
            eprintln!("beacon: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> anyhow::Result<ExitCode> {
    // Load configuration
    let config = AppConfig::from_env()?;

    // Create directories and start logging
    init_logging(&config)?;

    tracing::info!(base_dir = %config.base_dir.display(), "Beacon starting...");

    let connector = DingTalkConnector::new(config.http_timeout())?;
    let dispatcher = Dispatcher::from_config(connector, &config);

    match dispatcher.run().await {
        Ok(summary) => {
            tracing::info!(sent = %summary, "Beacon finished");
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            tracing::error!(error = %e, "Run aborted");
            Ok(ExitCode::from(e.exit_code()))
        }
    }
}

fn init_logging(config: &AppConfig) -> anyhow::Result<()> {
    let log_dir = config.log_path();
    std::fs::create_dir_all(&log_dir)?;
    if let Some(config_dir) = config.config_path().parent() {
        std::fs::create_dir_all(config_dir)?;
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join(LOG_FILE))?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("beacon=info,beacon_notifier=info,beacon_common=info")
        }))
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();

    Ok(())
}
