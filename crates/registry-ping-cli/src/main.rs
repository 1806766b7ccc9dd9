//! registry-ping: report container image tags that are new or were re-pushed
//!
//! Reads a YAML list of image references, asks each registry for the tag's
//! last push time, prints one line per new or advanced tag and records the
//! timestamps in a JSON state file. Exits non-zero if any image failed.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use registry_ping_core::{Checker, Config, RunReport, ScraperRegistry, StdoutNotifier};
use registry_ping_dockerhub::{build_http_client, DockerHubScraper};
use registry_ping_state::JsonStateStore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn, Level};

#[derive(Parser, Debug)]
#[command(name = "registry-ping")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Report new and re-pushed container image tags", long_about = None)]
struct Cli {
    /// Path to the YAML config file
    #[arg(short, long, env = "REGISTRY_PING_CONFIG", default_value = "config.yaml")]
    config: PathBuf,

    /// Override the state file from the config
    #[arg(long)]
    state_file: Option<PathBuf>,

    /// Override the whole-run deadline, in seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    json: bool,
}

impl Cli {
    /// Load the config file and apply command-line overrides.
    fn resolve_config(&self) -> Result<Config> {
        let mut config = Config::load(&self.config)?;
        if let Some(state_file) = &self.state_file {
            config.state_file = state_file.clone();
        }
        if let Some(timeout) = self.timeout {
            config.timeout_secs = timeout;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    registry_ping_core::init_tracing(cli.json, level);

    let config = cli
        .resolve_config()
        .with_context(|| format!("Failed to load config {}", cli.config.display()))?;

    let report = cmd_check(&config).await?;
    info!(
        checked = report.checked,
        changes = report.changes(),
        unchanged = report.unchanged,
        "All images checked"
    );
    Ok(())
}

fn build_checker(config: &Config) -> Result<Checker> {
    let client =
        build_http_client(config.http_timeout()).context("Failed to build HTTP client")?;

    let mut dockerhub = DockerHubScraper::new(client);
    if let Some(base_url) = &config.dockerhub_base_url {
        dockerhub = dockerhub.with_base_url(base_url.as_str());
    }

    Ok(Checker::new(
        ScraperRegistry::new().register(Arc::new(dockerhub)),
        Arc::new(JsonStateStore::new(&config.state_file)),
        Arc::new(StdoutNotifier::new()),
    ))
}

async fn cmd_check(config: &Config) -> Result<RunReport> {
    let checker = build_checker(config)?;
    let refs = config.references();

    info!(
        images = refs.len(),
        state_file = %config.state_file.display(),
        timeout_secs = config.timeout_secs,
        "Checking images"
    );

    let cancel = CancellationToken::new();
    let watchdog = spawn_cancel_on_deadline_or_interrupt(cancel.clone(), config.timeout());
    let result = checker.run(&cancel, &refs).await;
    watchdog.abort();

    match result {
        Ok(report) => Ok(report),
        Err(err) => {
            for failure in err.iter() {
                error!(reference = %failure.reference, error = %failure.error, "Image check failed");
            }
            Err(anyhow::Error::new(err))
        }
    }
}

/// Cancel `cancel` once `deadline` elapses or on Ctrl-C, whichever is first.
fn spawn_cancel_on_deadline_or_interrupt(
    cancel: CancellationToken,
    deadline: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let interrupted = async {
            if tokio::signal::ctrl_c().await.is_err() {
                // No signal handler available; rely on the deadline alone.
                std::future::pending::<()>().await;
            }
        };

        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(deadline) => {
                warn!(timeout_secs = deadline.as_secs(), "Run deadline reached, cancelling remaining checks");
            }
            _ = interrupted => {
                warn!("Interrupted, cancelling remaining checks");
            }
        }
        cancel.cancel();
    })
}
