//! Deskbridge - JIRA and Zendesk reconciliation
//!
//! Main entry point for the Deskbridge CLI.

use clap::Parser;
use deskbridge::config::{validate_config_result, BridgeConfig};
use deskbridge::runner::{self, Runner};
use std::path::PathBuf;
use std::process;
use std::time::Duration;

/// Default seconds between passes when `--watch` is given without a value
const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;

/// Deskbridge - keep JIRA issues and Zendesk tickets in step
#[derive(Parser, Debug)]
#[command(name = "deskbridge")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to config file (default: ~/.config/deskbridge/config.yaml)
    #[arg(short, long, env = "DESKBRIDGE_CONFIG")]
    config: Option<PathBuf>,

    /// Log at debug level (RUST_LOG takes precedence)
    #[arg(short, long)]
    verbose: bool,

    /// JQL overriding the configured issue query
    #[arg(short = 'Q', long)]
    query: Option<String>,

    /// Keep running, one pass every SECS seconds (default: poll_interval_secs or 60)
    #[arg(long, value_name = "SECS")]
    watch: Option<Option<u64>>,
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = deskbridge::logging::init(cli.verbose) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run(cli: Cli) -> deskbridge::Result<()> {
    let config = match cli.config {
        Some(ref path) => BridgeConfig::load(path)?,
        None => BridgeConfig::load_default()?,
    };
    validate_config_result(&config)?;

    tracing::info!(
        tracker = %config.tracker.url,
        desk = %config.desk.url,
        "Configuration loaded"
    );

    let poll_interval = cli.watch.map(|secs| {
        let secs = secs
            .or(config.poll_interval_secs)
            .unwrap_or(DEFAULT_POLL_INTERVAL_SECS);
        Duration::from_secs(secs.max(1))
    });

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let mut bridge = runner::connect(config).await?;
        if let Some(query) = cli.query {
            bridge = bridge.with_issue_query(query);
        }

        let mut runner = Runner::new(bridge);
        if let Some(interval) = poll_interval {
            runner = runner.with_poll_interval(interval);
        }

        runner.run().await
    })
}
