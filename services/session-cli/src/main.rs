//! Tourism session client
//!
//! Command-line host for the session manager:
//! 1. Loads configuration and opens the credential file
//! 2. Hydrates the session before any command runs
//! 3. Executes one command through the refreshing API client

mod callback;
mod commands;
mod config;
mod error;
mod metrics;
mod navigator;

use anyhow::{Context, Result};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::commands::{App, USAGE, parse_args};
use crate::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // JSON logs on stderr keep stdout for command output
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        println!("{USAGE}");
        return Ok(());
    }
    let invocation = match parse_args(&args) {
        Ok(invocation) => invocation,
        Err(e) => {
            eprintln!("{USAGE}");
            return Err(e.into());
        }
    };

    let prometheus = if invocation.metrics {
        Some(metrics::install_recorder().context("installing metrics recorder")?)
    } else {
        None
    };

    let location = Config::resolve_path(invocation.config_path.as_deref());
    info!(path = %location.path.display(), explicit = location.explicit, "loading configuration");
    let config = Config::load_from(&location)
        .with_context(|| format!("failed to load config from {}", location.path.display()))?;
    info!(
        base_url = %config.api.base_url,
        storage = %config.storage.path.display(),
        "configuration loaded"
    );

    let app = App::build(config, &invocation.command).await?;
    if let Some(report) = app.hydrate().await {
        debug!(restored = report.restored, "session hydrated");
    }

    let result = app.run(invocation.command).await;

    if let Some(handle) = prometheus {
        eprintln!("{}", handle.render());
    }
    result
}
