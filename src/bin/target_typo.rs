//! Typo Singer target
//!
//! Reads Singer messages from stdin, delivers records to the Typo import
//! API, and writes released STATE checkpoints to stdout.

use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use serde_json::Value;
use target_typo::{usage, DeliveryClient, HttpTransport, MessageRouter, TargetConfig};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "target-typo", version)]
#[command(about = "Singer target that loads records into Typo")]
struct Cli {
    /// Config file (JSON, or TOML with a .toml extension)
    #[arg(short, long)]
    config: PathBuf,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // stdout carries checkpoints, so logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    tracing::info!("'target-typo:{}' Starting...", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(cli).await {
        tracing::error!(
            "Target-typo cannot get executed at the moment. Please try again later. Details: {:#}",
            e
        );
        std::process::exit(1);
    }

    tracing::info!("Target exiting normally");
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = TargetConfig::load_from(&cli.config)
        .with_context(|| format!("failed to load configuration file {}", cli.config.display()))?;
    tracing::info!(?config, "Target configuration file {} loaded.", cli.config.display());

    if !config.disable_collection {
        usage::spawn_usage_ping(env!("CARGO_PKG_VERSION"));
    }

    let transport = HttpTransport::new(config.connect_timeout(), config.request_timeout())?;
    let client = DeliveryClient::new(&config, Box::new(transport));
    let mut router = MessageRouter::from_config(&config, client);
    router.start().await.context("unable to obtain a token; please validate your configuration")?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut line_number = 0u64;
    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        line_number += 1;
        let released = router
            .process_line(&line)
            .await
            .with_context(|| format!("failed at input line {}", line_number))?;
        if let Some(state) = released {
            emit_state(&state)?;
        }
    }

    if let Some(state) = router.finish().await? {
        emit_state(&state)?;
    }
    Ok(())
}

fn emit_state(state: &Value) -> anyhow::Result<()> {
    let line = serde_json::to_string(state)?;
    tracing::debug!(state = %line, "emitting state");

    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{}", line)?;
    stdout.flush()?;
    Ok(())
}
