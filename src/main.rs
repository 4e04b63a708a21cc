//! N3TP - unified CLI
//!
//! Runs either the tic-tac-toe server or the interactive client.

#![warn(missing_docs)]

mod cli;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Command};
use n3tp::{ClientConfig, ConfigFile, ServerConfig};
use tracing::{info, instrument};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let (server_config, client_config) = ConfigFile::load(cli.config.as_deref())?.into_parts();

    match cli.command {
        Command::Serve {
            port,
            host,
            drain_timeout,
        } => {
            init_tracing("info");
            let mut config = server_config;
            if let Some(port) = port {
                config = config.with_port(port);
            }
            if let Some(host) = host {
                config = config.with_host(host);
            }
            if let Some(secs) = drain_timeout {
                config = config.with_drain_timeout_secs(secs);
            }
            run_server(config).await
        }
        Command::Play {
            host,
            port,
            name,
            poll_interval,
        } => {
            // Keep the terminal for the game; only warnings go to stderr.
            init_tracing("warn");
            let mut config = client_config;
            if let Some(host) = host {
                config = config.with_host(host);
            }
            if let Some(port) = port {
                config = config.with_port(port);
            }
            if let Some(ms) = poll_interval {
                config = config.with_poll_interval_ms(ms);
            }
            run_client(config, name).await
        }
    }
}

fn init_tracing(default_filter: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Run the game server until the listener closes and games drain.
#[instrument(skip_all, fields(address = %config.bind_address()))]
async fn run_server(config: ServerConfig) -> Result<()> {
    info!("Starting N3TP server");
    let reason = n3tp::serve(&config).await?;
    info!(?reason, "Server terminating");
    Ok(())
}

/// Run the interactive client.
#[instrument(skip_all, fields(address = %config.server_address()))]
async fn run_client(config: ClientConfig, name: Option<String>) -> Result<()> {
    n3tp::play(&config, name).await?;
    Ok(())
}
