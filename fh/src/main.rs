//! FanHub - real-time fan-out message hub
//!
//! CLI entry point for serving a hub and joining one interactively.

use std::fs;
use std::time::Duration;

use clap::Parser;
use eyre::{Context, Result};
use tokio::sync::mpsc;
use tracing::{info, warn};

use fanhub::cli::{Cli, Command, get_log_path};
use fanhub::client;
use fanhub::config::Config;
use fanhub::envelope::JsonCodec;
use fanhub::hub::Hub;
use fanhub::server::Server;

/// How long open connections get to close cleanly on shutdown
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

fn setup_logging(log_level: Option<&str>) -> Result<()> {
    let log_path = get_log_path();
    if let Some(log_dir) = log_path.parent() {
        fs::create_dir_all(log_dir).context("Failed to create log directory")?;
    }

    // Write to log file, not stdout/stderr: the client owns the terminal
    let level = match log_level.map(str::to_uppercase).as_deref() {
        Some("TRACE") => tracing::Level::TRACE,
        Some("DEBUG") => tracing::Level::DEBUG,
        Some("WARN") | Some("WARNING") => tracing::Level::WARN,
        Some("ERROR") => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    };
    let log_file = fs::File::create(&log_path).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Priority: CLI > config file > INFO
    let log_level = cli
        .log_level
        .clone()
        .or_else(|| Config::load_log_level(cli.config.as_ref()));
    setup_logging(log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    match cli.command {
        Command::Serve { listen } => cmd_serve(config, listen).await,
        Command::Connect { url } => cmd_connect(&config, url).await,
    }
}

async fn cmd_serve(mut config: Config, listen: Option<String>) -> Result<()> {
    if let Some(listen) = listen {
        config.server.listen = listen;
    }
    config.validate().context("Invalid configuration")?;

    let hub = Hub::new(config.hub.clone());
    let handle = hub.handle();
    let hub_task = tokio::spawn(hub.run());

    let server = Server::bind(&config).await?;
    let addr = server.local_addr()?;
    println!("FanHub listening on ws://{}{}", addr, config.server.path);

    let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
    let server_task = tokio::spawn(server.run(handle.clone(), shutdown_rx));

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;

        tokio::select! {
            _ = sigint.recv() => warn!("SIGINT received"),
            _ = sigterm.recv() => warn!("SIGTERM received"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        warn!("Ctrl-C received");
    }

    info!("Hub shutting down...");
    let _ = shutdown_tx.send(()).await;
    let peers = match server_task.await {
        Ok(peers) => Some(peers),
        Err(e) => {
            warn!(error = %e, "Server task failed");
            None
        }
    };

    match handle.metrics().await {
        Ok(metrics) => info!(?metrics, "Final hub metrics"),
        Err(e) => warn!(error = %e, "Failed to read final metrics"),
    }
    handle.shutdown().await?;
    if let Err(e) = hub_task.await {
        warn!(error = %e, "Hub task failed");
    }

    // Closed mailboxes make every writer send its close frame
    if let Some(peers) = peers {
        let aborted = peers.drain(SHUTDOWN_GRACE).await;
        info!(aborted, "Peers closed");
    }

    println!("FanHub stopped");
    Ok(())
}

async fn cmd_connect(config: &Config, url: Option<String>) -> Result<()> {
    let url = url.unwrap_or_else(|| config.client.url.clone());
    client::run(&url, &JsonCodec).await
}
