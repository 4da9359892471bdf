//! Etapy Bot - Main Entry Point
//!
//! A Telegram bot that keeps construction project stages in an Excel
//! workbook and edits them through a single inline-keyboard panel.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use etapy_bot::commands::{BotCommand, UpdateHandler};
use etapy_bot::config::BotSettings;
use etapy_bot::dispatcher::{DispatchMessage, Dispatcher};
use etapy_bot::store::open_stores;
use etapy_bot::telegram::webhook::{self, WebhookState};
use etapy_bot::telegram::{TelegramBot, run_polling};

/// Capacity of the update queue between the update source and the dispatcher.
const QUEUE_CAPACITY: usize = 64;

/// Telegram bot for tracking construction project stages.
#[derive(Parser, Debug)]
#[command(name = "etapy_bot")]
#[command(about = "Track construction project stages in an Excel workbook via Telegram")]
#[command(version)]
struct Args {
    /// Path to the .env file for environment variables.
    #[arg(long, default_value = ".env")]
    env_file: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Use long polling even if WEBHOOK_URL is set.
    #[arg(long)]
    polling: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level);

    if let Err(e) = dotenvy::from_filename(&args.env_file) {
        debug!("Could not load .env file ({}): {}", args.env_file, e);
    }

    let settings = BotSettings::from_env().context("Failed to load settings from environment")?;

    let (projects, sessions) = open_stores(&settings.data_dir, settings.lock_timeout())
        .with_context(|| format!("Failed to open data directory {}", settings.data_dir.display()))?;
    info!("Workbook: {}", projects.book().path().display());

    let bot = Arc::new(TelegramBot::new(&settings.token).context("Failed to create Telegram client")?);

    let me = bot.get_me().await.context("Failed to reach Telegram")?;
    info!(
        "Logged in as @{} ({})",
        me.username.as_deref().unwrap_or("?"),
        me.id
    );

    if let Err(e) = bot.set_my_commands(&BotCommand::menu()).await {
        warn!("Failed to register bot commands: {}", e);
    }

    let (tx, rx) = mpsc::channel::<DispatchMessage>(QUEUE_CAPACITY);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let source = if settings.uses_webhook() && !args.polling {
        bot.set_webhook(&settings.webhook_endpoint(), settings.webhook_secret.as_deref())
            .await
            .context("Failed to register webhook")?;
        info!("Mode: webhook ({})", settings.webhook_url);

        let addr = SocketAddr::from(([0, 0, 0, 0], settings.port));
        let state = WebhookState::new(&settings.token, settings.webhook_secret.as_deref(), tx.clone());
        let mut stop = shutdown_rx;
        tokio::spawn(async move {
            let shutdown = async move {
                let _ = stop.wait_for(|stopped| *stopped).await;
            };
            if let Err(e) = webhook::serve(addr, state, shutdown).await {
                error!("Webhook listener failed: {}", e);
            }
        })
    } else {
        info!("Mode: polling");
        tokio::spawn(run_polling(Arc::clone(&bot), tx.clone(), shutdown_rx))
    };

    let dispatcher = Dispatcher::new(UpdateHandler::new(Arc::clone(&bot), projects, sessions));
    let dispatcher_handle = tokio::spawn(async move { dispatcher.run(rx).await });

    info!("Bot is running. Use Ctrl+C to stop.");
    wait_for_signal().await;

    info!("Shutting down...");
    let _ = shutdown_tx.send(true);
    let _ = source.await;
    let _ = tx.send(DispatchMessage::Shutdown).await;
    drop(tx);

    match dispatcher_handle.await {
        Ok(handled) => info!("Handled {} updates", handled),
        Err(e) => error!("Dispatcher task failed: {}", e),
    }

    Ok(())
}

/// Initializes the logging subsystem.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Resolves on Ctrl+C, or on SIGTERM where available.
async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => info!("Received Ctrl+C"),
                    _ = term.recv() => info!("Received SIGTERM"),
                }
                return;
            }
            Err(e) => warn!("Cannot listen for SIGTERM: {}", e),
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl+C: {}", e);
    }
}
