//! Contact Import Worker - bulk CSV contact imports for the mailroom backend
//!
//! Accepts CSV uploads over HTTP, runs each import as a background job and
//! publishes live progress on NATS when configured.

mod auth;
mod cli;
mod config;
mod db;
mod defaults;
mod handlers;
mod services;
mod types;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Command};
use crate::config::Config;
use crate::defaults::{DEFAULT_LOGS_DIR, DEFAULT_LOG_FILTER};
use crate::handlers::AppState;
use crate::services::import_processor::ImportProcessor;
use crate::services::import_store::{ImportStore, PgImportStore};
use crate::services::job_events::{JobEvents, LogJobEvents, NatsJobEvents};
use crate::services::running_jobs::RunningJobs;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs directory - use LOGS_DIR env var or default to ../logs (relative to worker)
    let logs_dir = std::env::var("LOGS_DIR").unwrap_or_else(|_| DEFAULT_LOGS_DIR.to_string());
    std::fs::create_dir_all(&logs_dir).ok();

    // File appender for persistent logs (daily rotation)
    let file_appender = RollingFileAppender::new(Rotation::DAILY, &logs_dir, "worker.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    // Initialize logging - both stdout and file
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        ))
        .with(tracing_subscriber::fmt::layer()) // stdout
        .with(tracing_subscriber::fmt::layer().with_writer(non_blocking).with_ansi(false)) // file
        .init();

    let config = Config::from_env()?;
    info!("Configuration loaded");

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Migrate => {
            let pool = db::create_pool(&config.database_url, config.db_max_connections).await?;
            db::run_migrations(&pool).await
        }
        Command::IssueToken { user_id, email } => {
            let token = auth::generate_token(user_id, email.as_deref().unwrap_or_default(), &config.jwt_secret)?;
            println!("{}", token);
            Ok(())
        }
    }
}

async fn serve(config: Config) -> Result<()> {
    info!("Starting Contact Import Worker...");

    let pool = db::create_pool(&config.database_url, config.db_max_connections)
        .await
        .context("Failed to connect to PostgreSQL")?;
    info!("Connected to PostgreSQL");

    db::run_migrations(&pool).await?;

    let events = connect_events(&config).await;

    tokio::fs::create_dir_all(&config.upload_dir)
        .await
        .with_context(|| format!("Failed to create upload dir {}", config.upload_dir.display()))?;

    let store: Arc<dyn ImportStore> = Arc::new(PgImportStore::new(pool));
    let processor = Arc::new(ImportProcessor::new(
        Arc::clone(&store),
        events,
        RunningJobs::new(),
        config.import_settings(),
    ));

    let state = AppState {
        store,
        processor,
        jwt_secret: Arc::from(config.jwt_secret.as_str()),
        upload_dir: config.upload_dir.clone(),
        max_upload_bytes: config.max_upload_bytes,
    };

    if let Err(e) = handlers::start_server(&config, state).await {
        error!("Server error: {}", e);
        return Err(e);
    }

    Ok(())
}

/// Connect to NATS for status events (supports optional NATS_USER/NATS_PASSWORD auth).
/// Falls back to log-only events when NATS is not configured or unreachable.
async fn connect_events(config: &Config) -> Arc<dyn JobEvents> {
    let Some(url) = config.nats_url.as_deref() else {
        info!("NATS_URL not set, import status events are only logged");
        return Arc::new(LogJobEvents);
    };

    let connected = match (&config.nats_user, &config.nats_password) {
        (Some(user), Some(password)) => {
            async_nats::ConnectOptions::new()
                .user_and_password(user.clone(), password.clone())
                .connect(url)
                .await
        }
        _ => async_nats::connect(url).await,
    };

    match connected {
        Ok(client) => {
            info!("Connected to NATS at {}", url);
            Arc::new(NatsJobEvents::new(client))
        }
        Err(e) => {
            warn!("Failed to connect to NATS at {}: {}. Status events are only logged", url, e);
            Arc::new(LogJobEvents)
        }
    }
}
