//! # Gatehouse - Tollgate bot-protection service
//!
//! Issues signed proof-of-work challenges, verifies solutions, guards
//! mutating endpoints with a double-submit CSRF cookie, and bridges the
//! third-party CAPTCHA siteverify call.
//!
//! ## Flow
//! ```text
//! Browser ── GET /csrf-token ──▶ Gatehouse   (cookie + token)
//!         ── POST /challenge ──▶            (signed challenge)
//!         ── solve locally
//!         ── POST /verify ─────▶            (HMAC + work check)
//! ```
//!
//! Gatehouse keeps no per-challenge state: verification recomputes the
//! signature from the submitted payload and the server secret.

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod config;
mod csrf;
mod error;
mod pow;
mod routes;
mod siteverify;
mod state;

use config::AppConfig;
use state::AppState;

/// Tollgate Gatehouse - proof-of-work login gate
#[derive(Parser, Debug)]
#[command(name = "gatehouse")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config/gatehouse.toml")]
    config: String,

    /// Listen address (overrides config)
    #[arg(short, long, env = "LISTEN_ADDR")]
    listen: Option<String>,

    /// Required leading zero hex chars (overrides config)
    #[arg(long, env = "TOLLGATE_DIFFICULTY")]
    difficulty: Option<usize>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "LOG_LEVEL")]
    log_level: String,

    /// Enable JSON logging output
    #[arg(long, default_value = "false")]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Secrets usually live in .env during development
    let dotenv_loaded = dotenvy::dotenv().is_ok();

    let args = Args::parse();

    init_logging(&args.log_level, args.json_logs)?;

    info!("Starting Tollgate Gatehouse v{}", env!("CARGO_PKG_VERSION"));
    if dotenv_loaded {
        info!("Loaded environment from .env");
    }

    let config = AppConfig::load(&args.config, &args)?;
    info!(
        difficulty = config.pow.difficulty,
        challenge_ttl_secs = config.pow.challenge_ttl_secs,
        "Configuration loaded from {}",
        args.config
    );

    if !config.secrets.has_hmac_secret() {
        warn!("HMAC secret is not set; /challenge and /verify will answer 500");
    }
    if !config.secrets.has_captcha_secret() {
        warn!("CAPTCHA secret is not set; /verify-captcha will answer 500");
    }

    let state = AppState::new(config.clone())?;
    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen_addr))?;
    info!("Gatehouse listening on {}", config.listen_addr);

    let shutdown_signal = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
        info!("Shutdown signal received");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await
        .context("Server error")?;

    info!("Gatehouse shutdown complete");
    Ok(())
}

/// Initialize structured logging with tracing
fn init_logging(level: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init()
            .context("Failed to install JSON log subscriber")?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_thread_ids(true))
            .try_init()
            .context("Failed to install log subscriber")?;
    }

    Ok(())
}
