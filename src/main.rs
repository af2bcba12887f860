//! Application entry point for the `campus-airwatch` service.
//!
//! This binary orchestrates the full startup sequence, including:
//! - Loading configuration from environment variables or `.env`
//! - Initializing structured logging/tracing
//! - Connecting the configured readings source
//! - Spawning the refresh scheduler (`fetch -> engine -> publish`)
//! - Mounting all API routes via the `routes` gateway (EMBP pattern)
//! - Binding the Axum HTTP server and serving requests
//!
//! # Environment Variables
//! See [`campus_airwatch::config::load_from_env`] for the full list.
//! - `AIRWATCH_LOG_LEVEL` (optional) – log verbosity (default: `debug`)
//! - `AIRWATCH_SPAN_EVENTS` (optional) – span event mode for tracing
use std::{env, sync::Arc};

use axum::Router;
use dotenvy::dotenv;
use is_terminal::IsTerminal;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

use anyhow::Result;

use campus_airwatch::{config, routes, scheduler::Scheduler, source::ReadingSource, Engine};

// ---

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    init_tracing();
    dotenv().ok();

    let cfg = config::load_from_env()?;
    cfg.log_config();

    let source = ReadingSource::connect(&cfg).await?;
    let engine = Engine::new(cfg.engine.clone());

    let scheduler = Scheduler::new(Arc::new(engine), Arc::new(source), cfg.window);
    let _refresh_loop = scheduler.clone().spawn(cfg.poll_interval);

    // Build app from routes gateway (EMBP)
    let app: Router = routes::router(scheduler);

    tracing::info!("Listening on {}", cfg.listen_addr);

    let listener = tokio::net::TcpListener::bind(cfg.listen_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ---

/// Install the global `tracing` subscriber. Call once, before any logging.
///
/// - `RUST_LOG` wins when set; otherwise `AIRWATCH_LOG_LEVEL` picks the level
///   (default `debug`) with sqlx query logs held at `warn`.
/// - `AIRWATCH_SPAN_EVENTS`: `full`, `enter_exit`, or close events only.
/// - `FORCE_COLOR` forces ANSI colour on or off; otherwise it follows the TTY.
fn init_tracing() {
    // ---
    let span_events = match env::var("AIRWATCH_SPAN_EVENTS").as_deref() {
        Ok("full") => FmtSpan::FULL,
        Ok("enter_exit") => FmtSpan::ENTER | FmtSpan::EXIT,
        _ => FmtSpan::CLOSE,
    };

    // Determine if we should use colors
    let use_color = match env::var("FORCE_COLOR").as_deref() {
        Ok("1") | Ok("true") | Ok("yes") => true,
        Ok("0") | Ok("false") | Ok("no") => false,
        _ => std::io::stdout().is_terminal(),
    };

    // Use RUST_LOG if available, otherwise fall back to AIRWATCH_LOG_LEVEL
    let env_filter = if env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match env::var("AIRWATCH_LOG_LEVEL").ok().as_deref() {
            Some("trace") => "trace",
            Some("debug") => "debug",
            Some("info") => "info",
            Some("warn") => "warn",
            Some("error") => "error",
            _ => "debug",
        };
        EnvFilter::new(format!("{level},sqlx::query=warn,hyper=info"))
    };

    tracing_subscriber::fmt()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(span_events)
        .with_env_filter(env_filter)
        .with_ansi(use_color)
        .compact()
        .init();
}
