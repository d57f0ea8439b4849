//! `chartflow` Server Binary
//!
//! Starts the chartflow HTTP server: upload/session API plus the cleanup
//! control surface, with the background cleanup scheduler running when
//! enabled.
//!
//! ## Usage
//!
//! ```bash
//! # Start server with default settings
//! cargo run --bin chartflow-server
//!
//! # Start with custom address
//! cargo run --bin chartflow-server -- --host 0.0.0.0 --port 9000
//! ```

use chartflow::config::LoggingConfig;
use chartflow::protocol::rest;
use chartflow::protocol::Handler;
use chartflow::Config;

use anyhow::Context;
use std::env;
use std::sync::Arc;
use std::sync::OnceLock;

static TRACE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    // Load configuration
    let mut config = match get_arg(&args, "--config") {
        Some(path) => Config::from_file(&path)
            .with_context(|| format!("failed to load configuration from {path}"))?,
        None => Config::load().unwrap_or_else(|_| {
            eprintln!("Using default configuration");
            Config::default()
        }),
    };

    // Initialize tracing using config as fallback when env vars are not set
    init_tracing(&config.logging);

    // Override HTTP config from command line
    if let Some(host) = get_arg(&args, "--host") {
        config.http.host = host;
    }
    if let Some(port) = get_arg(&args, "--port").and_then(|p| p.parse().ok()) {
        config.http.port = port;
    }

    let http_config = config.http.clone();

    // Configuration errors are fatal before anything is spawned
    let handler = Arc::new(Handler::from_config(config).context("failed to initialize")?);

    tracing::info!(
        temp_dir = %handler.config().storage.temp_dir.display(),
        ttl_secs = handler.config().cleanup.ttl_secs,
        interval_secs = handler.config().cleanup.interval_secs,
        "chartflow initialized"
    );

    rest::start_http_server(handler, &http_config)
        .await
        .map_err(|e| anyhow::anyhow!("server error: {e}"))?;

    Ok(())
}

/// Extract `--flag value` style argument
fn get_arg(args: &[String], flag: &str) -> Option<String> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

/// Initialize the tracing subscriber.
///
/// `RUST_LOG` wins when set; otherwise the configured level applies.
/// With `logging.dir` set, output also goes to a daily-rotated file via
/// a non-blocking appender whose guard lives for the whole process.
fn init_tracing(logging: &LoggingConfig) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.level.clone()));

    match &logging.dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "chartflow.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = TRACE_GUARD.set(guard);
            if logging.format == "json" {
                tracing_subscriber::fmt()
                    .json()
                    .with_env_filter(filter)
                    .with_writer(writer)
                    .init();
            } else {
                tracing_subscriber::fmt()
                    .with_env_filter(filter)
                    .with_writer(writer)
                    .with_ansi(false)
                    .init();
            }
        }
        None => {
            if logging.format == "json" {
                tracing_subscriber::fmt()
                    .json()
                    .with_env_filter(filter)
                    .init();
            } else {
                tracing_subscriber::fmt().with_env_filter(filter).init();
            }
        }
    }
}
