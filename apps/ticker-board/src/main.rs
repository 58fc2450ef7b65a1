//! Ticker Board Binary
//!
//! Runs the board engine against the configured feed and serves the
//! health and snapshot endpoints.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin ticker-board
//! ```
//!
//! # Environment Variables
//!
//! - `BOARD_FEED`: simulated | websocket (default: simulated)
//! - `BOARD_FEED_URL`: WebSocket server URL (default: ws://localhost:9001)
//! - `BOARD_FEED_NODE` / `BOARD_FEED_LANE`: Linked lane (default: /symbols, stocks)
//! - `BOARD_RENDER_INTERVAL_MS`: Minimum time between snapshots (default: 16)
//! - `BOARD_HIGHLIGHT_DURATION_MS`: Highlight duration (default: 2000)
//! - `BOARD_HEALTH_PORT`: Health/snapshot HTTP port (default: 8083)
//! - `BOARD_SEARCH`: Initial search string (default: empty)
//! - `OTEL_ENABLED`: Export spans over OTLP (default: false)
//! - `RUST_LOG`: Log level (default: info)

use std::sync::Arc;
use std::time::Duration;

use ticker_board::infrastructure::feed::build_feed;
use ticker_board::infrastructure::health::{HealthServer, HealthServerState};
use ticker_board::infrastructure::telemetry;
use ticker_board::{BoardConfig, BoardEngine, BoardHandle, init_metrics};
use tokio::signal;
use tokio_util::sync::CancellationToken;

/// Time allowed for the engine and feed to wind down.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        return Err("failed to install rustls crypto provider".into());
    }

    load_dotenv();

    let _telemetry_guard = telemetry::init();

    tracing::info!("Starting Ticker Board");

    let _metrics_handle = init_metrics();

    let config = BoardConfig::from_env()?;
    log_config(&config);

    let shutdown_token = CancellationToken::new();

    let (engine, handle, sink) = BoardEngine::new(config.engine_settings());
    if !config.board.initial_search.is_empty() {
        handle.set_search(&config.board.initial_search);
    }

    let (feed, feed_state) = build_feed(&config);

    let health_state = Arc::new(HealthServerState::new(
        env!("CARGO_PKG_VERSION"),
        handle.clone(),
        Arc::clone(&feed_state),
    ));
    let health_server = HealthServer::new(
        config.server.health_port,
        health_state,
        shutdown_token.clone(),
    );

    let engine_task = tokio::spawn(engine.run());

    let feed_name = feed.name();
    let feed_task = tokio::spawn(async move {
        if let Err(e) = feed.run(sink).await {
            tracing::error!(feed = feed_name, error = %e, "Feed stopped with error");
        }
    });

    tokio::spawn(async move {
        if let Err(e) = health_server.run().await {
            tracing::error!(error = %e, "Health server error");
        }
    });

    tokio::spawn(log_frames(handle.clone()));

    tracing::info!("Ticker board ready");

    await_shutdown(&handle, &shutdown_token).await;

    let drained = tokio::time::timeout(SHUTDOWN_TIMEOUT, async {
        let _ = engine_task.await;
        let _ = feed_task.await;
    })
    .await;
    if drained.is_err() {
        tracing::warn!(
            timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
            "Shutdown timed out"
        );
    }

    tracing::info!("Ticker board stopped");
    Ok(())
}

/// Log each presented frame at debug level.
async fn log_frames(handle: BoardHandle) {
    let mut view = handle.view();
    while let Some(frame) = view.changed().await {
        tracing::debug!(
            generation = frame.generation,
            search = %frame.query,
            shown = frame.rows.len(),
            total = frame.total_rows,
            "Frame"
        );
    }
}

/// Log the parsed configuration.
fn log_config(config: &BoardConfig) {
    tracing::info!(
        feed = config.feed.kind.as_str(),
        render_interval = ?config.board.render_interval,
        highlight = ?config.board.highlight_duration,
        health_port = config.server.health_port,
        "Configuration loaded"
    );
    tracing::debug!(
        url = %config.feed.url,
        node = %config.feed.node,
        lane = %config.feed.lane,
        symbols = config.simulation.symbols.len(),
        "Feed settings"
    );
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Wait for SIGINT or SIGTERM, then stop the board.
async fn await_shutdown(handle: &BoardHandle, shutdown_token: &CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received Ctrl+C, initiating shutdown"),
        () = terminate => tracing::info!("Received SIGTERM, initiating shutdown"),
    }

    handle.shutdown();
    shutdown_token.cancel();
}
