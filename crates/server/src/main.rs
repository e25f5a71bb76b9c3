mod bootstrap;
mod health;
mod routes;

use std::time::Duration;

use anyhow::Result;
use axum::Router;
use menuwise_core::config::{AppConfig, LoadOptions};

fn init_logging(config: &AppConfig) {
    use menuwise_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Load config and initialize logging before any other operations
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config)?;

    spawn_idle_reaper(
        app.engine.clone(),
        Duration::from_secs(app.config.session.idle_timeout_minutes * 60),
    );

    let router = Router::new()
        .merge(routes::router(routes::AppState {
            engine: app.engine.clone(),
            catalog: app.catalog.clone(),
        }))
        .merge(health::router(health::HealthState {
            orchestrator: app.orchestrator.clone(),
            engine: app.engine.clone(),
            catalog_items: app.catalog.len(),
        }));

    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!(
        event_name = "system.server.started",
        bind_address = %address,
        "menuwise-server listening"
    );

    let shutdown_grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let server = {
        let serve = axum::serve(listener, router).with_graceful_shutdown(async {
            let _ = shutdown_rx.await;
        });
        tokio::spawn(async move { serve.await })
    };

    wait_for_shutdown().await;
    tracing::info!(event_name = "system.server.stopping", "menuwise-server stopping");
    let _ = shutdown_tx.send(());

    match tokio::time::timeout(shutdown_grace, server).await {
        Ok(served) => served??,
        Err(_) => tracing::warn!(
            event_name = "system.server.shutdown_timeout",
            grace_secs = shutdown_grace.as_secs(),
            "open connections outlived the shutdown grace period"
        ),
    }
    Ok(())
}

/// Sweeps idle sessions on the same cadence as the timeout itself; a
/// session can therefore live at most twice the configured timeout.
fn spawn_idle_reaper(engine: std::sync::Arc<menuwise_agent::ConversationEngine>, max_idle: Duration) {
    let sweep_interval = max_idle.max(Duration::from_secs(60));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(sweep_interval);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            engine.expire_idle(max_idle);
        }
    });
}

async fn wait_for_shutdown() {
    let _ = tokio::signal::ctrl_c().await;
}
