//! Wallet Watch Dashboard Server
//!
//! Run with: cargo run --bin wallet-watch
//!
//! Watches the configured wallet record, mirrors it to browsers over
//! WebSocket and accepts new wallets from the dashboard form.
//!
//! # Configuration
//!
//! Read from `config.toml` (see `wallet-cli config`) with `WALLET_*`
//! environment overrides. `RUST_LOG` takes precedence over `[logging] level`.

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wallet_watch::api::{serve, AppState};
use wallet_watch::config::{Config, LoggingConfig};
use wallet_watch::store;
use wallet_watch::websocket::WsEvent;

fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("wallet_watch={},tower_http=info", logging.level).into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    if logging.format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load_default();
    init_tracing(&config.logging);

    tracing::info!("Starting Wallet Watch v{}", env!("CARGO_PKG_VERSION"));
    config.validate()?;

    let store = store::connect(&config.store)?;
    tracing::info!(
        backend = store.name(),
        collection = %config.store.collection,
        "Document store ready"
    );
    for (name, value) in config.store.web_app_settings() {
        tracing::debug!(setting = name, value, "Web app setting (not used by the REST client)");
    }

    let state = AppState::new(Arc::clone(&store), config.clone());

    let handle = state.watcher().watch(&config.dashboard.watch_key).await?;
    tracing::info!(key = %handle.key(), "Watching wallet record");
    state.attach_watch(handle).await;

    // Surface a watch that ends on its own (e.g. permission revoked) to browsers
    let monitor = {
        let state = state.clone();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(std::time::Duration::from_secs(1)).await;
                let finished = match state.watch.read().await.as_ref() {
                    Some(handle) => !handle.is_running(),
                    None => return,
                };
                if finished {
                    if let Some(handle) = state.take_watch().await {
                        let message = match handle.join().await {
                            Ok(()) => "Record watch ended".to_string(),
                            Err(e) => format!("Record watch failed: {}", e),
                        };
                        tracing::error!("{}", message);
                        state.live_view.hub().publish(&WsEvent::system(&message)).await;
                    }
                    return;
                }
            }
        })
    };

    serve(state.clone(), &config.api).await?;

    monitor.abort();
    if let Some(handle) = state.take_watch().await {
        if let Err(e) = handle.stop().await {
            tracing::warn!(error = %e, "Watch ended with error");
        }
    }
    store.shutdown().await?;

    tracing::info!("Wallet Watch shutdown complete");
    Ok(())
}
