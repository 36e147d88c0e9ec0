//! # Wallet Watch
//!
//! Live dashboard for wallet records kept in a hosted document database.
//!
//! ## Features
//!
//! - **Live balance**: the dashboard follows one record and re-renders its
//!   coin balance and monthly revenue on every change
//! - **Wallet creation**: a two-field form creates new records under a fixed
//!   parent account
//! - **Real-time page**: renders and prompts are mirrored to browsers over
//!   WebSocket
//!
//! ## Modules
//!
//! - [`store`]: document store seam with in-memory and hosted backends
//! - [`view`]: page seam the watcher and creator write into
//! - [`watcher`]: Live Record Watcher
//! - [`creator`]: Record Creator
//! - [`websocket`]: live page and browser connections
//! - [`api`]: HTTP server with Axum
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use wallet_watch::store::MemoryStore;
//! use wallet_watch::view::MemoryView;
//! use wallet_watch::{CreatorConfig, RecordCreator, RecordWatcher, ViewBindings};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(MemoryStore::new());
//!     let view = Arc::new(MemoryView::with_elements(["main-balance", "ingresos-totales"]));
//!
//!     let watcher = RecordWatcher::new(store.clone(), view.clone(), "usuarios", ViewBindings::default());
//!     let handle = watcher.watch("555111").await?;
//!
//!     let creator = RecordCreator::new(store, view.clone(), CreatorConfig::default());
//!     creator.create_record("Ana", "555111").await;
//!
//!     handle.stop().await?;
//!     println!("{:?}", view.text("main-balance").await);
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod creator;
pub mod record;
pub mod store;
pub mod view;
pub mod watcher;
pub mod websocket;

pub use api::{build_router, serve, ApiError, AppState};

pub use config::{
    ApiConfig, Config, ConfigError, DashboardConfig, LoggingConfig, StoreBackend, StoreConfig,
};

pub use creator::{CreateOutcome, CreatorConfig, RecordCreator, ValidationError};

pub use record::{Amount, NewWallet, WalletRecord};

pub use store::{
    DocumentPath, DocumentStore, FieldValue, FirestoreStore, MemoryStore, Snapshot, StoreError,
    StoreResult, Subscription,
};

pub use view::{MemoryView, View, ViewContent};

pub use watcher::{
    apply_snapshot, RecordWatcher, RenderOutcome, ViewBindings, WatchError, WatchHandle,
    WatchState,
};

pub use websocket::{
    websocket_handler, ClientMessage, ConnectionHub, HubConfig, HubError, LiveView, ServerMessage,
    WsEvent,
};
