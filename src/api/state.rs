//! Application State
//!
//! Shared state accessible by all API handlers.
//! Wrapped in Arc for thread-safe sharing across async tasks.

use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;

use crate::config::Config;
use crate::creator::{CreatorConfig, RecordCreator};
use crate::store::{DocumentPath, DocumentStore, StoreResult};
use crate::watcher::{RecordWatcher, ViewBindings, WatchHandle};
use crate::websocket::{ConnectionHub, HubConfig, LiveView};

/// Shared application state for all handlers
#[derive(Clone)]
pub struct AppState {
    /// Backing document store
    pub store: Arc<dyn DocumentStore>,
    /// Server-side page mirrored to browsers
    pub live_view: Arc<LiveView>,
    /// Creator writing through the live page
    pub creator: Arc<RecordCreator>,
    pub config: Arc<Config>,
    /// Server start time for uptime tracking
    pub start_time: Instant,
    /// Watch started by the server, if any
    pub watch: Arc<RwLock<Option<WatchHandle>>>,
}

impl AppState {
    pub fn new(store: Arc<dyn DocumentStore>, config: Config) -> Self {
        let hub = Arc::new(ConnectionHub::new(HubConfig {
            max_connections: config.api.max_ws_connections,
        }));

        let dashboard = &config.dashboard;
        let live_view = Arc::new(LiveView::new(
            hub,
            dashboard.page_elements.clone(),
            vec![dashboard.owner_input.clone(), dashboard.linked_id_input.clone()],
        ));

        let creator = Arc::new(RecordCreator::new(
            Arc::clone(&store),
            live_view.clone(),
            CreatorConfig::from_config(&config.store, dashboard),
        ));

        Self {
            store,
            live_view,
            creator,
            config: Arc::new(config),
            start_time: Instant::now(),
            watch: Arc::new(RwLock::new(None)),
        }
    }

    /// Watcher rendering into the live page
    pub fn watcher(&self) -> RecordWatcher {
        RecordWatcher::new(
            Arc::clone(&self.store),
            self.live_view.clone(),
            self.config.store.collection.clone(),
            ViewBindings {
                balance_element: self.config.dashboard.balance_element.clone(),
                income_element: self.config.dashboard.income_element.clone(),
            },
        )
    }

    /// Keep a running watch so health output can report it
    pub async fn attach_watch(&self, handle: WatchHandle) {
        *self.watch.write().await = Some(handle);
    }

    /// Remove the running watch, e.g. to stop it on shutdown
    pub async fn take_watch(&self) -> Option<WatchHandle> {
        self.watch.write().await.take()
    }

    /// Read the watched record once to confirm the store answers
    pub async fn probe_store(&self) -> StoreResult<()> {
        let path = DocumentPath::new(
            self.config.store.collection.as_str(),
            self.config.dashboard.watch_key.as_str(),
        )?;
        self.store.get(&path).await.map(|_| ())
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub async fn ws_connection_count(&self) -> usize {
        self.live_view.hub().connection_count().await
    }
}
