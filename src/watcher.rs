//! Live Record Watcher
//!
//! Keeps the dashboard's balance and income elements in step with one stored
//! record. The watcher subscribes to the record and re-renders both elements
//! on every delivered snapshot, the first of which carries the current state.
//!
//! Subscription errors are not absorbed here: they end the watch and come
//! back to whoever holds the [`WatchHandle`].

use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{oneshot, RwLock};
use tokio::task::JoinHandle;

use crate::record::{fields, Amount};
use crate::store::{DocumentPath, DocumentStore, Snapshot, StoreError, Subscription};
use crate::view::{balance_markup, revenue_text, View, ViewContent};

/// Which page elements receive the watched values
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewBindings {
    pub balance_element: String,
    pub income_element: String,
}

impl Default for ViewBindings {
    fn default() -> Self {
        Self {
            balance_element: "main-balance".to_string(),
            income_element: "ingresos-totales".to_string(),
        }
    }
}

/// What a single snapshot did to the page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    /// Record does not exist; the page was left as it was
    Missing,
    /// Record rendered; flags tell which elements the page actually had
    Rendered { balance: bool, income: bool },
}

/// Progress of a running watch
#[derive(Debug, Clone, Default)]
pub struct WatchState {
    pub snapshots_received: u64,
    pub last_outcome: Option<RenderOutcome>,
    pub last_update: Option<DateTime<Utc>>,
}

/// Errors that end a watch
#[derive(Error, Debug)]
pub enum WatchError {
    #[error("Invalid record key: {0}")]
    InvalidKey(String),

    #[error("Failed to subscribe: {0}")]
    Subscribe(#[source] StoreError),

    #[error("Subscription failed: {0}")]
    Transport(#[source] StoreError),

    #[error("Watch task failed: {0}")]
    Task(String),
}

/// Apply one snapshot to the page
pub async fn apply_snapshot(
    view: &dyn View,
    bindings: &ViewBindings,
    snapshot: &Snapshot,
) -> RenderOutcome {
    if !snapshot.exists() {
        tracing::warn!(path = %snapshot.path, "Watched record does not exist");
        return RenderOutcome::Missing;
    }

    let balance = Amount::from_field(snapshot.get(fields::BALANCE));
    let revenue = Amount::from_field(snapshot.get(fields::MONTHLY_REVENUE));

    let balance_shown = view
        .render(
            &bindings.balance_element,
            ViewContent::Markup(balance_markup(balance)),
        )
        .await;
    let income_shown = view
        .render(
            &bindings.income_element,
            ViewContent::Text(revenue_text(revenue)),
        )
        .await;

    tracing::info!(
        path = %snapshot.path,
        balance = %balance,
        revenue = %revenue,
        "Dashboard updated from record"
    );

    RenderOutcome::Rendered {
        balance: balance_shown,
        income: income_shown,
    }
}

/// Watches records and renders them into a view
pub struct RecordWatcher {
    store: Arc<dyn DocumentStore>,
    view: Arc<dyn View>,
    collection: String,
    bindings: ViewBindings,
}

impl RecordWatcher {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        view: Arc<dyn View>,
        collection: impl Into<String>,
        bindings: ViewBindings,
    ) -> Self {
        Self {
            store,
            view,
            collection: collection.into(),
            bindings,
        }
    }

    /// Start watching the record at `key`
    ///
    /// Runs until [`WatchHandle::stop`] is called, the store ends the
    /// subscription, or the subscription reports an error.
    pub async fn watch(&self, key: &str) -> Result<WatchHandle, WatchError> {
        let path = DocumentPath::new(self.collection.as_str(), key)
            .map_err(|e| WatchError::InvalidKey(e.to_string()))?;

        tracing::info!(path = %path, store = self.store.name(), "Connecting to record");

        let subscription = self
            .store
            .subscribe(&path)
            .await
            .map_err(WatchError::Subscribe)?;

        let state = Arc::new(RwLock::new(WatchState::default()));
        let (stop_tx, stop_rx) = oneshot::channel();

        let task = tokio::spawn(run_watch(
            subscription,
            Arc::clone(&self.view),
            self.bindings.clone(),
            Arc::clone(&state),
            stop_rx,
        ));

        Ok(WatchHandle {
            key: key.to_string(),
            state,
            stop_tx: Some(stop_tx),
            task,
        })
    }
}

async fn run_watch(
    mut subscription: Subscription,
    view: Arc<dyn View>,
    bindings: ViewBindings,
    state: Arc<RwLock<WatchState>>,
    mut stop_rx: oneshot::Receiver<()>,
) -> Result<(), WatchError> {
    let path = subscription.path().clone();

    let result = loop {
        let delivery = tokio::select! {
            _ = &mut stop_rx => {
                tracing::debug!(path = %path, "Watch stopped");
                break Ok(());
            }
            delivery = subscription.next() => delivery,
        };

        match delivery {
            Some(Ok(snapshot)) => {
                let outcome = apply_snapshot(view.as_ref(), &bindings, &snapshot).await;

                let mut state = state.write().await;
                state.snapshots_received += 1;
                state.last_outcome = Some(outcome);
                state.last_update = Some(Utc::now());
            }
            Some(Err(e)) => {
                tracing::error!(path = %path, error = %e, "Record subscription failed");
                break Err(WatchError::Transport(e));
            }
            None => {
                tracing::info!(path = %path, "Record subscription closed by store");
                break Ok(());
            }
        }
    };

    subscription.close();
    result
}

/// Handle to a running watch
pub struct WatchHandle {
    key: String,
    state: Arc<RwLock<WatchState>>,
    stop_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<Result<(), WatchError>>,
}

impl WatchHandle {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub async fn state(&self) -> WatchState {
        self.state.read().await.clone()
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stop watching and dispose the subscription
    pub async fn stop(mut self) -> Result<(), WatchError> {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        self.join().await
    }

    /// Wait for the watch to end on its own
    pub async fn join(self) -> Result<(), WatchError> {
        match self.task.await {
            Ok(result) => result,
            Err(e) => Err(WatchError::Task(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{FieldValue, Fields, MemoryStore, StoreResult};
    use crate::view::MemoryView;
    use async_trait::async_trait;
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn record(balance: Option<FieldValue>, revenue: Option<FieldValue>) -> Fields {
        let mut out = Fields::new();
        out.insert(fields::OWNER.to_string(), FieldValue::from("Mike"));
        if let Some(b) = balance {
            out.insert(fields::BALANCE.to_string(), b);
        }
        if let Some(r) = revenue {
            out.insert(fields::MONTHLY_REVENUE.to_string(), r);
        }
        out
    }

    fn page() -> Arc<MemoryView> {
        Arc::new(MemoryView::with_elements(["main-balance", "ingresos-totales"]))
    }

    async fn wait_for_snapshots(handle: &WatchHandle, count: u64) {
        for _ in 0..200 {
            if handle.state().await.snapshots_received >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("watcher did not receive {} snapshots", count);
    }

    #[tokio::test]
    async fn test_apply_snapshot_renders_both_fields() {
        let view = page();
        let path = DocumentPath::new("usuarios", "8362361029").unwrap();
        let store = MemoryStore::new();
        store
            .set(
                &path,
                record(Some(FieldValue::Integer(150)), Some(FieldValue::Integer(320))),
            )
            .await
            .unwrap();
        let snapshot = store.get(&path).await.unwrap();

        let outcome = apply_snapshot(view.as_ref(), &ViewBindings::default(), &snapshot).await;

        assert_eq!(
            outcome,
            RenderOutcome::Rendered {
                balance: true,
                income: true
            }
        );
        assert!(view.text("main-balance").await.unwrap().contains("150 FC"));
        assert_eq!(
            view.text("ingresos-totales").await.as_deref(),
            Some("$320.00 MXN")
        );
        assert!(view.content("main-balance").await.unwrap().is_markup());
    }

    #[tokio::test]
    async fn test_apply_snapshot_defaults_missing_fields_to_zero() {
        let view = page();
        let path = DocumentPath::new("usuarios", "1").unwrap();
        let store = MemoryStore::new();
        store.set(&path, record(None, None)).await.unwrap();
        let snapshot = store.get(&path).await.unwrap();

        apply_snapshot(view.as_ref(), &ViewBindings::default(), &snapshot).await;

        assert!(view.text("main-balance").await.unwrap().ends_with(" 0 FC"));
        assert_eq!(view.text("ingresos-totales").await.as_deref(), Some("$0.00 MXN"));
    }

    #[tokio::test]
    async fn test_apply_snapshot_missing_record_keeps_page() {
        let view = page();
        view.render("main-balance", ViewContent::Text("7 FC".to_string()))
            .await;

        let snapshot = Snapshot::missing(DocumentPath::new("usuarios", "nobody").unwrap());
        let outcome = apply_snapshot(view.as_ref(), &ViewBindings::default(), &snapshot).await;

        assert_eq!(outcome, RenderOutcome::Missing);
        assert_eq!(view.text("main-balance").await.as_deref(), Some("7 FC"));
        assert!(view.text("ingresos-totales").await.is_none());
    }

    #[tokio::test]
    async fn test_apply_snapshot_absent_element_is_ignored() {
        let view = Arc::new(MemoryView::with_elements(["ingresos-totales"]));
        let path = DocumentPath::new("usuarios", "1").unwrap();
        let store = MemoryStore::new();
        store
            .set(&path, record(Some(FieldValue::Integer(5)), Some(FieldValue::Integer(9))))
            .await
            .unwrap();
        let snapshot = store.get(&path).await.unwrap();

        let outcome = apply_snapshot(view.as_ref(), &ViewBindings::default(), &snapshot).await;

        assert_eq!(
            outcome,
            RenderOutcome::Rendered {
                balance: false,
                income: true
            }
        );
        assert_eq!(view.text("ingresos-totales").await.as_deref(), Some("$9.00 MXN"));
    }

    #[tokio::test]
    async fn test_watch_follows_changes() {
        let store = Arc::new(MemoryStore::new());
        let view = page();
        let watcher = RecordWatcher::new(
            store.clone(),
            view.clone(),
            "usuarios",
            ViewBindings::default(),
        );

        let handle = watcher.watch("8362361029").await.unwrap();
        assert_eq!(handle.key(), "8362361029");
        wait_for_snapshots(&handle, 1).await;
        assert_eq!(handle.state().await.last_outcome, Some(RenderOutcome::Missing));

        let path = DocumentPath::new("usuarios", "8362361029").unwrap();
        store
            .set(&path, record(Some(FieldValue::Integer(10)), None))
            .await
            .unwrap();
        wait_for_snapshots(&handle, 2).await;
        assert!(view.text("main-balance").await.unwrap().contains("10 FC"));

        let mut credit = Fields::new();
        credit.insert(fields::BALANCE.to_string(), FieldValue::Integer(25));
        credit.insert(fields::MONTHLY_REVENUE.to_string(), FieldValue::Double(80.5));
        store.update(&path, credit).await.unwrap();
        wait_for_snapshots(&handle, 3).await;
        assert!(view.text("main-balance").await.unwrap().contains("25 FC"));
        assert_eq!(view.text("ingresos-totales").await.as_deref(), Some("$80.50 MXN"));

        assert!(handle.is_running());
        handle.stop().await.unwrap();
        assert_eq!(store.stats().await.subscribers, 0);
    }

    #[tokio::test]
    async fn test_watch_rejects_empty_key() {
        let watcher = RecordWatcher::new(
            Arc::new(MemoryStore::new()),
            page(),
            "usuarios",
            ViewBindings::default(),
        );

        let result = watcher.watch("").await;
        assert!(matches!(result, Err(WatchError::InvalidKey(_))));
    }

    /// Store whose subscriptions fail after the first delivery
    struct FlakyStore;

    #[async_trait]
    impl DocumentStore for FlakyStore {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn get(&self, path: &DocumentPath) -> StoreResult<Snapshot> {
            Ok(Snapshot::missing(path.clone()))
        }

        async fn set(&self, _path: &DocumentPath, _fields: Fields) -> StoreResult<()> {
            Err(StoreError::Unavailable("read only".to_string()))
        }

        async fn update(&self, _path: &DocumentPath, _fields: Fields) -> StoreResult<()> {
            Err(StoreError::Unavailable("read only".to_string()))
        }

        async fn subscribe(&self, path: &DocumentPath) -> StoreResult<Subscription> {
            let (tx, rx) = mpsc::unbounded_channel();
            let _ = tx.send(Ok(Snapshot::missing(path.clone())));
            let _ = tx.send(Err(StoreError::PermissionDenied("rules".to_string())));
            Ok(Subscription::new(path.clone(), rx))
        }
    }

    #[tokio::test]
    async fn test_subscription_error_reaches_handle() {
        let view = page();
        let watcher = RecordWatcher::new(
            Arc::new(FlakyStore),
            view.clone(),
            "usuarios",
            ViewBindings::default(),
        );

        let handle = watcher.watch("8362361029").await.unwrap();
        let result = handle.join().await;

        assert!(matches!(
            result,
            Err(WatchError::Transport(StoreError::PermissionDenied(_)))
        ));
        assert!(view.text("main-balance").await.is_none());
    }
}
