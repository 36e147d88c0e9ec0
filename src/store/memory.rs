//! In-Memory Document Store
//!
//! Keeps documents in a map and fans every change out to the subscribers of
//! that document. Each subscriber owns an unbounded channel; closed channels
//! are pruned on the next change to their document and whenever a new
//! subscription opens.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};

use super::error::{StoreError, StoreResult};
use super::types::{Document, DocumentPath, FieldValue, Fields, Snapshot, Subscription};
use super::DocumentStore;

type Subscriber = mpsc::UnboundedSender<StoreResult<Snapshot>>;

/// In-process document store with live subscriptions
pub struct MemoryStore {
    /// Documents: path → document
    documents: Arc<RwLock<HashMap<DocumentPath, Document>>>,
    /// Subscribers: path → open channels
    subscribers: Arc<RwLock<HashMap<DocumentPath, Vec<Subscriber>>>>,
    /// Last timestamp handed out by the store clock
    clock: Arc<RwLock<DateTime<Utc>>>,
    writes: AtomicU64,
    reads: AtomicU64,
    closed: AtomicBool,
}

/// Operation counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryStoreStats {
    pub documents: usize,
    /// Open subscriptions
    pub subscribers: usize,
    /// Documents that still have registered subscriber channels
    pub watched_paths: usize,
    pub writes: u64,
    pub reads: u64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            documents: Arc::new(RwLock::new(HashMap::new())),
            subscribers: Arc::new(RwLock::new(HashMap::new())),
            clock: Arc::new(RwLock::new(DateTime::<Utc>::MIN_UTC)),
            writes: AtomicU64::new(0),
            reads: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        }
    }

    pub async fn stats(&self) -> MemoryStoreStats {
        let documents = self.documents.read().await.len();
        let subs = self.subscribers.read().await;
        let subscribers = subs
            .values()
            .map(|senders| senders.iter().filter(|tx| !tx.is_closed()).count())
            .sum();

        MemoryStoreStats {
            documents,
            subscribers,
            watched_paths: subs.len(),
            writes: self.writes.load(Ordering::Relaxed),
            reads: self.reads.load(Ordering::Relaxed),
        }
    }

    /// Next store timestamp; strictly increasing even when the wall clock is not
    async fn tick(&self) -> DateTime<Utc> {
        let mut last = self.clock.write().await;
        let now = Utc::now();
        let next = if now > *last {
            now
        } else {
            *last + Duration::microseconds(1)
        };
        *last = next;
        next
    }

    fn ensure_open(&self) -> StoreResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::Closed);
        }
        Ok(())
    }

    /// Push the latest state of `path` to its subscribers, dropping closed ones
    fn notify(
        subs: &mut HashMap<DocumentPath, Vec<Subscriber>>,
        path: &DocumentPath,
        snapshot: Snapshot,
    ) {
        let Some(subscribers) = subs.get_mut(path) else {
            return;
        };

        subscribers.retain(|tx| tx.send(Ok(snapshot.clone())).is_ok());
        let delivered = subscribers.len();
        if subscribers.is_empty() {
            subs.remove(path);
        }

        tracing::trace!(path = %path, subscribers = delivered, "Delivered snapshot");
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Replace server-timestamp sentinels with the write time
fn resolve_server_timestamps(fields: Fields, now: DateTime<Utc>) -> Fields {
    fields
        .into_iter()
        .map(|(name, value)| {
            let value = match value {
                FieldValue::ServerTimestamp => FieldValue::Timestamp(now),
                FieldValue::Map(inner) => FieldValue::Map(resolve_server_timestamps(inner, now)),
                other => other,
            };
            (name, value)
        })
        .collect()
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get(&self, path: &DocumentPath) -> StoreResult<Snapshot> {
        self.ensure_open()?;
        self.reads.fetch_add(1, Ordering::Relaxed);

        let documents = self.documents.read().await;
        Ok(match documents.get(path) {
            Some(doc) => Snapshot::found(doc.clone()),
            None => Snapshot::missing(path.clone()),
        })
    }

    async fn set(&self, path: &DocumentPath, fields: Fields) -> StoreResult<()> {
        self.ensure_open()?;
        // Writers serialize on the subscriber lock so deliveries follow write order.
        let mut subs = self.subscribers.write().await;
        let now = self.tick().await;
        let fields = resolve_server_timestamps(fields, now);

        let snapshot = {
            let mut documents = self.documents.write().await;
            let create_time = documents
                .get(path)
                .and_then(|doc| doc.create_time)
                .unwrap_or(now);

            let document = Document {
                path: path.clone(),
                fields,
                create_time: Some(create_time),
                update_time: Some(now),
            };
            documents.insert(path.clone(), document.clone());
            Snapshot::found(document)
        };

        self.writes.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(path = %path, "Document set");

        Self::notify(&mut subs, path, snapshot);
        Ok(())
    }

    async fn update(&self, path: &DocumentPath, fields: Fields) -> StoreResult<()> {
        self.ensure_open()?;
        let mut subs = self.subscribers.write().await;
        let now = self.tick().await;
        let fields = resolve_server_timestamps(fields, now);

        let snapshot = {
            let mut documents = self.documents.write().await;
            let document = documents
                .get_mut(path)
                .ok_or_else(|| StoreError::NotFound(path.to_string()))?;

            document.fields.extend(fields);
            document.update_time = Some(now);
            Snapshot::found(document.clone())
        };

        self.writes.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(path = %path, "Document updated");

        Self::notify(&mut subs, path, snapshot);
        Ok(())
    }

    async fn subscribe(&self, path: &DocumentPath) -> StoreResult<Subscription> {
        self.ensure_open()?;
        let (tx, rx) = mpsc::unbounded_channel();

        // Hold the subscriber lock while reading the current state so no write
        // can slip between the initial delivery and registration.
        let mut subs = self.subscribers.write().await;
        let current = match self.documents.read().await.get(path) {
            Some(doc) => Snapshot::found(doc.clone()),
            None => Snapshot::missing(path.clone()),
        };
        let _ = tx.send(Ok(current));

        subs.retain(|_, senders| {
            senders.retain(|tx| !tx.is_closed());
            !senders.is_empty()
        });
        subs.entry(path.clone()).or_default().push(tx);

        tracing::debug!(path = %path, "Subscription opened");
        Ok(Subscription::new(path.clone(), rx))
    }

    async fn shutdown(&self) -> StoreResult<()> {
        self.closed.store(true, Ordering::Release);
        // Dropping the senders ends every open subscription stream.
        self.subscribers.write().await.clear();
        tracing::info!("In-memory document store shut down");
        Ok(())
    }
}
