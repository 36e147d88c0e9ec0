//! Document Store
//!
//! The backing store that holds wallet records. Components never reach a
//! process-wide client; they receive an `Arc<dyn DocumentStore>` at
//! construction and the owner decides when to shut it down.
//!
//! ## Backends
//!
//! - **MemoryStore**: in-process store with live subscriptions (tests, demos)
//! - **FirestoreStore**: hosted document database over its REST API
//!
//! ## Example
//!
//! ```rust,no_run
//! use wallet_watch::store::{DocumentPath, DocumentStore, FieldValue, Fields, MemoryStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = MemoryStore::new();
//!     let path = DocumentPath::new("usuarios", "8362361029")?;
//!
//!     let mut subscription = store.subscribe(&path).await?;
//!
//!     let mut fields = Fields::new();
//!     fields.insert("fc_balance".to_string(), FieldValue::Integer(150));
//!     store.set(&path, fields).await?;
//!
//!     while let Some(snapshot) = subscription.next().await {
//!         println!("exists: {}", snapshot?.exists());
//!     }
//!     Ok(())
//! }
//! ```

mod codec;
pub mod error;
mod firestore;
mod memory;
pub mod types;

pub use error::{StoreError, StoreResult};
pub use firestore::FirestoreStore;
pub use memory::{MemoryStore, MemoryStoreStats};
pub use types::{DocumentPath, Document, FieldValue, Fields, Snapshot, Subscription};

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::{StoreBackend, StoreConfig};

/// Operations the dashboard needs from a document store
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Short backend name for logs and health output
    fn name(&self) -> &str;

    /// Read a document once. A missing document is a snapshot, not an error.
    async fn get(&self, path: &DocumentPath) -> StoreResult<Snapshot>;

    /// Create or fully replace a document
    async fn set(&self, path: &DocumentPath, fields: Fields) -> StoreResult<()>;

    /// Merge fields into an existing document
    async fn update(&self, path: &DocumentPath, fields: Fields) -> StoreResult<()>;

    /// Open a standing subscription; the first delivery is the current state
    async fn subscribe(&self, path: &DocumentPath) -> StoreResult<Subscription>;

    /// Release the client. Further calls fail with [`StoreError::Closed`].
    async fn shutdown(&self) -> StoreResult<()> {
        Ok(())
    }
}

/// Build the store client selected by configuration
pub fn connect(config: &StoreConfig) -> StoreResult<Arc<dyn DocumentStore>> {
    match config.backend {
        StoreBackend::Memory => {
            tracing::info!("Using in-memory document store");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::Firestore => {
            let store = FirestoreStore::new(config.clone())?;
            tracing::info!(
                project_id = %config.project_id,
                database = %config.database_id,
                "Using hosted document store"
            );
            Ok(Arc::new(store))
        }
    }
}
