//! Record Creator
//!
//! Turns the owner name and linked id typed into the dashboard form into a
//! new wallet record. Each successful submission performs exactly one full
//! write; an existing record with the same key is replaced, not merged.

use std::sync::Arc;
use thiserror::Error;

use crate::config::{DashboardConfig, StoreConfig};
use crate::record::NewWallet;
use crate::store::{DocumentPath, DocumentStore, StoreError};
use crate::view::View;

pub const PROMPT_MISSING_INPUT: &str = "Please enter both a name and an ID";
pub const PROMPT_WRITE_FAILED: &str = "There was an error connecting to the store.";

/// Success notice shown after a record is written
pub fn created_prompt(owner_name: &str) -> String {
    format!("Wallet created! {} is now part of NeuraForgeAI.", owner_name)
}

/// Why a submission was rejected before any write
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Owner name is empty")]
    MissingOwnerName,

    #[error("Linked id is empty")]
    MissingLinkedId,

    #[error("Linked id cannot be used as a record key: {0}")]
    InvalidLinkedId(String),
}

/// Result of one submission
#[derive(Debug)]
pub enum CreateOutcome {
    /// `owner_name` is the trimmed name that was stored
    Created { key: String, owner_name: String },
    ValidationFailed(ValidationError),
    WriteFailed(StoreError),
}

impl CreateOutcome {
    pub fn is_created(&self) -> bool {
        matches!(self, CreateOutcome::Created { .. })
    }
}

/// Where and how new records are written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatorConfig {
    pub collection: String,
    /// Parent written into every record, whatever the form says
    pub parent_key: String,
    pub default_tier: String,
}

impl CreatorConfig {
    pub fn from_config(store: &StoreConfig, dashboard: &DashboardConfig) -> Self {
        Self {
            collection: store.collection.clone(),
            parent_key: dashboard.parent_key.clone(),
            default_tier: dashboard.default_tier.clone(),
        }
    }
}

impl Default for CreatorConfig {
    fn default() -> Self {
        Self::from_config(&StoreConfig::default(), &DashboardConfig::default())
    }
}

/// Creates wallet records from form input
pub struct RecordCreator {
    store: Arc<dyn DocumentStore>,
    view: Arc<dyn View>,
    config: CreatorConfig,
}

impl RecordCreator {
    pub fn new(store: Arc<dyn DocumentStore>, view: Arc<dyn View>, config: CreatorConfig) -> Self {
        Self {
            store,
            view,
            config,
        }
    }

    /// Validate the input and build the record to write
    ///
    /// Both values are trimmed; the trimmed forms are what gets stored.
    pub fn prepare(
        &self,
        owner_name: &str,
        linked_id: &str,
    ) -> Result<(DocumentPath, NewWallet), ValidationError> {
        let owner_name = owner_name.trim();
        let linked_id = linked_id.trim();

        if owner_name.is_empty() {
            return Err(ValidationError::MissingOwnerName);
        }
        if linked_id.is_empty() {
            return Err(ValidationError::MissingLinkedId);
        }

        let path = DocumentPath::new(self.config.collection.as_str(), linked_id)
            .map_err(|_| ValidationError::InvalidLinkedId(linked_id.to_string()))?;

        let wallet = NewWallet::new(owner_name, linked_id, self.config.parent_key.as_str())
            .tier(self.config.default_tier.as_str());

        Ok((path, wallet))
    }

    /// Create (or replace) the wallet keyed by `linked_id`
    pub async fn create_record(&self, owner_name: &str, linked_id: &str) -> CreateOutcome {
        let (path, wallet) = match self.prepare(owner_name, linked_id) {
            Ok(prepared) => prepared,
            Err(e) => {
                tracing::debug!(error = %e, "Wallet form rejected");
                self.view.prompt(PROMPT_MISSING_INPUT).await;
                return CreateOutcome::ValidationFailed(e);
            }
        };

        let owner = wallet.owner_name.clone();
        match self.store.set(&path, wallet.into_fields()).await {
            Ok(()) => {
                tracing::info!(path = %path, owner = %owner, "Wallet created");
                self.view.prompt(&created_prompt(&owner)).await;
                CreateOutcome::Created {
                    key: path.key().to_string(),
                    owner_name: owner,
                }
            }
            Err(e) => {
                tracing::error!(path = %path, error = %e, "Failed to create wallet");
                self.view.prompt(PROMPT_WRITE_FAILED).await;
                CreateOutcome::WriteFailed(e)
            }
        }
    }

    /// Read the two form inputs from the view and submit them
    ///
    /// An input the page does not have counts as empty.
    pub async fn submit_form(&self, owner_input: &str, linked_id_input: &str) -> CreateOutcome {
        let owner_name = self.view.input_value(owner_input).await.unwrap_or_default();
        let linked_id = self.view.input_value(linked_id_input).await.unwrap_or_default();

        self.create_record(&owner_name, &linked_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{fields, DEFAULT_TIER};
    use crate::store::{FieldValue, Fields, MemoryStore, Snapshot, StoreResult, Subscription};
    use crate::view::MemoryView;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn creator(store: Arc<dyn DocumentStore>) -> (RecordCreator, Arc<MemoryView>) {
        let view = Arc::new(MemoryView::with_elements(Vec::<String>::new()));
        let creator = RecordCreator::new(store, view.clone(), CreatorConfig::default());
        (creator, view)
    }

    #[tokio::test]
    async fn test_create_record_writes_wallet() {
        let store = Arc::new(MemoryStore::new());
        let (creator, view) = creator(store.clone());

        let outcome = creator.create_record("Ana", "555111").await;
        assert!(matches!(outcome, CreateOutcome::Created { ref key, ref owner_name } if key == "555111" && owner_name == "Ana"));

        let path = DocumentPath::new("usuarios", "555111").unwrap();
        let snapshot = store.get(&path).await.unwrap();
        assert_eq!(snapshot.get(fields::OWNER), Some(&FieldValue::from("Ana")));
        assert_eq!(snapshot.get(fields::LINKED_ID), Some(&FieldValue::from("555111")));
        assert_eq!(snapshot.get(fields::BALANCE), Some(&FieldValue::Integer(0)));
        assert_eq!(snapshot.get(fields::TIER), Some(&FieldValue::from(DEFAULT_TIER)));
        assert_eq!(snapshot.get(fields::PARENT), Some(&FieldValue::from("8362361029")));
        assert!(snapshot
            .get(fields::CREATED_AT)
            .and_then(FieldValue::as_timestamp)
            .is_some());

        assert_eq!(
            view.prompts().await,
            vec!["Wallet created! Ana is now part of NeuraForgeAI."]
        );
    }

    #[tokio::test]
    async fn test_empty_input_is_rejected_without_write() {
        let store = Arc::new(MemoryStore::new());
        let (creator, view) = creator(store.clone());

        let outcome = creator.create_record("Ana", "").await;
        assert!(matches!(
            outcome,
            CreateOutcome::ValidationFailed(ValidationError::MissingLinkedId)
        ));

        let outcome = creator.create_record("   ", "555111").await;
        assert!(matches!(
            outcome,
            CreateOutcome::ValidationFailed(ValidationError::MissingOwnerName)
        ));

        assert_eq!(store.stats().await.writes, 0);
        assert_eq!(
            view.prompts().await,
            vec![PROMPT_MISSING_INPUT, PROMPT_MISSING_INPUT]
        );
    }

    #[tokio::test]
    async fn test_input_is_trimmed() {
        let store = Arc::new(MemoryStore::new());
        let (creator, _view) = creator(store.clone());

        let outcome = creator.create_record("  Ana ", " 555111\n").await;
        assert!(outcome.is_created());

        let path = DocumentPath::new("usuarios", "555111").unwrap();
        let snapshot = store.get(&path).await.unwrap();
        assert_eq!(snapshot.get(fields::OWNER), Some(&FieldValue::from("Ana")));
        assert_eq!(snapshot.get(fields::LINKED_ID), Some(&FieldValue::from("555111")));
    }

    #[tokio::test]
    async fn test_unusable_linked_id_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        let (creator, view) = creator(store.clone());

        let outcome = creator.create_record("Ana", "55/51").await;
        assert!(matches!(
            outcome,
            CreateOutcome::ValidationFailed(ValidationError::InvalidLinkedId(_))
        ));
        assert_eq!(store.stats().await.writes, 0);
        assert_eq!(view.prompts().await, vec![PROMPT_MISSING_INPUT]);
    }

    #[tokio::test]
    async fn test_existing_record_is_replaced() {
        let store = Arc::new(MemoryStore::new());
        let path = DocumentPath::new("usuarios", "555111").unwrap();
        let mut existing = Fields::new();
        existing.insert(fields::OWNER.to_string(), FieldValue::from("Old"));
        existing.insert(fields::BALANCE.to_string(), FieldValue::Integer(900));
        existing.insert(fields::MONTHLY_REVENUE.to_string(), FieldValue::Double(45.0));
        store.set(&path, existing).await.unwrap();

        let (creator, _view) = creator(store.clone());
        assert!(creator.create_record("Ana", "555111").await.is_created());

        let snapshot = store.get(&path).await.unwrap();
        assert_eq!(snapshot.get(fields::OWNER), Some(&FieldValue::from("Ana")));
        assert_eq!(snapshot.get(fields::BALANCE), Some(&FieldValue::Integer(0)));
        assert!(snapshot.get(fields::MONTHLY_REVENUE).is_none());
    }

    #[tokio::test]
    async fn test_parent_key_comes_from_config() {
        let store = Arc::new(MemoryStore::new());
        let view = Arc::new(MemoryView::with_elements(Vec::<String>::new()));
        let config = CreatorConfig {
            parent_key: "42".to_string(),
            ..CreatorConfig::default()
        };
        let creator = RecordCreator::new(store.clone(), view, config);

        creator.create_record("Ana", "555111").await;

        let path = DocumentPath::new("usuarios", "555111").unwrap();
        let snapshot = store.get(&path).await.unwrap();
        assert_eq!(snapshot.get(fields::PARENT), Some(&FieldValue::from("42")));
    }

    #[tokio::test]
    async fn test_submit_form_reads_inputs() {
        let store = Arc::new(MemoryStore::new());
        let (creator, view) = creator(store.clone());
        view.add_input("hija-nombre", "Ana").await;
        view.add_input("hija-id", "555111").await;

        assert!(creator.submit_form("hija-nombre", "hija-id").await.is_created());

        let outcome = creator.submit_form("hija-nombre", "missing-input").await;
        assert!(matches!(
            outcome,
            CreateOutcome::ValidationFailed(ValidationError::MissingLinkedId)
        ));
    }

    /// Page whose owner input changes every time it is read
    struct TypingView {
        reads: AtomicUsize,
    }

    #[async_trait]
    impl View for TypingView {
        async fn render(&self, _element: &str, _content: crate::view::ViewContent) -> bool {
            false
        }

        async fn input_value(&self, element: &str) -> Option<String> {
            match element {
                "hija-nombre" => {
                    let n = self.reads.fetch_add(1, Ordering::SeqCst);
                    Some(format!(" Owner {} ", n))
                }
                "hija-id" => Some("555111".to_string()),
                _ => None,
            }
        }

        async fn prompt(&self, _message: &str) {}
    }

    #[tokio::test]
    async fn test_created_outcome_names_stored_owner() {
        let store = Arc::new(MemoryStore::new());
        let view = Arc::new(TypingView {
            reads: AtomicUsize::new(0),
        });
        let creator = RecordCreator::new(store.clone(), view.clone(), CreatorConfig::default());

        // Someone keeps typing after the submission was read
        view.input_value("hija-nombre").await;
        let outcome = creator.submit_form("hija-nombre", "hija-id").await;
        view.input_value("hija-nombre").await;

        let path = DocumentPath::new("usuarios", "555111").unwrap();
        let stored = store.get(&path).await.unwrap();
        match outcome {
            CreateOutcome::Created { owner_name, .. } => {
                assert_eq!(owner_name, "Owner 1");
                assert_eq!(stored.get(fields::OWNER), Some(&FieldValue::from("Owner 1")));
            }
            other => panic!("expected a created wallet, got {:?}", other),
        }
    }

    /// Store that refuses every write and counts the attempts
    #[derive(Default)]
    struct RefusingStore {
        attempts: AtomicUsize,
    }

    #[async_trait]
    impl DocumentStore for RefusingStore {
        fn name(&self) -> &str {
            "refusing"
        }

        async fn get(&self, path: &DocumentPath) -> StoreResult<Snapshot> {
            Ok(Snapshot::missing(path.clone()))
        }

        async fn set(&self, _path: &DocumentPath, _fields: Fields) -> StoreResult<()> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::PermissionDenied("rules reject write".to_string()))
        }

        async fn update(&self, _path: &DocumentPath, _fields: Fields) -> StoreResult<()> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::PermissionDenied("rules reject write".to_string()))
        }

        async fn subscribe(&self, path: &DocumentPath) -> StoreResult<Subscription> {
            Err(StoreError::InvalidPath(path.to_string()))
        }
    }

    #[tokio::test]
    async fn test_write_failure_prompts_once() {
        let store = Arc::new(RefusingStore::default());
        let (creator, view) = creator(store.clone());

        let outcome = creator.create_record("Ana", "555111").await;

        assert!(matches!(
            outcome,
            CreateOutcome::WriteFailed(StoreError::PermissionDenied(_))
        ));
        assert_eq!(store.attempts.load(Ordering::SeqCst), 1);
        assert_eq!(view.prompts().await, vec![PROMPT_WRITE_FAILED]);
    }
}
