//! Hosted Document Store REST Client
//!
//! HTTP client for the hosted document database's REST API.
//!
//! Reads are retried with backoff on transient failures; writes are sent
//! exactly once. The REST surface has no push channel, so a subscription is
//! a background task that re-reads the document every `poll_interval_ms` and
//! delivers a snapshot whenever its update time or existence changes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use super::codec::{self, ErrorEnvelope, RawDocument};
use super::error::{StoreError, StoreResult};
use super::types::{DocumentPath, Fields, Snapshot, Subscription};
use super::DocumentStore;
use crate::config::StoreConfig;

/// REST client for the hosted document store
#[derive(Clone)]
pub struct FirestoreStore {
    client: Client,
    config: StoreConfig,
    closed: Arc<AtomicBool>,
}

impl FirestoreStore {
    /// Create a client; fails if the project is not configured
    pub fn new(config: StoreConfig) -> StoreResult<Self> {
        if config.project_id.trim().is_empty() {
            return Err(StoreError::Unauthenticated(
                "store project_id is not configured".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| StoreError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config,
            closed: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Resource name of the database's document root
    fn documents_root(&self) -> String {
        format!(
            "projects/{}/databases/{}/documents",
            self.config.project_id, self.config.database_id
        )
    }

    /// Full resource name of one document, as used in request bodies
    fn document_name(&self, path: &DocumentPath) -> String {
        format!("{}/{}/{}", self.documents_root(), path.collection(), path.key())
    }

    fn document_url(&self, path: &DocumentPath) -> String {
        format!(
            "{}/{}/{}/{}",
            self.config.base_url.trim_end_matches('/'),
            self.documents_root(),
            urlencoding::encode(path.collection()),
            urlencoding::encode(path.key())
        )
    }

    fn commit_url(&self) -> String {
        format!(
            "{}/{}:commit",
            self.config.base_url.trim_end_matches('/'),
            self.documents_root()
        )
    }

    /// Attach API key and bearer token
    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let request = if self.config.api_key.is_empty() {
            request
        } else {
            request.query(&[("key", self.config.api_key.as_str())])
        };

        match &self.config.auth_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn ensure_open(&self) -> StoreResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::Closed);
        }
        Ok(())
    }

    /// Single GET of a document
    async fn fetch_once(&self, path: &DocumentPath) -> StoreResult<Snapshot> {
        let request = self.authorize(self.client.get(self.document_url(path)));
        let response = request.send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Snapshot::missing(path.clone()));
        }

        let response = check_status(response).await?;
        let raw: RawDocument = response.json().await?;
        let document = codec::decode_document(path, raw)?;
        Ok(Snapshot::found(document))
    }

    /// GET with retry on transient failures
    async fn fetch(&self, path: &DocumentPath) -> StoreResult<Snapshot> {
        let attempts = self.config.max_retries.max(1);
        let mut last_error = StoreError::Unavailable("no attempt made".to_string());

        for attempt in 0..attempts {
            if attempt > 0 {
                // Backoff: 1s, 4s, 9s...
                let delay = Duration::from_secs((attempt as u64).pow(2));
                tokio::time::sleep(delay).await;
            }

            match self.fetch_once(path).await {
                Ok(snapshot) => return Ok(snapshot),
                Err(e) if e.is_transient() => {
                    tracing::debug!(path = %path, attempt, error = %e, "Transient read failure");
                    last_error = e;
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error)
    }

    /// Send a single commit; never retried
    async fn commit(&self, path: &DocumentPath, fields: &Fields, merge: bool) -> StoreResult<()> {
        let body = codec::commit_body(&self.document_name(path), fields, merge);
        let request = self.authorize(self.client.post(self.commit_url()).json(&body));
        let response = request.send().await?;

        if merge && response.status() == StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound(path.to_string()));
        }

        check_status(response).await?;
        Ok(())
    }

    /// Background loop behind a subscription
    async fn poll_loop(
        self,
        path: DocumentPath,
        tx: mpsc::UnboundedSender<StoreResult<Snapshot>>,
    ) {
        let mut ticker = tokio::time::interval(Duration::from_millis(self.config.poll_interval_ms));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        let mut last_seen: Option<Fingerprint> = None;

        loop {
            tokio::select! {
                _ = tx.closed() => break,
                _ = ticker.tick() => {}
            }

            if self.closed.load(Ordering::Acquire) {
                break;
            }

            match self.fetch(&path).await {
                Ok(snapshot) => {
                    let fingerprint = Fingerprint::of(&snapshot);
                    if last_seen.as_ref() == Some(&fingerprint) {
                        continue;
                    }
                    last_seen = Some(fingerprint);
                    if tx.send(Ok(snapshot)).is_err() {
                        break;
                    }
                }
                Err(e) if e.is_transient() => {
                    tracing::warn!(path = %path, error = %e, "Subscription read failed, will retry");
                }
                Err(e) => {
                    tracing::error!(path = %path, error = %e, "Subscription ended by store error");
                    let _ = tx.send(Err(e));
                    break;
                }
            }
        }

        tracing::debug!(path = %path, "Subscription poller stopped");
    }
}

/// What a subscriber considers a change
#[derive(Debug, PartialEq, Eq)]
struct Fingerprint {
    exists: bool,
    update_time: Option<DateTime<Utc>>,
}

impl Fingerprint {
    fn of(snapshot: &Snapshot) -> Self {
        Self {
            exists: snapshot.exists(),
            update_time: snapshot.update_time(),
        }
    }
}

/// Map a non-success response to a store error
async fn check_status(response: Response) -> StoreResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorEnvelope>(&text)
        .map(|env| {
            if env.error.status.is_empty() {
                env.error.message
            } else {
                format!("{}: {}", env.error.status, env.error.message)
            }
        })
        .unwrap_or(text);

    Err(error_for_status(status, message))
}

fn error_for_status(status: StatusCode, message: String) -> StoreError {
    match status {
        StatusCode::UNAUTHORIZED => StoreError::Unauthenticated(message),
        StatusCode::FORBIDDEN => StoreError::PermissionDenied(message),
        StatusCode::NOT_FOUND => StoreError::NotFound(message),
        StatusCode::TOO_MANY_REQUESTS => StoreError::RateLimited,
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => StoreError::Timeout,
        s if s.is_server_error() => StoreError::Unavailable(format!("{}: {}", s.as_u16(), message)),
        s => StoreError::Api {
            status: s.as_u16(),
            message,
        },
    }
}

#[async_trait]
impl DocumentStore for FirestoreStore {
    fn name(&self) -> &str {
        "firestore"
    }

    async fn get(&self, path: &DocumentPath) -> StoreResult<Snapshot> {
        self.ensure_open()?;
        self.fetch(path).await
    }

    async fn set(&self, path: &DocumentPath, fields: Fields) -> StoreResult<()> {
        self.ensure_open()?;
        self.commit(path, &fields, false).await?;
        tracing::debug!(path = %path, "Document set");
        Ok(())
    }

    async fn update(&self, path: &DocumentPath, fields: Fields) -> StoreResult<()> {
        self.ensure_open()?;
        self.commit(path, &fields, true).await?;
        tracing::debug!(path = %path, "Document updated");
        Ok(())
    }

    async fn subscribe(&self, path: &DocumentPath) -> StoreResult<Subscription> {
        self.ensure_open()?;
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(self.clone().poll_loop(path.clone(), tx));

        tracing::debug!(
            path = %path,
            interval_ms = self.config.poll_interval_ms,
            "Subscription opened"
        );
        Ok(Subscription::new(path.clone(), rx))
    }

    async fn shutdown(&self) -> StoreResult<()> {
        self.closed.store(true, Ordering::Release);
        tracing::info!("Hosted document store client shut down");
        Ok(())
    }
}
