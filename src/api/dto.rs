//! Data Transfer Objects
//!
//! Request and response types for the API endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::record::WalletRecord;
use crate::view::ViewContent;
use crate::watcher::{RenderOutcome, WatchState};

// ============================================
// WALLET DTOs
// ============================================

/// Wallet creation request; missing fields count as empty
#[derive(Debug, Deserialize)]
pub struct CreateWalletRequest {
    #[serde(default)]
    pub owner_name: String,
    #[serde(default)]
    pub linked_id: String,
}

/// Wallet creation response
#[derive(Debug, Serialize)]
pub struct CreateWalletResponse {
    /// Status: "created"
    pub status: String,
    /// Key of the written record
    pub key: String,
    /// Notice shown to the user
    pub message: String,
}

/// Stored wallet record
#[derive(Debug, Serialize)]
pub struct WalletResponse {
    #[serde(flatten)]
    pub record: WalletRecord,
    /// Last time the store saw a change
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

// ============================================
// VIEW DTOs
// ============================================

/// Current content of the live page
#[derive(Debug, Serialize)]
pub struct ViewResponse {
    pub elements: BTreeMap<String, ViewContent>,
}

// ============================================
// HEALTH DTOs
// ============================================

/// Full health status
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Overall status: healthy, degraded, unhealthy
    pub status: String,
    /// Store status: ok or error
    pub store: String,
    /// Store backend name
    pub backend: String,
    /// Server-side watch, if one was started
    #[serde(skip_serializing_if = "Option::is_none")]
    pub watch: Option<WatchStatus>,
    pub ws_connections: usize,
    pub uptime_seconds: u64,
    pub version: String,
}

/// Progress of the server-side watch
#[derive(Debug, Serialize)]
pub struct WatchStatus {
    pub key: String,
    pub running: bool,
    pub snapshots_received: u64,
    /// "rendered" or "missing"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_outcome: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_update: Option<DateTime<Utc>>,
}

impl WatchStatus {
    pub fn new(key: &str, running: bool, state: WatchState) -> Self {
        Self {
            key: key.to_string(),
            running,
            snapshots_received: state.snapshots_received,
            last_outcome: state.last_outcome.map(|outcome| {
                match outcome {
                    RenderOutcome::Missing => "missing",
                    RenderOutcome::Rendered { .. } => "rendered",
                }
                .to_string()
            }),
            last_update: state.last_update,
        }
    }
}
