//! Wallet Routes
//!
//! - POST /api/v1/wallets - Create (or replace) a wallet from a JSON body
//! - POST /api/v1/form/submit - Create a wallet from the live page's form inputs
//! - GET /api/v1/wallets/:key - Read a stored wallet

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::api::dto::{CreateWalletRequest, CreateWalletResponse, WalletResponse};
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::creator::{created_prompt, CreateOutcome};
use crate::record::WalletRecord;
use crate::store::DocumentPath;

/// POST /api/v1/wallets
pub async fn create_wallet(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateWalletRequest>,
) -> ApiResult<(StatusCode, Json<CreateWalletResponse>)> {
    let outcome = state
        .creator
        .create_record(&req.owner_name, &req.linked_id)
        .await;

    created_response(outcome)
}

/// POST /api/v1/form/submit
///
/// Submits whatever browsers last typed into the page's form inputs.
pub async fn submit_form(
    State(state): State<Arc<AppState>>,
) -> ApiResult<(StatusCode, Json<CreateWalletResponse>)> {
    let dashboard = &state.config.dashboard;
    let outcome = state
        .creator
        .submit_form(&dashboard.owner_input, &dashboard.linked_id_input)
        .await;

    created_response(outcome)
}

fn created_response(
    outcome: CreateOutcome,
) -> ApiResult<(StatusCode, Json<CreateWalletResponse>)> {
    match outcome {
        CreateOutcome::Created { key, owner_name } => Ok((
            StatusCode::CREATED,
            Json(CreateWalletResponse {
                status: "created".to_string(),
                key,
                message: created_prompt(&owner_name),
            }),
        )),
        CreateOutcome::ValidationFailed(e) => Err(ApiError::Validation(e.to_string())),
        CreateOutcome::WriteFailed(e) => Err(ApiError::Store(e)),
    }
}

/// GET /api/v1/wallets/:key
pub async fn get_wallet(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> ApiResult<Json<WalletResponse>> {
    let path = DocumentPath::new(state.config.store.collection.as_str(), key.as_str())?;
    let snapshot = state.store.get(&path).await?;

    let document = snapshot
        .document
        .ok_or_else(|| ApiError::NotFound(format!("Wallet {} not found", key)))?;

    Ok(Json(WalletResponse {
        record: WalletRecord::from_document(&document),
        updated_at: document.update_time,
    }))
}
