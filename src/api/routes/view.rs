//! View Routes
//!
//! - GET /api/v1/view - Current content of the live page elements

use axum::{extract::State, Json};
use std::sync::Arc;

use crate::api::dto::ViewResponse;
use crate::api::state::AppState;

/// GET /api/v1/view
pub async fn current_view(State(state): State<Arc<AppState>>) -> Json<ViewResponse> {
    Json(ViewResponse {
        elements: state.live_view.snapshot().await,
    })
}
