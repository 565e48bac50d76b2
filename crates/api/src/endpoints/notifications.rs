//! Notification endpoints.

use axum::{Json, Router, extract::State, routing::post};
use chirp_common::AppResult;
use serde::{Deserialize, Serialize};

use crate::{extractors::AuthUser, middleware::AppState, response::ApiResponse};

/// Batch mark-read request. The body is a list of notification ids.
#[derive(Debug, Deserialize)]
pub struct MarkReadRequest(pub Vec<String>);

/// Mark-read response.
#[derive(Debug, Serialize)]
pub struct MarkReadResponse {
    pub updated: u64,
}

/// Mark a batch of notifications read.
async fn mark_read(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<MarkReadRequest>,
) -> AppResult<ApiResponse<MarkReadResponse>> {
    let updated = state.notification_service.mark_read(&user, req.0).await?;
    Ok(ApiResponse::ok(MarkReadResponse { updated }))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/", post(mark_read))
}
