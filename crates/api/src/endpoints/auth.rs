//! Signup and login endpoints.

use axum::{Json, Router, extract::State, http::StatusCode, routing::post};
use chirp_common::AppResult;
use chirp_core::{LoginInput, SessionToken, SignupInput};

use crate::{middleware::AppState, response::ApiResponse};

/// Register a new account.
async fn signup(
    State(state): State<AppState>,
    Json(input): Json<SignupInput>,
) -> AppResult<(StatusCode, ApiResponse<SessionToken>)> {
    let session = state.user_service.signup(input).await?;
    Ok(ApiResponse::created(session))
}

/// Log in with email and password.
async fn login(
    State(state): State<AppState>,
    Json(input): Json<LoginInput>,
) -> AppResult<ApiResponse<SessionToken>> {
    let session = state.user_service.login(input).await?;
    Ok(ApiResponse::ok(session))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
}
