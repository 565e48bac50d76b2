//! User endpoints.

use axum::{
    Json, Router,
    extract::{Multipart, Path, State},
    routing::{get, post},
};
use chirp_common::{AppError, AppResult};
use chirp_core::{AuthenticatedUser, Profile, UpdateDetailsInput};
use chirp_db::entities::user;
use serde::Serialize;

use crate::{extractors::AuthUser, middleware::AppState, response::ApiResponse};

/// Get the authenticated user's own data.
async fn me(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<AuthenticatedUser>> {
    let me = state.user_service.get_authenticated(user).await?;
    Ok(ApiResponse::ok(me))
}

/// Update the authenticated user's profile details.
async fn update_details(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(input): Json<UpdateDetailsInput>,
) -> AppResult<ApiResponse<user::Model>> {
    let updated = state.user_service.update_details(user, input).await?;
    Ok(ApiResponse::ok(updated))
}

/// Image upload response.
#[derive(Debug, Serialize)]
pub struct ImageResponse {
    pub image_url: String,
}

/// Upload a new profile image.
///
/// Expects a multipart form with a single `image` part. JPEG and PNG only.
async fn upload_image(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<ApiResponse<ImageResponse>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid multipart body: {e}")))?
    {
        if field.name() != Some("image") {
            continue;
        }

        let content_type = field
            .content_type()
            .ok_or_else(|| AppError::BadRequest("Missing content type".to_string()))?
            .to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(format!("Invalid multipart body: {e}")))?;

        let image_url = state
            .user_service
            .update_image(&user.handle, &data, &content_type)
            .await?;

        return Ok(ApiResponse::ok(ImageResponse { image_url }));
    }

    Err(AppError::BadRequest("Missing image field".to_string()))
}

/// Get a user's public profile.
async fn profile(
    State(state): State<AppState>,
    Path(handle): Path<String>,
) -> AppResult<ApiResponse<Profile>> {
    let profile = state.user_service.get_profile(&handle).await?;
    Ok(ApiResponse::ok(profile))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(me).post(update_details))
        .route("/image", post(upload_image))
        .route("/{handle}", get(profile))
}
