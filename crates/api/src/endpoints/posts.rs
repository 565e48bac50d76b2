//! Post, comment and follow endpoints.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use chirp_common::AppResult;
use chirp_core::{CommentInput, CreatePostInput, PostWithComments};
use chirp_db::entities::{comment, post};

use crate::{extractors::AuthUser, middleware::AppState, response::ApiResponse};

/// Get all posts, newest first.
async fn list(State(state): State<AppState>) -> AppResult<ApiResponse<Vec<post::Model>>> {
    let posts = state.post_service.list().await?;
    Ok(ApiResponse::ok(posts))
}

/// Create a post.
async fn create(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(input): Json<CreatePostInput>,
) -> AppResult<(StatusCode, ApiResponse<post::Model>)> {
    let created = state.post_service.create(&user, input).await?;
    Ok(ApiResponse::created(created))
}

/// Get a post with its comments.
async fn get_post(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> AppResult<ApiResponse<PostWithComments>> {
    let post = state.post_service.get_with_comments(&post_id).await?;
    Ok(ApiResponse::ok(post))
}

/// Comment on a post.
async fn comment(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(post_id): Path<String>,
    Json(input): Json<CommentInput>,
) -> AppResult<(StatusCode, ApiResponse<comment::Model>)> {
    let created = state
        .post_service
        .add_comment(&user, &post_id, input)
        .await?;
    Ok(ApiResponse::created(created))
}

/// Follow a post.
async fn follow(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> AppResult<ApiResponse<post::Model>> {
    let post = state.follow_service.follow(&user, &post_id).await?;
    Ok(ApiResponse::ok(post))
}

/// Unfollow a post.
async fn unfollow(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> AppResult<ApiResponse<post::Model>> {
    let post = state.follow_service.unfollow(&user, &post_id).await?;
    Ok(ApiResponse::ok(post))
}

/// Delete a post.
async fn remove(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> AppResult<StatusCode> {
    state.post_service.delete(&user, &post_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/posts", get(list))
        .route("/post", post(create))
        .route("/post/{id}", get(get_post).delete(remove))
        .route("/post/{id}/comment", post(comment))
        .route("/post/{id}/follow", get(follow))
        .route("/post/{id}/unfollow", get(unfollow))
}
