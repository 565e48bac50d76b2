//! API endpoints.

mod auth;
mod notifications;
mod posts;
mod users;

use axum::Router;

use crate::middleware::AppState;

/// Create the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(auth::router())
        .merge(posts::router())
        .nest("/user", users::router())
        .nest("/notifications", notifications::router())
}
