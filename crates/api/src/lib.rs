//! HTTP API layer for chirp.
//!
//! - **Endpoints**: posts, comments, follows, users, notifications
//! - **Extractors**: authentication
//! - **Middleware**: bearer token resolution
//!
//! Built on Axum 0.8 with Tower middleware stack.

pub mod endpoints;
pub mod extractors;
pub mod middleware;
pub mod response;

pub use endpoints::router;
pub use middleware::AppState;
