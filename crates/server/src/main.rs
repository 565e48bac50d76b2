//! Chirp server entry point.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{Router, middleware};
use chirp_api::{middleware::AppState, router as api_router};
use chirp_common::{Config, LocalStorage};
use chirp_core::{FanoutService, FollowService, NotificationService, PostService, UserService};
use chirp_db::repositories::{
    CommentRepository, FollowRepository, NotificationRepository, PostRepository, UserRepository,
};
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chirp=debug,tower_http=debug".into()),
        )
        .init();

    info!("Starting chirp server...");

    // Load configuration
    let config = Config::load()?;

    // Connect to database and run migrations
    let db = chirp_db::init(&config).await?;
    info!("Connected to database");

    info!("Running database migrations...");
    chirp_db::migrate(&db).await?;
    info!("Migrations completed");

    // Initialize repositories
    let db = Arc::new(db);
    let user_repo = UserRepository::new(Arc::clone(&db));
    let post_repo = PostRepository::new(Arc::clone(&db));
    let comment_repo = CommentRepository::new(Arc::clone(&db));
    let follow_repo = FollowRepository::new(Arc::clone(&db));
    let notification_repo = NotificationRepository::new(Arc::clone(&db));

    // Initialize storage
    let storage_path = PathBuf::from(&config.storage.base_path);
    let storage = Arc::new(LocalStorage::new(
        storage_path.clone(),
        config.storage.base_url.clone(),
    ));

    // Initialize fan-out and services
    let fanout = Arc::new(FanoutService::new(
        post_repo.clone(),
        notification_repo.clone(),
    ));

    let mut user_service = UserService::new(
        user_repo,
        post_repo.clone(),
        follow_repo.clone(),
        notification_repo.clone(),
        storage,
    );
    user_service.set_fanout(Arc::clone(&fanout));

    let mut post_service = PostService::new(post_repo.clone(), comment_repo);
    post_service.set_fanout(Arc::clone(&fanout));

    let mut follow_service = FollowService::new(follow_repo, post_repo);
    follow_service.set_fanout(fanout);

    let notification_service = NotificationService::new(notification_repo);

    // Create app state
    let state = AppState {
        user_service,
        post_service,
        follow_service,
        notification_service,
    };

    // Build router
    let app = Router::new()
        .merge(api_router())
        .nest_service(
            config.storage.base_url.trim_end_matches('/'),
            ServeDir::new(storage_path),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            chirp_api::middleware::auth_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    // Start server with graceful shutdown
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}
