//! HTTP surface: shared state, router assembly, and the server loop.
pub mod error;
pub mod extract;
pub mod handlers;
pub mod pagination;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::http::Method;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::config::Config;
use crate::db::repo::Repo;
use error::ApiError;

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repo>,
    pub config: Arc<Config>,
}

/// JSON 405 naming the rejected method, instead of axum's bare default.
async fn method_not_allowed(method: Method) -> ApiError {
    ApiError::MethodNotAllowed(method.to_string())
}

/// JSON 404 for paths outside the API.
async fn not_found() -> ApiError {
    ApiError::NotFound
}

/// Build the router with every versioned route.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/v1/login",
            post(handlers::login::login).fallback(method_not_allowed),
        )
        .route(
            "/api/v1/users",
            get(handlers::users::list)
                .post(handlers::users::create)
                .fallback(method_not_allowed),
        )
        .route(
            "/api/v1/users/{id}",
            get(handlers::users::retrieve)
                .put(handlers::users::update)
                .fallback(method_not_allowed),
        )
        .route(
            "/api/v1/users/{id}/profile",
            get(handlers::profile::retrieve).fallback(method_not_allowed),
        )
        .route(
            "/api/v1/groups",
            get(handlers::groups::list)
                .post(handlers::groups::create)
                .fallback(method_not_allowed),
        )
        .route(
            "/api/v1/groups/{id}",
            get(handlers::groups::retrieve).fallback(method_not_allowed),
        )
        .route(
            "/api/v1/bugs",
            get(handlers::bugs::list)
                .post(handlers::bugs::create)
                .fallback(method_not_allowed),
        )
        .route(
            "/api/v1/bugs/{id}",
            get(handlers::bugs::retrieve)
                .patch(handlers::bugs::partial_update)
                .delete(handlers::bugs::destroy)
                .fallback(method_not_allowed),
        )
        .route(
            "/api/v1/tasks",
            get(handlers::tasks::list)
                .post(handlers::tasks::create)
                .fallback(method_not_allowed),
        )
        .route(
            "/api/v1/tasks/{id}",
            get(handlers::tasks::retrieve)
                .patch(handlers::tasks::partial_update)
                .delete(handlers::tasks::destroy)
                .fallback(method_not_allowed),
        )
        .route(
            "/api/v1/tasks/{id}/subtasks",
            get(handlers::sub_tasks::list)
                .post(handlers::sub_tasks::create)
                .fallback(method_not_allowed),
        )
        .route(
            "/api/v1/tasks/{id}/subtasks/{sub_id}",
            get(handlers::sub_tasks::retrieve)
                .patch(handlers::sub_tasks::partial_update)
                .delete(handlers::sub_tasks::destroy)
                .fallback(method_not_allowed),
        )
        .fallback(not_found)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind and serve until Ctrl+C.
pub async fn serve(state: AppState, bind_address: &str) -> Result<()> {
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(bind_address)
        .await
        .with_context(|| format!("Failed to bind {bind_address}"))?;
    info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to listen for Ctrl+C");
    info!("Received Ctrl+C, shutting down...");
}
