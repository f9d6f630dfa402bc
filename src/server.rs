//! HTTP server setup and configuration.
//!
//! This module provides the router and application state used by both
//! the production server and integration tests.

use axum::{
    extract::{DefaultBodyLimit, FromRef},
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::api;
use crate::models::AppConfig;
use crate::services::{BatchOrchestrator, GeminiClient, ImageGenerator, RetryPolicy, Workspace};

/// Largest accepted upload
pub const MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub workspace: Arc<Workspace>,
    pub orchestrator: Arc<BatchOrchestrator>,
}

impl FromRef<AppState> for Arc<AppConfig> {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for Arc<Workspace> {
    fn from_ref(state: &AppState) -> Self {
        state.workspace.clone()
    }
}

impl FromRef<AppState> for Arc<BatchOrchestrator> {
    fn from_ref(state: &AppState) -> Self {
        state.orchestrator.clone()
    }
}

/// Create application state backed by the configured image service.
pub fn create_app_state(config: AppConfig) -> anyhow::Result<AppState> {
    let client = GeminiClient::new(config.service.clone())
        .map_err(|e| anyhow::anyhow!("Failed to create image service client: {e}"))?;
    Ok(app_state_with_generator(config, Arc::new(client)))
}

/// Create application state around any image generator.
pub fn app_state_with_generator(config: AppConfig, generator: Arc<dyn ImageGenerator>) -> AppState {
    let orchestrator = BatchOrchestrator::new(
        generator,
        RetryPolicy::from(config.retry),
        config.pacing,
    );

    AppState {
        config: Arc::new(config),
        workspace: Arc::new(Workspace::new()),
        orchestrator: Arc::new(orchestrator),
    }
}

/// Build the API router with all endpoints and middleware.
///
/// This is the core router used by both production and tests.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Workspace images
        .route(
            "/api/images",
            get(api::list_images)
                .post(api::upload_image)
                .delete(api::clear_images),
        )
        .route(
            "/api/images/:id",
            get(api::get_image).delete(api::delete_image),
        )
        .route("/api/images/:id/source", get(api::get_source))
        .route("/api/images/:id/results/:index", get(api::get_result))
        .route("/api/images/:id/active", put(api::set_active_result))
        // Color sampling
        .route("/api/images/:id/sample", post(api::sample_image))
        .route("/api/sample", post(api::sample_reference))
        // Batch runs
        .route("/api/palette", get(api::palette))
        .route("/api/batch", get(api::batch_status).post(api::start_batch))
        .route("/api/events", get(api::events))
        .route("/api/generate", post(api::generate))
        // Health check
        .route("/health", get(|| async { "OK" }))
        .with_state(state)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
