use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use std::sync::Arc;

use super::images::CreatedResponse;
use crate::error::ApiError;
use crate::models::GenerationSettings;
use crate::services::{BatchOrchestrator, Workspace};

/// Generate a new image from a prompt
///
/// The result is added to the workspace as a completed image. Refused while
/// a batch run is in progress.
#[utoipa::path(
    post,
    path = "/api/generate",
    request_body = GenerationSettings,
    responses(
        (status = 201, description = "Image generated", body = CreatedResponse),
        (status = 400, description = "Empty prompt"),
        (status = 409, description = "A run is already in progress"),
        (status = 412, description = "Image service not ready for the tier"),
        (status = 502, description = "Image service failed"),
    ),
    tag = "Generation"
)]
pub async fn generate(
    State(workspace): State<Arc<Workspace>>,
    State(orchestrator): State<Arc<BatchOrchestrator>>,
    Json(settings): Json<GenerationSettings>,
) -> Result<impl IntoResponse, ApiError> {
    if settings.prompt.trim().is_empty() {
        return Err(ApiError::BadRequest("prompt must not be empty".to_string()));
    }

    let image = orchestrator.generate(&settings).await?;
    let id = workspace
        .add_generated(&settings.prompt, image, settings.size_class)
        .await;

    Ok((
        StatusCode::CREATED,
        Json(CreatedResponse {
            id: id.to_string(),
        }),
    ))
}
