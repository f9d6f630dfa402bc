use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    response::Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use swatch::{Point, Size};
use utoipa::{IntoParams, ToSchema};

use crate::error::ApiError;
use crate::models::{EncodedImage, ImageId};
use crate::services::{sample_color, Workspace};

/// Where the user clicked, in display coordinates
#[derive(Debug, Deserialize, ToSchema, IntoParams)]
pub struct SamplePoint {
    /// Width the image is displayed at
    pub display_width: f64,
    /// Height the image is displayed at
    pub display_height: f64,
    pub x: f64,
    pub y: f64,
}

/// Request body for sampling a workspace image
#[derive(Debug, Deserialize, ToSchema)]
pub struct SampleImageRequest {
    #[serde(flatten)]
    pub point: SamplePoint,
    /// Sample this result instead of the source image
    pub result: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SampleResponse {
    /// Sampled color as uppercase `#RRGGBB`
    #[schema(example = "#1F3A5C")]
    pub hex: String,
}

/// Pick a color from a workspace image
#[utoipa::path(
    post,
    path = "/api/images/{id}/sample",
    params(("id" = String, Path, description = "Image id")),
    request_body = SampleImageRequest,
    responses(
        (status = 200, description = "Sampled color", body = SampleResponse),
        (status = 400, description = "Point outside the image or invalid display size"),
        (status = 404, description = "Unknown image or result"),
    ),
    tag = "Sampling"
)]
pub async fn sample_image(
    State(workspace): State<Arc<Workspace>>,
    Path(id): Path<String>,
    Json(request): Json<SampleImageRequest>,
) -> Result<Json<SampleResponse>, ApiError> {
    let id = ImageId::new(id);
    let image = match request.result {
        Some(index) => workspace.result_image(&id, index).await?,
        None => workspace.source_image(&id).await?,
    };
    sample(image, request.point).await
}

/// Pick a color from an uploaded reference image
///
/// The image is not added to the workspace.
#[utoipa::path(
    post,
    path = "/api/sample",
    params(SamplePoint),
    request_body(content = Vec<u8>, content_type = "application/octet-stream"),
    responses(
        (status = 200, description = "Sampled color", body = SampleResponse),
        (status = 400, description = "Undecodable image, point outside the image or invalid display size"),
    ),
    tag = "Sampling"
)]
pub async fn sample_reference(
    Query(point): Query<SamplePoint>,
    body: Bytes,
) -> Result<Json<SampleResponse>, ApiError> {
    let image = EncodedImage::new("application/octet-stream", body.to_vec());
    sample(image, point).await
}

async fn sample(image: EncodedImage, point: SamplePoint) -> Result<Json<SampleResponse>, ApiError> {
    let display = Size::new(point.display_width, point.display_height);
    let pointer = Point::new(point.x, point.y);

    // Decoding a full-size photo is CPU bound
    let rgb = tokio::task::spawn_blocking(move || sample_color(&image, display, pointer))
        .await
        .map_err(|e| ApiError::Internal(format!("Task error: {e}")))??;

    Ok(Json(SampleResponse { hex: rgb.to_hex() }))
}
