use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};

use crate::error::ApiError;
use crate::models::{EncodedImage, ImageId};
use crate::services::{ImageSummary, Workspace};

/// Query parameters for image upload
#[derive(Debug, Deserialize, IntoParams)]
pub struct UploadQuery {
    /// Display name of the image (defaults to "image-N")
    pub name: Option<String>,
}

/// Response from a request that creates an image
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreatedResponse {
    pub id: String,
}

/// Response from clearing the workspace
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ClearResponse {
    pub removed: usize,
}

/// Request body for selecting the active result
#[derive(Debug, Deserialize, ToSchema)]
pub struct ActiveResultRequest {
    pub index: usize,
}

/// Upload a source image
///
/// The raw request body is the encoded image. The format is recognized from
/// its magic bytes; anything unrecognized is rejected.
#[utoipa::path(
    post,
    path = "/api/images",
    request_body(content = Vec<u8>, content_type = "application/octet-stream"),
    params(UploadQuery),
    responses(
        (status = 201, description = "Image added", body = CreatedResponse),
        (status = 415, description = "Unrecognized image format"),
    ),
    tag = "Images"
)]
pub async fn upload_image(
    State(workspace): State<Arc<Workspace>>,
    Query(query): Query<UploadQuery>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let name = match query.name.filter(|n| !n.trim().is_empty()) {
        Some(name) => name,
        None => format!("image-{}", workspace.len().await + 1),
    };
    let id = workspace.add_image(name, body.to_vec()).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreatedResponse {
            id: id.to_string(),
        }),
    ))
}

/// List workspace images in upload order
#[utoipa::path(
    get,
    path = "/api/images",
    responses((status = 200, description = "All images", body = Vec<ImageSummary>)),
    tag = "Images"
)]
pub async fn list_images(State(workspace): State<Arc<Workspace>>) -> Json<Vec<ImageSummary>> {
    Json(workspace.list().await)
}

/// Remove every image
#[utoipa::path(
    delete,
    path = "/api/images",
    responses((status = 200, description = "Workspace cleared", body = ClearResponse)),
    tag = "Images"
)]
pub async fn clear_images(State(workspace): State<Arc<Workspace>>) -> Json<ClearResponse> {
    Json(ClearResponse {
        removed: workspace.clear().await,
    })
}

#[utoipa::path(
    get,
    path = "/api/images/{id}",
    params(("id" = String, Path, description = "Image id")),
    responses(
        (status = 200, description = "Image state", body = ImageSummary),
        (status = 404, description = "Unknown image"),
    ),
    tag = "Images"
)]
pub async fn get_image(
    State(workspace): State<Arc<Workspace>>,
    Path(id): Path<String>,
) -> Result<Json<ImageSummary>, ApiError> {
    Ok(Json(workspace.get(&ImageId::new(id)).await?))
}

#[utoipa::path(
    delete,
    path = "/api/images/{id}",
    params(("id" = String, Path, description = "Image id")),
    responses(
        (status = 204, description = "Image removed"),
        (status = 404, description = "Unknown image"),
    ),
    tag = "Images"
)]
pub async fn delete_image(
    State(workspace): State<Arc<Workspace>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    workspace.remove(&ImageId::new(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Original uploaded bytes
#[utoipa::path(
    get,
    path = "/api/images/{id}/source",
    params(("id" = String, Path, description = "Image id")),
    responses(
        (status = 200, description = "Encoded image", content_type = "image/*"),
        (status = 404, description = "Unknown image"),
    ),
    tag = "Images"
)]
pub async fn get_source(
    State(workspace): State<Arc<Workspace>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let image = workspace.source_image(&ImageId::new(id)).await?;
    Ok(image_response(image))
}

/// Bytes of one result variant
#[utoipa::path(
    get,
    path = "/api/images/{id}/results/{index}",
    params(
        ("id" = String, Path, description = "Image id"),
        ("index" = usize, Path, description = "Result index"),
    ),
    responses(
        (status = 200, description = "Encoded image", content_type = "image/*"),
        (status = 404, description = "Unknown image or result"),
    ),
    tag = "Images"
)]
pub async fn get_result(
    State(workspace): State<Arc<Workspace>>,
    Path((id, index)): Path<(String, usize)>,
) -> Result<Response, ApiError> {
    let image = workspace.result_image(&ImageId::new(id), index).await?;
    Ok(image_response(image))
}

/// Select which result is shown for an image
#[utoipa::path(
    put,
    path = "/api/images/{id}/active",
    params(("id" = String, Path, description = "Image id")),
    request_body = ActiveResultRequest,
    responses(
        (status = 200, description = "Updated image", body = ImageSummary),
        (status = 404, description = "Unknown image or result"),
    ),
    tag = "Images"
)]
pub async fn set_active_result(
    State(workspace): State<Arc<Workspace>>,
    Path(id): Path<String>,
    Json(request): Json<ActiveResultRequest>,
) -> Result<Json<ImageSummary>, ApiError> {
    let summary = workspace
        .set_active_result(&ImageId::new(id), request.index)
        .await?;
    Ok(Json(summary))
}

fn image_response(image: EncodedImage) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, image.mime_type.clone()),
            (header::CACHE_CONTROL, "no-cache".to_string()),
        ],
        image.bytes().to_vec(),
    )
        .into_response()
}
