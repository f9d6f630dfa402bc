use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::services::{GenerateError, SamplerError, StartError, WorkspaceError};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Unsupported or unrecognized image format")]
    UnsupportedImage,

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Unprocessable(String),

    #[error("{0}")]
    PreconditionFailed(String),

    #[error("Sampling failed: {0}")]
    Sample(#[from] SamplerError),

    #[error("Image service error: {0}")]
    Upstream(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<WorkspaceError> for ApiError {
    fn from(e: WorkspaceError) -> Self {
        match e {
            WorkspaceError::UnsupportedImage => ApiError::UnsupportedImage,
            WorkspaceError::ImageNotFound(_) | WorkspaceError::ResultNotFound { .. } => {
                ApiError::NotFound(e.to_string())
            }
        }
    }
}

impl From<StartError> for ApiError {
    fn from(e: StartError) -> Self {
        match e {
            StartError::AlreadyRunning => ApiError::Conflict(e.to_string()),
            StartError::NoImages | StartError::NoColors => ApiError::Unprocessable(e.to_string()),
            StartError::NotReady(_) => ApiError::PreconditionFailed(e.to_string()),
        }
    }
}

impl From<GenerateError> for ApiError {
    fn from(e: GenerateError) -> Self {
        match e {
            GenerateError::Busy => ApiError::Conflict(e.to_string()),
            GenerateError::NotReady(_) => ApiError::PreconditionFailed(e.to_string()),
            GenerateError::Service(inner) => ApiError::Upstream(inner.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) | ApiError::Sample(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::UnsupportedImage => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::PreconditionFailed(_) => StatusCode::PRECONDITION_FAILED,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self, "Request failed");
        }

        let body = Json(json!({
            "status": status.as_u16(),
            "error": self.to_string(),
        }));

        (status, body).into_response()
    }
}
