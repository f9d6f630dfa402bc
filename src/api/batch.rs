use axum::{
    extract::State,
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Json,
    },
};
use futures_util::stream::Stream;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::convert::Infallible;
use std::sync::Arc;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::models::{AppConfig, ColorSpec, RecolorSettings};
use crate::services::{BatchOrchestrator, BatchRequest, BatchSink, RunState, Workspace};

/// Request body for starting a batch run
#[derive(Debug, Deserialize, ToSchema)]
pub struct StartBatchRequest {
    /// Target colors; duplicates (same hex) are dropped
    pub colors: Vec<ColorSpec>,
    #[serde(flatten)]
    pub settings: RecolorSettings,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StartBatchResponse {
    pub total_items: usize,
}

/// Start recoloring every workspace image into every requested color
///
/// Runs in the background; follow it with `GET /api/batch` or `/api/events`.
#[utoipa::path(
    post,
    path = "/api/batch",
    request_body = StartBatchRequest,
    responses(
        (status = 202, description = "Run started", body = StartBatchResponse),
        (status = 409, description = "A run is already in progress"),
        (status = 412, description = "Image service not ready for the tier"),
        (status = 422, description = "No images or no colors"),
    ),
    tag = "Batch"
)]
pub async fn start_batch(
    State(workspace): State<Arc<Workspace>>,
    State(orchestrator): State<Arc<BatchOrchestrator>>,
    Json(request): Json<StartBatchRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mut seen = HashSet::new();
    let colors: Vec<ColorSpec> = request
        .colors
        .into_iter()
        .filter(|c| seen.insert(c.clone()))
        .collect();

    let batch = BatchRequest {
        images: workspace.snapshot().await,
        colors,
        settings: request.settings,
    };
    let sink: Arc<dyn BatchSink> = workspace;
    let run = orchestrator.start(batch, sink).await?;
    let total_items = run.progress().total_items;

    tokio::spawn(run.run_to_completion());

    Ok((StatusCode::ACCEPTED, Json(StartBatchResponse { total_items })))
}

/// Current run state
#[utoipa::path(
    get,
    path = "/api/batch",
    responses((status = 200, description = "Run state", body = RunState)),
    tag = "Batch"
)]
pub async fn batch_status(State(workspace): State<Arc<Workspace>>) -> Json<RunState> {
    Json(workspace.run_state())
}

/// Server-sent events for batch runs
///
/// Each event is named after its `type` field and carries the JSON event.
#[utoipa::path(
    get,
    path = "/api/events",
    responses((status = 200, description = "Event stream", content_type = "text/event-stream")),
    tag = "Batch"
)]
pub async fn events(
    State(workspace): State<Arc<Workspace>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = workspace.subscribe();

    let stream = BroadcastStream::new(rx).map(|result| match result {
        Ok(event) => Ok(Event::default()
            .event(event.name())
            .json_data(&event)
            .unwrap_or_else(|e| Event::default().event("error").data(e.to_string()))),
        // Slow client missed events; it should refetch state
        Err(_) => Ok(Event::default().event("lagged").data("lagged")),
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Preset colors from the configuration
#[utoipa::path(
    get,
    path = "/api/palette",
    responses((status = 200, description = "Preset colors", body = Vec<ColorSpec>)),
    tag = "Batch"
)]
pub async fn palette(State(config): State<Arc<AppConfig>>) -> Json<Vec<ColorSpec>> {
    Json(config.palette.clone())
}
