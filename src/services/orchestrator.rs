//! Sequential batch runner.
//!
//! A run takes a snapshot of the workspace images and selected colors,
//! expands them into work items and sends them to the image service strictly
//! one at a time, pausing a fixed per-tier delay between items. Every state
//! change is published as a [`BatchEvent`] to a [`BatchSink`]; the run never
//! reads live workspace state after it starts.

use async_trait::async_trait;
use serde::{Serialize, Serializer};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use utoipa::ToSchema;

use super::image_service::{ImageGenerator, ServiceError};
use super::retry::{FailureKind, RetryPolicy, RATE_LIMIT_MARKERS};
use super::task_generator::{generate_work_items, WorkItem};
use crate::models::{
    upsert_variant, ColorSpec, EncodedImage, GenerationSettings, ImageId, ImageStatus,
    PacingConfig, RecolorSettings, ResultVariant, SourceImage, Tier,
};

/// Markers of a credential or authorization failure
pub const AUTH_MARKERS: &[&str] = &["401", "403", "PERMISSION_DENIED", "API_KEY_INVALID", "API key"];

pub const AUTH_FAILURE_MESSAGE: &str =
    "Authorization failed: check that the API key is valid and allowed to use this model.";
pub const RATE_LIMIT_FAILURE_MESSAGE: &str =
    "The image service is rate limiting requests. Wait a few minutes, then retry this image.";
pub const GENERIC_FAILURE_MESSAGE: &str =
    "Recoloring failed for this image. Try again or use a different photo.";

/// User-facing category of a failed work item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum FailureCategory {
    Auth,
    RateLimit,
    Generic,
}

impl FailureCategory {
    pub fn classify(description: &str) -> Self {
        let has_any = |markers: &[&str]| markers.iter().any(|m| description.contains(m));

        if has_any(AUTH_MARKERS) {
            FailureCategory::Auth
        } else if has_any(RATE_LIMIT_MARKERS) {
            FailureCategory::RateLimit
        } else {
            FailureCategory::Generic
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            FailureCategory::Auth => AUTH_FAILURE_MESSAGE,
            FailureCategory::RateLimit => RATE_LIMIT_FAILURE_MESSAGE,
            FailureCategory::Generic => GENERIC_FAILURE_MESSAGE,
        }
    }
}

/// Progress of the current run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct BatchProgress {
    pub total_items: usize,
    pub completed_items: usize,
}

/// Full derived state of one image after a step
#[derive(Debug, Clone, Serialize)]
pub struct ImageUpdate {
    pub image_id: ImageId,
    pub status: ImageStatus,
    #[serde(serialize_with = "serialize_result_summaries")]
    pub results: Vec<ResultVariant>,
    pub active_result: Option<usize>,
    pub error: Option<String>,
}

fn serialize_result_summaries<S: Serializer>(
    results: &[ResultVariant],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(results.iter().enumerate().map(|(i, r)| r.summary(i)))
}

/// Totals reported when a run ends
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct RunSummary {
    pub total_items: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Event stream of a batch run
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BatchEvent {
    RunStarted {
        run_id: u64,
        total_items: usize,
        tier: Tier,
    },
    ImageUpdated(ImageUpdate),
    Progress(BatchProgress),
    RetryScheduled {
        image_id: ImageId,
        color: String,
        attempt: u32,
        kind: FailureKind,
        delay_ms: u64,
        error: String,
    },
    ItemFailed {
        image_id: ImageId,
        color: String,
        category: FailureCategory,
        error: String,
        /// Whether the failure was attached to the image
        surfaced: bool,
    },
    RunFinished {
        run_id: u64,
        #[serde(flatten)]
        summary: RunSummary,
    },
}

impl BatchEvent {
    /// Matches the serialized `type` tag
    pub fn name(&self) -> &'static str {
        match self {
            BatchEvent::RunStarted { .. } => "run_started",
            BatchEvent::ImageUpdated(_) => "image_updated",
            BatchEvent::Progress(_) => "progress",
            BatchEvent::RetryScheduled { .. } => "retry_scheduled",
            BatchEvent::ItemFailed { .. } => "item_failed",
            BatchEvent::RunFinished { .. } => "run_finished",
        }
    }
}

/// Receiver of run events
#[async_trait]
pub trait BatchSink: Send + Sync {
    async fn publish(&self, event: BatchEvent);
}

/// Reason a run was refused
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StartError {
    #[error("A run is already in progress")]
    AlreadyRunning,

    #[error("No images to process")]
    NoImages,

    #[error("No target colors selected")]
    NoColors,

    #[error("Image service not ready: {0}")]
    NotReady(String),
}

/// Reason a single generation request failed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerateError {
    #[error("A run is already in progress")]
    Busy,

    #[error("Image service not ready: {0}")]
    NotReady(String),

    #[error("Image service failed: {0}")]
    Service(#[from] ServiceError),
}

/// An image as captured at run start
#[derive(Debug, Clone)]
pub struct ImageSnapshot {
    pub image: Arc<SourceImage>,
    pub results: Vec<ResultVariant>,
    pub active_result: Option<usize>,
}

impl ImageSnapshot {
    pub fn fresh(image: Arc<SourceImage>) -> Self {
        Self {
            image,
            results: Vec::new(),
            active_result: None,
        }
    }
}

/// Inputs of one run
#[derive(Debug, Clone)]
pub struct BatchRequest {
    pub images: Vec<ImageSnapshot>,
    pub colors: Vec<ColorSpec>,
    pub settings: RecolorSettings,
}

/// Outcome of a single work item
#[derive(Debug, Clone, PartialEq)]
pub enum ItemOutcome {
    Succeeded {
        image_id: ImageId,
        color: ColorSpec,
        result_index: usize,
    },
    Failed {
        image_id: ImageId,
        color: ColorSpec,
        category: FailureCategory,
        surfaced: bool,
    },
}

/// Starts batch runs, at most one at a time
pub struct BatchOrchestrator {
    generator: Arc<dyn ImageGenerator>,
    retry: RetryPolicy,
    pacing: PacingConfig,
    running: Arc<AtomicBool>,
    next_run_id: AtomicU64,
}

impl BatchOrchestrator {
    pub fn new(generator: Arc<dyn ImageGenerator>, retry: RetryPolicy, pacing: PacingConfig) -> Self {
        Self {
            generator,
            retry,
            pacing,
            running: Arc::new(AtomicBool::new(false)),
            next_run_id: AtomicU64::new(1),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn generator(&self) -> &Arc<dyn ImageGenerator> {
        &self.generator
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Validate inputs, claim the run slot and publish the initial state.
    ///
    /// Nothing is published when the start is refused.
    pub async fn start(
        &self,
        request: BatchRequest,
        sink: Arc<dyn BatchSink>,
    ) -> Result<BatchRun, StartError> {
        if request.images.is_empty() {
            return Err(StartError::NoImages);
        }
        if request.colors.is_empty() {
            return Err(StartError::NoColors);
        }
        self.generator
            .check_ready(request.settings.tier)
            .map_err(StartError::NotReady)?;

        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(StartError::AlreadyRunning);
        }
        let guard = RunGuard(Arc::clone(&self.running));
        let run_id = self.next_run_id.fetch_add(1, Ordering::SeqCst);

        let sources: Vec<Arc<SourceImage>> =
            request.images.iter().map(|s| Arc::clone(&s.image)).collect();
        let queue: VecDeque<WorkItem> = generate_work_items(&sources, &request.colors).into();
        let progress = BatchProgress {
            total_items: queue.len(),
            completed_items: 0,
        };

        let tier = request.settings.tier;
        tracing::info!(
            run_id,
            images = sources.len(),
            colors = request.colors.len(),
            total_items = progress.total_items,
            tier = %tier,
            "Starting batch run"
        );

        let mut order = Vec::with_capacity(request.images.len());
        let mut images = HashMap::with_capacity(request.images.len());
        for snapshot in request.images {
            let id = snapshot.image.id.clone();
            if images.contains_key(&id) {
                continue;
            }
            let active_result = snapshot
                .active_result
                .filter(|&i| i < snapshot.results.len());
            order.push(id.clone());
            images.insert(
                id,
                ImageState {
                    status: ImageStatus::Processing,
                    results: snapshot.results,
                    active_result,
                    error: None,
                },
            );
        }

        let run = BatchRun {
            run_id,
            generator: Arc::clone(&self.generator),
            retry: self.retry,
            inter_item_delay: self.pacing.delay_for(tier),
            settings: request.settings,
            queue,
            images,
            progress,
            succeeded: 0,
            failed: 0,
            sink,
            guard: Some(guard),
        };

        run.sink
            .publish(BatchEvent::RunStarted {
                run_id,
                total_items: progress.total_items,
                tier,
            })
            .await;
        for id in &order {
            run.publish_image(id).await;
        }
        run.sink.publish(BatchEvent::Progress(progress)).await;

        Ok(run)
    }

    /// Generate one image from a prompt, holding the run slot for the call.
    pub async fn generate(&self, settings: &GenerationSettings) -> Result<EncodedImage, GenerateError> {
        self.generator
            .check_ready(settings.tier)
            .map_err(GenerateError::NotReady)?;

        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(GenerateError::Busy);
        }
        let _guard = RunGuard(Arc::clone(&self.running));

        tracing::info!(tier = %settings.tier, size = %settings.size_class, "Generating image");
        let image = self
            .retry
            .execute(|| self.generator.generate(settings))
            .await?;
        Ok(image)
    }
}

/// Releases the run slot when the run ends or is dropped
struct RunGuard(Arc<AtomicBool>);

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[derive(Debug)]
struct ImageState {
    status: ImageStatus,
    results: Vec<ResultVariant>,
    active_result: Option<usize>,
    error: Option<String>,
}

/// A started run. Drive it with [`BatchRun::step`] or [`BatchRun::run_to_completion`].
pub struct BatchRun {
    run_id: u64,
    generator: Arc<dyn ImageGenerator>,
    retry: RetryPolicy,
    inter_item_delay: Duration,
    settings: RecolorSettings,
    queue: VecDeque<WorkItem>,
    images: HashMap<ImageId, ImageState>,
    progress: BatchProgress,
    succeeded: usize,
    failed: usize,
    sink: Arc<dyn BatchSink>,
    guard: Option<RunGuard>,
}

impl BatchRun {
    pub fn run_id(&self) -> u64 {
        self.run_id
    }

    pub fn progress(&self) -> BatchProgress {
        self.progress
    }

    pub fn remaining(&self) -> usize {
        self.queue.len()
    }

    pub fn inter_item_delay(&self) -> Duration {
        self.inter_item_delay
    }

    /// Process the next work item.
    ///
    /// Publishes the image update and progress, then sleeps the inter-item
    /// delay if more items remain. Returns `None` once the queue is empty.
    pub async fn step(&mut self) -> Option<ItemOutcome> {
        let item = self.queue.pop_front()?;
        let image_id = item.source_image_id().clone();
        let color_hex = item.color.hex().to_string();

        tracing::info!(
            image = %image_id,
            color = %color_hex,
            remaining = self.queue.len(),
            "Processing work item"
        );

        let generator = &self.generator;
        let settings = &self.settings;
        let sink = &self.sink;
        let result: Result<EncodedImage, ServiceError> = self
            .retry
            .execute_with(
                || generator.recolor(&item.image, &item.color, settings),
                |notice| {
                    let event = BatchEvent::RetryScheduled {
                        image_id: image_id.clone(),
                        color: color_hex.clone(),
                        attempt: notice.attempt,
                        kind: notice.kind,
                        delay_ms: notice.delay.as_millis() as u64,
                        error: notice.error,
                    };
                    let sink = Arc::clone(sink);
                    async move { sink.publish(event).await }
                },
            )
            .await;

        let outcome = match result {
            Ok(image) => self.record_success(item, image).await,
            Err(error) => self.record_failure(item, error).await,
        };

        self.progress.completed_items += 1;
        self.sink.publish(BatchEvent::Progress(self.progress)).await;

        if !self.queue.is_empty() {
            tokio::time::sleep(self.inter_item_delay).await;
        }

        Some(outcome)
    }

    /// Drain the queue, release the run slot and report totals.
    pub async fn run_to_completion(mut self) -> RunSummary {
        while self.step().await.is_some() {}

        let summary = RunSummary {
            total_items: self.progress.total_items,
            succeeded: self.succeeded,
            failed: self.failed,
        };
        tracing::info!(
            run_id = self.run_id,
            total_items = summary.total_items,
            succeeded = summary.succeeded,
            failed = summary.failed,
            "Batch run finished"
        );

        // Free the slot before announcing, so listeners may start the next run
        self.guard.take();
        self.sink
            .publish(BatchEvent::RunFinished {
                run_id: self.run_id,
                summary,
            })
            .await;
        summary
    }

    async fn record_success(&mut self, item: WorkItem, image: EncodedImage) -> ItemOutcome {
        self.succeeded += 1;
        let image_id = item.image.id.clone();

        let result_index = match self.images.get_mut(&image_id) {
            Some(state) => {
                let variant =
                    ResultVariant::recolored(item.color.clone(), image, self.settings.size_class);
                let idx = upsert_variant(&mut state.results, variant);
                state.active_result = Some(idx);
                state.status = ImageStatus::Completed;
                state.error = None;
                idx
            }
            None => 0,
        };

        tracing::info!(
            image = %image_id,
            color = %item.color.hex(),
            result_index,
            "Work item succeeded"
        );
        self.publish_image(&image_id).await;

        ItemOutcome::Succeeded {
            image_id,
            color: item.color,
            result_index,
        }
    }

    async fn record_failure(&mut self, item: WorkItem, error: ServiceError) -> ItemOutcome {
        self.failed += 1;
        let image_id = item.image.id.clone();
        let category = FailureCategory::classify(error.description());

        let surfaced = match self.images.get_mut(&image_id) {
            Some(state) if state.results.is_empty() => {
                state.status = ImageStatus::Error;
                state.error = Some(category.message().to_string());
                true
            }
            Some(state) => {
                // Earlier successes keep the image usable
                state.status = ImageStatus::Completed;
                false
            }
            None => false,
        };

        tracing::warn!(
            image = %image_id,
            color = %item.color.hex(),
            category = ?category,
            surfaced,
            error = %error,
            "Work item failed"
        );

        self.sink
            .publish(BatchEvent::ItemFailed {
                image_id: image_id.clone(),
                color: item.color.hex().to_string(),
                category,
                error: error.to_string(),
                surfaced,
            })
            .await;
        self.publish_image(&image_id).await;

        ItemOutcome::Failed {
            image_id,
            color: item.color,
            category,
            surfaced,
        }
    }

    async fn publish_image(&self, image_id: &ImageId) {
        let Some(state) = self.images.get(image_id) else {
            return;
        };
        let update = ImageUpdate {
            image_id: image_id.clone(),
            status: state.status,
            results: state.results.clone(),
            active_result: state.active_result,
            error: state.error.clone(),
        };
        self.sink.publish(BatchEvent::ImageUpdated(update)).await;
    }
}
