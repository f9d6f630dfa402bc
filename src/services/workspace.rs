//! In-memory workspace of uploaded images and their results.
//!
//! The workspace is the only owner of per-image state. Batch runs work on a
//! snapshot and feed their changes back through the [`BatchSink`] impl, which
//! also fans every event out to subscribers.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{broadcast, watch, RwLock};
use utoipa::ToSchema;

use super::orchestrator::{BatchEvent, BatchSink, ImageSnapshot, ImageUpdate};
use crate::models::{
    EncodedImage, ImageId, ImageStatus, ResultSummary, ResultVariant, SizeClass, SourceImage,
};

const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorkspaceError {
    #[error("Unsupported or unrecognized image format")]
    UnsupportedImage,

    #[error("Image not found: {0}")]
    ImageNotFound(ImageId),

    #[error("Image {id} has no result at index {index}")]
    ResultNotFound { id: ImageId, index: usize },
}

/// Run activity as seen by the workspace
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct RunState {
    /// Run the state belongs to; 0 before the first run
    #[serde(skip)]
    pub run_id: u64,
    pub active: bool,
    pub total_items: usize,
    pub completed_items: usize,
}

/// Public view of one workspace image
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ImageSummary {
    pub id: ImageId,
    pub name: String,
    pub mime_type: String,
    pub status: ImageStatus,
    pub error: Option<String>,
    pub active_result: Option<usize>,
    pub results: Vec<ResultSummary>,
    #[schema(value_type = String, format = DateTime)]
    pub added_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug)]
struct ImageEntry {
    source: Arc<SourceImage>,
    status: ImageStatus,
    results: Vec<ResultVariant>,
    active_result: Option<usize>,
    error: Option<String>,
}

impl ImageEntry {
    fn new(source: SourceImage) -> Self {
        Self {
            source: Arc::new(source),
            status: ImageStatus::Pending,
            results: Vec::new(),
            active_result: None,
            error: None,
        }
    }

    fn summary(&self) -> ImageSummary {
        ImageSummary {
            id: self.source.id.clone(),
            name: self.source.name.clone(),
            mime_type: self.source.image.mime_type.clone(),
            status: self.status,
            error: self.error.clone(),
            active_result: self.active_result,
            results: self
                .results
                .iter()
                .enumerate()
                .map(|(i, r)| r.summary(i))
                .collect(),
            added_at: self.source.added_at,
        }
    }

    fn apply(&mut self, update: ImageUpdate) {
        self.status = update.status;
        self.results = update.results;
        self.active_result = update.active_result;
        self.error = update.error;
    }
}

pub struct Workspace {
    images: RwLock<Vec<ImageEntry>>,
    events: broadcast::Sender<BatchEvent>,
    run_state: watch::Sender<RunState>,
}

impl Default for Workspace {
    fn default() -> Self {
        Self::new()
    }
}

impl Workspace {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (run_state, _) = watch::channel(RunState::default());
        Self {
            images: RwLock::new(Vec::new()),
            events,
            run_state,
        }
    }

    /// Add an uploaded image. The format is recognized from its magic bytes.
    pub async fn add_image(
        &self,
        name: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Result<ImageId, WorkspaceError> {
        let image = EncodedImage::sniff(bytes).ok_or(WorkspaceError::UnsupportedImage)?;
        let source = SourceImage::new(name, image);
        let id = source.id.clone();

        tracing::info!(
            id = %id,
            name = %source.name,
            mime_type = %source.image.mime_type,
            bytes = source.image.len(),
            "Image added"
        );
        self.images.write().await.push(ImageEntry::new(source));
        Ok(id)
    }

    /// Add a generated image as a new completed entry.
    ///
    /// The generated bytes serve both as the source and as the only result.
    pub async fn add_generated(
        &self,
        prompt: &str,
        image: EncodedImage,
        size_class: SizeClass,
    ) -> ImageId {
        let name = format!(
            "generated-{}.{}",
            chrono::Utc::now().format("%Y%m%d-%H%M%S"),
            image.extension()
        );
        let mut entry = ImageEntry::new(SourceImage::new(name, image.clone()));
        entry.results.push(ResultVariant::generated(prompt, image, size_class));
        entry.active_result = Some(0);
        entry.status = ImageStatus::Completed;

        let id = entry.source.id.clone();
        tracing::info!(id = %id, "Generated image added");
        self.images.write().await.push(entry);
        id
    }

    pub async fn list(&self) -> Vec<ImageSummary> {
        self.images.read().await.iter().map(ImageEntry::summary).collect()
    }

    pub async fn len(&self) -> usize {
        self.images.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.images.read().await.is_empty()
    }

    pub async fn get(&self, id: &ImageId) -> Result<ImageSummary, WorkspaceError> {
        let images = self.images.read().await;
        find(&images, id).map(ImageEntry::summary)
    }

    pub async fn remove(&self, id: &ImageId) -> Result<(), WorkspaceError> {
        let mut images = self.images.write().await;
        let pos = images
            .iter()
            .position(|e| &e.source.id == id)
            .ok_or_else(|| WorkspaceError::ImageNotFound(id.clone()))?;
        images.remove(pos);
        tracing::info!(id = %id, "Image removed");
        Ok(())
    }

    /// Remove every image, returning how many were dropped
    pub async fn clear(&self) -> usize {
        let mut images = self.images.write().await;
        let count = images.len();
        images.clear();
        tracing::info!(count, "Workspace cleared");
        count
    }

    pub async fn set_active_result(
        &self,
        id: &ImageId,
        index: usize,
    ) -> Result<ImageSummary, WorkspaceError> {
        let mut images = self.images.write().await;
        let entry = images
            .iter_mut()
            .find(|e| &e.source.id == id)
            .ok_or_else(|| WorkspaceError::ImageNotFound(id.clone()))?;
        if index >= entry.results.len() {
            return Err(WorkspaceError::ResultNotFound {
                id: id.clone(),
                index,
            });
        }
        entry.active_result = Some(index);
        Ok(entry.summary())
    }

    pub async fn source_image(&self, id: &ImageId) -> Result<EncodedImage, WorkspaceError> {
        let images = self.images.read().await;
        find(&images, id).map(|e| e.source.image.clone())
    }

    pub async fn result_image(
        &self,
        id: &ImageId,
        index: usize,
    ) -> Result<EncodedImage, WorkspaceError> {
        let images = self.images.read().await;
        let entry = find(&images, id)?;
        entry
            .results
            .get(index)
            .map(|r| r.image.clone())
            .ok_or_else(|| WorkspaceError::ResultNotFound {
                id: id.clone(),
                index,
            })
    }

    /// Capture images and their current results for a new run
    pub async fn snapshot(&self) -> Vec<ImageSnapshot> {
        self.images
            .read()
            .await
            .iter()
            .map(|e| ImageSnapshot {
                image: Arc::clone(&e.source),
                results: e.results.clone(),
                active_result: e.active_result,
            })
            .collect()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BatchEvent> {
        self.events.subscribe()
    }

    pub fn run_state(&self) -> RunState {
        *self.run_state.borrow()
    }

    pub fn watch_run_state(&self) -> watch::Receiver<RunState> {
        self.run_state.subscribe()
    }

    /// Resolve once no run is active
    pub async fn wait_idle(&self) {
        let mut rx = self.run_state.subscribe();
        // Sender lives in self, so the channel cannot close here
        let _ = rx.wait_for(|s| !s.active).await;
    }

    async fn apply_update(&self, update: &ImageUpdate) {
        let mut images = self.images.write().await;
        match images.iter_mut().find(|e| e.source.id == update.image_id) {
            Some(entry) => entry.apply(update.clone()),
            None => {
                tracing::debug!(id = %update.image_id, "Ignoring update for removed image");
            }
        }
    }
}

fn find<'a>(images: &'a [ImageEntry], id: &ImageId) -> Result<&'a ImageEntry, WorkspaceError> {
    images
        .iter()
        .find(|e| &e.source.id == id)
        .ok_or_else(|| WorkspaceError::ImageNotFound(id.clone()))
}

#[async_trait]
impl BatchSink for Workspace {
    async fn publish(&self, event: BatchEvent) {
        match &event {
            BatchEvent::RunStarted {
                run_id,
                total_items,
                ..
            } => {
                self.run_state.send_replace(RunState {
                    run_id: *run_id,
                    active: true,
                    total_items: *total_items,
                    completed_items: 0,
                });
            }
            BatchEvent::ImageUpdated(update) => self.apply_update(update).await,
            BatchEvent::Progress(progress) => {
                self.run_state.send_modify(|s| {
                    s.total_items = progress.total_items;
                    s.completed_items = progress.completed_items;
                });
            }
            BatchEvent::RunFinished { run_id, .. } => {
                // A newer run may have started before this one was announced
                self.run_state.send_if_modified(|s| {
                    if s.run_id != *run_id {
                        tracing::debug!(
                            run_id,
                            current = s.run_id,
                            "Ignoring finish of an earlier run"
                        );
                        return false;
                    }
                    s.active = false;
                    true
                });
            }
            BatchEvent::RetryScheduled { .. } | BatchEvent::ItemFailed { .. } => {}
        }

        // No subscribers is fine
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::orchestrator::{BatchProgress, RunSummary};
    use crate::models::ColorSpec;

    const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

    fn variant(hex: &str) -> ResultVariant {
        ResultVariant::recolored(
            ColorSpec::new(hex, hex).unwrap(),
            EncodedImage::new("image/png", vec![7]),
            SizeClass::OneK,
        )
    }

    #[tokio::test]
    async fn test_add_rejects_unknown_format() {
        let ws = Workspace::new();
        assert_eq!(
            ws.add_image("a.txt", b"hello".to_vec()).await,
            Err(WorkspaceError::UnsupportedImage)
        );
        assert!(ws.is_empty().await);
    }

    #[tokio::test]
    async fn test_add_list_remove_in_order() {
        let ws = Workspace::new();
        let a = ws.add_image("a.png", PNG_MAGIC.to_vec()).await.unwrap();
        let b = ws.add_image("b.png", PNG_MAGIC.to_vec()).await.unwrap();

        let list = ws.list().await;
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].id, a);
        assert_eq!(list[0].status, ImageStatus::Pending);
        assert_eq!(list[1].name, "b.png");

        ws.remove(&a).await.unwrap();
        assert_eq!(ws.remove(&a).await, Err(WorkspaceError::ImageNotFound(a.clone())));
        assert_eq!(ws.len().await, 1);
        assert_eq!(ws.clear().await, 1);
        assert!(ws.get(&b).await.is_err());
    }

    #[tokio::test]
    async fn test_updates_applied_and_removed_ids_ignored() {
        let ws = Workspace::new();
        let id = ws.add_image("a.png", PNG_MAGIC.to_vec()).await.unwrap();

        ws.publish(BatchEvent::ImageUpdated(ImageUpdate {
            image_id: id.clone(),
            status: ImageStatus::Completed,
            results: vec![variant("#FF0000")],
            active_result: Some(0),
            error: None,
        }))
        .await;

        let summary = ws.get(&id).await.unwrap();
        assert_eq!(summary.status, ImageStatus::Completed);
        assert_eq!(summary.results.len(), 1);
        assert_eq!(ws.result_image(&id, 0).await.unwrap().bytes(), &[7]);

        ws.publish(BatchEvent::ImageUpdated(ImageUpdate {
            image_id: ImageId::new("GONE"),
            status: ImageStatus::Error,
            results: vec![],
            active_result: None,
            error: Some("x".into()),
        }))
        .await;
        assert_eq!(ws.len().await, 1);
    }

    #[tokio::test]
    async fn test_active_result_selection() {
        let ws = Workspace::new();
        let id = ws.add_image("a.png", PNG_MAGIC.to_vec()).await.unwrap();
        ws.publish(BatchEvent::ImageUpdated(ImageUpdate {
            image_id: id.clone(),
            status: ImageStatus::Completed,
            results: vec![variant("#FF0000"), variant("#0000FF")],
            active_result: Some(1),
            error: None,
        }))
        .await;

        assert_eq!(ws.set_active_result(&id, 0).await.unwrap().active_result, Some(0));
        assert_eq!(
            ws.set_active_result(&id, 2).await.unwrap_err(),
            WorkspaceError::ResultNotFound { id: id.clone(), index: 2 }
        );
        assert!(matches!(
            ws.result_image(&id, 5).await,
            Err(WorkspaceError::ResultNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_run_state_tracking_and_fanout() {
        let ws = Workspace::new();
        let mut rx = ws.subscribe();

        ws.publish(BatchEvent::RunStarted {
            run_id: 1,
            total_items: 2,
            tier: Default::default(),
        })
        .await;
        assert_eq!(
            ws.run_state(),
            RunState { run_id: 1, active: true, total_items: 2, completed_items: 0 }
        );

        ws.publish(BatchEvent::Progress(BatchProgress { total_items: 2, completed_items: 2 }))
            .await;
        ws.publish(BatchEvent::RunFinished {
            run_id: 1,
            summary: RunSummary { total_items: 2, succeeded: 2, failed: 0 },
        })
        .await;

        ws.wait_idle().await;
        assert_eq!(
            ws.run_state(),
            RunState { run_id: 1, active: false, total_items: 2, completed_items: 2 }
        );

        assert!(matches!(rx.recv().await.unwrap(), BatchEvent::RunStarted { .. }));
        assert!(matches!(rx.recv().await.unwrap(), BatchEvent::Progress(_)));
        assert!(matches!(rx.recv().await.unwrap(), BatchEvent::RunFinished { .. }));
    }

    #[tokio::test]
    async fn test_late_finish_of_earlier_run_is_ignored() {
        let ws = Workspace::new();
        let started = |run_id| BatchEvent::RunStarted {
            run_id,
            total_items: 1,
            tier: Default::default(),
        };
        let finished = |run_id| BatchEvent::RunFinished {
            run_id,
            summary: RunSummary { total_items: 1, succeeded: 1, failed: 0 },
        };

        ws.publish(started(1)).await;
        ws.publish(started(2)).await;
        ws.publish(finished(1)).await;
        assert!(ws.run_state().active);
        assert_eq!(ws.run_state().run_id, 2);

        ws.publish(finished(2)).await;
        assert!(!ws.run_state().active);
    }

    #[tokio::test]
    async fn test_add_generated_is_completed() {
        let ws = Workspace::new();
        let id = ws
            .add_generated("a red coat", EncodedImage::new("image/png", vec![1]), SizeClass::TwoK)
            .await;

        let summary = ws.get(&id).await.unwrap();
        assert_eq!(summary.status, ImageStatus::Completed);
        assert_eq!(summary.active_result, Some(0));
        assert!(summary.results[0].color.is_none());
        assert_eq!(summary.results[0].source_prompt.as_deref(), Some("a red coat"));
        assert!(summary.name.starts_with("generated-"));
    }

    #[tokio::test]
    async fn test_snapshot_carries_results() {
        let ws = Workspace::new();
        let id = ws.add_generated("p", EncodedImage::new("image/png", vec![1]), SizeClass::OneK).await;
        let snap = ws.snapshot().await;
        assert_eq!(snap.len(), 1);
        assert_eq!(snap[0].image.id, id);
        assert_eq!(snap[0].results.len(), 1);
        assert_eq!(snap[0].active_result, Some(0));
    }
}
