pub mod gemini;
pub mod image_service;
pub mod orchestrator;
pub mod retry;
pub mod sampler;
pub mod task_generator;
pub mod workspace;

pub use gemini::GeminiClient;
pub use image_service::{ImageGenerator, ServiceError};
pub use orchestrator::{
    BatchEvent, BatchOrchestrator, BatchProgress, BatchRequest, BatchRun, BatchSink,
    FailureCategory, GenerateError, ImageSnapshot, ImageUpdate, ItemOutcome, RunSummary,
    StartError,
};
pub use retry::{FailureKind, RetryNotice, RetryPolicy};
pub use sampler::{decode_surface, sample_color, SamplerError};
pub use task_generator::{generate_work_items, WorkItem};
pub use workspace::{ImageSummary, RunState, Workspace, WorkspaceError};
