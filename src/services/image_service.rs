use async_trait::async_trait;

use crate::models::{ColorSpec, EncodedImage, GenerationSettings, RecolorSettings, SourceImage, Tier};

/// Opaque failure description from the image service.
///
/// Callers only inspect it for substring markers (see `services::retry`).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ServiceError(pub String);

impl ServiceError {
    pub fn new(description: impl Into<String>) -> Self {
        Self(description.into())
    }

    pub fn description(&self) -> &str {
        &self.0
    }
}

/// External generative image service
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Check credential/tier gating before a run starts.
    ///
    /// Returns a user-facing reason when the tier cannot be used.
    fn check_ready(&self, tier: Tier) -> Result<(), String>;

    /// Produce a copy of `image` with the garment recolored to `color`
    async fn recolor(
        &self,
        image: &SourceImage,
        color: &ColorSpec,
        settings: &RecolorSettings,
    ) -> Result<EncodedImage, ServiceError>;

    /// Produce a new image from a prompt
    async fn generate(&self, settings: &GenerationSettings) -> Result<EncodedImage, ServiceError>;
}
