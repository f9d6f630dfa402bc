use std::sync::Arc;

use crate::models::{ColorSpec, ImageId, SourceImage};

/// One (image, color) pairing to send to the image service
#[derive(Debug, Clone)]
pub struct WorkItem {
    pub image: Arc<SourceImage>,
    pub color: ColorSpec,
}

impl WorkItem {
    pub fn source_image_id(&self) -> &ImageId {
        &self.image.id
    }
}

/// Expand images × colors into the work queue for a run.
///
/// Image-major, color-minor: every color of the first image comes before any
/// item of the second. Empty when either input is empty.
pub fn generate_work_items(images: &[Arc<SourceImage>], colors: &[ColorSpec]) -> Vec<WorkItem> {
    images
        .iter()
        .flat_map(|image| {
            colors.iter().map(move |color| WorkItem {
                image: Arc::clone(image),
                color: color.clone(),
            })
        })
        .collect()
}
