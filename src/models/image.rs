use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use utoipa::ToSchema;

use super::{ColorSpec, SizeClass};

/// Opaque workspace image identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct ImageId(String);

impl ImageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a random identifier with 48 bits of entropy (12 hex chars)
    pub fn generate() -> Self {
        use rand::Rng;
        let high = rand::thread_rng().gen::<u32>();
        let low = rand::thread_rng().gen::<u16>();
        Self(format!("{high:08X}{low:04X}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Encoded image bytes passed through unchanged.
///
/// The buffer is shared, so cloning a variant list does not copy pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub mime_type: String,
    data: Arc<[u8]>,
}

impl EncodedImage {
    pub fn new(mime_type: impl Into<String>, data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    /// Wrap raw upload bytes, deriving the MIME type from the magic bytes.
    ///
    /// Returns `None` when the format is not recognized.
    pub fn sniff(data: Vec<u8>) -> Option<Self> {
        let format = image::guess_format(&data).ok()?;
        Some(Self::new(format.to_mime_type(), data))
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Preferred file extension for the MIME type
    pub fn extension(&self) -> &'static str {
        match self.mime_type.as_str() {
            "image/jpeg" => "jpg",
            "image/webp" => "webp",
            "image/gif" => "gif",
            _ => "png",
        }
    }
}

/// A photo supplied by the user. Never mutated after creation.
#[derive(Debug, Clone)]
pub struct SourceImage {
    pub id: ImageId,
    pub name: String,
    pub image: EncodedImage,
    pub added_at: chrono::DateTime<chrono::Utc>,
}

impl SourceImage {
    pub fn new(name: impl Into<String>, image: EncodedImage) -> Self {
        Self {
            id: ImageId::generate(),
            name: name.into(),
            image,
            added_at: chrono::Utc::now(),
        }
    }
}

/// Per-image processing state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ImageStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Error,
}

/// One output image attached to a source image
#[derive(Debug, Clone)]
pub struct ResultVariant {
    /// Target color; absent for pure-generation results
    pub color: Option<ColorSpec>,
    pub image: EncodedImage,
    pub source_prompt: Option<String>,
    pub size_class: Option<SizeClass>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl ResultVariant {
    pub fn recolored(color: ColorSpec, image: EncodedImage, size_class: SizeClass) -> Self {
        Self {
            color: Some(color),
            image,
            source_prompt: None,
            size_class: Some(size_class),
            created_at: chrono::Utc::now(),
        }
    }

    pub fn generated(prompt: impl Into<String>, image: EncodedImage, size_class: SizeClass) -> Self {
        Self {
            color: None,
            image,
            source_prompt: Some(prompt.into()),
            size_class: Some(size_class),
            created_at: chrono::Utc::now(),
        }
    }

    pub fn summary(&self, index: usize) -> ResultSummary {
        ResultSummary {
            index,
            color: self.color.clone(),
            mime_type: self.image.mime_type.clone(),
            byte_len: self.image.len(),
            source_prompt: self.source_prompt.clone(),
            size_class: self.size_class,
            created_at: self.created_at,
        }
    }
}

/// Metadata view of a result variant, without the image bytes
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ResultSummary {
    pub index: usize,
    pub color: Option<ColorSpec>,
    pub mime_type: String,
    pub byte_len: usize,
    pub source_prompt: Option<String>,
    pub size_class: Option<SizeClass>,
    #[schema(value_type = String, format = DateTime)]
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Insert a variant, replacing an existing one of the same color.
///
/// Returns the index the variant now occupies. Variants without a color
/// always append.
pub fn upsert_variant(results: &mut Vec<ResultVariant>, variant: ResultVariant) -> usize {
    if let Some(color) = &variant.color {
        if let Some(idx) = results
            .iter()
            .position(|existing| existing.color.as_ref() == Some(color))
        {
            results[idx] = variant;
            return idx;
        }
    }
    results.push(variant);
    results.len() - 1
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png(tag: u8) -> EncodedImage {
        EncodedImage::new("image/png", vec![tag])
    }

    fn color(name: &str, hex: &str) -> ColorSpec {
        ColorSpec::new(name, hex).unwrap()
    }

    #[test]
    fn test_image_id_format() {
        let id = ImageId::generate();
        assert_eq!(id.as_str().len(), 12);
        assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(ImageId::generate(), id);
    }

    #[test]
    fn test_sniff_recognizes_png_and_rejects_garbage() {
        let png_magic = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR".to_vec();
        let img = EncodedImage::sniff(png_magic).unwrap();
        assert_eq!(img.mime_type, "image/png");
        assert_eq!(img.extension(), "png");

        assert!(EncodedImage::sniff(b"not an image".to_vec()).is_none());
    }

    #[test]
    fn test_upsert_appends_new_colors() {
        let mut results = Vec::new();
        let a = upsert_variant(&mut results, ResultVariant::recolored(color("Red", "#FF0000"), png(1), SizeClass::OneK));
        let b = upsert_variant(&mut results, ResultVariant::recolored(color("Blue", "#0000FF"), png(2), SizeClass::OneK));
        assert_eq!((a, b), (0, 1));
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn test_upsert_replaces_same_hex() {
        let mut results = Vec::new();
        upsert_variant(&mut results, ResultVariant::recolored(color("Red", "#FF0000"), png(1), SizeClass::OneK));
        upsert_variant(&mut results, ResultVariant::recolored(color("Blue", "#0000FF"), png(2), SizeClass::OneK));
        let idx = upsert_variant(
            &mut results,
            ResultVariant::recolored(color("Scarlet", "#ff0000"), png(3), SizeClass::TwoK),
        );

        assert_eq!(idx, 0);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].image.bytes(), &[3]);
        assert_eq!(results[0].color.as_ref().unwrap().name(), "Scarlet");
    }

    #[test]
    fn test_upsert_generated_always_appends() {
        let mut results = Vec::new();
        upsert_variant(&mut results, ResultVariant::generated("a", png(1), SizeClass::OneK));
        let idx = upsert_variant(&mut results, ResultVariant::generated("a", png(2), SizeClass::OneK));
        assert_eq!(idx, 1);
    }
}
