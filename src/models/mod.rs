pub mod color;
pub mod config;
pub mod image;
pub mod settings;

pub use color::ColorSpec;
pub use config::{AppConfig, PacingConfig, RetryConfig, ServiceConfig};
pub use self::image::{
    upsert_variant, EncodedImage, ImageId, ImageStatus, ResultSummary, ResultVariant, SourceImage,
};
pub use settings::{GenerationSettings, RecolorSettings, SizeClass, Tier};
