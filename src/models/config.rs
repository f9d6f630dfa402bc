use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use super::{ColorSpec, Tier};

/// Application configuration loaded from dyelab.yaml
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    /// External image service connection
    #[serde(default)]
    pub service: ServiceConfig,

    /// Retry policy for external calls
    #[serde(default)]
    pub retry: RetryConfig,

    /// Fixed delays between batch items
    #[serde(default)]
    pub pacing: PacingConfig,

    /// Preset colors offered to the user
    #[serde(default = "default_palette")]
    pub palette: Vec<ColorSpec>,
}

/// Configuration for the generative image service
#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// API key (overridden by GEMINI_API_KEY)
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_standard_model")]
    pub standard_model: String,

    #[serde(default = "default_pro_model")]
    pub pro_model: String,

    /// Whether the account may use the pro tier
    #[serde(default)]
    pub pro_enabled: bool,

    /// Per-request timeout; unset means wait indefinitely
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_standard_model() -> String {
    "gemini-2.5-flash-image".to_string()
}

fn default_pro_model() -> String {
    "gemini-3-pro-image-preview".to_string()
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            standard_model: default_standard_model(),
            pro_model: default_pro_model(),
            pro_enabled: false,
            request_timeout_secs: None,
        }
    }
}

impl ServiceConfig {
    pub fn model_for(&self, tier: Tier) -> &str {
        match tier {
            Tier::Standard => &self.standard_model,
            Tier::Pro => &self.pro_model,
        }
    }
}

/// Retry policy configuration
#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub struct RetryConfig {
    /// Additional attempts after the first one
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    8
}

fn default_base_delay_ms() -> u64 {
    4000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

/// Inter-item delays, one per tier
#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub struct PacingConfig {
    #[serde(default = "default_standard_delay_ms")]
    pub standard_delay_ms: u64,

    #[serde(default = "default_pro_delay_ms")]
    pub pro_delay_ms: u64,
}

fn default_standard_delay_ms() -> u64 {
    3000
}

fn default_pro_delay_ms() -> u64 {
    8000
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            standard_delay_ms: default_standard_delay_ms(),
            pro_delay_ms: default_pro_delay_ms(),
        }
    }
}

impl PacingConfig {
    pub fn delay_for(&self, tier: Tier) -> Duration {
        match tier {
            Tier::Standard => Duration::from_millis(self.standard_delay_ms),
            Tier::Pro => Duration::from_millis(self.pro_delay_ms),
        }
    }
}

fn default_palette() -> Vec<ColorSpec> {
    [
        ("Black", "#000000"),
        ("White", "#FFFFFF"),
        ("Navy", "#000080"),
        ("Heather Grey", "#9AA297"),
        ("Red", "#C8102E"),
        ("Forest Green", "#228B22"),
        ("Royal Blue", "#4169E1"),
        ("Burgundy", "#800020"),
        ("Beige", "#F5F5DC"),
        ("Mustard", "#E1AD01"),
    ]
    .iter()
    .filter_map(|(name, hex)| ColorSpec::new(*name, hex).ok())
    .collect()
}

impl AppConfig {
    /// Load configuration from a YAML file, falling back to defaults.
    ///
    /// `GEMINI_API_KEY` takes precedence over the file's `service.api_key`.
    pub fn load(path: Option<&Path>) -> Self {
        let mut config = match path {
            Some(path) => Self::load_file(path),
            None => Self::defaults(),
        };

        if let Ok(key) = std::env::var("GEMINI_API_KEY") {
            if !key.trim().is_empty() {
                config.service.api_key = Some(key);
            }
        }

        config
    }

    fn load_file(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => match Self::from_yaml(&content) {
                Ok(config) => {
                    tracing::info!(
                        path = %path.display(),
                        palette = config.palette.len(),
                        pro_enabled = config.service.pro_enabled,
                        "Loaded configuration"
                    );
                    config
                }
                Err(e) => {
                    tracing::warn!(%e, path = %path.display(), "Failed to parse config, using defaults");
                    Self::defaults()
                }
            },
            Err(e) => {
                tracing::warn!(%e, path = %path.display(), "Failed to read config, using defaults");
                Self::defaults()
            }
        }
    }

    pub fn from_yaml(content: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(content)
    }

    /// Defaults including the built-in palette
    pub fn defaults() -> Self {
        Self {
            palette: default_palette(),
            ..Default::default()
        }
    }
}
