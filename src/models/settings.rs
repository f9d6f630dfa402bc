use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

/// Quality/cost level of the image service.
///
/// Each tier maps to its own model and its own inter-request delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Fast default model
    #[default]
    Standard,
    /// High-fidelity model, slower and rate limited harder
    Pro,
}

impl Tier {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "standard" | "fast" => Some(Tier::Standard),
            "pro" | "hd" => Some(Tier::Pro),
            _ => None,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::Standard => write!(f, "standard"),
            Tier::Pro => write!(f, "pro"),
        }
    }
}

/// Requested output resolution class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ToSchema)]
pub enum SizeClass {
    #[default]
    #[serde(rename = "1K")]
    OneK,
    #[serde(rename = "2K")]
    TwoK,
    #[serde(rename = "4K")]
    FourK,
}

impl SizeClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            SizeClass::OneK => "1K",
            SizeClass::TwoK => "2K",
            SizeClass::FourK => "4K",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "1K" => Some(SizeClass::OneK),
            "2K" => Some(SizeClass::TwoK),
            "4K" => Some(SizeClass::FourK),
            _ => None,
        }
    }
}

impl fmt::Display for SizeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Settings bundle passed with every recolor request of a run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RecolorSettings {
    #[serde(default)]
    pub tier: Tier,
    #[serde(default)]
    pub size_class: SizeClass,
    /// Free-form extra guidance appended to the request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

/// Settings bundle for a pure generation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct GenerationSettings {
    pub prompt: String,
    #[serde(default)]
    pub tier: Tier,
    #[serde(default)]
    pub size_class: SizeClass,
    /// e.g. "3:4"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<String>,
}
