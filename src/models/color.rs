use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use swatch::{ParseColorError, Rgb};
use utoipa::ToSchema;

/// A named target color.
///
/// The hex value is normalized to uppercase `#RRGGBB` on construction, so two
/// specs are the same color iff their hex values match case-insensitively.
/// The name is a label only and takes no part in equality.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(try_from = "RawColorSpec")]
pub struct ColorSpec {
    /// Display name (e.g. "Navy")
    name: String,
    /// Normalized `#RRGGBB`
    #[schema(example = "#000080")]
    hex: String,
}

#[derive(Deserialize)]
struct RawColorSpec {
    #[serde(default)]
    name: Option<String>,
    hex: String,
}

impl TryFrom<RawColorSpec> for ColorSpec {
    type Error = ParseColorError;

    fn try_from(raw: RawColorSpec) -> Result<Self, Self::Error> {
        let rgb: Rgb = raw.hex.parse()?;
        let hex = rgb.to_hex();
        let name = raw
            .name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| hex.clone());
        Ok(Self { name, hex })
    }
}

impl ColorSpec {
    pub fn new(name: impl Into<String>, hex: &str) -> Result<Self, ParseColorError> {
        Self::try_from(RawColorSpec {
            name: Some(name.into()),
            hex: hex.to_string(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Normalized uppercase `#RRGGBB`
    pub fn hex(&self) -> &str {
        &self.hex
    }

    pub fn rgb(&self) -> Rgb {
        // Normalized on construction
        self.hex.parse().unwrap_or(Rgb::new(0, 0, 0))
    }

    /// File-name friendly slug of the name (e.g. "Forest Green" -> "forest-green")
    pub fn slug(&self) -> String {
        let mut slug = String::with_capacity(self.name.len());
        for c in self.name.chars() {
            if c.is_ascii_alphanumeric() {
                slug.push(c.to_ascii_lowercase());
            } else if !slug.ends_with('-') && !slug.is_empty() {
                slug.push('-');
            }
        }
        let slug = slug.trim_end_matches('-').to_string();
        if slug.is_empty() {
            self.hex.trim_start_matches('#').to_lowercase()
        } else {
            slug
        }
    }
}

impl PartialEq for ColorSpec {
    fn eq(&self, other: &Self) -> bool {
        self.hex.eq_ignore_ascii_case(&other.hex)
    }
}

impl Eq for ColorSpec {}

impl Hash for ColorSpec {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.hex.to_ascii_uppercase().hash(state);
    }
}

impl fmt::Display for ColorSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.hex)
    }
}

impl FromStr for ColorSpec {
    type Err = ParseColorError;

    /// Parse `Name=#RRGGBB` or a bare `#RRGGBB` (name defaults to the hex).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('=') {
            Some((name, hex)) => Self::new(name.trim(), hex),
            None => Self::try_from(RawColorSpec {
                name: None,
                hex: s.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_normalized() {
        let c = ColorSpec::new("Red", "ff0000").unwrap();
        assert_eq!(c.hex(), "#FF0000");
        assert_eq!(c.name(), "Red");
        assert_eq!(c.rgb(), Rgb::new(255, 0, 0));
    }

    #[test]
    fn test_equality_ignores_name_and_case() {
        let a = ColorSpec::new("Red", "#ff0000").unwrap();
        let b = ColorSpec::new("Crimson-ish", "FF0000").unwrap();
        let c = ColorSpec::new("Blue", "#0000FF").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_invalid_hex_rejected() {
        assert!(ColorSpec::new("Bad", "#12345").is_err());
        assert!(ColorSpec::new("Bad", "#XYZXYZ").is_err());
    }

    #[test]
    fn test_parse_cli_forms() {
        let named: ColorSpec = "Forest Green=#228b22".parse().unwrap();
        assert_eq!(named.name(), "Forest Green");
        assert_eq!(named.hex(), "#228B22");

        let bare: ColorSpec = "#228B22".parse().unwrap();
        assert_eq!(bare.name(), "#228B22");
        assert_eq!(bare, named);
    }

    #[test]
    fn test_deserialize_validates() {
        let c: ColorSpec = serde_json::from_str(r##"{"name":"Navy","hex":"000080"}"##).unwrap();
        assert_eq!(c.hex(), "#000080");

        let unnamed: ColorSpec = serde_json::from_str(r##"{"hex":"#abcdef"}"##).unwrap();
        assert_eq!(unnamed.name(), "#ABCDEF");

        assert!(serde_json::from_str::<ColorSpec>(r##"{"name":"X","hex":"nope"}"##).is_err());
    }

    #[test]
    fn test_slug() {
        assert_eq!(ColorSpec::new("Forest Green", "#228B22").unwrap().slug(), "forest-green");
        assert_eq!(ColorSpec::new("  ", "#228B22").unwrap().slug(), "228b22");
        assert_eq!(ColorSpec::new("Off-White!", "#FAF9F6").unwrap().slug(), "off-white");
    }
}
