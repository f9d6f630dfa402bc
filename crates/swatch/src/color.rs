//! 8-bit RGB color type with hex parsing and formatting

use std::fmt;
use std::str::FromStr;

use crate::error::ParseColorError;

/// An opaque 8-bit RGB color as read from an image pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb {
    /// Red channel (0..=255)
    pub r: u8,
    /// Green channel (0..=255)
    pub g: u8,
    /// Blue channel (0..=255)
    pub b: u8,
}

impl Rgb {
    /// Create a color from channel values.
    #[inline]
    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Create a color from a byte array [R, G, B].
    #[inline]
    pub fn from_bytes(bytes: [u8; 3]) -> Self {
        Self::new(bytes[0], bytes[1], bytes[2])
    }

    /// Convert to a byte array [R, G, B].
    #[inline]
    pub fn to_bytes(self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }

    /// Format as an uppercase `#RRGGBB` string.
    ///
    /// # Example
    /// ```
    /// use swatch::Rgb;
    /// assert_eq!(Rgb::new(255, 128, 0).to_hex(), "#FF8000");
    /// ```
    pub fn to_hex(self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

impl FromStr for Rgb {
    type Err = ParseColorError;

    /// Parse a color from a hex string.
    ///
    /// Accepts `#RRGGBB` and `RRGGBB`. Parsing is case-insensitive and
    /// surrounding whitespace is trimmed.
    ///
    /// # Examples
    ///
    /// ```
    /// use swatch::Rgb;
    ///
    /// let navy: Rgb = "#000080".parse().unwrap();
    /// assert_eq!(navy.b, 128);
    ///
    /// let coral: Rgb = "ff7f50".parse().unwrap();
    /// assert_eq!(coral.to_hex(), "#FF7F50");
    /// ```
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let s = s.strip_prefix('#').unwrap_or(s);

        // Byte length check also rules out multi-byte chars slicing mid-codepoint
        if s.len() != 6 || !s.is_ascii() {
            return Err(ParseColorError::InvalidLength);
        }

        let r = u8::from_str_radix(&s[0..2], 16)?;
        let g = u8::from_str_radix(&s[2..4], 16)?;
        let b = u8::from_str_radix(&s[4..6], 16)?;
        Ok(Self::new(r, g, b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_and_without_hash() {
        let a: Rgb = "#1A2B3C".parse().unwrap();
        let b: Rgb = "1a2b3c".parse().unwrap();
        assert_eq!(a, b);
        assert_eq!(a, Rgb::new(0x1A, 0x2B, 0x3C));
    }

    #[test]
    fn test_parse_trims_whitespace() {
        let c: Rgb = "  #00ff00 ".parse().unwrap();
        assert_eq!(c, Rgb::new(0, 255, 0));
    }

    #[test]
    fn test_parse_rejects_bad_length() {
        assert_eq!("#FFF".parse::<Rgb>(), Err(ParseColorError::InvalidLength));
        assert_eq!("".parse::<Rgb>(), Err(ParseColorError::InvalidLength));
        assert_eq!(
            "#FFFFFFF".parse::<Rgb>(),
            Err(ParseColorError::InvalidLength)
        );
    }

    #[test]
    fn test_parse_rejects_non_ascii() {
        // "éé" is 4 bytes, "ééé" is 6 bytes but not hex
        assert_eq!("ééé".parse::<Rgb>(), Err(ParseColorError::InvalidLength));
    }

    #[test]
    fn test_parse_rejects_bad_digit() {
        assert!(matches!(
            "#GG0000".parse::<Rgb>(),
            Err(ParseColorError::InvalidHex(_))
        ));
    }

    #[test]
    fn test_hex_is_uppercase_and_padded() {
        assert_eq!(Rgb::new(0, 10, 255).to_hex(), "#000AFF");
        assert_eq!(Rgb::new(0, 10, 255).to_string(), "#000AFF");
    }

    #[test]
    fn test_bytes_conversion() {
        let c = Rgb::from_bytes([1, 2, 3]);
        assert_eq!(c.to_bytes(), [1, 2, 3]);
    }
}
