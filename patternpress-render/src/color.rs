//! RGBA text colors parsed from hex strings.

use crate::error::RenderError;

/// An 8-bit-per-channel RGBA color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const BLACK: Self = Self::opaque(0, 0, 0);
    pub const WHITE: Self = Self::opaque(255, 255, 255);

    /// Fully opaque color from RGB components.
    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Parse `RRGGBB` or `RRGGBBAA`, with or without a leading `#`.
    pub fn from_hex(s: &str) -> Result<Self, RenderError> {
        let digits = s.trim().trim_start_matches('#');
        if digits.len() != 6 && digits.len() != 8 {
            return Err(RenderError::Color(s.to_owned()));
        }
        let bytes = hex::decode(digits).map_err(|_| RenderError::Color(s.to_owned()))?;
        Ok(Self {
            r: bytes[0],
            g: bytes[1],
            b: bytes[2],
            a: bytes.get(3).copied().unwrap_or(255),
        })
    }

    /// Six upper-case hex digits without `#`. Alpha is not included.
    pub fn to_hex(self) -> String {
        hex::encode_upper([self.r, self.g, self.b])
    }
}

impl std::str::FromStr for Rgba {
    type Err = RenderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}
