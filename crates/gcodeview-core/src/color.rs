//! RGBA colors used by the render-path assembler.

use crate::error::ColorError;
use serde::{Deserialize, Serialize};

/// Linear RGBA color with components in `[0, 1]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const WHITE: Color = Color::rgb(1.0, 1.0, 1.0);
    pub const BLACK: Color = Color::rgb(0.0, 0.0, 0.0);
    pub const GRAY: Color = Color::rgb(0.5, 0.5, 0.5);
    pub const DARK_GRAY: Color = Color::rgb(0.25, 0.25, 0.25);
    pub const YELLOW: Color = Color::rgb(1.0, 1.0, 0.0);

    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Opaque color
    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    /// Parse `#RRGGBB` or `#RRGGBBAA`
    pub fn from_hex(s: &str) -> Result<Self, ColorError> {
        let invalid = || ColorError::InvalidHex(s.to_string());
        let hex = s.trim().strip_prefix('#').ok_or_else(invalid)?;
        if !(hex.len() == 6 || hex.len() == 8) || !hex.is_ascii() {
            return Err(invalid());
        }

        let channel = |i: usize| -> Result<f32, ColorError> {
            u8::from_str_radix(&hex[i..i + 2], 16)
                .map(|v| v as f32 / 255.0)
                .map_err(|_| invalid())
        };

        let a = if hex.len() == 8 { channel(6)? } else { 1.0 };
        Ok(Self::new(channel(0)?, channel(2)?, channel(4)?, a))
    }

    /// Format as `#RRGGBB`, dropping alpha when opaque
    pub fn to_hex(&self) -> String {
        let to_u8 = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        if self.a >= 1.0 {
            format!("#{:02X}{:02X}{:02X}", to_u8(self.r), to_u8(self.g), to_u8(self.b))
        } else {
            format!(
                "#{:02X}{:02X}{:02X}{:02X}",
                to_u8(self.r),
                to_u8(self.g),
                to_u8(self.b),
                to_u8(self.a)
            )
        }
    }

    /// Component-wise interpolation, `t` clamped to `[0, 1]`
    pub fn lerp(a: Color, b: Color, t: f32) -> Color {
        let t = t.clamp(0.0, 1.0);
        let mix = |x: f32, y: f32| x + (y - x) * t;
        Color::new(mix(a.r, b.r), mix(a.g, b.g), mix(a.b, b.b), mix(a.a, b.a))
    }

    pub fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::WHITE
    }
}

impl std::fmt::Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl std::str::FromStr for Color {
    type Err = ColorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Color::from_hex(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_hex() {
        let c = Color::from_hex("#FF8000").unwrap();
        assert_eq!(c.r, 1.0);
        assert!((c.g - 128.0 / 255.0).abs() < 1e-6);
        assert_eq!(c.b, 0.0);
        assert_eq!(c.a, 1.0);

        let c = Color::from_hex("#00000080").unwrap();
        assert!((c.a - 128.0 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn test_from_hex_rejects_garbage() {
        assert!(Color::from_hex("FF8000").is_err());
        assert!(Color::from_hex("#FF80").is_err());
        assert!(Color::from_hex("#GG8000").is_err());
        assert!(Color::from_hex("#ÿÿÿ").is_err());
    }

    #[test]
    fn test_hex_display() {
        assert_eq!(Color::rgb(1.0, 0.0, 0.0).to_string(), "#FF0000");
        assert_eq!(Color::new(0.0, 0.0, 0.0, 0.0).to_hex(), "#00000000");
    }

    #[test]
    fn test_lerp_clamps() {
        let mid = Color::lerp(Color::BLACK, Color::WHITE, 0.5);
        assert_eq!(mid, Color::GRAY);
        assert_eq!(Color::lerp(Color::BLACK, Color::WHITE, 2.0), Color::WHITE);
        assert_eq!(Color::lerp(Color::BLACK, Color::WHITE, -1.0), Color::BLACK);
    }
}
