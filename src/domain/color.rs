//! Color Codec
//!
//! Wire format of the color characteristic: exactly six hexadecimal digits
//! encoding `0xRRGGBB` as UTF-8, with no length prefix.
//!
//! ```text
//! input : "#00ff00" | "00FF00" | "00ff00"   (leading '#' optional, any case)
//! output: "00FF00"                           (uppercase, no '#')
//! ```

use crate::domain::errors::DecodeError;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of hex digits in an encoded color
pub const ENCODED_LEN: usize = 6;

/// Largest notification payload a link carries without MTU negotiation
pub const MTU_FLOOR: usize = 20;

/// An RGB color, one byte per channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ColorValue {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl ColorValue {
    pub const fn new(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }

    /// Pack into a 24-bit `0xRRGGBB` integer
    pub fn to_rgb24(self) -> u32 {
        (u32::from(self.red) << 16) | (u32::from(self.green) << 8) | u32::from(self.blue)
    }

    /// Split a 24-bit integer into channels; bits above 24 are ignored
    pub fn from_rgb24(value: u32) -> Self {
        Self {
            red: ((value >> 16) & 0xFF) as u8,
            green: ((value >> 8) & 0xFF) as u8,
            blue: (value & 0xFF) as u8,
        }
    }

    /// Channels normalized to `[0.0, 1.0]` for display layers
    pub fn to_rgb_f32(self) -> [f32; 3] {
        [
            f32::from(self.red) / 255.0,
            f32::from(self.green) / 255.0,
            f32::from(self.blue) / 255.0,
        ]
    }
}

impl fmt::Display for ColorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.red, self.green, self.blue)
    }
}

impl FromStr for ColorValue {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ColorCodec::decode(s.as_bytes())
    }
}

/// Encoder/decoder for the color characteristic value
pub struct ColorCodec;

impl ColorCodec {
    /// Encode a color as six uppercase ASCII hex digits
    pub fn encode(color: ColorValue) -> Vec<u8> {
        format!("{:06X}", color.to_rgb24()).into_bytes()
    }

    /// Decode a characteristic value
    ///
    /// Accepts an optional leading `#` followed by exactly six hex digits.
    /// Sign characters are rejected even though integer parsing would take them.
    pub fn decode(bytes: &[u8]) -> Result<ColorValue, DecodeError> {
        let text = std::str::from_utf8(bytes)
            .map_err(|_| DecodeError::InvalidHex(String::from_utf8_lossy(bytes).into_owned()))?;
        let digits = text.strip_prefix('#').unwrap_or(text);

        if digits.chars().count() != ENCODED_LEN {
            return Err(DecodeError::InvalidLength(digits.chars().count()));
        }
        if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(DecodeError::InvalidHex(digits.to_string()));
        }

        let value = u32::from_str_radix(digits, 16)
            .map_err(|_| DecodeError::InvalidHex(digits.to_string()))?;
        Ok(ColorValue::from_rgb24(value))
    }

    /// Uniformly random color from the thread-local generator
    pub fn random_color() -> ColorValue {
        Self::random_color_with(&mut rand::thread_rng())
    }

    /// Uniformly random color from the given generator
    pub fn random_color_with<R: Rng>(rng: &mut R) -> ColorValue {
        ColorValue::new(rng.gen(), rng.gen(), rng.gen())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_encode_is_uppercase_without_prefix() {
        let bytes = ColorCodec::encode(ColorValue::new(0x0A, 0xBC, 0xFF));
        assert_eq!(bytes, b"0ABCFF");
        assert!(bytes.len() <= MTU_FLOOR);
    }

    #[test]
    fn test_decode_accepts_prefix_and_any_case() {
        let green = ColorValue::new(0, 255, 0);
        assert_eq!(ColorCodec::decode(b"#00FF00").unwrap(), green);
        assert_eq!(ColorCodec::decode(b"00ff00").unwrap(), green);
        assert_eq!(ColorCodec::decode(b"#00fF00").unwrap(), green);
    }

    #[test]
    fn test_decode_rejects_bad_length() {
        assert_eq!(
            ColorCodec::decode(b"#FFF"),
            Err(DecodeError::InvalidLength(3))
        );
        assert_eq!(ColorCodec::decode(b""), Err(DecodeError::InvalidLength(0)));
        assert_eq!(
            ColorCodec::decode(b"##00FF00"),
            Err(DecodeError::InvalidLength(7))
        );
        assert_eq!(
            ColorCodec::decode(b"00FF00 "),
            Err(DecodeError::InvalidLength(7))
        );
    }

    #[test]
    fn test_decode_rejects_non_hex() {
        assert!(matches!(
            ColorCodec::decode(b"zzzzzz"),
            Err(DecodeError::InvalidHex(_))
        ));
        assert!(matches!(
            ColorCodec::decode(b"+12345"),
            Err(DecodeError::InvalidHex(_))
        ));
        assert!(matches!(
            ColorCodec::decode(&[0xFF, 0xFE, 0x30, 0x30, 0x30, 0x30]),
            Err(DecodeError::InvalidHex(_))
        ));
    }

    #[test]
    fn test_round_trip_sampled_colors() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..256 {
            let color = ColorCodec::random_color_with(&mut rng);
            assert_eq!(ColorCodec::decode(&ColorCodec::encode(color)).unwrap(), color);
        }
    }

    #[test]
    fn test_display_and_parse() {
        let color = ColorValue::new(0x12, 0x34, 0x56);
        assert_eq!(color.to_string(), "#123456");
        assert_eq!("#123456".parse::<ColorValue>().unwrap(), color);
        assert_eq!(ColorValue::new(255, 0, 0).to_rgb_f32(), [1.0, 0.0, 0.0]);
    }
}
