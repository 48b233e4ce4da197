use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ColorParseError {
    #[error("empty color string")]
    Empty,
    #[error("invalid hex length: expected 6 digits, got {0}")]
    InvalidLength(usize),
    #[error("invalid hex digits in '{0}'")]
    InvalidHex(String),
}

/// An sRGB color. Displays (and serializes) as `#RRGGBB`, upper-case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    /// Placeholder for slots nobody has touched yet.
    pub const WHITE: Color = Color::from_rgb(255, 255, 255);

    pub const fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn from_hsv(hsv: Hsv) -> Self {
        let (r, g, b) = hsv_to_rgb(hsv.h, hsv.s, hsv.v);
        Self { r, g, b }
    }

    pub fn to_hsv(self) -> Hsv {
        rgb_to_hsv(self.r, self.g, self.b)
    }

    pub fn to_hex(self) -> String {
        rgb_to_hex(self.r, self.g, self.b)
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

/// Accepts `RRGGBB` or `#RRGGBB`, any case. Short forms like `#FFF` are rejected.
impl FromStr for Color {
    type Err = ColorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(ColorParseError::Empty);
        }
        let digits = s.strip_prefix('#').unwrap_or(s);
        if digits.len() != 6 {
            return Err(ColorParseError::InvalidLength(digits.len()));
        }

        let mut rgb = [0u8; 3];
        hex::decode_to_slice(digits, &mut rgb)
            .map_err(|_| ColorParseError::InvalidHex(s.to_string()))?;

        Ok(Self::from_rgb(rgb[0], rgb[1], rgb[2]))
    }
}

impl TryFrom<String> for Color {
    type Error = ColorParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Color> for String {
    fn from(c: Color) -> Self {
        c.to_string()
    }
}

/// Hue, saturation, value, each normalized to 0..=1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hsv {
    pub h: f64,
    pub s: f64,
    pub v: f64,
}

impl Hsv {
    pub fn new(h: f64, s: f64, v: f64) -> Self {
        Self {
            h: wrap_hue(h),
            s: clamp_unit(s),
            v: clamp_unit(v),
        }
    }
}

impl Default for Hsv {
    /// Fully saturated red at full value: what a fresh picker shows.
    fn default() -> Self {
        Self {
            h: 0.0,
            s: 1.0,
            v: 1.0,
        }
    }
}

pub(crate) fn clamp_unit(x: f64) -> f64 {
    if x.is_nan() { 0.0 } else { x.clamp(0.0, 1.0) }
}

// 1.0 stays 1.0 (the right edge of the hue strip); the sector math wraps it to red anyway.
fn wrap_hue(h: f64) -> f64 {
    if !h.is_finite() {
        0.0
    } else if (0.0..=1.0).contains(&h) {
        h
    } else {
        h.rem_euclid(1.0)
    }
}

fn to_channel(x: f64) -> u8 {
    (clamp_unit(x) * 255.0).round() as u8
}

/// Six-sector HSV -> RGB conversion. Each channel is rounded to the nearest integer.
pub fn hsv_to_rgb(h: f64, s: f64, v: f64) -> (u8, u8, u8) {
    let (h, s, v) = (wrap_hue(h), clamp_unit(s), clamp_unit(v));

    let scaled = h * 6.0;
    let floor = scaled.floor();
    let i = (floor as i64).rem_euclid(6);
    let f = scaled - floor;

    let p = v * (1.0 - s);
    let q = v * (1.0 - f * s);
    let t = v * (1.0 - (1.0 - f) * s);

    let (r, g, b) = match i {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    };

    (to_channel(r), to_channel(g), to_channel(b))
}

pub fn rgb_to_hex(r: u8, g: u8, b: u8) -> String {
    Color::from_rgb(r, g, b).to_string()
}

/// Inverse of [`hsv_to_rgb`]. Achromatic colors report hue 0.
pub fn rgb_to_hsv(r: u8, g: u8, b: u8) -> Hsv {
    let (r, g, b) = (r as f64 / 255.0, g as f64 / 255.0, b as f64 / 255.0);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let d = max - min;

    let h = if d == 0.0 {
        0.0
    } else if max == r {
        ((g - b) / d).rem_euclid(6.0) / 6.0
    } else if max == g {
        ((b - r) / d + 2.0) / 6.0
    } else {
        ((r - g) / d + 4.0) / 6.0
    };

    let s = if max == 0.0 { 0.0 } else { d / max };

    Hsv { h, s, v: max }
}

/// Normalizes free-text hex input to `#RRGGBB`, or `None` if it is not a full color yet.
pub fn normalize_hex(input: &str) -> Option<String> {
    input.parse::<Color>().ok().map(|c| c.to_string())
}

/// Transient text buffer behind a hex input box.
///
/// Every keystroke lands in the buffer; only a complete, valid color is handed
/// back for committing to a palette slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HexEntry {
    buffer: String,
}

impl HexEntry {
    pub fn showing(color: Color) -> Self {
        Self {
            buffer: color.to_string(),
        }
    }

    pub fn text(&self) -> &str {
        &self.buffer
    }

    /// Replace the buffer with `text`. Returns the color to commit, if any.
    pub fn input(&mut self, text: &str) -> Option<Color> {
        self.buffer = text.to_string();
        text.trim().parse().ok()
    }

    /// Resync the buffer after the slot changed through some other path (the picker).
    pub fn sync(&mut self, color: Color) {
        self.buffer = color.to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn close(a: (u8, u8, u8), b: (u8, u8, u8)) -> bool {
        let d = |x: u8, y: u8| (x as i16 - y as i16).abs() <= 1;
        d(a.0, b.0) && d(a.1, b.1) && d(a.2, b.2)
    }

    #[test]
    fn fixed_points() {
        assert_eq!(hsv_to_rgb(0.0, 0.0, 0.0), (0, 0, 0));
        assert_eq!(hsv_to_rgb(0.0, 0.0, 1.0), (255, 255, 255));
        assert_eq!(hsv_to_rgb(0.0, 1.0, 1.0), (255, 0, 0));
        assert!(close(hsv_to_rgb(1.0 / 3.0, 1.0, 1.0), (0, 255, 0)));
        assert!(close(hsv_to_rgb(2.0 / 3.0, 1.0, 1.0), (0, 0, 255)));
    }

    #[test]
    fn hue_one_wraps_to_red() {
        assert_eq!(hsv_to_rgb(1.0, 1.0, 1.0), (255, 0, 0));
    }

    #[test]
    fn non_finite_hue_falls_back_to_red() {
        for h in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            assert_eq!(Hsv::new(h, 1.0, 1.0).h, 0.0);
        }
        assert_eq!(hsv_to_rgb(f64::INFINITY, 1.0, 1.0), (255, 0, 0));
    }

    #[test]
    fn hex_is_upper_case_and_padded() {
        assert_eq!(rgb_to_hex(0, 10, 255), "#000AFF");
        assert_eq!(rgb_to_hex(171, 205, 239), "#ABCDEF");
    }

    #[test]
    fn accepted_hex_forms_normalize() {
        for input in ["FFFFFF", "#ffffff", "#FFFFFF"] {
            assert_eq!(normalize_hex(input).as_deref(), Some("#FFFFFF"), "{input}");
        }
    }

    #[test]
    fn rejected_hex_forms() {
        assert_eq!("#FFF".parse::<Color>(), Err(ColorParseError::InvalidLength(3)));
        assert!(matches!(
            "FFFFFG".parse::<Color>(),
            Err(ColorParseError::InvalidHex(_))
        ));
        assert_eq!("".parse::<Color>(), Err(ColorParseError::Empty));
    }

    #[test]
    fn hex_entry_keeps_partial_text_without_committing() {
        let mut entry = HexEntry::showing(Color::WHITE);
        assert_eq!(entry.input("#AB"), None);
        assert_eq!(entry.text(), "#AB");
        assert_eq!(entry.input("#ABC"), None);
        assert_eq!(entry.input("abcdef"), Some(Color::from_rgb(0xAB, 0xCD, 0xEF)));
        assert_eq!(entry.text(), "abcdef");
    }

    #[test]
    fn serde_uses_canonical_string() -> anyhow::Result<()> {
        let json = serde_json::to_string(&Color::from_rgb(0xAA, 0, 0x0B))?;
        assert_eq!(json, "\"#AA000B\"");
        let back: Color = serde_json::from_str("\"aa000b\"")?;
        assert_eq!(back, Color::from_rgb(0xAA, 0, 0x0B));
        assert!(serde_json::from_str::<Color>("\"#AA00\"").is_err());
        Ok(())
    }

    proptest! {
        #[test]
        fn channels_stay_in_range(h in 0.0f64..=1.0, s in 0.0f64..=1.0, v in 0.0f64..=1.0) {
            // u8 already bounds the range; this guards the float path against panics and NaN.
            let (r, g, b) = hsv_to_rgb(h, s, v);
            let hex = rgb_to_hex(r, g, b);
            prop_assert_eq!(hex.len(), 7);
        }

        #[test]
        fn hex_reparse_is_stable(h in 0.0f64..=1.0, s in 0.0f64..=1.0, v in 0.0f64..=1.0) {
            let (r, g, b) = hsv_to_rgb(h, s, v);
            let first = rgb_to_hex(r, g, b);
            let parsed: Color = first.parse().unwrap();
            let second = rgb_to_hex(parsed.r, parsed.g, parsed.b);
            prop_assert_eq!(first, second);
        }

        #[test]
        fn rgb_survives_hsv_round_trip(r: u8, g: u8, b: u8) {
            let hsv = rgb_to_hsv(r, g, b);
            prop_assert!(close(hsv_to_rgb(hsv.h, hsv.s, hsv.v), (r, g, b)));
        }
    }
}
