//! Parameter types for image operations.
//!
//! These types describe *what* to do to an image, not *how*. They sit between
//! the configuration layer (which is stringly typed TOML) and the
//! [`operations`](super::operations) module (which does the pixel work).
//!
//! ## Types
//!
//! - [`Quality`]: JPEG encoding quality (1–100, default 95). Clamped on construction.
//! - [`BackgroundSpec`]: fill for removed or padded areas (transparent, white or custom RGBA).
//! - [`SquareSpec`]: square canvas of a fixed size or the longest side, optionally without upscaling.
//! - [`FitMode`] / [`ResizeSpec`]: target dimensions and the aspect policy used to reach them.
//! - [`BackgroundParams`]: everything the background stage needs in one struct.

use image::Rgba;
use serde::{Deserialize, Serialize};

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u8);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100) as u8)
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(95)
    }
}

/// Fill used for removed background, padding, and letterbox bars.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackgroundSpec {
    Transparent,
    White,
    Custom(Rgba<u8>),
}

impl BackgroundSpec {
    /// Build a custom background from a `#rgb` / `#rrggbb` color and an
    /// opacity percentage (0 = clear, 100 = opaque).
    pub fn custom(hex: &str, opacity_pct: u8) -> Option<Self> {
        let [r, g, b] = parse_hex_color(hex)?;
        let alpha = (f32::from(opacity_pct.min(100)) / 100.0 * 255.0).round() as u8;
        Some(Self::Custom(Rgba([r, g, b, alpha])))
    }

    /// The fill color as RGBA.
    pub fn rgba(self) -> Rgba<u8> {
        match self {
            Self::Transparent => Rgba([0, 0, 0, 0]),
            Self::White => Rgba([255, 255, 255, 255]),
            Self::Custom(c) => c,
        }
    }

    /// Whether results composited onto this background lose their alpha channel.
    pub fn is_opaque(self) -> bool {
        match self {
            Self::Transparent => false,
            Self::White => true,
            Self::Custom(c) => c[3] == 255,
        }
    }
}

/// Parse `#rgb` or `#rrggbb` (leading `#` optional) into RGB bytes.
pub fn parse_hex_color(hex: &str) -> Option<[u8; 3]> {
    let h = hex.trim().trim_start_matches('#');
    if !h.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let expanded: String = match h.len() {
        3 => h.chars().flat_map(|c| [c, c]).collect(),
        6 => h.to_string(),
        _ => return None,
    };
    let channel = |i: usize| u8::from_str_radix(&expanded[i..i + 2], 16).ok();
    Some([channel(0)?, channel(2)?, channel(4)?])
}

/// Square canvas composition.
///
/// - `size: None` pads to a square of the longer side.
/// - `size: Some(s)` scales the subject to fit `s`×`s` and centers it.
///   With `no_upscale`, subjects smaller than `s` are centered unscaled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SquareSpec {
    pub size: Option<u32>,
    pub no_upscale: bool,
}

/// How a resize reaches its target dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FitMode {
    /// Non-uniform scale to the exact target, ignoring aspect ratio.
    Stretch,
    /// Uniform scale to fit inside the target, centered, bars filled with the background.
    #[default]
    Pad,
    /// Uniform scale to cover the target, then centered crop.
    Crop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizeSpec {
    pub width: u32,
    pub height: u32,
    pub mode: FitMode,
}

/// Parameters for the background stage (isolate → pad → square → composite).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackgroundParams {
    pub background: BackgroundSpec,
    /// Uniform transparent margin added on every side, in pixels.
    pub padding: u32,
    pub square: Option<SquareSpec>,
}
