//! Run configuration module.
//!
//! Handles loading, validating, and merging `prep.toml` files. Values are
//! layered: stock defaults, then an optional user file, then command-line
//! flags. Each layer only needs the keys it wants to override.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! operation = "all"         # background | resize | brightness | all
//!
//! [background]
//! mode = "transparent"      # transparent | white | custom
//! color = "#ffffff"         # Used when mode = "custom"
//! opacity = 100             # Custom color opacity in percent (0-100)
//! padding = 0               # Transparent margin added on every side (px)
//!
//! [background.square]
//! enabled = false           # Center the subject on a square canvas
//! # size = 512              # Fixed side length; omit to use the longer side
//! no_upscale = true         # Never enlarge subjects smaller than `size`
//!
//! [segmentation]
//! method = "key"            # key | onnx
//! tolerance = 30            # Key color distance treated as background
//! # model = "u2net.onnx"    # Required for method = "onnx"
//!
//! [brightness]
//! factor = 1.0              # 0.2-2.5, 1.0 leaves pixels untouched
//!
//! [resize]
//! enabled = true            # Only consulted by operation = "all"
//! width = 512
//! height = 512
//! mode = "pad"              # stretch | pad | crop
//!
//! [output]
//! jpeg_quality = 95         # 1-100
//!
//! [processing]
//! max_processes = 1         # Parallel workers, 0 = one per CPU core
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::{
    BackgroundParams, BackgroundSpec, FitMode, Quality, ResizeSpec, SquareSpec, parse_hex_color,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Which transforms a run applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// Isolate the subject, pad, square, composite.
    Background,
    /// Resize to the configured target.
    Resize,
    /// Brightness adjustment only.
    Brightness,
    /// Background → brightness → resize.
    #[default]
    All,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Background => "background",
            Self::Resize => "resize",
            Self::Brightness => "brightness",
            Self::All => "all",
        }
    }
}

/// Run configuration loaded from `prep.toml`.
///
/// All fields have sensible defaults. Unknown keys are rejected.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PrepConfig {
    pub operation: Operation,
    pub background: BackgroundConfig,
    pub segmentation: SegmentationConfig,
    pub brightness: BrightnessConfig,
    pub resize: ResizeConfig,
    pub output: OutputConfig,
    pub processing: ProcessingConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackgroundMode {
    #[default]
    Transparent,
    White,
    Custom,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BackgroundConfig {
    pub mode: BackgroundMode,
    /// `#rgb` or `#rrggbb`, only used by the custom mode.
    pub color: String,
    /// Opacity of the custom color in percent.
    pub opacity: u8,
    pub padding: u32,
    pub square: SquareConfig,
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        Self {
            mode: BackgroundMode::Transparent,
            color: "#ffffff".to_string(),
            opacity: 100,
            padding: 0,
            square: SquareConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SquareConfig {
    pub enabled: bool,
    /// Fixed side length. `None` squares to the longer side.
    pub size: Option<u32>,
    pub no_upscale: bool,
}

impl Default for SquareConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            size: None,
            no_upscale: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentationMethod {
    #[default]
    Key,
    Onnx,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SegmentationConfig {
    pub method: SegmentationMethod,
    /// RGB distance from the key color still treated as background.
    pub tolerance: u8,
    /// Path to a U²-Net style `.onnx` model.
    pub model: Option<PathBuf>,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            method: SegmentationMethod::Key,
            tolerance: crate::imaging::segment::DEFAULT_TOLERANCE,
            model: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BrightnessConfig {
    pub factor: f32,
}

impl Default for BrightnessConfig {
    fn default() -> Self {
        Self { factor: 1.0 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResizeConfig {
    /// Whether `operation = "all"` ends with a resize.
    pub enabled: bool,
    pub width: u32,
    pub height: u32,
    pub mode: FitMode,
}

impl Default for ResizeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            width: 512,
            height: 512,
            mode: FitMode::Pad,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub jpeg_quality: u32,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { jpeg_quality: 95 }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel workers. `1` processes files one at a
    /// time, `0` uses every core. Values above the core count are clamped.
    pub max_processes: usize,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self { max_processes: 1 }
    }
}

/// Resolve the effective thread count from config.
///
/// - `0` → use all available cores
/// - `n` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    match config.max_processes {
        0 => cores,
        n => n.min(cores),
    }
}

impl PrepConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fail = |msg: &str| Err(ConfigError::Validation(msg.to_string()));

        if self.background.padding > 512 {
            return fail("background.padding must be 0-512");
        }
        if self.background.opacity > 100 {
            return fail("background.opacity must be 0-100");
        }
        if parse_hex_color(&self.background.color).is_none() {
            return Err(ConfigError::Validation(format!(
                "background.color must be #rgb or #rrggbb, got {:?}",
                self.background.color
            )));
        }
        if let Some(size) = self.background.square.size {
            if !(32..=8192).contains(&size) {
                return fail("background.square.size must be 32-8192");
            }
        }
        let factor = self.brightness.factor;
        if !factor.is_finite()
            || !(crate::imaging::operations::MIN_BRIGHTNESS
                ..=crate::imaging::operations::MAX_BRIGHTNESS)
                .contains(&factor)
        {
            return fail("brightness.factor must be 0.2-2.5");
        }
        if !(1..=8192).contains(&self.resize.width) || !(1..=8192).contains(&self.resize.height) {
            return fail("resize.width and resize.height must be 1-8192");
        }
        if !(1..=100).contains(&self.output.jpeg_quality) {
            return fail("output.jpeg_quality must be 1-100");
        }
        if self.segmentation.method == SegmentationMethod::Onnx && self.segmentation.model.is_none()
        {
            return fail("segmentation.model is required when segmentation.method = \"onnx\"");
        }
        Ok(())
    }

    /// The fill used for removed background and letterbox bars.
    pub fn background_spec(&self) -> BackgroundSpec {
        match self.background.mode {
            BackgroundMode::Transparent => BackgroundSpec::Transparent,
            BackgroundMode::White => BackgroundSpec::White,
            // Validated colors always parse
            BackgroundMode::Custom => {
                BackgroundSpec::custom(&self.background.color, self.background.opacity)
                    .unwrap_or(BackgroundSpec::White)
            }
        }
    }

    pub fn square_spec(&self) -> Option<SquareSpec> {
        let sq = &self.background.square;
        sq.enabled.then_some(SquareSpec {
            size: sq.size,
            no_upscale: sq.no_upscale,
        })
    }

    pub fn background_params(&self) -> BackgroundParams {
        BackgroundParams {
            background: self.background_spec(),
            padding: self.background.padding,
            square: self.square_spec(),
        }
    }

    pub fn resize_spec(&self) -> ResizeSpec {
        ResizeSpec {
            width: self.resize.width,
            height: self.resize.height,
            mode: self.resize.mode,
        }
    }

    pub fn quality(&self) -> Quality {
        Quality::new(self.output.jpeg_quality)
    }
}

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the base layer for merging user overrides on top.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(PrepConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Read a config file as a raw TOML value.
pub fn load_raw_config(path: &Path) -> Result<toml::Value, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Merge overlays onto the stock defaults in order, then deserialize and validate.
pub fn resolve_config(
    overlays: impl IntoIterator<Item = toml::Value>,
) -> Result<PrepConfig, ConfigError> {
    let merged = overlays
        .into_iter()
        .fold(stock_defaults_value()?, merge_toml);
    let config: PrepConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load the effective config: stock defaults, then `file`, then `cli`.
pub fn load_config(
    file: Option<&Path>,
    cli: Option<toml::Value>,
) -> Result<PrepConfig, ConfigError> {
    let mut overlays = Vec::new();
    if let Some(path) = file {
        overlays.push(load_raw_config(path)?);
    }
    overlays.extend(cli);
    resolve_config(overlays)
}

/// Command-line config overrides, converted to a sparse TOML overlay.
///
/// `None` fields leave the lower layers untouched.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub operation: Option<Operation>,
    pub background_mode: Option<BackgroundMode>,
    pub color: Option<String>,
    pub opacity: Option<u8>,
    pub padding: Option<u32>,
    pub square: Option<bool>,
    pub square_size: Option<u32>,
    pub allow_upscale: Option<bool>,
    pub brightness: Option<f32>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub fit: Option<FitMode>,
    pub resize_enabled: Option<bool>,
    pub jobs: Option<usize>,
}

impl Overrides {
    pub fn to_toml(&self) -> Result<toml::Value, ConfigError> {
        use toml::{Table, Value};

        let mut root = Table::new();
        let mut background = Table::new();
        let mut square = Table::new();
        let mut resize = Table::new();

        if let Some(op) = self.operation {
            root.insert("operation".into(), Value::try_from(op)?);
        }
        // A color without an explicit mode selects the custom background
        let mode = self
            .background_mode
            .or(self.color.as_ref().map(|_| BackgroundMode::Custom));
        if let Some(mode) = mode {
            background.insert("mode".into(), Value::try_from(mode)?);
        }
        if let Some(color) = &self.color {
            background.insert("color".into(), Value::String(color.clone()));
        }
        if let Some(opacity) = self.opacity {
            background.insert("opacity".into(), Value::Integer(opacity.into()));
        }
        if let Some(padding) = self.padding {
            background.insert("padding".into(), Value::Integer(padding.into()));
        }
        if let Some(enabled) = self.square {
            square.insert("enabled".into(), Value::Boolean(enabled));
        }
        if let Some(size) = self.square_size {
            square.insert("size".into(), Value::Integer(size.into()));
        }
        if let Some(allow) = self.allow_upscale {
            square.insert("no_upscale".into(), Value::Boolean(!allow));
        }
        if let Some(factor) = self.brightness {
            let mut brightness = Table::new();
            brightness.insert("factor".into(), Value::Float(factor.into()));
            root.insert("brightness".into(), Value::Table(brightness));
        }
        if let Some(width) = self.width {
            resize.insert("width".into(), Value::Integer(width.into()));
        }
        if let Some(height) = self.height {
            resize.insert("height".into(), Value::Integer(height.into()));
        }
        if let Some(fit) = self.fit {
            resize.insert("mode".into(), Value::try_from(fit)?);
        }
        if let Some(enabled) = self.resize_enabled {
            resize.insert("enabled".into(), Value::Boolean(enabled));
        }
        if let Some(jobs) = self.jobs {
            let mut processing = Table::new();
            let jobs = i64::try_from(jobs).unwrap_or(i64::MAX);
            processing.insert("max_processes".into(), Value::Integer(jobs));
            root.insert("processing".into(), Value::Table(processing));
        }

        if !square.is_empty() {
            background.insert("square".into(), Value::Table(square));
        }
        if !background.is_empty() {
            root.insert("background".into(), Value::Table(background));
        }
        if !resize.is_empty() {
            root.insert("resize".into(), Value::Table(resize));
        }
        Ok(Value::Table(root))
    }
}

/// Returns a fully-commented stock `prep.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Dataset Prep Configuration
# ==========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Pass the file with `dataset-prep run --config prep.toml`. Command-line
# flags override values from this file. Unknown keys will cause an error.

# Which transforms to apply:
#   background  - isolate the subject, pad, square, composite
#   resize      - resize to [resize] width x height
#   brightness  - scale brightness by [brightness] factor
#   all         - background -> brightness -> resize
operation = "all"

# ---------------------------------------------------------------------------
# Background removal and canvas
# ---------------------------------------------------------------------------
[background]
# What replaces the removed background: transparent, white, or custom.
# Transparent results are written as PNG (or WebP when the input was WebP).
mode = "transparent"

# Custom background color (#rgb or #rrggbb), used when mode = "custom".
color = "#ffffff"

# Opacity of the custom color in percent. 100 = opaque (RGB output).
opacity = 100

# Transparent margin in pixels added on every side after isolation (0-512).
padding = 0

[background.square]
# Center the subject on a square canvas. Disables the final resize
# when operation = "all".
enabled = false

# Fixed side length (32-8192). Leave unset to square to the longer side.
# size = 512

# Keep subjects smaller than `size` at their native resolution.
no_upscale = true

# ---------------------------------------------------------------------------
# Segmentation backend
# ---------------------------------------------------------------------------
[segmentation]
# key  - flood fill from the border, for plain studio backdrops
# onnx - U2-Net style saliency model (needs the `onnx` build feature)
method = "key"

# RGB distance from the backdrop color still treated as background.
tolerance = 30

# Path to the .onnx model, required for method = "onnx".
# model = "models/u2net.onnx"

# ---------------------------------------------------------------------------
# Brightness
# ---------------------------------------------------------------------------
[brightness]
# Multiplier for every color channel (0.2-2.5). 1.0 leaves pixels untouched.
factor = 1.0

# ---------------------------------------------------------------------------
# Resize
# ---------------------------------------------------------------------------
[resize]
# Whether operation = "all" ends with a resize. operation = "resize"
# always resizes.
enabled = true

# Exact output dimensions (1-8192).
width = 512
height = 512

# stretch - ignore aspect ratio
# pad     - fit inside, fill the bars with the background
# crop    - cover the target, then crop the center
mode = "pad"

# ---------------------------------------------------------------------------
# Output encoding
# ---------------------------------------------------------------------------
[output]
# JPEG quality for opaque results (1-100).
jpeg_quality = 95

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel workers. 1 = one file at a time, 0 = one per CPU core.
# Values larger than the core count are clamped down.
max_processes = 1
"##
}
