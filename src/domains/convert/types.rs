//! Type definitions for the convert domain.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::domains::compression::types::OutputFormat;
use crate::errors::ValidationError;

/// Straight format conversion; one decode, one encode.
#[derive(Debug, Clone)]
pub struct ConvertRequest {
    pub input: Vec<u8>,
    pub output_format: OutputFormat,
    pub quality: u8,
}

impl ConvertRequest {
    pub fn new(input: Vec<u8>, output_format: OutputFormat) -> Self {
        Self {
            input,
            output_format,
            quality: 90,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.input.is_empty() {
            return Err(ValidationError::field("input", "input is empty"));
        }
        if !(1..=100).contains(&self.quality) {
            return Err(ValidationError::field(
                "quality",
                "quality must be between 1 and 100",
            ));
        }
        Ok(())
    }
}

/// Anchor for the watermark text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WatermarkPosition {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
    Center,
}

impl FromStr for WatermarkPosition {
    type Err = ValidationError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "top-left" => Ok(WatermarkPosition::TopLeft),
            "top-right" => Ok(WatermarkPosition::TopRight),
            "bottom-left" => Ok(WatermarkPosition::BottomLeft),
            "bottom-right" => Ok(WatermarkPosition::BottomRight),
            "center" => Ok(WatermarkPosition::Center),
            _ => Err(ValidationError::custom(&format!(
                "Invalid watermark position: {}",
                s
            ))),
        }
    }
}

/// Watermark text overlay on top of a format conversion.
#[derive(Debug, Clone)]
pub struct WatermarkRequest {
    pub input: Vec<u8>,
    pub text: String,
    pub position: WatermarkPosition,
    /// Defaults to 3% of the image width, floored at 20px.
    pub font_size: Option<f32>,
    /// 0.0 (invisible) to 1.0 (opaque).
    pub opacity: f32,
    /// `#rrggbb` hex color.
    pub color: String,
    pub output_format: OutputFormat,
    pub quality: u8,
}

impl WatermarkRequest {
    pub fn new(input: Vec<u8>, text: String) -> Self {
        Self {
            input,
            text,
            position: WatermarkPosition::BottomRight,
            font_size: None,
            opacity: 0.5,
            color: "#ffffff".to_string(),
            output_format: OutputFormat::Jpeg,
            quality: 90,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.input.is_empty() {
            return Err(ValidationError::field("input", "input is empty"));
        }
        if self.text.trim().is_empty() {
            return Err(ValidationError::field("text", "watermark text is required"));
        }
        if !(0.0..=1.0).contains(&self.opacity) {
            return Err(ValidationError::field(
                "opacity",
                "opacity must be between 0.0 and 1.0",
            ));
        }
        if !(1..=100).contains(&self.quality) {
            return Err(ValidationError::field(
                "quality",
                "quality must be between 1 and 100",
            ));
        }
        parse_hex_color(&self.color).map(|_| ())
    }
}

/// Parse `#rrggbb` (or `rrggbb`) into RGB components.
pub fn parse_hex_color(color: &str) -> Result<[u8; 3], ValidationError> {
    let hex = color.strip_prefix('#').unwrap_or(color);
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ValidationError::field(
            "color",
            "expected a #rrggbb hex color",
        ));
    }
    let component = |range: std::ops::Range<usize>| {
        u8::from_str_radix(&hex[range], 16).expect("validated hex digits")
    };
    Ok([component(0..2), component(2..4), component(4..6)])
}

#[derive(Debug, Clone, Serialize)]
pub struct ConvertOutcome {
    #[serde(skip)]
    pub output: Vec<u8>,
    pub original_size: u64,
    pub output_size: u64,
    pub format: OutputFormat,
}
