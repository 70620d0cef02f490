//! Type definitions for the resize domain.

use serde::{Deserialize, Serialize};

use crate::domains::compression::types::OutputFormat;
use crate::errors::ValidationError;

/// How requested dimensions are reconciled with the source aspect ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FitMode {
    /// Preserve aspect ratio, fit entirely inside the requested box,
    /// never enlarge.
    Inside,
    /// Preserve aspect ratio, cover the requested box, center-crop the
    /// overflow.
    Cover,
    /// Ignore aspect ratio and stretch to exactly the requested box.
    Fill,
}

/// A single-pass pixel resize. No search loop; one decode, one resample,
/// one encode.
#[derive(Debug, Clone)]
pub struct ResizeRequest {
    pub input: Vec<u8>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub fit: FitMode,
    pub output_format: OutputFormat,
    pub quality: u8,
}

impl ResizeRequest {
    pub fn new(input: Vec<u8>) -> Self {
        Self {
            input,
            width: None,
            height: None,
            fit: FitMode::Inside,
            output_format: OutputFormat::Jpeg,
            quality: 90,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.input.is_empty() {
            return Err(ValidationError::field("input", "input is empty"));
        }
        if self.width.is_none() && self.height.is_none() {
            return Err(ValidationError::field(
                "width/height",
                "at least one target dimension is required",
            ));
        }
        if self.width == Some(0) || self.height == Some(0) {
            return Err(ValidationError::field(
                "width/height",
                "dimensions must be greater than zero",
            ));
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

#[derive(Debug, Clone, Serialize)]
pub struct ResizeOutcome {
    #[serde(skip)]
    pub output: Vec<u8>,
    pub original_size: u64,
    pub output_size: u64,
    pub width: u32,
    pub height: u32,
}
