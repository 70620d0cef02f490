//! Type definitions for the compression domain.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Instant;

use crate::errors::ValidationError;

/// Kinds of media the compression engine accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaKind {
    Image,
    Pdf,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Pdf => "pdf",
        }
    }
}

impl FromStr for MediaKind {
    type Err = ValidationError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "image" => Ok(MediaKind::Image),
            "pdf" => Ok(MediaKind::Pdf),
            _ => Err(ValidationError::custom(&format!(
                "Invalid media kind: {}",
                s
            ))),
        }
    }
}

/// Output formats for image operations. PDFs always stay PDF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    Jpeg,
    Png,
    WebP,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Png => "png",
            OutputFormat::WebP => "webp",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "image/jpeg",
            OutputFormat::Png => "image/png",
            OutputFormat::WebP => "image/webp",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = ValidationError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "jpg" | "jpeg" => Ok(OutputFormat::Jpeg),
            "png" => Ok(OutputFormat::Png),
            "webp" => Ok(OutputFormat::WebP),
            _ => Err(ValidationError::custom(&format!(
                "Invalid output format: {}",
                s
            ))),
        }
    }
}

/// A single compression request. Owns its input bytes for the duration of
/// the call; nothing here outlives the call or is shared across calls.
#[derive(Debug, Clone)]
pub struct CompressionRequest {
    pub input: Vec<u8>,
    pub media_kind: MediaKind,
    /// When set, the engine must produce output of at most this many bytes
    /// or fail with `BudgetUnreachable`. When absent, a single encode at
    /// `quality` suffices.
    pub target_bytes: Option<u64>,
    /// Quality 1-100. Starting point in quality-only mode; upper search
    /// bound in target-size mode.
    pub quality: u8,
    pub output_format: OutputFormat,
    /// Permits the fallback chain to reduce pixel dimensions (images) or
    /// rasterization DPI of embedded images (PDFs).
    pub allow_downscale: bool,
    /// Drop EXIF metadata (images) / the Info dictionary (PDFs).
    pub strip_metadata: bool,
    /// Outer deadline, checked between encode probes.
    pub deadline: Option<Instant>,
}

impl CompressionRequest {
    pub fn new(input: Vec<u8>, media_kind: MediaKind) -> Self {
        Self {
            input,
            media_kind,
            target_bytes: None,
            quality: 80,
            output_format: OutputFormat::Jpeg,
            allow_downscale: true,
            strip_metadata: false,
            deadline: None,
        }
    }

    pub fn with_target(mut self, target_bytes: u64) -> Self {
        self.target_bytes = Some(target_bytes);
        self
    }

    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = format;
        self
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
        if let Some(target) = self.target_bytes {
            if target == 0 {
                return Err(ValidationError::field(
                    "target_bytes",
                    "target size must be greater than zero",
                ));
            }
        }
        Ok(())
    }
}

/// Which strategy produced the output, carrying the parameters that tier
/// actually used. One variant per tier so a `ResolutionFallback` result
/// can never be mistaken for a plain quality hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompressionStrategy {
    /// Single encode at the requested quality; no target was set.
    QualityOnly { quality: u8 },
    /// Binary search over quality met the budget (includes the degenerate
    /// minimum-quality case).
    QualitySearch { quality: u8, probes: u8 },
    /// Pixel downscale at minimum quality met the budget.
    ResolutionFallback {
        quality: u8,
        scaled_width: u32,
        scaled_height: u32,
    },
    /// External heavyweight re-encoder met the budget.
    ExternalToolFallback { preset: String },
}

impl CompressionStrategy {
    /// The quality parameter that produced the output, when one applies.
    /// External-tool output has no meaningful 1-100 quality.
    pub fn achieved_quality(&self) -> Option<u8> {
        match self {
            CompressionStrategy::QualityOnly { quality } => Some(*quality),
            CompressionStrategy::QualitySearch { quality, .. } => Some(*quality),
            CompressionStrategy::ResolutionFallback { quality, .. } => Some(*quality),
            CompressionStrategy::ExternalToolFallback { .. } => None,
        }
    }
}

/// Result of a successful compression call.
#[derive(Debug, Clone, Serialize)]
pub struct CompressionOutcome {
    #[serde(skip)]
    pub output: Vec<u8>,
    pub original_size: u64,
    pub output_size: u64,
    pub strategy: CompressionStrategy,
    pub duration_ms: i64,
}

impl CompressionOutcome {
    /// Space saved as a percentage of the original size.
    pub fn space_saved_percentage(&self) -> f64 {
        if self.original_size == 0 {
            return 0.0;
        }
        (1.0 - self.output_size as f64 / self.original_size as f64) * 100.0
    }
}

/// Sniff the media kind from magic bytes. Returns `None` when the content
/// is neither a supported image nor a PDF.
pub fn sniff_media_kind(data: &[u8]) -> Option<MediaKind> {
    let kind = infer::get(data)?;
    match kind.mime_type() {
        "application/pdf" => Some(MediaKind::Pdf),
        mime if mime.starts_with("image/") => Some(MediaKind::Image),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_rejects_zero_target() {
        let req = CompressionRequest::new(vec![1, 2, 3], MediaKind::Image).with_target(0);
        assert!(req.validate().is_err());
    }

    #[test]
    fn validate_rejects_out_of_range_quality() {
        let req = CompressionRequest::new(vec![1, 2, 3], MediaKind::Image).with_quality(0);
        assert!(req.validate().is_err());
        let req = CompressionRequest::new(vec![1, 2, 3], MediaKind::Image).with_quality(101);
        assert!(req.validate().is_err());
    }

    #[test]
    fn sniff_detects_pdf_and_jpeg() {
        assert_eq!(
            sniff_media_kind(b"%PDF-1.4 some pdf content here"),
            Some(MediaKind::Pdf)
        );
        // Minimal JPEG SOI marker plus JFIF header.
        let jpeg: &[u8] = &[
            0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0x00,
        ];
        assert_eq!(sniff_media_kind(jpeg), Some(MediaKind::Image));
        assert_eq!(sniff_media_kind(b"plain text"), None);
    }
}
