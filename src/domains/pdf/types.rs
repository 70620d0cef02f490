//! Type definitions for the pdf domain.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::errors::ValidationError;

/// Page sizes in PDF points (72 points per inch), portrait orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageSize {
    A4,
    Letter,
    Legal,
    A3,
}

impl PageSize {
    pub fn points(&self) -> (f32, f32) {
        match self {
            PageSize::A4 => (595.0, 842.0),
            PageSize::Letter => (612.0, 792.0),
            PageSize::Legal => (612.0, 1008.0),
            PageSize::A3 => (842.0, 1191.0),
        }
    }
}

impl FromStr for PageSize {
    type Err = ValidationError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "A4" => Ok(PageSize::A4),
            "LETTER" => Ok(PageSize::Letter),
            "LEGAL" => Ok(PageSize::Legal),
            "A3" => Ok(PageSize::A3),
            _ => Err(ValidationError::custom(&format!("Invalid page size: {}", s))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageOrientation {
    Portrait,
    Landscape,
}

/// One source image for PDF assembly. `order` controls page sequence.
#[derive(Debug, Clone)]
pub struct PageImage {
    pub data: Vec<u8>,
    pub name: String,
    pub order: u32,
}

#[derive(Debug, Clone)]
pub struct PdfComposeOptions {
    pub page_size: PageSize,
    pub orientation: PageOrientation,
    /// Page margin in points.
    pub margin: f32,
    /// Quality for the JPEG re-encode of each embedded image.
    pub jpeg_quality: u8,
    /// Draw a small page number in the lower right corner.
    pub page_numbers: bool,
}

impl Default for PdfComposeOptions {
    fn default() -> Self {
        Self {
            page_size: PageSize::A4,
            orientation: PageOrientation::Portrait,
            margin: 36.0, // half inch
            jpeg_quality: 90,
            page_numbers: true,
        }
    }
}

impl PdfComposeOptions {
    /// Final page dimensions in points, orientation applied.
    pub fn page_points(&self) -> (f32, f32) {
        let (w, h) = self.page_size.points();
        match self.orientation {
            PageOrientation::Portrait => (w, h),
            PageOrientation::Landscape => (h, w),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(ValidationError::field(
                "jpeg_quality",
                "quality must be between 1 and 100",
            ));
        }
        let (w, h) = self.page_points();
        if self.margin < 0.0 || self.margin * 2.0 >= w.min(h) {
            return Err(ValidationError::field(
                "margin",
                "margin leaves no room for content",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PdfComposeOutcome {
    #[serde(skip)]
    pub output: Vec<u8>,
    pub page_count: usize,
    pub output_size: u64,
    pub source_names: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PdfPasswordOutcome {
    #[serde(skip)]
    pub output: Vec<u8>,
    pub original_size: u64,
    pub output_size: u64,
    pub page_count: usize,
}

/// Pre-flight facts about an uploaded PDF.
#[derive(Debug, Clone, Serialize)]
pub struct PdfInfo {
    pub page_count: usize,
    pub title: Option<String>,
    pub author: Option<String>,
    pub encrypted: bool,
    pub has_images: bool,
}
