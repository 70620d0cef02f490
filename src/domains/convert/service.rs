//! Format conversion and watermark overlay.

use image::{DynamicImage, Rgba, RgbaImage};
use imageproc::drawing::draw_text_mut;
use rusttype::{Font, Scale};
use std::path::PathBuf;
use tokio::task;

use super::types::{
    parse_hex_color, ConvertOutcome, ConvertRequest, WatermarkPosition, WatermarkRequest,
};
use crate::domains::compression::codecs::ImageCodec;
use crate::domains::compression::estimate::estimate_converted_size;
use crate::errors::{DomainError, DomainResult, EncodeError};

const WATERMARK_PADDING: f32 = 20.0;
/// Rough advance width of the fallback sans font, as a fraction of the
/// font size; used for anchor math before glyph layout.
const TEXT_WIDTH_FACTOR: f32 = 0.6;

#[derive(Debug, Clone)]
pub struct ConvertService {
    /// TrueType font used for watermark text. Conversion itself never
    /// needs it; a missing font only fails watermark requests.
    font_path: Option<PathBuf>,
}

impl ConvertService {
    pub fn new(font_path: Option<PathBuf>) -> Self {
        Self { font_path }
    }

    pub async fn convert(&self, request: ConvertRequest) -> DomainResult<ConvertOutcome> {
        request.validate()?;
        let original_size = request.input.len() as u64;

        let outcome = task::spawn_blocking(move || -> DomainResult<ConvertOutcome> {
            let img = ImageCodec::decode(&request.input)
                .map_err(|e| DomainError::encode("format conversion decode", e))?;
            let output = ImageCodec::encode_dynamic(&img, request.output_format, request.quality)
                .map_err(|e| DomainError::encode("format conversion encode", e))?;
            Ok(ConvertOutcome {
                output_size: output.len() as u64,
                output,
                original_size,
                format: request.output_format,
            })
        })
        .await
        .map_err(|e| DomainError::Internal(format!("Task join error: {}", e)))??;

        log::info!(
            "converted to {:?} ({} -> {} bytes)",
            outcome.format,
            outcome.original_size,
            outcome.output_size
        );
        Ok(outcome)
    }

    pub async fn watermark(&self, request: WatermarkRequest) -> DomainResult<ConvertOutcome> {
        request.validate()?;
        let original_size = request.input.len() as u64;
        let font_data = self.load_font()?;

        let outcome = task::spawn_blocking(move || -> DomainResult<ConvertOutcome> {
            let font = Font::try_from_vec(font_data).ok_or_else(|| {
                DomainError::encode(
                    "watermark font",
                    EncodeError::ToolUnavailable("watermark font failed to parse".to_string()),
                )
            })?;

            let img = ImageCodec::decode(&request.input)
                .map_err(|e| DomainError::encode("watermark decode", e))?;
            let (width, height) = (img.width(), img.height());

            let font_size = request
                .font_size
                .unwrap_or_else(|| (width as f32 * 0.03).max(20.0));
            let (x, y) = anchor_position(
                request.position,
                (width, height),
                &request.text,
                font_size,
            );

            let [r, g, b] = parse_hex_color(&request.color)?;
            let alpha = (request.opacity.clamp(0.0, 1.0) * 255.0).round() as u8;

            // Draw onto a transparent overlay, then alpha-composite, so
            // the requested opacity applies to the glyphs only.
            let mut overlay = RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 0]));
            draw_text_mut(
                &mut overlay,
                Rgba([r, g, b, alpha]),
                x,
                y,
                Scale::uniform(font_size),
                &font,
                &request.text,
            );
            let mut base = img.to_rgba8();
            image::imageops::overlay(&mut base, &overlay, 0, 0);

            let output = ImageCodec::encode_dynamic(
                &DynamicImage::ImageRgba8(base),
                request.output_format,
                request.quality,
            )
            .map_err(|e| DomainError::encode("watermark encode", e))?;

            Ok(ConvertOutcome {
                output_size: output.len() as u64,
                output,
                original_size,
                format: request.output_format,
            })
        })
        .await
        .map_err(|e| DomainError::Internal(format!("Task join error: {}", e)))??;

        log::info!(
            "watermarked image ({} -> {} bytes)",
            outcome.original_size,
            outcome.output_size
        );
        Ok(outcome)
    }

    pub fn estimate(&self, request: &ConvertRequest) -> u64 {
        estimate_converted_size(
            request.input.len() as u64,
            request.output_format,
            request.quality,
        )
    }

    fn load_font(&self) -> DomainResult<Vec<u8>> {
        let path = self.font_path.as_ref().ok_or_else(|| {
            DomainError::encode(
                "watermark font",
                EncodeError::ToolUnavailable("no watermark font configured".to_string()),
            )
        })?;
        std::fs::read(path).map_err(|e| {
            DomainError::encode(
                "watermark font",
                EncodeError::ToolUnavailable(format!(
                    "watermark font {} unreadable: {}",
                    path.display(),
                    e
                )),
            )
        })
    }
}

/// Top-left corner for the text run at the requested anchor, padded and
/// clamped so long text on small images stays on the canvas.
fn anchor_position(
    position: WatermarkPosition,
    canvas: (u32, u32),
    text: &str,
    font_size: f32,
) -> (i32, i32) {
    let (width, height) = (canvas.0 as f32, canvas.1 as f32);
    let text_width = text.chars().count() as f32 * font_size * TEXT_WIDTH_FACTOR;
    let pad = WATERMARK_PADDING;

    let x = match position {
        WatermarkPosition::TopLeft | WatermarkPosition::BottomLeft => pad,
        WatermarkPosition::TopRight | WatermarkPosition::BottomRight => {
            (width - text_width - pad).max(pad)
        }
        WatermarkPosition::Center => ((width - text_width) / 2.0).max(pad),
    };
    let y = match position {
        WatermarkPosition::TopLeft | WatermarkPosition::TopRight => pad,
        WatermarkPosition::BottomLeft | WatermarkPosition::BottomRight => {
            (height - font_size - pad).max(pad)
        }
        WatermarkPosition::Center => ((height - font_size) / 2.0).max(pad),
    };

    (x as i32, y as i32)
}
