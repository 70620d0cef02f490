//! Pixel resizing.

use image::imageops::FilterType;
use tokio::task;

use super::types::{FitMode, ResizeOutcome, ResizeRequest};
use crate::domains::compression::codecs::ImageCodec;
use crate::domains::compression::estimate::estimate_resized_size;
use crate::errors::{DomainError, DomainResult};

#[derive(Debug, Clone, Copy, Default)]
pub struct ResizeService;

impl ResizeService {
    pub fn new() -> Self {
        Self
    }

    pub async fn resize(&self, request: ResizeRequest) -> DomainResult<ResizeOutcome> {
        request.validate()?;
        let original_size = request.input.len() as u64;

        let outcome = task::spawn_blocking(move || -> DomainResult<ResizeOutcome> {
            let img = ImageCodec::decode(&request.input)
                .map_err(|e| DomainError::encode("resize decode", e))?;
            let source = (img.width(), img.height());
            let (target_w, target_h) =
                plan_dimensions(source, request.width, request.height, request.fit);

            let resized = match request.fit {
                // Inside already resolved to aspect-correct dimensions in
                // plan_dimensions, so both modes encode an exact resample.
                FitMode::Fill | FitMode::Inside => {
                    img.resize_exact(target_w, target_h, FilterType::Lanczos3)
                }
                FitMode::Cover => {
                    // Scale so the box is covered, then trim the overflow
                    // from the center.
                    let (sw, sh) = cover_scale(source, (target_w, target_h));
                    let scaled = img.resize_exact(sw, sh, FilterType::Lanczos3);
                    let x = (sw - target_w) / 2;
                    let y = (sh - target_h) / 2;
                    scaled.crop_imm(x, y, target_w, target_h)
                }
            };

            let output =
                ImageCodec::encode_dynamic(&resized, request.output_format, request.quality)
                    .map_err(|e| DomainError::encode("resize encode", e))?;

            Ok(ResizeOutcome {
                output_size: output.len() as u64,
                output,
                original_size,
                width: resized.width(),
                height: resized.height(),
            })
        })
        .await
        .map_err(|e| DomainError::Internal(format!("Task join error: {}", e)))??;

        log::info!(
            "resized to {}x{} ({} -> {} bytes)",
            outcome.width,
            outcome.height,
            outcome.original_size,
            outcome.output_size
        );
        Ok(outcome)
    }

    /// Predicted size and dimensions without decoding more than the
    /// header.
    pub fn estimate(&self, request: &ResizeRequest) -> DomainResult<(u64, (u32, u32))> {
        let source = ImageCodec::dimensions(&request.input)
            .map_err(|e| DomainError::encode("resize estimate", e))?;
        let planned = plan_dimensions(source, request.width, request.height, request.fit);
        let size = estimate_resized_size(request.input.len() as u64, source, planned);
        Ok((size, planned))
    }
}

/// Resolve requested dimensions against the source, per fit mode.
///
/// With only one dimension given, the other follows the source aspect
/// ratio. `Inside` never enlarges; `Cover` and `Fill` produce exactly the
/// requested box when both dimensions are given.
pub fn plan_dimensions(
    source: (u32, u32),
    width: Option<u32>,
    height: Option<u32>,
    fit: FitMode,
) -> (u32, u32) {
    let (sw, sh) = (source.0.max(1), source.1.max(1));

    match (width, height) {
        (None, None) => (sw, sh),
        (Some(w), None) => {
            let ratio = w as f64 / sw as f64;
            let ratio = if fit == FitMode::Inside { ratio.min(1.0) } else { ratio };
            scaled(sw, sh, ratio)
        }
        (None, Some(h)) => {
            let ratio = h as f64 / sh as f64;
            let ratio = if fit == FitMode::Inside { ratio.min(1.0) } else { ratio };
            scaled(sw, sh, ratio)
        }
        (Some(w), Some(h)) => match fit {
            FitMode::Fill | FitMode::Cover => (w.max(1), h.max(1)),
            FitMode::Inside => {
                let ratio = (w as f64 / sw as f64).min(h as f64 / sh as f64).min(1.0);
                scaled(sw, sh, ratio)
            }
        },
    }
}

fn scaled(sw: u32, sh: u32, ratio: f64) -> (u32, u32) {
    (
        ((sw as f64 * ratio).round() as u32).max(1),
        ((sh as f64 * ratio).round() as u32).max(1),
    )
}

/// Smallest aspect-preserving scale of `source` that covers `target`.
fn cover_scale(source: (u32, u32), target: (u32, u32)) -> (u32, u32) {
    let (sw, sh) = source;
    let ratio = (target.0 as f64 / sw as f64).max(target.1 as f64 / sh as f64);
    let w = ((sw as f64 * ratio).ceil() as u32).max(target.0);
    let h = ((sh as f64 * ratio).ceil() as u32).max(target.1);
    (w, h)
}
