//! Pre-flight size estimation.
//!
//! Fast, non-authoritative predictions for UI feedback before committing
//! to a real compression run. Never calls a codec, never blocks; O(1)
//! beyond reading sizes and dimensions the caller already has.

use super::types::{MediaKind, OutputFormat};

/// Expected output fraction of the original size per quality point,
/// piecewise-linear between anchors. Anchors were eyeballed from typical
/// JPEG photographic output; WebP lands consistently below JPEG at equal
/// quality, and PNG is lossless so quality barely moves it.
const JPEG_RATIO_ANCHORS: [(u8, f64); 6] = [
    (1, 0.02),
    (10, 0.08),
    (30, 0.22),
    (50, 0.35),
    (70, 0.50),
    (100, 0.95),
];

const WEBP_FACTOR: f64 = 0.80;
const PNG_RATIO: f64 = 1.20;

/// PDFs respond worse than images to recompression; never predict below
/// half the original.
const PDF_MIN_RATIO: f64 = 0.50;

fn interpolate_ratio(quality: u8) -> f64 {
    let quality = quality.clamp(1, 100);
    let mut prev = JPEG_RATIO_ANCHORS[0];
    for anchor in JPEG_RATIO_ANCHORS.iter().skip(1) {
        if quality <= anchor.0 {
            let span = (anchor.0 - prev.0) as f64;
            let t = (quality - prev.0) as f64 / span;
            return prev.1 + (anchor.1 - prev.1) * t;
        }
        prev = *anchor;
    }
    JPEG_RATIO_ANCHORS[JPEG_RATIO_ANCHORS.len() - 1].1
}

/// Predict compressed size for quality-only or target-size mode.
///
/// In target-size mode the estimate is simply the stated ceiling (capped
/// at the original size): the search later guarantees exactly that bound
/// or fails.
pub fn estimate_compressed_size(
    original_size: u64,
    media_kind: MediaKind,
    output_format: OutputFormat,
    quality: u8,
    target_bytes: Option<u64>,
) -> u64 {
    if let Some(target) = target_bytes {
        return target.min(original_size);
    }

    let ratio = match media_kind {
        MediaKind::Pdf => (quality as f64 / 100.0).max(PDF_MIN_RATIO),
        MediaKind::Image => match output_format {
            OutputFormat::Jpeg => interpolate_ratio(quality),
            OutputFormat::WebP => interpolate_ratio(quality) * WEBP_FACTOR,
            OutputFormat::Png => PNG_RATIO,
        },
    };

    (original_size as f64 * ratio).round() as u64
}

/// Predict resized output size from pixel-area reduction.
pub fn estimate_resized_size(
    original_size: u64,
    original_dimensions: (u32, u32),
    new_dimensions: (u32, u32),
) -> u64 {
    let (ow, oh) = original_dimensions;
    let (nw, nh) = new_dimensions;
    let original_area = ow as f64 * oh as f64;
    if original_area == 0.0 {
        return original_size;
    }
    let pixel_ratio = (nw as f64 * nh as f64) / original_area;
    (original_size as f64 * pixel_ratio).round() as u64
}

/// Predict format-conversion output size.
pub fn estimate_converted_size(original_size: u64, format: OutputFormat, quality: u8) -> u64 {
    estimate_compressed_size(original_size, MediaKind::Image, format, quality, None)
}

/// Predict the size of a PDF assembled from the given image sizes:
/// per-image JPEG re-encode plus document structure overhead.
pub fn estimate_assembled_pdf_size(image_sizes: &[u64], jpeg_quality: u8) -> u64 {
    let ratio = interpolate_ratio(jpeg_quality);
    let images: f64 = image_sizes.iter().map(|&s| s as f64 * ratio).sum();
    let overhead = 50_000 + image_sizes.len() as u64 * 1_000;
    images.round() as u64 + overhead
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_mode_reports_the_stated_ceiling() {
        assert_eq!(
            estimate_compressed_size(2_000_000, MediaKind::Image, OutputFormat::Jpeg, 80, Some(500_000)),
            500_000
        );
        // Never above the original.
        assert_eq!(
            estimate_compressed_size(100, MediaKind::Image, OutputFormat::Jpeg, 80, Some(500_000)),
            100
        );
    }

    #[test]
    fn quality_mode_is_monotonic_in_quality() {
        let mut last = 0;
        for quality in [1u8, 20, 40, 60, 80, 100] {
            let estimate = estimate_compressed_size(
                1_000_000,
                MediaKind::Image,
                OutputFormat::Jpeg,
                quality,
                None,
            );
            assert!(estimate >= last, "estimate regressed at q={}", quality);
            last = estimate;
        }
    }

    #[test]
    fn webp_predicts_below_jpeg_and_png_above() {
        let jpeg =
            estimate_compressed_size(1_000_000, MediaKind::Image, OutputFormat::Jpeg, 80, None);
        let webp =
            estimate_compressed_size(1_000_000, MediaKind::Image, OutputFormat::WebP, 80, None);
        let png =
            estimate_compressed_size(1_000_000, MediaKind::Image, OutputFormat::Png, 80, None);
        assert!(webp < jpeg);
        assert!(png > 1_000_000);
    }

    #[test]
    fn pdf_ratio_never_drops_below_half() {
        let estimate =
            estimate_compressed_size(1_000_000, MediaKind::Pdf, OutputFormat::Jpeg, 10, None);
        assert_eq!(estimate, 500_000);
    }

    #[test]
    fn resize_estimate_tracks_pixel_area() {
        assert_eq!(
            estimate_resized_size(1_000_000, (1000, 1000), (500, 500)),
            250_000
        );
        assert_eq!(estimate_resized_size(1_000_000, (0, 0), (500, 500)), 1_000_000);
    }

    #[test]
    fn assembled_pdf_estimate_includes_overhead() {
        let estimate = estimate_assembled_pdf_size(&[100_000, 200_000], 70);
        assert!(estimate > 50_000 + 2_000);
        assert!(estimate < 100_000 + 200_000 + 52_000);
    }
}
