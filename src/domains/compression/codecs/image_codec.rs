//! Image re-encoding via the `image` crate (JPEG/PNG, WebP behind the
//! `webp` feature).

use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilterType, PngEncoder};
use image::imageops::FilterType;
use image::{DynamicImage, ImageEncoder};
use std::io::Cursor;
use tokio::task;

use super::Codec;
use crate::domains::compression::types::OutputFormat;
use crate::errors::{EncodeError, EncodeResult};

/// Image codec adapter bound to one output format.
///
/// Cheap to construct; one is created per request. Decoding honours the
/// EXIF orientation tag so rotated phone photos do not come out sideways
/// after re-encoding strips the tag.
#[derive(Debug, Clone, Copy)]
pub struct ImageCodec {
    format: OutputFormat,
}

impl ImageCodec {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Decode with orientation applied. Malformed bytes are a data error.
    pub fn decode(data: &[u8]) -> EncodeResult<DynamicImage> {
        let img = image::load_from_memory(data)
            .map_err(|e| EncodeError::InvalidInput(format!("Failed to load image: {}", e)))?;
        Ok(apply_exif_orientation(img, data))
    }

    /// Pixel dimensions without a full decode.
    pub fn dimensions(data: &[u8]) -> EncodeResult<(u32, u32)> {
        image::io::Reader::new(Cursor::new(data))
            .with_guessed_format()
            .map_err(|e| EncodeError::InvalidInput(format!("Unrecognized image data: {}", e)))?
            .into_dimensions()
            .map_err(|e| EncodeError::InvalidInput(format!("Failed to read dimensions: {}", e)))
    }

    /// Encode an already-decoded image at the given quality.
    pub fn encode_dynamic(
        img: &DynamicImage,
        format: OutputFormat,
        quality: u8,
    ) -> EncodeResult<Vec<u8>> {
        let quality = quality.clamp(1, 100);
        let mut output = Vec::new();

        match format {
            OutputFormat::Jpeg => {
                // JPEG cannot carry alpha; flatten first.
                let rgb = img.to_rgb8();
                let mut encoder = JpegEncoder::new_with_quality(&mut output, quality);
                encoder
                    .encode(&rgb, rgb.width(), rgb.height(), image::ColorType::Rgb8)
                    .map_err(|e| EncodeError::Internal(format!("JPEG encoding error: {}", e)))?;
            }
            OutputFormat::Png => {
                let png = img.to_rgba8();
                let encoder = PngEncoder::new_with_quality(
                    &mut output,
                    quality_to_png_compression(quality),
                    PngFilterType::Adaptive,
                );
                encoder
                    .write_image(&png, png.width(), png.height(), image::ColorType::Rgba8)
                    .map_err(|e| EncodeError::Internal(format!("PNG encoding error: {}", e)))?;
            }
            OutputFormat::WebP => {
                #[cfg(feature = "webp")]
                {
                    let encoder = webp::Encoder::from_image(img).map_err(|e| {
                        EncodeError::Internal(format!("WebP encoding error: {}", e))
                    })?;
                    output = encoder.encode(quality as f32).to_vec();
                }
                #[cfg(not(feature = "webp"))]
                {
                    // Fall back to PNG when the webp encoder is not
                    // compiled in.
                    let png = img.to_rgba8();
                    let encoder = PngEncoder::new_with_quality(
                        &mut output,
                        quality_to_png_compression(quality),
                        PngFilterType::Adaptive,
                    );
                    encoder
                        .write_image(&png, png.width(), png.height(), image::ColorType::Rgba8)
                        .map_err(|e| {
                            EncodeError::Internal(format!("PNG encoding error: {}", e))
                        })?;
                }
            }
        }

        Ok(output)
    }
}

#[async_trait]
impl Codec for ImageCodec {
    async fn encode(
        &self,
        input: &[u8],
        quality: u8,
        dimensions: Option<(u32, u32)>,
    ) -> EncodeResult<Vec<u8>> {
        let data = input.to_vec();
        let format = self.format;

        // Image work is CPU-bound; keep it off the async runtime.
        task::spawn_blocking(move || -> EncodeResult<Vec<u8>> {
            let mut img = Self::decode(&data)?;
            if let Some((width, height)) = dimensions {
                img = img.resize_exact(width.max(1), height.max(1), FilterType::Lanczos3);
            }
            Self::encode_dynamic(&img, format, quality)
        })
        .await
        .map_err(|e| EncodeError::Internal(format!("Task join error: {}", e)))?
    }
}

/// PNG is lossless, so the 1-100 quality scale maps inversely onto
/// compression effort: asking for a smaller file (low quality) buys the
/// most expensive compression.
fn quality_to_png_compression(quality: u8) -> CompressionType {
    match quality {
        1..=40 => CompressionType::Best,
        41..=80 => CompressionType::Default,
        _ => CompressionType::Fast,
    }
}

/// Apply the EXIF orientation tag, if any. Only JPEG/TIFF containers carry
/// one; for everything else the image is returned untouched.
fn apply_exif_orientation(img: DynamicImage, raw: &[u8]) -> DynamicImage {
    let orientation = exif::Reader::new()
        .read_from_container(&mut Cursor::new(raw))
        .ok()
        .and_then(|meta| {
            meta.get_field(exif::Tag::Orientation, exif::In::PRIMARY)
                .and_then(|field| field.value.get_uint(0))
        });

    match orientation {
        Some(2) => img.fliph(),
        Some(3) => img.rotate180(),
        Some(4) => img.flipv(),
        Some(5) => img.rotate90().fliph(),
        Some(6) => img.rotate90(),
        Some(7) => img.rotate270().fliph(),
        Some(8) => img.rotate270(),
        _ => img,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    fn sample_image(width: u32, height: u32) -> DynamicImage {
        let img = RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
        });
        DynamicImage::ImageRgb8(img)
    }

    #[tokio::test]
    async fn encode_is_deterministic_at_fixed_quality() {
        let data = ImageCodec::encode_dynamic(&sample_image(64, 48), OutputFormat::Jpeg, 80)
            .expect("encode");
        let codec = ImageCodec::new(OutputFormat::Jpeg);
        let first = codec.encode(&data, 60, None).await.expect("first encode");
        let second = codec.encode(&data, 60, None).await.expect("second encode");
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn encode_with_dimensions_resizes() {
        let data = ImageCodec::encode_dynamic(&sample_image(100, 80), OutputFormat::Png, 80)
            .expect("encode");
        let codec = ImageCodec::new(OutputFormat::Png);
        let out = codec.encode(&data, 50, Some((50, 40))).await.expect("encode");
        assert_eq!(ImageCodec::dimensions(&out).expect("dims"), (50, 40));
    }

    #[tokio::test]
    async fn malformed_input_is_invalid_input() {
        let codec = ImageCodec::new(OutputFormat::Jpeg);
        let err = codec.encode(b"not an image", 80, None).await.unwrap_err();
        assert!(matches!(err, EncodeError::InvalidInput(_)));
    }

    #[test]
    fn png_effort_mapping_is_inverse() {
        assert!(matches!(quality_to_png_compression(10), CompressionType::Best));
        assert!(matches!(quality_to_png_compression(60), CompressionType::Default));
        assert!(matches!(quality_to_png_compression(95), CompressionType::Fast));
    }
}
