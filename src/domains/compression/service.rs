//! Compression service: ties the quality search, the fallback chain and
//! the codec adapters together behind one request/response call.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::codecs::{Codec, GhostscriptTool, ImageCodec, PdfStructuralCodec};
use super::estimate;
use super::fallback::{run_fallback_chain, FallbackContext};
use super::search::search_quality;
use super::types::{
    sniff_media_kind, CompressionOutcome, CompressionRequest, CompressionStrategy, MediaKind,
};
use crate::errors::{DomainError, DomainResult, EncodeError};

#[async_trait]
pub trait CompressionService: Send + Sync {
    /// Compress one blob according to the request. When a target byte
    /// budget is set the result is guaranteed to fit it; the only other
    /// outcome is a typed error.
    async fn compress(&self, request: CompressionRequest) -> DomainResult<CompressionOutcome>;

    /// Cheap pre-flight size prediction; performs no encoding.
    fn estimate(&self, request: &CompressionRequest) -> u64;
}

pub struct CompressionServiceImpl {
    ghostscript: Arc<GhostscriptTool>,
}

impl CompressionServiceImpl {
    pub fn new(ghostscript_path: Option<String>, tool_timeout: Option<Duration>) -> Self {
        Self {
            ghostscript: Arc::new(GhostscriptTool::new(ghostscript_path, tool_timeout)),
        }
    }

    /// Verify the payload magic bytes agree with the declared media kind.
    fn verify_media_kind(request: &CompressionRequest) -> DomainResult<()> {
        match sniff_media_kind(&request.input) {
            Some(kind) if kind == request.media_kind => Ok(()),
            Some(kind) => Err(DomainError::encode(
                "input validation",
                EncodeError::InvalidInput(format!(
                    "payload looks like {} but the request says {}",
                    kind.as_str(),
                    request.media_kind.as_str()
                )),
            )),
            None => Err(DomainError::encode(
                "input validation",
                EncodeError::InvalidInput("unrecognized file content".to_string()),
            )),
        }
    }

    async fn compress_to_target(
        &self,
        request: &CompressionRequest,
        target_bytes: u64,
    ) -> DomainResult<(Vec<u8>, CompressionStrategy)> {
        let original_size = request.input.len() as u64;

        match request.media_kind {
            MediaKind::Image => {
                let codec = ImageCodec::new(request.output_format);
                let outcome = search_quality(
                    &codec,
                    &request.input,
                    target_bytes,
                    request.quality,
                    request.deadline,
                )
                .await?;

                if let Some((quality, output)) = outcome.best {
                    return Ok((
                        output,
                        CompressionStrategy::QualitySearch {
                            quality,
                            probes: outcome.probes,
                        },
                    ));
                }

                log::info!(
                    "quality search exhausted after {} probes; escalating to fallback chain",
                    outcome.probes
                );
                let dimensions = ImageCodec::dimensions(&request.input).ok();
                let ctx = FallbackContext {
                    input: &request.input,
                    media_kind: MediaKind::Image,
                    original_size,
                    target_bytes,
                    allow_downscale: request.allow_downscale,
                    dimensions,
                    quality_ceiling: request.quality,
                    search_probes: outcome.probes,
                    smallest_from_search: outcome.smallest_seen,
                    deadline: request.deadline,
                };
                run_fallback_chain(&codec, &self.ghostscript, &ctx).await
            }
            MediaKind::Pdf => {
                // The structural resave has no real quality axis, so the
                // "search" for PDFs collapses into the fallback chain's
                // first tier; the external-tool ladder is the actual
                // size-reduction mechanism.
                let codec = PdfStructuralCodec::new(request.strip_metadata);
                let ctx = FallbackContext {
                    input: &request.input,
                    media_kind: MediaKind::Pdf,
                    original_size,
                    target_bytes,
                    allow_downscale: request.allow_downscale,
                    dimensions: None,
                    quality_ceiling: request.quality,
                    search_probes: 0,
                    smallest_from_search: None,
                    deadline: request.deadline,
                };
                run_fallback_chain(&codec, &self.ghostscript, &ctx).await
            }
        }
    }

    async fn compress_quality_only(
        &self,
        request: &CompressionRequest,
    ) -> DomainResult<(Vec<u8>, CompressionStrategy)> {
        let output = match request.media_kind {
            MediaKind::Image => ImageCodec::new(request.output_format)
                .encode(&request.input, request.quality, None)
                .await,
            MediaKind::Pdf => {
                PdfStructuralCodec::new(request.strip_metadata)
                    .encode(&request.input, request.quality, None)
                    .await
            }
        }
        .map_err(|e| {
            DomainError::encode(
                format!("quality-only encode at q={}", request.quality),
                e,
            )
        })?;

        Ok((
            output,
            CompressionStrategy::QualityOnly {
                quality: request.quality,
            },
        ))
    }
}

#[async_trait]
impl CompressionService for CompressionServiceImpl {
    async fn compress(&self, request: CompressionRequest) -> DomainResult<CompressionOutcome> {
        let started = Instant::now();
        request.validate()?;
        Self::verify_media_kind(&request)?;

        let original_size = request.input.len() as u64;
        log::info!(
            "compressing {} input of {} bytes (target: {:?}, quality: {})",
            request.media_kind.as_str(),
            original_size,
            request.target_bytes,
            request.quality
        );

        let (output, strategy) = match request.target_bytes {
            Some(target) => self.compress_to_target(&request, target).await?,
            None => self.compress_quality_only(&request).await?,
        };

        let output_size = output.len() as u64;
        if let Some(target) = request.target_bytes {
            // An oversized result slipping through here is a bug in a
            // tier, not a user error; never hand it to the caller.
            debug_assert!(output_size <= target);
            if output_size > target {
                return Err(DomainError::Internal(format!(
                    "tier returned {} bytes for a {} byte target",
                    output_size, target
                )));
            }
        }

        let duration_ms = started.elapsed().as_millis() as i64;
        log::info!(
            "compression finished: {} -> {} bytes via {:?} in {} ms",
            original_size,
            output_size,
            strategy,
            duration_ms
        );

        Ok(CompressionOutcome {
            output,
            original_size,
            output_size,
            strategy,
            duration_ms,
        })
    }

    fn estimate(&self, request: &CompressionRequest) -> u64 {
        estimate::estimate_compressed_size(
            request.input.len() as u64,
            request.media_kind,
            request.output_format,
            request.quality,
            request.target_bytes,
        )
    }
}

impl Default for CompressionServiceImpl {
    fn default() -> Self {
        Self::new(None, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::compression::types::OutputFormat;
    use image::{DynamicImage, RgbImage};
    use rand::Rng;

    fn noise_jpeg(width: u32, height: u32) -> Vec<u8> {
        let mut rng = rand::rng();
        let img = RgbImage::from_fn(width, height, |_, _| {
            image::Rgb([rng.random(), rng.random(), rng.random()])
        });
        ImageCodec::encode_dynamic(&DynamicImage::ImageRgb8(img), OutputFormat::Jpeg, 95)
            .expect("encode noise jpeg")
    }

    fn gradient_jpeg(width: u32, height: u32, quality: u8) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, ((x * y) % 256) as u8])
        });
        ImageCodec::encode_dynamic(&DynamicImage::ImageRgb8(img), OutputFormat::Jpeg, quality)
            .expect("encode gradient jpeg")
    }

    /// Text-only PDF with no images; barely responds to recompression.
    fn vector_text_pdf() -> Vec<u8> {
        use lopdf::content::{Content, Operation};
        use lopdf::{dictionary, Document, Object, Stream};

        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let mut operations = vec![Operation::new("BT", vec![])];
        operations.push(Operation::new(
            "Tf",
            vec!["F1".into(), 11.into()],
        ));
        for line in 0..40 {
            operations.push(Operation::new(
                "Td",
                vec![50.into(), (800 - line * 18).into()],
            ));
            operations.push(Operation::new(
                "Tj",
                vec![Object::string_literal(format!(
                    "Line {} of plain vector text that does not resample.",
                    line
                ))],
            ));
        }
        operations.push(Operation::new("ET", vec![]));
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().expect("encode content"),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => font_id },
            },
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        // Streams pre-compressed, as in any real-world PDF, so the
        // structural resave has nothing left to squeeze.
        doc.compress();
        let mut out = std::io::Cursor::new(Vec::new());
        doc.save_to(&mut out).expect("save pdf");
        out.into_inner()
    }

    fn service_without_tool() -> CompressionServiceImpl {
        let _ = env_logger::builder().is_test(true).try_init();
        CompressionServiceImpl::new(Some("/nonexistent/gs-binary".to_string()), None)
    }

    #[tokio::test]
    async fn target_search_meets_budget_with_quality_ceiling() {
        let input = noise_jpeg(512, 512);
        let target = input.len() as u64 / 4;
        let request = CompressionRequest::new(input, MediaKind::Image)
            .with_target(target)
            .with_quality(90);

        let outcome = service_without_tool().compress(request).await.expect("success");
        assert!(outcome.output_size <= target);
        match outcome.strategy {
            CompressionStrategy::QualitySearch { quality, probes } => {
                assert!((1..=90).contains(&quality));
                assert!(probes <= 7);
            }
            other => panic!("expected QualitySearch, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn random_targets_meet_budget_or_fail_honestly() {
        let input = noise_jpeg(256, 256);
        let original = input.len() as u64;
        let mut rng = rand::rng();

        for _ in 0..6 {
            let target = rng.random_range(1_024..=original.max(1_025));
            let request = CompressionRequest::new(input.clone(), MediaKind::Image)
                .with_target(target);
            match service_without_tool().compress(request).await {
                Ok(outcome) => assert!(
                    outcome.output_size <= target,
                    "budget invariant violated: {} > {}",
                    outcome.output_size,
                    target
                ),
                Err(DomainError::BudgetUnreachable(shortfall)) => {
                    assert_eq!(shortfall.target_bytes, target);
                    assert!(shortfall.best_achieved_size > target);
                }
                Err(other) => panic!("unexpected error: {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn tiny_target_either_downscales_or_reports_truthfully() {
        // Small already-efficient input with an aggressive target.
        let input = gradient_jpeg(200, 200, 30);
        let target = 2_000u64;
        let request = CompressionRequest::new(input.clone(), MediaKind::Image)
            .with_target(target);

        match service_without_tool().compress(request).await {
            Ok(outcome) => {
                assert!(outcome.output_size <= target);
                assert!(matches!(
                    outcome.strategy,
                    CompressionStrategy::ResolutionFallback { .. }
                        | CompressionStrategy::QualitySearch { .. }
                ));
            }
            Err(DomainError::BudgetUnreachable(shortfall)) => {
                // Never a silent echo of the original input.
                assert!(shortfall.best_achieved_size < input.len() as u64 * 2);
                assert!(shortfall.best_achieved_size > target);
            }
            Err(other) => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn quality_only_mode_is_deterministic() {
        let input = gradient_jpeg(128, 128, 90);
        let service = service_without_tool();

        let first = service
            .compress(
                CompressionRequest::new(input.clone(), MediaKind::Image).with_quality(60),
            )
            .await
            .expect("first");
        let second = service
            .compress(
                CompressionRequest::new(input, MediaKind::Image).with_quality(60),
            )
            .await
            .expect("second");

        assert_eq!(first.output, second.output);
        assert_eq!(
            first.strategy,
            CompressionStrategy::QualityOnly { quality: 60 }
        );
    }

    #[tokio::test]
    async fn vector_pdf_below_floor_reports_low_compressible_content() {
        let input = vector_text_pdf();
        let request = CompressionRequest::new(input, MediaKind::Pdf).with_target(64);

        let err = service_without_tool().compress(request).await.unwrap_err();
        match err {
            DomainError::BudgetUnreachable(shortfall) => {
                assert_eq!(
                    shortfall.cause,
                    crate::errors::ShortfallCause::LowCompressibleContent
                );
                assert!(shortfall.suggestion.contains("non-compressible"));
            }
            other => panic!("expected BudgetUnreachable, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn mismatched_media_kind_is_rejected() {
        let input = gradient_jpeg(32, 32, 80);
        let request = CompressionRequest::new(input, MediaKind::Pdf);
        let err = service_without_tool().compress(request).await.unwrap_err();
        assert!(matches!(
            err,
            DomainError::Encode {
                source: EncodeError::InvalidInput(_),
                ..
            }
        ));
    }

    #[test]
    fn estimate_is_the_stated_ceiling_in_target_mode() {
        let service = service_without_tool();
        let request = CompressionRequest::new(vec![0u8; 2_000_000], MediaKind::Image)
            .with_target(500_000);
        assert_eq!(service.estimate(&request), 500_000);
    }
}
