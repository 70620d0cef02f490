//! Fallback escalation chain.
//!
//! Invoked only when the quality search found no feasible result. Tiers
//! run in a fixed order, each gated on permissions and tool availability,
//! and every outcome is an explicit value; a tier failing either hands
//! over to the next tier or contributes to the final `BudgetUnreachable`
//! diagnosis.

use std::time::Instant;

use super::codecs::{Codec, GhostscriptTool, GS_PRESETS};
use super::types::{CompressionStrategy, MediaKind};
use crate::errors::{
    BudgetShortfall, DomainError, DomainResult, EncodeError, ShortfallCause,
};

/// Shrink the computed downscale factor a further 10% so rounding and
/// encoder overhead do not push the single downscale attempt back over
/// budget.
const DOWNSCALE_MARGIN: f64 = 0.9;

/// Below this best-achieved/original ratio the target is considered to
/// sit under the encoder's floor for this input.
const FLOOR_RATIO: f64 = 0.15;

/// Above this best-achieved/original ratio the content barely compressed
/// at all and is classified as low-compressible.
const LOW_COMPRESSIBLE_RATIO: f64 = 0.85;

/// Inputs the chain needs beyond the codec itself.
pub(crate) struct FallbackContext<'a> {
    pub input: &'a [u8],
    pub media_kind: MediaKind,
    pub original_size: u64,
    pub target_bytes: u64,
    pub allow_downscale: bool,
    /// Pixel dimensions of the input, when known (images).
    pub dimensions: Option<(u32, u32)>,
    /// Quality ceiling of the preceding search; reported for the nominal
    /// PDF "search" which is really the single structural resave.
    pub quality_ceiling: u8,
    /// Probe count of the preceding search, folded into the reported
    /// probe total.
    pub search_probes: u8,
    /// Smallest output size the preceding search observed.
    pub smallest_from_search: Option<u64>,
    pub deadline: Option<Instant>,
}

/// Explicit outcome of one tier.
enum TierOutcome {
    Met {
        output: Vec<u8>,
        strategy: CompressionStrategy,
    },
    Missed {
        best_size: u64,
    },
    Skipped,
}

pub(crate) async fn run_fallback_chain(
    codec: &dyn Codec,
    ghostscript: &GhostscriptTool,
    ctx: &FallbackContext<'_>,
) -> DomainResult<(Vec<u8>, CompressionStrategy)> {
    let mut best_achieved = ctx.smallest_from_search;
    let mut record = |size: u64| {
        best_achieved = Some(best_achieved.map_or(size, |b| b.min(size)));
    };

    // Tier 1: minimum-quality attempt (structural resave for PDFs).
    check_deadline(ctx.deadline)?;
    let min_quality_size;
    match try_minimum_quality(codec, ctx).await? {
        TierOutcome::Met { output, strategy } => return Ok((output, strategy)),
        TierOutcome::Missed { best_size } => {
            record(best_size);
            min_quality_size = best_size;
        }
        TierOutcome::Skipped => min_quality_size = ctx.original_size,
    }

    // Tier 2: resolution downscale (images only).
    check_deadline(ctx.deadline)?;
    match try_downscale(codec, ctx, min_quality_size).await? {
        TierOutcome::Met { output, strategy } => return Ok((output, strategy)),
        TierOutcome::Missed { best_size } => record(best_size),
        TierOutcome::Skipped => {}
    }

    // Tier 3: external heavyweight re-encoder (PDFs only).
    check_deadline(ctx.deadline)?;
    match try_external_tool(ghostscript, ctx).await? {
        TierOutcome::Met { output, strategy } => return Ok((output, strategy)),
        TierOutcome::Missed { best_size } => record(best_size),
        TierOutcome::Skipped => {}
    }

    // Tier 4: honest failure with a measured diagnosis.
    let best_achieved_size = best_achieved.unwrap_or(ctx.original_size);
    let (cause, suggestion) =
        classify_shortfall(ctx.original_size, best_achieved_size, ctx.target_bytes);
    log::warn!(
        "budget unreachable: original {} bytes, target {} bytes, best achieved {} bytes ({:?})",
        ctx.original_size,
        ctx.target_bytes,
        best_achieved_size,
        cause
    );
    Err(DomainError::BudgetUnreachable(BudgetShortfall {
        original_size: ctx.original_size,
        target_bytes: ctx.target_bytes,
        best_achieved_size,
        cause,
        suggestion,
    }))
}

/// Tier 1. A feasible result here is the degenerate endpoint of the
/// quality search, not a true fallback, and is reported as such.
async fn try_minimum_quality(
    codec: &dyn Codec,
    ctx: &FallbackContext<'_>,
) -> DomainResult<TierOutcome> {
    let output = codec
        .encode(ctx.input, 1, None)
        .await
        .map_err(|e| DomainError::encode("minimum-quality attempt", e))?;
    let size = output.len() as u64;
    log::debug!("minimum-quality attempt: {} bytes", size);

    if size <= ctx.target_bytes {
        let quality = match ctx.media_kind {
            MediaKind::Image => 1,
            // The PDF resave has no quality axis; report the nominal
            // ceiling the caller asked for.
            MediaKind::Pdf => ctx.quality_ceiling,
        };
        Ok(TierOutcome::Met {
            output,
            strategy: CompressionStrategy::QualitySearch {
                quality,
                probes: ctx.search_probes + 1,
            },
        })
    } else {
        Ok(TierOutcome::Missed { best_size: size })
    }
}

/// Tier 2. Single attempt: scale factor derived from the minimum-quality
/// size, safety margin applied, never upscaling. No iteration within the
/// tier.
async fn try_downscale(
    codec: &dyn Codec,
    ctx: &FallbackContext<'_>,
    min_quality_size: u64,
) -> DomainResult<TierOutcome> {
    if ctx.media_kind != MediaKind::Image || !ctx.allow_downscale {
        return Ok(TierOutcome::Skipped);
    }
    let Some((width, height)) = ctx.dimensions else {
        return Ok(TierOutcome::Skipped);
    };
    if min_quality_size == 0 {
        return Ok(TierOutcome::Skipped);
    }

    let scale = (ctx.target_bytes as f64 / min_quality_size as f64).sqrt() * DOWNSCALE_MARGIN;
    let scale = scale.min(1.0);
    let scaled_width = ((width as f64 * scale).floor() as u32).max(1);
    let scaled_height = ((height as f64 * scale).floor() as u32).max(1);
    log::debug!(
        "downscale attempt: {}x{} -> {}x{} (scale {:.3})",
        width,
        height,
        scaled_width,
        scaled_height,
        scale
    );

    let output = codec
        .encode(ctx.input, 1, Some((scaled_width, scaled_height)))
        .await
        .map_err(|e| {
            DomainError::encode(
                format!("resolution fallback at {}x{}", scaled_width, scaled_height),
                e,
            )
        })?;
    let size = output.len() as u64;

    if size <= ctx.target_bytes {
        Ok(TierOutcome::Met {
            output,
            strategy: CompressionStrategy::ResolutionFallback {
                quality: 1,
                scaled_width,
                scaled_height,
            },
        })
    } else {
        Ok(TierOutcome::Missed { best_size: size })
    }
}

/// Tier 3. Walks the preset ladder from high to very-low fidelity and
/// stops at the first preset that meets budget. A missing binary skips
/// the tier; a timeout abandons it (each further preset would cost up to
/// the full timeout again); any other tool failure moves to the next
/// preset.
async fn try_external_tool(
    ghostscript: &GhostscriptTool,
    ctx: &FallbackContext<'_>,
) -> DomainResult<TierOutcome> {
    if ctx.media_kind != MediaKind::Pdf || !ctx.allow_downscale {
        return Ok(TierOutcome::Skipped);
    }

    let mut best_size: Option<u64> = None;
    for preset in GS_PRESETS.iter() {
        check_deadline(ctx.deadline)?;
        match ghostscript.compress(ctx.input, preset).await {
            Ok(output) => {
                let size = output.len() as u64;
                log::debug!("external preset '{}': {} bytes", preset.name, size);
                if size <= ctx.target_bytes {
                    return Ok(TierOutcome::Met {
                        output,
                        strategy: CompressionStrategy::ExternalToolFallback {
                            preset: preset.name.to_string(),
                        },
                    });
                }
                best_size = Some(best_size.map_or(size, |b| b.min(size)));
            }
            Err(EncodeError::ToolUnavailable(reason)) => {
                log::warn!("external tool tier skipped: {}", reason);
                return Ok(TierOutcome::Skipped);
            }
            Err(EncodeError::ToolTimeout(elapsed)) => {
                log::warn!(
                    "external tool timed out after {:?} on preset '{}'; abandoning tier",
                    elapsed,
                    preset.name
                );
                break;
            }
            Err(e) => {
                log::warn!("external preset '{}' failed: {}", preset.name, e);
            }
        }
    }

    match best_size {
        Some(size) => Ok(TierOutcome::Missed { best_size: size }),
        None => Ok(TierOutcome::Skipped),
    }
}

/// Classify why the budget was missed from what was actually measured;
/// no guessing at file internals beyond the observed sizes.
fn classify_shortfall(
    original_size: u64,
    best_achieved: u64,
    target_bytes: u64,
) -> (ShortfallCause, String) {
    let ratio = if original_size == 0 {
        1.0
    } else {
        best_achieved as f64 / original_size as f64
    };

    if ratio <= FLOOR_RATIO {
        (
            ShortfallCause::TargetBelowFloor,
            format!(
                "The file compressed to {} bytes, {}% of the original, but the target of {} bytes \
                 is below what any quality or resolution setting can reach. Raise the target to at \
                 least {} bytes.",
                best_achieved,
                (ratio * 100.0).round() as u64,
                target_bytes,
                best_achieved
            ),
        )
    } else if ratio >= LOW_COMPRESSIBLE_RATIO {
        (
            ShortfallCause::LowCompressibleContent,
            format!(
                "Compression only reached {} bytes ({}% of the original). The content appears to \
                 be mostly non-compressible text or vector data; a target below {} bytes is not \
                 achievable for this file.",
                best_achieved,
                (ratio * 100.0).round() as u64,
                best_achieved
            ),
        )
    } else {
        (
            ShortfallCause::ImageDominatedContent,
            format!(
                "Compression reached {} bytes ({}% of the original) but the target was {} bytes. \
                 The content is image-dominated and may compress further with a slightly higher \
                 target or external preprocessing of the embedded images.",
                best_achieved,
                (ratio * 100.0).round() as u64,
                target_bytes
            ),
        )
    }
}

fn check_deadline(deadline: Option<Instant>) -> DomainResult<()> {
    if let Some(deadline) = deadline {
        if Instant::now() >= deadline {
            return Err(DomainError::DeadlineExceeded);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::EncodeResult;
    use async_trait::async_trait;

    /// Stub codec: fixed size without dimensions, area-proportional size
    /// with them.
    struct StubCodec {
        full_size: usize,
    }

    #[async_trait]
    impl Codec for StubCodec {
        async fn encode(
            &self,
            _input: &[u8],
            _quality: u8,
            dimensions: Option<(u32, u32)>,
        ) -> EncodeResult<Vec<u8>> {
            let size = match dimensions {
                Some((w, h)) => (w as usize) * (h as usize),
                None => self.full_size,
            };
            Ok(vec![0u8; size])
        }
    }

    fn context<'a>(
        input: &'a [u8],
        media_kind: MediaKind,
        target_bytes: u64,
        allow_downscale: bool,
        dimensions: Option<(u32, u32)>,
    ) -> FallbackContext<'a> {
        FallbackContext {
            input,
            media_kind,
            original_size: input.len() as u64,
            target_bytes,
            allow_downscale,
            dimensions,
            quality_ceiling: 100,
            search_probes: 7,
            smallest_from_search: None,
            deadline: None,
        }
    }

    fn unavailable_tool() -> GhostscriptTool {
        GhostscriptTool::new(Some("/nonexistent/gs-binary".to_string()), None)
    }

    #[tokio::test]
    async fn unreachable_target_fails_honestly_without_downscale() {
        // Downscale disallowed and no external tool for images: nothing
        // after the minimum-quality attempt may produce an oversized
        // "success".
        let codec = StubCodec { full_size: 50_000 };
        let input = vec![0u8; 50_000];
        let ctx = context(&input, MediaKind::Image, 10_000, false, Some((100, 100)));
        let err = run_fallback_chain(&codec, &unavailable_tool(), &ctx)
            .await
            .unwrap_err();
        match err {
            DomainError::BudgetUnreachable(shortfall) => {
                assert_eq!(shortfall.best_achieved_size, 50_000);
                assert_eq!(shortfall.target_bytes, 10_000);
                assert_eq!(shortfall.cause, ShortfallCause::LowCompressibleContent);
            }
            other => panic!("expected BudgetUnreachable, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn downscale_tier_meets_budget() {
        let codec = StubCodec { full_size: 50_000 };
        let input = vec![0u8; 50_000];
        let ctx = context(&input, MediaKind::Image, 10_000, true, Some((100, 100)));
        let (output, strategy) = run_fallback_chain(&codec, &unavailable_tool(), &ctx)
            .await
            .expect("downscale should fit");
        assert!(output.len() as u64 <= 10_000);
        match strategy {
            CompressionStrategy::ResolutionFallback {
                quality,
                scaled_width,
                scaled_height,
            } => {
                assert_eq!(quality, 1);
                assert!(scaled_width < 100 && scaled_height < 100);
            }
            other => panic!("expected ResolutionFallback, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn minimum_quality_hit_reports_quality_search() {
        let codec = StubCodec { full_size: 5_000 };
        let input = vec![0u8; 50_000];
        let ctx = context(&input, MediaKind::Image, 10_000, true, Some((100, 100)));
        let (_, strategy) = run_fallback_chain(&codec, &unavailable_tool(), &ctx)
            .await
            .expect("minimum quality fits");
        assert_eq!(
            strategy,
            CompressionStrategy::QualitySearch {
                quality: 1,
                probes: 8
            }
        );
    }

    #[tokio::test]
    async fn pdf_with_tool_unavailable_is_unreachable_not_oversized() {
        let codec = StubCodec { full_size: 50_000 };
        let input = vec![0u8; 52_000];
        let ctx = context(&input, MediaKind::Pdf, 10_000, true, None);
        let err = run_fallback_chain(&codec, &unavailable_tool(), &ctx)
            .await
            .unwrap_err();
        match err {
            DomainError::BudgetUnreachable(shortfall) => {
                assert_eq!(shortfall.cause, ShortfallCause::LowCompressibleContent);
                assert!(shortfall.suggestion.contains("non-compressible"));
            }
            other => panic!("expected BudgetUnreachable, got {:?}", other),
        }
    }

    #[test]
    fn shortfall_classification_uses_measured_ratio() {
        let (cause, _) = classify_shortfall(100_000, 95_000, 10_000);
        assert_eq!(cause, ShortfallCause::LowCompressibleContent);
        let (cause, _) = classify_shortfall(100_000, 40_000, 10_000);
        assert_eq!(cause, ShortfallCause::ImageDominatedContent);
        let (cause, _) = classify_shortfall(100_000, 8_000, 1_000);
        assert_eq!(cause, ShortfallCause::TargetBelowFloor);
    }

    #[tokio::test]
    async fn expired_deadline_stops_the_chain() {
        let codec = StubCodec { full_size: 50_000 };
        let input = vec![0u8; 50_000];
        let mut ctx = context(&input, MediaKind::Image, 10_000, true, Some((100, 100)));
        ctx.deadline = Some(Instant::now() - std::time::Duration::from_secs(1));
        let err = run_fallback_chain(&codec, &unavailable_tool(), &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::DeadlineExceeded));
    }
}
