//! Size-targeting quality search.
//!
//! Binary search over the integer quality range for the highest quality
//! whose output fits the byte budget. Encoder output size is not proven
//! monotonic in quality, so the search trusts the best feasible result it
//! has actually observed, never the narrowed interval alone.

use std::time::Instant;

use super::codecs::Codec;
use crate::errors::{DomainError, DomainResult};

/// Ephemeral search interval plus the best feasible result seen so far.
/// One per call; never shared, never persisted.
struct SearchState {
    low: u8,
    high: u8,
    best: Option<(u8, Vec<u8>)>,
}

/// What the search observed, whether or not it found a feasible result.
#[derive(Debug)]
pub(crate) struct SearchOutcome {
    /// Highest-quality under-budget result, if any probe produced one.
    pub best: Option<(u8, Vec<u8>)>,
    /// Number of encode probes performed (bounded by ceil(log2(range))).
    pub probes: u8,
    /// Smallest output size seen across all probes, feasible or not.
    /// Feeds the `BudgetUnreachable` diagnosis if the fallback chain also
    /// comes up empty.
    pub smallest_seen: Option<u64>,
}

/// Find the highest quality in `[1, max_quality]` producing output of at
/// most `target_bytes`.
///
/// At most `ceil(log2(max_quality))` encode calls; the interval halves on
/// every probe. Ties on output size resolve to the higher quality because
/// a feasible probe always moves the interval upward before the next
/// feasible probe can be recorded.
pub(crate) async fn search_quality(
    codec: &dyn Codec,
    input: &[u8],
    target_bytes: u64,
    max_quality: u8,
    deadline: Option<Instant>,
) -> DomainResult<SearchOutcome> {
    let mut state = SearchState {
        low: 1,
        high: max_quality.clamp(1, 100),
        best: None,
    };
    let mut probes: u8 = 0;
    let mut smallest_seen: Option<u64> = None;

    while state.low <= state.high {
        if let Some(deadline) = deadline {
            if Instant::now() >= deadline {
                return Err(DomainError::DeadlineExceeded);
            }
        }

        let mid = state.low + (state.high - state.low) / 2;
        let encoded = codec.encode(input, mid, None).await.map_err(|e| {
            DomainError::encode(format!("quality search probe at q={}", mid), e)
        })?;
        probes += 1;

        let size = encoded.len() as u64;
        smallest_seen = Some(smallest_seen.map_or(size, |s| s.min(size)));
        log::debug!(
            "search probe {}: q={} -> {} bytes (target {})",
            probes,
            mid,
            size,
            target_bytes
        );

        if size <= target_bytes {
            // Feasible: keep it if it beats the recorded best quality,
            // then try for better fidelity above.
            if state.best.as_ref().map_or(true, |(q, _)| mid > *q) {
                state.best = Some((mid, encoded));
            }
            state.low = mid + 1;
        } else {
            // mid == 1 drives high to 0 and the loop terminates.
            state.high = mid - 1;
        }
    }

    Ok(SearchOutcome {
        best: state.best,
        probes,
        smallest_seen,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::compression::codecs::Codec;
    use crate::errors::EncodeResult;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU8, Ordering};

    /// Codec stub mapping quality to a synthetic output length.
    struct TableCodec<F: Fn(u8) -> usize + Send + Sync> {
        size_for: F,
        calls: AtomicU8,
    }

    impl<F: Fn(u8) -> usize + Send + Sync> TableCodec<F> {
        fn new(size_for: F) -> Self {
            Self {
                size_for,
                calls: AtomicU8::new(0),
            }
        }
    }

    #[async_trait]
    impl<F: Fn(u8) -> usize + Send + Sync> Codec for TableCodec<F> {
        async fn encode(
            &self,
            _input: &[u8],
            quality: u8,
            _dimensions: Option<(u32, u32)>,
        ) -> EncodeResult<Vec<u8>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![0u8; (self.size_for)(quality)])
        }
    }

    #[tokio::test]
    async fn finds_highest_feasible_quality() {
        // Monotonic: size grows 10 bytes per quality step.
        let codec = TableCodec::new(|q| q as usize * 10);
        let outcome = search_quality(&codec, b"x", 550, 100, None).await.unwrap();
        let (quality, bytes) = outcome.best.expect("feasible result");
        assert_eq!(quality, 55);
        assert_eq!(bytes.len(), 550);
    }

    #[tokio::test]
    async fn terminates_within_probe_budget() {
        for target in [1u64, 50, 500, 1000, 10_000] {
            let codec = TableCodec::new(|q| q as usize * 10);
            let outcome = search_quality(&codec, b"x", target, 100, None).await.unwrap();
            assert!(
                outcome.probes <= 7,
                "target {} took {} probes",
                target,
                outcome.probes
            );
            assert_eq!(codec.calls.load(Ordering::SeqCst), outcome.probes);
        }
    }

    #[tokio::test]
    async fn ties_prefer_higher_quality() {
        // Every quality yields the same length; all probes are feasible,
        // so the search must walk up and report the ceiling.
        let codec = TableCodec::new(|_| 100);
        let outcome = search_quality(&codec, b"x", 100, 100, None).await.unwrap();
        assert_eq!(outcome.best.expect("feasible").0, 100);
    }

    #[tokio::test]
    async fn respects_quality_ceiling() {
        let codec = TableCodec::new(|q| q as usize);
        let outcome = search_quality(&codec, b"x", 10_000, 90, None).await.unwrap();
        assert_eq!(outcome.best.expect("feasible").0, 90);
    }

    #[tokio::test]
    async fn infeasible_everywhere_returns_no_best() {
        let codec = TableCodec::new(|_| 1_000_000);
        let outcome = search_quality(&codec, b"x", 10, 100, None).await.unwrap();
        assert!(outcome.best.is_none());
        assert_eq!(outcome.smallest_seen, Some(1_000_000));
        assert!(outcome.probes <= 7);
    }

    #[tokio::test]
    async fn non_monotonic_sizes_still_return_observed_best() {
        // A dip at q=60 makes the space non-monotonic; the recorded best
        // must be an actually-observed feasible probe.
        let codec = TableCodec::new(|q| if q == 60 { 10 } else { q as usize * 100 });
        let outcome = search_quality(&codec, b"x", 3000, 100, None).await.unwrap();
        let (quality, bytes) = outcome.best.expect("feasible result");
        assert!(bytes.len() as u64 <= 3000);
        assert!(quality >= 25);
    }

    #[tokio::test]
    async fn expired_deadline_aborts_before_probing() {
        let codec = TableCodec::new(|q| q as usize);
        let err = search_quality(
            &codec,
            b"x",
            100,
            100,
            Some(Instant::now() - std::time::Duration::from_secs(1)),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, DomainError::DeadlineExceeded));
        assert_eq!(codec.calls.load(Ordering::SeqCst), 0);
    }
}
