//! Codec adapters wrapping the external encoding capabilities.
//!
//! Adapters are pure and stateless: bytes plus a quality parameter in,
//! re-encoded bytes out. No caching, no persistence, no logging at this
//! layer. Everything search-related lives above, in `search`/`fallback`.

pub mod ghostscript;
pub mod image_codec;
pub mod pdf_codec;

use async_trait::async_trait;

use crate::errors::EncodeResult;

pub use ghostscript::{GhostscriptTool, GsPreset, GS_PRESETS};
pub use image_codec::ImageCodec;
pub use pdf_codec::PdfStructuralCodec;

/// Common contract for re-encoding a blob at a given quality.
///
/// `quality` is the abstract 1-100 fidelity scale; each adapter maps it to
/// its encoder's native parameters. `dimensions`, when given, resizes
/// before encoding (images; the structural PDF adapter ignores it).
#[async_trait]
pub trait Codec: Send + Sync {
    async fn encode(
        &self,
        input: &[u8],
        quality: u8,
        dimensions: Option<(u32, u32)>,
    ) -> EncodeResult<Vec<u8>>;
}
