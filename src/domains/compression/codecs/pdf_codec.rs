//! Tier-A PDF compression: structural resave via `lopdf`.
//!
//! Recompresses content streams and consolidates the cross-reference
//! structure without touching embedded images. Cheap, always tried first,
//! bounded improvement; image resampling belongs to the Ghostscript tier.

use async_trait::async_trait;
use std::io::Cursor;
use tokio::task;

use super::Codec;
use crate::errors::{EncodeError, EncodeResult};

#[derive(Debug, Clone, Copy)]
pub struct PdfStructuralCodec {
    strip_metadata: bool,
}

impl PdfStructuralCodec {
    pub fn new(strip_metadata: bool) -> Self {
        Self { strip_metadata }
    }

    /// Synchronous resave, shared by the async adapter and the PDF
    /// assembly service.
    pub fn resave(data: &[u8], strip_metadata: bool) -> EncodeResult<Vec<u8>> {
        let mut doc = lopdf::Document::load_mem(data)
            .map_err(|e| EncodeError::InvalidInput(format!("Failed to parse PDF: {}", e)))?;

        if strip_metadata {
            doc.trailer.remove(b"Info");
        }

        doc.compress();

        let mut output = Cursor::new(Vec::new());
        doc.save_to(&mut output)
            .map_err(|e| EncodeError::Internal(format!("Failed to save PDF: {}", e)))?;
        Ok(output.into_inner())
    }
}

#[async_trait]
impl Codec for PdfStructuralCodec {
    /// The structural resave has no quality knob and no pixel dimensions;
    /// both parameters are accepted for contract symmetry and ignored.
    async fn encode(
        &self,
        input: &[u8],
        _quality: u8,
        _dimensions: Option<(u32, u32)>,
    ) -> EncodeResult<Vec<u8>> {
        let data = input.to_vec();
        let strip_metadata = self.strip_metadata;
        task::spawn_blocking(move || Self::resave(&data, strip_metadata))
            .await
            .map_err(|e| EncodeError::Internal(format!("Task join error: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn malformed_pdf_is_invalid_input() {
        let codec = PdfStructuralCodec::new(false);
        let err = codec.encode(b"definitely not a pdf", 50, None).await.unwrap_err();
        assert!(matches!(err, EncodeError::InvalidInput(_)));
    }
}
