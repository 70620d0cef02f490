// Declare submodules for the compression domain
pub mod codecs;
pub mod estimate;
pub mod service;
pub mod types;

mod fallback;
mod search;

// Re-export key types
pub use codecs::{Codec, GhostscriptTool, ImageCodec, PdfStructuralCodec};
pub use estimate::{
    estimate_assembled_pdf_size, estimate_compressed_size, estimate_converted_size,
    estimate_resized_size,
};
pub use service::{CompressionService, CompressionServiceImpl};
pub use types::{
    sniff_media_kind, CompressionOutcome, CompressionRequest, CompressionStrategy, MediaKind,
    OutputFormat,
};
