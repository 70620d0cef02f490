//! Processing core for a file conversion platform.
//!
//! Accepts raw image/PDF bytes plus typed operation requests and returns
//! processed artifacts. The centerpiece is the target-size-constrained
//! compression engine in [`domains::compression`]: a bounded binary search
//! over encoder quality with a layered fallback chain (resolution
//! downscale, external Ghostscript re-encode) and an honest
//! `BudgetUnreachable` failure when a byte budget cannot be met.
//!
//! The crate owns no HTTP surface, no persistence and no UI; the embedding
//! application is responsible for transport, storage and naming of the
//! artifacts it receives back.

// Public modules
pub mod domains;
pub mod errors;

// Private modules
mod utils;

pub use domains::compression::{
    CompressionOutcome, CompressionRequest, CompressionService, CompressionServiceImpl,
    CompressionStrategy, MediaKind, OutputFormat,
};
pub use errors::{DomainError, DomainResult, EncodeError};
