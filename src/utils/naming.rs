//! Output artifact naming.
//!
//! `photo.png` compressed to JPEG becomes `photo_compressed_3f2a9b1c.jpg`:
//! original stem, operation suffix, short unique id, new extension. The
//! short id keeps concurrent jobs over identically-named uploads from
//! colliding without dragging a full UUID into the filename.

use std::path::Path;
use uuid::Uuid;

/// Build an output file name from the original name, an operation suffix
/// and the output extension.
pub(crate) fn artifact_name(original_name: &str, suffix: &str, extension: &str) -> String {
    let stem = Path::new(original_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("file");
    format!("{}_{}_{}.{}", stem, suffix, short_id(), extension)
}

/// First segment of a v4 UUID; unique enough for filenames within a job.
fn short_id() -> String {
    Uuid::new_v4()
        .to_string()
        .split('-')
        .next()
        .unwrap_or_default()
        .to_string()
}
