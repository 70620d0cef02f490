//! ZIP bundling of processed artifacts for batched download.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::io::{Cursor, Write};
use tokio::task;
use zip::{write::FileOptions, ZipWriter};

use crate::errors::{DomainError, DomainResult, ValidationError};

/// One named artifact to include in the bundle.
#[derive(Debug, Clone)]
pub struct BundleEntry {
    pub name: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BundleService;

impl BundleService {
    pub fn new() -> Self {
        Self
    }

    /// Write all entries into a deflate-compressed ZIP. Duplicate names
    /// are disambiguated with a numeric suffix so no entry silently
    /// overwrites another.
    pub async fn bundle(&self, entries: Vec<BundleEntry>) -> DomainResult<Vec<u8>> {
        if entries.is_empty() {
            return Err(ValidationError::field("entries", "nothing to bundle").into());
        }

        let output = task::spawn_blocking(move || -> DomainResult<Vec<u8>> {
            let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
            let options = FileOptions::default()
                .compression_method(zip::CompressionMethod::Deflated)
                .compression_level(Some(6));

            let mut seen: HashMap<String, u32> = HashMap::new();
            for entry in entries {
                let name = match seen.entry(entry.name.clone()) {
                    Entry::Occupied(mut slot) => {
                        *slot.get_mut() += 1;
                        dedup_name(&entry.name, *slot.get())
                    }
                    Entry::Vacant(slot) => {
                        slot.insert(0);
                        entry.name.clone()
                    }
                };

                writer
                    .start_file(&name, options)
                    .map_err(|e| DomainError::Internal(format!("Failed to start ZIP entry: {}", e)))?;
                writer
                    .write_all(&entry.data)
                    .map_err(|e| DomainError::Internal(format!("Failed to write ZIP entry: {}", e)))?;
            }

            let cursor = writer
                .finish()
                .map_err(|e| DomainError::Internal(format!("Failed to finalize ZIP: {}", e)))?;
            Ok(cursor.into_inner())
        })
        .await
        .map_err(|e| DomainError::Internal(format!("Task join error: {}", e)))??;

        log::info!("bundled artifacts into a {} byte ZIP", output.len());
        Ok(output)
    }
}

/// `report.pdf` -> `report (2).pdf`
fn dedup_name(name: &str, count: u32) -> String {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{} ({}).{}", stem, count + 1, ext),
        _ => format!("{} ({})", name, count + 1),
    }
}
