//! Tier-B PDF compression: external Ghostscript invocation.
//!
//! The heavyweight re-encoder with rasterization-aware image
//! downsampling. Expensive, used only by the fallback escalation chain.
//! Every invocation gets its own temp files (removed on all exit paths by
//! `tempfile` ownership) and a hard timeout so a wedged `gs` cannot hang
//! the request.

use std::io::Write;
use std::process::Stdio;
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio::process::Command;
use tokio::task;

use crate::errors::{EncodeError, EncodeResult};

/// One fixed-fidelity preset for the external compressor.
#[derive(Debug, Clone, Copy)]
pub struct GsPreset {
    pub name: &'static str,
    /// Target resolution for embedded color/gray images.
    pub image_dpi: u32,
    /// JPEG quality for re-encoded embedded images.
    pub jpeg_quality: u8,
    /// Ghostscript distiller parameter class.
    pub pdf_settings: &'static str,
}

/// Descending fidelity ladder; the fallback chain stops at the first
/// preset whose output meets the budget.
pub const GS_PRESETS: [GsPreset; 5] = [
    GsPreset { name: "high", image_dpi: 200, jpeg_quality: 85, pdf_settings: "printer" },
    GsPreset { name: "medium", image_dpi: 150, jpeg_quality: 75, pdf_settings: "ebook" },
    GsPreset { name: "low", image_dpi: 120, jpeg_quality: 60, pdf_settings: "ebook" },
    GsPreset { name: "minimal", image_dpi: 96, jpeg_quality: 40, pdf_settings: "screen" },
    GsPreset { name: "extreme", image_dpi: 72, jpeg_quality: 25, pdf_settings: "screen" },
];

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(45);

pub struct GhostscriptTool {
    binary_path: String,
    timeout: Duration,
}

impl GhostscriptTool {
    pub fn new(binary_path: Option<String>, timeout: Option<Duration>) -> Self {
        Self {
            binary_path: binary_path.unwrap_or_else(|| "gs".to_string()),
            timeout: timeout.unwrap_or(DEFAULT_TIMEOUT),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Re-encode a PDF with the given preset.
    ///
    /// Exit code 0 plus a readable output file is success; a missing
    /// binary is `ToolUnavailable`; exceeding the deadline kills the
    /// child (`kill_on_drop`) and returns `ToolTimeout`.
    pub async fn compress(&self, input: &[u8], preset: &GsPreset) -> EncodeResult<Vec<u8>> {
        let data = input.to_vec();

        // Temp file setup is blocking I/O; keep it off the runtime.
        let (input_file, output_file) = task::spawn_blocking(
            move || -> EncodeResult<(NamedTempFile, NamedTempFile)> {
                let mut input_file = tempfile::Builder::new()
                    .suffix(".pdf")
                    .tempfile()
                    .map_err(|e| {
                        EncodeError::Internal(format!("Failed to create temp file: {}", e))
                    })?;
                input_file.write_all(&data).map_err(|e| {
                    EncodeError::Internal(format!("Failed to write temp file: {}", e))
                })?;
                let output_file = tempfile::Builder::new()
                    .suffix(".pdf")
                    .tempfile()
                    .map_err(|e| {
                        EncodeError::Internal(format!("Failed to create temp file: {}", e))
                    })?;
                Ok((input_file, output_file))
            },
        )
        .await
        .map_err(|e| EncodeError::Internal(format!("Task join error: {}", e)))??;

        let mut command = Command::new(&self.binary_path);
        command
            .arg("-sDEVICE=pdfwrite")
            .arg(format!("-dPDFSETTINGS=/{}", preset.pdf_settings))
            .arg("-dCompatibilityLevel=1.4")
            .arg("-dDownsampleColorImages=true")
            .arg("-dDownsampleGrayImages=true")
            .arg(format!("-dColorImageResolution={}", preset.image_dpi))
            .arg(format!("-dGrayImageResolution={}", preset.image_dpi))
            .arg(format!("-dJPEGQ={}", preset.jpeg_quality))
            .arg("-dNOPAUSE")
            .arg("-dQUIET")
            .arg("-dBATCH")
            .arg(format!("-sOutputFile={}", output_file.path().to_string_lossy()))
            .arg(input_file.path())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let result = tokio::time::timeout(self.timeout, command.output()).await;

        let output = match result {
            Err(_) => return Err(EncodeError::ToolTimeout(self.timeout)),
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(EncodeError::ToolUnavailable(format!(
                    "{} not found on this host",
                    self.binary_path
                )))
            }
            Ok(Err(e)) => {
                return Err(EncodeError::Internal(format!(
                    "Failed to execute {}: {}",
                    self.binary_path, e
                )))
            }
            Ok(Ok(output)) => output,
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(EncodeError::Internal(format!(
                "Ghostscript exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let compressed = task::spawn_blocking(move || -> EncodeResult<Vec<u8>> {
            let bytes = std::fs::read(output_file.path()).map_err(|e| {
                EncodeError::Internal(format!("Failed to read Ghostscript output: {}", e))
            })?;
            // input_file/output_file dropped here, removing both paths.
            drop(input_file);
            Ok(bytes)
        })
        .await
        .map_err(|e| EncodeError::Internal(format!("Task join error: {}", e)))??;

        if compressed.is_empty() {
            return Err(EncodeError::Internal(
                "Ghostscript produced an empty output file".to_string(),
            ));
        }

        Ok(compressed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_binary_is_tool_unavailable() {
        let tool = GhostscriptTool::new(Some("/nonexistent/gs-binary".to_string()), None);
        let err = tool
            .compress(b"%PDF-1.4", &GS_PRESETS[0])
            .await
            .unwrap_err();
        assert!(matches!(err, EncodeError::ToolUnavailable(_)));
    }

    #[test]
    fn presets_descend_in_fidelity() {
        for pair in GS_PRESETS.windows(2) {
            assert!(pair[0].image_dpi > pair[1].image_dpi);
            assert!(pair[0].jpeg_quality > pair[1].jpeg_quality);
        }
    }
}
