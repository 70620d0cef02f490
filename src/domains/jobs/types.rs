//! Type definitions for the jobs domain.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::domains::compression::types::CompressionRequest;
use crate::domains::convert::types::{ConvertRequest, WatermarkRequest};
use crate::domains::pdf::types::{PageImage, PdfComposeOptions};
use crate::domains::resize::types::ResizeRequest;

/// One operation, one variant, each carrying only the fields that
/// operation reads. There is no way to smuggle, say, watermark text into
/// a resize.
#[derive(Debug, Clone)]
pub enum OperationRequest {
    Compress(CompressionRequest),
    Resize(ResizeRequest),
    Convert(ConvertRequest),
    Watermark(WatermarkRequest),
    ComposePdf {
        images: Vec<PageImage>,
        options: PdfComposeOptions,
    },
    RemovePdfPassword {
        input: Vec<u8>,
        password: Option<String>,
    },
}

impl OperationRequest {
    /// Suffix for the output artifact name.
    pub fn name_suffix(&self) -> &'static str {
        match self {
            OperationRequest::Compress(_) => "compressed",
            OperationRequest::Resize(_) => "resized",
            OperationRequest::Convert(_) => "converted",
            OperationRequest::Watermark(_) => "watermarked",
            OperationRequest::ComposePdf { .. } => "combined",
            OperationRequest::RemovePdfPassword { .. } => "unlocked",
        }
    }

    /// Extension of the output artifact.
    pub fn output_extension(&self) -> &'static str {
        match self {
            OperationRequest::Compress(request) => match request.media_kind {
                crate::domains::compression::types::MediaKind::Pdf => "pdf",
                crate::domains::compression::types::MediaKind::Image => {
                    request.output_format.extension()
                }
            },
            OperationRequest::Resize(request) => request.output_format.extension(),
            OperationRequest::Convert(request) => request.output_format.extension(),
            OperationRequest::Watermark(request) => request.output_format.extension(),
            OperationRequest::ComposePdf { .. } | OperationRequest::RemovePdfPassword { .. } => {
                "pdf"
            }
        }
    }
}

/// One unit of work in a batch: an uploaded file (or image set) plus the
/// operation to apply.
#[derive(Debug, Clone)]
pub struct JobItem {
    pub id: Uuid,
    /// Original upload name; the output name derives from it.
    pub name: String,
    pub request: OperationRequest,
}

impl JobItem {
    pub fn new(name: impl Into<String>, request: OperationRequest) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            request,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Error,
}

/// Progress snapshot pushed to the embedding layer while a batch runs.
#[derive(Debug, Clone, Serialize)]
pub struct JobProgress {
    pub id: Uuid,
    pub status: JobStatus,
    /// 0-100 across the whole batch.
    pub progress: u8,
    pub message: String,
}

/// A finished artifact, ready for the embedding layer to persist and
/// expose for download.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessedArtifact {
    pub file_name: String,
    pub original_size: u64,
    pub processed_size: u64,
    /// Percent saved relative to the original input.
    pub compression_ratio: f64,
    pub created_at: DateTime<Utc>,
    #[serde(skip)]
    pub data: Vec<u8>,
}
