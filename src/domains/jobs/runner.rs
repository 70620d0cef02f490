//! Bounded-concurrency batch runner.
//!
//! Each item in a batch is independent: its own request, its own result,
//! no shared mutable state. A semaphore caps how many run at once and an
//! mpsc channel streams progress to whoever is watching.

use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use uuid::Uuid;

use super::types::{JobItem, JobProgress, JobStatus, OperationRequest, ProcessedArtifact};
use crate::domains::compression::service::{CompressionService, CompressionServiceImpl};
use crate::domains::convert::service::ConvertService;
use crate::domains::pdf::service::PdfService;
use crate::domains::resize::service::ResizeService;
use crate::errors::{DomainError, DomainResult};
use crate::utils::naming::artifact_name;

const DEFAULT_MAX_CONCURRENT: usize = 4;

pub struct JobRunner {
    compression: Arc<dyn CompressionService>,
    resize: ResizeService,
    convert: Arc<ConvertService>,
    pdf: PdfService,
    semaphore: Arc<Semaphore>,
}

impl JobRunner {
    pub fn new(
        max_concurrent: Option<usize>,
        ghostscript_path: Option<String>,
        tool_timeout: Option<Duration>,
        watermark_font: Option<PathBuf>,
    ) -> Self {
        let max_concurrent = max_concurrent.unwrap_or(DEFAULT_MAX_CONCURRENT).max(1);
        Self {
            compression: Arc::new(CompressionServiceImpl::new(ghostscript_path, tool_timeout)),
            resize: ResizeService::new(),
            convert: Arc::new(ConvertService::new(watermark_font)),
            pdf: PdfService::new(),
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
        }
    }

    /// Run a batch. Results come back in item order; one item failing
    /// never aborts its siblings.
    pub async fn run(
        &self,
        items: Vec<JobItem>,
        progress: Option<mpsc::Sender<JobProgress>>,
    ) -> Vec<(Uuid, DomainResult<ProcessedArtifact>)> {
        let total = items.len();
        let mut handles = Vec::with_capacity(total);

        for (index, item) in items.into_iter().enumerate() {
            let semaphore = self.semaphore.clone();
            let compression = self.compression.clone();
            let resize = self.resize;
            let convert = self.convert.clone();
            let pdf = self.pdf;
            let progress = progress.clone();

            handles.push(tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .expect("job semaphore closed");

                send_progress(
                    &progress,
                    &item,
                    JobStatus::Processing,
                    percent(index, total),
                    format!("Processing {}", item.name),
                )
                .await;

                let result =
                    process_item(&*compression, &resize, &convert, &pdf, &item).await;

                match &result {
                    Ok(artifact) => {
                        send_progress(
                            &progress,
                            &item,
                            JobStatus::Completed,
                            percent(index + 1, total),
                            format!("Finished {}", artifact.file_name),
                        )
                        .await;
                    }
                    Err(e) => {
                        log::warn!("job item '{}' failed: {}", item.name, e);
                        send_progress(
                            &progress,
                            &item,
                            JobStatus::Error,
                            percent(index + 1, total),
                            e.to_string(),
                        )
                        .await;
                    }
                }

                (item.id, result)
            }));
        }

        let mut results = Vec::with_capacity(total);
        for handle in handles {
            match handle.await {
                Ok(entry) => results.push(entry),
                Err(e) => {
                    log::error!("job task panicked: {}", e);
                    results.push((
                        Uuid::nil(),
                        Err(DomainError::Internal(format!("Job task failed: {}", e))),
                    ));
                }
            }
        }
        results
    }
}

async fn process_item(
    compression: &dyn CompressionService,
    resize: &ResizeService,
    convert: &ConvertService,
    pdf: &PdfService,
    item: &JobItem,
) -> DomainResult<ProcessedArtifact> {
    let suffix = item.request.name_suffix();
    let extension = item.request.output_extension();
    let file_name = artifact_name(&item.name, suffix, extension);

    let (data, original_size) = match item.request.clone() {
        OperationRequest::Compress(request) => {
            let original = request.input.len() as u64;
            let outcome = compression.compress(request).await?;
            (outcome.output, original)
        }
        OperationRequest::Resize(request) => {
            let original = request.input.len() as u64;
            let outcome = resize.resize(request).await?;
            (outcome.output, original)
        }
        OperationRequest::Convert(request) => {
            let original = request.input.len() as u64;
            let outcome = convert.convert(request).await?;
            (outcome.output, original)
        }
        OperationRequest::Watermark(request) => {
            let original = request.input.len() as u64;
            let outcome = convert.watermark(request).await?;
            (outcome.output, original)
        }
        OperationRequest::ComposePdf { images, options } => {
            let original = images.iter().map(|img| img.data.len() as u64).sum();
            let outcome = pdf.compose(images, options).await?;
            (outcome.output, original)
        }
        OperationRequest::RemovePdfPassword { input, password } => {
            let original = input.len() as u64;
            let outcome = pdf.remove_password(input, password).await?;
            (outcome.output, original)
        }
    };

    let processed_size = data.len() as u64;
    let compression_ratio = if original_size == 0 {
        0.0
    } else {
        (1.0 - processed_size as f64 / original_size as f64) * 100.0
    };

    Ok(ProcessedArtifact {
        file_name,
        original_size,
        processed_size,
        compression_ratio,
        created_at: Utc::now(),
        data,
    })
}

fn percent(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    ((done * 100) / total).min(100) as u8
}

async fn send_progress(
    progress: &Option<mpsc::Sender<JobProgress>>,
    item: &JobItem,
    status: JobStatus,
    percent: u8,
    message: String,
) {
    if let Some(sender) = progress {
        // A closed receiver just means nobody is watching anymore.
        let _ = sender
            .send(JobProgress {
                id: item.id,
                status,
                progress: percent,
                message,
            })
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::compression::codecs::ImageCodec;
    use crate::domains::compression::types::{CompressionRequest, MediaKind, OutputFormat};
    use crate::domains::convert::types::ConvertRequest;
    use crate::domains::resize::types::ResizeRequest;
    use image::{DynamicImage, RgbImage};

    fn sample_jpeg(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, 32])
        });
        ImageCodec::encode_dynamic(&DynamicImage::ImageRgb8(img), OutputFormat::Jpeg, 90)
            .expect("encode jpeg")
    }

    fn runner() -> JobRunner {
        JobRunner::new(
            Some(2),
            Some("/nonexistent/gs-binary".to_string()),
            None,
            None,
        )
    }

    #[tokio::test]
    async fn batch_completes_with_per_item_results() {
        let jpeg = sample_jpeg(96, 96);
        let items = vec![
            JobItem::new(
                "one.jpg",
                OperationRequest::Compress(
                    CompressionRequest::new(jpeg.clone(), MediaKind::Image).with_quality(50),
                ),
            ),
            JobItem::new("two.jpg", {
                let mut request = ResizeRequest::new(jpeg.clone());
                request.width = Some(48);
                OperationRequest::Resize(request)
            }),
            JobItem::new(
                "three.jpg",
                OperationRequest::Convert(ConvertRequest::new(jpeg, OutputFormat::Png)),
            ),
        ];
        let ids: Vec<Uuid> = items.iter().map(|item| item.id).collect();

        let results = runner().run(items, None).await;
        assert_eq!(results.len(), 3);
        for ((id, result), expected_id) in results.iter().zip(ids) {
            assert_eq!(*id, expected_id);
            let artifact = result.as_ref().expect("item succeeded");
            assert!(artifact.processed_size > 0);
        }
    }

    #[tokio::test]
    async fn failures_are_isolated_and_reported() {
        let items = vec![
            JobItem::new(
                "bad.jpg",
                OperationRequest::Convert(ConvertRequest::new(
                    b"not an image".to_vec(),
                    OutputFormat::Png,
                )),
            ),
            JobItem::new(
                "good.jpg",
                OperationRequest::Convert(ConvertRequest::new(
                    sample_jpeg(32, 32),
                    OutputFormat::Png,
                )),
            ),
        ];

        let results = runner().run(items, None).await;
        assert!(results[0].1.is_err());
        assert!(results[1].1.is_ok());
    }

    #[tokio::test]
    async fn progress_reaches_a_terminal_state_for_every_item() {
        let (tx, mut rx) = mpsc::channel(32);
        let items = vec![JobItem::new(
            "one.jpg",
            OperationRequest::Convert(ConvertRequest::new(sample_jpeg(32, 32), OutputFormat::Png)),
        )];
        let id = items[0].id;

        let results = runner().run(items, Some(tx)).await;
        assert!(results[0].1.is_ok());

        let mut saw_terminal = false;
        while let Ok(update) = rx.try_recv() {
            assert_eq!(update.id, id);
            if matches!(update.status, JobStatus::Completed | JobStatus::Error) {
                saw_terminal = true;
            }
        }
        assert!(saw_terminal);
    }

    #[test]
    fn output_extension_follows_the_operation() {
        let compress_pdf = OperationRequest::Compress(CompressionRequest::new(
            vec![1],
            MediaKind::Pdf,
        ));
        assert_eq!(compress_pdf.output_extension(), "pdf");
        let convert = OperationRequest::Convert(ConvertRequest::new(vec![1], OutputFormat::WebP));
        assert_eq!(convert.output_extension(), "webp");
    }
}
