//! PDF assembly, password removal and inspection.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use std::io::Cursor;
use tokio::task;

use super::types::{
    PageImage, PdfComposeOptions, PdfComposeOutcome, PdfInfo, PdfPasswordOutcome,
};
use crate::domains::compression::codecs::ImageCodec;
use crate::domains::compression::types::OutputFormat;
use crate::errors::{DomainError, DomainResult, EncodeError, ValidationError};

#[derive(Debug, Clone, Copy, Default)]
pub struct PdfService;

impl PdfService {
    pub fn new() -> Self {
        Self
    }

    /// Assemble the given images into one PDF, one image per page,
    /// ordered by `PageImage::order`. Each image is JPEG re-encoded and
    /// embedded as a DCTDecode XObject, scaled to fit the content box
    /// (never enlarged) and centered.
    pub async fn compose(
        &self,
        mut images: Vec<PageImage>,
        options: PdfComposeOptions,
    ) -> DomainResult<PdfComposeOutcome> {
        options.validate()?;
        if images.is_empty() {
            return Err(ValidationError::field("images", "no images supplied").into());
        }
        images.sort_by_key(|img| img.order);

        let outcome = task::spawn_blocking(move || -> DomainResult<PdfComposeOutcome> {
            let (page_width, page_height) = options.page_points();
            let margin = options.margin;
            let content_width = page_width - margin * 2.0;
            let content_height = page_height - margin * 2.0;

            let mut doc = Document::with_version("1.5");
            let pages_id = doc.new_object_id();
            let font_id = doc.add_object(dictionary! {
                "Type" => "Font",
                "Subtype" => "Type1",
                "BaseFont" => "Helvetica",
            });

            let mut kids: Vec<Object> = Vec::with_capacity(images.len());
            let mut source_names = Vec::with_capacity(images.len());

            for (index, page_image) in images.iter().enumerate() {
                let decoded = ImageCodec::decode(&page_image.data).map_err(|e| {
                    DomainError::encode(
                        format!("embedding image '{}'", page_image.name),
                        e,
                    )
                })?;
                let jpeg =
                    ImageCodec::encode_dynamic(&decoded, OutputFormat::Jpeg, options.jpeg_quality)
                        .map_err(|e| {
                            DomainError::encode(
                                format!("embedding image '{}'", page_image.name),
                                e,
                            )
                        })?;
                let (img_width, img_height) = (decoded.width() as f32, decoded.height() as f32);

                let xobject_id = doc.add_object(Stream::new(
                    dictionary! {
                        "Type" => "XObject",
                        "Subtype" => "Image",
                        "Width" => decoded.width() as i64,
                        "Height" => decoded.height() as i64,
                        "ColorSpace" => "DeviceRGB",
                        "BitsPerComponent" => 8,
                        "Filter" => "DCTDecode",
                    },
                    jpeg,
                ));

                // Fit within the content box without enlarging.
                let scale = (content_width / img_width)
                    .min(content_height / img_height)
                    .min(1.0);
                let drawn_width = img_width * scale;
                let drawn_height = img_height * scale;
                let x = margin + (content_width - drawn_width) / 2.0;
                let y = margin + (content_height - drawn_height) / 2.0;

                let mut operations = vec![
                    Operation::new("q", vec![]),
                    Operation::new(
                        "cm",
                        vec![
                            drawn_width.into(),
                            0.into(),
                            0.into(),
                            drawn_height.into(),
                            x.into(),
                            y.into(),
                        ],
                    ),
                    Operation::new("Do", vec!["Im0".into()]),
                    Operation::new("Q", vec![]),
                ];
                if options.page_numbers {
                    operations.extend([
                        Operation::new("BT", vec![]),
                        Operation::new("Tf", vec!["F1".into(), 10.into()]),
                        Operation::new(
                            "Td",
                            vec![(page_width - margin - 20.0).into(), (margin / 2.0).into()],
                        ),
                        Operation::new(
                            "Tj",
                            vec![Object::string_literal(format!("{}", index + 1))],
                        ),
                        Operation::new("ET", vec![]),
                    ]);
                }

                let content = Content { operations };
                let content_id = doc.add_object(Stream::new(
                    dictionary! {},
                    content.encode().map_err(|e| {
                        DomainError::Internal(format!("Failed to encode page content: {}", e))
                    })?,
                ));

                let page_id = doc.add_object(dictionary! {
                    "Type" => "Page",
                    "Parent" => pages_id,
                    "MediaBox" => vec![
                        0.into(),
                        0.into(),
                        page_width.into(),
                        page_height.into(),
                    ],
                    "Contents" => content_id,
                    "Resources" => dictionary! {
                        "XObject" => dictionary! { "Im0" => xobject_id },
                        "Font" => dictionary! { "F1" => font_id },
                    },
                });
                kids.push(page_id.into());
                source_names.push(page_image.name.clone());
            }

            let page_count = kids.len();
            doc.objects.insert(
                pages_id,
                Object::Dictionary(dictionary! {
                    "Type" => "Pages",
                    "Kids" => kids,
                    "Count" => page_count as i64,
                }),
            );
            let catalog_id = doc.add_object(dictionary! {
                "Type" => "Catalog",
                "Pages" => pages_id,
            });
            doc.trailer.set("Root", catalog_id);
            doc.compress();

            let mut output = Cursor::new(Vec::new());
            doc.save_to(&mut output)
                .map_err(|e| DomainError::Internal(format!("Failed to save PDF: {}", e)))?;
            let output = output.into_inner();

            Ok(PdfComposeOutcome {
                output_size: output.len() as u64,
                output,
                page_count,
                source_names,
            })
        })
        .await
        .map_err(|e| DomainError::Internal(format!("Task join error: {}", e)))??;

        log::info!(
            "assembled {} pages into a {} byte PDF",
            outcome.page_count,
            outcome.output_size
        );
        Ok(outcome)
    }

    /// Strip the encryption from a password-protected PDF.
    ///
    /// A missing password on an encrypted document and a wrong password
    /// are both terminal: retrying with the same input cannot succeed.
    pub async fn remove_password(
        &self,
        input: Vec<u8>,
        password: Option<String>,
    ) -> DomainResult<PdfPasswordOutcome> {
        let original_size = input.len() as u64;

        let outcome = task::spawn_blocking(move || -> DomainResult<PdfPasswordOutcome> {
            let mut doc = Document::load_mem(&input).map_err(|e| {
                DomainError::encode(
                    "password removal",
                    EncodeError::InvalidInput(format!("Failed to parse PDF: {}", e)),
                )
            })?;

            if doc.trailer.get(b"Encrypt").is_ok() {
                let password = password.ok_or(DomainError::PasswordRequired)?;
                doc.decrypt(&password)
                    .map_err(|_| DomainError::InvalidPassword)?;
                doc.trailer.remove(b"Encrypt");
            }

            let page_count = doc.get_pages().len();
            let mut output = Cursor::new(Vec::new());
            doc.save_to(&mut output)
                .map_err(|e| DomainError::Internal(format!("Failed to save PDF: {}", e)))?;
            let output = output.into_inner();

            Ok(PdfPasswordOutcome {
                output_size: output.len() as u64,
                output,
                original_size,
                page_count,
            })
        })
        .await
        .map_err(|e| DomainError::Internal(format!("Task join error: {}", e)))??;

        log::info!(
            "password removal produced {} bytes across {} pages",
            outcome.output_size,
            outcome.page_count
        );
        Ok(outcome)
    }

    /// Pre-flight facts for display before the user picks an operation.
    pub async fn inspect(&self, input: Vec<u8>) -> DomainResult<PdfInfo> {
        task::spawn_blocking(move || -> DomainResult<PdfInfo> {
            let doc = Document::load_mem(&input).map_err(|e| {
                DomainError::encode(
                    "pdf inspection",
                    EncodeError::InvalidInput(format!("Failed to parse PDF: {}", e)),
                )
            })?;

            let encrypted = doc.trailer.get(b"Encrypt").is_ok();
            let page_count = doc.get_pages().len();
            let (title, author) = info_strings(&doc);
            let has_images = doc.objects.values().any(|object| {
                object
                    .as_stream()
                    .ok()
                    .and_then(|stream| stream.dict.get(b"Subtype").ok())
                    .and_then(|subtype| subtype.as_name().ok())
                    .map_or(false, |name| name == b"Image".as_slice())
            });

            Ok(PdfInfo {
                page_count,
                title,
                author,
                encrypted,
                has_images,
            })
        })
        .await
        .map_err(|e| DomainError::Internal(format!("Task join error: {}", e)))?
    }
}

/// Title/Author from the Info dictionary, when present and readable.
fn info_strings(doc: &Document) -> (Option<String>, Option<String>) {
    let info = doc
        .trailer
        .get(b"Info")
        .ok()
        .and_then(|object| object.as_reference().ok())
        .and_then(|id| doc.get_object(id).ok())
        .and_then(|object| object.as_dict().ok());

    let read = |key: &[u8]| {
        info.and_then(|dict| dict.get(key).ok())
            .and_then(|object| object.as_str().ok())
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
            .filter(|s| !s.is_empty())
    };

    (read(b"Title"), read(b"Author"))
}
