// Declare submodules for the pdf domain
pub mod service;
pub mod types;

pub use service::PdfService;
pub use types::{
    PageImage, PageOrientation, PageSize, PdfComposeOptions, PdfComposeOutcome, PdfInfo,
    PdfPasswordOutcome,
};
