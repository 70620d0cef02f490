// Declare submodules for the convert domain
pub mod service;
pub mod types;

pub use service::ConvertService;
pub use types::{ConvertOutcome, ConvertRequest, WatermarkPosition, WatermarkRequest};
