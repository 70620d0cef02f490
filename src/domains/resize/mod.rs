// Declare submodules for the resize domain
pub mod service;
pub mod types;

pub use service::ResizeService;
pub use types::{FitMode, ResizeOutcome, ResizeRequest};
