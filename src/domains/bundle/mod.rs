// Declare submodules for the bundle domain
pub mod service;

pub use service::{BundleEntry, BundleService};
