/// Rasters, encoded images and user notices.
pub mod core;
/// Crate error type.
pub mod error;
