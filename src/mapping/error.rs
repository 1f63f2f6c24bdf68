//! Error types for the mapping engine and layout files

use thiserror::Error;

use super::surface::SurfaceId;

/// Errors raised by mesh, surface and layout operations
#[derive(Debug, Error)]
pub enum MappingError {
    #[error("Invalid mesh resolution {rows}x{cols} (minimum is 2x2)")]
    InvalidResolution { rows: usize, cols: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("XML parse error: {0}")]
    XmlParse(#[from] quick_xml::DeError),

    #[error("XML write error: {0}")]
    XmlWrite(#[from] quick_xml::SeError),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Unsupported layout version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    #[error("Invalid layout: {0}")]
    InvalidLayout(String),
}

/// A persisted source label that no registered sketch answered to.
///
/// Not an error: the surface is loaded unbound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedBinding {
    pub surface: SurfaceId,
    pub label: String,
}
