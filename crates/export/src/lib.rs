//! Export module for texsnip
//!
//! Hands captured regions to the outside world as PNG.

mod png;

pub use png::{encode_png, PngExporter};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Image has no pixels")]
    EmptyImage,
}

pub type ExportResult<T> = Result<T, ExportError>;
