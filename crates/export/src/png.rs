//! PNG export of captured regions

use crate::{ExportError, ExportResult};
use image::{ImageFormat, RgbaImage};
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Encode an image as PNG bytes
pub fn encode_png(image: &RgbaImage) -> ExportResult<Vec<u8>> {
    if image.width() == 0 || image.height() == 0 {
        return Err(ExportError::EmptyImage);
    }

    let mut bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(bytes)
}

/// Writes captures into a directory
pub struct PngExporter;

impl PngExporter {
    /// Save as `capture_<uuid>.png` inside `output_dir`, creating it if needed
    pub fn save(image: &RgbaImage, output_dir: &Path) -> ExportResult<PathBuf> {
        let bytes = encode_png(image)?;

        fs::create_dir_all(output_dir)?;

        let path = output_dir.join(format!("capture_{}.png", Uuid::new_v4().simple()));
        fs::write(&path, &bytes)?;

        log::info!(
            "Saved {}x{} capture to {} ({} bytes)",
            image.width(),
            image.height(),
            path.display(),
            bytes.len()
        );

        Ok(path)
    }
}
