//! Frozen full-desktop snapshot

use crate::{mapping::PixelMapping, OverlayError, OverlayResult};
use desktop::{desktop_bounds, primary_display, DisplayInfo, DisplayService, Point, Rect};
use image::{imageops, RgbaImage};
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Logical extent of the whole desktop plus the reference pixel ratio
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DesktopGeometry {
    bounds: Rect,
    pixel_ratio: f64,
}

impl Default for DesktopGeometry {
    fn default() -> Self {
        Self {
            bounds: Rect::default(),
            pixel_ratio: 1.0,
        }
    }
}

impl DesktopGeometry {
    /// Union of all displays; the ratio is taken from the primary display.
    pub fn from_displays(displays: &[DisplayInfo]) -> OverlayResult<Self> {
        let bounds = desktop_bounds(displays).ok_or(desktop::DesktopError::NoDisplays)?;
        let primary = primary_display(displays).ok_or(desktop::DesktopError::NoPrimaryDisplay)?;

        Ok(Self {
            bounds,
            pixel_ratio: primary.effective_ratio(),
        })
    }

    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    pub fn origin(&self) -> Point {
        Point::new(self.bounds.x, self.bounds.y)
    }

    pub fn width(&self) -> u32 {
        self.bounds.width
    }

    pub fn height(&self) -> u32 {
        self.bounds.height
    }

    pub fn pixel_ratio(&self) -> f64 {
        self.pixel_ratio
    }

    /// Snapshot size implied by the reference ratio
    pub fn expected_snapshot_size(&self) -> (u32, u32) {
        (
            (self.bounds.width as f64 * self.pixel_ratio).round() as u32,
            (self.bounds.height as f64 * self.pixel_ratio).round() as u32,
        )
    }

    /// Surface-relative rectangle -> desktop coordinates
    pub fn to_desktop(&self, rect: Rect) -> Rect {
        Rect::new(rect.x + self.bounds.x, rect.y + self.bounds.y, rect.width, rect.height)
    }
}

/// Desktop pixels taken at session start. Never mutated afterwards.
pub struct DesktopSnapshot {
    image: RgbaImage,
    mapping: PixelMapping,
}

impl DesktopSnapshot {
    /// Capture the whole desktop. Backend errors, empty images and panics
    /// inside the backend all come back as `Err`.
    pub fn acquire(service: &dyn DisplayService, geometry: &DesktopGeometry) -> OverlayResult<Self> {
        let bounds = geometry.bounds();
        if bounds.is_empty() {
            return Err(OverlayError::SnapshotUnavailable("desktop has no area".into()));
        }

        let captured = catch_unwind(AssertUnwindSafe(|| service.capture_region(bounds)))
            .map_err(|payload| {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".into());
                OverlayError::SnapshotUnavailable(format!("capture backend panicked: {}", message))
            })??;

        let snapshot = Self::from_image(captured, geometry)?;

        let expected = geometry.expected_snapshot_size();
        if snapshot.image.dimensions() != expected {
            log::debug!(
                "Snapshot is {}x{}, ratio {} implies {}x{}; mapping per axis",
                snapshot.width(),
                snapshot.height(),
                geometry.pixel_ratio(),
                expected.0,
                expected.1
            );
        }

        Ok(snapshot)
    }

    pub fn from_image(image: RgbaImage, geometry: &DesktopGeometry) -> OverlayResult<Self> {
        if image.width() == 0 || image.height() == 0 {
            return Err(desktop::DesktopError::EmptyImage.into());
        }

        let mapping = PixelMapping::new(geometry.width(), geometry.height(), image.width(), image.height());
        Ok(Self { image, mapping })
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn mapping(&self) -> &PixelMapping {
        &self.mapping
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Cut a surface-relative logical rectangle out of the snapshot.
    /// Returns the physical rectangle alongside, or `None` when the mapped
    /// rectangle has no area.
    pub fn crop(&self, rect: Rect) -> Option<(Rect, RgbaImage)> {
        let physical = self.mapping.map_rect(rect);
        if physical.is_empty() {
            return None;
        }

        let image = imageops::crop_imm(
            &self.image,
            physical.x as u32,
            physical.y as u32,
            physical.width,
            physical.height,
        )
        .to_image();

        Some((physical, image))
    }
}
