//! In-memory display service
//!
//! Serves a fixed desktop image for a fixed display list. Useful for
//! headless hosts and for driving capture sessions in tests.

use crate::{desktop_bounds, primary_display, DesktopError, DesktopResult, DisplayInfo, DisplayService, Rect};
use image::{imageops, Rgba, RgbaImage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CaptureBehavior {
    Serve,
    Fail,
    Empty,
}

/// Display service backed by a prepared image
pub struct MemoryDisplayService {
    displays: Vec<DisplayInfo>,
    desktop: RgbaImage,
    behavior: CaptureBehavior,
}

impl MemoryDisplayService {
    /// `desktop` must cover the union of all display geometries.
    pub fn new(displays: Vec<DisplayInfo>, desktop: RgbaImage) -> Self {
        Self {
            displays,
            desktop,
            behavior: CaptureBehavior::Serve,
        }
    }

    /// Desktop filled with a coordinate pattern, sized by the primary ratio.
    ///
    /// Pixel `(x, y)` is `[x % 256, y % 256, (x / 256) * 16 + y / 256, 255]`.
    pub fn with_pattern(displays: Vec<DisplayInfo>) -> Self {
        let (width, height) = match desktop_bounds(&displays) {
            Some(bounds) => {
                let ratio = primary_display(&displays)
                    .map(DisplayInfo::effective_ratio)
                    .unwrap_or(1.0);
                (
                    (bounds.width as f64 * ratio).round() as u32,
                    (bounds.height as f64 * ratio).round() as u32,
                )
            }
            None => (0, 0),
        };

        let desktop = RgbaImage::from_fn(width, height, pattern_pixel);
        Self::new(displays, desktop)
    }

    /// Single primary display at the origin.
    pub fn single(width: u32, height: u32, pixel_ratio: f64) -> Self {
        let display = DisplayInfo::new("memory-0", Rect::new(0, 0, width, height), pixel_ratio, true);
        Self::with_pattern(vec![display])
    }

    /// Every capture fails.
    pub fn failing(mut self) -> Self {
        self.behavior = CaptureBehavior::Fail;
        self
    }

    /// Every capture succeeds with a 0x0 image.
    pub fn empty(mut self) -> Self {
        self.behavior = CaptureBehavior::Empty;
        self
    }

    pub fn desktop(&self) -> &RgbaImage {
        &self.desktop
    }
}

/// Pixel value produced by [`MemoryDisplayService::with_pattern`]
pub fn pattern_pixel(x: u32, y: u32) -> Rgba<u8> {
    Rgba([
        (x % 256) as u8,
        (y % 256) as u8,
        ((x / 256) * 16 + y / 256) as u8,
        255,
    ])
}

impl DisplayService for MemoryDisplayService {
    fn list_displays(&self) -> DesktopResult<Vec<DisplayInfo>> {
        Ok(self.displays.clone())
    }

    fn capture_region(&self, region: Rect) -> DesktopResult<RgbaImage> {
        match self.behavior {
            CaptureBehavior::Fail => {
                return Err(DesktopError::Capture("capture disabled".into()));
            }
            CaptureBehavior::Empty => return Ok(RgbaImage::new(0, 0)),
            CaptureBehavior::Serve => {}
        }

        let bounds = desktop_bounds(&self.displays).ok_or(DesktopError::NoDisplays)?;
        if !region.intersects(&bounds) {
            return Err(DesktopError::Capture(format!(
                "region {:?} is outside the desktop {:?}",
                region, bounds
            )));
        }

        let sx = self.desktop.width() as f64 / bounds.width as f64;
        let sy = self.desktop.height() as f64 / bounds.height as f64;

        let left = ((region.x - bounds.x).max(0) as f64 * sx).round() as u32;
        let top = ((region.y - bounds.y).max(0) as f64 * sy).round() as u32;
        let right = (((region.right() - bounds.x) as f64 * sx).round() as u32).min(self.desktop.width());
        let bottom = (((region.bottom() - bounds.y) as f64 * sy).round() as u32).min(self.desktop.height());

        Ok(imageops::crop_imm(
            &self.desktop,
            left,
            top,
            right.saturating_sub(left),
            bottom.saturating_sub(top),
        )
        .to_image())
    }
}
