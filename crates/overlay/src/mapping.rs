//! Logical surface coordinates -> snapshot pixels
//!
//! Scale factors are derived per axis from the snapshot's real size and the
//! logical desktop size, not from the reported pixel ratio, so a bitmap
//! that came back a pixel short on one axis still maps consistently.
//! Position and size are each rounded once; the right and bottom edges are
//! never rounded on their own.

use desktop::{Point, Rect};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelMapping {
    sx: f64,
    sy: f64,
    physical_width: u32,
    physical_height: u32,
}

impl PixelMapping {
    pub fn new(logical_width: u32, logical_height: u32, physical_width: u32, physical_height: u32) -> Self {
        let axis = |physical: u32, logical: u32| {
            if logical == 0 {
                1.0
            } else {
                physical as f64 / logical as f64
            }
        };

        Self {
            sx: axis(physical_width, logical_width),
            sy: axis(physical_height, logical_height),
            physical_width,
            physical_height,
        }
    }

    pub fn scale(&self) -> (f64, f64) {
        (self.sx, self.sy)
    }

    /// Map a rectangle relative to the surface origin into snapshot pixels,
    /// clamped to the snapshot.
    pub fn map_rect(&self, rect: Rect) -> Rect {
        let x = ((rect.x.max(0) as f64 * self.sx).round() as u32).min(self.physical_width);
        let y = ((rect.y.max(0) as f64 * self.sy).round() as u32).min(self.physical_height);
        let width = ((rect.width as f64 * self.sx).round() as u32).min(self.physical_width - x);
        let height = ((rect.height as f64 * self.sy).round() as u32).min(self.physical_height - y);

        Rect::new(x as i32, y as i32, width, height)
    }

    /// Map a surface point to the snapshot pixel under it.
    pub fn map_point(&self, point: Point) -> (u32, u32) {
        let clamp = |v: i32, scale: f64, max: u32| {
            ((v.max(0) as f64 * scale).floor() as u32).min(max.saturating_sub(1))
        };

        (
            clamp(point.x, self.sx, self.physical_width),
            clamp(point.y, self.sy, self.physical_height),
        )
    }
}
