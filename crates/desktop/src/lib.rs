//! Desktop access for texsnip
//!
//! Display enumeration and full-desktop capture behind the `DisplayService`
//! trait, so the overlay never talks to a concrete windowing backend.

#[cfg(windows)]
pub mod gdi;
pub mod memory;

#[cfg(windows)]
pub use gdi::GdiDisplayService;
pub use memory::MemoryDisplayService;

use image::RgbaImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DesktopError {
    #[cfg(windows)]
    #[error("Windows API error: {0}")]
    Windows(#[from] windows::core::Error),

    #[error("No displays connected")]
    NoDisplays,

    #[error("No primary display found")]
    NoPrimaryDisplay,

    #[error("Capture failed: {0}")]
    Capture(String),

    #[error("Capture returned an empty image")]
    EmptyImage,
}

pub type DesktopResult<T> = Result<T, DesktopError>;

/// Point in logical coordinates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Rectangle; logical or physical depending on where it came from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Normalized rectangle spanned by two arbitrary corners.
    pub fn from_corners(a: Point, b: Point) -> Self {
        Self::new(
            a.x.min(b.x),
            a.y.min(b.y),
            (a.x - b.x).unsigned_abs(),
            (a.y - b.y).unsigned_abs(),
        )
    }

    pub fn right(&self) -> i32 {
        self.x + self.width as i32
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height as i32
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.right() && self.right() > other.x &&
        self.y < other.bottom() && self.bottom() > other.y
    }

    /// Smallest rectangle covering both. Empty rectangles are ignored.
    pub fn union(&self, other: &Rect) -> Rect {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }

        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());

        Rect::new(x, y, (right - x) as u32, (bottom - y) as u32)
    }
}

/// One connected display as reported by the window manager
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayInfo {
    pub name: String,
    /// Geometry in logical coordinates
    pub geometry: Rect,
    /// Physical pixels per logical unit
    pub pixel_ratio: f64,
    pub is_primary: bool,
}

impl DisplayInfo {
    pub fn new(name: impl Into<String>, geometry: Rect, pixel_ratio: f64, is_primary: bool) -> Self {
        Self {
            name: name.into(),
            geometry,
            pixel_ratio,
            is_primary,
        }
    }

    /// Pixel ratio with nonsensical values replaced by 1.0
    pub fn effective_ratio(&self) -> f64 {
        if self.pixel_ratio.is_finite() && self.pixel_ratio > 0.0 {
            self.pixel_ratio
        } else {
            1.0
        }
    }
}

/// Access to the displays and their pixels.
///
/// `capture_region` takes a rectangle in logical desktop coordinates and
/// returns the pixels at the devices' native resolution.
pub trait DisplayService {
    fn list_displays(&self) -> DesktopResult<Vec<DisplayInfo>>;

    fn capture_region(&self, region: Rect) -> DesktopResult<RgbaImage>;
}

/// Union of all display geometries
pub fn desktop_bounds(displays: &[DisplayInfo]) -> Option<Rect> {
    displays
        .iter()
        .map(|d| d.geometry)
        .filter(|g| !g.is_empty())
        .reduce(|acc, g| acc.union(&g))
}

pub fn primary_display(displays: &[DisplayInfo]) -> Option<&DisplayInfo> {
    displays.iter().find(|d| d.is_primary)
}

/// Physical pixels per logical unit for a display `logical` units wide
/// showing `physical` pixels. 1.0 when either side is unknown.
pub fn scale_between(physical: u32, logical: u32) -> f64 {
    if physical == 0 || logical == 0 {
        return 1.0;
    }
    physical as f64 / logical as f64
}
