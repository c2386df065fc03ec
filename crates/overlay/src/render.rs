//! Overlay compositing
//!
//! The dimmed backdrop and the clear snapshot are prepared once per snapshot,
//! in the channel order the host blits. A [`Frame`] borrows them and only
//! describes what changes between paints: the spotlight, the guides and an
//! optional notice. Text is not rasterized here; the host draws the notice.

use crate::session::{CaptureSession, Phase};
use crate::snapshot::DesktopSnapshot;
use desktop::Rect;
use image::{imageops, Pixel, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

pub const FAILURE_NOTICE: &str = "Unable to capture the screen. Press Esc to close.";

/// A dotted guide draws one pixel in every `GUIDE_DOT_PERIOD`
pub const GUIDE_DOT_PERIOD: u32 = 3;

/// Overlay colors, RGBA
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayStyle {
    /// Blended over the whole backdrop
    pub dim: [u8; 4],
    /// 1px frame around the selection
    pub border: [u8; 4],
    /// Crosshair through the pointer
    pub guide: [u8; 4],
    pub guide_dotted: bool,
    /// Background when no snapshot is available
    pub failure_fill: [u8; 4],
    pub failure_text: [u8; 4],
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            dim: [0, 0, 0, 120],
            border: [255, 0, 0, 255],
            guide: [255, 0, 0, 255],
            guide_dotted: true,
            failure_fill: [100, 100, 100, 255],
            failure_text: [255, 255, 255, 255],
        }
    }
}

/// Channel order of the cached layers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PixelOrder {
    #[default]
    Rgba,
    /// What GDI expects from a 32bpp DIB
    Bgra,
}

/// Text for the host to draw centered on the surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Notice {
    pub text: &'static str,
    pub color: [u8; 4],
}

/// Undimmed part of the frame, in physical pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Spotlight {
    pub rect: Rect,
    /// Drawn 1px outside `rect`
    pub border: [u8; 4],
}

/// Crosshair through the pointer, in physical pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Guides {
    pub x: u32,
    pub y: u32,
    pub color: [u8; 4],
    pub dotted: bool,
}

impl Guides {
    /// Whether the pixel `offset` along either line is drawn
    pub fn covers(&self, offset: u32) -> bool {
        !self.dotted || offset % GUIDE_DOT_PERIOD == 0
    }
}

/// Snapshot pixels prepared for blitting. Both images hold `order` channels,
/// whatever their type says.
pub struct Layers {
    order: PixelOrder,
    dimmed: RgbaImage,
    clear: RgbaImage,
}

impl Layers {
    fn build(snapshot: &DesktopSnapshot, dim: [u8; 4], order: PixelOrder) -> Self {
        let mut clear = snapshot.image().clone();
        let mut dimmed = clear.clone();
        let dim = Rgba(dim);
        for px in dimmed.pixels_mut() {
            px.blend(&dim);
        }

        if order == PixelOrder::Bgra {
            swap_red_blue(&mut clear);
            swap_red_blue(&mut dimmed);
        }

        Self { order, dimmed, clear }
    }

    pub fn order(&self) -> PixelOrder {
        self.order
    }

    /// Background of every frame
    pub fn dimmed(&self) -> &RgbaImage {
        &self.dimmed
    }

    /// Source of the spotlight
    pub fn clear(&self) -> &RgbaImage {
        &self.clear
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.clear.dimensions()
    }
}

/// One overlay paint
#[derive(Clone, Copy)]
pub enum Frame<'a> {
    Desktop {
        layers: &'a Layers,
        spotlight: Option<Spotlight>,
        guides: Option<Guides>,
    },
    Failure {
        width: u32,
        height: u32,
        fill: [u8; 4],
        notice: Notice,
    },
}

impl Frame<'_> {
    pub fn dimensions(&self) -> (u32, u32) {
        match *self {
            Frame::Desktop { layers, .. } => layers.dimensions(),
            Frame::Failure { width, height, .. } => (width, height),
        }
    }

    pub fn spotlight(&self) -> Option<Spotlight> {
        match *self {
            Frame::Desktop { spotlight, .. } => spotlight,
            Frame::Failure { .. } => None,
        }
    }

    pub fn guides(&self) -> Option<Guides> {
        match *self {
            Frame::Desktop { guides, .. } => guides,
            Frame::Failure { .. } => None,
        }
    }

    pub fn notice(&self) -> Option<Notice> {
        match *self {
            Frame::Desktop { .. } => None,
            Frame::Failure { notice, .. } => Some(notice),
        }
    }

    /// Flatten into a single RGBA image, notice excluded
    pub fn compose(&self) -> RgbaImage {
        let (layers, spotlight, guides) = match *self {
            Frame::Desktop {
                layers,
                spotlight,
                guides,
            } => (layers, spotlight, guides),
            Frame::Failure {
                width, height, fill, ..
            } => return RgbaImage::from_pixel(width, height, Rgba(fill)),
        };

        let mut image = layers.dimmed().clone();
        if let Some(spot) = spotlight {
            let rect = spot.rect;
            let clear = imageops::crop_imm(layers.clear(), rect.x as u32, rect.y as u32, rect.width, rect.height)
                .to_image();
            imageops::replace(&mut image, &clear, rect.x as i64, rect.y as i64);
        }
        if layers.order() == PixelOrder::Bgra {
            swap_red_blue(&mut image);
        }

        if let Some(spot) = spotlight {
            draw_border(&mut image, spot.rect, Rgba(spot.border));
        }
        if let Some(guides) = guides {
            draw_guides(&mut image, guides);
        }
        image
    }
}

/// Overlay renderer. One per session; caches the layers of the snapshot.
pub struct OverlayRenderer {
    style: OverlayStyle,
    order: PixelOrder,
    layers: Option<Layers>,
}

impl OverlayRenderer {
    pub fn new(style: OverlayStyle) -> Self {
        Self {
            style,
            order: PixelOrder::default(),
            layers: None,
        }
    }

    pub fn with_order(mut self, order: PixelOrder) -> Self {
        self.order = order;
        self.layers = None;
        self
    }

    pub fn render(&mut self, session: &CaptureSession) -> Frame<'_> {
        let style = self.style;

        let Some(snapshot) = session.snapshot() else {
            let geometry = session.geometry();
            return Frame::Failure {
                width: geometry.width().max(1),
                height: geometry.height().max(1),
                fill: style.failure_fill,
                notice: Notice {
                    text: FAILURE_NOTICE,
                    color: style.failure_text,
                },
            };
        };

        let mapping = snapshot.mapping();
        let selection = session.selection();
        let mut spotlight = None;
        let mut guides = None;

        if session.phase() == Phase::Dragging {
            // Only a selection that would be captured on release is previewed
            if selection.is_deliberate(session.options().drag_threshold) {
                let rect = mapping.map_rect(selection.rect());
                if !rect.is_empty() {
                    spotlight = Some(Spotlight {
                        rect,
                        border: style.border,
                    });
                }
            }
        } else {
            let (x, y) = mapping.map_point(selection.pointer());
            guides = Some(Guides {
                x,
                y,
                color: style.guide,
                dotted: style.guide_dotted,
            });
        }

        Frame::Desktop {
            layers: self.layers(snapshot),
            spotlight,
            guides,
        }
    }

    fn layers(&mut self, snapshot: &DesktopSnapshot) -> &Layers {
        let stale = self
            .layers
            .as_ref()
            .map_or(true, |l| l.dimensions() != snapshot.image().dimensions());

        if stale {
            self.layers = Some(Layers::build(snapshot, self.style.dim, self.order));
        }

        self.layers
            .get_or_insert_with(|| Layers::build(snapshot, self.style.dim, self.order))
    }
}

fn swap_red_blue(image: &mut RgbaImage) {
    for px in image.pixels_mut() {
        px.0.swap(0, 2);
    }
}

fn draw_guides(image: &mut RgbaImage, guides: Guides) {
    let color = Rgba(guides.color);
    for x in (0..image.width()).filter(|&x| guides.covers(x)) {
        image.get_pixel_mut(x, guides.y).blend(&color);
    }
    for y in (0..image.height()).filter(|&y| y != guides.y && guides.covers(y)) {
        image.get_pixel_mut(guides.x, y).blend(&color);
    }
}

/// 1px frame drawn just outside `rect`, clipped to the image
fn draw_border(image: &mut RgbaImage, rect: Rect, color: Rgba<u8>) {
    let left = rect.x as i64 - 1;
    let top = rect.y as i64 - 1;
    let right = rect.right() as i64;
    let bottom = rect.bottom() as i64;

    for x in left..=right {
        paint(image, x, top, color);
        paint(image, x, bottom, color);
    }
    for y in (top + 1)..bottom {
        paint(image, left, y, color);
        paint(image, right, y, color);
    }
}

fn paint(image: &mut RgbaImage, x: i64, y: i64, color: Rgba<u8>) {
    if x < 0 || y < 0 || x >= image.width() as i64 || y >= image.height() as i64 {
        return;
    }
    image.get_pixel_mut(x as u32, y as u32).blend(&color);
}
