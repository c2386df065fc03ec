//! Overlay module for texsnip
//!
//! Provides the frozen-desktop overlay on which the user drags out the
//! region to capture.

pub mod mapping;
pub mod render;
pub mod selection;
pub mod session;
pub mod snapshot;
#[cfg(windows)]
pub mod window;

pub use mapping::PixelMapping;
pub use render::{Frame, Guides, Layers, Notice, OverlayRenderer, OverlayStyle, PixelOrder, Spotlight};
pub use selection::SelectionState;
pub use session::{CaptureSession, Key, OverlayEvent, OverlayOptions, Phase, PointerButton, Reaction};
pub use snapshot::{DesktopGeometry, DesktopSnapshot};
#[cfg(windows)]
pub use window::OverlayWindow;

use crossbeam_channel::{bounded, Receiver, Sender};
use desktop::{DesktopError, Rect};
use image::RgbaImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OverlayError {
    #[cfg(windows)]
    #[error("Windows API error: {0}")]
    Windows(#[from] windows::core::Error),

    #[error("Desktop error: {0}")]
    Desktop(#[from] DesktopError),

    #[error("Snapshot unavailable: {0}")]
    SnapshotUnavailable(String),
}

pub type OverlayResult<T> = Result<T, OverlayError>;

/// Pixels cut out of the desktop snapshot
#[derive(Debug, Clone)]
pub struct CapturedRegion {
    pub image: RgbaImage,
    /// Selection in logical desktop coordinates
    pub logical: Rect,
    /// Selection in snapshot pixels
    pub physical: Rect,
}

/// Why a session ended without an image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// Escape pressed
    Escape,
    /// Zero-area rectangle or a click without a real drag
    DegenerateSelection,
    /// No snapshot could be taken at session start
    CaptureUnavailable,
    /// Snapshot was invalidated while the user was selecting
    SnapshotLost,
    /// Surface closed by the window manager
    SurfaceClosed,
}

/// The single result of a capture session
#[derive(Debug, Clone)]
pub enum CaptureOutcome {
    Captured(CapturedRegion),
    Cancelled(CancelReason),
}

impl CaptureOutcome {
    pub fn is_captured(&self) -> bool {
        matches!(self, CaptureOutcome::Captured(_))
    }

    pub fn into_image(self) -> Option<RgbaImage> {
        match self {
            CaptureOutcome::Captured(region) => Some(region.image),
            CaptureOutcome::Cancelled(_) => None,
        }
    }
}

/// Channel carrying a session's outcome. One slot is enough: a session
/// sends at most once.
pub fn outcome_channel() -> (Sender<CaptureOutcome>, Receiver<CaptureOutcome>) {
    bounded(1)
}
