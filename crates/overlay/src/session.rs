//! One capture session: snapshot, drag, crop or cancel
//!
//! The session is driven by the host's event loop through [`CaptureSession::handle`]
//! and emits exactly one [`CaptureOutcome`] on its channel.

use crate::{
    render::OverlayStyle,
    selection::{SelectionState, DRAG_THRESHOLD},
    snapshot::{DesktopGeometry, DesktopSnapshot},
    CancelReason, CaptureOutcome, CapturedRegion, OverlayError,
};
use crossbeam_channel::{Sender, TrySendError};
use desktop::{DisplayService, Point};
use serde::{Deserialize, Serialize};

/// Per-session tunables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayOptions {
    /// Logical units the pointer must travel before a press counts as a drag.
    /// 0 accepts any non-empty rectangle.
    pub drag_threshold: u32,
    pub style: OverlayStyle,
}

impl Default for OverlayOptions {
    fn default() -> Self {
        Self {
            drag_threshold: DRAG_THRESHOLD,
            style: OverlayStyle::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Dragging,
    Completed,
    Cancelled,
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Completed | Phase::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerButton {
    Primary,
    Secondary,
    Middle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Escape,
    Other,
}

/// Input delivered by the host, positions relative to the surface origin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayEvent {
    PointerDown { position: Point, button: PointerButton },
    PointerMove { position: Point },
    PointerUp { position: Point, button: PointerButton },
    KeyDown(Key),
    /// Surface closed by the window manager
    Closed,
}

/// What the host should do after an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reaction {
    Ignored,
    Redraw,
    /// Outcome emitted; tear the surface down
    Finished,
}

pub struct CaptureSession {
    geometry: DesktopGeometry,
    snapshot: Option<DesktopSnapshot>,
    selection: SelectionState,
    phase: Phase,
    options: OverlayOptions,
    outcome_tx: Sender<CaptureOutcome>,
    deferred: Option<CancelReason>,
}

impl CaptureSession {
    /// Enumerate displays and snapshot the desktop.
    ///
    /// Never fails: when no snapshot can be taken the session is created
    /// non-interactive with a cancellation pending, which the host delivers
    /// with [`dispatch_deferred`](Self::dispatch_deferred) once construction
    /// is over. Callers can check [`has_snapshot`](Self::has_snapshot) right
    /// away.
    pub fn new(service: &dyn DisplayService, options: OverlayOptions, outcome_tx: Sender<CaptureOutcome>) -> Self {
        let geometry = service
            .list_displays()
            .map_err(OverlayError::from)
            .and_then(|displays| DesktopGeometry::from_displays(&displays));

        let (geometry, snapshot) = match geometry {
            Ok(geometry) => match DesktopSnapshot::acquire(service, &geometry) {
                Ok(snapshot) => {
                    log::info!(
                        "Captured desktop {:?} as {}x{} (ratio {})",
                        geometry.bounds(),
                        snapshot.width(),
                        snapshot.height(),
                        geometry.pixel_ratio()
                    );
                    (geometry, Some(snapshot))
                }
                Err(err) => {
                    log::warn!("Desktop snapshot failed: {}", err);
                    (geometry, None)
                }
            },
            Err(err) => {
                log::warn!("Display enumeration failed: {}", err);
                (DesktopGeometry::default(), None)
            }
        };

        let deferred = snapshot.is_none().then_some(CancelReason::CaptureUnavailable);

        Self {
            geometry,
            snapshot,
            selection: SelectionState::new(),
            phase: Phase::Idle,
            options,
            outcome_tx,
            deferred,
        }
    }

    pub fn geometry(&self) -> &DesktopGeometry {
        &self.geometry
    }

    pub fn snapshot(&self) -> Option<&DesktopSnapshot> {
        self.snapshot.as_ref()
    }

    pub fn has_snapshot(&self) -> bool {
        self.snapshot.is_some()
    }

    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    pub fn options(&self) -> &OverlayOptions {
        &self.options
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_finished(&self) -> bool {
        self.phase.is_terminal()
    }

    /// Whether the surface should be shown and accept input
    pub fn is_interactive(&self) -> bool {
        !self.phase.is_terminal() && self.deferred.is_none() && self.snapshot.is_some()
    }

    /// Deliver the cancellation scheduled during construction, if any.
    pub fn dispatch_deferred(&mut self) -> Reaction {
        match self.deferred.take() {
            Some(reason) => self.cancel(reason),
            None => Reaction::Ignored,
        }
    }

    /// The host can no longer run the surface. Delivers a pending failure,
    /// otherwise cancels as closed; a finished session is left alone.
    pub fn abandon(&mut self) -> Reaction {
        match self.deferred.take() {
            Some(reason) => self.cancel(reason),
            None => self.cancel(CancelReason::SurfaceClosed),
        }
    }

    /// Drop the snapshot mid-session, e.g. after a display change.
    /// A drag released afterwards is cancelled.
    pub fn invalidate_snapshot(&mut self) -> Reaction {
        if self.phase.is_terminal() || self.snapshot.is_none() {
            return Reaction::Ignored;
        }

        log::warn!("Desktop snapshot invalidated during selection");
        self.snapshot = None;
        Reaction::Redraw
    }

    pub fn handle(&mut self, event: OverlayEvent) -> Reaction {
        if self.phase.is_terminal() {
            return Reaction::Ignored;
        }

        match event {
            OverlayEvent::KeyDown(Key::Escape) => self.cancel(CancelReason::Escape),
            OverlayEvent::KeyDown(Key::Other) => Reaction::Ignored,
            OverlayEvent::Closed => self.cancel(CancelReason::SurfaceClosed),

            // Not interactive until the pending failure is delivered
            _ if self.deferred.is_some() => Reaction::Ignored,

            OverlayEvent::PointerDown {
                position,
                button: PointerButton::Primary,
            } => {
                if self.phase != Phase::Idle || self.snapshot.is_none() {
                    return Reaction::Ignored;
                }
                let at = self.clamp(position);
                self.selection.begin(at);
                self.phase = Phase::Dragging;
                log::debug!("Drag started at {:?}", at);
                Reaction::Redraw
            }

            OverlayEvent::PointerMove { position } => {
                let at = self.clamp(position);
                self.selection.update(at, self.options.drag_threshold);
                Reaction::Redraw
            }

            OverlayEvent::PointerUp {
                position,
                button: PointerButton::Primary,
            } if self.phase == Phase::Dragging => {
                let at = self.clamp(position);
                self.release(at)
            }

            _ => Reaction::Ignored,
        }
    }

    fn release(&mut self, at: Point) -> Reaction {
        let threshold = self.options.drag_threshold;
        let rect = self.selection.finish(at, threshold);
        let deliberate = self.selection.is_deliberate(threshold);
        let cropped = self.snapshot.as_ref().map(|snapshot| snapshot.crop(rect));

        match cropped {
            None => self.cancel(CancelReason::SnapshotLost),
            Some(_) if !deliberate => {
                log::debug!("Selection {:?} too small, cancelling", rect);
                self.cancel(CancelReason::DegenerateSelection)
            }
            Some(None) => self.cancel(CancelReason::DegenerateSelection),
            Some(Some((physical, image))) => {
                let region = CapturedRegion {
                    image,
                    logical: self.geometry.to_desktop(rect),
                    physical,
                };
                self.finish(CaptureOutcome::Captured(region))
            }
        }
    }

    fn cancel(&mut self, reason: CancelReason) -> Reaction {
        self.finish(CaptureOutcome::Cancelled(reason))
    }

    fn finish(&mut self, outcome: CaptureOutcome) -> Reaction {
        if self.phase.is_terminal() {
            return Reaction::Ignored;
        }

        self.phase = match outcome {
            CaptureOutcome::Captured(ref region) => {
                log::info!(
                    "Captured {}x{} from {:?}",
                    region.image.width(),
                    region.image.height(),
                    region.logical
                );
                Phase::Completed
            }
            CaptureOutcome::Cancelled(reason) => {
                log::info!("Capture cancelled: {:?}", reason);
                Phase::Cancelled
            }
        };

        self.deferred = None;
        self.selection.abort();
        self.snapshot = None;

        match self.outcome_tx.try_send(outcome) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => log::warn!("Outcome channel already holds a result; dropping"),
            Err(TrySendError::Disconnected(_)) => log::warn!("Outcome receiver gone; dropping result"),
        }

        Reaction::Finished
    }

    fn clamp(&self, point: Point) -> Point {
        Point::new(
            point.x.clamp(0, self.geometry.width() as i32),
            point.y.clamp(0, self.geometry.height() as i32),
        )
    }
}
