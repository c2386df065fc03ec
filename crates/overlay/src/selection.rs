//! Selection logic for drag-to-select

use desktop::{Point, Rect};

/// Movement (logical units, either axis) that turns a press into a drag
pub const DRAG_THRESHOLD: u32 = 4;

/// Pointer drag state in surface-relative logical coordinates.
///
/// While no drag is in progress `end` simply follows the pointer, which is
/// where the crosshair guides are drawn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SelectionState {
    start: Point,
    end: Point,
    dragging: bool,
    threshold_exceeded: bool,
}

impl SelectionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a drag at `at`
    pub fn begin(&mut self, at: Point) {
        self.start = at;
        self.end = at;
        self.dragging = true;
        self.threshold_exceeded = false;
    }

    /// Move the pointer; while dragging this also grows the selection.
    pub fn update(&mut self, to: Point, threshold: u32) {
        self.end = to;

        if self.dragging && !self.threshold_exceeded {
            let dx = (to.x - self.start.x).unsigned_abs();
            let dy = (to.y - self.start.y).unsigned_abs();
            self.threshold_exceeded = dx >= threshold || dy >= threshold;
        }
    }

    /// End the drag at `at` and return the normalized selection
    pub fn finish(&mut self, at: Point, threshold: u32) -> Rect {
        self.update(at, threshold);
        self.dragging = false;
        self.rect()
    }

    /// Drop an in-progress drag, keeping the pointer position
    pub fn abort(&mut self) {
        self.dragging = false;
        self.threshold_exceeded = false;
    }

    pub fn rect(&self) -> Rect {
        Rect::from_corners(self.start, self.end)
    }

    pub fn start(&self) -> Point {
        self.start
    }

    pub fn end(&self) -> Point {
        self.end
    }

    pub fn pointer(&self) -> Point {
        self.end
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    pub fn threshold_exceeded(&self) -> bool {
        self.threshold_exceeded
    }

    /// Whether the selection is something the user meant to capture: a
    /// non-empty rectangle reached by moving at least `threshold`.
    pub fn is_deliberate(&self, threshold: u32) -> bool {
        !self.rect().is_empty() && (threshold == 0 || self.threshold_exceeded)
    }
}
