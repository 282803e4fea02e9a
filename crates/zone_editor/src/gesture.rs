use std::sync::Arc;

use shared::{
    domain::ZoneId,
    geometry::{ResizeHandle, ZoneRect},
};

use crate::mapper::Point;

/// Host-side pointer listener registration (pointer-move and pointer-up).
///
/// The editor attaches exactly once when a gesture starts and detaches
/// exactly once when it ends, whichever way it ends.
pub trait PointerCapture: Send + Sync {
    fn attach(&self);
    fn detach(&self);
}

/// For hosts that deliver pointer events unconditionally.
pub struct NoopPointerCapture;

impl PointerCapture for NoopPointerCapture {
    fn attach(&self) {}

    fn detach(&self) {}
}

/// Holds the listener registration for the lifetime of one gesture.
struct CaptureScope {
    capture: Arc<dyn PointerCapture>,
}

impl CaptureScope {
    fn acquire(capture: Arc<dyn PointerCapture>) -> Self {
        capture.attach();
        Self { capture }
    }
}

impl Drop for CaptureScope {
    fn drop(&mut self) {
        self.capture.detach();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureKind {
    Move,
    Resize(ResizeHandle),
}

/// Read-only view of the gesture in progress.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GestureSnapshot {
    pub zone_id: ZoneId,
    pub kind: GestureKind,
    pub start_pointer: Point,
    pub start_rect: ZoneRect,
}

pub(crate) struct ActiveGesture {
    snapshot: GestureSnapshot,
    _scope: CaptureScope,
}

impl ActiveGesture {
    pub(crate) fn begin(
        capture: Arc<dyn PointerCapture>,
        zone_id: ZoneId,
        kind: GestureKind,
        start_pointer: Point,
        start_rect: ZoneRect,
    ) -> Self {
        Self {
            snapshot: GestureSnapshot {
                zone_id,
                kind,
                start_pointer,
                start_rect,
            },
            _scope: CaptureScope::acquire(capture),
        }
    }

    pub(crate) fn snapshot(&self) -> GestureSnapshot {
        self.snapshot
    }

    /// Geometry for a pointer displaced by `(dx, dy)` natural pixels from
    /// where the gesture began. Always derived from the start rectangle.
    pub(crate) fn apply(&self, dx: i32, dy: i32) -> ZoneRect {
        let start = self.snapshot.start_rect;
        match self.snapshot.kind {
            GestureKind::Move => start.with_move(dx, dy),
            GestureKind::Resize(handle) => start.with_resize(handle, dx, dy),
        }
    }
}
