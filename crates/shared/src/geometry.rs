//! Axis-aligned zone rectangles in natural image pixel space.
//!
//! Every `ZoneRect` satisfies `x0 >= 0`, `y0 >= 0`, `x1 - x0 >= MIN_ZONE_SIZE`
//! and `y1 - y0 >= MIN_ZONE_SIZE`. Move and resize never fail; they clamp.

use serde::{Deserialize, Serialize};

/// Minimum width and height of a zone, in natural pixels.
pub const MIN_ZONE_SIZE: i32 = 20;

/// Largest top-left coordinate that still leaves room for `MIN_ZONE_SIZE`.
const MAX_ORIGIN: i32 = i32::MAX - MIN_ZONE_SIZE;

/// Resize grip on a selected zone. Each handle owns one or two edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResizeHandle {
    N,
    S,
    E,
    W,
    Ne,
    Nw,
    Se,
    Sw,
}

impl ResizeHandle {
    pub const ALL: [ResizeHandle; 8] = [
        ResizeHandle::Nw,
        ResizeHandle::N,
        ResizeHandle::Ne,
        ResizeHandle::E,
        ResizeHandle::Se,
        ResizeHandle::S,
        ResizeHandle::Sw,
        ResizeHandle::W,
    ];

    pub fn owns_left(self) -> bool {
        matches!(self, ResizeHandle::W | ResizeHandle::Nw | ResizeHandle::Sw)
    }

    pub fn owns_right(self) -> bool {
        matches!(self, ResizeHandle::E | ResizeHandle::Ne | ResizeHandle::Se)
    }

    pub fn owns_top(self) -> bool {
        matches!(self, ResizeHandle::N | ResizeHandle::Ne | ResizeHandle::Nw)
    }

    pub fn owns_bottom(self) -> bool {
        matches!(self, ResizeHandle::S | ResizeHandle::Se | ResizeHandle::Sw)
    }

    pub fn is_corner(self) -> bool {
        matches!(
            self,
            ResizeHandle::Ne | ResizeHandle::Nw | ResizeHandle::Se | ResizeHandle::Sw
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ResizeHandle::N => "n",
            ResizeHandle::S => "s",
            ResizeHandle::E => "e",
            ResizeHandle::W => "w",
            ResizeHandle::Ne => "ne",
            ResizeHandle::Nw => "nw",
            ResizeHandle::Se => "se",
            ResizeHandle::Sw => "sw",
        }
    }
}

/// Wire shape of a rectangle. Accepts the legacy `Xstart/Ystart/Xend/Yend`
/// column names as well.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct RawZoneRect {
    #[serde(alias = "Xstart")]
    x0: i32,
    #[serde(alias = "Ystart")]
    y0: i32,
    #[serde(alias = "Xend")]
    x1: i32,
    #[serde(alias = "Yend")]
    y1: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "RawZoneRect", into = "RawZoneRect")]
pub struct ZoneRect {
    x0: i32,
    y0: i32,
    x1: i32,
    y1: i32,
}

impl From<RawZoneRect> for ZoneRect {
    fn from(raw: RawZoneRect) -> Self {
        ZoneRect::from_corners(raw.x0, raw.y0, raw.x1, raw.y1)
    }
}

impl From<ZoneRect> for RawZoneRect {
    fn from(rect: ZoneRect) -> Self {
        RawZoneRect {
            x0: rect.x0,
            y0: rect.y0,
            x1: rect.x1,
            y1: rect.y1,
        }
    }
}

impl ZoneRect {
    /// Builds a rectangle from any two opposite corners.
    ///
    /// Corners are ordered, negative coordinates are clamped to zero and a
    /// too-small extent grows towards the bottom-right until it reaches
    /// `MIN_ZONE_SIZE`.
    pub fn from_corners(xa: i32, ya: i32, xb: i32, yb: i32) -> Self {
        let x0 = xa.min(xb).clamp(0, MAX_ORIGIN);
        let y0 = ya.min(yb).clamp(0, MAX_ORIGIN);
        let x1 = xa.max(xb).max(x0 + MIN_ZONE_SIZE);
        let y1 = ya.max(yb).max(y0 + MIN_ZONE_SIZE);
        Self { x0, y0, x1, y1 }
    }

    /// Rectangle with its top-left corner at `(x, y)` and the given size.
    pub fn from_origin_size(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self::from_corners(x, y, x.saturating_add(width), y.saturating_add(height))
    }

    pub fn x0(&self) -> i32 {
        self.x0
    }

    pub fn y0(&self) -> i32 {
        self.y0
    }

    pub fn x1(&self) -> i32 {
        self.x1
    }

    pub fn y1(&self) -> i32 {
        self.y1
    }

    pub fn width(&self) -> i32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> i32 {
        self.y1 - self.y0
    }

    /// Inclusive on all four edges, matching how the detector tests hand
    /// positions against zones.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= f64::from(self.x0)
            && x <= f64::from(self.x1)
            && y >= f64::from(self.y0)
            && y <= f64::from(self.y1)
    }

    /// Position of a resize grip in natural pixels.
    pub fn handle_point(&self, handle: ResizeHandle) -> (f64, f64) {
        let mid_x = f64::from(self.x0) + f64::from(self.width()) / 2.0;
        let mid_y = f64::from(self.y0) + f64::from(self.height()) / 2.0;
        let x = if handle.owns_left() {
            f64::from(self.x0)
        } else if handle.owns_right() {
            f64::from(self.x1)
        } else {
            mid_x
        };
        let y = if handle.owns_top() {
            f64::from(self.y0)
        } else if handle.owns_bottom() {
            f64::from(self.y1)
        } else {
            mid_y
        };
        (x, y)
    }

    /// Pure translation. The result is shifted back so that `x0, y0 >= 0`;
    /// width and height never change.
    pub fn with_move(&self, dx: i32, dy: i32) -> Self {
        let width = self.width();
        let height = self.height();
        let x0 = self.x0.saturating_add(dx).clamp(0, i32::MAX - width);
        let y0 = self.y0.saturating_add(dy).clamp(0, i32::MAX - height);
        Self {
            x0,
            y0,
            x1: x0 + width,
            y1: y0 + height,
        }
    }

    /// Moves only the edges owned by `handle`. An edge that would bring the
    /// extent below `MIN_ZONE_SIZE` stops at `anchor ± MIN_ZONE_SIZE`, where
    /// the anchor is the opposite, undragged edge.
    pub fn with_resize(&self, handle: ResizeHandle, dx: i32, dy: i32) -> Self {
        let mut next = *self;
        if handle.owns_left() {
            next.x0 = self
                .x0
                .saturating_add(dx)
                .max(0)
                .min(self.x1 - MIN_ZONE_SIZE);
        }
        if handle.owns_right() {
            next.x1 = self
                .x1
                .saturating_add(dx)
                .max(self.x0.saturating_add(MIN_ZONE_SIZE));
        }
        if handle.owns_top() {
            next.y0 = self
                .y0
                .saturating_add(dy)
                .max(0)
                .min(self.y1 - MIN_ZONE_SIZE);
        }
        if handle.owns_bottom() {
            next.y1 = self
                .y1
                .saturating_add(dy)
                .max(self.y0.saturating_add(MIN_ZONE_SIZE));
        }
        next
    }
}

#[cfg(test)]
#[path = "tests/geometry_tests.rs"]
mod tests;
