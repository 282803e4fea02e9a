use shared::geometry::ZoneRect;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(self, other: Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    fn is_positive(self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }
}

/// A zone overlay in rendered coordinates. Only used for drawing and hit
/// testing; never persisted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderedRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl RenderedRect {
    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.left
            && point.x <= self.right()
            && point.y >= self.top
            && point.y <= self.bottom()
    }
}

/// Converts between natural image pixels and rendered pixels.
///
/// Scale factors are `natural / rendered` per axis. Until both sizes are
/// known (zero or negative dimensions) the mapping is the identity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateMapper {
    natural: Size,
    rendered: Size,
}

impl CoordinateMapper {
    pub fn new(natural: Size, rendered: Size) -> Self {
        Self { natural, rendered }
    }

    pub fn identity(size: Size) -> Self {
        Self::new(size, size)
    }

    pub fn natural_size(&self) -> Size {
        self.natural
    }

    pub fn rendered_size(&self) -> Size {
        self.rendered
    }

    /// Called when the image is laid out again. Stored geometry is untouched.
    pub fn set_rendered_size(&mut self, rendered: Size) {
        self.rendered = rendered;
    }

    pub fn set_natural_size(&mut self, natural: Size) {
        self.natural = natural;
    }

    fn scale(&self) -> (f64, f64) {
        if self.natural.is_positive() && self.rendered.is_positive() {
            (
                self.natural.width / self.rendered.width,
                self.natural.height / self.rendered.height,
            )
        } else {
            (1.0, 1.0)
        }
    }

    pub fn to_natural(&self, point: Point) -> Point {
        let (sx, sy) = self.scale();
        Point::new(point.x * sx, point.y * sy)
    }

    pub fn to_rendered(&self, point: Point) -> Point {
        let (sx, sy) = self.scale();
        Point::new(point.x / sx, point.y / sy)
    }

    /// Natural-space pixel delta between two rendered pointer positions.
    pub fn delta_to_natural(&self, from: Point, to: Point) -> (i32, i32) {
        let a = self.to_natural(from);
        let b = self.to_natural(to);
        (round_px(b.x - a.x), round_px(b.y - a.y))
    }

    pub fn rect_to_rendered(&self, rect: &ZoneRect) -> RenderedRect {
        let top_left = self.to_rendered(Point::new(f64::from(rect.x0()), f64::from(rect.y0())));
        let bottom_right =
            self.to_rendered(Point::new(f64::from(rect.x1()), f64::from(rect.y1())));
        RenderedRect {
            left: top_left.x,
            top: top_left.y,
            width: bottom_right.x - top_left.x,
            height: bottom_right.y - top_left.y,
        }
    }

    pub fn rect_from_rendered(&self, rect: &RenderedRect) -> ZoneRect {
        let top_left = self.to_natural(Point::new(rect.left, rect.top));
        let bottom_right = self.to_natural(Point::new(rect.right(), rect.bottom()));
        ZoneRect::from_corners(
            round_px(top_left.x),
            round_px(top_left.y),
            round_px(bottom_right.x),
            round_px(bottom_right.y),
        )
    }

    /// Natural image bounds in whole pixels, when known.
    pub fn natural_bounds(&self) -> Option<(i32, i32)> {
        self.natural
            .is_positive()
            .then(|| (round_px(self.natural.width), round_px(self.natural.height)))
    }
}

fn round_px(value: f64) -> i32 {
    // `as` saturates on overflow and maps NaN to zero.
    value.round() as i32
}

#[cfg(test)]
#[path = "tests/mapper_tests.rs"]
mod tests;
