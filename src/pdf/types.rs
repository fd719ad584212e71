//! Page geometry in the PDF engine's space: origin top-left, y grows down,
//! units are PDF points.

use serde::Serialize;

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct Rect {
    /// Left edge X coordinate
    pub x0: f32,
    /// Top edge Y coordinate
    pub y0: f32,
    /// Right edge X coordinate
    pub x1: f32,
    /// Bottom edge Y coordinate
    pub y1: f32,
}

impl Rect {
    pub const fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }

    pub fn center(&self) -> Point {
        Point::new((self.x0 + self.x1) / 2.0, (self.y0 + self.y1) / 2.0)
    }

    /// Half-open containment: the right and bottom edges are outside.
    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x0 && p.x < self.x1 && p.y >= self.y0 && p.y < self.y1
    }

    pub fn union(&self, other: &Rect) -> Rect {
        Rect::new(
            self.x0.min(other.x0),
            self.y0.min(other.y0),
            self.x1.max(other.x1),
            self.y1.max(other.y1),
        )
    }
}

/// Four-corner region covering one matched run of text.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct Quad {
    pub ul: Point,
    pub ur: Point,
    pub ll: Point,
    pub lr: Point,
}

impl Quad {
    pub const fn new(ul: Point, ur: Point, ll: Point, lr: Point) -> Self {
        Self { ul, ur, ll, lr }
    }

    /// Quad with the same corners as an upright rectangle.
    pub const fn from_rect(r: Rect) -> Self {
        Self {
            ul: Point::new(r.x0, r.y0),
            ur: Point::new(r.x1, r.y0),
            ll: Point::new(r.x0, r.y1),
            lr: Point::new(r.x1, r.y1),
        }
    }

    /// Smallest rectangle enclosing all four corners.
    pub fn rect(&self) -> Rect {
        let xs = [self.ul.x, self.ur.x, self.ll.x, self.lr.x];
        let ys = [self.ul.y, self.ur.y, self.ll.y, self.lr.y];
        Rect::new(
            xs.into_iter().fold(f32::INFINITY, f32::min),
            ys.into_iter().fold(f32::INFINITY, f32::min),
            xs.into_iter().fold(f32::NEG_INFINITY, f32::max),
            ys.into_iter().fold(f32::NEG_INFINITY, f32::max),
        )
    }

    /// Shrink vertically by `fraction` of the quad's height on each side, so
    /// a highlight does not bleed into neighbouring lines.
    pub fn slimmed(&self, fraction: f32) -> Quad {
        let trim = (self.ll.y - self.ul.y) * fraction;
        Quad {
            ul: Point::new(self.ul.x, self.ul.y + trim),
            ur: Point::new(self.ur.x, self.ur.y + trim),
            ll: Point::new(self.ll.x, self.ll.y - trim),
            lr: Point::new(self.lr.x, self.lr.y - trim),
        }
    }
}

#[cfg(feature = "pdf")]
impl From<&mupdf::Quad> for Quad {
    fn from(q: &mupdf::Quad) -> Self {
        Quad::new(
            Point::new(q.ul.x, q.ul.y),
            Point::new(q.ur.x, q.ur.y),
            Point::new(q.ll.x, q.ll.y),
            Point::new(q.lr.x, q.lr.y),
        )
    }
}
