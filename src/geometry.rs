//! Plane geometry for detected document outlines.
//!
//! Everything in here is a pure value type. Quads are never mutated in
//! place; transforms produce new quads.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    /// Swap the axes. Sensor frames arrive landscape; the display is portrait.
    pub fn transposed(&self) -> Self {
        Self {
            width: self.height,
            height: self.width,
        }
    }
}

/// Axis-aligned rectangle. `origin` is the minimum corner.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub origin: Point,
    pub size: Size,
}

impl Rect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            origin: Point::new(x, y),
            size: Size::new(width, height),
        }
    }

    pub fn from_size(size: Size) -> Self {
        Self {
            origin: Point::default(),
            size,
        }
    }

    pub fn min_x(&self) -> f64 {
        self.origin.x
    }

    pub fn min_y(&self) -> f64 {
        self.origin.y
    }

    pub fn max_x(&self) -> f64 {
        self.origin.x + self.size.width
    }

    pub fn max_y(&self) -> f64 {
        self.origin.y + self.size.height
    }

    pub fn center(&self) -> Point {
        Point::new(
            self.origin.x + self.size.width / 2.0,
            self.origin.y + self.size.height / 2.0,
        )
    }

    pub fn area(&self) -> f64 {
        self.size.area()
    }

    /// Corners in top-left, top-right, bottom-right, bottom-left order.
    pub fn corners(&self) -> [Point; 4] {
        [
            Point::new(self.min_x(), self.min_y()),
            Point::new(self.max_x(), self.min_y()),
            Point::new(self.max_x(), self.max_y()),
            Point::new(self.min_x(), self.max_y()),
        ]
    }
}

/// Which coordinate system a quad's points live in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoordinateSpace {
    /// Detector output, 0..1 on both axes, origin bottom-left.
    DetectorNormalized,
    /// Frame pixels, origin top-left.
    Pixel,
    /// Presentation view points.
    Display,
}

/// Four ordered corners of a detected document.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quad {
    pub top_left: Point,
    pub top_right: Point,
    pub bottom_right: Point,
    pub bottom_left: Point,
    pub space: CoordinateSpace,
}

impl Quad {
    pub fn new(
        top_left: Point,
        top_right: Point,
        bottom_right: Point,
        bottom_left: Point,
        space: CoordinateSpace,
    ) -> Self {
        Self {
            top_left,
            top_right,
            bottom_right,
            bottom_left,
            space,
        }
    }

    pub fn from_corners(corners: [Point; 4], space: CoordinateSpace) -> Self {
        Self::new(corners[0], corners[1], corners[2], corners[3], space)
    }

    pub fn from_rect(rect: Rect, space: CoordinateSpace) -> Self {
        Self::from_corners(rect.corners(), space)
    }

    pub fn corners(&self) -> [Point; 4] {
        [
            self.top_left,
            self.top_right,
            self.bottom_right,
            self.bottom_left,
        ]
    }

    /// Apply `f` to every corner, producing a quad in `space`.
    pub fn map_points<F>(&self, space: CoordinateSpace, mut f: F) -> Self
    where
        F: FnMut(Point) -> Point,
    {
        Self::new(
            f(self.top_left),
            f(self.top_right),
            f(self.bottom_right),
            f(self.bottom_left),
            space,
        )
    }

    pub fn bounding_box(&self) -> Rect {
        bounding_box(self)
    }

    /// Interior angles at each corner, in corner order.
    pub fn interior_angles(&self) -> [f64; 4] {
        let c = self.corners();
        let mut angles = [0.0; 4];
        for (i, angle) in angles.iter_mut().enumerate() {
            let prev = c[(i + 3) % 4];
            let next = c[(i + 1) % 4];
            *angle = interior_angle(prev, c[i], next);
        }
        angles
    }

    /// Shoelace area of the polygon (not the bounding box).
    pub fn polygon_area(&self) -> f64 {
        let c = self.corners();
        let mut twice = 0.0;
        for i in 0..4 {
            let a = c[i];
            let b = c[(i + 1) % 4];
            twice += a.x * b.y - b.x * a.y;
        }
        twice.abs() / 2.0
    }

    /// Four distinct corners, and neither pair of opposite edges crosses.
    pub fn is_valid(&self) -> bool {
        let c = self.corners();
        for i in 0..4 {
            for j in (i + 1)..4 {
                if c[i] == c[j] {
                    return false;
                }
            }
        }
        !segments_cross(c[0], c[1], c[2], c[3]) && !segments_cross(c[1], c[2], c[3], c[0])
    }
}

/// Min/max over the four corners. Degenerate quads give a zero-size rect.
pub fn bounding_box(quad: &Quad) -> Rect {
    let corners = quad.corners();
    let mut min_x = f64::INFINITY;
    let mut min_y = f64::INFINITY;
    let mut max_x = f64::NEG_INFINITY;
    let mut max_y = f64::NEG_INFINITY;
    for p in corners {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }
    Rect::new(min_x, min_y, max_x - min_x, max_y - min_y)
}

/// Angle at `vertex` between the edges to `p1` and `p2`, in degrees within [0, 180].
pub fn interior_angle(p1: Point, vertex: Point, p2: Point) -> f64 {
    let v1 = (p1.x - vertex.x, p1.y - vertex.y);
    let v2 = (p2.x - vertex.x, p2.y - vertex.y);
    let cross = v1.0 * v2.1 - v1.1 * v2.0;
    let dot = v1.0 * v2.0 + v1.1 * v2.1;
    cross.atan2(dot).to_degrees().abs()
}

fn orientation(a: Point, b: Point, c: Point) -> f64 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

// Proper crossing only; touching endpoints do not count.
fn segments_cross(a: Point, b: Point, c: Point, d: Point) -> bool {
    let o1 = orientation(a, b, c);
    let o2 = orientation(a, b, d);
    let o3 = orientation(c, d, a);
    let o4 = orientation(c, d, b);
    o1 * o2 < 0.0 && o3 * o4 < 0.0
}
