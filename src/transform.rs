//! Detector space to display space.
//!
//! Sensor frames arrive landscape while the preview is portrait. A detected
//! quad is mapped onto the view in three fixed steps, applied to each corner
//! in order: aspect-fill scale, quarter-turn rotation, recentering
//! translation.

use std::f64::consts::FRAC_PI_2;

use crate::geometry::{CoordinateSpace, Point, Quad, Rect, Size};

/// 2-D affine transform, `x' = a*x + c*y + tx`, `y' = b*x + d*y + ty`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AffineTransform {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub tx: f64,
    pub ty: f64,
}

impl AffineTransform {
    pub const IDENTITY: AffineTransform = AffineTransform {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        tx: 0.0,
        ty: 0.0,
    };

    pub fn scale(sx: f64, sy: f64) -> Self {
        Self {
            a: sx,
            d: sy,
            ..Self::IDENTITY
        }
    }

    pub fn rotation(radians: f64) -> Self {
        let (sin, cos) = radians.sin_cos();
        Self {
            a: cos,
            b: sin,
            c: -sin,
            d: cos,
            tx: 0.0,
            ty: 0.0,
        }
    }

    pub fn translation(tx: f64, ty: f64) -> Self {
        Self {
            tx,
            ty,
            ..Self::IDENTITY
        }
    }

    /// Uniform scale that makes `from` cover `to` (aspect fill).
    pub fn aspect_fill(from: Size, to: Size) -> Self {
        let factor = (to.width / from.width).max(to.height / from.height);
        Self::scale(factor, factor)
    }

    /// Translation moving the center of `from` onto the center of `to`.
    pub fn recenter(from: &Rect, to: &Rect) -> Self {
        let a = from.center();
        let b = to.center();
        Self::translation(b.x - a.x, b.y - a.y)
    }

    pub fn apply(&self, p: Point) -> Point {
        Point::new(
            self.a * p.x + self.c * p.y + self.tx,
            self.b * p.x + self.d * p.y + self.ty,
        )
    }

    /// Linear part only, as for sizes.
    pub fn apply_to_size(&self, size: Size) -> Size {
        Size::new(
            self.a * size.width + self.c * size.height,
            self.b * size.width + self.d * size.height,
        )
    }

    /// Bounding box of the transformed rect.
    pub fn apply_to_rect(&self, rect: &Rect) -> Rect {
        let quad = Quad::from_rect(*rect, CoordinateSpace::Pixel);
        quad.map_points(CoordinateSpace::Pixel, |p| self.apply(p))
            .bounding_box()
    }
}

/// The three ordered steps mapping pixel space onto a view.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DisplayTransform {
    pub scale: AffineTransform,
    pub rotation: AffineTransform,
    pub translation: AffineTransform,
}

impl DisplayTransform {
    pub fn new(frame_size: Size, view_size: Size) -> Self {
        let portrait = frame_size.transposed();
        let scale = AffineTransform::aspect_fill(portrait, view_size);
        let scaled = scale.apply_to_size(frame_size);
        let rotation = AffineTransform::rotation(FRAC_PI_2);
        let image_bounds = rotation.apply_to_rect(&Rect::from_size(scaled));
        let translation = AffineTransform::recenter(&image_bounds, &Rect::from_size(view_size));
        Self {
            scale,
            rotation,
            translation,
        }
    }

    pub fn steps(&self) -> [AffineTransform; 3] {
        [self.scale, self.rotation, self.translation]
    }

    pub fn apply(&self, p: Point) -> Point {
        self.steps().iter().fold(p, |acc, t| t.apply(acc))
    }
}

/// Scale a detector-normalized quad to frame pixels, flipping y so the
/// origin moves from bottom-left to top-left.
pub fn to_pixel_space(quad: &Quad, frame_size: Size) -> Quad {
    quad.map_points(CoordinateSpace::Pixel, |p| {
        Point::new(p.x * frame_size.width, frame_size.height - p.y * frame_size.height)
    })
}

/// Map a detected quad (normalized or pixel) into display space. A quad
/// already in display space is returned unchanged.
pub fn compose_display_transform(quad: &Quad, frame_size: Size, view_size: Size) -> Quad {
    let pixel = match quad.space {
        CoordinateSpace::DetectorNormalized => to_pixel_space(quad, frame_size),
        CoordinateSpace::Pixel => *quad,
        CoordinateSpace::Display => return *quad,
    };
    let transform = DisplayTransform::new(frame_size, view_size);
    pixel.map_points(CoordinateSpace::Display, |p| transform.apply(p))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    const EPS: f64 = 1e-9;

    fn assert_point_eq(a: Point, b: Point) {
        assert_abs_diff_eq!(a.x, b.x, epsilon = EPS);
        assert_abs_diff_eq!(a.y, b.y, epsilon = EPS);
    }

    #[test]
    fn rotation_quarter_turn() {
        let p = AffineTransform::rotation(FRAC_PI_2).apply(Point::new(2.0, 1.0));
        assert_point_eq(p, Point::new(-1.0, 2.0));
    }

    #[test]
    fn aspect_fill_takes_larger_ratio() {
        let t = AffineTransform::aspect_fill(Size::new(100.0, 200.0), Size::new(300.0, 300.0));
        assert_eq!(t.a, 3.0);
        assert_eq!(t.d, 3.0);
    }

    #[test]
    fn full_frame_maps_onto_view_bounds() {
        let frame = Size::new(1920.0, 1080.0);
        let view = Size::new(540.0, 960.0);
        let quad = Quad::from_rect(Rect::from_size(frame), CoordinateSpace::Pixel);
        let display = compose_display_transform(&quad, frame, view);

        assert_eq!(display.space, CoordinateSpace::Display);
        let bbox = display.bounding_box();
        assert_abs_diff_eq!(bbox.min_x(), 0.0, epsilon = EPS);
        assert_abs_diff_eq!(bbox.min_y(), 0.0, epsilon = EPS);
        assert_abs_diff_eq!(bbox.max_x(), 540.0, epsilon = EPS);
        assert_abs_diff_eq!(bbox.max_y(), 960.0, epsilon = EPS);

        // Every display corner is a view corner.
        let view_corners = Rect::from_size(view).corners();
        for corner in display.corners() {
            assert!(view_corners
                .iter()
                .any(|v| (v.x - corner.x).abs() < EPS && (v.y - corner.y).abs() < EPS));
        }
    }

    #[test]
    fn sensor_top_left_lands_top_right_in_portrait() {
        let frame = Size::new(1920.0, 1080.0);
        let view = Size::new(540.0, 960.0);
        let t = DisplayTransform::new(frame, view);
        assert_point_eq(t.apply(Point::new(0.0, 0.0)), Point::new(540.0, 0.0));
        assert_point_eq(t.apply(Point::new(1920.0, 1080.0)), Point::new(0.0, 960.0));
    }

    #[test]
    fn aspect_fill_crops_mismatched_view() {
        // Portrait frame 1080x1920 into a squarer 600x800 view: fill by width.
        let frame = Size::new(1920.0, 1080.0);
        let view = Size::new(600.0, 800.0);
        let quad = Quad::from_rect(Rect::from_size(frame), CoordinateSpace::Pixel);
        let bbox = compose_display_transform(&quad, frame, view).bounding_box();
        assert_abs_diff_eq!(bbox.size.width, 600.0, epsilon = EPS);
        assert!(bbox.size.height > 800.0);
        assert_point_eq(bbox.center(), Point::new(300.0, 400.0));
    }

    #[test]
    fn normalized_quads_are_denormalized_first() {
        let frame = Size::new(1920.0, 1080.0);
        let view = Size::new(540.0, 960.0);
        let normalized = Quad::from_rect(
            Rect::new(0.0, 0.0, 1.0, 1.0),
            CoordinateSpace::DetectorNormalized,
        );
        let pixel = to_pixel_space(&normalized, frame);
        assert_point_eq(pixel.top_left, Point::new(0.0, 1080.0));
        assert_point_eq(pixel.bottom_right, Point::new(1920.0, 0.0));

        let bbox = compose_display_transform(&normalized, frame, view).bounding_box();
        assert_abs_diff_eq!(bbox.max_x(), 540.0, epsilon = EPS);
        assert_abs_diff_eq!(bbox.max_y(), 960.0, epsilon = EPS);
    }

    #[test]
    fn display_quads_pass_through() {
        let frame = Size::new(1920.0, 1080.0);
        let view = Size::new(390.0, 844.0);
        let pixel = Quad::from_rect(Rect::new(100.0, 200.0, 600.0, 400.0), CoordinateSpace::Pixel);
        let once = compose_display_transform(&pixel, frame, view);
        assert_eq!(compose_display_transform(&once, frame, view), once);
    }

    #[test]
    fn pipeline_is_reproducible() {
        let frame = Size::new(1280.0, 720.0);
        let view = Size::new(390.0, 844.0);
        let quad = Quad::new(
            Point::new(123.4, 56.7),
            Point::new(1001.2, 80.1),
            Point::new(990.0, 650.5),
            Point::new(140.3, 640.0),
            CoordinateSpace::Pixel,
        );
        let a = compose_display_transform(&quad, frame, view);
        let b = compose_display_transform(&quad, frame, view);
        assert_eq!(a, b);
    }
}
