use nalgebra::{Rotation2, Vector2};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2f {
    pub x: f32,
    pub y: f32,
}

impl Point2f {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size2f {
    pub width: f32,
    pub height: f32,
}

impl Size2f {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

/// Original-image dimension over network-input dimension, per axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScalingRatio {
    pub x: f32,
    pub y: f32,
}

impl ScalingRatio {
    /// Both axes must be strictly positive.
    pub fn new(x: f32, y: f32) -> Option<Self> {
        (x > 0.0 && y > 0.0).then_some(Self { x, y })
    }

    pub fn identity() -> Self {
        Self { x: 1.0, y: 1.0 }
    }
}

/// Axis-aligned integer bounds of a rotated rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl BoundingRect {
    /// Clamp to an image of the given dimensions. Returns `None` when nothing
    /// of the rectangle is left inside the image.
    pub fn clamp_to(&self, img_width: u32, img_height: u32) -> Option<(u32, u32, u32, u32)> {
        let x0 = self.x.max(0);
        let y0 = self.y.max(0);
        let x1 = (self.x + self.width).min(img_width as i32);
        let y1 = (self.y + self.height).min(img_height as i32);
        if x0 >= x1 || y0 >= y1 {
            return None;
        }
        Some((x0 as u32, y0 as u32, (x1 - x0) as u32, (y1 - y0) as u32))
    }
}

/// A rectangle defined by centre, size and rotation angle, as opposed to an
/// axis-aligned bounding box. The angle is in degrees, clockwise-positive in
/// image coordinates (y grows downwards).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RotatedRect {
    pub center: Point2f,
    pub size: Size2f,
    pub angle: f32,
}

impl RotatedRect {
    pub fn new(center: Point2f, size: Size2f, angle: f32) -> Self {
        Self {
            center,
            size,
            angle,
        }
    }

    /// The four corner points, starting top-left and continuing clockwise
    /// for an unrotated rectangle.
    pub fn vertices(&self) -> [Point2f; 4] {
        let rot = Rotation2::new(self.angle.to_radians());
        let w = self.size.width / 2.0;
        let h = self.size.height / 2.0;

        let corners = [(-w, -h), (w, -h), (w, h), (-w, h)];

        corners.map(|(dx, dy)| {
            let p = rot * Vector2::new(dx, dy);
            Point2f::new(self.center.x + p.x, self.center.y + p.y)
        })
    }

    pub fn bounding_rect(&self) -> BoundingRect {
        let pts = self.vertices();
        let mut min_x = f32::MAX;
        let mut max_x = f32::MIN;
        let mut min_y = f32::MAX;
        let mut max_y = f32::MIN;

        for p in &pts {
            min_x = min_x.min(p.x);
            max_x = max_x.max(p.x);
            min_y = min_y.min(p.y);
            max_y = max_y.max(p.y);
        }

        let x = min_x.floor() as i32;
        let y = min_y.floor() as i32;
        BoundingRect {
            x,
            y,
            width: max_x.ceil() as i32 - x,
            height: max_y.ceil() as i32 - y,
        }
    }

    /// Rescale from network-input coordinates to original-image coordinates.
    /// The angle is left untouched even when the axis ratios differ.
    pub fn scale(&self, ratio: &ScalingRatio) -> Self {
        Self {
            center: Point2f::new(self.center.x * ratio.x, self.center.y * ratio.y),
            size: Size2f::new(self.size.width * ratio.x, self.size.height * ratio.y),
            angle: self.angle,
        }
    }

    /// Grow the rectangle by `amount` pixels on each side. Centre and angle
    /// are unchanged.
    pub fn pad(&self, amount: i32) -> Self {
        Self {
            center: self.center,
            size: Size2f::new(
                self.size.width + 2.0 * amount as f32,
                self.size.height + 2.0 * amount as f32,
            ),
            angle: self.angle,
        }
    }

    pub fn area(&self) -> f32 {
        self.size.width * self.size.height
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(cx: f32, cy: f32, w: f32, h: f32, angle: f32) -> RotatedRect {
        RotatedRect::new(Point2f::new(cx, cy), Size2f::new(w, h), angle)
    }

    #[test]
    fn vertices_of_axis_aligned_rect() {
        let pts = rect(10.0, 20.0, 8.0, 4.0, 0.0).vertices();
        assert!((pts[0].x - 6.0).abs() < 1e-4 && (pts[0].y - 18.0).abs() < 1e-4);
        assert!((pts[1].x - 14.0).abs() < 1e-4 && (pts[1].y - 18.0).abs() < 1e-4);
        assert!((pts[2].x - 14.0).abs() < 1e-4 && (pts[2].y - 22.0).abs() < 1e-4);
        assert!((pts[3].x - 6.0).abs() < 1e-4 && (pts[3].y - 22.0).abs() < 1e-4);
    }

    #[test]
    fn vertices_rotate_clockwise_in_image_coords() {
        // 90 degrees turns the wide side vertical
        let pts = rect(0.0, 0.0, 10.0, 2.0, 90.0).vertices();
        let width_span = pts.iter().map(|p| p.x).fold(f32::MIN, f32::max)
            - pts.iter().map(|p| p.x).fold(f32::MAX, f32::min);
        let height_span = pts.iter().map(|p| p.y).fold(f32::MIN, f32::max)
            - pts.iter().map(|p| p.y).fold(f32::MAX, f32::min);
        assert!((width_span - 2.0).abs() < 1e-3);
        assert!((height_span - 10.0).abs() < 1e-3);
    }

    #[test]
    fn scale_is_linear_in_the_ratio() {
        let r = rect(5.0, 7.0, 12.0, 3.0, 30.0);
        let r1 = ScalingRatio::new(2.0, 3.0).unwrap();
        let r2 = ScalingRatio::new(0.5, 4.0).unwrap();
        let combined = ScalingRatio::new(r1.x * r2.x, r1.y * r2.y).unwrap();

        let a = r.scale(&r1).scale(&r2);
        let b = r.scale(&combined);

        assert!((a.center.x - b.center.x).abs() < 1e-4);
        assert!((a.center.y - b.center.y).abs() < 1e-4);
        assert!((a.size.width - b.size.width).abs() < 1e-4);
        assert!((a.size.height - b.size.height).abs() < 1e-4);
        assert_eq!(a.angle, b.angle);
    }

    #[test]
    fn pad_grows_both_sides_and_keeps_centre() {
        let r = rect(5.0, 7.0, 12.0, 3.0, 15.0);
        let padded = r.pad(4);
        assert_eq!(padded.size.width, 20.0);
        assert_eq!(padded.size.height, 11.0);
        assert_eq!(padded.center, r.center);
        assert_eq!(padded.angle, r.angle);
    }

    #[test]
    fn bounding_rect_covers_rotated_corners() {
        let b = rect(16.0, 16.0, 8.0, 8.0, 45.0).bounding_rect();
        // half-diagonal is sqrt(32) ~ 5.657
        assert!(b.x <= 10 && b.y <= 10);
        assert!(b.width >= 11 && b.height >= 11);
    }

    #[test]
    fn clamp_rejects_fully_outside_rect() {
        let b = BoundingRect {
            x: -20,
            y: -20,
            width: 10,
            height: 10,
        };
        assert_eq!(b.clamp_to(32, 32), None);

        let b = BoundingRect {
            x: 28,
            y: 28,
            width: 10,
            height: 10,
        };
        assert_eq!(b.clamp_to(32, 32), Some((28, 28, 4, 4)));
    }

    #[test]
    fn scaling_ratio_must_be_positive() {
        assert!(ScalingRatio::new(0.0, 1.0).is_none());
        assert!(ScalingRatio::new(1.0, -2.0).is_none());
        assert!(ScalingRatio::new(0.5, 2.0).is_some());
    }
}
