//! Four-corner image polygons.

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Exactly four image-space corners.
///
/// After [`Quad::normalized`] the corners run clockwise *as seen on screen*
/// (x right, y down), starting from the corner nearest the image origin.
/// That is the order the patch sampler maps onto the canonical square
/// `(0,0) → (s,0) → (s,s) → (0,s)`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quad {
    pub corners: [Point2<f32>; 4],
}

impl Quad {
    pub fn new(corners: [Point2<f32>; 4]) -> Self {
        Self { corners }
    }

    /// Shoelace area; positive for on-screen clockwise order.
    pub fn signed_area(&self) -> f32 {
        let c = &self.corners;
        let mut acc = 0.0f64;
        for i in 0..4 {
            let a = c[i];
            let b = c[(i + 1) % 4];
            acc += a.x as f64 * b.y as f64 - b.x as f64 * a.y as f64;
        }
        (0.5 * acc) as f32
    }

    pub fn area(&self) -> f32 {
        self.signed_area().abs()
    }

    pub fn perimeter(&self) -> f32 {
        (0..4)
            .map(|i| (self.corners[(i + 1) % 4] - self.corners[i]).norm())
            .sum()
    }

    /// Strictly convex: all four turn directions share one sign and none is
    /// (near) zero.
    pub fn is_convex(&self) -> bool {
        let c = &self.corners;
        let mut sign = 0.0f32;
        for i in 0..4 {
            let a = c[i];
            let b = c[(i + 1) % 4];
            let d = c[(i + 2) % 4];
            let cross = (b.x - a.x) * (d.y - b.y) - (b.y - a.y) * (d.x - b.x);
            if cross.abs() <= f32::EPSILON {
                return false;
            }
            if sign == 0.0 {
                sign = cross.signum();
            } else if cross.signum() != sign {
                return false;
            }
        }
        true
    }

    /// On-screen clockwise order starting at the corner with the smallest
    /// `x + y` (ties broken by smaller `y`).
    pub fn normalized(&self) -> Self {
        let mut c = self.corners;
        if self.signed_area() < 0.0 {
            c.reverse();
        }
        let start = (0..4)
            .min_by(|&i, &j| {
                let ki = (c[i].x + c[i].y, c[i].y);
                let kj = (c[j].x + c[j].y, c[j].y);
                ki.partial_cmp(&kj).unwrap_or(std::cmp::Ordering::Equal)
            })
            .unwrap_or(0);
        c.rotate_left(start);
        Self { corners: c }
    }

    /// Corners re-indexed so that `out[k] = self[(k + shift) % 4]`.
    pub fn shifted(&self, shift: usize) -> Self {
        let mut c = self.corners;
        c.rotate_left(shift % 4);
        Self { corners: c }
    }

    pub fn center(&self) -> Point2<f32> {
        let mut x = 0.0;
        let mut y = 0.0;
        for p in &self.corners {
            x += p.x;
            y += p.y;
        }
        Point2::new(x * 0.25, y * 0.25)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Quad {
        Quad::new([
            Point2::new(10.0, 10.0),
            Point2::new(30.0, 10.0),
            Point2::new(30.0, 30.0),
            Point2::new(10.0, 30.0),
        ])
    }

    #[test]
    fn area_sign_follows_screen_winding() {
        let q = square();
        assert_eq!(q.signed_area(), 400.0);
        let mut rev = q.corners;
        rev.reverse();
        assert_eq!(Quad::new(rev).signed_area(), -400.0);
        assert_eq!(q.perimeter(), 80.0);
    }

    #[test]
    fn normalized_is_clockwise_from_top_left() {
        let q = square();
        let scrambled = Quad::new([q.corners[2], q.corners[1], q.corners[0], q.corners[3]]);
        let n = scrambled.normalized();
        assert_eq!(n.corners, q.corners);
        assert!(n.signed_area() > 0.0);
    }

    #[test]
    fn convexity_rejects_darts_and_degenerate_corners() {
        assert!(square().is_convex());

        let dart = Quad::new([
            Point2::new(0.0, 0.0),
            Point2::new(20.0, 10.0),
            Point2::new(40.0, 0.0),
            Point2::new(20.0, 40.0),
        ]);
        assert!(!dart.is_convex());

        let flat = Quad::new([
            Point2::new(0.0, 0.0),
            Point2::new(10.0, 0.0),
            Point2::new(20.0, 0.0),
            Point2::new(10.0, 10.0),
        ]);
        assert!(!flat.is_convex());
    }

    #[test]
    fn shifted_rotates_corner_indices() {
        let q = square();
        let s = q.shifted(1);
        assert_eq!(s.corners[0], q.corners[1]);
        assert_eq!(s.corners[3], q.corners[0]);
        assert_eq!(q.shifted(4), q);
    }
}
