//! Pinhole camera intrinsics.

use nalgebra::{Matrix3, Point2, Vector3};
use serde::{Deserialize, Serialize};

/// Ideal pinhole intrinsics (no distortion, zero skew).
///
/// Pixel coordinates follow the sampling convention used throughout the
/// workspace: integer coordinates are pixel centers.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CameraIntrinsics {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
}

impl CameraIntrinsics {
    pub fn new(fx: f64, fy: f64, cx: f64, cy: f64) -> Self {
        Self { fx, fy, cx, cy }
    }

    /// Square-pixel camera with the principal point at the image center and
    /// the given vertical field of view in degrees.
    pub fn from_vertical_fov(width: usize, height: usize, fov_y_deg: f64) -> Self {
        let half = (fov_y_deg.to_radians() * 0.5).tan();
        let f = if half > 0.0 {
            height as f64 * 0.5 / half
        } else {
            0.0
        };
        Self {
            fx: f,
            fy: f,
            cx: (width as f64 - 1.0) * 0.5,
            cy: (height as f64 - 1.0) * 0.5,
        }
    }

    pub fn k_matrix(&self) -> Matrix3<f64> {
        Matrix3::new(
            self.fx, 0.0, self.cx, //
            0.0, self.fy, self.cy, //
            0.0, 0.0, 1.0,
        )
    }

    /// `K^{-1}`, or `None` if the focal lengths are zero / non-finite.
    pub fn k_inverse(&self) -> Option<Matrix3<f64>> {
        if !self.is_valid() {
            return None;
        }
        self.k_matrix().try_inverse()
    }

    pub fn is_valid(&self) -> bool {
        [self.fx, self.fy, self.cx, self.cy]
            .iter()
            .all(|v| v.is_finite())
            && self.fx.abs() > f64::EPSILON
            && self.fy.abs() > f64::EPSILON
    }

    /// Project a camera-space point; `None` when it lies on or behind the
    /// image plane.
    pub fn project(&self, p: &Vector3<f64>) -> Option<Point2<f64>> {
        if p.z <= f64::EPSILON {
            return None;
        }
        Some(Point2::new(
            self.fx * p.x / p.z + self.cx,
            self.fy * p.y / p.z + self.cy,
        ))
    }

    /// Unit-depth ray through a pixel.
    pub fn unproject(&self, p: Point2<f64>) -> Vector3<f64> {
        Vector3::new((p.x - self.cx) / self.fx, (p.y - self.cy) / self.fy, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn fov_constructor_matches_pinhole_geometry() {
        let k = CameraIntrinsics::from_vertical_fov(640, 480, 30.0);
        let expected = 240.0 / (15.0_f64).to_radians().tan();
        assert_relative_eq!(k.fy, expected, epsilon = 1e-9);
        assert_relative_eq!(k.fx, k.fy);
        assert_relative_eq!(k.cx, 319.5);
        assert_relative_eq!(k.cy, 239.5);
    }

    #[test]
    fn project_and_unproject_are_inverse() {
        let k = CameraIntrinsics::new(800.0, 780.0, 320.0, 240.0);
        let p = Vector3::new(0.1, -0.2, 2.0);
        let px = k.project(&p).expect("in front");
        let ray = k.unproject(px) * p.z;
        assert_relative_eq!(ray, p, epsilon = 1e-12);
        assert!(k.project(&Vector3::new(0.0, 0.0, -1.0)).is_none());
    }

    #[test]
    fn singular_intrinsics_have_no_inverse() {
        assert!(CameraIntrinsics::new(0.0, 500.0, 1.0, 1.0)
            .k_inverse()
            .is_none());
        assert!(CameraIntrinsics::new(f64::NAN, 500.0, 1.0, 1.0)
            .k_inverse()
            .is_none());
        assert!(CameraIntrinsics::new(500.0, 500.0, 1.0, 1.0)
            .k_inverse()
            .is_some());
    }
}
