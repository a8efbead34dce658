//! Ray-cast rendering of a marker at a known pose.
//!
//! Used by tests and demos to produce frames with exact ground truth.

use crate::pose::Pose;
use cube_ar_core::CameraIntrinsics;
use cube_ar_marker::MarkerPattern;
use nalgebra::Vector3;

/// A pinhole view of one printed marker.
#[derive(Clone, Debug)]
pub struct SyntheticScene {
    pub width: usize,
    pub height: usize,
    pub intrinsics: CameraIntrinsics,
    pub pattern: MarkerPattern,
    /// Side length of the bordered marker grid, in the unit of `pose`.
    pub marker_side: f64,
    pub pose: Pose,
    /// White margin around the grid, in cells.
    pub quiet_zone_cells: f64,
    pub ink: u8,
    pub paper: u8,
    pub background: u8,
    /// Sub-samples per pixel axis for anti-aliasing.
    pub supersample: usize,
}

impl SyntheticScene {
    /// Marker facing the camera at distance `distance` along the optical
    /// axis.
    pub fn face_on(
        width: usize,
        height: usize,
        intrinsics: CameraIntrinsics,
        marker_side: f64,
        distance: f64,
    ) -> Self {
        Self {
            width,
            height,
            intrinsics,
            pattern: MarkerPattern::default(),
            marker_side,
            pose: Pose {
                rotation: nalgebra::Matrix3::identity(),
                translation: Vector3::new(0.0, 0.0, distance),
            },
            quiet_zone_cells: 1.0,
            ink: 20,
            paper: 235,
            background: 190,
            supersample: 4,
        }
    }

    /// Intensity seen along the ray through pixel coordinates `(u, v)`.
    fn shade(&self, u: f64, v: f64) -> f64 {
        let k = &self.intrinsics;
        let ray = Vector3::new((u - k.cx) / k.fx, (v - k.cy) / k.fy, 1.0);
        let normal = self.pose.rotation.column(2).into_owned();
        let t = self.pose.translation;
        let denom = normal.dot(&ray);
        if denom.abs() < 1e-12 {
            return self.background as f64;
        }
        let lambda = normal.dot(&t) / denom;
        if lambda <= 0.0 {
            return self.background as f64;
        }
        let local = self.pose.rotation.transpose() * (ray * lambda - t);

        let cells = self.pattern.grid_cells() as f64;
        let gx = (local.x / self.marker_side + 0.5) * cells;
        let gy = (local.y / self.marker_side + 0.5) * cells;
        let q = self.quiet_zone_cells;
        if gx < -q || gy < -q || gx >= cells + q || gy >= cells + q {
            return self.background as f64;
        }
        if gx < 0.0 || gy < 0.0 || gx >= cells || gy >= cells {
            return self.paper as f64;
        }
        if self.pattern.grid_cell_is_black(gx as usize, gy as usize) {
            self.ink as f64
        } else {
            self.paper as f64
        }
    }

    /// Render to a packed grayscale buffer.
    pub fn render_gray(&self) -> Vec<u8> {
        let s = self.supersample.max(1);
        let inv = 1.0 / s as f64;
        let mut out = Vec::with_capacity(self.width * self.height);
        for y in 0..self.height {
            for x in 0..self.width {
                let mut acc = 0.0;
                for sy in 0..s {
                    for sx in 0..s {
                        let u = x as f64 - 0.5 + (sx as f64 + 0.5) * inv;
                        let v = y as f64 - 0.5 + (sy as f64 + 0.5) * inv;
                        acc += self.shade(u, v);
                    }
                }
                out.push((acc * inv * inv).round().clamp(0.0, 255.0) as u8);
            }
        }
        out
    }

    /// Render to a packed BGR buffer (gray replicated in all channels).
    pub fn render_bgr(&self) -> Vec<u8> {
        self.render_gray()
            .into_iter()
            .flat_map(|v| [v, v, v])
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn face_on_marker_covers_expected_pixels() {
        let k = CameraIntrinsics::new(1000.0, 1000.0, 49.5, 49.5);
        // 0.06 m at 1 m with f = 1000 spans 60 px: pixels 20..=79.
        let scene = SyntheticScene::face_on(100, 100, k, 0.06, 1.0);
        let gray = scene.render_gray();
        let at = |x: usize, y: usize| gray[y * 100 + x];
        assert_eq!(at(20, 20), scene.ink);
        assert_eq!(at(79, 79), scene.ink);
        assert_eq!(at(19, 50), scene.paper);
        assert_eq!(at(1, 1), scene.background);
        assert_eq!(scene.render_bgr().len(), 100 * 100 * 3);
    }
}
