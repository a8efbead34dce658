//! Planar pose from four ordered marker corners.
//!
//! Marker frame: origin at the marker centre, `x` toward the pattern's right
//! edge, `y` toward its bottom edge, `z = x × y` (away from a camera that
//! sees the marker face-on). Model corners are TL, TR, BR, BL:
//! `(-s/2,-s/2)`, `(s/2,-s/2)`, `(s/2,s/2)`, `(-s/2,s/2)` on `z = 0`.

use cube_ar_core::{homography_from_4pt, CameraIntrinsics};
use nalgebra::{Matrix3, Matrix4, Point2, Vector3};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// 4×4 homogeneous marker-to-camera transform, row-major: rotation in the
/// upper-left 3×3 block, translation at indices 3, 7 and 11, last row
/// `0 0 0 1`.
pub type ResultMatrix = [f32; 16];

const MIN_DEPTH: f64 = 1e-9;
const DET_TOLERANCE: f64 = 1e-6;

/// Reasons a decoded quad does not yield a usable pose.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum PoseError {
    #[error("camera intrinsics are singular")]
    SingularIntrinsics,
    #[error("marker side must be positive and finite (got {side})")]
    InvalidMarkerSide { side: f64 },
    #[error("corner homography is degenerate")]
    DegenerateHomography,
    #[error("homography scale is not usable ({scale})")]
    InvalidScale { scale: f64 },
    #[error("marker is not in front of the camera (z = {depth})")]
    BehindCamera { depth: f64 },
    #[error("recovered rotation is not proper-orthogonal (det = {det})")]
    NotARotation { det: f64 },
    #[error("viewing angle {angle_deg:.1} deg exceeds {max_deg:.1} deg")]
    ViewTooOblique { angle_deg: f64, max_deg: f64 },
}

/// Marker pose in the camera frame, in the unit of the marker side.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub rotation: Matrix3<f64>,
    pub translation: Vector3<f64>,
}

impl Pose {
    pub fn to_homogeneous(&self) -> Matrix4<f64> {
        let mut m = Matrix4::identity();
        m.fixed_view_mut::<3, 3>(0, 0).copy_from(&self.rotation);
        m.fixed_view_mut::<3, 1>(0, 3).copy_from(&self.translation);
        m
    }

    pub fn to_row_major(&self) -> ResultMatrix {
        let m = self.to_homogeneous();
        let mut out = [0.0f32; 16];
        for r in 0..4 {
            for c in 0..4 {
                out[r * 4 + c] = m[(r, c)] as f32;
            }
        }
        out
    }

    /// Transpose of [`Pose::to_row_major`], as fixed-function OpenGL loads
    /// a model-view matrix.
    pub fn to_column_major(&self) -> ResultMatrix {
        let m = self.to_homogeneous();
        let mut out = [0.0f32; 16];
        for c in 0..4 {
            for r in 0..4 {
                out[c * 4 + r] = m[(r, c)] as f32;
            }
        }
        out
    }

    /// Marker-frame point expressed in the camera frame.
    pub fn transform_point(&self, p: &Vector3<f64>) -> Vector3<f64> {
        self.rotation * p + self.translation
    }

    /// Angle in degrees between the marker normal and the line of sight to
    /// the marker centre; 0 when seen face-on.
    pub fn view_angle_deg(&self) -> f64 {
        let normal = self.rotation.column(2);
        let sight = self.translation.normalize();
        normal.dot(&sight).abs().clamp(0.0, 1.0).acos().to_degrees()
    }

    /// Largest deviation of `RᵀR` from identity.
    pub fn orthogonality_error(&self) -> f64 {
        (self.rotation.transpose() * self.rotation - Matrix3::identity()).amax()
    }
}

/// Marker-plane corner coordinates (TL, TR, BR, BL) for side length `side`.
pub fn marker_model_corners(side: f64) -> [Point2<f64>; 4] {
    let h = side * 0.5;
    [
        Point2::new(-h, -h),
        Point2::new(h, -h),
        Point2::new(h, h),
        Point2::new(-h, h),
    ]
}

/// Recover the marker pose from image corners ordered TL, TR, BR, BL.
///
/// The plane-to-image homography is estimated in normalized camera
/// coordinates so that its columns are `λ·[r1 r2 t]`. The scale is the mean
/// norm of the first two columns, the sign is chosen for positive depth, and
/// `[r1 r2 r1×r2]` is projected onto SO(3).
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip(corners, intrinsics))
)]
pub fn estimate_pose(
    corners: &[Point2<f32>; 4],
    marker_side: f64,
    intrinsics: &CameraIntrinsics,
) -> Result<Pose, PoseError> {
    if !marker_side.is_finite() || marker_side <= 0.0 {
        return Err(PoseError::InvalidMarkerSide { side: marker_side });
    }
    let k_inv = intrinsics
        .k_inverse()
        .ok_or(PoseError::SingularIntrinsics)?;

    let image = corners.map(|c| {
        let v = k_inv * Vector3::new(c.x as f64, c.y as f64, 1.0);
        Point2::new((v.x / v.z) as f32, (v.y / v.z) as f32)
    });
    let model = marker_model_corners(marker_side).map(|p| Point2::new(p.x as f32, p.y as f32));
    let h = homography_from_4pt(&model, &image)
        .ok_or(PoseError::DegenerateHomography)?
        .h;

    let h1 = h.column(0).into_owned();
    let h2 = h.column(1).into_owned();
    let h3 = h.column(2).into_owned();
    let scale = 0.5 * (h1.norm() + h2.norm());
    if !scale.is_finite() || scale <= 1e-12 {
        return Err(PoseError::InvalidScale { scale });
    }
    let mut lambda = 1.0 / scale;
    if h3.z * lambda < 0.0 {
        lambda = -lambda;
    }

    let r1 = h1 * lambda;
    let r2 = h2 * lambda;
    let translation = h3 * lambda;
    let r3 = r1.cross(&r2);
    let approx = Matrix3::from_columns(&[r1, r2, r3]);

    let rotation = project_to_so3(&approx).ok_or(PoseError::InvalidScale { scale })?;
    let det = rotation.determinant();
    if !det.is_finite() || (det - 1.0).abs() > DET_TOLERANCE {
        return Err(PoseError::NotARotation { det });
    }
    if !translation.iter().all(|v| v.is_finite()) || translation.z <= MIN_DEPTH {
        return Err(PoseError::BehindCamera {
            depth: translation.z,
        });
    }

    Ok(Pose {
        rotation,
        translation,
    })
}

/// Nearest rotation in the Frobenius sense.
fn project_to_so3(m: &Matrix3<f64>) -> Option<Matrix3<f64>> {
    let svd = m.svd(true, true);
    let u = svd.u?;
    let v_t = svd.v_t?;
    let r = u * v_t;
    if r.determinant() < 0.0 {
        let mut u_flipped = u;
        u_flipped.column_mut(2).neg_mut();
        Some(u_flipped * v_t)
    } else {
        Some(r)
    }
}

/// Image positions of the model corners under `pose`; `None` if any corner
/// is behind the camera.
pub fn project_marker_corners(
    pose: &Pose,
    marker_side: f64,
    intrinsics: &CameraIntrinsics,
) -> Option<[Point2<f64>; 4]> {
    let model = marker_model_corners(marker_side);
    let mut out = [Point2::origin(); 4];
    for (dst, m) in out.iter_mut().zip(model.iter()) {
        let p = pose.transform_point(&Vector3::new(m.x, m.y, 0.0));
        *dst = intrinsics.project(&p)?;
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{Rotation3, Vector3};

    fn camera() -> CameraIntrinsics {
        CameraIntrinsics::new(800.0, 780.0, 320.0, 240.0)
    }

    fn as_f32(c: [Point2<f64>; 4]) -> [Point2<f32>; 4] {
        c.map(|p| Point2::new(p.x as f32, p.y as f32))
    }

    fn assert_proper_rotation(r: &Matrix3<f64>) {
        assert_relative_eq!(r.determinant(), 1.0, epsilon = 1e-9);
        assert_relative_eq!(r.transpose() * r, Matrix3::identity(), epsilon = 1e-9);
    }

    #[test]
    fn projected_corners_round_trip_to_the_same_pose() {
        let side = 0.1;
        let k = camera();
        let poses = [
            (Vector3::new(0.0, 0.0, 0.0), Vector3::new(0.0, 0.0, 0.8)),
            (Vector3::new(0.3, -0.2, 0.4), Vector3::new(0.05, -0.03, 0.6)),
            (Vector3::new(-0.5, 0.1, 2.0), Vector3::new(-0.1, 0.08, 1.2)),
        ];
        for (axis_angle, t) in poses {
            let truth = Pose {
                rotation: *Rotation3::new(axis_angle).matrix(),
                translation: t,
            };
            let corners = project_marker_corners(&truth, side, &k).expect("in front");
            let est = estimate_pose(&as_f32(corners), side, &k).expect("pose");
            assert_proper_rotation(&est.rotation);
            assert_relative_eq!(est.rotation, truth.rotation, epsilon = 1e-4);
            assert_relative_eq!(est.translation, truth.translation, epsilon = 1e-5);
        }
    }

    #[test]
    fn face_on_marker_gives_identity_rotation() {
        let k = CameraIntrinsics::new(200.0 / 0.045, 200.0 / 0.045, 319.5, 239.5);
        let corners = [
            Point2::new(219.5, 139.5),
            Point2::new(419.5, 139.5),
            Point2::new(419.5, 339.5),
            Point2::new(219.5, 339.5),
        ];
        let pose = estimate_pose(&corners, 0.045, &k).expect("pose");
        assert_relative_eq!(pose.rotation, Matrix3::identity(), epsilon = 1e-6);
        assert_relative_eq!(pose.translation, Vector3::new(0.0, 0.0, 1.0), epsilon = 1e-6);
        assert!(pose.view_angle_deg() < 1e-3);
    }

    #[test]
    fn row_major_layout_puts_translation_in_last_column() {
        let pose = Pose {
            rotation: *Rotation3::from_axis_angle(&Vector3::z_axis(), 0.5).matrix(),
            translation: Vector3::new(1.0, 2.0, 3.0),
        };
        let m = pose.to_row_major();
        assert_eq!([m[3], m[7], m[11]], [1.0, 2.0, 3.0]);
        assert_eq!([m[12], m[13], m[14], m[15]], [0.0, 0.0, 0.0, 1.0]);
        assert_relative_eq!(m[1], -(0.5f64.sin()) as f32, epsilon = 1e-6);
        assert_relative_eq!(m[4], 0.5f64.sin() as f32, epsilon = 1e-6);

        let gl = pose.to_column_major();
        assert_eq!([gl[12], gl[13], gl[14]], [1.0, 2.0, 3.0]);
        for r in 0..4 {
            for c in 0..4 {
                assert_eq!(m[r * 4 + c], gl[c * 4 + r]);
            }
        }
    }

    #[test]
    fn invalid_inputs_are_unrecoverable() {
        let corners = [
            Point2::new(100.0, 100.0),
            Point2::new(200.0, 100.0),
            Point2::new(200.0, 200.0),
            Point2::new(100.0, 200.0),
        ];
        let singular = CameraIntrinsics::new(0.0, 0.0, 0.0, 0.0);
        assert_eq!(
            estimate_pose(&corners, 0.05, &singular),
            Err(PoseError::SingularIntrinsics)
        );
        assert!(matches!(
            estimate_pose(&corners, -1.0, &camera()),
            Err(PoseError::InvalidMarkerSide { .. })
        ));
        let collinear = [
            Point2::new(0.0, 0.0),
            Point2::new(10.0, 10.0),
            Point2::new(20.0, 20.0),
            Point2::new(30.0, 30.0),
        ];
        assert_eq!(
            estimate_pose(&collinear, 0.05, &camera()),
            Err(PoseError::DegenerateHomography)
        );
    }

    #[test]
    fn view_angle_grows_with_tilt() {
        let tilted = Pose {
            rotation: *Rotation3::from_axis_angle(&Vector3::y_axis(), 60f64.to_radians()).matrix(),
            translation: Vector3::new(0.0, 0.0, 1.0),
        };
        assert_relative_eq!(tilted.view_angle_deg(), 60.0, epsilon = 1e-9);
        assert!(tilted.orthogonality_error() < 1e-12);
    }
}
