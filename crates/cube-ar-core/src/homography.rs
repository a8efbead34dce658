use crate::{sample_bilinear_u8, GrayImage, GrayImageView};
use nalgebra::{Matrix3, Point2, SMatrix, SVector, Vector3};

/// Smallest |det(H)| (after `h33 = 1` normalization) accepted as invertible.
const MIN_ABS_DET: f64 = 1e-12;
/// Smallest triangle area spanned by any three Hartley-normalized corners.
const MIN_NORMALIZED_AREA: f64 = 1e-6;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Homography {
    pub h: Matrix3<f64>,
}

impl Homography {
    pub fn new(h: Matrix3<f64>) -> Self {
        Self { h }
    }

    pub fn to_array(&self) -> [[f64; 3]; 3] {
        [
            [self.h[(0, 0)], self.h[(0, 1)], self.h[(0, 2)]],
            [self.h[(1, 0)], self.h[(1, 1)], self.h[(1, 2)]],
            [self.h[(2, 0)], self.h[(2, 1)], self.h[(2, 2)]],
        ]
    }

    #[inline]
    pub fn apply(&self, p: Point2<f32>) -> Point2<f32> {
        let q = self.apply_f64(Point2::new(p.x as f64, p.y as f64));
        Point2::new(q.x as f32, q.y as f32)
    }

    #[inline]
    pub fn apply_f64(&self, p: Point2<f64>) -> Point2<f64> {
        let v = self.h * Vector3::new(p.x, p.y, 1.0);
        let w = v[2];
        Point2::new(v[0] / w, v[1] / w)
    }

    pub fn inverse(&self) -> Option<Self> {
        self.h.try_inverse().map(Self::new)
    }

    /// All entries finite and the matrix is far enough from singular to be
    /// used for resampling or pose decomposition.
    pub fn is_well_conditioned(&self) -> bool {
        self.h.iter().all(|v| v.is_finite()) && self.h.determinant().abs() > MIN_ABS_DET
    }
}

fn hartley_normalization(cx: f64, cy: f64, mean_dist: f64) -> Matrix3<f64> {
    let s = if mean_dist > 1e-12 {
        (2.0_f64).sqrt() / mean_dist
    } else {
        1.0
    };

    Matrix3::<f64>::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0)
}

fn normalize_points4(pts: &[Point2<f32>; 4]) -> ([Point2<f64>; 4], Matrix3<f64>) {
    // Hartley normalization: translate to centroid, scale so mean distance = sqrt(2)
    let n = 4.0_f64;
    let mut cx = 0.0_f64;
    let mut cy = 0.0_f64;
    for p in pts {
        cx += p.x as f64;
        cy += p.y as f64;
    }
    cx /= n;
    cy /= n;

    let mut mean_dist = 0.0_f64;
    for p in pts {
        let dx = p.x as f64 - cx;
        let dy = p.y as f64 - cy;
        mean_dist += (dx * dx + dy * dy).sqrt();
    }
    mean_dist /= n;

    let t = hartley_normalization(cx, cy, mean_dist);

    let mut out = [Point2::new(0.0_f64, 0.0_f64); 4];
    for (i, p) in pts.iter().enumerate() {
        let v = t * Vector3::new(p.x as f64, p.y as f64, 1.0);
        out[i] = Point2::new(v[0], v[1]);
    }

    (out, t)
}

/// Smallest area of the four triangles formed by dropping one corner.
fn min_triangle_area(pts: &[Point2<f64>; 4]) -> f64 {
    let area = |a: Point2<f64>, b: Point2<f64>, c: Point2<f64>| {
        0.5 * ((b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)).abs()
    };
    (0..4)
        .map(|skip| {
            let [a, b, c] = [(skip + 1) % 4, (skip + 2) % 4, (skip + 3) % 4].map(|i| pts[i]);
            area(a, b, c)
        })
        .fold(f64::INFINITY, f64::min)
}

fn normalize_homography(h: Matrix3<f64>) -> Option<Matrix3<f64>> {
    let s = h[(2, 2)];
    if s.abs() < 1e-12 {
        return None;
    }
    Some(h / s)
}

fn denormalize_homography(
    hn: Matrix3<f64>,
    t_src: Matrix3<f64>,
    t_dst: Matrix3<f64>,
) -> Option<Matrix3<f64>> {
    let t_dst_inv = t_dst.try_inverse()?;
    Some(t_dst_inv * hn * t_src)
}

/// Compute H such that: dst ~ H * src (projective), using 4 point correspondences.
/// - `src`: points in "patch" or model-plane coords
/// - `dst`: points in image coords
///
/// Corner order must be consistent between `src` and `dst`. Returns `None`
/// for degenerate configurations (three collinear or coincident points on
/// either side), which would otherwise produce non-finite entries.
pub fn homography_from_4pt(src: &[Point2<f32>; 4], dst: &[Point2<f32>; 4]) -> Option<Homography> {
    // Unknowns: [h11 h12 h13 h21 h22 h23 h31 h32], with h33 = 1
    // For each correspondence (x,y)->(u,v):
    // h11 x + h12 y + h13 - u h31 x - u h32 y = u
    // h21 x + h22 y + h23 - v h31 x - v h32 y = v
    let (src_n, t_src) = normalize_points4(src);
    let (dst_n, t_dst) = normalize_points4(dst);
    if min_triangle_area(&src_n) < MIN_NORMALIZED_AREA
        || min_triangle_area(&dst_n) < MIN_NORMALIZED_AREA
    {
        return None;
    }

    let mut a = SMatrix::<f64, 8, 8>::zeros();
    let mut b = SVector::<f64, 8>::zeros();

    for k in 0..4 {
        let x = src_n[k].x;
        let y = src_n[k].y;
        let u = dst_n[k].x;
        let v = dst_n[k].y;

        // row 2k
        let r0 = 2 * k;
        a[(r0, 0)] = x;
        a[(r0, 1)] = y;
        a[(r0, 2)] = 1.0;
        a[(r0, 6)] = -u * x;
        a[(r0, 7)] = -u * y;
        b[r0] = u;

        // row 2k+1
        let r1 = 2 * k + 1;
        a[(r1, 3)] = x;
        a[(r1, 4)] = y;
        a[(r1, 5)] = 1.0;
        a[(r1, 6)] = -v * x;
        a[(r1, 7)] = -v * y;
        b[r1] = v;
    }

    let x = a.lu().solve(&b)?;

    let hn = Matrix3::<f64>::new(
        x[0], x[1], x[2], //
        x[3], x[4], x[5], //
        x[6], x[7], 1.0,
    );

    let h_den = denormalize_homography(hn, t_src, t_dst)?;
    let h_den = normalize_homography(h_den)?;

    let h = Homography::new(h_den);
    h.is_well_conditioned().then_some(h)
}

/// Warp into `out` (resized to `out_w × out_h`): for each dst pixel, map to
/// src via `h_img_from_rect` and sample bilinearly.
pub fn warp_perspective_gray_into(
    src: &GrayImageView<'_>,
    h_img_from_rect: &Homography,
    out_w: usize,
    out_h: usize,
    out: &mut GrayImage,
) {
    out.ensure_size(out_w, out_h);

    for y in 0..out_h {
        for x in 0..out_w {
            // sample at pixel center
            let pr = Point2::new(x as f32 + 0.5, y as f32 + 0.5);
            let pi = h_img_from_rect.apply(pr);
            out.data[y * out_w + x] = sample_bilinear_u8(src, pi.x, pi.y);
        }
    }
}

/// Allocating convenience wrapper around [`warp_perspective_gray_into`].
pub fn warp_perspective_gray(
    src: &GrayImageView<'_>,
    h_img_from_rect: &Homography,
    out_w: usize,
    out_h: usize,
) -> GrayImage {
    let mut out = GrayImage::default();
    warp_perspective_gray_into(src, h_img_from_rect, out_w, out_h, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: Point2<f32>, b: Point2<f32>, tol: f32) {
        let dx = (a.x - b.x).abs();
        let dy = (a.y - b.y).abs();
        assert!(
            dx < tol && dy < tol,
            "expected ({:.6},{:.6}) ~ ({:.6},{:.6}) within {}",
            a.x,
            a.y,
            b.x,
            b.y,
            tol
        );
    }

    #[test]
    fn inverse_round_trips_points() {
        let h = Homography::new(Matrix3::new(
            1.2, 0.1, 5.0, //
            -0.05, 0.9, 3.0, //
            0.001, 0.0005, 1.0,
        ));
        let inv = h.inverse().expect("invertible");

        for p in [
            Point2::new(0.0_f32, 0.0),
            Point2::new(50.0_f32, -20.0),
            Point2::new(320.0_f32, 200.0),
        ] {
            let q = h.apply(p);
            let back = inv.apply(q);
            assert_close(back, p, 1e-3);
        }
    }

    #[test]
    fn four_point_specialization_recovers_h() {
        let ground_truth = Homography::new(Matrix3::new(
            0.8, 0.05, 120.0, //
            -0.02, 1.1, 80.0, //
            0.0009, -0.0004, 1.0,
        ));

        let rect = [
            Point2::new(0.0_f32, 0.0),
            Point2::new(180.0_f32, 0.0),
            Point2::new(180.0_f32, 130.0),
            Point2::new(0.0_f32, 130.0),
        ];
        let dst = rect.map(|p| ground_truth.apply(p));

        let recovered = homography_from_4pt(&rect, &dst).expect("recoverable");

        for p in [
            Point2::new(0.0_f32, 0.0),
            Point2::new(60.0, 40.0),
            Point2::new(150.0, 120.0),
        ] {
            assert_close(recovered.apply(p), ground_truth.apply(p), 1e-3);
        }
    }

    #[test]
    fn collinear_corners_are_rejected() {
        let rect = [
            Point2::new(0.0_f32, 0.0),
            Point2::new(60.0_f32, 0.0),
            Point2::new(60.0_f32, 60.0),
            Point2::new(0.0_f32, 60.0),
        ];
        let collinear = [
            Point2::new(10.0_f32, 10.0),
            Point2::new(20.0_f32, 20.0),
            Point2::new(30.0_f32, 30.0),
            Point2::new(40.0_f32, 40.0),
        ];
        assert!(homography_from_4pt(&rect, &collinear).is_none());

        let coincident = [Point2::new(5.0_f32, 5.0); 4];
        assert!(homography_from_4pt(&rect, &coincident).is_none());
    }

    #[test]
    fn warp_identity_copies_pixels() {
        let src = GrayImage {
            width: 4,
            height: 4,
            data: (0..16).map(|v| v as u8 * 10).collect(),
        };
        // Rect pixel centers (x+0.5) land on source pixel centers (x).
        let h = Homography::new(Matrix3::new(
            1.0, 0.0, -0.5, //
            0.0, 1.0, -0.5, //
            0.0, 0.0, 1.0,
        ));
        let out = warp_perspective_gray(&src.view(), &h, 3, 3);
        assert_eq!(out.width, 3);
        assert_eq!(out.get(1, 2), src.get(1, 2));
        assert_eq!(out.get(2, 0), src.get(2, 0));
    }
}
