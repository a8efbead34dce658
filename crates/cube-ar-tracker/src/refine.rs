//! Sub-pixel quad refinement from perpendicular intensity profiles.
//!
//! Each edge of the raw quad is probed at evenly spaced stations. At every
//! station a short profile is sampled across the edge, the strongest
//! gradient is located and refined with a parabola fit, a line is fitted
//! through the refined edge points, and adjacent lines are intersected to
//! obtain the new corners.

use cube_ar_core::{sample_bilinear_clamped, GrayImageView, Quad};
use nalgebra::{Point2, Vector2};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeRefineParams {
    /// Profiles sampled per edge.
    pub stripe_count: usize,
    /// Profile half length in pixels, on each side of the raw edge.
    pub search_half_width_px: f32,
    /// Minimum absolute central-difference gradient to accept a station.
    pub min_gradient: f32,
    /// Refined corners further than this from the raw ones are rejected.
    pub max_corner_shift_px: f32,
}

impl Default for EdgeRefineParams {
    fn default() -> Self {
        Self {
            stripe_count: 12,
            search_half_width_px: 4.0,
            min_gradient: 8.0,
            max_corner_shift_px: 3.0,
        }
    }
}

/// A line through `point` along unit `dir`.
#[derive(Clone, Copy, Debug)]
struct Line {
    point: Point2<f64>,
    dir: Vector2<f64>,
}

pub(crate) const MIN_POINTS_PER_EDGE: usize = 3;

/// Upper bound on profiles per edge.
pub(crate) const MAX_STRIPE_COUNT: usize = 256;

/// Upper bound on the profile half length in pixels.
pub(crate) const MAX_SEARCH_HALF_WIDTH_PX: f32 = 32.0;

/// Refine `quad` against `gray`. Corner order is preserved.
///
/// Returns `None` when an edge has too few usable stations, two adjacent
/// edge lines are parallel, or a corner moves by more than
/// `max_corner_shift_px`; the caller then keeps the raw quad.
#[cfg_attr(feature = "tracing", instrument(level = "trace", skip(gray, quad, params)))]
pub fn refine_quad_edges(
    gray: &GrayImageView<'_>,
    quad: &Quad,
    params: &EdgeRefineParams,
) -> Option<Quad> {
    let mut lines = [None; 4];
    for (i, line) in lines.iter_mut().enumerate() {
        let a = quad.corners[i];
        let b = quad.corners[(i + 1) % 4];
        let points = edge_points(gray, a, b, params);
        if points.len() < MIN_POINTS_PER_EDGE {
            log::trace!("edge {i}: only {} refined points", points.len());
            return None;
        }
        *line = Some(fit_line(&points)?);
    }

    let mut corners = quad.corners;
    for (i, corner) in corners.iter_mut().enumerate() {
        let prev = lines[(i + 3) % 4]?;
        let next = lines[i]?;
        let p = intersect(&prev, &next)?;
        let refined = Point2::new(p.x as f32, p.y as f32);
        let shift = (refined - quad.corners[i]).norm();
        if !shift.is_finite() || shift > params.max_corner_shift_px {
            log::trace!("corner {i} moved {shift:.2}px, keeping raw quad");
            return None;
        }
        *corner = refined;
    }
    Some(Quad::new(corners))
}

/// Sub-pixel edge locations along the segment `a → b`.
fn edge_points(
    gray: &GrayImageView<'_>,
    a: Point2<f32>,
    b: Point2<f32>,
    params: &EdgeRefineParams,
) -> Vec<Point2<f64>> {
    let a = Point2::new(a.x as f64, a.y as f64);
    let b = Point2::new(b.x as f64, b.y as f64);
    let edge = b - a;
    let len = edge.norm();
    let half = params.search_half_width_px.max(2.0).round() as i32;
    // Stations closer to a corner than the profile half length would probe
    // the neighbouring edge.
    let margin = (half as f64 + 1.0) / len.max(f64::EPSILON);
    if !len.is_finite() || margin >= 0.5 || params.stripe_count == 0 {
        return Vec::new();
    }
    let dir = edge / len;
    let normal = Vector2::new(-dir.y, dir.x);

    let n = params.stripe_count;
    let mut out = Vec::with_capacity(n);
    let mut profile = Vec::with_capacity(2 * half as usize + 1);
    for k in 0..n {
        let t = margin + (1.0 - 2.0 * margin) * (k as f64 + 0.5) / n as f64;
        let station = a + edge * t;

        profile.clear();
        for s in -half..=half {
            let p = station + normal * s as f64;
            profile.push(sample_bilinear_clamped(gray, p.x as f32, p.y as f32));
        }
        if let Some(offset) = strongest_step(&profile, params.min_gradient) {
            out.push(station + normal * (offset - half as f64));
        }
    }
    out
}

/// Sub-pixel index of the strongest central-difference gradient in
/// `profile`, or `None` if it is weaker than `min_gradient` or sits at the
/// profile ends.
fn strongest_step(profile: &[f32], min_gradient: f32) -> Option<f64> {
    if profile.len() < 5 {
        return None;
    }
    let grad = |i: usize| ((profile[i + 1] - profile[i - 1]) * 0.5).abs();
    let (best, mag) = (1..profile.len() - 1)
        .map(|i| (i, grad(i)))
        .max_by(|l, r| l.1.total_cmp(&r.1))?;
    if mag < min_gradient || best < 2 || best + 2 >= profile.len() {
        return None;
    }
    let l = grad(best - 1) as f64;
    let c = mag as f64;
    let r = grad(best + 1) as f64;
    let denom = l - 2.0 * c + r;
    let delta = if denom.abs() > f64::EPSILON {
        (0.5 * (l - r) / denom).clamp(-0.5, 0.5)
    } else {
        0.0
    };
    Some(best as f64 + delta)
}

/// Total least squares line through `points`.
fn fit_line(points: &[Point2<f64>]) -> Option<Line> {
    let n = points.len() as f64;
    let (sx, sy) = points
        .iter()
        .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
    let mean = Point2::new(sx / n, sy / n);
    let (mut sxx, mut sxy, mut syy) = (0.0, 0.0, 0.0);
    for p in points {
        let d = *p - mean;
        sxx += d.x * d.x;
        sxy += d.x * d.y;
        syy += d.y * d.y;
    }
    if sxx + syy <= f64::EPSILON {
        return None;
    }
    // Major axis of the 2x2 scatter matrix.
    let theta = 0.5 * (2.0 * sxy).atan2(sxx - syy);
    Some(Line {
        point: mean,
        dir: Vector2::new(theta.cos(), theta.sin()),
    })
}

fn intersect(l1: &Line, l2: &Line) -> Option<Point2<f64>> {
    let cross = l1.dir.x * l2.dir.y - l1.dir.y * l2.dir.x;
    if cross.abs() < 1e-6 {
        return None;
    }
    let d = l2.point - l1.point;
    let s = (d.x * l2.dir.y - d.y * l2.dir.x) / cross;
    let p = l1.point + l1.dir * s;
    (p.x.is_finite() && p.y.is_finite()).then_some(p)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cube_ar_core::GrayImage;

    /// Dark square with exact sub-pixel edges at `[lo, hi]` on both axes,
    /// area-sampled so edge pixels carry fractional coverage.
    fn soft_square(size: usize, lo: f32, hi: f32) -> GrayImage {
        let mut img = GrayImage::filled(size, size, 230);
        let cover = |px: usize| {
            let a = px as f32 - 0.5;
            let b = px as f32 + 0.5;
            (b.min(hi) - a.max(lo)).clamp(0.0, 1.0)
        };
        for y in 0..size {
            for x in 0..size {
                let c = cover(x) * cover(y);
                img.set(x, y, (230.0 - 210.0 * c).round() as u8);
            }
        }
        img
    }

    #[test]
    fn raw_corners_snap_to_true_edges() {
        let img = soft_square(80, 19.6, 60.3);
        let raw = Quad::new([
            Point2::new(20.0, 20.0),
            Point2::new(60.0, 20.0),
            Point2::new(60.0, 60.0),
            Point2::new(20.0, 60.0),
        ]);
        let refined =
            refine_quad_edges(&img.view(), &raw, &EdgeRefineParams::default()).expect("refined");
        let expected = [(19.6, 19.6), (60.3, 19.6), (60.3, 60.3), (19.6, 60.3)];
        for (c, (ex, ey)) in refined.corners.iter().zip(expected) {
            assert!((c.x - ex).abs() < 0.1, "x {} vs {}", c.x, ex);
            assert!((c.y - ey).abs() < 0.1, "y {} vs {}", c.y, ey);
        }
    }

    #[test]
    fn flat_image_gives_up() {
        let img = GrayImage::filled(80, 80, 128);
        let raw = Quad::new([
            Point2::new(20.0, 20.0),
            Point2::new(60.0, 20.0),
            Point2::new(60.0, 60.0),
            Point2::new(20.0, 60.0),
        ]);
        assert!(refine_quad_edges(&img.view(), &raw, &EdgeRefineParams::default()).is_none());
    }

    #[test]
    fn large_corner_shift_is_rejected() {
        let img = soft_square(80, 19.6, 60.3);
        let raw = Quad::new([
            Point2::new(20.0, 20.0),
            Point2::new(60.0, 20.0),
            Point2::new(60.0, 60.0),
            Point2::new(20.0, 60.0),
        ]);
        let params = EdgeRefineParams {
            max_corner_shift_px: 0.1,
            ..EdgeRefineParams::default()
        };
        assert!(refine_quad_edges(&img.view(), &raw, &params).is_none());
    }

    #[test]
    fn parabola_peak_is_centered_on_symmetric_step() {
        let profile = [10.0, 10.0, 10.0, 110.0, 210.0, 210.0, 210.0];
        let idx = strongest_step(&profile, 5.0).expect("step");
        assert!((idx - 3.0).abs() < 1e-9);
        assert!(strongest_step(&[50.0; 7], 5.0).is_none());
    }

    #[test]
    fn parallel_lines_do_not_intersect() {
        let l1 = Line {
            point: Point2::new(0.0, 0.0),
            dir: Vector2::new(1.0, 0.0),
        };
        let l2 = Line {
            point: Point2::new(0.0, 5.0),
            dir: Vector2::new(-1.0, 0.0),
        };
        assert!(intersect(&l1, &l2).is_none());
        let l3 = Line {
            point: Point2::new(3.0, 7.0),
            dir: Vector2::new(0.0, 1.0),
        };
        let p = intersect(&l1, &l3).expect("crossing");
        assert!((p.x - 3.0).abs() < 1e-12 && p.y.abs() < 1e-12);
    }
}
