//! Polygon simplification of a closed contour down to a convex quad.

use cube_ar_core::Quad;
use imageproc::geometry::{approximate_polygon_dp, arc_length};
use imageproc::point::Point;
use nalgebra::{Point2, Vector2};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Smallest simplification tolerance in pixels; one-pixel staircase steps
/// must always collapse.
const MIN_EPSILON_PX: f64 = 0.5;

/// Contour points are centres of the outermost ink pixels; the ink boundary
/// runs half a pixel further out.
const PIXEL_EDGE_OFFSET: f32 = 0.5;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QuadFitParams {
    /// Douglas-Peucker tolerance as a fraction of the contour perimeter.
    pub approx_epsilon_frac: f64,
    /// Minimum enclosed area in pixels.
    pub min_area_px: f32,
}

/// Fit a convex quad to a closed contour.
///
/// Returns `None` when the simplified polygon does not have exactly four
/// vertices, is not strictly convex, or is too small. The quad comes back
/// [`Quad::normalized`], with its edges pushed out onto the pixel boundary
/// of the ink region.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "trace", skip(contour), fields(points = contour.len()))
)]
pub fn fit_quad(contour: &[Point<i32>], params: &QuadFitParams) -> Option<Quad> {
    let polygon = simplify_closed(contour, params.approx_epsilon_frac)?;
    if polygon.len() != 4 {
        log::trace!("contour simplified to {} vertices", polygon.len());
        return None;
    }

    let quad = Quad::new([
        to_point2(polygon[0]),
        to_point2(polygon[1]),
        to_point2(polygon[2]),
        to_point2(polygon[3]),
    ]);
    if !quad.is_convex() {
        log::trace!("non-convex quad {:?}", quad.corners);
        return None;
    }
    if quad.area() < params.min_area_px {
        log::trace!("quad area {:.1} below {:.1}", quad.area(), params.min_area_px);
        return None;
    }
    offset_edges(&quad.normalized(), PIXEL_EDGE_OFFSET)
}

/// Move every edge of a convex quad `offset` pixels away from its centre
/// and re-intersect adjacent edges. Corner order is preserved.
fn offset_edges(quad: &Quad, offset: f32) -> Option<Quad> {
    let c = &quad.corners;
    let center = quad.center();
    let mut lines = [(Point2::origin(), Vector2::zeros()); 4];
    for (i, line) in lines.iter_mut().enumerate() {
        let a = c[i];
        let dir = (c[(i + 1) % 4] - a).try_normalize(f32::EPSILON)?;
        let mut normal = Vector2::new(-dir.y, dir.x);
        if normal.dot(&(a - center)) < 0.0 {
            normal = -normal;
        }
        *line = (a + normal * offset, dir);
    }

    let mut out = *c;
    for (i, corner) in out.iter_mut().enumerate() {
        let (p0, d0) = lines[(i + 3) % 4];
        let (p1, d1) = lines[i];
        let cross = d0.x * d1.y - d0.y * d1.x;
        if cross.abs() < 1e-6 {
            return None;
        }
        let w = p1 - p0;
        *corner = p0 + d0 * ((w.x * d1.y - w.y * d1.x) / cross);
    }
    Some(Quad::new(out))
}

/// Douglas-Peucker on a closed curve.
///
/// The curve is split at two far-apart points (the point farthest from the
/// centroid and the point farthest from that one) which are then always kept
/// as vertices, and each open half is simplified on its own. Without the
/// split the result depends on where the contour happens to start.
pub fn simplify_closed(contour: &[Point<i32>], epsilon_frac: f64) -> Option<Vec<Point<i32>>> {
    if contour.len() < 4 {
        return None;
    }
    let epsilon = (epsilon_frac * arc_length(contour, true)).max(MIN_EPSILON_PX);

    let n = contour.len() as f64;
    let (sx, sy) = contour
        .iter()
        .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x as f64, sy + p.y as f64));
    let centroid = (sx / n, sy / n);

    let a = farthest_from(contour, centroid)?;
    let pa = contour[a];
    let b = farthest_from(contour, (pa.x as f64, pa.y as f64))?;
    if a == b || contour[a] == contour[b] {
        return None;
    }

    let first = wrapping_chain(contour, a, b);
    let second = wrapping_chain(contour, b, a);

    let mut out = approximate_polygon_dp(&first, epsilon, false);
    out.pop();
    let mut tail = approximate_polygon_dp(&second, epsilon, false);
    tail.pop();
    out.append(&mut tail);
    Some(out)
}

fn farthest_from(points: &[Point<i32>], from: (f64, f64)) -> Option<usize> {
    points
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let dx = p.x as f64 - from.0;
            let dy = p.y as f64 - from.1;
            (i, dx * dx + dy * dy)
        })
        .max_by(|l, r| l.1.total_cmp(&r.1))
        .map(|(i, _)| i)
}

/// Points `from..=to`, wrapping around the end of the closed contour.
fn wrapping_chain(points: &[Point<i32>], from: usize, to: usize) -> Vec<Point<i32>> {
    if from <= to {
        points[from..=to].to_vec()
    } else {
        points[from..].iter().chain(&points[..=to]).copied().collect()
    }
}

#[inline]
fn to_point2(p: Point<i32>) -> Point2<f32> {
    Point2::new(p.x as f32, p.y as f32)
}
