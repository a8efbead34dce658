//! Boundary search in the binary mask and size filtering.

use imageproc::contours::find_contours;
use imageproc::point::Point;

/// Size gates applied before any polygon fitting.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ContourFilter {
    /// Shorter boundaries are noise.
    pub min_points: usize,
    /// Minimum bounding-box area in pixels.
    pub min_area_px: f32,
}

impl ContourFilter {
    /// Filter whose area gate is `min_area_frac` of a `width × height` frame.
    pub fn for_frame(width: u32, height: u32, min_points: usize, min_area_frac: f32) -> Self {
        Self {
            min_points: min_points.max(4),
            min_area_px: (width as f32 * height as f32 * min_area_frac).max(0.0),
        }
    }

    pub fn accepts(&self, points: &[Point<i32>]) -> bool {
        points.len() >= self.min_points && bounding_box_area(points) >= self.min_area_px
    }
}

/// All closed boundaries of the ink regions (outer borders and holes alike)
/// that pass `filter`, in the order the border-following search finds them.
///
/// The search itself runs eagerly; filtering is lazy so that the caller can
/// stop at the first candidate that decodes.
pub fn candidate_contours(
    binary: &image::GrayImage,
    filter: ContourFilter,
) -> impl Iterator<Item = Vec<Point<i32>>> {
    find_contours::<i32>(binary)
        .into_iter()
        .map(|c| c.points)
        .filter(move |points| filter.accepts(points))
}

/// Area of the axis-aligned pixel bounding box (inclusive extents).
pub fn bounding_box_area(points: &[Point<i32>]) -> f32 {
    let Some(first) = points.first() else {
        return 0.0;
    };
    let (mut x0, mut y0, mut x1, mut y1) = (first.x, first.y, first.x, first.y);
    for p in points {
        x0 = x0.min(p.x);
        y0 = y0.min(p.y);
        x1 = x1.max(p.x);
        y1 = y1.max(p.y);
    }
    (x1 - x0 + 1) as f32 * (y1 - y0 + 1) as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocess::INK;
    use image::Luma;

    fn mask_with_rect(w: u32, h: u32, x0: u32, y0: u32, side: u32) -> image::GrayImage {
        let mut img = image::GrayImage::new(w, h);
        for y in y0..y0 + side {
            for x in x0..x0 + side {
                img.put_pixel(x, y, Luma([INK]));
            }
        }
        img
    }

    #[test]
    fn square_blob_yields_one_boundary() {
        let mask = mask_with_rect(64, 48, 10, 10, 20);
        let filter = ContourFilter::for_frame(64, 48, 8, 0.01);
        let found: Vec<_> = candidate_contours(&mask, filter).collect();
        assert_eq!(found.len(), 1);
        assert_eq!(bounding_box_area(&found[0]), 400.0);
    }

    #[test]
    fn tiny_blobs_are_filtered_out() {
        let mut mask = mask_with_rect(64, 48, 10, 10, 20);
        for (x, y) in [(50, 40), (51, 40), (50, 41), (51, 41)] {
            mask.put_pixel(x, y, Luma([INK]));
        }
        let filter = ContourFilter::for_frame(64, 48, 8, 0.01);
        assert_eq!(candidate_contours(&mask, filter).count(), 1);

        let strict = ContourFilter::for_frame(64, 48, 8, 0.5);
        assert_eq!(candidate_contours(&mask, strict).count(), 0);
    }

    #[test]
    fn empty_mask_has_no_candidates() {
        let mask = image::GrayImage::new(32, 32);
        let filter = ContourFilter::for_frame(32, 32, 4, 0.0);
        assert_eq!(candidate_contours(&mask, filter).count(), 0);
    }

    #[test]
    fn bounding_box_of_nothing_is_zero() {
        assert_eq!(bounding_box_area(&[]), 0.0);
    }
}
