//! Perspective-correct patch sampling from a candidate quad.

use cube_ar_core::{
    homography_from_4pt, warp_perspective_gray_into, GrayImage, GrayImageView, Quad,
};
use nalgebra::Point2;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Below this patch side the cell averages become meaningless.
const MIN_PATCH_SIDE_PX: usize = 6;

/// Canonical square corners `(0,0), (s,0), (s,s), (0,s)` matching the
/// on-screen clockwise order of a normalized [`Quad`].
pub fn patch_rect_corners(side: f32) -> [Point2<f32>; 4] {
    [
        Point2::new(0.0, 0.0),
        Point2::new(side, 0.0),
        Point2::new(side, side),
        Point2::new(0.0, side),
    ]
}

/// Warps the inside of a quad into a front-facing square patch.
///
/// The patch buffer is owned by the sampler and reused between candidates.
#[derive(Clone, Debug)]
pub struct PatchSampler {
    side: usize,
    patch: GrayImage,
}

impl PatchSampler {
    /// Sampler producing `grid_cells * cell_px` square patches.
    pub fn new(grid_cells: usize, cell_px: usize) -> Self {
        let side = (grid_cells * cell_px).max(MIN_PATCH_SIDE_PX);
        Self {
            side,
            patch: GrayImage::new(side, side),
        }
    }

    #[inline]
    pub fn side(&self) -> usize {
        self.side
    }

    /// Sample `quad` (corner 0 mapped to the patch top-left, clockwise) from
    /// `gray`. Returns `None` for degenerate quads whose homography is
    /// singular or non-finite.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "trace", skip(self, gray, quad))
    )]
    pub fn sample(
        &mut self,
        gray: &GrayImageView<'_>,
        quad: &Quad,
    ) -> Option<GrayImageView<'_>> {
        if quad
            .corners
            .iter()
            .any(|p| !p.x.is_finite() || !p.y.is_finite())
        {
            return None;
        }
        let rect = patch_rect_corners(self.side as f32);
        let Some(h_img_from_patch) = homography_from_4pt(&rect, &quad.corners) else {
            log::trace!("degenerate quad {:?}: no homography", quad.corners);
            return None;
        };
        warp_perspective_gray_into(
            gray,
            &h_img_from_patch,
            self.side,
            self.side,
            &mut self.patch,
        );
        Some(self.patch.view())
    }
}

/// One-shot variant of [`PatchSampler::sample`] that allocates its output.
pub fn sample_marker_patch(
    gray: &GrayImageView<'_>,
    quad: &Quad,
    grid_cells: usize,
    cell_px: usize,
) -> Option<GrayImage> {
    let mut sampler = PatchSampler::new(grid_cells, cell_px);
    let view = sampler.sample(gray, quad)?;
    Some(GrayImage {
        width: view.width,
        height: view.height,
        data: view.data.to_vec(),
    })
}
