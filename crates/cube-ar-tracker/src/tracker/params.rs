use super::TrackerConfigError;
use crate::refine::{
    EdgeRefineParams, MAX_SEARCH_HALF_WIDTH_PX, MAX_STRIPE_COUNT, MIN_POINTS_PER_EDGE,
};
use cube_ar_marker::{DecodeParams, Polarity};
use serde::{Deserialize, Serialize};

/// Tunables of the tracking pipeline.
///
/// Defaults match a printed black marker on white paper under indoor light.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerParams {
    /// Scene threshold applied to the whole frame for contour search.
    pub gray_threshold: u8,
    /// Patch threshold applied to each sampled marker patch.
    pub marker_threshold: u8,
    pub polarity: Polarity,
    /// Contours with fewer boundary pixels are ignored.
    pub min_contour_points: usize,
    /// Minimum candidate size as a fraction of the frame area, applied to
    /// the contour bounding box and again to the fitted quad.
    pub min_area_frac: f32,
    /// Polygon simplification tolerance as a fraction of the contour
    /// perimeter.
    pub approx_epsilon_frac: f64,
    /// Patch pixels per marker cell.
    pub cell_px: usize,
    /// Fraction of each cell side ignored on every edge when averaging.
    pub cell_inset_frac: f32,
    /// Minimum ink fraction for a cell to read as black.
    pub cell_fill_ratio: f32,
    /// Move quad corners onto sub-pixel edge lines before sampling.
    pub refine_edges: bool,
    pub edge_refine: EdgeRefineParams,
    /// Poses seen more obliquely than this are rejected as ill-conditioned.
    pub max_view_angle_deg: f64,
}

impl Default for TrackerParams {
    fn default() -> Self {
        Self {
            gray_threshold: 100,
            marker_threshold: 100,
            polarity: Polarity::DarkOnLight,
            min_contour_points: 20,
            min_area_frac: 0.0008,
            approx_epsilon_frac: 0.02,
            cell_px: 10,
            cell_inset_frac: 0.2,
            cell_fill_ratio: 0.5,
            refine_edges: true,
            edge_refine: EdgeRefineParams::default(),
            max_view_angle_deg: 75.0,
        }
    }
}

impl TrackerParams {
    pub fn decode_params(&self) -> DecodeParams {
        DecodeParams {
            marker_threshold: self.marker_threshold,
            cell_fill_ratio: self.cell_fill_ratio,
            cell_inset_frac: self.cell_inset_frac,
            polarity: self.polarity,
        }
    }

    /// Reject values that would make every frame fail or panic downstream.
    pub fn validate(&self) -> Result<(), TrackerConfigError> {
        fn bad(name: &'static str, reason: impl Into<String>) -> TrackerConfigError {
            TrackerConfigError::Param {
                name,
                reason: reason.into(),
            }
        }

        if !(self.min_area_frac.is_finite() && (0.0..1.0).contains(&self.min_area_frac)) {
            return Err(bad("min_area_frac", "must be in [0, 1)"));
        }
        if !(self.approx_epsilon_frac.is_finite() && self.approx_epsilon_frac > 0.0) {
            return Err(bad("approx_epsilon_frac", "must be positive"));
        }
        if self.cell_px == 0 {
            return Err(bad("cell_px", "must be at least 1"));
        }
        if !(0.0..0.5).contains(&self.cell_inset_frac) {
            return Err(bad("cell_inset_frac", "must be in [0, 0.5)"));
        }
        if !(self.cell_fill_ratio > 0.0 && self.cell_fill_ratio <= 1.0) {
            return Err(bad("cell_fill_ratio", "must be in (0, 1]"));
        }
        if !(self.max_view_angle_deg > 0.0 && self.max_view_angle_deg <= 90.0) {
            return Err(bad("max_view_angle_deg", "must be in (0, 90]"));
        }

        let edge = &self.edge_refine;
        if !(MIN_POINTS_PER_EDGE..=MAX_STRIPE_COUNT).contains(&edge.stripe_count) {
            return Err(bad(
                "edge_refine.stripe_count",
                format!("must be in {MIN_POINTS_PER_EDGE}..={MAX_STRIPE_COUNT}"),
            ));
        }
        if !(edge.search_half_width_px > 0.0
            && edge.search_half_width_px <= MAX_SEARCH_HALF_WIDTH_PX)
        {
            return Err(bad(
                "edge_refine.search_half_width_px",
                format!("must be in (0, {MAX_SEARCH_HALF_WIDTH_PX}]"),
            ));
        }
        if !(edge.min_gradient.is_finite() && edge.min_gradient >= 0.0) {
            return Err(bad("edge_refine.min_gradient", "must be finite and non-negative"));
        }
        if !(edge.max_corner_shift_px.is_finite() && edge.max_corner_shift_px > 0.0) {
            return Err(bad(
                "edge_refine.max_corner_shift_px",
                "must be finite and positive",
            ));
        }
        Ok(())
    }
}
