use super::{TrackError, TrackResult, TrackerConfigError, TrackerParams};
use crate::contour::{candidate_contours, ContourFilter};
use crate::pose::{estimate_pose, PoseError};
use crate::preprocess::Preprocessor;
use crate::quad_fit::{fit_quad, QuadFitParams};
use crate::refine::refine_quad_edges;
use cube_ar_core::{CameraIntrinsics, ColorFrameView, GrayImageView, Quad};
use cube_ar_marker::{MarkerDecoder, MarkerObservation, MarkerPattern, PatchSampler};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// A candidate quad whose patch decoded as the configured pattern.
#[derive(Clone, Copy, Debug)]
struct DecodedQuad {
    raw: Quad,
    quad: Quad,
    refined: bool,
    observation: MarkerObservation,
}

/// Contour-first single-marker tracker.
///
/// Configuration is fixed at construction; thresholds and parameters can be
/// changed between frames through the setters. Scratch buffers are reused
/// across [`MarkerTracker::track`] calls but carry no state between frames.
#[derive(Debug)]
pub struct MarkerTracker {
    marker_side: f64,
    intrinsics: CameraIntrinsics,
    params: TrackerParams,
    decoder: MarkerDecoder,
    sampler: PatchSampler,
    preprocessor: Preprocessor,
}

impl MarkerTracker {
    /// Create a tracker for `pattern` printed with side length `marker_side`
    /// (any length unit; the translation is reported in the same unit).
    pub fn new(
        pattern: MarkerPattern,
        marker_side: f64,
        intrinsics: CameraIntrinsics,
        params: TrackerParams,
    ) -> Result<Self, TrackerConfigError> {
        if !marker_side.is_finite() || marker_side <= 0.0 {
            return Err(TrackerConfigError::MarkerSide { side: marker_side });
        }
        if intrinsics.k_inverse().is_none() {
            return Err(TrackerConfigError::Intrinsics);
        }
        params.validate()?;

        Ok(Self {
            marker_side,
            intrinsics,
            decoder: MarkerDecoder::new(pattern, params.decode_params()),
            sampler: PatchSampler::new(pattern.grid_cells(), params.cell_px),
            preprocessor: Preprocessor::new(),
            params,
        })
    }

    /// Tracker for the built-in pattern with default parameters.
    pub fn with_default_pattern(
        marker_side: f64,
        intrinsics: CameraIntrinsics,
    ) -> Result<Self, TrackerConfigError> {
        Self::new(
            MarkerPattern::default(),
            marker_side,
            intrinsics,
            TrackerParams::default(),
        )
    }

    #[inline]
    pub fn pattern(&self) -> &MarkerPattern {
        self.decoder.pattern()
    }

    #[inline]
    pub fn params(&self) -> &TrackerParams {
        &self.params
    }

    #[inline]
    pub fn intrinsics(&self) -> &CameraIntrinsics {
        &self.intrinsics
    }

    #[inline]
    pub fn marker_side(&self) -> f64 {
        self.marker_side
    }

    pub fn set_gray_threshold(&mut self, threshold: u8) {
        self.params.gray_threshold = threshold;
    }

    pub fn set_marker_threshold(&mut self, threshold: u8) {
        self.params.marker_threshold = threshold;
        self.decoder.set_params(self.params.decode_params());
    }

    /// Replace all tunables; the previous ones stay in effect on error.
    pub fn set_params(&mut self, params: TrackerParams) -> Result<(), TrackerConfigError> {
        params.validate()?;
        if params.cell_px != self.params.cell_px {
            self.sampler = PatchSampler::new(self.pattern().grid_cells(), params.cell_px);
        }
        self.decoder.set_params(params.decode_params());
        self.params = params;
        Ok(())
    }

    /// Locate the marker in `frame` and recover its pose.
    ///
    /// Candidates are tried in contour-search order and the first one that
    /// decodes wins. If that candidate's pose cannot be recovered the frame
    /// fails with [`TrackError::PoseUnrecoverable`]; later candidates are not
    /// consulted since only one marker identity exists.
    #[cfg_attr(
        feature = "tracing",
        instrument(
            level = "info",
            skip(self, frame),
            fields(width = frame.width, height = frame.height)
        )
    )]
    pub fn track(&mut self, frame: &ColorFrameView<'_>) -> Result<TrackResult, TrackError> {
        let Self {
            marker_side,
            intrinsics,
            params,
            decoder,
            sampler,
            preprocessor,
        } = self;

        let pre = preprocessor.preprocess(frame, params.gray_threshold, params.polarity)?;
        let (width, height) = pre.binary.dimensions();
        let filter =
            ContourFilter::for_frame(width, height, params.min_contour_points, params.min_area_frac);
        let fit = QuadFitParams {
            approx_epsilon_frac: params.approx_epsilon_frac,
            min_area_px: filter.min_area_px,
        };

        let found = candidate_contours(pre.binary, filter)
            .filter_map(|contour| fit_quad(&contour, &fit))
            .find_map(|raw| decode_candidate(&pre.gray, raw, params, sampler, decoder));

        let Some(decoded) = found else {
            log::debug!("no candidate decoded");
            return Err(TrackError::NoMarkerFound);
        };

        let ordered = decoded.observation.reorder(&decoded.quad);
        let pose = estimate_pose(&ordered.corners, *marker_side, intrinsics)?;
        let view_angle_deg = pose.view_angle_deg();
        if view_angle_deg > params.max_view_angle_deg {
            log::debug!("rejecting pose seen at {view_angle_deg:.1} deg");
            return Err(PoseError::ViewTooOblique {
                angle_deg: view_angle_deg,
                max_deg: params.max_view_angle_deg,
            }
            .into());
        }

        log::debug!(
            "marker at t = ({:.4}, {:.4}, {:.4}), rotation {}",
            pose.translation.x,
            pose.translation.y,
            pose.translation.z,
            decoded.observation.rotation
        );

        Ok(TrackResult {
            matrix: pose.to_row_major(),
            pose,
            corners: ordered.corners,
            raw_quad: decoded.raw,
            refined: decoded.refined,
            rotation: decoded.observation.rotation,
            code: decoded.observation.code,
            view_angle_deg,
        })
    }

    /// All convex quads that pass the size gates, before decoding. Useful
    /// for visual debugging and threshold tuning.
    pub fn candidate_quads(&mut self, frame: &ColorFrameView<'_>) -> Result<Vec<Quad>, TrackError> {
        let params = &self.params;
        let pre = self
            .preprocessor
            .preprocess(frame, params.gray_threshold, params.polarity)?;
        let (width, height) = pre.binary.dimensions();
        let filter =
            ContourFilter::for_frame(width, height, params.min_contour_points, params.min_area_frac);
        let fit = QuadFitParams {
            approx_epsilon_frac: params.approx_epsilon_frac,
            min_area_px: filter.min_area_px,
        };
        Ok(candidate_contours(pre.binary, filter)
            .filter_map(|contour| fit_quad(&contour, &fit))
            .collect())
    }
}

fn decode_candidate(
    gray: &GrayImageView<'_>,
    raw: Quad,
    params: &TrackerParams,
    sampler: &mut PatchSampler,
    decoder: &mut MarkerDecoder,
) -> Option<DecodedQuad> {
    let refined = params
        .refine_edges
        .then(|| refine_quad_edges(gray, &raw, &params.edge_refine))
        .flatten();
    let quad = refined.unwrap_or(raw);

    let patch = sampler.sample(gray, &quad)?;
    let observation = decoder.decode(&patch)?;
    Some(DecodedQuad {
        raw,
        quad,
        refined: refined.is_some(),
        observation,
    })
}
