//! Single planar marker tracking.
//!
//! Turns one color frame into the 4×4 marker-to-camera transform used to
//! overlay virtual geometry:
//! - frame → grayscale → binary mask ([`Preprocessor`]),
//! - closed boundaries of the mask, size-filtered ([`candidate_contours`]),
//! - convex quads by polygon simplification ([`fit_quad`]),
//! - optional sub-pixel edge refinement ([`refine_quad_edges`]),
//! - patch sampling and decoding (`cube-ar-marker`),
//! - planar pose from the rotation-corrected corners ([`estimate_pose`]).
//!
//! [`MarkerTracker`] runs the whole chain and returns the first candidate
//! that decodes as the configured pattern.

mod contour;
mod io;
mod pose;
mod preprocess;
mod quad_fit;
mod refine;
pub mod synthetic;
mod tracker;

pub use contour::{bounding_box_area, candidate_contours, ContourFilter};
pub use io::{TrackReport, TrackerConfig, TrackerIoError};
pub use pose::{
    estimate_pose, marker_model_corners, project_marker_corners, Pose, PoseError, ResultMatrix,
};
pub use preprocess::{binarize_into, PreprocessedFrame, Preprocessor, INK};
pub use quad_fit::{fit_quad, simplify_closed, QuadFitParams};
pub use refine::{refine_quad_edges, EdgeRefineParams};
pub use tracker::{MarkerTracker, TrackError, TrackResult, TrackerConfigError, TrackerParams};

pub use cube_ar_core::{CameraIntrinsics, ColorFrameView, Quad};
pub use cube_ar_marker::{MarkerPattern, PatternError, Polarity};
