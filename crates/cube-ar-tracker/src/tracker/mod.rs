//! Single-marker tracking pipeline.
//!
//! This module wires together frame preprocessing, contour search, quad
//! fitting, optional edge refinement, patch decoding and pose recovery.

mod error;
mod params;
mod pipeline;
mod result;

pub use error::{TrackError, TrackerConfigError};
pub use params::TrackerParams;
pub use pipeline::MarkerTracker;
pub use result::TrackResult;
