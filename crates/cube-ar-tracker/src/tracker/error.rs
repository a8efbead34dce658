use crate::pose::PoseError;
use cube_ar_core::FrameError;
use cube_ar_marker::PatternError;

/// Per-frame outcome of [`crate::MarkerTracker::track`] when no transform is
/// available.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum TrackError {
    #[error("invalid frame: {0}")]
    InvalidFrame(#[from] FrameError),
    #[error("no marker found")]
    NoMarkerFound,
    #[error("marker decoded but pose is unrecoverable: {reason}")]
    PoseUnrecoverable { reason: PoseError },
}

impl TrackError {
    /// `true` for the outcomes a render loop treats as "marker not visible
    /// this frame".
    pub fn is_no_pose(&self) -> bool {
        matches!(
            self,
            TrackError::NoMarkerFound | TrackError::PoseUnrecoverable { .. }
        )
    }
}

impl From<PoseError> for TrackError {
    fn from(reason: PoseError) -> Self {
        TrackError::PoseUnrecoverable { reason }
    }
}

/// Construction-time configuration problems. These abort tracker creation.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum TrackerConfigError {
    #[error(transparent)]
    Pattern(#[from] PatternError),
    #[error("marker side must be positive and finite (got {side})")]
    MarkerSide { side: f64 },
    #[error("camera intrinsics are singular or non-finite")]
    Intrinsics,
    #[error("invalid parameter `{name}`: {reason}")]
    Param { name: &'static str, reason: String },
}
