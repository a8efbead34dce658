use crate::pose::{Pose, ResultMatrix};
use cube_ar_core::Quad;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Output of a successful tracking run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrackResult {
    pub pose: Pose,
    /// Row-major marker-to-camera transform, see [`ResultMatrix`].
    pub matrix: ResultMatrix,
    /// Image corners of the marker as printed: top-left, top-right,
    /// bottom-right, bottom-left.
    pub corners: [Point2<f32>; 4],
    /// Fitted quad before edge refinement and rotation correction, in
    /// normalized on-screen order.
    pub raw_quad: Quad,
    /// Whether sub-pixel edge refinement was applied.
    pub refined: bool,
    /// Clockwise quarter turns of the pattern as observed in the patch.
    pub rotation: u8,
    /// Observed inner bits in patch orientation.
    pub code: u64,
    pub view_angle_deg: f64,
}

impl TrackResult {
    /// [`TrackResult::matrix`] transposed for column-major consumers.
    pub fn column_major(&self) -> ResultMatrix {
        self.pose.to_column_major()
    }
}
