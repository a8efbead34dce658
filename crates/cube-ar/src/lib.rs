//! High-level facade crate for the `cube-ar-*` workspace.
//!
//! This crate provides:
//! - stable re-exports of the underlying crates,
//! - (feature `image`) helpers that run the tracker directly on
//!   `image::RgbImage` values or raw BGR buffers,
//! - (feature `cli`) the `cube-ar` command-line tool.
//!
//! ## Quickstart
//!
//! ```no_run
//! use cube_ar::detect;
//! use cube_ar::{CameraIntrinsics, MarkerTracker};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let img = image::open("frame.png")?.to_rgb8();
//! let camera = CameraIntrinsics::from_vertical_fov(640, 480, 30.0);
//! let mut tracker = MarkerTracker::with_default_pattern(0.045, camera)?;
//!
//! match detect::track_rgb_image(&mut tracker, &img) {
//!     Ok(res) => println!("model-view (column-major): {:?}", res.column_major()),
//!     Err(e) if e.is_no_pose() => println!("marker not visible"),
//!     Err(e) => return Err(e.into()),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `cube_ar::core`: image views, homographies, intrinsics, quads, logging.
//! - `cube_ar::marker`: the marker pattern, patch sampling and decoding.
//! - `cube_ar::tracker`: the tracking pipeline, pose, config and reports.
//! - `cube_ar::detect` (feature `image`): helpers on `image` buffers.

pub use cube_ar_core as core;
pub use cube_ar_marker as marker;
pub use cube_ar_tracker as tracker;

pub use cube_ar_core::{CameraIntrinsics, ColorFrameView, Quad};
pub use cube_ar_marker::{MarkerPattern, Polarity};
pub use cube_ar_tracker::{
    MarkerTracker, Pose, ResultMatrix, TrackError, TrackResult, TrackerConfig, TrackerParams,
};

#[cfg(feature = "image")]
pub mod detect;
