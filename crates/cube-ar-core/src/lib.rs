//! Core types for planar marker tracking.
//!
//! This crate is intentionally small and purely geometric: borrowed image
//! views, bilinear sampling, 4-point homographies, perspective warping and
//! pinhole intrinsics. It does not know about marker patterns or pipelines.

mod camera;
mod homography;
mod image;
mod logger;
mod quad;

pub use camera::CameraIntrinsics;
pub use homography::{
    homography_from_4pt, warp_perspective_gray, warp_perspective_gray_into, Homography,
};
pub use image::{
    luma_u8, sample_bilinear, sample_bilinear_clamped, sample_bilinear_u8, ChannelOrder,
    ColorFrameView, FrameError, GrayImage, GrayImageView,
};
pub use quad::Quad;

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::init_with_level;
