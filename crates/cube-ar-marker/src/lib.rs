//! The single recognized square marker: pattern definition, perspective
//! patch sampling and rotation-aware decoding.
//!
//! This crate does not find candidate quads in an image. It expects a
//! four-corner [`cube_ar_core::Quad`] (for example from
//! `cube-ar-tracker`) and answers two questions:
//! - does the inside of this quad show the configured pattern, and
//! - which corner of the quad is the pattern's top-left.

mod decode;
mod pattern;
mod sample;

pub use decode::{decode_patch, DecodeParams, MarkerDecoder, MarkerObservation, Polarity};
pub use pattern::{rotate_code_u64, MarkerPattern, PatternError, PatternSpec, MAX_PATTERN_SIZE};
pub use sample::{patch_rect_corners, sample_marker_patch, PatchSampler};
