//! JSON configuration and report helpers for marker tracking.

use crate::{
    MarkerTracker, Quad, ResultMatrix, TrackError, TrackResult, TrackerConfigError,
    TrackerParams,
};
use cube_ar_core::CameraIntrinsics;
use cube_ar_marker::{MarkerPattern, PatternSpec};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

#[derive(thiserror::Error, Debug)]
pub enum TrackerIoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

fn default_marker_side() -> f64 {
    0.045
}

fn default_intrinsics() -> CameraIntrinsics {
    CameraIntrinsics::from_vertical_fov(640, 480, 30.0)
}

fn default_pattern() -> PatternSpec {
    MarkerPattern::default().into()
}

/// Everything needed to build a [`MarkerTracker`].
///
/// The pattern is kept in its row form so that an ambiguous definition
/// surfaces as [`TrackerConfigError::Pattern`] from
/// [`TrackerConfig::build_tracker`] rather than as a parse error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Printed side length of the bordered marker.
    #[serde(default = "default_marker_side")]
    pub marker_side: f64,
    #[serde(default = "default_intrinsics")]
    pub intrinsics: CameraIntrinsics,
    #[serde(default = "default_pattern")]
    pub pattern: PatternSpec,
    #[serde(default)]
    pub params: TrackerParams,
    #[serde(default)]
    pub output_path: Option<String>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            marker_side: default_marker_side(),
            intrinsics: default_intrinsics(),
            pattern: default_pattern(),
            params: TrackerParams::default(),
            output_path: None,
        }
    }
}

impl TrackerConfig {
    /// Load a JSON config from disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, TrackerIoError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), TrackerIoError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Resolve the output report path.
    pub fn output_path(&self) -> PathBuf {
        self.output_path
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("cube_ar_track_report.json"))
    }

    /// Validate the pattern rows.
    pub fn build_pattern(&self) -> Result<MarkerPattern, TrackerConfigError> {
        Ok(MarkerPattern::try_from(self.pattern.clone())?)
    }

    /// Build a tracker from this config.
    pub fn build_tracker(&self) -> Result<MarkerTracker, TrackerConfigError> {
        let pattern = self.build_pattern()?;
        MarkerTracker::new(
            pattern,
            self.marker_side,
            self.intrinsics,
            self.params.clone(),
        )
    }
}

/// Outcome of tracking one image, as written by the CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackReport {
    pub image_path: String,
    pub config_path: String,
    pub width: usize,
    pub height: usize,
    #[serde(default)]
    pub candidates: Vec<Quad>,
    #[serde(default)]
    pub result: Option<TrackResult>,
    /// Column-major copy of the result matrix for OpenGL-style consumers.
    #[serde(default)]
    pub gl_matrix: Option<ResultMatrix>,
    #[serde(default)]
    pub error: Option<String>,
}

impl TrackReport {
    /// Build an empty report for one image.
    pub fn new(image_path: &Path, config_path: &Path, width: usize, height: usize) -> Self {
        Self {
            image_path: image_path.to_string_lossy().into_owned(),
            config_path: config_path.to_string_lossy().into_owned(),
            width,
            height,
            candidates: Vec::new(),
            result: None,
            gl_matrix: None,
            error: None,
        }
    }

    /// Populate report fields from a tracking outcome.
    pub fn set_outcome(&mut self, outcome: Result<TrackResult, TrackError>) {
        match outcome {
            Ok(res) => {
                self.gl_matrix = Some(res.column_major());
                self.result = Some(res);
                self.error = None;
            }
            Err(err) => {
                self.result = None;
                self.gl_matrix = None;
                self.error = Some(err.to_string());
            }
        }
    }

    /// Load a report from JSON on disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, TrackerIoError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this report to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), TrackerIoError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}
