use assert_cmd::Command;
use cube_ar::tracker::synthetic::SyntheticScene;
use cube_ar::tracker::TrackReport;
use cube_ar::{CameraIntrinsics, TrackerConfig};
use predicates::prelude::*;
use std::path::{Path, PathBuf};

const SIDE: f64 = 0.045;

fn camera() -> CameraIntrinsics {
    let f = 200.0 / SIDE;
    CameraIntrinsics::new(f, f, 319.5, 239.5)
}

fn write_config(dir: &Path) -> PathBuf {
    let path = dir.join("tracker.json");
    let cfg = TrackerConfig {
        marker_side: SIDE,
        intrinsics: camera(),
        ..TrackerConfig::default()
    };
    cfg.write_json(&path).expect("write config");
    path
}

fn write_gray_png(path: &Path, width: usize, height: usize, data: Vec<u8>) {
    image::GrayImage::from_raw(width as u32, height as u32, data)
        .expect("buffer size")
        .save(path)
        .expect("save png");
}

#[test]
fn track_writes_matrix_and_report() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = write_config(dir.path());
    let image = dir.path().join("frame.png");
    let scene = SyntheticScene::face_on(640, 480, camera(), SIDE, 1.0);
    write_gray_png(&image, 640, 480, scene.render_gray());
    let report_path = dir.path().join("report.json");

    Command::cargo_bin("cube-ar")
        .expect("binary")
        .args(["track", "--config"])
        .arg(&config)
        .arg("--image")
        .arg(&image)
        .arg("--out")
        .arg(&report_path)
        .assert()
        .success()
        .stdout(predicate::str::starts_with("["));

    let report = TrackReport::load_json(&report_path).expect("report");
    assert_eq!((report.width, report.height), (640, 480));
    assert!(report.error.is_none());
    assert!(!report.candidates.is_empty());
    let res = report.result.expect("result");
    assert_eq!(res.rotation, 0);
    assert!((res.pose.translation.z - 1.0).abs() < 0.01 * SIDE);
    let gl = report.gl_matrix.expect("gl matrix");
    assert!((gl[14] - 1.0).abs() < 1e-3);
    assert_eq!(gl[15], 1.0);
}

#[test]
fn track_reports_no_pose_on_empty_frames() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = write_config(dir.path());
    let image = dir.path().join("blank.png");
    write_gray_png(&image, 320, 240, vec![200u8; 320 * 240]);
    let report_path = dir.path().join("report.json");

    Command::cargo_bin("cube-ar")
        .expect("binary")
        .args(["track", "--config"])
        .arg(&config)
        .arg("--image")
        .arg(&image)
        .arg("--out")
        .arg(&report_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("no pose"));

    let report = TrackReport::load_json(&report_path).expect("report");
    assert!(report.result.is_none());
    assert_eq!(report.error.as_deref(), Some("no marker found"));
}

#[test]
fn track_fails_on_missing_config() {
    let dir = tempfile::tempdir().expect("tempdir");
    Command::cargo_bin("cube-ar")
        .expect("binary")
        .args(["track", "--config"])
        .arg(dir.path().join("missing.json"))
        .arg("--image")
        .arg(dir.path().join("missing.png"))
        .assert()
        .failure();
}

#[test]
fn pattern_renders_the_configured_marker() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = write_config(dir.path());
    let out = dir.path().join("pattern.png");

    Command::cargo_bin("cube-ar")
        .expect("binary")
        .args(["pattern", "--cell-px", "10", "--config"])
        .arg(&config)
        .arg("--out")
        .arg(&out)
        .assert()
        .success();

    let img = image::open(&out).expect("png").to_luma8();
    // 6 grid cells plus a one-cell quiet zone on each side.
    assert_eq!(img.dimensions(), (80, 80));
    assert_eq!(img.get_pixel(5, 5).0[0], 255);
    assert_eq!(img.get_pixel(15, 15).0[0], 0);
}

#[test]
fn init_config_round_trips() {
    let dir = tempfile::tempdir().expect("tempdir");
    let out = dir.path().join("default.json");

    Command::cargo_bin("cube-ar")
        .expect("binary")
        .args(["init-config", "--out"])
        .arg(&out)
        .assert()
        .success();

    let raw = std::fs::read_to_string(&out).expect("read");
    let value: serde_json::Value = serde_json::from_str(&raw).expect("json");
    assert_eq!(value["marker_side"], serde_json::json!(0.045));
    let cfg = TrackerConfig::load_json(&out).expect("config");
    assert!(cfg.build_tracker().is_ok());
}
