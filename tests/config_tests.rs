// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for configuration module

use filter_camera::Config;
use filter_camera::filters::{FilterType, RenderMode};
use std::time::Duration;

#[test]
fn test_config_default() {
    let config = Config::default();

    assert_eq!(config.camera_path, None, "First camera by default");
    assert_eq!(config.render_mode, RenderMode::Auto);
    assert_eq!(config.default_filter, FilterType::None);
    assert_eq!(config.album_path, "Pictures/FilterCamera");
    assert_eq!(config.reset_delay(), Duration::from_millis(100));
    assert!(!config.mirror_preview);
}

#[test]
fn test_config_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.json");

    let config = Config {
        camera_path: Some("/dev/video2".to_string()),
        rotation_degrees: Some(270),
        render_mode: RenderMode::Cpu,
        default_filter: FilterType::Toon,
        jpeg_quality: 80,
        mirror_preview: true,
        ..Config::default()
    };
    config.save_to(&path).unwrap();

    assert_eq!(Config::load_from(&path).unwrap(), config);
}

#[test]
fn test_config_ignores_unknown_fields() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, r#"{ "render_mode": "Gpu", "legacy_option": 3 }"#).unwrap();

    let config = Config::load_from(&path).unwrap();
    assert_eq!(config.render_mode, RenderMode::Gpu);
    assert_eq!(config.capture_width, Config::default().capture_width);
}

#[test]
fn test_zero_resolution_falls_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, r#"{ "capture_width": 0 }"#).unwrap();

    let config = Config::load_from(&path).unwrap();
    assert!(config.capture_width > 0 && config.capture_height > 0);
}
