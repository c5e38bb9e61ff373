// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for configuration module

use camscan::backends::camera::{ConstraintOption, FacingMode, fallback_chain};
use camscan::scanner::LayoutMode;
use camscan::ScannerConfig;
use std::path::PathBuf;

/// A config path in a directory private to one test
fn temp_path(test: &str) -> PathBuf {
    std::env::temp_dir()
        .join(format!("camscan-{}-{}", test, std::process::id()))
        .join("scanner.json")
}

#[test]
fn test_config_default() {
    let config = ScannerConfig::default();

    assert_eq!(config.container_id, "qr-reader");
    assert_eq!(config.preferred_camera, FacingMode::Environment);
    assert_eq!(config.layout, LayoutMode::Compact);
    assert_eq!(
        config.fallback_options(),
        fallback_chain(FacingMode::Environment),
        "Default fallbacks should start with the rear camera"
    );
}

#[test]
fn test_partial_json_uses_defaults() {
    let config: ScannerConfig =
        serde_json::from_str(r#"{ "fps": 30, "preferred_camera": "user", "layout": "fill" }"#)
            .unwrap();

    assert_eq!(config.effective_fps(), 15, "Frame rate should be capped");
    assert_eq!(config.preferred_camera, FacingMode::User);
    assert_eq!(config.layout, LayoutMode::Fill);
    assert_eq!(config.container_id, ScannerConfig::default().container_id);
}

#[test]
fn test_explicit_fallback_order_is_kept() {
    let config: ScannerConfig = serde_json::from_str(
        r#"{ "fallback": [ { "device_id": "usb-2" }, { "facing": { "ideal": "user" } }, {} ] }"#,
    )
    .unwrap();

    assert_eq!(
        config.fallback_options(),
        vec![
            ConstraintOption::device("usb-2"),
            ConstraintOption::ideal(FacingMode::User),
            ConstraintOption::unconstrained(),
        ]
    );
}

#[test]
fn test_save_and_load() {
    let path = temp_path("save-load");
    let config = ScannerConfig {
        scan_box: None,
        settle_delay_ms: 0,
        ..ScannerConfig::default()
    };

    config.save(&path).unwrap();
    let loaded = ScannerConfig::load(&path).unwrap();
    assert_eq!(loaded, config);

    let _ = std::fs::remove_dir_all(path.parent().unwrap());
}

#[test]
fn test_invalid_file_falls_back_to_defaults() {
    let path = temp_path("broken");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, "{ not json").unwrap();

    assert!(ScannerConfig::load(&path).is_err());
    assert_eq!(
        ScannerConfig::load_or_default(Some(&path)),
        ScannerConfig::default()
    );

    let _ = std::fs::remove_dir_all(path.parent().unwrap());
}

#[test]
fn test_missing_file_uses_defaults() {
    let path = temp_path("missing");
    assert_eq!(
        ScannerConfig::load_or_default(Some(&path)),
        ScannerConfig::default()
    );
}
