// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-plc-honeypot project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

use anyhow::Result;
use rust_plc_honeypot::config::Config;
use std::fs;
use std::sync::Once;
use tempfile::tempdir;

static INIT: Once = Once::new();

// Setup logger for tests
fn setup() {
    INIT.call_once(|| {
        env_logger::builder()
            .filter_level(log::LevelFilter::Debug)
            .is_test(true)
            .init();
    });
}

#[test]
fn test_schema_error_creates_sample_file() -> Result<()> {
    setup();
    let temp_dir = tempdir()?;
    let config_path = temp_dir.path().join("config.yaml");

    // Valid YAML with wrong types and an unknown section
    let invalid_yaml = r#"
simulation:
  tick_interval_ms: "fast"
modbus:
  enabled: "yes"
  port: 70000
dashboard:
  port: 8080
"#;
    fs::write(&config_path, invalid_yaml)?;

    let result = Config::from_file(&config_path);
    assert!(result.is_err());
    let message = format!("{:#}", result.unwrap_err());
    assert!(
        message.contains("validation failed"),
        "unexpected error: {}",
        message
    );

    let sample_path = temp_dir.path().join("config.sample.yaml");
    assert!(sample_path.exists(), "sample file should be created");
    let sample = Config::from_file(&sample_path)?;
    assert_eq!(sample, Config::default());

    Ok(())
}

#[test]
fn test_invalid_yaml_creates_sample_file() -> Result<()> {
    setup();
    let temp_dir = tempdir()?;
    let config_path = temp_dir.path().join("broken.yaml");
    fs::write(&config_path, "simulation: [unterminated\n")?;

    assert!(Config::from_file(&config_path).is_err());
    assert!(temp_dir.path().join("broken.sample.yaml").exists());
    Ok(())
}
