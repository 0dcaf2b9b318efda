// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-plc-honeypot project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Configuration management for the PLC honeypot
//!
//! The configuration is backed by a YAML file and validated against an
//! embedded JSON schema before being deserialised.
//!
//! ## Configuration Structure
//!
//! - `simulation`: tick interval, scenario directory, startup scenario, seed
//! - `modbus`: Modbus TCP listener
//!
//! ```yaml
//! simulation:
//!   tick_interval_ms: 1000
//!   scenario_dir: scenarios
//!   scenario: water_treatment
//! modbus:
//!   enabled: true
//!   address: 0.0.0.0
//!   port: 5020
//! ```
//!
//! ## Usage
//!
//! ```no_run
//! use rust_plc_honeypot::config::Config;
//! use std::path::Path;
//!
//! // Load config from file, creates a default if not found
//! let mut config = Config::from_file(Path::new("config.yaml")).unwrap();
//!
//! // Apply command line overrides if needed
//! config.apply_args(
//!     Some(500),                          // Tick interval (ms)
//!     None,                               // Scenario directory
//!     Some("power_substation".into()),    // Scenario
//!     None,                               // Scenario overlay file
//!     Some(42),                           // Seed
//!     Some(true),                         // Enable Modbus
//!     Some("127.0.0.1".to_string()),      // Modbus address
//!     Some(1502),                         // Modbus port
//! );
//!
//! println!("Modbus port: {}", config.modbus.port);
//! ```

pub mod modbus;
pub mod simulation;
pub mod utils;

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{debug, error};
use serde::{Deserialize, Serialize};

pub use modbus::ModbusConfig;
pub use simulation::SimulationConfig;
pub use utils::{is_valid_ip_address, output_config_schema, CONFIG_SCHEMA};

/// Root configuration structure of the honeypot.
///
/// Each section falls back to its defaults when absent from the file, so an
/// empty YAML document is a valid configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Simulation engine settings
    #[serde(default)]
    pub simulation: SimulationConfig,

    /// Modbus TCP front-end settings
    #[serde(default)]
    pub modbus: ModbusConfig,
}

impl Config {
    /// Helper method to create a sample config file when validation fails
    fn create_sample_config<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        let sample_path = path.with_extension("sample.yaml");
        debug!("Original path: {:?}, Sample path: {:?}", path, sample_path);

        if let Some(parent) = sample_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                debug!("Creating parent directory: {:?}", parent);
                fs::create_dir_all(parent).with_context(|| {
                    format!(
                        "Failed to create parent directory for sample config at {:?}",
                        parent
                    )
                })?;
            }
        }

        Self::default()
            .save_to_file(&sample_path)
            .with_context(|| format!("Failed to save sample config to {:?}", sample_path))?;

        error!(
            "Sample configuration file created at {:?}\nPlease edit and rename it",
            sample_path
        );
        Ok(())
    }

    /// Parse and validate YAML contents, without side effects on disk
    fn parse(contents: &str, origin: &Path) -> Result<Self> {
        // YAML to a generic value, then to JSON for the schema validator
        let yaml_value: serde_yml::Value = serde_yml::from_str(contents)
            .with_context(|| format!("Failed to parse YAML configuration from {:?}", origin))?;
        let json_value = serde_json::to_value(&yaml_value).with_context(|| {
            format!("Failed to convert YAML to JSON for validation: {:?}", origin)
        })?;

        let schema: serde_json::Value =
            serde_json::from_str(CONFIG_SCHEMA).context("Failed to parse JSON schema")?;
        let validator = jsonschema::draft202012::options()
            .should_validate_formats(true)
            .build(&schema)?;

        debug!("Validating {} configuration against schema", origin.display());
        if let Err(error) = validator.validate(&json_value) {
            anyhow::bail!("Configuration validation failed: {}", error);
        }

        // an empty document is null in YAML, which means "all defaults"
        let config: Config = if json_value.is_null() {
            Config::default()
        } else {
            serde_yml::from_str(contents).with_context(|| {
                format!("Failed to deserialize configuration from {}", origin.display())
            })?
        };

        utils::validate_specific_rules(&config)?;
        Ok(config)
    }

    /// Load configuration from a file.
    ///
    /// A missing file is created with the default configuration. When the
    /// file does not validate a `<name>.sample.yaml` with defaults is written
    /// next to it and the error is returned.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(
                "Configuration file not found at {:?}, creating default",
                path
            );
            let default_config = Self::default();
            default_config.save_to_file(path)?;
            return Ok(default_config);
        }

        debug!("Loading configuration from {:?}", path);
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file at {:?}", path))?;

        match Self::parse(&contents, path) {
            Ok(config) => Ok(config),
            Err(err) => {
                error!("Configuration error: {:#}", err);
                if let Err(e) = Self::create_sample_config(path) {
                    error!("Failed to create sample config: {:#}", e);
                }
                Err(err)
            }
        }
    }

    /// Validate an existing file without writing anything, for `--validate-config`
    pub fn validate_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file at {:?}", path))?;
        Self::parse(&contents, path)
    }

    /// Save the configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml =
            serde_yml::to_string(self).context("Failed to serialize configuration to YAML")?;

        let mut file = File::create(path.as_ref())
            .with_context(|| format!("Failed to create config file at {:?}", path.as_ref()))?;

        file.write_all(yaml.as_bytes())
            .with_context(|| format!("Failed to write configuration to {:?}", path.as_ref()))?;

        Ok(())
    }

    /// Apply command line arguments to override configuration values.
    ///
    /// Only the arguments that are provided override the file values.
    ///
    /// # Parameters
    ///
    /// * `tick_interval_ms` - Scheduler period in milliseconds
    /// * `scenario_dir` - Directory of the scenario files
    /// * `scenario` - Scenario activated at startup
    /// * `overrides` - Scenario overlay file merged at startup
    /// * `seed` - Seed of the pseudo-random generators
    /// * `modbus_enabled` - Enable/disable the Modbus listener
    /// * `modbus_address` - Bind address of the Modbus listener
    /// * `modbus_port` - TCP port of the Modbus listener
    #[allow(clippy::too_many_arguments)]
    pub fn apply_args(
        &mut self,
        tick_interval_ms: Option<u64>,
        scenario_dir: Option<PathBuf>,
        scenario: Option<String>,
        overrides: Option<PathBuf>,
        seed: Option<u64>,
        modbus_enabled: Option<bool>,
        modbus_address: Option<String>,
        modbus_port: Option<u16>,
    ) {
        if let Some(tick) = tick_interval_ms {
            debug!("Overriding tick interval from command line: {} ms", tick);
            self.simulation.tick_interval_ms = tick;
        }
        if let Some(dir) = scenario_dir {
            debug!("Overriding scenario directory from command line: {:?}", dir);
            self.simulation.scenario_dir = dir;
        }
        if let Some(name) = scenario {
            debug!("Overriding scenario from command line: {}", name);
            self.simulation.scenario = name;
        }
        if let Some(path) = overrides {
            debug!("Overriding scenario overlay from command line: {:?}", path);
            self.simulation.overrides = Some(path);
        }
        if let Some(seed) = seed {
            debug!("Overriding seed from command line: {}", seed);
            self.simulation.seed = Some(seed);
        }

        if let Some(enabled) = modbus_enabled {
            debug!("Overriding Modbus enabled from command line: {}", enabled);
            self.modbus.enabled = enabled;
        }
        if let Some(port) = modbus_port {
            debug!("Overriding Modbus port from command line: {}", port);
            self.modbus.port = port;
        }
        if let Some(address) = modbus_address {
            debug!("Overriding Modbus address from command line: {}", address);
            self.modbus.address = address;
        }
    }
}
