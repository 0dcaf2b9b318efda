// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-plc-honeypot project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Configuration utilities
//!
//! Schema access and the validation rules the JSON schema cannot express.

use anyhow::{Context, Result};
use log::{debug, warn};

use super::Config;

/// Embedded JSON schema of the configuration file
pub const CONFIG_SCHEMA: &str = include_str!("../../resources/config.schema.json");

/// Output the embedded JSON schema to the console.
///
/// Called for the `--show-config-schema` flag.
///
/// ```bash
/// ./rust_plc_honeypot --show-config-schema > config_schema.json
/// ```
pub fn output_config_schema() -> Result<()> {
    let schema: serde_json::Value =
        serde_json::from_str(CONFIG_SCHEMA).context("Failed to parse JSON schema")?;
    let formatted_schema =
        serde_json::to_string_pretty(&schema).context("Failed to format JSON schema")?;
    println!("{}", formatted_schema);
    Ok(())
}

/// Check if a string is a valid IP address or one of the usual bind aliases
pub fn is_valid_ip_address(addr: &str) -> bool {
    if addr.parse::<std::net::IpAddr>().is_ok() {
        return true;
    }
    matches!(addr, "localhost" | "::" | "::0" | "0.0.0.0")
}

/// Validates the configuration against rules that aren't covered by the JSON schema.
///
/// # Validation Rules
///
/// - **Tick interval**: must be strictly positive
/// - **Scenario**: the startup scenario name must not be empty
/// - **Port Range**: the Modbus port must be within 1-65534
/// - **IP Address Format**: an unusual bind address only triggers a warning
pub fn validate_specific_rules(config: &Config) -> Result<()> {
    debug!("Performing additional validation checks");

    if config.simulation.tick_interval_ms == 0 {
        anyhow::bail!("simulation.tick_interval_ms must be greater than 0");
    }

    if config.simulation.scenario.trim().is_empty() {
        anyhow::bail!("simulation.scenario must name a scenario");
    }

    if config.modbus.port < 1 || config.modbus.port > 65534 {
        anyhow::bail!("Invalid Modbus port number: {}", config.modbus.port);
    }

    if !is_valid_ip_address(&config.modbus.address) {
        warn!(
            "Potentially invalid Modbus address format: {}",
            config.modbus.address
        );
    }

    Ok(())
}
