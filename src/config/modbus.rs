// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-plc-honeypot project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Modbus TCP listener configuration

use serde::{Deserialize, Serialize};

/// Configuration for the Modbus TCP front-end.
///
/// # Fields
///
/// * `enabled` - Flag to enable or disable the Modbus listener
/// * `port` - TCP port number (default: 5020, unprivileged)
/// * `address` - Network address to bind to (default: 0.0.0.0)
///
/// # Example
///
/// ```
/// use rust_plc_honeypot::config::ModbusConfig;
///
/// let modbus_config = ModbusConfig {
///     enabled: true,
///     port: 502,
///     address: "0.0.0.0".to_string(),
/// };
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModbusConfig {
    /// When disabled no listener is started, the engine still runs
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Valid range is 1-65534. 502 is the standard port but needs privileges.
    #[serde(default = "default_port")]
    pub port: u16,

    /// IPv4/IPv6 address or hostname to bind to
    #[serde(default = "default_address")]
    pub address: String,
}

fn default_enabled() -> bool {
    true
}

fn default_port() -> u16 {
    5020
}

fn default_address() -> String {
    "0.0.0.0".to_string()
}

impl Default for ModbusConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            port: default_port(),
            address: default_address(),
        }
    }
}
