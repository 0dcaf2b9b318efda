// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-plc-honeypot project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Simulation engine configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Settings of the simulation engine.
///
/// # Example
///
/// ```
/// use rust_plc_honeypot::config::SimulationConfig;
///
/// let simulation = SimulationConfig {
///     tick_interval_ms: 500,
///     seed: Some(42),
///     ..Default::default()
/// };
/// assert_eq!(simulation.tick_interval().as_millis(), 500);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Period of the scheduler advancing stateful waveforms, in milliseconds
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Directory holding the `<name>.json` scenario files
    #[serde(default = "default_scenario_dir")]
    pub scenario_dir: PathBuf,

    /// Name of the scenario activated at startup
    #[serde(default = "default_scenario")]
    pub scenario: String,

    /// Scenario overlay file merged over the scenario at startup
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overrides: Option<PathBuf>,

    /// Fixes every pseudo-random draw, for reproducible runs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

fn default_tick_interval_ms() -> u64 {
    1000
}

fn default_scenario_dir() -> PathBuf {
    PathBuf::from("scenarios")
}

fn default_scenario() -> String {
    "water_treatment".to_string()
}

impl SimulationConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            scenario_dir: default_scenario_dir(),
            scenario: default_scenario(),
            overrides: None,
            seed: None,
        }
    }
}
