// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-plc-honeypot project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! # Scenario definitions
//!
//! A scenario describes the complete address space of one simulated device.
//! It is immutable once loaded: the register store builds its live cells from
//! it and the configuration dashboard displays it.
//!
//! ```json
//! {
//!   "name": "Water Treatment Plant",
//!   "author": "SCTG",
//!   "modbus": {
//!     "registers": [
//!       {"addr": 0, "name": "Tank level", "wave": "sine", "min": 20, "max": 80, "period": 300}
//!     ],
//!     "coils": [
//!       {"addr": 0, "name": "Pump 1", "wave": "square", "on": 30, "off": 10}
//!     ]
//!   },
//!   "s7": {
//!     "db": {"1": [{"addr": 0, "type": "REAL", "wave": "noise", "base": 7.2, "amplitude": 0.1}]}
//!   }
//! }
//! ```

mod loader;

pub use loader::{ScenarioInfo, ScenarioLoader};

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use crate::error::{SimulationError, SimulationResult};
use crate::simulation::store::{AddressSpace, S7Area};
use crate::simulation::value::ValueKind;
use crate::simulation::waveform::Waveform;

fn default_author() -> String {
    "Unknown".to_string()
}

fn default_version() -> String {
    "1.0".to_string()
}

/// Configuration of one memory cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterSpec {
    /// Register number for Modbus tables, byte offset for S7 areas
    pub addr: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Declared value kind, defaults to the kind of the owning table
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ValueKind>,
    #[serde(flatten)]
    pub waveform: Waveform,
}

impl RegisterSpec {
    /// Effective kind of this spec when placed in `space`
    pub fn kind_in(&self, space: AddressSpace) -> ValueKind {
        self.kind.unwrap_or_else(|| space.default_kind())
    }
}

/// The four Modbus tables
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModbusTables {
    pub registers: Vec<RegisterSpec>,
    pub coils: Vec<RegisterSpec>,
    pub input_registers: Vec<RegisterSpec>,
    pub discrete_inputs: Vec<RegisterSpec>,
}

/// S7 memory areas, data blocks keyed by their number
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct S7Tables {
    pub db: BTreeMap<u16, Vec<RegisterSpec>>,
    pub m: Vec<RegisterSpec>,
    pub i: Vec<RegisterSpec>,
    pub q: Vec<RegisterSpec>,
}

/// A complete simulated device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_author")]
    pub author: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub modbus: ModbusTables,
    #[serde(default)]
    pub s7: S7Tables,
}

/// Partial scenario layered on top of a base scenario
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioOverlay {
    pub modbus: ModbusTables,
    pub s7: S7Tables,
}

impl ScenarioOverlay {
    pub fn from_file<P: AsRef<Path>>(path: P) -> SimulationResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            SimulationError::config(format!("cannot read overlay {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&contents).map_err(|e| {
            SimulationError::config(format!("invalid overlay JSON in {}: {}", path.display(), e))
        })
    }
}

/// Replace entries of `base` that share an address with `overlay`, append the others
fn merge_table(base: &[RegisterSpec], overlay: &[RegisterSpec]) -> Vec<RegisterSpec> {
    let mut merged = base.to_vec();
    for spec in overlay {
        match merged.iter_mut().find(|existing| existing.addr == spec.addr) {
            Some(existing) => *existing = spec.clone(),
            None => merged.push(spec.clone()),
        }
    }
    merged
}

impl ScenarioDefinition {
    pub fn from_json(json: &str) -> SimulationResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| SimulationError::config(format!("invalid scenario JSON: {}", e)))
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> SimulationResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            SimulationError::config(format!("cannot read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&contents).map_err(|e| {
            SimulationError::config(format!("invalid scenario JSON in {}: {}", path.display(), e))
        })
    }

    /// Every table of the scenario with the address space it populates
    pub fn tables(&self) -> Vec<(AddressSpace, &[RegisterSpec])> {
        let mut tables: Vec<(AddressSpace, &[RegisterSpec])> = vec![
            (AddressSpace::HoldingRegisters, &self.modbus.registers),
            (AddressSpace::Coils, &self.modbus.coils),
            (AddressSpace::InputRegisters, &self.modbus.input_registers),
            (AddressSpace::DiscreteInputs, &self.modbus.discrete_inputs),
        ];
        for (number, specs) in &self.s7.db {
            tables.push((AddressSpace::S7(S7Area::Db(*number)), specs));
        }
        tables.push((AddressSpace::S7(S7Area::M), &self.s7.m));
        tables.push((AddressSpace::S7(S7Area::I), &self.s7.i));
        tables.push((AddressSpace::S7(S7Area::Q), &self.s7.q));
        tables
    }

    /// Flattened view of all register specs
    pub fn entries(&self) -> impl Iterator<Item = (AddressSpace, &RegisterSpec)> + '_ {
        self.tables()
            .into_iter()
            .flat_map(|(space, specs)| specs.iter().map(move |spec| (space, spec)))
    }

    pub fn cell_count(&self) -> usize {
        self.tables().iter().map(|(_, specs)| specs.len()).sum()
    }

    pub fn info(&self) -> ScenarioInfo {
        ScenarioInfo {
            name: self.name.clone(),
            description: self.description.clone(),
            author: self.author.clone(),
            version: self.version.clone(),
        }
    }

    /// Layer `overlay` on top of this scenario
    pub fn merged_with(&self, overlay: &ScenarioOverlay) -> ScenarioDefinition {
        let mut merged = self.clone();
        merged.modbus = ModbusTables {
            registers: merge_table(&self.modbus.registers, &overlay.modbus.registers),
            coils: merge_table(&self.modbus.coils, &overlay.modbus.coils),
            input_registers: merge_table(
                &self.modbus.input_registers,
                &overlay.modbus.input_registers,
            ),
            discrete_inputs: merge_table(
                &self.modbus.discrete_inputs,
                &overlay.modbus.discrete_inputs,
            ),
        };
        for (number, specs) in &overlay.s7.db {
            let base = self.s7.db.get(number).map(Vec::as_slice).unwrap_or(&[]);
            merged.s7.db.insert(*number, merge_table(base, specs));
        }
        merged.s7.m = merge_table(&self.s7.m, &overlay.s7.m);
        merged.s7.i = merge_table(&self.s7.i, &overlay.s7.i);
        merged.s7.q = merge_table(&self.s7.q, &overlay.s7.q);
        merged
    }

    /// Check the whole scenario, the first violation fails the load
    pub fn validate(&self) -> SimulationResult<()> {
        if self.name.trim().is_empty() {
            return Err(SimulationError::config("scenario name is empty"));
        }
        for (space, specs) in self.tables() {
            validate_table(space, specs)?;
        }
        Ok(())
    }
}

fn validate_table(space: AddressSpace, specs: &[RegisterSpec]) -> SimulationResult<()> {
    let mut seen = HashSet::new();
    for spec in specs {
        let kind = spec.kind_in(space);
        let label = match &spec.name {
            Some(name) => format!("{}:{} ({})", space, spec.addr, name),
            None => format!("{}:{}", space, spec.addr),
        };

        if !seen.insert(spec.addr) {
            return Err(SimulationError::config(format!(
                "duplicate address {}:{}",
                space, spec.addr
            )));
        }

        match space {
            AddressSpace::S7(_) => {}
            _ if spec.addr > u16::MAX as u32 => {
                return Err(SimulationError::config(format!(
                    "{} is beyond the Modbus address range",
                    label
                )));
            }
            AddressSpace::Coils | AddressSpace::DiscreteInputs if kind != ValueKind::Bool => {
                return Err(SimulationError::config(format!(
                    "{} must be BOOL, got {}",
                    label, kind
                )));
            }
            AddressSpace::HoldingRegisters | AddressSpace::InputRegisters
                if !kind.fits_register() =>
            {
                return Err(SimulationError::config(format!(
                    "{} has type {} which does not fit a 16-bit register",
                    label, kind
                )));
            }
            _ => {}
        }

        spec.waveform
            .validate(kind)
            .map_err(|reason| SimulationError::config(format!("{}: {}", label, reason)))?;
    }

    if let AddressSpace::S7(_) = space {
        let mut ranges = specs
            .iter()
            .map(|spec| {
                let width = spec.kind_in(space).byte_width() as u32;
                spec.addr
                    .checked_add(width)
                    .map(|end| (spec.addr, end))
                    .ok_or_else(|| {
                        SimulationError::config(format!(
                            "{}: cell at offset {} runs past the end of the area",
                            space, spec.addr
                        ))
                    })
            })
            .collect::<SimulationResult<Vec<(u32, u32)>>>()?;
        ranges.sort();
        for pair in ranges.windows(2) {
            let (start, end) = pair[0];
            let (next_start, _) = pair[1];
            if end > next_start {
                return Err(SimulationError::config(format!(
                    "{}: bytes {}..{} overlap the cell at offset {}",
                    space, start, end, next_start
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario(json: &str) -> ScenarioDefinition {
        ScenarioDefinition::from_json(json).unwrap()
    }

    #[test]
    fn test_defaults_and_kinds() {
        let def = scenario(
            r#"{"name": "minimal", "modbus": {"coils": [{"addr": 3, "wave": "random", "probability": 0.1}]}}"#,
        );
        assert_eq!(def.author, "Unknown");
        assert_eq!(def.version, "1.0");
        assert_eq!(def.cell_count(), 1);
        let (space, spec) = def.entries().next().unwrap();
        assert_eq!(space, AddressSpace::Coils);
        assert_eq!(spec.kind_in(space), ValueKind::Bool);
        assert!(def.validate().is_ok());
    }

    #[test]
    fn test_duplicate_address_rejected() {
        let def = scenario(
            r#"{"name": "dup", "modbus": {"registers": [
                {"addr": 1, "wave": "fixed", "value": 1},
                {"addr": 1, "wave": "fixed", "value": 2}
            ]}}"#,
        );
        let err = def.validate().unwrap_err();
        assert!(matches!(err, SimulationError::ScenarioConfig(msg) if msg.contains("duplicate")));
    }

    #[test]
    fn test_same_address_in_distinct_tables_is_fine() {
        let def = scenario(
            r#"{"name": "ok", "modbus": {
                "registers": [{"addr": 1, "wave": "fixed", "value": 1}],
                "input_registers": [{"addr": 1, "wave": "fixed", "value": 1}]
            }, "s7": {"db": {"1": [{"addr": 0, "wave": "fixed", "value": 1}],
                             "2": [{"addr": 0, "wave": "fixed", "value": 1}]}}}"#,
        );
        assert!(def.validate().is_ok());
    }

    #[test]
    fn test_s7_overlap_rejected() {
        let def = scenario(
            r#"{"name": "overlap", "s7": {"db": {"1": [
                {"addr": 0, "type": "REAL", "wave": "fixed", "value": 1.5},
                {"addr": 2, "type": "INT", "wave": "fixed", "value": 1}
            ]}}}"#,
        );
        assert!(def.validate().is_err());
    }

    #[test]
    fn test_s7_cell_past_end_of_area_rejected() {
        let def = scenario(
            r#"{"name": "edge", "s7": {"m": [
                {"addr": 4294967295, "type": "INT", "wave": "fixed", "value": 1}
            ]}}"#,
        );
        assert!(matches!(
            def.validate(),
            Err(SimulationError::ScenarioConfig(_))
        ));

        // the last offset still holds a single byte
        let def = scenario(
            r#"{"name": "edge", "s7": {"m": [
                {"addr": 4294967294, "type": "BYTE", "wave": "fixed", "value": 1}
            ]}}"#,
        );
        assert!(def.validate().is_ok());
    }

    #[test]
    fn test_register_kind_limits() {
        let def = scenario(
            r#"{"name": "wide", "modbus": {"registers": [
                {"addr": 0, "type": "REAL", "wave": "fixed", "value": 1.5}
            ]}}"#,
        );
        assert!(def.validate().is_err());

        let def = scenario(
            r#"{"name": "coil", "modbus": {"coils": [
                {"addr": 0, "wave": "sine", "min": 0, "max": 1, "period": 10}
            ]}}"#,
        );
        assert!(def.validate().is_err());
    }

    #[test]
    fn test_merge_replaces_and_appends() {
        let base = scenario(
            r#"{"name": "base", "modbus": {"registers": [
                {"addr": 0, "wave": "fixed", "value": 1},
                {"addr": 1, "wave": "fixed", "value": 2}
            ]}}"#,
        );
        let overlay: ScenarioOverlay = serde_json::from_str(
            r#"{"modbus": {"registers": [
                {"addr": 1, "wave": "fixed", "value": 20},
                {"addr": 5, "wave": "counter"}
            ]}, "s7": {"m": [{"addr": 0, "type": "BYTE", "wave": "status_flags"}]}}"#,
        )
        .unwrap();
        let merged = base.merged_with(&overlay);
        let addrs: Vec<u32> = merged.modbus.registers.iter().map(|s| s.addr).collect();
        assert_eq!(addrs, vec![0, 1, 5]);
        assert_eq!(merged.modbus.registers[1], overlay.modbus.registers[0]);
        assert_eq!(merged.s7.m.len(), 1);
        assert_eq!(merged.name, "base");
        assert!(merged.validate().is_ok());
    }

    #[test]
    fn test_unknown_wave_is_config_error() {
        let err = ScenarioDefinition::from_json(
            r#"{"name": "bad", "modbus": {"registers": [{"addr": 0, "wave": "chaos"}]}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, SimulationError::ScenarioConfig(_)));
    }
}
