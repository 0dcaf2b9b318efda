// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-plc-honeypot project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! # Register store
//!
//! The register store owns every live cell of one active scenario. The map
//! from address to cell is built once when the scenario is loaded and never
//! changes afterwards, so lookups need no global lock. Each cell sits behind
//! its own `Mutex`: operations on one cell are mutually exclusive while
//! operations on different cells never contend.
//!
//! ### Read path
//!
//! * active override → override value
//! * stateful waveform → value last committed by the scheduler
//! * time-pure waveform → computed from the elapsed time
//!
//! ### Write path
//!
//! Writes are validated against the declared kind of the cell and arm an
//! override that stays until [`RegisterStore::clear_override`] or a scenario
//! reload. Scheduler commits never clear it.

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use super::cell::{LiveCell, Override};
use super::value::{CellValue, ValueKind};
use super::waveform::{EvalContext, GeneratorState};
use crate::error::{SimulationError, SimulationResult};
use crate::scenario::{RegisterSpec, ScenarioDefinition};

/// S7 memory areas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum S7Area {
    /// Data block with its number
    Db(u16),
    /// Flags (Merker)
    M,
    /// Process inputs
    I,
    /// Process outputs
    Q,
}

impl fmt::Display for S7Area {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            S7Area::Db(n) => write!(f, "db{}", n),
            S7Area::M => f.write_str("m"),
            S7Area::I => f.write_str("i"),
            S7Area::Q => f.write_str("q"),
        }
    }
}

/// Address space of a cell: one of the four Modbus tables or an S7 area
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AddressSpace {
    HoldingRegisters,
    Coils,
    InputRegisters,
    DiscreteInputs,
    S7(S7Area),
}

impl AddressSpace {
    /// Kind assumed when a register spec does not declare one
    pub fn default_kind(self) -> ValueKind {
        match self {
            AddressSpace::Coils | AddressSpace::DiscreteInputs => ValueKind::Bool,
            AddressSpace::HoldingRegisters | AddressSpace::InputRegisters => ValueKind::Word,
            AddressSpace::S7(_) => ValueKind::Int,
        }
    }

    /// Protocol tag used in interaction events
    pub fn protocol(self) -> &'static str {
        match self {
            AddressSpace::S7(_) => "s7comm",
            _ => "modbus",
        }
    }

    pub fn is_modbus_bits(self) -> bool {
        matches!(self, AddressSpace::Coils | AddressSpace::DiscreteInputs)
    }
}

impl fmt::Display for AddressSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressSpace::HoldingRegisters => f.write_str("holding_registers"),
            AddressSpace::Coils => f.write_str("coils"),
            AddressSpace::InputRegisters => f.write_str("input_registers"),
            AddressSpace::DiscreteInputs => f.write_str("discrete_inputs"),
            AddressSpace::S7(area) => write!(f, "s7.{}", area),
        }
    }
}

/// Fully qualified address of a cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellAddress {
    pub space: AddressSpace,
    /// Register/coil number for Modbus, byte offset for S7
    pub address: u32,
}

impl CellAddress {
    pub fn new(space: AddressSpace, address: u32) -> Self {
        Self { space, address }
    }

    pub fn holding_register(address: u16) -> Self {
        Self::new(AddressSpace::HoldingRegisters, address as u32)
    }

    pub fn coil(address: u16) -> Self {
        Self::new(AddressSpace::Coils, address as u32)
    }

    pub fn input_register(address: u16) -> Self {
        Self::new(AddressSpace::InputRegisters, address as u32)
    }

    pub fn discrete_input(address: u16) -> Self {
        Self::new(AddressSpace::DiscreteInputs, address as u32)
    }

    pub fn s7(area: S7Area, offset: u32) -> Self {
        Self::new(AddressSpace::S7(area), offset)
    }

    /// Stable per-cell key used to seed pseudo-random waveforms
    fn key(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        hasher.finish()
    }
}

impl fmt::Display for CellAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.space, self.address)
    }
}

/// What the scheduler needs to advance one cell
#[derive(Debug, Clone)]
pub struct TickInput {
    pub spec: Arc<RegisterSpec>,
    pub kind: ValueKind,
    pub state: GeneratorState,
    pub ctx: EvalContext,
}

/// Read-only view of a cell, exposed to the configuration dashboard
#[derive(Debug, Clone, Serialize)]
pub struct CellStatus {
    pub address: CellAddress,
    pub name: Option<String>,
    pub kind: ValueKind,
    pub wave: &'static str,
    /// Value readers currently observe
    pub value: CellValue,
    /// Value the simulation would produce without the override
    pub simulated_value: CellValue,
    #[serde(rename = "override")]
    pub override_value: Option<Override>,
}

/// Concurrency-safe container of all live cells of one scenario
#[derive(Debug)]
pub struct RegisterStore {
    scenario_name: String,
    cells: HashMap<CellAddress, Mutex<LiveCell>>,
    stateful: Vec<CellAddress>,
    epoch: Instant,
    seed: u64,
}

impl RegisterStore {
    /// Build a store for `scenario`.
    ///
    /// The scenario is validated first: duplicate addresses and bad waveform
    /// parameters fail the whole build with `ScenarioConfig`.
    pub fn from_scenario(scenario: &ScenarioDefinition, seed: u64) -> SimulationResult<Self> {
        scenario.validate()?;

        let epoch = Instant::now();
        let mut cells = HashMap::new();
        let mut stateful = Vec::new();

        for (space, spec) in scenario.entries() {
            let address = CellAddress::new(space, spec.addr);
            let kind = spec.kind_in(space);
            let key = address.key();
            let ctx = EvalContext::new(Duration::ZERO, seed, key);
            let spec = Arc::new(spec.clone());
            if spec.waveform.is_stateful() {
                stateful.push(address);
            }
            let cell = LiveCell::new(spec, kind, key, &ctx);
            if cells.insert(address, Mutex::new(cell)).is_some() {
                // validate() already rejects duplicates
                return Err(SimulationError::config(format!(
                    "duplicate address {}",
                    address
                )));
            }
        }
        stateful.sort();

        debug!(
            "Register store for scenario '{}' built with {} cells ({} stateful)",
            scenario.name,
            cells.len(),
            stateful.len()
        );

        Ok(Self {
            scenario_name: scenario.name.clone(),
            cells,
            stateful,
            epoch,
            seed,
        })
    }

    pub fn scenario_name(&self) -> &str {
        &self.scenario_name
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Time since the store was built
    pub fn elapsed(&self) -> Duration {
        self.epoch.elapsed()
    }

    /// Addresses of the cells the scheduler has to advance, sorted
    pub fn stateful_addresses(&self) -> &[CellAddress] {
        &self.stateful
    }

    /// All addresses, sorted
    pub fn addresses(&self) -> Vec<CellAddress> {
        let mut addresses: Vec<_> = self.cells.keys().copied().collect();
        addresses.sort();
        addresses
    }

    pub fn contains(&self, address: &CellAddress) -> bool {
        self.cells.contains_key(address)
    }

    fn lock(&self, address: &CellAddress) -> SimulationResult<MutexGuard<'_, LiveCell>> {
        let cell = self
            .cells
            .get(address)
            .ok_or(SimulationError::UnknownAddress(*address))?;
        Ok(cell.lock().unwrap_or_else(|poisoned| {
            warn!("Cell {} lock was poisoned, recovering", address);
            poisoned.into_inner()
        }))
    }

    fn context(&self, cell: &LiveCell, elapsed: Duration) -> EvalContext {
        EvalContext::new(elapsed, self.seed, cell.key())
    }

    pub fn kind(&self, address: &CellAddress) -> SimulationResult<ValueKind> {
        Ok(self.lock(address)?.kind())
    }

    /// Current value of a cell
    pub fn read(&self, address: &CellAddress) -> SimulationResult<CellValue> {
        self.read_at(address, self.elapsed())
    }

    /// Value of a cell as seen `elapsed` after the scenario started
    pub fn read_at(&self, address: &CellAddress, elapsed: Duration) -> SimulationResult<CellValue> {
        let cell = self.lock(address)?;
        let ctx = self.context(&cell, elapsed);
        Ok(cell.effective_value(&ctx))
    }

    /// Validate `value` against the cell kind and arm an override.
    ///
    /// Returns the stored value, normalised to the cell kind.
    pub fn write(
        &self,
        address: &CellAddress,
        value: CellValue,
        source: &str,
    ) -> SimulationResult<CellValue> {
        let mut cell = self.lock(address)?;
        let stored = cell
            .kind()
            .validate(&value)
            .map_err(|reason| SimulationError::InvalidValue {
                address: *address,
                reason,
            })?;
        cell.set_override(stored, source);
        Ok(stored)
    }

    /// Scheduler-only: store the next value and generator state of a cell
    pub fn commit_tick(
        &self,
        address: &CellAddress,
        value: CellValue,
        state: GeneratorState,
    ) -> SimulationResult<()> {
        let mut cell = self.lock(address)?;
        cell.commit(value, state);
        Ok(())
    }

    /// Snapshot the generator inputs of a cell for one tick
    pub fn tick_input(&self, address: &CellAddress, elapsed: Duration) -> SimulationResult<TickInput> {
        let cell = self.lock(address)?;
        Ok(TickInput {
            spec: Arc::clone(cell.spec()),
            kind: cell.kind(),
            state: cell.state().clone(),
            ctx: self.context(&cell, elapsed),
        })
    }

    /// Return a cell to pure simulation. Returns true if an override was active.
    pub fn clear_override(&self, address: &CellAddress) -> SimulationResult<bool> {
        let cleared = self.lock(address)?.clear_override();
        if cleared {
            debug!("Override cleared on {}", address);
        }
        Ok(cleared)
    }

    /// Clear every override of the store, returns how many were active
    pub fn clear_all_overrides(&self) -> usize {
        self.addresses()
            .iter()
            .filter(|address| self.clear_override(address).unwrap_or(false))
            .count()
    }

    pub fn override_of(&self, address: &CellAddress) -> SimulationResult<Option<Override>> {
        Ok(self.lock(address)?.override_value().cloned())
    }

    /// Dashboard view of one cell
    pub fn status(&self, address: &CellAddress) -> SimulationResult<CellStatus> {
        let elapsed = self.elapsed();
        let cell = self.lock(address)?;
        let ctx = self.context(&cell, elapsed);
        Ok(CellStatus {
            address: *address,
            name: cell.spec().name.clone(),
            kind: cell.kind(),
            wave: cell.spec().waveform.name(),
            value: cell.effective_value(&ctx),
            simulated_value: cell.simulated_value(&ctx),
            override_value: cell.override_value().cloned(),
        })
    }

    /// Dashboard view of every cell, sorted by address
    pub fn statuses(&self) -> Vec<CellStatus> {
        self.addresses()
            .iter()
            .filter_map(|address| self.status(address).ok())
            .collect()
    }
}
