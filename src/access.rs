// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-plc-honeypot project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! # Access facade
//!
//! Read/write API consumed by the protocol front-ends and the configuration
//! dashboard. Every call resolves the active register store, delegates to it
//! and reports one [`InteractionEvent`] per successful cell access to the
//! configured [`EventSink`]. Event delivery never fails the call.
//!
//! ## Usage
//!
//! ```no_run
//! use rust_plc_honeypot::access::{AccessFacade, LogEventSink};
//! use rust_plc_honeypot::simulation::SimulationEngine;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let engine = Arc::new(SimulationEngine::new(Duration::from_secs(1), None));
//! let facade = AccessFacade::new(engine, Arc::new(LogEventSink));
//! let level = facade.read_holding_register(0, "192.0.2.10:40512");
//! ```

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::error::{SimulationError, SimulationResult};
use crate::scenario::ScenarioDefinition;
use crate::simulation::{
    AddressSpace, CellAddress, CellStatus, CellValue, RegisterStore, S7Area, SimulationEngine,
    ValueKind,
};

/// Log target of interaction events
pub const INTERACTION_TARGET: &str = "plc_honeypot::interaction";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Read,
    Write,
}

/// One read or write performed on a cell
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InteractionEvent {
    pub timestamp: DateTime<Utc>,
    pub protocol: &'static str,
    pub space: String,
    pub address: u32,
    pub operation: Operation,
    pub value: CellValue,
    pub caller: String,
}

impl InteractionEvent {
    fn new(address: &CellAddress, operation: Operation, value: CellValue, caller: &str) -> Self {
        Self {
            timestamp: Utc::now(),
            protocol: address.space.protocol(),
            space: address.space.to_string(),
            address: address.address,
            operation,
            value,
            caller: caller.to_string(),
        }
    }
}

/// Receiver of interaction events. Implementations must not block.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &InteractionEvent);
}

/// Writes each event as one JSON line on the interaction log target
#[derive(Debug, Clone, Copy, Default)]
pub struct LogEventSink;

impl EventSink for LogEventSink {
    fn emit(&self, event: &InteractionEvent) {
        match serde_json::to_string(event) {
            Ok(line) => info!(target: INTERACTION_TARGET, "{}", line),
            Err(e) => warn!("Cannot serialise interaction event: {}", e),
        }
    }
}

/// Forwards events to a channel, for a log shipping task
#[derive(Debug, Clone)]
pub struct ChannelEventSink {
    sender: mpsc::UnboundedSender<InteractionEvent>,
}

impl ChannelEventSink {
    pub fn new(sender: mpsc::UnboundedSender<InteractionEvent>) -> Self {
        Self { sender }
    }

    /// Sink together with the receiving end of its channel
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<InteractionEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self::new(sender), receiver)
    }
}

impl EventSink for ChannelEventSink {
    fn emit(&self, event: &InteractionEvent) {
        if self.sender.send(event.clone()).is_err() {
            debug!("Interaction channel closed, event dropped");
        }
    }
}

/// Entry point of every protocol access to the simulated memory
#[derive(Clone)]
pub struct AccessFacade {
    engine: Arc<SimulationEngine>,
    sink: Arc<dyn EventSink>,
}

impl std::fmt::Debug for AccessFacade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessFacade")
            .field("engine", &self.engine)
            .finish_non_exhaustive()
    }
}

impl AccessFacade {
    pub fn new(engine: Arc<SimulationEngine>, sink: Arc<dyn EventSink>) -> Self {
        Self { engine, sink }
    }

    pub fn engine(&self) -> &Arc<SimulationEngine> {
        &self.engine
    }

    fn store(&self) -> SimulationResult<Arc<RegisterStore>> {
        self.engine.store()
    }

    fn report_failure(&self, operation: Operation, address: &CellAddress, caller: &str, e: &SimulationError) {
        warn!(
            "{:?} of {} by {} failed: {}",
            operation, address, caller, e
        );
    }

    fn read_typed(&self, address: CellAddress, caller: &str) -> SimulationResult<(CellValue, ValueKind)> {
        let result = self.store().and_then(|store| {
            let kind = store.kind(&address)?;
            Ok((store.read(&address)?, kind))
        });
        match &result {
            Ok((value, _)) => self
                .sink
                .emit(&InteractionEvent::new(&address, Operation::Read, *value, caller)),
            Err(e) => self.report_failure(Operation::Read, &address, caller, e),
        }
        result
    }

    /// Read any cell
    pub fn read(&self, address: CellAddress, caller: &str) -> SimulationResult<CellValue> {
        self.read_typed(address, caller).map(|(value, _)| value)
    }

    /// Write any cell, returns the stored value
    pub fn write(&self, address: CellAddress, value: CellValue, caller: &str) -> SimulationResult<CellValue> {
        let result = self
            .store()
            .and_then(|store| store.write(&address, value, caller));
        match &result {
            Ok(stored) => self
                .sink
                .emit(&InteractionEvent::new(&address, Operation::Write, *stored, caller)),
            Err(e) => self.report_failure(Operation::Write, &address, caller, e),
        }
        result
    }

    fn read_word(&self, address: CellAddress, caller: &str) -> SimulationResult<u16> {
        self.read_typed(address, caller)
            .map(|(value, kind)| value.to_register_word(kind))
    }

    fn write_word(&self, address: CellAddress, word: u16, caller: &str) -> SimulationResult<()> {
        let kind = match self.store().and_then(|store| store.kind(&address)) {
            Ok(kind) => kind,
            Err(e) => {
                self.report_failure(Operation::Write, &address, caller, &e);
                return Err(e);
            }
        };
        self.write(address, CellValue::from_register_word(word, kind), caller)
            .map(|_| ())
    }

    pub fn read_holding_register(&self, address: u16, caller: &str) -> SimulationResult<u16> {
        self.read_word(CellAddress::holding_register(address), caller)
    }

    pub fn write_holding_register(&self, address: u16, word: u16, caller: &str) -> SimulationResult<()> {
        self.write_word(CellAddress::holding_register(address), word, caller)
    }

    pub fn read_input_register(&self, address: u16, caller: &str) -> SimulationResult<u16> {
        self.read_word(CellAddress::input_register(address), caller)
    }

    /// Not reachable from Modbus, used by the dashboard to simulate a sensor
    pub fn write_input_register(&self, address: u16, word: u16, caller: &str) -> SimulationResult<()> {
        self.write_word(CellAddress::input_register(address), word, caller)
    }

    pub fn read_coil(&self, address: u16, caller: &str) -> SimulationResult<bool> {
        self.read(CellAddress::coil(address), caller)
            .map(|value| value.as_bool())
    }

    pub fn write_coil(&self, address: u16, state: bool, caller: &str) -> SimulationResult<()> {
        self.write(CellAddress::coil(address), CellValue::Bool(state), caller)
            .map(|_| ())
    }

    pub fn read_discrete_input(&self, address: u16, caller: &str) -> SimulationResult<bool> {
        self.read(CellAddress::discrete_input(address), caller)
            .map(|value| value.as_bool())
    }

    /// Not reachable from Modbus, used by the dashboard to simulate a sensor
    pub fn write_discrete_input(&self, address: u16, state: bool, caller: &str) -> SimulationResult<()> {
        self.write(CellAddress::discrete_input(address), CellValue::Bool(state), caller)
            .map(|_| ())
    }

    pub fn read_s7_cell(&self, area: S7Area, offset: u32, caller: &str) -> SimulationResult<CellValue> {
        self.read(CellAddress::s7(area, offset), caller)
    }

    pub fn write_s7_cell(
        &self,
        area: S7Area,
        offset: u32,
        value: CellValue,
        caller: &str,
    ) -> SimulationResult<CellValue> {
        self.write(CellAddress::s7(area, offset), value, caller)
    }

    /// Big-endian bytes of an S7 cell, as an S7comm front-end sends them
    pub fn read_s7_bytes(&self, area: S7Area, offset: u32, caller: &str) -> SimulationResult<Vec<u8>> {
        self.read_typed(CellAddress::s7(area, offset), caller)
            .map(|(value, kind)| value.to_be_bytes(kind))
    }

    /// Decode big-endian bytes sent by an S7comm client and write the cell
    pub fn write_s7_bytes(
        &self,
        area: S7Area,
        offset: u32,
        bytes: &[u8],
        caller: &str,
    ) -> SimulationResult<CellValue> {
        let address = CellAddress::s7(area, offset);
        let decoded = self.store().and_then(|store| store.kind(&address)).and_then(|kind| {
            CellValue::from_be_bytes(bytes, kind).ok_or_else(|| SimulationError::InvalidValue {
                address,
                reason: format!("{} bytes given, {} needs {}", bytes.len(), kind, kind.byte_width()),
            })
        });
        match decoded {
            Ok(value) => self.write(address, value, caller),
            Err(e) => {
                self.report_failure(Operation::Write, &address, caller, &e);
                Err(e)
            }
        }
    }

    /// Check that `count` consecutive cells exist from `start`, so a
    /// multi-cell request can be rejected before any of them is touched
    pub fn ensure_range(&self, space: AddressSpace, start: u16, count: u16) -> SimulationResult<()> {
        let store = self.store()?;
        for offset in 0..count {
            let address = CellAddress::new(space, start as u32 + offset as u32);
            if !store.contains(&address) {
                return Err(SimulationError::UnknownAddress(address));
            }
        }
        Ok(())
    }

    /// Active scenario, for display
    pub fn scenario(&self) -> Option<Arc<ScenarioDefinition>> {
        self.engine.scenario()
    }

    /// Live value and override status of a cell, no event is emitted
    pub fn cell_status(&self, address: CellAddress) -> SimulationResult<CellStatus> {
        self.store()?.status(&address)
    }

    pub fn cell_statuses(&self) -> SimulationResult<Vec<CellStatus>> {
        Ok(self.store()?.statuses())
    }

    /// Return a cell to pure simulation
    pub fn clear_override(&self, address: CellAddress) -> SimulationResult<bool> {
        self.store()?.clear_override(&address)
    }
}
