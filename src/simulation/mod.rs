// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-plc-honeypot project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! # Simulation engine
//!
//! Computes the live values of the simulated PLC memory.
//!
//! ## Components
//!
//! * [`waveform`]: generator family, one tagged variant per waveform kind
//! * [`cell`]: runtime record of one memory location
//! * [`store`]: concurrency-safe map of live cells, sole owner of simulation state
//! * [`scheduler`]: periodic task advancing stateful generators
//! * [`engine`]: active scenario lifecycle (load, reload, teardown)

pub mod cell;
pub mod engine;
pub mod scheduler;
pub mod store;
pub mod value;
pub mod waveform;

pub use cell::{LiveCell, Override};
pub use engine::{ActiveScenario, SimulationEngine};
pub use scheduler::{advance_all, SimulationScheduler, TickReport};
pub use store::{AddressSpace, CellAddress, CellStatus, RegisterStore, S7Area};
pub use value::{CellValue, ValueKind};
pub use waveform::{GeneratorState, Waveform};
