// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-plc-honeypot project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Rust PLC honeypot library
//!
//! Value simulation engine of an industrial-protocol honeypot. The engine
//! keeps the simulated memory of a PLC (Modbus tables, S7 data blocks and
//! areas) alive with plausible signals and persists the values written by
//! clients.
//!
//! * [`scenario`]: device descriptions loaded from JSON files
//! * [`simulation`]: waveforms, register store, scheduler and engine
//! * [`access`]: read/write API used by the protocol front-ends
//! * [`modbus`]: Modbus TCP front-end
//! * [`config`] and [`daemon`]: application plumbing

pub mod access;
pub mod config;
pub mod daemon;
pub mod error;
pub mod modbus;
pub mod scenario;
pub mod simulation;

pub use error::{SimulationError, SimulationResult};
