// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-plc-honeypot project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Error taxonomy of the simulation engine
//!
//! Configuration errors are raised while a scenario is being loaded and are
//! fatal to that load only. Address and value errors are per-call and are
//! translated by the protocol front-ends into their own exception codes.
//! Internal state errors are produced by the scheduler for a single cell and
//! never abort a whole tick.

use thiserror::Error;

use crate::simulation::store::CellAddress;

/// Errors produced by the register store, the scheduler and the access facade.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimulationError {
    /// The scenario is malformed (duplicate address, bad parameters, ...).
    /// The previously active scenario, if any, stays active.
    #[error("Scenario configuration error: {0}")]
    ScenarioConfig(String),

    /// No register spec exists for the requested address
    #[error("Unknown address: {0}")]
    UnknownAddress(CellAddress),

    /// A written value does not fit the declared kind of the cell
    #[error("Invalid value for {address}: {reason}")]
    InvalidValue { address: CellAddress, reason: String },

    /// Generator state is absent or does not match the waveform of the cell
    #[error("Internal state error on {address}: {reason}")]
    InternalState { address: CellAddress, reason: String },

    /// The engine has no scenario loaded yet
    #[error("No active scenario")]
    NoActiveScenario,
}

impl SimulationError {
    /// Shorthand used by the scenario validation code
    pub fn config(message: impl Into<String>) -> Self {
        SimulationError::ScenarioConfig(message.into())
    }
}

pub type SimulationResult<T> = Result<T, SimulationError>;
