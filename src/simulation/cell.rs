// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-plc-honeypot project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Runtime record of one simulated memory location

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::value::{CellValue, ValueKind};
use super::waveform::{EvalContext, GeneratorState};
use crate::scenario::RegisterSpec;

/// A value written from the outside that supersedes the simulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Override {
    pub value: CellValue,
    pub written_at: DateTime<Utc>,
    /// Opaque identity of the writer (peer address, session id, ...)
    pub source: String,
}

/// One live cell, owned by the register store.
///
/// The cell keeps a reference to its immutable spec, the generator state of
/// stateful waveforms, the value last committed by the scheduler and the
/// active override if any.
#[derive(Debug)]
pub struct LiveCell {
    spec: Arc<RegisterSpec>,
    kind: ValueKind,
    key: u64,
    state: GeneratorState,
    last_value: CellValue,
    override_value: Option<Override>,
}

impl LiveCell {
    pub fn new(spec: Arc<RegisterSpec>, kind: ValueKind, key: u64, ctx: &EvalContext) -> Self {
        let (last_value, state) = spec.waveform.initial(kind, ctx);
        Self {
            spec,
            kind,
            key,
            state,
            last_value,
            override_value: None,
        }
    }

    pub fn spec(&self) -> &Arc<RegisterSpec> {
        &self.spec
    }

    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    pub fn key(&self) -> u64 {
        self.key
    }

    pub fn state(&self) -> &GeneratorState {
        &self.state
    }

    pub fn last_value(&self) -> CellValue {
        self.last_value
    }

    pub fn override_value(&self) -> Option<&Override> {
        self.override_value.as_ref()
    }

    pub fn is_stateful(&self) -> bool {
        self.spec.waveform.is_stateful()
    }

    /// Value of the cell ignoring any override
    pub fn simulated_value(&self, ctx: &EvalContext) -> CellValue {
        if self.is_stateful() {
            self.last_value
        } else {
            self.spec.waveform.evaluate(self.kind, ctx)
        }
    }

    /// Value seen by readers: the override when active, the simulation otherwise
    pub fn effective_value(&self, ctx: &EvalContext) -> CellValue {
        match &self.override_value {
            Some(o) => o.value,
            None => self.simulated_value(ctx),
        }
    }

    pub fn set_override(&mut self, value: CellValue, source: &str) {
        self.override_value = Some(Override {
            value,
            written_at: Utc::now(),
            source: source.to_string(),
        });
    }

    /// Returns true when an override was active
    pub fn clear_override(&mut self) -> bool {
        self.override_value.take().is_some()
    }

    /// Store the result of a scheduler tick, the override is left untouched
    pub fn commit(&mut self, value: CellValue, state: GeneratorState) {
        self.last_value = value;
        self.state = state;
    }
}
