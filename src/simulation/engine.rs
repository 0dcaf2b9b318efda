// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-plc-honeypot project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Lifecycle of the active scenario
//!
//! The engine holds at most one active scenario: its definition, the register
//! store built from it and the scheduler driving that store. Loading a new
//! scenario builds and validates the new store first, then stops the old
//! scheduler (waiting for its in-flight tick), swaps the store and starts a
//! new scheduler. A scenario that fails validation leaves the previous one
//! running untouched.

use log::{info, warn};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::Mutex;

use super::scheduler::SimulationScheduler;
use super::store::RegisterStore;
use crate::error::{SimulationError, SimulationResult};
use crate::scenario::ScenarioDefinition;

/// Definition and live store of the running scenario
#[derive(Debug)]
pub struct ActiveScenario {
    pub definition: Arc<ScenarioDefinition>,
    pub store: Arc<RegisterStore>,
}

#[derive(Debug)]
pub struct SimulationEngine {
    active: RwLock<Option<Arc<ActiveScenario>>>,
    /// Serialises load/shutdown and owns the running scheduler
    scheduler: Mutex<Option<SimulationScheduler>>,
    tick_interval: Duration,
    seed: Option<u64>,
}

impl SimulationEngine {
    /// `seed` fixes every pseudo-random draw of the stores and schedulers
    /// this engine creates
    pub fn new(tick_interval: Duration, seed: Option<u64>) -> Self {
        Self {
            active: RwLock::new(None),
            scheduler: Mutex::new(None),
            tick_interval,
            seed,
        }
    }

    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    /// Activate `definition`, replacing the current scenario
    pub async fn load(&self, definition: Arc<ScenarioDefinition>) -> SimulationResult<()> {
        let mut scheduler = self.scheduler.lock().await;

        let store_seed = self.seed.unwrap_or_else(rand::random);
        let store = match RegisterStore::from_scenario(&definition, store_seed) {
            Ok(store) => Arc::new(store),
            Err(e) => {
                warn!("Scenario '{}' rejected: {}", definition.name, e);
                return Err(e);
            }
        };

        if let Some(previous) = scheduler.take() {
            previous.stop().await;
        }

        let active = Arc::new(ActiveScenario {
            definition: Arc::clone(&definition),
            store: Arc::clone(&store),
        });
        *self.active.write().unwrap_or_else(|p| p.into_inner()) = Some(active);

        *scheduler = Some(SimulationScheduler::start(
            store,
            self.tick_interval,
            self.seed,
        ));
        info!(
            "Scenario '{}' v{} by {} is active",
            definition.name, definition.version, definition.author
        );
        Ok(())
    }

    /// Stop the scheduler and drop the active scenario
    pub async fn shutdown(&self) {
        let mut scheduler = self.scheduler.lock().await;
        if let Some(running) = scheduler.take() {
            running.stop().await;
        }
        if let Some(active) = self
            .active
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .take()
        {
            info!("Scenario '{}' deactivated", active.definition.name);
        }
    }

    pub fn active(&self) -> Option<Arc<ActiveScenario>> {
        self.active
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    /// Store of the active scenario
    pub fn store(&self) -> SimulationResult<Arc<RegisterStore>> {
        self.active()
            .map(|active| Arc::clone(&active.store))
            .ok_or(SimulationError::NoActiveScenario)
    }

    /// Definition of the active scenario
    pub fn scenario(&self) -> Option<Arc<ScenarioDefinition>> {
        self.active().map(|active| Arc::clone(&active.definition))
    }
}
