// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-plc-honeypot project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! # Simulation scheduler
//!
//! One periodic task per active scenario. On every tick the scheduler walks
//! the stateful cells of the register store, asks each waveform for its next
//! value and commits it. Time-pure cells are never visited: they are computed
//! when read.
//!
//! The scheduler is the only writer of generator state. A failing cell is
//! logged and skipped for the current tick, the remaining cells still advance.
//!
//! Stopping is cooperative: [`SimulationScheduler::stop`] sends a stop
//! command and waits for the task to return, so an in-flight tick always
//! completes before the caller proceeds.

use log::{debug, error, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use super::store::RegisterStore;
use crate::error::{SimulationError, SimulationResult};
use crate::simulation::store::CellAddress;

/// Outcome of one tick
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Cells whose new value was committed
    pub advanced: usize,
    /// Cells skipped because of an error
    pub skipped: usize,
}

#[derive(Debug)]
enum SchedulerCommand {
    Stop,
}

fn advance_cell<R: Rng>(
    store: &RegisterStore,
    address: &CellAddress,
    elapsed: Duration,
    rng: &mut R,
) -> SimulationResult<()> {
    let input = store.tick_input(address, elapsed)?;
    let (value, state) = input
        .spec
        .waveform
        .next(input.kind, &input.ctx, &input.state, rng)
        .map_err(|reason| SimulationError::InternalState {
            address: *address,
            reason,
        })?;
    store.commit_tick(address, value, state)
}

/// Advance every stateful cell of `store` once, as of `elapsed`
pub fn advance_all<R: Rng>(store: &RegisterStore, elapsed: Duration, rng: &mut R) -> TickReport {
    let mut report = TickReport::default();
    for address in store.stateful_addresses() {
        match advance_cell(store, address, elapsed, rng) {
            Ok(()) => report.advanced += 1,
            Err(e) => {
                error!("Tick skipped cell {}: {}", address, e);
                report.skipped += 1;
            }
        }
    }
    report
}

/// Handle on the periodic task driving one register store
#[derive(Debug)]
pub struct SimulationScheduler {
    commands: mpsc::Sender<SchedulerCommand>,
    task: JoinHandle<u64>,
}

impl SimulationScheduler {
    /// Spawn the tick loop on the current tokio runtime.
    ///
    /// With `seed` the scheduler RNG is reproducible, otherwise it is drawn
    /// from OS entropy. The first tick fires one `interval` after start.
    pub fn start(store: Arc<RegisterStore>, interval: Duration, seed: Option<u64>) -> Self {
        let (commands, mut receiver) = mpsc::channel(1);
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        info!(
            "Starting simulation scheduler for '{}' ({} stateful cells, tick {:?})",
            store.scenario_name(),
            store.stateful_addresses().len(),
            interval
        );

        let task = tokio::spawn(async move {
            let mut ticker = time::interval_at(time::Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut ticks = 0u64;
            loop {
                tokio::select! {
                    command = receiver.recv() => {
                        // a dropped handle stops the loop as well
                        if matches!(command, Some(SchedulerCommand::Stop) | None) {
                            break;
                        }
                    }
                    _ = ticker.tick() => {
                        let report = advance_all(&store, store.elapsed(), &mut rng);
                        ticks += 1;
                        debug!(
                            "Tick {} of '{}': {} advanced, {} skipped",
                            ticks,
                            store.scenario_name(),
                            report.advanced,
                            report.skipped
                        );
                    }
                }
            }
            ticks
        });

        Self { commands, task }
    }

    /// Stop the loop and wait for the in-flight tick, returns the number of ticks run
    pub async fn stop(self) -> u64 {
        // the task may already be gone, join it anyway
        let _ = self.commands.send(SchedulerCommand::Stop).await;
        match self.task.await {
            Ok(ticks) => {
                info!("Simulation scheduler stopped after {} ticks", ticks);
                ticks
            }
            Err(e) => {
                error!("Simulation scheduler task failed: {}", e);
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::ScenarioDefinition;
    use crate::simulation::value::CellValue;
    use crate::simulation::waveform::GeneratorState;

    fn store() -> RegisterStore {
        let def = ScenarioDefinition::from_json(
            r#"{"name": "tick", "modbus": {"registers": [
                {"addr": 0, "wave": "counter", "max": 5},
                {"addr": 1, "wave": "fixed", "value": 9},
                {"addr": 2, "wave": "counter"}
            ]}}"#,
        )
        .unwrap();
        RegisterStore::from_scenario(&def, 5).unwrap()
    }

    #[test]
    fn test_advance_all_skips_time_pure_cells() {
        let store = store();
        let mut rng = StdRng::seed_from_u64(1);
        let report = advance_all(&store, Duration::from_secs(1), &mut rng);
        assert_eq!(report, TickReport { advanced: 2, skipped: 0 });
    }

    #[test]
    fn test_broken_cell_does_not_stop_the_tick() {
        let store = store();
        let broken = CellAddress::holding_register(0);
        store
            .commit_tick(&broken, CellValue::Integer(0), GeneratorState::Stateless)
            .unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let report = advance_all(&store, Duration::from_secs(1), &mut rng);
        assert_eq!(report, TickReport { advanced: 1, skipped: 1 });
        assert_eq!(
            store.read(&CellAddress::holding_register(2)).unwrap(),
            CellValue::Integer(0)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduler_ticks_and_stops() {
        let store = Arc::new(store());
        let scheduler = SimulationScheduler::start(Arc::clone(&store), Duration::from_secs(1), Some(7));
        time::sleep(Duration::from_millis(3500)).await;
        let ticks = scheduler.stop().await;
        assert_eq!(ticks, 3);
        // ticks emitted 0, 1, 2
        assert_eq!(
            store.read(&CellAddress::holding_register(0)).unwrap(),
            CellValue::Integer(2)
        );
    }
}
