// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-plc-honeypot project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio::time;

use crate::access::{AccessFacade, EventSink, LogEventSink};
use crate::config::Config;
use crate::modbus;
use crate::scenario::{ScenarioLoader, ScenarioOverlay};
use crate::simulation::SimulationEngine;

/// Seconds between two heartbeat log lines
const HEARTBEAT_PERIOD_SECS: u64 = 60;

/// Coordinates the simulation engine and the protocol listeners
///
/// # Fields
///
/// * `tasks` - Handles of the background tasks, joined on shutdown
/// * `running` - Flag shared with the tasks to coordinate shutdown
/// * `engine` - Owner of the active scenario and its scheduler
/// * `facade` - Access facade handed to every protocol front-end
pub struct Daemon {
    tasks: Vec<JoinHandle<Result<()>>>,
    running: Arc<AtomicBool>,
    engine: Arc<SimulationEngine>,
    facade: Option<AccessFacade>,
    sink: Arc<dyn EventSink>,
    modbus_addr: Option<SocketAddr>,
}

impl Default for Daemon {
    fn default() -> Self {
        Self::new()
    }
}

impl Daemon {
    /// Create a daemon reporting interactions through the log
    pub fn new() -> Self {
        Self::with_event_sink(Arc::new(LogEventSink))
    }

    /// Create a daemon reporting interactions to `sink`
    pub fn with_event_sink(sink: Arc<dyn EventSink>) -> Self {
        Daemon {
            tasks: Vec::new(),
            running: Arc::new(AtomicBool::new(true)),
            engine: Arc::new(SimulationEngine::new(Duration::from_secs(1), None)),
            facade: None,
            sink,
            modbus_addr: None,
        }
    }

    /// Launch all configured tasks based on configuration
    ///
    /// The configured scenario is loaded first, with the overlay file merged
    /// over it when one is configured. A scenario or overlay that cannot be
    /// read, or a merged scenario that fails validation, aborts the launch
    /// before any listener is bound. Then the Modbus listener (when enabled) and the heartbeat
    /// monitor are started.
    ///
    /// # Errors
    ///
    /// * The scenario or its overlay is missing or invalid
    /// * The Modbus listener fails to bind to the configured address
    pub async fn launch(&mut self, config: &Config) -> Result<()> {
        self.engine = Arc::new(SimulationEngine::new(
            config.simulation.tick_interval(),
            config.simulation.seed,
        ));

        let mut loader = ScenarioLoader::new(&config.simulation.scenario_dir);
        let mut scenario = loader
            .load(&config.simulation.scenario)
            .with_context(|| {
                format!(
                    "Failed to load scenario '{}' from {:?}",
                    config.simulation.scenario, config.simulation.scenario_dir
                )
            })?;
        if let Some(path) = &config.simulation.overrides {
            let overlay = ScenarioOverlay::from_file(path)
                .with_context(|| format!("Failed to load scenario overlay {:?}", path))?;
            info!("Merging scenario overlay {:?}", path);
            scenario = Arc::new(scenario.merged_with(&overlay));
        }
        self.engine
            .load(scenario)
            .await
            .context("Failed to activate scenario")?;

        let facade = AccessFacade::new(Arc::clone(&self.engine), Arc::clone(&self.sink));
        self.facade = Some(facade.clone());

        if config.modbus.enabled {
            self.start_modbus_server(config, facade).await?;
        }

        self.start_heartbeat()?;

        Ok(())
    }

    /// Bind the Modbus listener and serve it in a background task
    async fn start_modbus_server(&mut self, config: &Config, facade: AccessFacade) -> Result<()> {
        let bind = format!("{}:{}", config.modbus.address, config.modbus.port);
        info!("Starting Modbus server on {}", bind);

        let listener = TcpListener::bind(&bind)
            .await
            .with_context(|| format!("Failed to bind Modbus listener on {}", bind))?;
        self.modbus_addr = Some(listener.local_addr()?);

        let running = self.running.clone();
        let task = tokio::spawn(async move {
            let server_handle = tokio::spawn(async move {
                if let Err(e) = modbus::serve(listener, facade).await {
                    error!("Modbus server error: {}", e);
                }
            });

            while running.load(Ordering::SeqCst) {
                time::sleep(Duration::from_millis(200)).await;
            }

            info!("Shutting down Modbus server...");
            server_handle.abort();
            match time::timeout(Duration::from_secs(5), server_handle).await {
                Ok(_) => info!("Modbus server shut down successfully"),
                Err(_) => warn!("Modbus server shutdown timed out, forcing termination"),
            }
            Ok(())
        });

        self.tasks.push(task);
        info!("Modbus server started");
        Ok(())
    }

    /// Start a heartbeat task that logs the engine status periodically
    fn start_heartbeat(&mut self) -> Result<()> {
        debug!("Starting heartbeat monitor");

        let running = self.running.clone();
        let engine = Arc::clone(&self.engine);
        let task = tokio::spawn(async move {
            let mut seconds = 0u64;
            while running.load(Ordering::SeqCst) {
                time::sleep(Duration::from_secs(1)).await;
                seconds += 1;
                if seconds % HEARTBEAT_PERIOD_SECS != 0 {
                    continue;
                }
                match engine.store() {
                    Ok(store) => {
                        let overrides = store
                            .statuses()
                            .iter()
                            .filter(|status| status.override_value.is_some())
                            .count();
                        debug!(
                            "Daemon heartbeat: scenario '{}', {} cells, {} overridden",
                            store.scenario_name(),
                            store.len(),
                            overrides
                        );
                    }
                    Err(e) => debug!("Daemon heartbeat: {}", e),
                }
            }
            Ok(())
        });

        self.tasks.push(task);
        Ok(())
    }

    pub fn engine(&self) -> &Arc<SimulationEngine> {
        &self.engine
    }

    /// Access facade of the running daemon, `None` before `launch`
    pub fn facade(&self) -> Option<&AccessFacade> {
        self.facade.as_ref()
    }

    /// Actual address of the Modbus listener, useful when bound to port 0
    pub fn modbus_local_addr(&self) -> Option<SocketAddr> {
        self.modbus_addr
    }

    /// Stop the listeners, then the scheduler.
    ///
    /// The scheduler stop waits for its in-flight tick.
    pub async fn shutdown(self) -> Result<()> {
        info!("Shutting down daemon tasks");
        self.running.store(false, Ordering::SeqCst);

        for task in self.tasks {
            match time::timeout(Duration::from_secs(5), task).await {
                Ok(Ok(Err(e))) => error!("Task failed: {:#}", e),
                Ok(Err(e)) => error!("Task panicked: {}", e),
                Ok(Ok(Ok(()))) => {}
                Err(_) => warn!("Task did not complete within timeout period, may be hung"),
            }
        }

        self.engine.shutdown().await;
        Ok(())
    }
}
