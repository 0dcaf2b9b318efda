// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-plc-honeypot project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! # Daemon Module
//!
//! Process lifecycle of the honeypot: activates the configured scenario,
//! runs the simulation scheduler and the Modbus TCP listener, and shuts them
//! down in order.
//!
//! ## Usage
//!
//! ```no_run
//! use rust_plc_honeypot::{config::Config, daemon::Daemon};
//!
//! async fn run() -> anyhow::Result<()> {
//!     let config = Config::from_file("config.yaml")?;
//!
//!     let mut daemon = Daemon::new();
//!     daemon.launch(&config).await?;
//!
//!     // Wait for shutdown signal (e.g., Ctrl+C)
//!     tokio::signal::ctrl_c().await?;
//!
//!     daemon.shutdown().await
//! }
//! ```

pub mod launch_daemon;

pub use launch_daemon::Daemon;
