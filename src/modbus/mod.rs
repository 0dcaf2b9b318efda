// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-plc-honeypot project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Modbus communication module
//!
//! Modbus TCP front-end exposing the simulated PLC memory. PDU encoding and
//! the TCP framing are handled by `tokio-modbus`; this module only translates
//! requests into access facade calls and engine errors into Modbus
//! exceptions.
//!
//! ## Usage
//!
//! ```no_run
//! use rust_plc_honeypot::access::{AccessFacade, LogEventSink};
//! use rust_plc_honeypot::simulation::SimulationEngine;
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tokio::net::TcpListener;
//!
//! # async fn run() -> std::io::Result<()> {
//! let engine = Arc::new(SimulationEngine::new(Duration::from_secs(1), None));
//! let facade = AccessFacade::new(engine, Arc::new(LogEventSink));
//! let listener = TcpListener::bind("0.0.0.0:5020").await?;
//! rust_plc_honeypot::modbus::serve(listener, facade).await
//! # }
//! ```

pub mod modbus_server;
pub use modbus_server::{exception_for, serve, ModbusService};
