// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-plc-honeypot project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Modbus TCP front-end of the honeypot
//!
//! To avoid the master/slave terminology this module speaks of "server" (the
//! simulated PLC answering requests) and "client" (the peer issuing them).
//!
//! One [`ModbusService`] is created per TCP connection and carries the peer
//! address, which becomes the caller identity of every interaction event.
//! Requests are translated into access facade calls; the register map is
//! whatever the active scenario declares.
//!
//! ## Supported function codes
//!
//! | Code | Function                 | Table             |
//! |------|--------------------------|-------------------|
//! | 0x01 | Read Coils               | coils             |
//! | 0x02 | Read Discrete Inputs     | discrete inputs   |
//! | 0x03 | Read Holding Registers   | holding registers |
//! | 0x04 | Read Input Registers     | input registers   |
//! | 0x05 | Write Single Coil        | coils             |
//! | 0x06 | Write Single Register    | holding registers |
//! | 0x0F | Write Multiple Coils     | coils             |
//! | 0x10 | Write Multiple Registers | holding registers |
//!
//! Any other function code is answered with `IllegalFunction`.

use std::{future, io, net::SocketAddr};

use log::{debug, error, info, warn};
use tokio::net::TcpListener;
use tokio_modbus::{
    prelude::*,
    server::tcp::{accept_tcp_connection, Server},
};

use crate::access::AccessFacade;
use crate::error::{SimulationError, SimulationResult};
use crate::simulation::AddressSpace;

/// Largest quantity of coils/discrete inputs in one read request
pub const MAX_READ_BITS: u16 = 2000;
/// Largest quantity of registers in one read request
pub const MAX_READ_REGISTERS: u16 = 125;
/// Largest quantity of coils in one write request
pub const MAX_WRITE_BITS: u16 = 1968;
/// Largest quantity of registers in one write request
pub const MAX_WRITE_REGISTERS: u16 = 123;

/// Map an engine error to the Modbus exception answered to the client
pub fn exception_for(error: &SimulationError) -> ExceptionCode {
    match error {
        SimulationError::UnknownAddress(_) | SimulationError::NoActiveScenario => {
            ExceptionCode::IllegalDataAddress
        }
        SimulationError::InvalidValue { .. } => ExceptionCode::IllegalDataValue,
        SimulationError::ScenarioConfig(_) | SimulationError::InternalState { .. } => {
            ExceptionCode::ServerDeviceFailure
        }
    }
}

fn check_quantity(count: usize, max: u16) -> Result<(), ExceptionCode> {
    if count == 0 || count > max as usize {
        warn!("Modbus quantity {} outside 1..={}", count, max);
        return Err(ExceptionCode::IllegalDataValue);
    }
    Ok(())
}

/// Address of the `offset`-th item of a request starting at `start`
fn nth_address(start: u16, offset: usize) -> Result<u16, ExceptionCode> {
    u16::try_from(start as usize + offset).map_err(|_| ExceptionCode::IllegalDataAddress)
}

/// Per-connection Modbus service backed by the simulation engine
#[derive(Debug, Clone)]
pub struct ModbusService {
    facade: AccessFacade,
    caller: String,
}

impl ModbusService {
    pub fn new(facade: AccessFacade, peer: SocketAddr) -> Self {
        Self {
            facade,
            caller: peer.to_string(),
        }
    }

    fn read_many<T>(
        &self,
        start: u16,
        count: u16,
        max: u16,
        read: impl Fn(&AccessFacade, u16, &str) -> SimulationResult<T>,
    ) -> Result<Vec<T>, ExceptionCode> {
        check_quantity(count as usize, max)?;
        (0..count as usize)
            .map(|offset| {
                let address = nth_address(start, offset)?;
                read(&self.facade, address, &self.caller).map_err(|e| exception_for(&e))
            })
            .collect()
    }

    /// All addresses are checked before the first cell is written
    fn write_many<T: Copy>(
        &self,
        space: AddressSpace,
        start: u16,
        values: &[T],
        max: u16,
        write: impl Fn(&AccessFacade, u16, T, &str) -> SimulationResult<()>,
    ) -> Result<(), ExceptionCode> {
        check_quantity(values.len(), max)?;
        nth_address(start, values.len() - 1)?;
        self.facade
            .ensure_range(space, start, values.len() as u16)
            .map_err(|e| exception_for(&e))?;
        for (offset, value) in values.iter().enumerate() {
            let address = nth_address(start, offset)?;
            write(&self.facade, address, *value, &self.caller).map_err(|e| exception_for(&e))?;
        }
        Ok(())
    }
}

impl tokio_modbus::server::Service for ModbusService {
    type Request = Request<'static>;
    type Response = Response;
    type Exception = ExceptionCode;
    type Future = future::Ready<Result<Self::Response, Self::Exception>>;

    fn call(&self, req: Self::Request) -> Self::Future {
        debug!("Modbus request from {}: {:?}", self.caller, req);

        let res = match req {
            Request::ReadCoils(addr, cnt) => self
                .read_many(addr, cnt, MAX_READ_BITS, AccessFacade::read_coil)
                .map(Response::ReadCoils),
            Request::ReadDiscreteInputs(addr, cnt) => self
                .read_many(addr, cnt, MAX_READ_BITS, AccessFacade::read_discrete_input)
                .map(Response::ReadDiscreteInputs),
            Request::ReadHoldingRegisters(addr, cnt) => self
                .read_many(addr, cnt, MAX_READ_REGISTERS, AccessFacade::read_holding_register)
                .map(Response::ReadHoldingRegisters),
            Request::ReadInputRegisters(addr, cnt) => self
                .read_many(addr, cnt, MAX_READ_REGISTERS, AccessFacade::read_input_register)
                .map(Response::ReadInputRegisters),
            Request::WriteSingleCoil(addr, state) => self
                .facade
                .write_coil(addr, state, &self.caller)
                .map(|_| Response::WriteSingleCoil(addr, state))
                .map_err(|e| exception_for(&e)),
            Request::WriteSingleRegister(addr, word) => self
                .facade
                .write_holding_register(addr, word, &self.caller)
                .map(|_| Response::WriteSingleRegister(addr, word))
                .map_err(|e| exception_for(&e)),
            Request::WriteMultipleCoils(addr, states) => self
                .write_many(
                    AddressSpace::Coils,
                    addr,
                    &states[..],
                    MAX_WRITE_BITS,
                    AccessFacade::write_coil,
                )
                .map(|_| Response::WriteMultipleCoils(addr, states.len() as u16)),
            Request::WriteMultipleRegisters(addr, words) => self
                .write_many(
                    AddressSpace::HoldingRegisters,
                    addr,
                    &words[..],
                    MAX_WRITE_REGISTERS,
                    AccessFacade::write_holding_register,
                )
                .map(|_| Response::WriteMultipleRegisters(addr, words.len() as u16)),
            _ => {
                error!(
                    "Exception::IllegalFunction - Unimplemented function code in request from {}: {req:?}",
                    self.caller
                );
                Err(ExceptionCode::IllegalFunction)
            }
        };

        if let Err(e) = &res {
            debug!("Modbus exception for {}: {:?}", self.caller, e);
        }

        future::ready(res)
    }
}

/// Accept Modbus TCP connections on `listener` until the future is dropped
pub async fn serve(listener: TcpListener, facade: AccessFacade) -> io::Result<()> {
    let server = Server::new(listener);

    let on_connected = move |stream, socket_addr: SocketAddr| {
        let facade = facade.clone();
        async move {
            info!("Modbus client connected from {}", socket_addr);
            accept_tcp_connection(stream, socket_addr, move |peer| {
                Ok(Some(ModbusService::new(facade.clone(), peer)))
            })
        }
    };

    let on_process_error = |err| {
        error!("Modbus server error: {err}");
    };

    server.serve(&on_connected, on_process_error).await
}
