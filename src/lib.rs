// src/lib.rs

//! Polling engine for USB-attached Modbus RTU soil probes.
//!
//! The `common` layer holds the wire protocol (CRC, request and response
//! frames, the data model) and the transport traits. The `poller` layer runs
//! the request/response cycle over a transport: one transaction in flight at a
//! time, a fixed polling cadence while the host is in the foreground, and
//! recovery from timeouts, corrupted frames and disconnects.
//!
//! Hosts build a [`ProbeEngine`] from a [`SerialBackend`] and an
//! [`EngineConfig`], spawn it on a tokio runtime, and consume readings,
//! transaction records and status changes from [`EngineEvents`].

pub mod common;
pub mod config;
pub mod poller;

#[cfg(feature = "serialport")]
pub mod backend;

// Re-export key types for convenience
pub use common::{
    ConnectionStatus, DeviceFilter, DeviceInfo, EngineError, LineSettings, ProbeError,
    SensorReading, SerialBackend, SerialLink, TransactionOutcome, TransactionRecord,
};
pub use config::EngineConfig;
pub use poller::{EngineEvents, EngineHandle, ProbeEngine};

#[cfg(feature = "serialport")]
pub use backend::SerialPortBackend;
