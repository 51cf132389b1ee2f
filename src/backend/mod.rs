// src/backend/mod.rs

//! Concrete transports.

pub mod serialport;

pub use self::serialport::{SerialPortBackend, SerialPortLink};
