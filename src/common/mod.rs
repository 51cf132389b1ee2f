// src/common/mod.rs

// --- Declare all public modules within common ---
pub mod crc;
pub mod error;
pub mod frame;
pub mod hal_traits;
pub mod request;
pub mod response;
pub mod timing;
pub mod types;

// --- Re-export key types/traits/functions for easier access ---

// From crc.rs
pub use crc::{calculate_crc16, decode_crc, encode_crc, is_valid_frame, verify_frame_crc};

// From error.rs
pub use error::{ConfigError, EngineError, MalformedReason, ProbeError};

// From frame.rs
pub use frame::{LineSettings, Parity, StopBits};

// From hal_traits.rs
pub use hal_traits::{
    DeviceFilter, DeviceInfo, PortEvent, ReceiveCallback, SerialBackend, SerialLink, VendorAllowList,
};

// From request.rs
pub use request::{ReadHoldingRegisters, RequestFrame};

// From response/mod.rs
pub use response::{decode_response, AssemblerStatus, FrameAssembler, ResponseFrame};

// From types.rs
pub use types::{
    ConnectionStatus, DisconnectReason, SensorReading, TransactionId, TransactionOutcome,
    TransactionRecord,
};
