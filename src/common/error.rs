// src/common/error.rs

/// Why an assembled response could not be used.
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum MalformedReason {
    /// Frame shorter than header plus CRC.
    #[error("frame too short")]
    TooShort,

    /// Declared byte count implies a frame beyond the RTU ADU limit.
    #[error("declared length {0} exceeds the 256-byte ADU limit")]
    DeclaredLengthTooLong(usize),

    /// Response came from a different unit than the one addressed.
    #[error("unexpected unit id {0}")]
    UnitMismatch(u8),

    /// Response echoed a different function code.
    #[error("unexpected function code {0:#04x}")]
    FunctionMismatch(u8),

    /// Byte count does not match the number of registers requested.
    #[error("byte count {got} does not match the {expected} bytes requested")]
    ByteCountMismatch { expected: usize, got: usize },
}

#[derive(Debug, thiserror::Error)]
pub enum ProbeError<E = ()>
where
    E: core::fmt::Debug,
{
    /// Underlying I/O error from the serial transport.
    #[error("I/O error: {0:?}")]
    Io(E),

    /// A transaction is already in flight.
    #[error("a transaction is already in flight")]
    Busy,

    /// Device found but the OS refused access to it.
    #[error("permission to open the serial device was denied")]
    PermissionDenied,

    /// Received CRC does not match calculated CRC.
    #[error("CRC mismatch: expected {expected:#06x}, calculated {calculated:#06x}")]
    CrcMismatch { expected: u16, calculated: u16 },

    /// Response cannot be a valid reply to the request.
    #[error("malformed frame: {0}")]
    MalformedFrame(MalformedReason),

    /// Device answered with a Modbus exception code.
    #[error("device returned Modbus exception {0:#04x}")]
    DeviceException(u8),
}

impl<E: core::fmt::Debug> From<MalformedReason> for ProbeError<E> {
    fn from(reason: MalformedReason) -> Self {
        ProbeError::MalformedFrame(reason)
    }
}

/// Configuration could not be loaded or is inconsistent.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Failures of the engine handle itself, as opposed to the link.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The engine task is no longer running.
    #[error("engine has stopped")]
    Stopped,

    /// The engine task panicked or was cancelled.
    #[error("engine task failed: {0}")]
    TaskFailed(#[from] tokio::task::JoinError),
}
