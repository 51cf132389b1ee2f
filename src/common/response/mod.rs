// src/common/response/mod.rs

mod assembler;
pub mod decode;

pub use assembler::{AssemblerStatus, FrameAssembler};
pub use decode::decode_response;

use heapless::Vec as HVec;

/// Largest Modbus RTU application data unit, CRC included.
pub const MAX_ADU_LEN: usize = 256;

/// One complete response frame as cut from the receive stream (CRC not yet checked).
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ResponseFrame(pub(crate) HVec<u8, MAX_ADU_LEN>);

impl ResponseFrame {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn unit_id(&self) -> u8 {
        self.0[0]
    }

    pub fn function_code(&self) -> u8 {
        self.0[1]
    }

    /// True for a Modbus exception reply (function code high bit set).
    pub fn is_exception(&self) -> bool {
        self.function_code() & 0x80 != 0
    }
}
