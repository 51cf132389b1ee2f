//! The one request this engine ever sends.
//!
//! Modbus RTU function 3 ("read holding registers"): `unit, 0x03, start_hi,
//! start_lo, qty_hi, qty_lo, crc_lo, crc_hi`.

use arrayvec::ArrayVec;
use core::fmt;

use super::crc::{calculate_crc16, encode_crc};

/// Modbus function code for "read holding registers".
pub const READ_HOLDING_REGISTERS: u8 = 0x03;

/// Encoded length of a read-holding-registers request, CRC included.
pub const REQUEST_LEN: usize = 8;

/// Encoded request frame.
pub type RequestFrame = ArrayVec<u8, REQUEST_LEN>;

/// A "read holding registers" request.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct ReadHoldingRegisters {
    pub unit_id: u8,
    pub start_address: u16,
    pub quantity: u16,
}

impl ReadHoldingRegisters {
    /// Unit 1, registers 0..6: temperature, humidity, pH, N, P, K.
    pub const SENSOR_BLOCK: ReadHoldingRegisters = ReadHoldingRegisters {
        unit_id: 0x01,
        start_address: 0x0000,
        quantity: 6,
    };

    /// Number of data bytes a well-formed response carries.
    pub const fn expected_byte_count(&self) -> usize {
        self.quantity as usize * 2
    }

    /// Serializes the request and appends its CRC (low byte first).
    pub fn encode(&self) -> RequestFrame {
        let mut frame = RequestFrame::new();
        frame.push(self.unit_id);
        frame.push(READ_HOLDING_REGISTERS);
        frame.extend(self.start_address.to_be_bytes());
        frame.extend(self.quantity.to_be_bytes());
        let crc = calculate_crc16(&frame);
        frame.extend(encode_crc(crc));
        frame
    }
}

impl Default for ReadHoldingRegisters {
    fn default() -> Self {
        Self::SENSOR_BLOCK
    }
}

impl fmt::Display for ReadHoldingRegisters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unit {} read {} holding register(s) from {:#06x}",
            self.unit_id, self.quantity, self.start_address
        )
    }
}
