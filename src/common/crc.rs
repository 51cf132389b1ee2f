// src/common/crc.rs

use super::error::{MalformedReason, ProbeError};
use crc::{Algorithm, Crc};

/// CRC algorithm used by Modbus RTU (CRC-16/MODBUS).
/// Polynomial: 0x8005 (normal representation of 0xA001 reversed)
/// Initial Value: 0xFFFF
/// Input Reflected: true
/// Output Reflected: true
/// Final XOR: 0x0000
/// Check Value: 0x4B37 (for "123456789")
/// Residue: 0x0000
pub const MODBUS_CRC: Algorithm<u16> = Algorithm {
    width: 16,
    poly: 0x8005,
    init: 0xFFFF,
    refin: true,
    refout: true,
    xorout: 0x0000,
    check: 0x4B37,
    residue: 0x0000,
};

const CRC_COMPUTER: Crc<u16> = Crc::<u16>::new(&MODBUS_CRC);

/// Length of the CRC trailer on every RTU frame.
pub const CRC_LEN: usize = 2;

/// Calculates the Modbus CRC16 over `data`.
///
/// Equivalent to the bitwise definition: seed `0xFFFF`, XOR each byte into the
/// low byte, then eight rounds of shift-right with a conditional XOR of `0xA001`.
///
/// # Arguments
///
/// * `data`: every byte of the frame that precedes the CRC trailer.
///
/// # Returns
///
/// The 16-bit CRC value (transmit it with [`encode_crc`]).
#[inline]
pub fn calculate_crc16(data: &[u8]) -> u16 {
    CRC_COMPUTER.checksum(data)
}

/// Encodes a CRC into its on-wire order: low byte first, then high byte.
pub fn encode_crc(crc_value: u16) -> [u8; CRC_LEN] {
    crc_value.to_le_bytes()
}

/// Decodes an on-wire CRC trailer (low byte first).
///
/// # Panics
///
/// Panics if `crc_bytes` does not have a length of exactly 2.
pub fn decode_crc(crc_bytes: &[u8]) -> u16 {
    assert_eq!(crc_bytes.len(), CRC_LEN, "Modbus CRC must be 2 bytes long");
    u16::from_le_bytes([crc_bytes[0], crc_bytes[1]])
}

/// Verifies a complete frame whose last two bytes are its CRC.
///
/// # Returns
///
/// * `Ok(())` if the trailer matches the CRC of every preceding byte.
/// * `Err(ProbeError::MalformedFrame)` if the frame cannot hold a payload and a CRC.
/// * `Err(ProbeError::CrcMismatch)` if the CRCs don't match.
pub fn verify_frame_crc<E>(frame: &[u8]) -> Result<(), ProbeError<E>>
where
    E: core::fmt::Debug,
{
    if frame.len() <= CRC_LEN {
        return Err(ProbeError::MalformedFrame(MalformedReason::TooShort));
    }
    let data_len = frame.len() - CRC_LEN;
    let calculated = calculate_crc16(&frame[..data_len]);
    let expected = decode_crc(&frame[data_len..]);

    if calculated == expected {
        Ok(())
    } else {
        Err(ProbeError::CrcMismatch { expected, calculated })
    }
}

/// Convenience for `verify_frame_crc(frame).is_ok()`.
#[inline]
pub fn is_valid_frame(frame: &[u8]) -> bool {
    verify_frame_crc::<()>(frame).is_ok()
}
