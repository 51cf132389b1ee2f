// src/common/response/decode.rs

use chrono::{DateTime, Local};

use super::ResponseFrame;
use crate::common::crc::{verify_frame_crc, CRC_LEN};
use crate::common::error::{MalformedReason, ProbeError};
use crate::common::request::ReadHoldingRegisters;
use crate::common::types::SensorReading;

/// Turns a complete response frame into a reading.
///
/// Order of checks: CRC, then exception reply, then the echoed unit id,
/// function code and byte count against `request`.
///
/// # Arguments
///
/// * `frame`: a frame produced by the [`FrameAssembler`](super::FrameAssembler).
/// * `request`: the request this frame answers.
/// * `timestamp`: capture time stamped on the reading.
///
/// # Returns
///
/// * `Ok(SensorReading)` with all six channels scaled.
/// * `Err(ProbeError::CrcMismatch)` if the trailer is wrong.
/// * `Err(ProbeError::DeviceException)` for a CRC-valid exception reply.
/// * `Err(ProbeError::MalformedFrame)` if the frame does not answer `request`.
pub fn decode_response(
    frame: &ResponseFrame,
    request: &ReadHoldingRegisters,
    timestamp: DateTime<Local>,
) -> Result<SensorReading, ProbeError> {
    let bytes = frame.as_bytes();
    verify_frame_crc::<()>(bytes)?;

    if frame.is_exception() {
        // The exception code sits where the byte count would be.
        return Err(ProbeError::DeviceException(bytes[2]));
    }
    if frame.unit_id() != request.unit_id {
        return Err(MalformedReason::UnitMismatch(frame.unit_id()).into());
    }
    if frame.function_code() != crate::common::request::READ_HOLDING_REGISTERS {
        return Err(MalformedReason::FunctionMismatch(frame.function_code()).into());
    }

    let data = bytes
        .get(3..bytes.len() - CRC_LEN)
        .ok_or(MalformedReason::TooShort)?;
    let expected = SensorReading::REGISTER_COUNT * 2;
    if data.len() != expected {
        return Err(MalformedReason::ByteCountMismatch { expected, got: data.len() }.into());
    }

    let mut registers = [0u16; SensorReading::REGISTER_COUNT];
    for (register, pair) in registers.iter_mut().zip(data.chunks_exact(2)) {
        *register = u16::from_be_bytes([pair[0], pair[1]]);
    }

    Ok(SensorReading::from_registers(registers, timestamp))
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::crc::{calculate_crc16, encode_crc};
    use crate::common::response::{AssemblerStatus, FrameAssembler};

    fn frame_of(data: &[u8]) -> ResponseFrame {
        let mut bytes = data.to_vec();
        bytes.extend_from_slice(&encode_crc(calculate_crc16(data)));
        let mut asm = FrameAssembler::new();
        match asm.push(&bytes) {
            AssemblerStatus::Complete(frame) => frame,
            other => panic!("test frame did not assemble: {:?}", other),
        }
    }

    fn decode(frame: &ResponseFrame) -> Result<SensorReading, ProbeError> {
        decode_response(frame, &ReadHoldingRegisters::SENSOR_BLOCK, Local::now())
    }

    #[test]
    fn test_canonical_response() {
        let frame = frame_of(&[
            0x01, 0x03, 0x0C, 0x00, 0xFA, 0x01, 0xF4, 0x02, 0x8C, 0x00, 0x32, 0x00, 0x19, 0x00, 0x28,
        ]);
        let reading = decode(&frame).unwrap();
        assert_eq!(reading.temperature_c, 25.0);
        assert_eq!(reading.humidity_pct, 50.0);
        assert_eq!(reading.ph, 6.52);
        assert_eq!(reading.nitrogen_ppm, 50);
        assert_eq!(reading.phosphorus_ppm, 25);
        assert_eq!(reading.potassium_ppm, 40);
    }

    #[test]
    fn test_crc_checked_first() {
        let mut bytes = vec![0x02, 0x03, 0x02, 0x00, 0x01];
        bytes.extend_from_slice(&[0x00, 0x00]);
        let mut asm = FrameAssembler::new();
        let AssemblerStatus::Complete(frame) = asm.push(&bytes) else {
            panic!("frame did not assemble");
        };
        // wrong unit and wrong byte count, but the CRC is reported
        assert!(matches!(decode(&frame), Err(ProbeError::CrcMismatch { .. })));
    }

    #[test]
    fn test_exception_reply() {
        let frame = frame_of(&[0x01, 0x83, 0x02]);
        assert!(matches!(decode(&frame), Err(ProbeError::DeviceException(0x02))));
    }

    #[test]
    fn test_wrong_unit() {
        let frame = frame_of(&[0x07, 0x03, 0x0C, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
        assert!(matches!(
            decode(&frame),
            Err(ProbeError::MalformedFrame(MalformedReason::UnitMismatch(0x07)))
        ));
    }

    #[test]
    fn test_wrong_function() {
        let frame = frame_of(&[0x01, 0x04, 0x0C, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
        assert!(matches!(
            decode(&frame),
            Err(ProbeError::MalformedFrame(MalformedReason::FunctionMismatch(0x04)))
        ));
    }

    #[test]
    fn test_short_register_block() {
        let frame = frame_of(&[0x01, 0x03, 0x04, 0x00, 0xFA, 0x01, 0xF4]);
        assert!(matches!(
            decode(&frame),
            Err(ProbeError::MalformedFrame(MalformedReason::ByteCountMismatch { expected: 12, got: 4 }))
        ));
    }

    #[test]
    fn test_empty_register_block() {
        let frame = frame_of(&[0x01, 0x03, 0x00]);
        assert!(matches!(
            decode(&frame),
            Err(ProbeError::MalformedFrame(MalformedReason::ByteCountMismatch { expected: 12, got: 0 }))
        ));
    }
}
