// src/common/response/assembler.rs

use heapless::Vec as HVec;

use super::{ResponseFrame, MAX_ADU_LEN};
use crate::common::crc::CRC_LEN;
use crate::common::error::MalformedReason;

/// unit id + function code + byte count.
const HEADER_LEN: usize = 3;

/// Result of pushing a chunk into the [`FrameAssembler`].
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum AssemblerStatus {
    /// More bytes are needed.
    Incomplete,
    /// A full frame is present. Bytes past its end are ignored.
    Complete(ResponseFrame),
    /// The buffered bytes can never become a frame.
    Malformed(MalformedReason),
}

/// Accumulates received chunks until one RTU response frame is present.
///
/// Shape: `[unit][function][byte_count][data; byte_count][crc_lo][crc_hi]`,
/// or a 5-byte exception frame when the function code has its high bit set.
/// CRC is not checked here.
#[derive(Debug, Default, Clone)]
pub struct FrameAssembler {
    buffer: HVec<u8, MAX_ADU_LEN>,
}

impl FrameAssembler {
    pub fn new() -> Self {
        FrameAssembler { buffer: HVec::new() }
    }

    /// Appends `chunk` and reports whether a frame is now available.
    pub fn push(&mut self, chunk: &[u8]) -> AssemblerStatus {
        for &byte in chunk {
            // A full buffer always holds a complete frame (lengths are capped at
            // MAX_ADU_LEN below), so surplus bytes can be dropped.
            if self.buffer.push(byte).is_err() {
                break;
            }
        }
        self.status()
    }

    /// Re-evaluates the buffered bytes without appending anything.
    pub fn status(&self) -> AssemblerStatus {
        let expected = match self.expected_len() {
            Ok(Some(len)) => len,
            Ok(None) => return AssemblerStatus::Incomplete,
            Err(reason) => return AssemblerStatus::Malformed(reason),
        };

        if self.buffer.len() < expected {
            return AssemblerStatus::Incomplete;
        }

        let mut frame = HVec::new();
        // expected <= MAX_ADU_LEN, so this cannot overflow
        let _ = frame.extend_from_slice(&self.buffer[..expected]);
        AssemblerStatus::Complete(ResponseFrame(frame))
    }

    /// Total frame length implied by the header, once it is known.
    fn expected_len(&self) -> Result<Option<usize>, MalformedReason> {
        let Some(&function) = self.buffer.get(1) else {
            return Ok(None);
        };
        if function & 0x80 != 0 {
            // unit, function | 0x80, exception code, crc
            return Ok(Some(HEADER_LEN + CRC_LEN));
        }
        let Some(&byte_count) = self.buffer.get(2) else {
            return Ok(None);
        };
        let expected = usize::from(byte_count) + HEADER_LEN + CRC_LEN;
        if expected > MAX_ADU_LEN {
            return Err(MalformedReason::DeclaredLengthTooLong(expected));
        }
        Ok(Some(expected))
    }

    /// Raw bytes received so far.
    pub fn buffered(&self) -> &[u8] {
        &self.buffer
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::crc::{calculate_crc16, encode_crc};

    fn with_crc(data: &[u8]) -> Vec<u8> {
        let mut frame = data.to_vec();
        frame.extend_from_slice(&encode_crc(calculate_crc16(data)));
        frame
    }

    fn canonical_response() -> Vec<u8> {
        with_crc(&[
            0x01, 0x03, 0x0C, 0x00, 0xFA, 0x01, 0xF4, 0x02, 0x8C, 0x00, 0x32, 0x00, 0x19, 0x00, 0x28,
        ])
    }

    fn expect_complete(status: AssemblerStatus) -> ResponseFrame {
        match status {
            AssemblerStatus::Complete(frame) => frame,
            other => panic!("expected Complete, got {:?}", other),
        }
    }

    #[test]
    fn test_needs_header_before_length_is_known() {
        let mut asm = FrameAssembler::new();
        assert_eq!(asm.push(&[]), AssemblerStatus::Incomplete);
        assert_eq!(asm.push(&[0x01]), AssemblerStatus::Incomplete);
        assert_eq!(asm.push(&[0x03]), AssemblerStatus::Incomplete);
        assert_eq!(asm.push(&[0x0C]), AssemblerStatus::Incomplete);
        assert_eq!(asm.buffered(), &[0x01, 0x03, 0x0C]);
    }

    #[test]
    fn test_whole_frame_in_one_chunk() {
        let response = canonical_response();
        let mut asm = FrameAssembler::new();
        let frame = expect_complete(asm.push(&response));
        assert_eq!(frame.as_bytes(), response.as_slice());
        assert_eq!(frame.len(), 17);
    }

    #[test]
    fn test_chunking_does_not_change_the_frame() {
        let response = canonical_response();

        let mut all_at_once = FrameAssembler::new();
        let expected = expect_complete(all_at_once.push(&response));

        let mut one_by_one = FrameAssembler::new();
        let (last, head) = response.split_last().unwrap();
        for byte in head {
            assert_eq!(one_by_one.push(core::slice::from_ref(byte)), AssemblerStatus::Incomplete);
        }
        assert_eq!(expect_complete(one_by_one.push(&[*last])), expected);

        for split in 1..response.len() {
            let mut two_chunks = FrameAssembler::new();
            let _ = two_chunks.push(&response[..split]);
            assert_eq!(expect_complete(two_chunks.push(&response[split..])), expected, "split at {}", split);
        }
    }

    #[test]
    fn test_trailing_bytes_are_ignored() {
        let mut bytes = canonical_response();
        bytes.extend_from_slice(&[0xAA, 0xBB, 0xCC]);
        let mut asm = FrameAssembler::new();
        let frame = expect_complete(asm.push(&bytes));
        assert_eq!(frame.as_bytes(), canonical_response().as_slice());
    }

    #[test]
    fn test_exception_frame_is_five_bytes() {
        let exception = with_crc(&[0x01, 0x83, 0x02]);
        let mut asm = FrameAssembler::new();
        assert_eq!(asm.push(&exception[..2]), AssemblerStatus::Incomplete);
        let frame = expect_complete(asm.push(&exception[2..]));
        assert_eq!(frame.len(), 5);
    }

    #[test]
    fn test_largest_legal_byte_count() {
        // 251 data bytes is the most that fits in a 256-byte ADU
        let mut asm = FrameAssembler::new();
        assert_eq!(asm.push(&[0x01, 0x03, 251]), AssemblerStatus::Incomplete);
        let frame = expect_complete(asm.push(&[0u8; 253]));
        assert_eq!(frame.len(), MAX_ADU_LEN);
    }

    #[test]
    fn test_impossible_length_is_malformed() {
        let mut asm = FrameAssembler::new();
        assert_eq!(
            asm.push(&[0x01, 0x03, 0xFF]),
            AssemblerStatus::Malformed(MalformedReason::DeclaredLengthTooLong(260))
        );
    }

    #[test]
    fn test_clear() {
        let mut asm = FrameAssembler::new();
        let _ = asm.push(&[0x01, 0x03]);
        asm.clear();
        assert!(asm.is_empty());
        assert_eq!(asm.status(), AssemblerStatus::Incomplete);
    }
}
