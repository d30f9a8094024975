//! Sony CXD5610 binary frames: `7F len_lo len_hi opcode hdr_ck [payload.. payload_ck]`.

use crate::{
    checksum::sony_checksum,
    constants::{SONY_CHECKSUM_LEN, SONY_HEADER_LEN},
    error::ParserError,
    parser::{check_capacity, Step},
};

const PACKET: &str = "Sony";

fn check_header(frame: &[u8]) -> Result<usize, ParserError> {
    let computed = sony_checksum(&frame[..SONY_HEADER_LEN - 1]);
    let received = frame[SONY_HEADER_LEN - 1];
    if computed != received {
        return Err(ParserError::InvalidChecksum {
            packet: PACKET,
            expect: u32::from(received),
            got: u32::from(computed),
        });
    }
    Ok(usize::from(u16::from_le_bytes([frame[1], frame[2]])))
}

fn frame_len(payload_len: usize) -> usize {
    if payload_len == 0 {
        SONY_HEADER_LEN
    } else {
        SONY_HEADER_LEN + payload_len + SONY_CHECKSUM_LEN
    }
}

pub(super) fn advance(frame: &[u8], capacity: usize) -> Step {
    if frame.len() < SONY_HEADER_LEN {
        return Step::Pending;
    }
    match check_header(frame) {
        Ok(payload_len) => check_capacity(frame_len(payload_len), capacity),
        Err(e) => Step::Invalid(e),
    }
}

pub(super) fn validate(frame: &[u8]) -> Result<(), ParserError> {
    if frame.len() < SONY_HEADER_LEN {
        return Err(ParserError::Truncated { packet: PACKET });
    }
    let payload_len = check_header(frame)?;
    if frame.len() != frame_len(payload_len) {
        return Err(ParserError::InvalidPacketLen {
            packet: PACKET,
            max: frame_len(payload_len),
            got: frame.len(),
        });
    }
    if payload_len == 0 {
        return Ok(());
    }
    let payload = &frame[SONY_HEADER_LEN..frame.len() - SONY_CHECKSUM_LEN];
    let computed = sony_checksum(payload);
    let received = frame[frame.len() - 1];
    if computed != received {
        return Err(ParserError::InvalidChecksum {
            packet: PACKET,
            expect: u32::from(received),
            got: u32::from(computed),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_only_frame() {
        // len 0, opcode 0x10, header sum 0x7f + 0x10
        let frame = [0x7f, 0x00, 0x00, 0x10, 0x8f];
        assert_eq!(advance(&frame, 64), Step::Length(5));
        assert_eq!(validate(&frame), Ok(()));
    }

    #[test]
    fn payload_frame() {
        let frame = [0x7f, 0x02, 0x00, 0x10, 0x91, 0x01, 0x02, 0x03];
        assert_eq!(advance(&frame[..5], 64), Step::Length(8));
        assert_eq!(validate(&frame), Ok(()));

        let mut bad = frame;
        bad[6] = 0x03;
        assert!(matches!(
            validate(&bad),
            Err(ParserError::InvalidChecksum { .. })
        ));
    }

    #[test]
    fn bad_header_checksum_is_rejected_early() {
        assert_eq!(
            advance(&[0x7f, 0x02, 0x00, 0x10, 0x90], 64),
            Step::Invalid(ParserError::InvalidChecksum {
                packet: "Sony",
                expect: 0x90,
                got: 0x91
            })
        );
    }
}
