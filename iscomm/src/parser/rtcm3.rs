use crate::{
    checksum::calculate_24bit_crc,
    constants::{RTCM3_CRC_LEN, RTCM3_HEADER_LEN, RTCM3_LENGTH_MASK},
    error::ParserError,
    parser::{check_capacity, Step},
};

const PACKET: &str = "RTCM3";

pub(super) fn advance(frame: &[u8], capacity: usize) -> Step {
    if frame.len() < RTCM3_HEADER_LEN {
        return Step::Pending;
    }
    // next 2 bytes contain 6 bits reserved + 10 bits length, big endian
    let word = u16::from_be_bytes([frame[1], frame[2]]);
    if word & !RTCM3_LENGTH_MASK != 0 {
        return Step::Restart;
    }
    let pack_len = usize::from(word & RTCM3_LENGTH_MASK);
    check_capacity(RTCM3_HEADER_LEN + pack_len + RTCM3_CRC_LEN, capacity)
}

/// CRC-24Q over header and payload, transmitted big endian
pub(super) fn validate(frame: &[u8]) -> Result<(), ParserError> {
    if frame.len() < RTCM3_HEADER_LEN + RTCM3_CRC_LEN {
        return Err(ParserError::Truncated { packet: PACKET });
    }
    let (data, crc) = frame.split_at(frame.len() - RTCM3_CRC_LEN);
    let received = u32::from_be_bytes([0, crc[0], crc[1], crc[2]]);
    let computed = calculate_24bit_crc(data);
    if received != computed {
        return Err(ParserError::InvalidChecksum {
            packet: PACKET,
            expect: received,
            got: computed,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    static MSG_1005: [u8; 25] = [
        0xd3, 0x00, 0x13, 0x3e, 0xd7, 0xd3, 0x02, 0x02, 0x98, 0x0e, 0xde, 0xef, 0x34, 0xb4, 0xbd,
        0x62, 0xac, 0x09, 0x41, 0x98, 0x6f, 0x33, 0x36, 0x0b, 0x98,
    ];

    #[test]
    fn reserved_bits_must_be_zero() {
        assert_eq!(advance(&[0xd3, 0x00], 2048), Step::Pending);
        assert_eq!(advance(&[0xd3, 0x04, 0x00], 2048), Step::Restart);
        assert_eq!(advance(&MSG_1005[..3], 2048), Step::Length(25));
        assert_eq!(
            advance(&[0xd3, 0x03, 0xff], 512),
            Step::Invalid(ParserError::OutOfMemory {
                required_size: 1029
            })
        );
    }

    #[test]
    fn crc_is_checked() {
        assert_eq!(validate(&MSG_1005), Ok(()));
        let mut bad = MSG_1005;
        bad[10] ^= 0x80;
        assert!(matches!(
            validate(&bad),
            Err(ParserError::InvalidChecksum {
                packet: "RTCM3",
                ..
            })
        ));
    }
}
