use crate::{
    checksum::UbxChecksumCalc,
    constants::{
        UBX_CHECKSUM_LEN, UBX_CLASS_OFFSET, UBX_HEADER_LEN, UBX_LENGTH_OFFSET,
        UBX_MAX_PAYLOAD_LEN, UBX_SYNC_CHAR_2,
    },
    error::ParserError,
    parser::{check_capacity, Step},
};

const PACKET: &str = "UBX";

pub(super) fn advance(frame: &[u8], capacity: usize) -> Step {
    match frame.len() {
        2 if frame[1] != UBX_SYNC_CHAR_2 => Step::Restart,
        n if n < UBX_HEADER_LEN => Step::Pending,
        _ => {
            let pack_len = usize::from(u16::from_le_bytes([
                frame[UBX_LENGTH_OFFSET],
                frame[UBX_LENGTH_OFFSET + 1],
            ]));
            if pack_len > UBX_MAX_PAYLOAD_LEN {
                return Step::Invalid(ParserError::InvalidPacketLen {
                    packet: PACKET,
                    max: UBX_MAX_PAYLOAD_LEN,
                    got: pack_len,
                });
            }
            check_capacity(UBX_HEADER_LEN + pack_len + UBX_CHECKSUM_LEN, capacity)
        },
    }
}

/// Fletcher checksum over class, message id, length and payload
pub(super) fn validate(frame: &[u8]) -> Result<(), ParserError> {
    let len = frame.len();
    if len < UBX_HEADER_LEN + UBX_CHECKSUM_LEN {
        return Err(ParserError::Truncated { packet: PACKET });
    }
    let mut calc = UbxChecksumCalc::new();
    calc.update(&frame[UBX_CLASS_OFFSET..len - UBX_CHECKSUM_LEN]);
    calc.validate_result(frame[len - 2], frame[len - 1])
}

#[cfg(test)]
mod tests {
    use super::*;

    static ACK_ACK: [u8; 10] = [0xb5, 0x62, 0x5, 0x1, 0x2, 0x0, 0x6, 0x1, 0xf, 0x38];

    #[test]
    fn second_sync_char_is_required() {
        assert_eq!(advance(&[0xb5, 0x00], 1024), Step::Restart);
        assert_eq!(advance(&[0xb5, 0x62], 1024), Step::Pending);
        assert_eq!(advance(&ACK_ACK[..5], 1024), Step::Pending);
    }

    #[test]
    fn length_comes_from_header() {
        assert_eq!(advance(&ACK_ACK[..6], 1024), Step::Length(10));
        assert_eq!(
            advance(&[0xb5, 0x62, 0x01, 0x07, 0x00, 0x04], 1024),
            Step::Invalid(ParserError::OutOfMemory {
                required_size: 1032
            })
        );
        assert!(matches!(
            advance(&[0xb5, 0x62, 0x01, 0x07, 0xff, 0x04], 4096),
            Step::Invalid(ParserError::InvalidPacketLen { got: 1279, .. })
        ));
    }

    #[test]
    fn checksum_is_checked() {
        assert_eq!(validate(&ACK_ACK), Ok(()));
        let mut bad = ACK_ACK;
        bad[7] = 5;
        assert_eq!(
            validate(&bad),
            Err(ParserError::InvalidChecksum {
                packet: "UBX",
                expect: 0x380f,
                got: 0x3c13
            })
        );
    }
}
