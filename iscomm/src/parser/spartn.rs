//! SPARTN frames.
//!
//! Bit layout of the fixed part, MSB first:
//! preamble 8, message type 7, payload length 10, encryption flag 1, message CRC type 2,
//! frame CRC 4, subtype 4, time tag type 1, time tag 16 or 32, solution id 7,
//! solution processor id 4, and when the encryption flag is set another 16 bits of
//! encryption id 4, encryption sequence 6, authentication indicator 3 and embedded
//! authentication length 3.

use crate::{
    checksum::{get_bits_u32, spartn_frame_crc4, SpartnCrc},
    constants::{SPARTN_AUTH_LEN, SPARTN_MIN_HEADER_LEN},
    error::ParserError,
    parser::{check_capacity, Step},
};

const PACKET: &str = "SPARTN";

/// Bytes needed to read the frame CRC
const FRAME_CRC_END: usize = 4;

/// Layout decoded from a complete header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Layout {
    header_len: usize,
    payload_len: usize,
    auth_len: usize,
    crc: SpartnCrc,
}

impl Layout {
    fn frame_len(&self) -> usize {
        self.header_len + self.payload_len + self.auth_len + self.crc.len()
    }
}

fn check_frame_crc(frame: &[u8]) -> Result<(), ParserError> {
    let received = get_bits_u32(frame, 28, 4) as u8;
    let computed = spartn_frame_crc4(frame);
    if received != computed {
        return Err(ParserError::InvalidChecksum {
            packet: PACKET,
            expect: u32::from(received),
            got: u32::from(computed),
        });
    }
    Ok(())
}

/// Header length in bytes, readable once the time tag type bit is in
fn header_len(frame: &[u8]) -> usize {
    let encrypted = get_bits_u32(frame, 25, 1) != 0;
    let tag_bits = if get_bits_u32(frame, 36, 1) != 0 { 32 } else { 16 };
    let mut bits = 37 + tag_bits + 11;
    if encrypted {
        bits += 16;
    }
    bits / 8
}

/// Needs `header_len(frame)` bytes
fn layout(frame: &[u8]) -> Result<Layout, ParserError> {
    let header_len = header_len(frame);
    let payload_len = get_bits_u32(frame, 15, 10) as usize;
    let crc = SpartnCrc::from_code(get_bits_u32(frame, 26, 2) as u8);
    let mut auth_len = 0;
    if get_bits_u32(frame, 25, 1) != 0 {
        let eaf_pos = header_len * 8 - 16;
        let auth_indicator = get_bits_u32(frame, eaf_pos + 10, 3);
        if auth_indicator > 1 {
            let code = get_bits_u32(frame, eaf_pos + 13, 3) as usize;
            auth_len = *SPARTN_AUTH_LEN
                .get(code)
                .ok_or(ParserError::InvalidField {
                    packet: PACKET,
                    field: "embedded auth length",
                })?;
        }
    }
    Ok(Layout {
        header_len,
        payload_len,
        auth_len,
        crc,
    })
}

pub(super) fn advance(frame: &[u8], capacity: usize) -> Step {
    if frame.len() < FRAME_CRC_END {
        return Step::Pending;
    }
    if let Err(e) = check_frame_crc(frame) {
        return Step::Invalid(e);
    }
    if frame.len() < SPARTN_MIN_HEADER_LEN || frame.len() < header_len(frame) {
        return Step::Pending;
    }
    match layout(frame) {
        Ok(layout) => check_capacity(layout.frame_len(), capacity),
        Err(e) => Step::Invalid(e),
    }
}

/// Message CRC covers everything after the preamble up to the CRC itself
pub(super) fn validate(frame: &[u8]) -> Result<(), ParserError> {
    if frame.len() < SPARTN_MIN_HEADER_LEN || frame.len() < header_len(frame) {
        return Err(ParserError::Truncated { packet: PACKET });
    }
    check_frame_crc(frame)?;
    let layout = layout(frame)?;
    if frame.len() != layout.frame_len() {
        return Err(ParserError::InvalidPacketLen {
            packet: PACKET,
            max: layout.frame_len(),
            got: frame.len(),
        });
    }
    let crc_len = layout.crc.len();
    let (data, crc) = frame.split_at(frame.len() - crc_len);
    let received = crc.iter().fold(0u32, |acc, &b| (acc << 8) | u32::from(b));
    let computed = layout.crc.compute(&data[1..]);
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

    fn put_bits(buf: &mut [u8], pos: usize, len: usize, value: u32) {
        for i in 0..len {
            let bit = (value >> (len - 1 - i)) & 1;
            let p = pos + i;
            if bit != 0 {
                buf[p / 8] |= 0x80 >> (p % 8);
            } else {
                buf[p / 8] &= !(0x80 >> (p % 8));
            }
        }
    }

    /// Unencrypted frame, 16-bit time tag, CRC-16
    fn frame(payload: &[u8]) -> Vec<u8> {
        let mut frame = vec![0u8; 8];
        frame[0] = 0x73;
        put_bits(&mut frame, 8, 7, 1);
        put_bits(&mut frame, 15, 10, payload.len() as u32);
        put_bits(&mut frame, 26, 2, 1);
        let crc4 = spartn_frame_crc4(&frame);
        put_bits(&mut frame, 28, 4, u32::from(crc4));
        frame.extend_from_slice(payload);
        let crc = SpartnCrc::Crc16.compute(&frame[1..]) as u16;
        frame.extend_from_slice(&crc.to_be_bytes());
        frame
    }

    #[test]
    fn unencrypted_frame() {
        let frame = frame(&[1, 2, 3, 4, 5]);
        assert_eq!(frame.len(), 15);
        assert_eq!(advance(&frame[..3], 1024), Step::Pending);
        assert_eq!(advance(&frame[..4], 1024), Step::Pending);
        assert_eq!(advance(&frame[..8], 1024), Step::Length(15));
        assert_eq!(validate(&frame), Ok(()));
    }

    #[test]
    fn frame_crc_rejects_early() {
        let mut frame = frame(&[1, 2, 3]);
        frame[3] ^= 0x01;
        assert!(matches!(
            advance(&frame[..4], 1024),
            Step::Invalid(ParserError::InvalidChecksum {
                packet: "SPARTN",
                ..
            })
        ));
    }

    #[test]
    fn message_crc_is_checked() {
        let mut frame = frame(&[1, 2, 3]);
        frame[9] ^= 0x40;
        assert!(matches!(
            validate(&frame),
            Err(ParserError::InvalidChecksum {
                packet: "SPARTN",
                ..
            })
        ));
    }

    #[test]
    fn encrypted_header_carries_auth() {
        let mut frame = vec![0u8; 10];
        frame[0] = 0x73;
        put_bits(&mut frame, 15, 10, 4);
        put_bits(&mut frame, 25, 1, 1);
        // CRC-8
        let crc4 = spartn_frame_crc4(&frame);
        put_bits(&mut frame, 28, 4, u32::from(crc4));
        // auth indicator 2, embedded length code 1 -> 12 bytes
        put_bits(&mut frame, 64 + 10, 3, 2);
        put_bits(&mut frame, 64 + 13, 3, 1);
        assert_eq!(advance(&frame[..8], 1024), Step::Pending);
        assert_eq!(advance(&frame, 1024), Step::Length(10 + 4 + 12 + 1));

        put_bits(&mut frame, 64 + 13, 3, 6);
        assert_eq!(
            advance(&frame, 1024),
            Step::Invalid(ParserError::InvalidField {
                packet: "SPARTN",
                field: "embedded auth length"
            })
        );
    }

    #[test]
    fn oversized_frame_is_out_of_memory() {
        let frame = frame(&[0; 40]);
        assert_eq!(
            advance(&frame[..8], 32),
            Step::Invalid(ParserError::OutOfMemory { required_size: 50 })
        );
    }
}
