use crate::{
    checksum::nmea_checksum,
    constants::{
        ASCII_CHECKSUM_DELIMITER, ASCII_CR, ASCII_END_BYTE, ASCII_MAX_FRAME_LEN,
        ASCII_MIN_FRAME_LEN, ASCII_START_BYTE,
    },
    error::ParserError,
    parser::Step,
};

const PACKET: &str = "ASCII";

/// Packs the 4 characters following `$` into a big-endian word, e.g. `b"GPGG"`,
/// for cheap message id comparisons.
pub fn ascii_message_id_to_u32(id: [u8; 4]) -> u32 {
    u32::from_be_bytes(id)
}

pub(super) fn advance(frame: &[u8], capacity: usize) -> Step {
    let len = frame.len();
    let Some(&last) = frame.last() else {
        return Step::Pending;
    };
    if len == 1 {
        return Step::Pending;
    }
    match last {
        ASCII_END_BYTE => Step::Length(len),
        ASCII_START_BYTE => Step::Invalid(ParserError::Malformed {
            packet: PACKET,
            reason: "start byte inside sentence",
        }),
        0x20..=0x7e | ASCII_CR => {
            let max = ASCII_MAX_FRAME_LEN.min(capacity);
            if len >= max {
                Step::Invalid(ParserError::InvalidPacketLen {
                    packet: PACKET,
                    max,
                    got: len + 1,
                })
            } else {
                Step::Pending
            }
        },
        _ => Step::Invalid(ParserError::Malformed {
            packet: PACKET,
            reason: "non-printable byte",
        }),
    }
}

fn hex_value(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

/// Checks `$...*HH[\r]\n`, where `HH` is the XOR of the bytes between `$` and `*`
pub(super) fn validate(frame: &[u8]) -> Result<(), ParserError> {
    if frame.len() < ASCII_MIN_FRAME_LEN {
        return Err(ParserError::Truncated { packet: PACKET });
    }
    let line = match frame {
        [line @ .., ASCII_CR, ASCII_END_BYTE] => line,
        [line @ .., ASCII_END_BYTE] => line,
        _ => {
            return Err(ParserError::Malformed {
                packet: PACKET,
                reason: "missing line terminator",
            })
        },
    };
    if line.len() < 4 {
        return Err(ParserError::Truncated { packet: PACKET });
    }
    if line.contains(&ASCII_CR) {
        return Err(ParserError::Malformed {
            packet: PACKET,
            reason: "carriage return inside sentence",
        });
    }
    let star = line.len() - 3;
    if line[star] != ASCII_CHECKSUM_DELIMITER {
        return Err(ParserError::Malformed {
            packet: PACKET,
            reason: "missing checksum delimiter",
        });
    }
    let received = match (hex_value(line[star + 1]), hex_value(line[star + 2])) {
        (Some(hi), Some(lo)) => (hi << 4) | lo,
        _ => {
            return Err(ParserError::Malformed {
                packet: PACKET,
                reason: "bad checksum digits",
            })
        },
    };
    let computed = nmea_checksum(&line[1..star]);
    if received != computed {
        return Err(ParserError::InvalidChecksum {
            packet: PACKET,
            expect: u32::from(received),
            got: u32::from(computed),
        });
    }
    Ok(())
}
