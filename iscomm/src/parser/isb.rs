use crate::{
    codec,
    constants::{
        ISB_END_BYTE, ISB_ESCAPE_KEY, ISB_V1_MIN_FRAME_LEN, ISB_V1_START_BYTE, ISB_V2_HEADER_SIZE,
        MAX_PKT_BODY_SIZE, PKT_BUF_SIZE, PKT_FOOTER_SIZE, PKT_HEADER_SIZE,
    },
    error::ParserError,
    parser::{check_capacity, Step},
};

/// Legacy frames end at the first stop byte, escaping keeps it out of the frame.
///
/// With `packet_encoding` the other escaped values never appear raw either, so they end a
/// bogus candidate right away.
pub(super) fn advance_v1(frame: &[u8], capacity: usize, packet_encoding: bool) -> Step {
    let len = frame.len();
    let max = capacity.min(PKT_BUF_SIZE);
    match frame.last() {
        Some(&ISB_END_BYTE) if len < ISB_V1_MIN_FRAME_LEN => {
            Step::Invalid(ParserError::Truncated { packet: "ISB v1" })
        },
        Some(&ISB_END_BYTE) => Step::Length(len),
        Some(&ISB_V1_START_BYTE) => Step::Invalid(ParserError::Malformed {
            packet: "ISB v1",
            reason: "start byte inside frame",
        }),
        Some(&byte) if packet_encoding && byte != ISB_ESCAPE_KEY && codec::is_escaped(byte) => {
            Step::Invalid(ParserError::Malformed {
                packet: "ISB v1",
                reason: "unescaped byte",
            })
        },
        _ if len >= max => Step::Invalid(ParserError::InvalidPacketLen {
            packet: "ISB v1",
            max,
            got: len + 1,
        }),
        _ => Step::Pending,
    }
}

/// Current frames carry the body length right after the header
pub(super) fn advance_v2(frame: &[u8], capacity: usize) -> Step {
    if frame.len() < ISB_V2_HEADER_SIZE {
        return Step::Pending;
    }
    let body_len = usize::from(u16::from_le_bytes([
        frame[PKT_HEADER_SIZE],
        frame[PKT_HEADER_SIZE + 1],
    ]));
    if body_len > MAX_PKT_BODY_SIZE {
        return Step::Invalid(ParserError::InvalidPacketLen {
            packet: "ISB v2",
            max: MAX_PKT_BODY_SIZE,
            got: body_len,
        });
    }
    check_capacity(ISB_V2_HEADER_SIZE + body_len + PKT_FOOTER_SIZE, capacity)
}

pub(super) fn validate(frame: &[u8], packet_encoding: bool) -> Result<(), ParserError> {
    codec::verify_binary_packet(frame, packet_encoding).map(|_| ())
}
