//! Streaming frame detection over a [`CommBuffer`].
//!
//! The parser walks the buffer's `scan` cursor one byte at a time. While idle it looks for
//! the start byte of an enabled family, in priority order (ISB v2, ISB v1, UBX, RTCM3,
//! Sony, SPARTN, ASCII). Once a family is tentatively identified the candidate frame grows
//! from `head` until the family's framing rule gives its length, then it is validated.
//!
//! A rejected candidate only drops its start byte: scanning resumes at the byte right after
//! it, so a bogus start never costs more than the bytes it swallowed.

use core::ops::Range;

use log::trace;

use crate::{
    buffer::CommBuffer,
    config::{CommConfig, ProtocolMask},
    constants::{
        ASCII_START_BYTE, ISB_V1_START_BYTE, ISB_V2_PREAMBLE, RTCM3_START_BYTE, SONY_START_BYTE,
        SPARTN_START_BYTE, UBX_SYNC_CHAR_1,
    },
    error::ParserError,
};

mod ascii;
mod isb;
mod rtcm3;
mod sony;
mod spartn;
mod ubx;

pub use ascii::ascii_message_id_to_u32;

/// Outcome of a parse call, one tag per completed frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ProtocolType {
    /// More bytes are needed, not an error
    None,
    /// A candidate frame was rejected, see
    /// [`CommInstance::last_error`](crate::CommInstance::last_error)
    ParseError,
    /// ISB `Data`/`SetData` packet
    IsbData,
    /// ISB `GetData` or stop broadcast request
    IsbCmd,
    /// ISB `Ack`/`Nack`
    IsbAck,
    Ascii,
    Ublox,
    Rtcm3,
    Sony,
    Spartn,
}

impl ProtocolType {
    /// Whether a validated frame is available
    pub fn is_frame(self) -> bool {
        !matches!(self, ProtocolType::None | ProtocolType::ParseError)
    }
}

impl From<ProtocolType> for u32 {
    fn from(value: ProtocolType) -> Self {
        match value {
            ProtocolType::None => 0,
            ProtocolType::ParseError => 0xffff_ffff,
            ProtocolType::IsbData => 0xefff_ffff,
            ProtocolType::IsbCmd => 0xdfff_ffff,
            ProtocolType::IsbAck => 0xcfff_ffff,
            ProtocolType::Ascii => 0xbfff_ffff,
            ProtocolType::Ublox => 0xafff_ffff,
            ProtocolType::Rtcm3 => 0x9fff_ffff,
            ProtocolType::Sony => 0x8fff_ffff,
            ProtocolType::Spartn => 0x7fff_ffff,
        }
    }
}

/// Framing families, each with its own start pattern and length rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    IsbV2,
    IsbV1,
    Ublox,
    Rtcm3,
    Sony,
    Spartn,
    Ascii,
}

impl Family {
    /// Start byte detection order
    pub const PRIORITY: [Family; 7] = [
        Family::IsbV2,
        Family::IsbV1,
        Family::Ublox,
        Family::Rtcm3,
        Family::Sony,
        Family::Spartn,
        Family::Ascii,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Family::IsbV2 => "ISB v2",
            Family::IsbV1 => "ISB v1",
            Family::Ublox => "UBX",
            Family::Rtcm3 => "RTCM3",
            Family::Sony => "Sony",
            Family::Spartn => "SPARTN",
            Family::Ascii => "ASCII",
        }
    }

    pub fn protocol(self) -> ProtocolMask {
        match self {
            Family::IsbV2 => ProtocolMask::ISB_V2,
            Family::IsbV1 => ProtocolMask::ISB_V1,
            Family::Ublox => ProtocolMask::UBLOX,
            Family::Rtcm3 => ProtocolMask::RTCM3,
            Family::Sony => ProtocolMask::SONY,
            Family::Spartn => ProtocolMask::SPARTN,
            Family::Ascii => ProtocolMask::ASCII,
        }
    }

    pub fn start_byte(self) -> u8 {
        match self {
            Family::IsbV2 => ISB_V2_PREAMBLE,
            Family::IsbV1 => ISB_V1_START_BYTE,
            Family::Ublox => UBX_SYNC_CHAR_1,
            Family::Rtcm3 => RTCM3_START_BYTE,
            Family::Sony => SONY_START_BYTE,
            Family::Spartn => SPARTN_START_BYTE,
            Family::Ascii => ASCII_START_BYTE,
        }
    }

    pub fn is_isb(self) -> bool {
        matches!(self, Family::IsbV1 | Family::IsbV2)
    }

    /// Result tag of a validated frame of a foreign family. ISB frames are tagged by their
    /// packet id once decoded.
    pub(crate) fn foreign_tag(self) -> ProtocolType {
        match self {
            Family::Ublox => ProtocolType::Ublox,
            Family::Rtcm3 => ProtocolType::Rtcm3,
            Family::Sony => ProtocolType::Sony,
            Family::Spartn => ProtocolType::Spartn,
            Family::Ascii => ProtocolType::Ascii,
            Family::IsbV1 | Family::IsbV2 => ProtocolType::IsbData,
        }
    }

    fn detect(byte: u8, enabled: ProtocolMask) -> Option<Family> {
        Self::PRIORITY
            .into_iter()
            .find(|family| enabled.contains(family.protocol()) && family.start_byte() == byte)
    }

    fn advance(self, frame: &[u8], capacity: usize, config: &CommConfig) -> Step {
        match self {
            Family::IsbV2 => isb::advance_v2(frame, capacity),
            Family::IsbV1 => isb::advance_v1(frame, capacity, config.packet_encoding),
            Family::Ublox => ubx::advance(frame, capacity),
            Family::Rtcm3 => rtcm3::advance(frame, capacity),
            Family::Sony => sony::advance(frame, capacity),
            Family::Spartn => spartn::advance(frame, capacity),
            Family::Ascii => ascii::advance(frame, capacity),
        }
    }

    fn validate(self, frame: &[u8], config: &CommConfig) -> Result<(), ParserError> {
        match self {
            Family::IsbV2 | Family::IsbV1 => isb::validate(frame, config.packet_encoding),
            Family::Ublox => ubx::validate(frame),
            Family::Rtcm3 => rtcm3::validate(frame),
            Family::Sony => sony::validate(frame),
            Family::Spartn => spartn::validate(frame),
            Family::Ascii => ascii::validate(frame),
        }
    }
}

/// Verdict of a family's framing rule on a growing candidate
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Step {
    /// Need more bytes to decide
    Pending,
    /// The frame spans this many bytes from its start byte
    Length(usize),
    /// The start byte did not begin a frame, drop it without counting an error
    Restart,
    Invalid(ParserError),
}

/// Rejects a declared frame length that cannot fit in the receive buffer
pub(crate) fn check_capacity(total: usize, capacity: usize) -> Step {
    if total > capacity {
        Step::Invalid(ParserError::OutOfMemory {
            required_size: total,
        })
    } else {
        Step::Length(total)
    }
}

/// Parse state of one stream
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParseState {
    /// Scanning for a start byte
    #[default]
    Idle,
    /// Start byte matched, nothing else seen yet
    HaveStart(Family),
    /// Collecting the frame, its total length is known once the header is in
    Accumulating {
        family: Family,
        frame_len: Option<usize>,
    },
    /// Every byte of the candidate is buffered
    Validating(Family),
}

pub(crate) enum Event {
    /// Validated frame occupying `range` of the receive buffer storage
    Frame { family: Family, range: Range<usize> },
    Rejected { family: Family, error: ParserError },
}

#[derive(Debug, Default)]
pub(crate) struct Parser {
    state: ParseState,
}

impl Parser {
    pub(crate) fn state(&self) -> ParseState {
        self.state
    }

    pub(crate) fn reset(&mut self) {
        self.state = ParseState::Idle;
    }

    /// Drops the candidate's start byte and rescans from the byte after it
    pub(crate) fn reject(
        &mut self,
        rx: &mut CommBuffer<'_>,
        family: Family,
        error: ParserError,
    ) -> Event {
        rx.skip_candidate_start();
        self.state = ParseState::Idle;
        Event::Rejected { family, error }
    }

    /// The family of the current candidate, if any
    pub(crate) fn family(&self) -> Option<Family> {
        match self.state {
            ParseState::Idle => None,
            ParseState::HaveStart(family)
            | ParseState::Accumulating { family, .. }
            | ParseState::Validating(family) => Some(family),
        }
    }

    /// Scans the unscanned bytes of `rx` up to the first decision
    pub(crate) fn next_event(
        &mut self,
        rx: &mut CommBuffer<'_>,
        config: &CommConfig,
    ) -> Option<Event> {
        loop {
            match self.state {
                ParseState::Validating(family) => {
                    let frame = rx.candidate();
                    return Some(match family.validate(frame, config) {
                        Ok(()) => {
                            let range = rx.head()..rx.scan();
                            trace!("{} frame of {} bytes", family.name(), range.len());
                            rx.consume_scanned();
                            self.state = ParseState::Idle;
                            Event::Frame { family, range }
                        },
                        Err(error) => self.reject(rx, family, error),
                    });
                },
                ParseState::Accumulating {
                    family,
                    frame_len: Some(frame_len),
                } => {
                    rx.set_scan_offset(frame_len);
                    if rx.candidate().len() < frame_len {
                        return None;
                    }
                    self.state = ParseState::Validating(family);
                },
                ParseState::Idle => {
                    if !rx.has_unscanned() {
                        return None;
                    }
                    let byte = rx.byte_at_scan();
                    match Family::detect(byte, config.enabled) {
                        Some(family) => {
                            rx.consume_scanned();
                            rx.advance_scan();
                            self.state = ParseState::HaveStart(family);
                        },
                        None => {
                            rx.advance_scan();
                            rx.consume_scanned();
                        },
                    }
                },
                ParseState::HaveStart(family)
                | ParseState::Accumulating {
                    family,
                    frame_len: None,
                } => {
                    if !rx.has_unscanned() {
                        return None;
                    }
                    rx.advance_scan();
                    match family.advance(rx.candidate(), rx.capacity(), config) {
                        Step::Pending => {
                            self.state = ParseState::Accumulating {
                                family,
                                frame_len: None,
                            };
                        },
                        Step::Length(frame_len) => {
                            debug_assert!(frame_len >= rx.candidate().len());
                            self.state = ParseState::Accumulating {
                                family,
                                frame_len: Some(frame_len),
                            };
                        },
                        Step::Restart => {
                            rx.skip_candidate_start();
                            self.state = ParseState::Idle;
                        },
                        Step::Invalid(error) => return Some(self.reject(rx, family, error)),
                    }
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_type_wire_values() {
        assert_eq!(u32::from(ProtocolType::None), 0);
        assert_eq!(u32::from(ProtocolType::ParseError), 0xffff_ffff);
        assert_eq!(u32::from(ProtocolType::IsbData), 0xefff_ffff);
        assert_eq!(u32::from(ProtocolType::Sony), 0x8fff_ffff);
        assert!(ProtocolType::Rtcm3.is_frame());
        assert!(!ProtocolType::ParseError.is_frame());
    }

    #[test]
    fn start_bytes_are_distinct() {
        for (i, a) in Family::PRIORITY.iter().enumerate() {
            for b in &Family::PRIORITY[i + 1..] {
                assert_ne!(a.start_byte(), b.start_byte());
            }
        }
    }

    #[test]
    fn detection_honours_mask() {
        assert_eq!(
            Family::detect(UBX_SYNC_CHAR_1, ProtocolMask::all()),
            Some(Family::Ublox)
        );
        assert_eq!(Family::detect(UBX_SYNC_CHAR_1, ProtocolMask::ASCII), None);
        assert_eq!(
            Family::detect(ASCII_START_BYTE, ProtocolMask::ASCII),
            Some(Family::Ascii)
        );
        assert_eq!(Family::detect(0x00, ProtocolMask::all()), None);
    }

    #[test]
    fn garbage_is_dropped_and_frames_resync() {
        let mut storage = [0u8; 64];
        let mut rx = CommBuffer::new(&mut storage);
        let mut parser = Parser::default();
        let config = CommConfig::default();

        rx.append(&[0x00, 0x11, b'$', b'A', b'*', b'4', b'1', b'\n']).unwrap();
        match parser.next_event(&mut rx, &config) {
            Some(Event::Frame { family, range }) => {
                assert_eq!(family, Family::Ascii);
                assert_eq!(range, 2..8);
            },
            _ => panic!("expected an ASCII frame"),
        }
        assert!(parser.next_event(&mut rx, &config).is_none());
        assert_eq!(parser.state(), ParseState::Idle);
        assert!(rx.is_empty());
    }

    #[test]
    fn rejected_candidate_rescans_following_bytes() {
        let mut storage = [0u8; 64];
        let mut rx = CommBuffer::new(&mut storage);
        let mut parser = Parser::default();
        let config = CommConfig::default();

        // Unterminated sentence, then a good one inside the swallowed bytes
        rx.append(b"$A*00$B*42\n").unwrap();
        match parser.next_event(&mut rx, &config) {
            Some(Event::Rejected { family, error }) => {
                assert_eq!(family, Family::Ascii);
                assert!(matches!(error, ParserError::Malformed { .. }));
            },
            _ => panic!("expected a rejection"),
        }
        assert_eq!(rx.head(), 1);
        match parser.next_event(&mut rx, &config) {
            Some(Event::Frame { range, .. }) => assert_eq!(range, 5..11),
            _ => panic!("expected an ASCII frame"),
        }
    }

    #[test]
    fn partial_frame_waits_for_more_bytes() {
        let mut storage = [0u8; 64];
        let mut rx = CommBuffer::new(&mut storage);
        let mut parser = Parser::default();
        let config = CommConfig::default();

        rx.append(&[0xb5, 0x62, 0x05, 0x01, 0x02]).unwrap();
        assert!(parser.next_event(&mut rx, &config).is_none());
        assert_eq!(
            parser.state(),
            ParseState::Accumulating {
                family: Family::Ublox,
                frame_len: None
            }
        );
        rx.append(&[0x00, 0x06]).unwrap();
        assert!(parser.next_event(&mut rx, &config).is_none());
        assert_eq!(
            parser.state(),
            ParseState::Accumulating {
                family: Family::Ublox,
                frame_len: Some(10)
            }
        );
        rx.append(&[0x01, 0x0f, 0x38]).unwrap();
        assert!(matches!(
            parser.next_event(&mut rx, &config),
            Some(Event::Frame {
                family: Family::Ublox,
                ..
            })
        ));
    }
}
