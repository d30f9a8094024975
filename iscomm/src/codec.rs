//! ISB packet encoding and decoding.
//!
//! Legacy frames (`ISB_V1`) are delimited by a start and a stop byte and escape every byte
//! of [`ISB_ESCAPED_BYTES`] as `ISB_ESCAPE_KEY, !byte`, so the delimiters never appear
//! inside a frame and the encoded size is at most twice the body plus
//! [`MAX_PKT_OVERHEAD_SIZE`]. Current frames (`ISB_V2`) start with a preamble and carry
//! the body length after the header, the body is never escaped.
//!
//! ```text
//! V1: FF | esc(pid counter flags body.. ck2 ck1 ck0) | FE
//! V2: EF | pid counter flags len_lo len_hi | body.. | ck2 ck1 ck0 | FE
//! ```
//!
//! The checksum covers every decoded byte between the start byte and the footer.

use crate::{
    checksum::IsbChecksum,
    config::{CommConfig, IsbVersion},
    constants::{
        ISB_CHECKSUM_LEN, ISB_END_BYTE, ISB_ESCAPED_BYTES, ISB_ESCAPE_KEY, ISB_V1_MIN_FRAME_LEN,
        ISB_V1_START_BYTE, ISB_V2_HEADER_SIZE, ISB_V2_PREAMBLE, MAX_PKT_BODY_SIZE,
        MAX_PKT_OVERHEAD_SIZE, PKT_FOOTER_SIZE, PKT_HEADER_SIZE, PKT_OVERHEAD_SIZE,
    },
    error::{CommError, ParserError},
    packet::{swap_words, Packet, PacketFlags, PacketFooter, PacketHeader},
};

const PACKET: &str = "ISB";

pub(crate) fn is_escaped(byte: u8) -> bool {
    ISB_ESCAPED_BYTES.contains(&byte)
}

/// Worst case encoded size of a `body_len` bytes body
pub fn max_encoded_len(body_len: usize, config: &CommConfig) -> usize {
    match config.tx_version {
        IsbVersion::V1 if config.packet_encoding => 2 * body_len + MAX_PKT_OVERHEAD_SIZE,
        IsbVersion::V1 => body_len + PKT_OVERHEAD_SIZE,
        IsbVersion::V2 => body_len + ISB_V2_HEADER_SIZE + PKT_FOOTER_SIZE,
    }
}

struct FrameWriter<'o> {
    out: &'o mut [u8],
    pos: usize,
    checksum: IsbChecksum,
    escape: bool,
}

impl FrameWriter<'_> {
    fn raw(&mut self, byte: u8) {
        self.out[self.pos] = byte;
        self.pos += 1;
    }

    fn escaped(&mut self, byte: u8) {
        if self.escape && is_escaped(byte) {
            self.raw(ISB_ESCAPE_KEY);
            self.raw(!byte);
        } else {
            self.raw(byte);
        }
    }

    fn data(&mut self, byte: u8) {
        self.checksum.update_byte(byte);
        self.escaped(byte);
    }
}

/// Encodes an ISB frame into `out` and returns its length.
///
/// `body` is the concatenation of its parts, in host word order. The frame flags are the
/// template flags plus `additional_flags`; when they declare a byte order different from
/// the host and `RAW_DATA_NO_SWAP` is clear, every complete 32-bit body word is swapped.
/// The framing follows `config.tx_version` and `config.packet_encoding`.
///
/// Nothing is written when the body exceeds [`MAX_PKT_BODY_SIZE`] or when `out` is smaller
/// than [`max_encoded_len`].
pub fn encode_binary_packet(
    out: &mut [u8],
    header: &PacketHeader,
    additional_flags: PacketFlags,
    body: &[&[u8]],
    config: &CommConfig,
) -> Result<usize, CommError> {
    let body_len: usize = body.iter().map(|part| part.len()).sum();
    if body_len > MAX_PKT_BODY_SIZE {
        return Err(CommError::EncodeTooLarge {
            size: body_len,
            max: MAX_PKT_BODY_SIZE,
        });
    }
    let required = max_encoded_len(body_len, config);
    if out.len() < required {
        return Err(CommError::BufferTooSmall {
            required,
            available: out.len(),
        });
    }

    let flags = header.flags | additional_flags;
    let (start, escape) = match config.tx_version {
        IsbVersion::V1 => (ISB_V1_START_BYTE, config.packet_encoding),
        IsbVersion::V2 => (ISB_V2_PREAMBLE, false),
    };
    let mut w = FrameWriter {
        out,
        pos: 0,
        checksum: IsbChecksum::new(),
        escape,
    };

    w.raw(start);
    w.data(header.pid);
    w.data(header.counter);
    w.data(flags.bits());
    if config.tx_version == IsbVersion::V2 {
        // body_len <= MAX_PKT_BODY_SIZE
        for byte in (body_len as u16).to_le_bytes() {
            w.data(byte);
        }
    }

    let swap = flags.needs_swap();
    let mut word = [0u8; 4];
    let mut filled = 0;
    for byte in body.iter().flat_map(|part| part.iter().copied()) {
        if !swap {
            w.data(byte);
            continue;
        }
        word[filled] = byte;
        filled += 1;
        if filled == word.len() {
            for &b in word.iter().rev() {
                w.data(b);
            }
            filled = 0;
        }
    }
    for &b in &word[..filled] {
        w.data(b);
    }

    let footer = PacketFooter::new(w.checksum.value(flags.checksum_width()));
    for byte in footer.checksum_bytes() {
        w.escaped(byte);
    }
    w.raw(footer.stop);
    Ok(w.pos)
}

/// Streaming un-escaper of legacy frame contents.
///
/// Each call consumes exactly one source byte and yields the decoded byte, if any, while
/// folding decoded bytes into the running checksum.
#[derive(Debug, Clone, Copy)]
pub struct ByteDecoder {
    checksum: IsbChecksum,
    escaping: bool,
    pending_escape: bool,
}

impl ByteDecoder {
    pub fn new(packet_encoding: bool) -> Self {
        Self {
            checksum: IsbChecksum::new(),
            escaping: packet_encoding,
            pending_escape: false,
        }
    }

    pub fn decode_byte(&mut self, byte: u8) -> Result<Option<u8>, ParserError> {
        if self.pending_escape {
            self.pending_escape = false;
            let value = !byte;
            if !is_escaped(value) {
                return Err(ParserError::Malformed {
                    packet: PACKET,
                    reason: "invalid escape sequence",
                });
            }
            self.checksum.update_byte(value);
            return Ok(Some(value));
        }
        if self.escaping {
            match byte {
                ISB_ESCAPE_KEY => {
                    self.pending_escape = true;
                    return Ok(None);
                },
                ISB_V1_START_BYTE | ISB_END_BYTE => {
                    return Err(ParserError::Malformed {
                        packet: PACKET,
                        reason: "unescaped delimiter",
                    });
                },
                _ => {},
            }
        }
        self.checksum.update_byte(byte);
        Ok(Some(byte))
    }

    pub fn checksum(&self) -> &IsbChecksum {
        &self.checksum
    }

    /// Whether the last byte was an escape key still waiting for its value
    pub fn is_mid_escape(&self) -> bool {
        self.pending_escape
    }
}

/// Reads the footer of a legacy frame, walking back from the stop byte. Returns the footer
/// and the index where its (possibly escaped) checksum bytes begin.
pub fn decode_binary_packet_footer(
    frame: &[u8],
    packet_encoding: bool,
) -> Result<(PacketFooter, usize), ParserError> {
    if frame.last() != Some(&ISB_END_BYTE) {
        return Err(ParserError::Malformed {
            packet: PACKET,
            reason: "missing stop byte",
        });
    }
    let mut pos = frame.len() - 1;
    let mut checksum = [0u8; 3];
    for slot in checksum.iter_mut().rev() {
        // Keep the start byte and a 3 byte header in front of the footer
        if pos < PKT_HEADER_SIZE {
            return Err(ParserError::Truncated { packet: PACKET });
        }
        pos -= 1;
        if packet_encoding && frame[pos - 1] == ISB_ESCAPE_KEY {
            *slot = !frame[pos];
            pos -= 1;
        } else {
            *slot = frame[pos];
        }
    }
    Ok((
        PacketFooter::from_bytes([checksum[0], checksum[1], checksum[2], ISB_END_BYTE]),
        pos,
    ))
}

/// Where the pieces of a checked frame live
struct FrameLayout {
    header: PacketHeader,
    checksum: u32,
    body_len: usize,
    /// Legacy frames: end of the escaped contents. Current frames: start of the body.
    contents_end: usize,
}

fn check_body_len(body_len: usize) -> Result<(), ParserError> {
    if body_len > MAX_PKT_BODY_SIZE {
        return Err(ParserError::InvalidPacketLen {
            packet: PACKET,
            max: MAX_PKT_BODY_SIZE,
            got: body_len,
        });
    }
    Ok(())
}

fn inspect_v1(frame: &[u8], packet_encoding: bool) -> Result<FrameLayout, ParserError> {
    if frame.len() < ISB_V1_MIN_FRAME_LEN {
        return Err(ParserError::Truncated { packet: PACKET });
    }
    let (footer, contents_end) = decode_binary_packet_footer(frame, packet_encoding)?;

    let mut decoder = ByteDecoder::new(packet_encoding);
    let mut header = [0u8; 3];
    let mut decoded = 0;
    for &byte in &frame[1..contents_end] {
        if let Some(value) = decoder.decode_byte(byte)? {
            if let Some(slot) = header.get_mut(decoded) {
                *slot = value;
            }
            decoded += 1;
        }
    }
    if decoder.is_mid_escape() {
        return Err(ParserError::Malformed {
            packet: PACKET,
            reason: "dangling escape key",
        });
    }
    if decoded < header.len() {
        return Err(ParserError::Truncated { packet: PACKET });
    }
    let header = PacketHeader::from_bytes([frame[0], header[0], header[1], header[2]]);
    decoder
        .checksum()
        .validate(header.flags.checksum_width(), footer.checksum)?;
    let body_len = decoded - 3;
    check_body_len(body_len)?;
    Ok(FrameLayout {
        header,
        checksum: footer.checksum,
        body_len,
        contents_end,
    })
}

fn inspect_v2(frame: &[u8]) -> Result<FrameLayout, ParserError> {
    if frame.len() < ISB_V2_HEADER_SIZE + PKT_FOOTER_SIZE {
        return Err(ParserError::Truncated { packet: PACKET });
    }
    let body_len = usize::from(u16::from_le_bytes([frame[4], frame[5]]));
    check_body_len(body_len)?;
    let footer_start = ISB_V2_HEADER_SIZE + body_len;
    let expected = footer_start + PKT_FOOTER_SIZE;
    if frame.len() < expected {
        return Err(ParserError::Truncated { packet: PACKET });
    }
    if frame.len() > expected || frame[expected - 1] != ISB_END_BYTE {
        return Err(ParserError::Malformed {
            packet: PACKET,
            reason: "missing stop byte",
        });
    }
    let footer = PacketFooter::from_bytes([
        frame[footer_start],
        frame[footer_start + 1],
        frame[footer_start + 2],
        frame[footer_start + ISB_CHECKSUM_LEN],
    ]);
    let header = PacketHeader::from_bytes([frame[0], frame[1], frame[2], frame[3]]);
    let mut checksum = IsbChecksum::new();
    checksum.update(&frame[1..footer_start]);
    checksum.validate(header.flags.checksum_width(), footer.checksum)?;
    Ok(FrameLayout {
        header,
        checksum: footer.checksum,
        body_len,
        contents_end: ISB_V2_HEADER_SIZE,
    })
}

fn inspect(frame: &[u8], packet_encoding: bool) -> Result<FrameLayout, ParserError> {
    match frame.first() {
        Some(&ISB_V1_START_BYTE) => inspect_v1(frame, packet_encoding),
        Some(&ISB_V2_PREAMBLE) => inspect_v2(frame),
        Some(_) => Err(ParserError::Malformed {
            packet: PACKET,
            reason: "missing start byte",
        }),
        None => Err(ParserError::Truncated { packet: PACKET }),
    }
}

/// Checks framing and checksum of one complete frame without modifying it
pub fn verify_binary_packet(
    frame: &[u8],
    packet_encoding: bool,
) -> Result<PacketHeader, ParserError> {
    inspect(frame, packet_encoding).map(|layout| layout.header)
}

/// Decodes one complete frame in place.
///
/// On success `frame` starts with the decoded header, `[start, pid, counter, flags]`,
/// followed by the body in host word order (unless `RAW_DATA_NO_SWAP` is set). On error
/// the frame bytes are left untouched.
pub fn decode_binary_packet(
    frame: &mut [u8],
    packet_encoding: bool,
) -> Result<Packet<'_>, ParserError> {
    let layout = inspect(frame, packet_encoding)?;
    if layout.header.start == ISB_V1_START_BYTE {
        let mut decoder = ByteDecoder::new(packet_encoding);
        let mut dst = 1;
        for src in 1..layout.contents_end {
            // dst <= src, decoding never grows the frame
            if let Some(value) = decoder.decode_byte(frame[src])? {
                frame[dst] = value;
                dst += 1;
            }
        }
    } else {
        let body_start = layout.contents_end;
        frame.copy_within(body_start..body_start + layout.body_len, PKT_HEADER_SIZE);
    }

    let body = &mut frame[PKT_HEADER_SIZE..PKT_HEADER_SIZE + layout.body_len];
    if layout.header.flags.needs_swap() {
        swap_words(body);
    }
    Ok(Packet {
        header: layout.header,
        body,
        checksum: layout.checksum,
    })
}

/// Decodes `frame` into `out`, leaving the raw frame intact
pub fn decode_binary_packet_to<'o>(
    frame: &[u8],
    out: &'o mut [u8],
    packet_encoding: bool,
) -> Result<Packet<'o>, ParserError> {
    let Some(dst) = out.get_mut(..frame.len()) else {
        return Err(ParserError::OutOfMemory {
            required_size: frame.len(),
        });
    };
    dst.copy_from_slice(frame);
    decode_binary_packet(dst, packet_encoding)
}
