use thiserror::Error;

/// Reasons a candidate frame is rejected while parsing or decoding
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParserError {
    #[error("invalid {packet} checksum, expect {expect:#x}, got {got:#x}")]
    InvalidChecksum {
        packet: &'static str,
        expect: u32,
        got: u32,
    },
    #[error("invalid {packet} length, max {max}, got {got}")]
    InvalidPacketLen {
        packet: &'static str,
        max: usize,
        got: usize,
    },
    #[error("malformed {packet} frame: {reason}")]
    Malformed {
        packet: &'static str,
        reason: &'static str,
    },
    #[error("truncated {packet} frame")]
    Truncated { packet: &'static str },
    #[error("invalid field {field} of packet {packet}")]
    InvalidField {
        packet: &'static str,
        field: &'static str,
    },
    #[error("not enough memory, {required_size} bytes required")]
    OutOfMemory { required_size: usize },
}

/// Failures of the synchronous instance API: buffering, encoding and marshaling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CommError {
    #[error("buffer full, {required} bytes required but {available} available")]
    BufferFull { required: usize, available: usize },
    #[error("payload of {size} bytes exceeds the maximum body size {max}")]
    EncodeTooLarge { size: usize, max: usize },
    #[error("destination buffer too small, {required} bytes required but {available} available")]
    BufferTooSmall { required: usize, available: usize },
    #[error("offset {offset} + size {size} exceeds the structure size {max}")]
    StructSizeMismatch { offset: usize, size: usize, max: usize },
    #[error("invalid baud rate {0}")]
    InvalidBaudRate(u32),
    #[error("binary packet encoding is disabled")]
    EncodingDisabled,
    #[error("no data packet has been received")]
    NoData,
}
