pub const ISB_V1_START_BYTE: u8 = 0xff;
pub const ISB_V2_PREAMBLE: u8 = 0xef;
pub const ISB_END_BYTE: u8 = 0xfe;
/// Escape key of the legacy framing, followed by the bitwise complement of the escaped byte
pub const ISB_ESCAPE_KEY: u8 = 0xfd;

/// Bytes that never appear unescaped inside a legacy ISB frame
pub(crate) const ISB_ESCAPED_BYTES: [u8; 7] = [
    ASCII_END_BYTE,
    ASCII_START_BYTE,
    UBX_SYNC_CHAR_1,
    RTCM3_START_BYTE,
    ISB_ESCAPE_KEY,
    ISB_END_BYTE,
    ISB_V1_START_BYTE,
];

pub const ASCII_START_BYTE: u8 = 0x24; // '$'
pub const ASCII_END_BYTE: u8 = 0x0a; // '\n' (<LF>)
pub(crate) const ASCII_CR: u8 = 0x0d; // '\r' (<CR>)
pub(crate) const ASCII_CHECKSUM_DELIMITER: u8 = 0x2a; // '*'
pub const ASCII_MAX_FRAME_LEN: usize = 256;
pub(crate) const ASCII_MIN_FRAME_LEN: usize = 5; // '$' + '*' + 2 hex digits + '\n'

pub const UBX_SYNC_CHAR_1: u8 = 0xb5;
pub const UBX_SYNC_CHAR_2: u8 = 0x62;
pub const UBX_HEADER_LEN: usize = 6; // sync (2) + class (1) + id (1) + length (2)
pub(crate) const UBX_CLASS_OFFSET: usize = 2; // After SYNC_CHAR_1, SYNC_CHAR_2
pub(crate) const UBX_LENGTH_OFFSET: usize = 4; // After CLASS, MSG_ID
pub(crate) const UBX_CHECKSUM_LEN: usize = 2;
pub const UBX_MAX_PAYLOAD_LEN: usize = 1240;

pub const RTCM3_START_BYTE: u8 = 0xd3;
pub const RTCM3_HEADER_LEN: usize = 3; // sync char (1) + 6 reserved bits and 10 bits length (2)
pub(crate) const RTCM3_LENGTH_MASK: u16 = 0x03ff;
pub(crate) const RTCM3_CRC_LEN: usize = 3;

pub const SONY_START_BYTE: u8 = 0x7f;
pub const SONY_HEADER_LEN: usize = 5; // start (1) + length (2) + opcode (1) + header checksum (1)
pub(crate) const SONY_CHECKSUM_LEN: usize = 1;

pub const SPARTN_START_BYTE: u8 = 0x73;
/// Bytes needed to read every fixed-position field that sizes the SPARTN header
pub(crate) const SPARTN_MIN_HEADER_LEN: usize = 5;
/// Embedded authentication data length, indexed by the 3-bit length code
pub(crate) const SPARTN_AUTH_LEN: [usize; 5] = [8, 12, 16, 32, 64];

pub const CHECKSUM_SEED: u32 = 0x00aa_aaaa;

/// Largest data set (DID structure) addressable by offset and size
pub const MAX_DATASET_SIZE: usize = 1024;
/// Size of a buffer large enough for any encoded ISB frame
pub const PKT_BUF_SIZE: usize = 2048;

pub const PKT_HEADER_SIZE: usize = 4; // start (1) + pid (1) + counter (1) + flags (1)
pub const PKT_FOOTER_SIZE: usize = 4; // checksum (3) + stop (1)
pub const PKT_OVERHEAD_SIZE: usize = PKT_HEADER_SIZE + PKT_FOOTER_SIZE;
/// Worst case framing overhead once every escapable byte doubled
pub const MAX_PKT_OVERHEAD_SIZE: usize = PKT_OVERHEAD_SIZE + PKT_OVERHEAD_SIZE - 2;
pub const MAX_PKT_BODY_SIZE: usize = ((PKT_BUF_SIZE - MAX_PKT_OVERHEAD_SIZE) / 2) & !1;
pub const DATA_HEADER_SIZE: usize = 12;
pub const ACK_HEADER_SIZE: usize = 8;
pub const MAX_P_DATA_BODY_SIZE: usize = MAX_PKT_BODY_SIZE - DATA_HEADER_SIZE;
pub const MAX_P_ACK_BODY_SIZE: usize = MAX_PKT_BODY_SIZE - ACK_HEADER_SIZE;

pub(crate) const ISB_V2_LENGTH_LEN: usize = 2;
pub(crate) const ISB_V2_HEADER_SIZE: usize = PKT_HEADER_SIZE + ISB_V2_LENGTH_LEN;
pub(crate) const ISB_CHECKSUM_LEN: usize = 3;
/// Smallest legal legacy frame: start, pid, counter, flags, checksum and stop
pub(crate) const ISB_V1_MIN_FRAME_LEN: usize = PKT_OVERHEAD_SIZE;

pub const PACKET_INFO_ID_MASK: u8 = 0x1f;

/// Realtime message controller data set, its first field is the 64-bit broadcast bitmask
pub const DID_RMC: u32 = 9;
