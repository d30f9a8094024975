//! Checksums and CRCs of every supported framing, plus the MSB-first bit reader used by
//! bit-packed headers.

use crc::{Crc, CRC_16_XMODEM, CRC_24_LTE_A, CRC_32_ISO_HDLC, CRC_8_SMBUS};

use crate::{constants::CHECKSUM_SEED, error::ParserError};

/// Width of the checksum carried in an ISB footer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChecksumWidth {
    /// Legacy mode, the most significant footer byte is zero
    Bits16,
    Bits24,
}

impl ChecksumWidth {
    pub const fn mask(self) -> u32 {
        match self {
            ChecksumWidth::Bits16 => 0x0000_ffff,
            ChecksumWidth::Bits24 => 0x00ff_ffff,
        }
    }
}

/// Running ISB checksum.
///
/// Bytes are folded into the seeded accumulator as consecutive little-endian words, XOR-ed
/// in. The 24-bit mode uses 3-byte words, the legacy 16-bit mode 2-byte words. Both are
/// tracked at once because the width is only known once the flags byte has been read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IsbChecksum {
    wide: u32,
    narrow: u32,
    count: usize,
}

impl Default for IsbChecksum {
    fn default() -> Self {
        Self::new()
    }
}

impl IsbChecksum {
    pub const fn new() -> Self {
        Self {
            wide: CHECKSUM_SEED,
            narrow: CHECKSUM_SEED & 0xffff,
            count: 0,
        }
    }

    pub const fn update(&mut self, bytes: &[u8]) {
        let mut i = 0;
        while i < bytes.len() {
            self.update_byte(bytes[i]);
            i += 1;
        }
    }

    pub const fn update_byte(&mut self, byte: u8) {
        let byte = byte as u32;
        self.wide ^= byte << (8 * (self.count % 3));
        self.narrow ^= byte << (8 * (self.count % 2));
        self.count += 1;
    }

    pub const fn value(&self, width: ChecksumWidth) -> u32 {
        match width {
            ChecksumWidth::Bits16 => self.narrow & ChecksumWidth::Bits16.mask(),
            ChecksumWidth::Bits24 => self.wide & ChecksumWidth::Bits24.mask(),
        }
    }

    pub fn validate(&self, width: ChecksumWidth, received: u32) -> Result<(), ParserError> {
        let calculated = self.value(width);
        if calculated == received {
            Ok(())
        } else {
            Err(ParserError::InvalidChecksum {
                packet: "ISB",
                expect: received,
                got: calculated,
            })
        }
    }
}

/// One-shot ISB checksum of `bytes`
pub const fn isb_checksum(bytes: &[u8], width: ChecksumWidth) -> u32 {
    let mut calc = IsbChecksum::new();
    calc.update(bytes);
    calc.value(width)
}

const CRC_24Q: Crc<u32> = Crc::<u32>::new(&CRC_24_LTE_A);
const CRC_8: Crc<u8> = Crc::<u8>::new(&CRC_8_SMBUS);
const CRC_16: Crc<u16> = Crc::<u16>::new(&CRC_16_XMODEM);
const CRC_32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// Qualcomm CRC-24Q (polynomial 0x864CFB, zero init), as used by RTCM3 and SPARTN.
/// Covers exactly `bytes`, the caller slices the frame.
pub fn calculate_24bit_crc(bytes: &[u8]) -> u32 {
    CRC_24Q.checksum(bytes)
}

/// Reads `len` bits (at most 32) starting at bit `pos`, most significant bit first.
///
/// # Panics
///
/// Panics if `pos + len` runs past the end of `buf`.
pub fn get_bits_u32(buf: &[u8], pos: usize, len: usize) -> u32 {
    debug_assert!(len <= 32);
    (pos..pos + len).fold(0, |bits, i| {
        (bits << 1) | u32::from((buf[i / 8] >> (7 - i % 8)) & 1)
    })
}

/// UBX [Fletcher-16 checksum](https://en.wikipedia.org/wiki/Fletcher%27s_checksum) calculator
#[derive(Default)]
pub(crate) struct UbxChecksumCalc {
    ck_a: u8,
    ck_b: u8,
}

impl UbxChecksumCalc {
    pub(crate) const fn new() -> Self {
        Self { ck_a: 0, ck_b: 0 }
    }

    pub(crate) const fn update(&mut self, bytes: &[u8]) {
        let mut i = 0;
        while i < bytes.len() {
            self.ck_a = self.ck_a.wrapping_add(bytes[i]);
            self.ck_b = self.ck_b.wrapping_add(self.ck_a);
            i += 1;
        }
    }

    pub(crate) const fn result(&self) -> (u8, u8) {
        (self.ck_a, self.ck_b)
    }

    pub(crate) const fn validate_result(
        self,
        received_ck_a: u8,
        received_ck_b: u8,
    ) -> Result<(), ParserError> {
        let (ck_a, ck_b) = self.result();
        if ck_a == received_ck_a && ck_b == received_ck_b {
            Ok(())
        } else {
            Err(ParserError::InvalidChecksum {
                packet: "UBX",
                expect: u16::from_le_bytes([received_ck_a, received_ck_b]) as u32,
                got: u16::from_le_bytes([ck_a, ck_b]) as u32,
            })
        }
    }
}

/// XOR of every byte, the NMEA sentence checksum
pub fn nmea_checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0, |ck, b| ck ^ b)
}

/// 8-bit wrapping sum used by the Sony binary header and payload
pub fn sony_checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |ck, b| ck.wrapping_add(*b))
}

const SPARTN_CRC4_POLY: u8 = 0x03;

/// SPARTN frame CRC-4 (x^4 + x + 1, zero init) over the 20 bits following the preamble
pub fn spartn_frame_crc4(frame: &[u8]) -> u8 {
    (8..28).fold(0u8, |crc, pos| {
        let feedback = ((crc >> 3) & 1) ^ get_bits_u32(frame, pos, 1) as u8;
        let crc = (crc << 1) & 0x0f;
        if feedback != 0 {
            crc ^ SPARTN_CRC4_POLY
        } else {
            crc
        }
    })
}

/// SPARTN message CRC, selected by the 2-bit CRC type field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpartnCrc {
    Crc8,
    Crc16,
    Crc24,
    Crc32,
}

impl SpartnCrc {
    pub const fn from_code(code: u8) -> Self {
        match code & 0x03 {
            0 => SpartnCrc::Crc8,
            1 => SpartnCrc::Crc16,
            2 => SpartnCrc::Crc24,
            _ => SpartnCrc::Crc32,
        }
    }

    /// Number of CRC bytes closing the frame
    pub const fn len(self) -> usize {
        match self {
            SpartnCrc::Crc8 => 1,
            SpartnCrc::Crc16 => 2,
            SpartnCrc::Crc24 => 3,
            SpartnCrc::Crc32 => 4,
        }
    }

    pub fn compute(self, bytes: &[u8]) -> u32 {
        match self {
            SpartnCrc::Crc8 => u32::from(CRC_8.checksum(bytes)),
            SpartnCrc::Crc16 => u32::from(CRC_16.checksum(bytes)),
            SpartnCrc::Crc24 => calculate_24bit_crc(bytes),
            SpartnCrc::Crc32 => CRC_32.checksum(bytes),
        }
    }
}
