//! ISB packet structures and their explicit wire (de)serialization.

use bitflags::bitflags;

use crate::{
    checksum::ChecksumWidth,
    constants::{ACK_HEADER_SIZE, DATA_HEADER_SIZE, ISB_END_BYTE, PACKET_INFO_ID_MASK},
    error::ParserError,
};

/// ISB packet identifier, the low 5 bits of the packet info byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketId {
    Invalid = 0,
    /// Acknowledge of a received `SetData`/`GetData`
    Ack = 1,
    /// Negative acknowledge
    Nack = 2,
    /// Request a data set, once or as a periodic broadcast
    GetData = 3,
    /// Data set, no acknowledge expected
    Data = 4,
    /// Data set the receiver acknowledges
    SetData = 5,
    StopBroadcastsAllPorts = 6,
    StopDidBroadcast = 7,
    StopBroadcastsCurrentPort = 8,
}

impl TryFrom<u8> for PacketId {
    type Error = ParserError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value & PACKET_INFO_ID_MASK {
            0 => Ok(PacketId::Invalid),
            1 => Ok(PacketId::Ack),
            2 => Ok(PacketId::Nack),
            3 => Ok(PacketId::GetData),
            4 => Ok(PacketId::Data),
            5 => Ok(PacketId::SetData),
            6 => Ok(PacketId::StopBroadcastsAllPorts),
            7 => Ok(PacketId::StopDidBroadcast),
            8 => Ok(PacketId::StopBroadcastsCurrentPort),
            _ => Err(ParserError::InvalidField {
                packet: "ISB",
                field: "pid",
            }),
        }
    }
}

bitflags! {
    /// ISB header flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PacketFlags: u8 {
        /// Body words are little endian, big endian otherwise
        const LITTLE_ENDIAN = 0x01;
        /// Sender has received valid ISB data from us
        const RX_VALID_DATA = 0x02;
        const MORE_DATA_AVAILABLE = 0x04;
        /// Body bytes are passed through without word swapping
        const RAW_DATA_NO_SWAP = 0x08;
        /// Footer carries a 24-bit checksum instead of the legacy 16-bit one
        const CHECKSUM_24_BIT = 0x10;
    }
}

impl PacketFlags {
    /// Endianness flag matching the host
    pub fn native() -> Self {
        match Endianness::native() {
            Endianness::Little => PacketFlags::LITTLE_ENDIAN,
            Endianness::Big => PacketFlags::empty(),
        }
    }

    pub fn checksum_width(self) -> ChecksumWidth {
        if self.contains(PacketFlags::CHECKSUM_24_BIT) {
            ChecksumWidth::Bits24
        } else {
            ChecksumWidth::Bits16
        }
    }

    pub fn endianness(self) -> Endianness {
        if self.contains(PacketFlags::LITTLE_ENDIAN) {
            Endianness::Little
        } else {
            Endianness::Big
        }
    }

    /// Whether body words must be byte swapped to move between wire and host order
    pub fn needs_swap(self) -> bool {
        !self.contains(PacketFlags::RAW_DATA_NO_SWAP) && self.endianness() != Endianness::native()
    }

    /// Byte order of typed fields once the body is decoded
    pub fn field_order(self) -> Endianness {
        if self.contains(PacketFlags::RAW_DATA_NO_SWAP) {
            self.endianness()
        } else {
            Endianness::native()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endianness {
    Little,
    Big,
}

impl Endianness {
    pub const fn native() -> Self {
        if cfg!(target_endian = "little") {
            Endianness::Little
        } else {
            Endianness::Big
        }
    }

    pub(crate) fn read_u32(self, bytes: [u8; 4]) -> u32 {
        match self {
            Endianness::Little => u32::from_le_bytes(bytes),
            Endianness::Big => u32::from_be_bytes(bytes),
        }
    }

    pub(crate) fn write_u32(self, value: u32) -> [u8; 4] {
        match self {
            Endianness::Little => value.to_le_bytes(),
            Endianness::Big => value.to_be_bytes(),
        }
    }
}

/// Reverses every complete 32-bit word of `bytes`. A trailing partial word is untouched.
pub(crate) fn swap_words(bytes: &mut [u8]) {
    for word in bytes.chunks_exact_mut(4) {
        word.reverse();
    }
}

fn read_words<const N: usize>(
    bytes: &[u8],
    order: Endianness,
    packet: &'static str,
) -> Result<[u32; N], ParserError> {
    if bytes.len() < N * 4 {
        return Err(ParserError::Truncated { packet });
    }
    let mut words = [0u32; N];
    for (word, chunk) in words.iter_mut().zip(bytes.chunks_exact(4)) {
        *word = order.read_u32([chunk[0], chunk[1], chunk[2], chunk[3]]);
    }
    Ok(words)
}

fn write_words<const N: usize, const B: usize>(words: [u32; N], order: Endianness) -> [u8; B] {
    let mut bytes = [0u8; B];
    for (chunk, word) in bytes.chunks_exact_mut(4).zip(words) {
        chunk.copy_from_slice(&order.write_u32(word));
    }
    bytes
}

/// 4-byte ISB header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PacketHeader {
    pub start: u8,
    /// Packet info byte, the id lives in the low 5 bits
    pub pid: u8,
    /// Retry counter, echoed by acknowledges
    pub counter: u8,
    pub flags: PacketFlags,
}

impl PacketHeader {
    pub fn new(start: u8, id: PacketId, counter: u8, flags: PacketFlags) -> Self {
        Self {
            start,
            pid: id as u8,
            counter,
            flags,
        }
    }

    pub fn id(&self) -> Result<PacketId, ParserError> {
        PacketId::try_from(self.pid)
    }

    pub fn to_bytes(&self) -> [u8; 4] {
        [self.start, self.pid, self.counter, self.flags.bits()]
    }

    pub fn from_bytes(bytes: [u8; 4]) -> Self {
        Self {
            start: bytes[0],
            pid: bytes[1],
            counter: bytes[2],
            flags: PacketFlags::from_bits_retain(bytes[3]),
        }
    }
}

/// 4-byte ISB footer, checksum most significant byte first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PacketFooter {
    /// 24-bit value, the top byte is zero for 16-bit checksums
    pub checksum: u32,
    pub stop: u8,
}

impl PacketFooter {
    pub fn new(checksum: u32) -> Self {
        Self {
            checksum: checksum & ChecksumWidth::Bits24.mask(),
            stop: ISB_END_BYTE,
        }
    }

    pub fn checksum_bytes(&self) -> [u8; 3] {
        let [_, ck2, ck1, ck0] = self.checksum.to_be_bytes();
        [ck2, ck1, ck0]
    }

    pub fn to_bytes(&self) -> [u8; 4] {
        let [ck2, ck1, ck0] = self.checksum_bytes();
        [ck2, ck1, ck0, self.stop]
    }

    pub fn from_bytes(bytes: [u8; 4]) -> Self {
        Self {
            checksum: u32::from_be_bytes([0, bytes[0], bytes[1], bytes[2]]),
            stop: bytes[3],
        }
    }
}

/// Describes a (partial) data set carried by `Data`/`SetData` packets
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DataHeader {
    /// Data set identifier (DID)
    pub id: u32,
    /// Bytes of the data set carried
    pub size: u32,
    /// Byte offset into the data set
    pub offset: u32,
}

impl DataHeader {
    pub const SIZE: usize = DATA_HEADER_SIZE;

    pub fn new(id: u32, offset: u32, size: u32) -> Self {
        Self { id, size, offset }
    }

    pub fn read(bytes: &[u8], order: Endianness) -> Result<Self, ParserError> {
        let [id, size, offset] = read_words::<3>(bytes, order, "ISB data header")?;
        Ok(Self { id, size, offset })
    }

    pub fn to_bytes(&self, order: Endianness) -> [u8; DATA_HEADER_SIZE] {
        write_words([self.id, self.size, self.offset], order)
    }
}

/// Body of a `GetData` request
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DataGet {
    pub id: u32,
    pub size: u32,
    pub offset: u32,
    /// Broadcast period as a multiple of the data set source period, 0 for a single reply
    pub period_multiple: u32,
}

impl DataGet {
    pub const SIZE: usize = 16;

    pub fn read(bytes: &[u8], order: Endianness) -> Result<Self, ParserError> {
        let [id, size, offset, period_multiple] = read_words::<4>(bytes, order, "ISB get data")?;
        Ok(Self {
            id,
            size,
            offset,
            period_multiple,
        })
    }

    pub fn to_bytes(&self, order: Endianness) -> [u8; Self::SIZE] {
        write_words([self.id, self.size, self.offset, self.period_multiple], order)
    }
}

/// Body of a `StopDidBroadcast` request
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DataDisable {
    pub id: u32,
}

impl DataDisable {
    pub const SIZE: usize = 4;

    pub fn read(bytes: &[u8], order: Endianness) -> Result<Self, ParserError> {
        let [id] = read_words::<1>(bytes, order, "ISB stop broadcast")?;
        Ok(Self { id })
    }

    pub fn to_bytes(&self, order: Endianness) -> [u8; Self::SIZE] {
        write_words([self.id], order)
    }
}

/// Leading part of an `Ack`/`Nack` body, echoing the acknowledged packet
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AckHeader {
    pub pkt_info: u32,
    pub pkt_counter: u32,
}

impl AckHeader {
    pub const SIZE: usize = ACK_HEADER_SIZE;

    /// Header acknowledging the packet described by `header`
    pub fn for_packet(header: &PacketHeader) -> Self {
        Self {
            pkt_info: u32::from(header.pid),
            pkt_counter: u32::from(header.counter),
        }
    }

    pub fn acked_id(&self) -> Result<PacketId, ParserError> {
        PacketId::try_from((self.pkt_info & 0xff) as u8)
    }

    pub fn read(bytes: &[u8], order: Endianness) -> Result<Self, ParserError> {
        let [pkt_info, pkt_counter] = read_words::<2>(bytes, order, "ISB ack")?;
        Ok(Self {
            pkt_info,
            pkt_counter,
        })
    }

    pub fn to_bytes(&self, order: Endianness) -> [u8; Self::SIZE] {
        write_words([self.pkt_info, self.pkt_counter], order)
    }
}

/// What follows the [`AckHeader`]: the data header of an acknowledged data packet, or
/// opaque bytes for anything else
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckBody<'a> {
    RawBytes(&'a [u8]),
    DataHeader(DataHeader),
}

/// Decoded `Ack`/`Nack` packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ack<'a> {
    /// `Ack` or `Nack`
    pub kind: PacketId,
    pub header: AckHeader,
    pub body: AckBody<'a>,
}

impl<'a> Ack<'a> {
    pub fn read(kind: PacketId, bytes: &'a [u8], order: Endianness) -> Result<Self, ParserError> {
        let header = AckHeader::read(bytes, order)?;
        let rest = &bytes[AckHeader::SIZE..];
        let body = match header.acked_id() {
            Ok(PacketId::Data | PacketId::SetData | PacketId::GetData)
                if rest.len() >= DataHeader::SIZE =>
            {
                AckBody::DataHeader(DataHeader::read(rest, order)?)
            },
            _ => AckBody::RawBytes(rest),
        };
        Ok(Self { kind, header, body })
    }
}

/// View of a decoded ISB packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Packet<'a> {
    pub(crate) header: PacketHeader,
    pub(crate) body: &'a [u8],
    pub(crate) checksum: u32,
}

impl<'a> Packet<'a> {
    pub fn header(&self) -> &PacketHeader {
        &self.header
    }

    pub fn id(&self) -> Result<PacketId, ParserError> {
        self.header.id()
    }

    pub fn flags(&self) -> PacketFlags {
        self.header.flags
    }

    /// Body in host word order unless `RAW_DATA_NO_SWAP` is set
    pub fn body(&self) -> &'a [u8] {
        self.body
    }

    pub fn checksum(&self) -> u32 {
        self.checksum
    }

    /// Byte order to read typed body fields with
    pub fn field_order(&self) -> Endianness {
        self.header.flags.field_order()
    }
}
