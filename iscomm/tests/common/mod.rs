//! Builders of well formed frames for every family the parser knows.
#![allow(dead_code)]

use byteorder::{BigEndian, LittleEndian, WriteBytesExt};
use crc::{Crc, CRC_24_LTE_A};
use iscomm::{
    checksum::{spartn_frame_crc4, SpartnCrc},
    codec::encode_binary_packet,
    constants::PKT_BUF_SIZE,
    AckHeader, CommConfig, DataHeader, Endianness, IsbVersion, PacketFlags, PacketHeader,
    PacketId,
};

/// Bytes that start a frame of some family, never part of generated garbage
pub const START_BYTES: [u8; 7] = [0xef, 0xff, 0xb5, 0xd3, 0x7f, 0x73, 0x24];

/// Calculates the 8-bit Fletcher-16 checksum used by U-Blox.
fn ubx_checksum(data: &[u8]) -> (u8, u8) {
    let mut ck_a: u8 = 0;
    let mut ck_b: u8 = 0;
    for byte in data {
        ck_a = ck_a.wrapping_add(*byte);
        ck_b = ck_b.wrapping_add(ck_a);
    }
    (ck_a, ck_b)
}

pub fn ubx_frame(class: u8, id: u8, payload: &[u8]) -> Vec<u8> {
    let mut wtr = vec![0xb5, 0x62, class, id];
    wtr.write_u16::<LittleEndian>(payload.len() as u16).unwrap();
    wtr.extend_from_slice(payload);
    let (ck_a, ck_b) = ubx_checksum(&wtr[2..]);
    wtr.push(ck_a);
    wtr.push(ck_b);
    wtr
}

pub fn rtcm3_frame(payload: &[u8]) -> Vec<u8> {
    assert!(payload.len() < 1024);
    let mut wtr = vec![0xd3];
    wtr.write_u16::<BigEndian>(payload.len() as u16).unwrap();
    wtr.extend_from_slice(payload);
    let crc = Crc::<u32>::new(&CRC_24_LTE_A).checksum(&wtr);
    wtr.write_u24::<BigEndian>(crc).unwrap();
    wtr
}

fn sum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b))
}

pub fn sony_frame(opcode: u8, payload: &[u8]) -> Vec<u8> {
    let mut wtr = vec![0x7f];
    wtr.write_u16::<LittleEndian>(payload.len() as u16).unwrap();
    wtr.push(opcode);
    wtr.push(sum(&wtr));
    if !payload.is_empty() {
        wtr.extend_from_slice(payload);
        wtr.push(sum(payload));
    }
    wtr
}

fn put_bits(buf: &mut [u8], pos: usize, len: usize, value: u32) {
    for i in 0..len {
        let p = pos + i;
        let mask = 0x80 >> (p % 8);
        if (value >> (len - 1 - i)) & 1 != 0 {
            buf[p / 8] |= mask;
        } else {
            buf[p / 8] &= !mask;
        }
    }
}

/// Unencrypted SPARTN frame
pub fn spartn_frame(msg_type: u8, crc_type: u8, long_time_tag: bool, payload: &[u8]) -> Vec<u8> {
    assert!(payload.len() < 1024);
    let header_len = if long_time_tag { 10 } else { 8 };
    let mut wtr = vec![0u8; header_len];
    wtr[0] = 0x73;
    put_bits(&mut wtr, 8, 7, u32::from(msg_type & 0x7f));
    put_bits(&mut wtr, 15, 10, payload.len() as u32);
    put_bits(&mut wtr, 26, 2, u32::from(crc_type & 0x03));
    let crc4 = spartn_frame_crc4(&wtr);
    put_bits(&mut wtr, 28, 4, u32::from(crc4));
    put_bits(&mut wtr, 36, 1, u32::from(long_time_tag));
    wtr.extend_from_slice(payload);

    let crc = SpartnCrc::from_code(crc_type);
    let value = crc.compute(&wtr[1..]);
    wtr.extend_from_slice(&value.to_be_bytes()[4 - crc.len()..]);
    wtr
}

/// `$body*HH\r\n`
pub fn ascii_frame(body: &str) -> Vec<u8> {
    let ck = body.bytes().fold(0u8, |acc, b| acc ^ b);
    format!("${}*{:02X}\r\n", body, ck).into_bytes()
}

pub fn isb_frame(
    id: PacketId,
    flags: PacketFlags,
    body: &[u8],
    version: IsbVersion,
    packet_encoding: bool,
) -> Vec<u8> {
    let config = CommConfig::default()
        .with_tx_version(version)
        .with_packet_encoding(packet_encoding);
    let header = PacketHeader::new(version.start_byte(), id, 0, flags);
    let mut out = vec![0u8; PKT_BUF_SIZE];
    let len = encode_binary_packet(&mut out, &header, PacketFlags::empty(), &[body], &config)
        .unwrap();
    out.truncate(len);
    out
}

/// `Data` packet writing `data` at `offset` of data set `did`
pub fn isb_data_frame(did: u32, offset: u32, data: &[u8], version: IsbVersion) -> Vec<u8> {
    let hdr = DataHeader::new(did, offset, data.len() as u32);
    let mut body = hdr.to_bytes(Endianness::native()).to_vec();
    body.extend_from_slice(data);
    isb_frame(
        PacketId::Data,
        PacketFlags::native() | PacketFlags::CHECKSUM_24_BIT,
        &body,
        version,
        true,
    )
}

pub fn isb_ack_frame(acked: PacketId, counter: u8, version: IsbVersion) -> Vec<u8> {
    let ack = AckHeader {
        pkt_info: acked as u32,
        pkt_counter: u32::from(counter),
    };
    isb_frame(
        PacketId::Ack,
        PacketFlags::native() | PacketFlags::CHECKSUM_24_BIT,
        &ack.to_bytes(Endianness::native()),
        version,
        true,
    )
}
