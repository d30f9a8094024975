//! # iscomm
//!
//! A pure-rust, allocation free implementation of the Inertial Sense communication layer:
//! a streaming recognizer for the protocols multiplexed on an Inertial Sense serial port
//! and the codec of its native binary protocol (ISB).
//!
//! The parser recognizes ISB v1 and v2 packets, NMEA style ASCII sentences, UBX, RTCM3,
//! Sony CXD5610 binary and SPARTN frames. It resynchronizes by itself after noise,
//! truncated frames and checksum failures.
//!
//! Parsing Packets
//! ===============
//!
//! Parsing happens through a `CommInstance` bound to a caller supplied receive buffer.
//! Bytes are fed one at a time with `parse_byte()`, or appended in bulk and parsed with
//! `parse()` until it reports `ProtocolType::None`:
//! ```
//! use iscomm::{CommInstance, ProtocolType};
//!
//! let mut rx = [0u8; 1024];
//! let mut tx = [0u8; 256];
//! let mut comm = CommInstance::new(&mut rx, &mut tx);
//!
//! // From your serial port
//! let bytes = [0xb5, 0x62, 0x05, 0x01, 0x02, 0x00, 0x06, 0x01, 0x0f, 0x38];
//! comm.receive(&bytes).unwrap();
//! loop {
//!     match comm.parse() {
//!         ProtocolType::None => break,
//!         ProtocolType::ParseError => {
//!             // Malformed frame, see comm.last_error()
//!         },
//!         ProtocolType::IsbData => {
//!             // comm.data_header() and comm.data() describe the data set
//!         },
//!         protocol => {
//!             // Foreign frames are forwarded as is
//!             assert_eq!(protocol, ProtocolType::Ublox);
//!             assert_eq!(comm.packet().map(|frame| frame.len()), Some(10));
//!         },
//!     }
//! }
//! comm.free();
//! ```
//!
//! Constructing Packets
//! ====================
//!
//! Requests are encoded into the instance's transmit buffer:
//! ```
//! use iscomm::CommInstance;
//!
//! let mut rx = [0u8; 512];
//! let mut tx = [0u8; 128];
//! let mut comm = CommInstance::new(&mut rx, &mut tx);
//! let frame = comm.stop_broadcasts_all_ports().unwrap();
//! assert_eq!(frame.first(), Some(&0xff));
//! assert_eq!(frame.last(), Some(&0xfe));
//! ```
//! Arbitrary packets can be built with [`codec::encode_binary_packet`].
//!
//! no_std Support
//! ==============
//!
//! Disable the default `std` feature. The library never allocates, every buffer is
//! borrowed from the caller.

#![cfg_attr(not(feature = "std"), no_std)]

pub mod baud;
pub mod buffer;
pub mod checksum;
pub mod codec;
pub mod comm;
mod commands;
pub mod config;
pub mod constants;
pub mod error;
pub mod marshal;
pub mod packet;
pub mod parser;

pub use crate::{
    baud::{validate_baud_rate, BaudRate},
    buffer::CommBuffer,
    checksum::{calculate_24bit_crc, get_bits_u32},
    comm::{CommInstance, Command},
    config::{CommConfig, IsbVersion, ProtocolMask},
    error::{CommError, ParserError},
    packet::{
        Ack, AckBody, AckHeader, DataDisable, DataGet, DataHeader, Endianness, Packet,
        PacketFlags, PacketFooter, PacketHeader, PacketId,
    },
    parser::{ascii_message_id_to_u32, Family, ParseState, ProtocolType},
};
