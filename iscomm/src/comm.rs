use core::ops::Range;

use log::{debug, warn};

use crate::{
    buffer::CommBuffer,
    codec,
    config::{CommConfig, ProtocolMask},
    constants::{DATA_HEADER_SIZE, MAX_DATASET_SIZE, PKT_HEADER_SIZE},
    error::{CommError, ParserError},
    packet::{Ack, DataDisable, DataGet, DataHeader, Packet, PacketHeader, PacketId},
    parser::{Event, Family, ParseState, Parser, ProtocolType},
};

/// Decoded ISB command request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    GetData(DataGet),
    StopDidBroadcast(DataDisable),
    StopBroadcastsAllPorts,
    StopBroadcastsCurrentPort,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Rx,
    Alt,
}

/// Decoded ISB packet, ranges index the decode destination
#[derive(Debug, Clone)]
struct IsbView {
    header: PacketHeader,
    checksum: u32,
    body: Range<usize>,
}

/// Where the last reported frame lives. Only valid until the next parse call.
#[derive(Debug, Clone)]
struct RxView {
    source: Source,
    /// Foreign frame or decoded ISB packet, header included
    packet: Range<usize>,
    /// Undecoded frame bytes in the receive buffer, when still intact
    raw: Option<Range<usize>>,
    isb: Option<IsbView>,
    data: Option<Range<usize>>,
}

/// Parsing and encoding state of one stream.
///
/// The instance borrows a receive buffer, a transmit buffer for the command builders
/// and optionally an alternate decode buffer. Nothing is allocated.
///
/// ```
/// use iscomm::{CommInstance, ProtocolType};
///
/// let mut rx = [0u8; 512];
/// let mut tx = [0u8; 128];
/// let mut comm = CommInstance::new(&mut rx, &mut tx);
///
/// let mut frames = 0;
/// for &byte in b"xx$GPZDA*48\r\n" {
///     if comm.parse_byte(byte) == ProtocolType::Ascii {
///         assert_eq!(comm.packet(), Some(&b"$GPZDA*48\r\n"[..]));
///         frames += 1;
///     }
/// }
/// assert_eq!(frames, 1);
/// ```
#[derive(Debug)]
pub struct CommInstance<'a> {
    config: CommConfig,
    rx: CommBuffer<'a>,
    tx: &'a mut [u8],
    alt: Option<&'a mut [u8]>,
    parser: Parser,
    view: Option<RxView>,
    data_header: DataHeader,
    last_error: Option<ParserError>,
    pub(crate) tx_pkt_count: u32,
    rx_error_count: u32,
    pub(crate) rx_valid_data: bool,
}

impl<'a> CommInstance<'a> {
    pub fn new(rx: &'a mut [u8], tx: &'a mut [u8]) -> Self {
        Self::with_config(rx, tx, CommConfig::default())
    }

    pub fn with_config(rx: &'a mut [u8], tx: &'a mut [u8], config: CommConfig) -> Self {
        Self {
            config,
            rx: CommBuffer::new(rx),
            tx,
            alt: None,
            parser: Parser::default(),
            view: None,
            data_header: DataHeader::default(),
            last_error: None,
            tx_pkt_count: 0,
            rx_error_count: 0,
            rx_valid_data: false,
        }
    }

    /// Decode ISB frames into `alt` instead of in place, keeping the received frame bytes
    /// intact for [`raw_frame`](Self::raw_frame). `alt` should hold at least
    /// [`PKT_BUF_SIZE`](crate::constants::PKT_BUF_SIZE) bytes, frames that don't fit are
    /// rejected with [`ParserError::OutOfMemory`].
    pub fn with_alt_decode_buffer(mut self, alt: &'a mut [u8]) -> Self {
        self.alt = Some(alt);
        self
    }

    pub fn config(&self) -> &CommConfig {
        &self.config
    }

    pub fn set_enabled_protocols(&mut self, enabled: ProtocolMask) {
        self.config.enabled = enabled;
    }

    pub fn set_packet_encoding(&mut self, packet_encoding: bool) {
        self.config.packet_encoding = packet_encoding;
    }

    pub fn rx_buffer(&self) -> &CommBuffer<'a> {
        &self.rx
    }

    pub fn parse_state(&self) -> ParseState {
        self.parser.state()
    }

    pub fn rx_error_count(&self) -> u32 {
        self.rx_error_count
    }

    pub fn tx_pkt_count(&self) -> u32 {
        self.tx_pkt_count
    }

    /// Whether a valid ISB packet has been received on this stream
    pub fn rx_valid_data(&self) -> bool {
        self.rx_valid_data
    }

    /// Cause of the most recent [`ProtocolType::ParseError`]
    pub fn last_error(&self) -> Option<&ParserError> {
        self.last_error.as_ref()
    }

    /// Data header of the most recent ISB data packet or command
    pub fn data_header(&self) -> &DataHeader {
        &self.data_header
    }

    /// Appends one byte and parses. When the buffer is full it is compacted first, and a
    /// partial frame too large to ever complete is dropped.
    ///
    /// Only one result is reported per call. After a [`ProtocolType::ParseError`] the
    /// swallowed bytes are rescanned by the following calls, [`parse`](Self::parse) drains
    /// them at once.
    pub fn parse_byte(&mut self, byte: u8) -> ProtocolType {
        self.make_room();
        if self.rx.append(&[byte]).is_err() {
            // make_room leaves at least one free byte
            return ProtocolType::None;
        }
        self.parse()
    }

    /// Appends `bytes` without parsing
    pub fn receive(&mut self, bytes: &[u8]) -> Result<(), CommError> {
        self.rx.append(bytes)
    }

    /// Free space of the receive buffer, for transports reading straight into it.
    /// Follow with [`commit`](Self::commit), then [`parse`](Self::parse).
    pub fn spare_capacity_mut(&mut self) -> &mut [u8] {
        self.rx.spare_capacity_mut()
    }

    pub fn commit(&mut self, count: usize) -> Result<(), CommError> {
        self.rx.commit(count)
    }

    /// Compacts the receive buffer and returns its free space. A partially parsed frame
    /// is kept. Invalidates the views of the last frame.
    pub fn free(&mut self) -> usize {
        self.view = None;
        self.rx.compact()
    }

    /// Drops every buffered byte and the parse state. Counters are kept.
    pub fn reset(&mut self) {
        self.view = None;
        self.rx.clear();
        self.parser.reset();
    }

    /// Parses the buffered bytes up to the first completed or rejected frame.
    ///
    /// Returns [`ProtocolType::None`] once the buffered bytes are exhausted. The views of
    /// the returned frame stay valid until the next parse call.
    pub fn parse(&mut self) -> ProtocolType {
        self.view = None;
        let Some(event) = self.parser.next_event(&mut self.rx, &self.config) else {
            return ProtocolType::None;
        };
        match event {
            Event::Rejected { family, error } => self.record_error(family, error),
            Event::Frame { family, range } if family.is_isb() => self.decode_isb(family, range),
            Event::Frame { family, range } => {
                self.view = Some(RxView {
                    source: Source::Rx,
                    packet: range.clone(),
                    raw: Some(range),
                    isb: None,
                    data: None,
                });
                family.foreign_tag()
            },
        }
    }

    fn record_error(&mut self, family: Family, error: ParserError) -> ProtocolType {
        debug!("rejected {} frame: {}", family.name(), error);
        self.rx_error_count = self.rx_error_count.wrapping_add(1);
        self.last_error = Some(error);
        ProtocolType::ParseError
    }

    /// Keeps at least one free byte at the end of the receive buffer
    fn make_room(&mut self) {
        if self.rx.free_space() > 0 {
            return;
        }
        self.view = None;
        if self.rx.compact() > 0 {
            return;
        }
        let Some(family) = self.parser.family() else {
            warn!("receive buffer full, dropping unparsed byte");
            self.rx.skip_candidate_start();
            self.rx.compact();
            return;
        };
        // The whole buffer is one unfinished candidate
        let error = ParserError::OutOfMemory {
            required_size: self.rx.len() + 1,
        };
        warn!(
            "receive buffer full, dropping partial {} frame",
            family.name()
        );
        if let Event::Rejected { family, error } = self.parser.reject(&mut self.rx, family, error) {
            self.record_error(family, error);
        }
        self.rx.compact();
    }

    fn decode_isb(&mut self, family: Family, range: Range<usize>) -> ProtocolType {
        let encoding = self.config.packet_encoding;
        let decoded = match self.alt.as_deref_mut() {
            Some(alt) => {
                codec::decode_binary_packet_to(self.rx.slice(range.clone()), alt, encoding)
                    .map(|packet| (Source::Alt, 0, isb_view(&packet, 0), Some(range.clone())))
            },
            None => codec::decode_binary_packet(self.rx.slice_mut(range.clone()), encoding)
                .map(|packet| (Source::Rx, range.start, isb_view(&packet, range.start), None)),
        };
        let (source, start, isb, raw) = match decoded {
            Ok(decoded) => decoded,
            Err(error) => return self.record_error(family, error),
        };
        let packet = start..isb.body.end;
        let mut view = RxView {
            source,
            packet,
            raw,
            isb: None,
            data: None,
        };
        let body = isb.body.clone();
        let header = isb.header;
        view.isb = Some(isb);

        let classified = self.classify(&header, source, body);
        match classified {
            Ok((protocol, data)) => {
                view.data = data;
                self.view = Some(view);
                self.rx_valid_data = true;
                protocol
            },
            Err(error) => self.record_error(family, error),
        }
    }

    fn source_slice(&self, source: Source, range: Range<usize>) -> &[u8] {
        match (source, self.alt.as_deref()) {
            (Source::Alt, Some(alt)) => &alt[range],
            _ => self.rx.slice(range),
        }
    }

    /// Tags a decoded ISB packet by its id and records its data header
    fn classify(
        &mut self,
        header: &PacketHeader,
        source: Source,
        body_range: Range<usize>,
    ) -> Result<(ProtocolType, Option<Range<usize>>), ParserError> {
        let order = header.flags.field_order();
        let body = self.source_slice(source, body_range.clone());
        let (protocol, data_header, data) = match header.id()? {
            PacketId::Data | PacketId::SetData => {
                let hdr = DataHeader::read(body, order)?;
                let size = hdr.size as usize;
                if size > body.len() - DATA_HEADER_SIZE {
                    return Err(ParserError::InvalidPacketLen {
                        packet: "ISB data",
                        max: body.len() - DATA_HEADER_SIZE,
                        got: size,
                    });
                }
                if hdr.offset as usize + size > MAX_DATASET_SIZE {
                    return Err(ParserError::InvalidField {
                        packet: "ISB data",
                        field: "offset + size",
                    });
                }
                let start = body_range.start + DATA_HEADER_SIZE;
                (ProtocolType::IsbData, hdr, Some(start..start + size))
            },
            PacketId::GetData => {
                let get = DataGet::read(body, order)?;
                let hdr = DataHeader::new(get.id, get.offset, get.size);
                (ProtocolType::IsbCmd, hdr, None)
            },
            PacketId::StopDidBroadcast => {
                let disable = DataDisable::read(body, order)?;
                (ProtocolType::IsbCmd, DataHeader::new(disable.id, 0, 0), None)
            },
            PacketId::StopBroadcastsAllPorts | PacketId::StopBroadcastsCurrentPort => {
                (ProtocolType::IsbCmd, DataHeader::default(), None)
            },
            kind @ (PacketId::Ack | PacketId::Nack) => {
                Ack::read(kind, body, order)?;
                (ProtocolType::IsbAck, self.data_header, None)
            },
            PacketId::Invalid => {
                return Err(ParserError::InvalidField {
                    packet: "ISB",
                    field: "pid",
                })
            },
        };
        self.data_header = data_header;
        Ok((protocol, data))
    }

    /// Bytes of the last frame: the whole frame for foreign families, the decoded
    /// `[start, pid, counter, flags, body..]` for ISB packets
    pub fn packet(&self) -> Option<&[u8]> {
        let view = self.view.as_ref()?;
        Some(self.source_slice(view.source, view.packet.clone()))
    }

    /// Undecoded bytes of the last frame, as received. ISB frames decoded in place have
    /// none, see [`with_alt_decode_buffer`](Self::with_alt_decode_buffer).
    pub fn raw_frame(&self) -> Option<&[u8]> {
        let raw = self.view.as_ref()?.raw.clone()?;
        Some(self.rx.slice(raw))
    }

    /// Data set bytes of the last [`ProtocolType::IsbData`] packet, in host word order
    pub fn data(&self) -> Option<&[u8]> {
        let view = self.view.as_ref()?;
        Some(self.source_slice(view.source, view.data.clone()?))
    }

    /// The last ISB packet, decoded
    pub fn isb_packet(&self) -> Option<Packet<'_>> {
        let view = self.view.as_ref()?;
        let isb = view.isb.as_ref()?;
        Some(Packet {
            header: isb.header,
            body: self.source_slice(view.source, isb.body.clone()),
            checksum: isb.checksum,
        })
    }

    /// Acknowledge carried by the last [`ProtocolType::IsbAck`] packet
    pub fn ack(&self) -> Option<Ack<'_>> {
        let packet = self.isb_packet()?;
        let kind = packet.id().ok()?;
        if !matches!(kind, PacketId::Ack | PacketId::Nack) {
            return None;
        }
        Ack::read(kind, packet.body(), packet.field_order()).ok()
    }

    /// Request carried by the last [`ProtocolType::IsbCmd`] packet
    pub fn command(&self) -> Option<Command> {
        let packet = self.isb_packet()?;
        let order = packet.field_order();
        match packet.id().ok()? {
            PacketId::GetData => DataGet::read(packet.body(), order).ok().map(Command::GetData),
            PacketId::StopDidBroadcast => DataDisable::read(packet.body(), order)
                .ok()
                .map(Command::StopDidBroadcast),
            PacketId::StopBroadcastsAllPorts => Some(Command::StopBroadcastsAllPorts),
            PacketId::StopBroadcastsCurrentPort => Some(Command::StopBroadcastsCurrentPort),
            _ => None,
        }
    }

    pub(crate) fn tx_buffer(&mut self) -> &mut [u8] {
        &mut self.tx[..]
    }
}

fn isb_view(packet: &Packet<'_>, start: usize) -> IsbView {
    let body = start + PKT_HEADER_SIZE;
    IsbView {
        header: packet.header,
        checksum: packet.checksum,
        body: body..body + packet.body.len(),
    }
}
