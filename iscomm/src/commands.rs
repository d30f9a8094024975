//! Builders for outgoing ISB requests.
//!
//! Every builder encodes one frame into the instance's transmit buffer and returns the
//! encoded bytes, ready to be written to the port. The frame counter is the low byte of
//! [`CommInstance::tx_pkt_count`], which increments per built frame.

use log::trace;

use crate::{
    baud::BaudRate,
    codec,
    comm::CommInstance,
    constants::{DATA_HEADER_SIZE, DID_RMC, MAX_PKT_BODY_SIZE, MAX_P_DATA_BODY_SIZE},
    error::CommError,
    packet::{
        AckHeader, DataDisable, DataGet, DataHeader, Endianness, PacketFlags, PacketHeader,
        PacketId,
    },
};

impl CommInstance<'_> {
    fn send(&mut self, id: PacketId, body: &[&[u8]]) -> Result<&[u8], CommError> {
        let config = *self.config();
        if !config.can_encode() {
            return Err(CommError::EncodingDisabled);
        }
        let mut flags = PacketFlags::native() | PacketFlags::CHECKSUM_24_BIT;
        if self.rx_valid_data {
            flags |= PacketFlags::RX_VALID_DATA;
        }
        let header = PacketHeader::new(
            config.tx_version.start_byte(),
            id,
            self.tx_pkt_count as u8,
            flags,
        );
        let tx = self.tx_buffer();
        let len = codec::encode_binary_packet(tx, &header, PacketFlags::empty(), body, &config)?;
        self.tx_pkt_count = self.tx_pkt_count.wrapping_add(1);
        trace!("encoded {:?} packet, {} bytes", id, len);
        Ok(&self.tx_buffer()[..len])
    }

    fn send_data(
        &mut self,
        id: PacketId,
        did: u32,
        offset: u32,
        data: &[u8],
    ) -> Result<&[u8], CommError> {
        if data.len() > MAX_P_DATA_BODY_SIZE {
            return Err(CommError::EncodeTooLarge {
                size: DATA_HEADER_SIZE + data.len(),
                max: MAX_PKT_BODY_SIZE,
            });
        }
        // data.len() <= MAX_P_DATA_BODY_SIZE
        let header = DataHeader::new(did, offset, data.len() as u32);
        let header = header.to_bytes(Endianness::native());
        self.send(id, &[&header, data])
    }

    /// Requests data set `did`. A `period_multiple` of 0 asks for a single reply, otherwise
    /// the device broadcasts it at that multiple of the data set's base period.
    pub fn get_data(
        &mut self,
        did: u32,
        offset: u32,
        size: u32,
        period_multiple: u32,
    ) -> Result<&[u8], CommError> {
        let request = DataGet {
            id: did,
            size,
            offset,
            period_multiple,
        };
        let body = request.to_bytes(Endianness::native());
        self.send(PacketId::GetData, &[&body])
    }

    /// Requests the broadcast of a preset bundle of data sets, `bits` being the RMC bitmask
    pub fn get_data_rmc(&mut self, bits: u64) -> Result<&[u8], CommError> {
        self.send_data(PacketId::SetData, DID_RMC, 0, &bits.to_ne_bytes())
    }

    /// Writes `data` at `offset` of data set `did`, no acknowledge expected
    pub fn set_data(&mut self, did: u32, offset: u32, data: &[u8]) -> Result<&[u8], CommError> {
        self.send_data(PacketId::Data, did, offset, data)
    }

    /// Writes `data` at `offset` of data set `did`, the device answers with an ack
    pub fn set_data_ack(
        &mut self,
        did: u32,
        offset: u32,
        data: &[u8],
    ) -> Result<&[u8], CommError> {
        self.send_data(PacketId::SetData, did, offset, data)
    }

    pub fn stop_broadcasts_all_ports(&mut self) -> Result<&[u8], CommError> {
        self.send(PacketId::StopBroadcastsAllPorts, &[])
    }

    pub fn stop_broadcasts_current_port(&mut self) -> Result<&[u8], CommError> {
        self.send(PacketId::StopBroadcastsCurrentPort, &[])
    }

    pub fn stop_did_broadcast(&mut self, did: u32) -> Result<&[u8], CommError> {
        let body = DataDisable { id: did }.to_bytes(Endianness::native());
        self.send(PacketId::StopDidBroadcast, &[&body])
    }

    /// Acknowledges a received packet, echoing its data header when it carried one
    pub fn send_ack(
        &mut self,
        header: &AckHeader,
        data: Option<&DataHeader>,
    ) -> Result<&[u8], CommError> {
        self.send_acknowledgement(PacketId::Ack, header, data)
    }

    pub fn send_nack(
        &mut self,
        header: &AckHeader,
        data: Option<&DataHeader>,
    ) -> Result<&[u8], CommError> {
        self.send_acknowledgement(PacketId::Nack, header, data)
    }

    fn send_acknowledgement(
        &mut self,
        id: PacketId,
        header: &AckHeader,
        data: Option<&DataHeader>,
    ) -> Result<&[u8], CommError> {
        let order = Endianness::native();
        let header = header.to_bytes(order);
        match data {
            Some(data) => self.send(id, &[&header, &data.to_bytes(order)]),
            None => self.send(id, &[&header]),
        }
    }

    /// Writes a baud rate field of a port configuration data set, refusing non standard rates
    pub fn set_baud_rate(&mut self, did: u32, offset: u32, baud: u32) -> Result<&[u8], CommError> {
        let baud = BaudRate::try_from(baud)?;
        self.set_data_ack(did, offset, &u32::from(baud).to_ne_bytes())
    }
}
