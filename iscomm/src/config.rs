use bitflags::bitflags;

use crate::constants::{ISB_V1_START_BYTE, ISB_V2_PREAMBLE};

bitflags! {
    /// Protocol families recognized by the parser
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct ProtocolMask: u32 {
        /// Legacy Inertial Sense binary, escaped framing
        const ISB_V1 = 0x01;
        /// NMEA style `$...*HH` sentences
        const ASCII = 0x02;
        const UBLOX = 0x04;
        const RTCM3 = 0x08;
        const SPARTN = 0x10;
        /// Sony CXD5610 binary
        const SONY = 0x20;
        /// Current Inertial Sense binary, length prefixed framing
        const ISB_V2 = 0x40;
    }
}

impl Default for ProtocolMask {
    fn default() -> Self {
        Self::all()
    }
}

/// Framing used for outgoing ISB packets
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum IsbVersion {
    #[default]
    V1,
    V2,
}

impl IsbVersion {
    pub const fn protocol(self) -> ProtocolMask {
        match self {
            IsbVersion::V1 => ProtocolMask::ISB_V1,
            IsbVersion::V2 => ProtocolMask::ISB_V2,
        }
    }

    pub const fn start_byte(self) -> u8 {
        match self {
            IsbVersion::V1 => ISB_V1_START_BYTE,
            IsbVersion::V2 => ISB_V2_PREAMBLE,
        }
    }
}

/// Per-instance configuration of a [`CommInstance`](crate::CommInstance).
///
/// `packet_encoding` controls the legacy byte escaping on both the encode and the decode
/// side. Peers must agree on it: with escaping disabled, payload bytes equal to a frame
/// delimiter end the frame early and the packet is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CommConfig {
    pub enabled: ProtocolMask,
    pub tx_version: IsbVersion,
    pub packet_encoding: bool,
}

impl Default for CommConfig {
    fn default() -> Self {
        Self {
            enabled: ProtocolMask::all(),
            tx_version: IsbVersion::V1,
            packet_encoding: true,
        }
    }
}

impl CommConfig {
    pub fn with_protocols(mut self, enabled: ProtocolMask) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_tx_version(mut self, version: IsbVersion) -> Self {
        self.tx_version = version;
        self
    }

    pub fn with_packet_encoding(mut self, enabled: bool) -> Self {
        self.packet_encoding = enabled;
        self
    }

    /// Whether outgoing packets can be built with this configuration
    pub fn can_encode(&self) -> bool {
        self.enabled.contains(self.tx_version.protocol())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_enables_everything() {
        let config = CommConfig::default();
        assert_eq!(config.enabled.bits(), 0x7f);
        assert!(config.packet_encoding);
        assert!(config.can_encode());
    }

    #[test]
    fn encoding_requires_tx_protocol() {
        let config = CommConfig::default()
            .with_protocols(ProtocolMask::ISB_V1 | ProtocolMask::ASCII)
            .with_tx_version(IsbVersion::V2);
        assert!(!config.can_encode());
        assert!(config.with_tx_version(IsbVersion::V1).can_encode());
    }
}
