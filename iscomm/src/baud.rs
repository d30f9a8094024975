use crate::error::CommError;

/// Standard serial baud rates accepted by the devices
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u32)]
pub enum BaudRate {
    B9600 = 9_600,
    B19200 = 19_200,
    B38400 = 38_400,
    B57600 = 57_600,
    B115200 = 115_200,
    B230400 = 230_400,
    B460800 = 460_800,
    #[default]
    B921600 = 921_600,
    B3125000 = 3_125_000,
    B9375000 = 9_375_000,
    B18750000 = 18_750_000,
}

impl BaudRate {
    pub const ALL: [BaudRate; 11] = [
        BaudRate::B9600,
        BaudRate::B19200,
        BaudRate::B38400,
        BaudRate::B57600,
        BaudRate::B115200,
        BaudRate::B230400,
        BaudRate::B460800,
        BaudRate::B921600,
        BaudRate::B3125000,
        BaudRate::B9375000,
        BaudRate::B18750000,
    ];
}

impl From<BaudRate> for u32 {
    fn from(value: BaudRate) -> Self {
        value as u32
    }
}

impl TryFrom<u32> for BaudRate {
    type Error = CommError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        BaudRate::ALL
            .into_iter()
            .find(|baud| u32::from(*baud) == value)
            .ok_or(CommError::InvalidBaudRate(value))
    }
}

pub fn validate_baud_rate(baud: u32) -> Result<BaudRate, CommError> {
    BaudRate::try_from(baud)
}
