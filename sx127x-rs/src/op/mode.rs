//! Operating modes.

/// `LongRangeMode` bit of `RegOpMode`: LoRa instead of FSK/OOK.
pub const LONG_RANGE_MODE: u8 = 0x80;

const MODE_MASK: u8 = 0x07;

/// Transceiver mode bits of `RegOpMode`.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Mode {
    /// Sleep.
    Sleep = 0x00,
    /// Standby.
    Standby = 0x01,
    /// Transmit one packet, then return to standby.
    Tx = 0x03,
    /// Receive until told otherwise.
    RxContinuous = 0x05,
}

impl Mode {
    /// The full `RegOpMode` value selecting LoRa and this mode in a single write.
    pub const fn op_mode(self) -> u8 {
        LONG_RANGE_MODE | self as u8
    }

    /// Decodes the mode bits of a `RegOpMode` value.
    pub fn from_op_mode(value: u8) -> Option<Self> {
        match value & MODE_MASK {
            0x00 => Some(Self::Sleep),
            0x01 => Some(Self::Standby),
            0x03 => Some(Self::Tx),
            0x05 => Some(Self::RxContinuous),
            _ => None,
        }
    }
}

/// What the driver last asked the radio to do.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RadioState {
    /// Lowest power, configuration retained.
    Sleep,
    /// Idle, FIFO accessible.
    Standby,
    /// A packet is on the air.
    Transmitting,
    /// Listening in continuous receive mode.
    Receiving,
}

impl From<Mode> for RadioState {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Sleep => Self::Sleep,
            Mode::Standby => Self::Standby,
            Mode::Tx => Self::Transmitting,
            Mode::RxContinuous => Self::Receiving,
        }
    }
}
