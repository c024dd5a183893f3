//! SX127x register map (LoRa mode).

/// Registers used by the driver.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Register {
    /// FIFO read/write access.
    Fifo = 0x00,
    /// Operating mode and LoRa/FSK selection.
    OpMode = 0x01,
    /// RF carrier frequency, most significant bits.
    FrfMsb = 0x06,
    /// RF carrier frequency, intermediate bits.
    FrfMid = 0x07,
    /// RF carrier frequency, least significant bits.
    FrfLsb = 0x08,
    /// PA selection and output power control.
    PaConfig = 0x09,
    /// Over current protection control.
    Ocp = 0x0B,
    /// LNA settings.
    Lna = 0x0C,
    /// FIFO SPI pointer.
    FifoAddrPtr = 0x0D,
    /// Start TX data.
    FifoTxBaseAddr = 0x0E,
    /// Start RX data.
    FifoRxBaseAddr = 0x0F,
    /// Start address of the last packet received.
    FifoRxCurrentAddr = 0x10,
    /// IRQ flag mask, a set bit masks the interrupt. Cleared by `init`.
    IrqFlagsMask = 0x11,
    /// IRQ flags, write 1 to clear.
    IrqFlags = 0x12,
    /// Number of received bytes.
    RxNbBytes = 0x13,
    /// Estimation of the last packet SNR.
    PktSnrValue = 0x19,
    /// RSSI of the last packet.
    PktRssiValue = 0x1A,
    /// Bandwidth, coding rate and header mode.
    ModemConfig1 = 0x1D,
    /// Spreading factor and CRC enable.
    ModemConfig2 = 0x1E,
    /// Preamble length, MSB.
    PreambleMsb = 0x20,
    /// Preamble length, LSB.
    PreambleLsb = 0x21,
    /// Payload length in bytes.
    PayloadLength = 0x22,
    /// Low data rate optimize and AGC.
    ModemConfig3 = 0x26,
    /// LoRa detection optimize for SF6.
    DetectionOptimize = 0x31,
    /// LoRa detection threshold for SF6.
    DetectionThreshold = 0x37,
    /// LoRa sync word.
    SyncWord = 0x39,
    /// Mapping of pins DIO0 to DIO3.
    DioMapping1 = 0x40,
    /// Semtech ID relating the silicon revision.
    Version = 0x42,
    /// Higher power settings of the PA.
    PaDac = 0x4D,
}

impl Register {
    /// The 7-bit register address.
    pub const fn addr(self) -> u8 {
        self as u8
    }
}

/// Set on the address byte to write a register; clear to read.
pub const WRITE_BIT: u8 = 0x80;

/// Number of addressable registers.
pub const REGISTER_COUNT: u8 = 0x80;
