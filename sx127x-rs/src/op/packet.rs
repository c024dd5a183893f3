//! Packet framing on the chip: header mode and FIFO layout.

/// Largest payload the FIFO can hold.
pub const MAX_PKT_LENGTH: usize = 255;

/// FIFO offset where transmitted payloads start.
pub const FIFO_TX_BASE_ADDR: u8 = 0x00;

/// FIFO offset where received payloads start.
pub const FIFO_RX_BASE_ADDR: u8 = 0x00;

/// A payload drained from the FIFO.
pub type Payload = heapless::Vec<u8, MAX_PKT_LENGTH>;

/// LoRa header mode.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum HeaderMode {
    /// Length, coding rate and CRC presence travel in a header on air.
    #[default]
    Explicit,
    /// Fixed length set in `RegPayloadLength`; no header on air.
    Implicit,
}

impl HeaderMode {
    /// `ImplicitHeaderModeOn` bit of `RegModemConfig1`.
    pub const BIT: u8 = 0x01;

    /// Header mode used by `receive(size)`: implicit for a fixed size, explicit for 0.
    pub fn for_rx_size(size: u8) -> Self {
        if size > 0 {
            Self::Implicit
        } else {
            Self::Explicit
        }
    }
}
