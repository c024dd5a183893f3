//! Interrupt flags and DIO0 routing.

/// Individual bits of `RegIrqFlags`.
#[repr(u8)]
#[derive(Copy, Clone)]
pub enum IrqFlagBit {
    /// Receive timeout (single receive mode only).
    RxTimeout = 1 << 7,
    /// Packet reception complete.
    RxDone = 1 << 6,
    /// Payload CRC error.
    PayloadCrcError = 1 << 5,
    /// Valid header received in explicit header mode.
    ValidHeader = 1 << 4,
    /// Packet transmission complete.
    TxDone = 1 << 3,
}

/// The interrupt flags read from the device.
#[derive(Copy, Clone, Default, PartialEq, Eq)]
pub struct IrqFlags {
    inner: u8,
}

impl From<u8> for IrqFlags {
    fn from(flags: u8) -> Self {
        Self { inner: flags }
    }
}

impl From<IrqFlags> for u8 {
    fn from(val: IrqFlags) -> Self {
        val.inner
    }
}

impl core::fmt::Debug for IrqFlags {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("IrqFlags")
            .field("rx_timeout", &self.rx_timeout())
            .field("rx_done", &self.rx_done())
            .field("crc_error", &self.crc_error())
            .field("valid_header", &self.valid_header())
            .field("tx_done", &self.tx_done())
            .finish()
    }
}

impl IrqFlags {
    /// No flag set.
    pub const fn empty() -> Self {
        Self { inner: 0 }
    }

    /// Adds a flag.
    pub const fn combine(self, bit: IrqFlagBit) -> Self {
        Self {
            inner: self.inner | bit as u8,
        }
    }

    /// The raw register value.
    pub fn bits(self) -> u8 {
        self.inner
    }

    /// Returns `true` if nothing is pending.
    pub fn is_empty(self) -> bool {
        self.inner == 0
    }

    /// Returns `true` if `RxTimeout` is set.
    pub fn rx_timeout(self) -> bool {
        (self.inner & IrqFlagBit::RxTimeout as u8) > 0
    }

    /// Returns `true` if `RxDone` is set.
    pub fn rx_done(self) -> bool {
        (self.inner & IrqFlagBit::RxDone as u8) > 0
    }

    /// Returns `true` if `PayloadCrcError` is set.
    pub fn crc_error(self) -> bool {
        (self.inner & IrqFlagBit::PayloadCrcError as u8) > 0
    }

    /// Returns `true` if `ValidHeader` is set.
    pub fn valid_header(self) -> bool {
        (self.inner & IrqFlagBit::ValidHeader as u8) > 0
    }

    /// Returns `true` if `TxDone` is set.
    pub fn tx_done(self) -> bool {
        (self.inner & IrqFlagBit::TxDone as u8) > 0
    }

    /// A packet arrived and neither a CRC error nor a timeout came with it.
    pub fn is_clean_rx(self) -> bool {
        self.rx_done() && !self.crc_error() && !self.rx_timeout()
    }
}

/// What DIO0 signals, bits 7..6 of `RegDioMapping1`.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Dio0Mapping {
    /// DIO0 rises on `RxDone`.
    RxDone = 0x00,
    /// DIO0 rises on `TxDone`.
    TxDone = 0x40,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_rx_requires_rx_done_without_errors() {
        let rx = IrqFlags::empty()
            .combine(IrqFlagBit::RxDone)
            .combine(IrqFlagBit::ValidHeader);
        assert!(rx.is_clean_rx());
        assert!(!rx.combine(IrqFlagBit::PayloadCrcError).is_clean_rx());
        assert!(!rx.combine(IrqFlagBit::RxTimeout).is_clean_rx());
        assert!(!IrqFlags::from(0x08).is_clean_rx());
    }

    #[test]
    fn decodes_register_bits() {
        let flags = IrqFlags::from(0x48);
        assert!(flags.tx_done());
        assert!(flags.rx_done());
        assert!(!flags.crc_error());
        assert_eq!(flags.bits(), 0x48);
    }
}
