//! Error types for the SX127x driver.

use core::fmt::{self, Debug};

/// An error related to SPI communication.
pub enum SpiError<TSPIERR> {
    /// An error occurred while reading a register.
    Read(TSPIERR),
    /// An error occurred while writing a register.
    Write(TSPIERR),
}

impl<TSPIERR: Debug> Debug for SpiError<TSPIERR> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read(err) => write!(f, "Read({err:?})"),
            Self::Write(err) => write!(f, "Write({err:?})"),
        }
    }
}

/// An error related to GPIO pin operations.
pub enum PinError<TPINERR> {
    /// An error occurred on an output pin.
    Output(TPINERR),
}

impl<TPINERR: Debug> Debug for PinError<TPINERR> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Output(err) => write!(f, "Output({err:?})"),
        }
    }
}

/// The main error type for the SX127x driver.
pub enum RadioError<TSPIERR> {
    /// A register exchange failed.
    Spi(SpiError<TSPIERR>),
    /// `RegVersion` did not read as an SX127x. Check the wiring.
    InvalidVersion(u8),
}

impl<TSPIERR: Debug> Debug for RadioError<TSPIERR> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Spi(err) => write!(f, "Spi({err:?})"),
            Self::InvalidVersion(version) => write!(f, "InvalidVersion({version:#04x})"),
        }
    }
}

impl<TSPIERR> From<SpiError<TSPIERR>> for RadioError<TSPIERR> {
    fn from(spi_err: SpiError<TSPIERR>) -> Self {
        RadioError::Spi(spi_err)
    }
}
