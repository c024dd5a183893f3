//! The hardware the driver needs beyond the SPI device: the DIO0 interrupt line
//! and the reset line.

use embedded_hal::digital::OutputPin;
use embedded_hal_async::delay::DelayNs;

use crate::sx::err::PinError;

/// An input pin wired to DIO0 whose rising-edge interrupt the driver switches on and off.
///
/// The application owns the interrupt vector and calls
/// [`crate::Sx127x::handle_interrupt`] from it.
pub trait IrqPin {
    /// Enables the rising-edge interrupt.
    fn arm(&mut self);

    /// Disables the interrupt.
    fn disarm(&mut self);

    /// Clears a latched interrupt. Called at the start of every dispatch.
    fn acknowledge(&mut self) {}
}

/// For boards without DIO0 wired: the driver is then used in polling mode only.
pub struct NoIrq;

impl IrqPin for NoIrq {
    fn arm(&mut self) {
        log::warn!("sx127x: DIO0 interrupt requested but no IRQ pin is wired");
    }

    fn disarm(&mut self) {}
}

#[cfg(feature = "esp32s3")]
impl IrqPin for esp_hal::gpio::Input<'_> {
    fn arm(&mut self) {
        self.listen(esp_hal::gpio::Event::RisingEdge);
    }

    fn disarm(&mut self) {
        self.unlisten();
    }

    fn acknowledge(&mut self) {
        self.clear_interrupt();
    }
}

/// Reset pulse width and boot time.
const RESET_MS: u32 = 10;

/// The chip's active-low reset line.
pub struct ResetLine<RST> {
    pin: RST,
}

impl<RST, TPINERR> ResetLine<RST>
where
    RST: OutputPin<Error = TPINERR>,
{
    /// Wraps the reset output pin.
    pub fn new(pin: RST) -> Self {
        Self { pin }
    }

    /// Releases the pin.
    pub fn release(self) -> RST {
        self.pin
    }

    /// Resets the chip: line high, low for 10 ms, high again, then 10 ms for the chip to boot.
    pub async fn pulse<D: DelayNs>(&mut self, delay: &mut D) -> Result<(), PinError<TPINERR>> {
        log::trace!("sx127x::reset start");
        self.pin.set_high().map_err(PinError::Output)?;
        delay.delay_ms(RESET_MS).await;
        self.pin.set_low().map_err(PinError::Output)?;
        delay.delay_ms(RESET_MS).await;
        self.pin.set_high().map_err(PinError::Output)?;
        delay.delay_ms(RESET_MS).await;
        log::trace!("sx127x::reset done");
        Ok(())
    }
}
