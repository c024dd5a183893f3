//! The core implementation of the SX127x driver.

mod chip;
pub(crate) mod err;

use alloc::boxed::Box;
use core::cell::RefCell;
use core::mem;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embedded_hal::spi::SpiDevice;

use crate::conf::Config;
use crate::hal::IrqPin;
use crate::op::*;

use self::chip::{Chip, Interrupt};

pub use self::chip::SX127X_VERSION;
pub use self::err::{PinError, RadioError, SpiError};

/// Called from [`Sx127x::handle_interrupt`] with a freshly received payload.
pub type ReceiveHandler<TSPI, TIRQ> = Box<dyn FnMut(&Sx127x<TSPI, TIRQ>, &[u8]) + Send>;

/// Called from [`Sx127x::handle_interrupt`] once a packet has been sent and the FIFO is free.
pub type TransmitHandler<TSPI, TIRQ> = Box<dyn FnMut(&Sx127x<TSPI, TIRQ>) + Send>;

/// A registered callback. `Running` while it is taken out to be invoked outside the lock.
enum Slot<H> {
    Vacant,
    Ready(H),
    Running,
}

impl<H> Slot<H> {
    fn is_registered(&self) -> bool {
        !matches!(self, Slot::Vacant)
    }

    fn take(&mut self) -> Option<H> {
        match mem::replace(self, Slot::Running) {
            Slot::Ready(handler) => Some(handler),
            other => {
                *self = other;
                None
            }
        }
    }

    /// Puts a handler back after it ran, unless it was replaced meanwhile.
    fn restore(&mut self, handler: H) {
        if matches!(self, Slot::Running) {
            *self = Slot::Ready(handler);
        }
    }
}

struct Handlers<TSPI, TIRQ> {
    on_receive: Slot<ReceiveHandler<TSPI, TIRQ>>,
    on_transmit: Slot<TransmitHandler<TSPI, TIRQ>>,
}

/// A wrapper around a Semtech SX127x LoRa modem.
///
/// Every method takes `&self`: register sequences run inside one critical-section
/// mutex shared by foreground calls and [`Sx127x::handle_interrupt`], so the driver
/// can live in a `static` and be reached from an interrupt handler.
pub struct Sx127x<TSPI, TIRQ> {
    chip: Mutex<CriticalSectionRawMutex, RefCell<Chip<TSPI, TIRQ>>>,
    handlers: Mutex<CriticalSectionRawMutex, RefCell<Handlers<TSPI, TIRQ>>>,
    config: Config,
}

impl<TSPI, TIRQ, TSPIERR> Sx127x<TSPI, TIRQ>
where
    TSPIERR: core::fmt::Debug,
    TSPI: SpiDevice<Error = TSPIERR>,
    TIRQ: IrqPin,
{
    /// Creates a new driver. The chip is not touched until [`Sx127x::init`].
    ///
    /// # Arguments
    ///
    /// * `spi` - The SPI device, chip select included.
    /// * `irq` - The input pin wired to DIO0.
    /// * `config` - Modem settings applied by `init`.
    pub fn new(spi: TSPI, irq: TIRQ, config: Config) -> Self {
        Self {
            chip: Mutex::new(RefCell::new(Chip::new(spi, irq))),
            handlers: Mutex::new(RefCell::new(Handlers {
                on_receive: Slot::Vacant,
                on_transmit: Slot::Vacant,
            })),
            config,
        }
    }

    fn with_chip<R>(&self, f: impl FnOnce(&mut Chip<TSPI, TIRQ>) -> R) -> R {
        self.chip.lock(|chip| f(&mut chip.borrow_mut()))
    }

    fn with_handlers<R>(&self, f: impl FnOnce(&mut Handlers<TSPI, TIRQ>) -> R) -> R {
        self.handlers.lock(|handlers| f(&mut handlers.borrow_mut()))
    }

    /// Verifies the chip identity and applies the configuration.
    ///
    /// Leaves the radio in standby.
    ///
    /// # Errors
    /// Returns [`RadioError::InvalidVersion`] if `RegVersion` does not read
    /// [`SX127X_VERSION`], most likely a wiring problem.
    pub fn init(&self) -> Result<(), RadioError<TSPIERR>> {
        self.with_chip(|chip| chip.init(&self.config))
    }

    /// The configuration given at construction and applied by [`Sx127x::init`].
    ///
    /// Setters called afterwards do not update it; read the live values with
    /// [`Sx127x::frequency`], [`Sx127x::bandwidth`] and [`Sx127x::spreading_factor`].
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// What the driver last asked the radio to do.
    pub fn state(&self) -> RadioState {
        self.with_chip(|chip| chip.state())
    }

    /// The carrier frequency last programmed, in Hz.
    pub fn frequency(&self) -> u32 {
        self.with_chip(|chip| chip.frequency_hz())
    }

    /// The bandwidth in effect after snapping.
    pub fn bandwidth(&self) -> Bandwidth {
        self.with_chip(|chip| chip.bandwidth())
    }

    /// The spreading factor in effect after clamping.
    pub fn spreading_factor(&self) -> SpreadingFactor {
        self.with_chip(|chip| chip.spreading_factor())
    }

    /// Registers the callback for received packets, replacing any previous one.
    ///
    /// DIO0 is disarmed until the next [`Sx127x::receive`].
    pub fn on_receive(&self, handler: impl FnMut(&Self, &[u8]) + Send + 'static) {
        self.with_handlers(|handlers| handlers.on_receive = Slot::Ready(Box::new(handler)));
        self.with_chip(|chip| chip.disarm());
    }

    /// Registers the callback for completed transmissions, replacing any previous one.
    pub fn on_transmit(&self, handler: impl FnMut(&Self) + Send + 'static) {
        self.with_handlers(|handlers| handlers.on_transmit = Slot::Ready(Box::new(handler)));
    }

    /// Puts the radio to sleep.
    pub fn sleep(&self) -> Result<(), RadioError<TSPIERR>> {
        self.with_chip(|chip| chip.set_mode(Mode::Sleep))
    }

    /// Puts the radio in standby.
    pub fn standby(&self) -> Result<(), RadioError<TSPIERR>> {
        self.with_chip(|chip| chip.set_mode(Mode::Standby))
    }

    /// Sets the carrier frequency in Hz.
    pub fn set_frequency(&self, frequency_hz: u32) -> Result<(), RadioError<TSPIERR>> {
        self.with_chip(|chip| chip.set_frequency(frequency_hz))
    }

    /// Sets the signal bandwidth, snapped up to the next supported value.
    pub fn set_signal_bandwidth(&self, hz: u32) -> Result<(), RadioError<TSPIERR>> {
        self.with_chip(|chip| chip.set_signal_bandwidth(hz))
    }

    /// Sets the spreading factor, clamped to `6..=12`.
    pub fn set_spreading_factor(&self, sf: u8) -> Result<(), RadioError<TSPIERR>> {
        self.with_chip(|chip| chip.set_spreading_factor(sf))
    }

    /// Sets the coding rate `4/denominator`, denominator clamped to `5..=8`.
    pub fn set_coding_rate(&self, denominator: u8) -> Result<(), RadioError<TSPIERR>> {
        self.with_chip(|chip| chip.set_coding_rate(denominator))
    }

    /// Sets the output power on the given amplifier path.
    pub fn set_tx_power(&self, level: i8, output: PaOutput) -> Result<(), RadioError<TSPIERR>> {
        self.with_chip(|chip| chip.set_tx_power(level, output))
    }

    /// Sets the preamble length in symbols.
    pub fn set_preamble_length(&self, length: u16) -> Result<(), RadioError<TSPIERR>> {
        self.with_chip(|chip| chip.set_preamble_length(length))
    }

    /// Sets the sync word.
    pub fn set_sync_word(&self, sync_word: u8) -> Result<(), RadioError<TSPIERR>> {
        self.with_chip(|chip| chip.set_sync_word(sync_word))
    }

    /// Enables or disables the payload CRC.
    pub fn enable_crc(&self, enable: bool) -> Result<(), RadioError<TSPIERR>> {
        self.with_chip(|chip| chip.enable_crc(enable))
    }

    /// Switches between explicit and implicit header mode.
    pub fn set_header_mode(&self, mode: HeaderMode) -> Result<(), RadioError<TSPIERR>> {
        self.with_chip(|chip| chip.set_header_mode(mode))
    }

    /// Starts a packet: standby, header mode, FIFO pointer and payload length reset.
    pub fn begin_packet(&self, header: HeaderMode) -> Result<(), RadioError<TSPIERR>> {
        self.with_chip(|chip| chip.begin_packet(header))
    }

    /// Appends `data` to the packet being built.
    ///
    /// Returns how many bytes were accepted; fewer than `data.len()` once the
    /// packet reaches 255 bytes.
    pub fn write(&self, data: &[u8]) -> Result<usize, RadioError<TSPIERR>> {
        self.with_chip(|chip| chip.write(data))
    }

    /// Sends the packet built since [`Sx127x::begin_packet`].
    ///
    /// With a transmit callback registered DIO0 is armed for `TxDone` and the
    /// callback reports completion. Without one, poll [`Sx127x::is_tx_done`].
    pub fn end_packet(&self) -> Result<(), RadioError<TSPIERR>> {
        let arm = self.with_handlers(|handlers| handlers.on_transmit.is_registered());
        self.with_chip(|chip| chip.end_packet(arm))
    }

    /// Builds and sends a packet from `chunks` without letting an interrupt in
    /// between the FIFO writes.
    ///
    /// Returns the number of bytes accepted into the FIFO.
    pub fn transmit(
        &self,
        chunks: &[&[u8]],
        header: HeaderMode,
    ) -> Result<usize, RadioError<TSPIERR>> {
        let arm = self.with_handlers(|handlers| handlers.on_transmit.is_registered());
        self.with_chip(|chip| {
            chip.begin_packet(header)?;
            let mut accepted = 0;
            for chunk in chunks {
                accepted += chip.write(chunk)?;
            }
            chip.end_packet(arm)?;
            Ok(accepted)
        })
    }

    /// Enters continuous receive.
    ///
    /// `size > 0` selects implicit header mode with that fixed payload length;
    /// `0` selects explicit header mode. DIO0 is armed for `RxDone` if a receive
    /// callback is registered, otherwise poll [`Sx127x::received_packet`].
    pub fn receive(&self, size: u8) -> Result<(), RadioError<TSPIERR>> {
        let arm = self.with_handlers(|handlers| handlers.on_receive.is_registered());
        self.with_chip(|chip| chip.receive(size, arm))
    }

    /// Reads and acknowledges the interrupt flags.
    pub fn irq_flags(&self) -> Result<IrqFlags, RadioError<TSPIERR>> {
        self.with_chip(|chip| chip.irq_flags())
    }

    /// Polling mode: `true` once, when the transmission has finished.
    ///
    /// Always `false` while a transmit callback is registered.
    pub fn is_tx_done(&self) -> Result<bool, RadioError<TSPIERR>> {
        if self.with_handlers(|handlers| handlers.on_transmit.is_registered()) {
            log::warn!("sx127x::is_tx_done called with a transmit callback registered");
            return Ok(false);
        }
        self.with_chip(|chip| {
            let flags = chip.irq_flags()?;
            if flags.tx_done() {
                chip.set_mode(Mode::Standby)?;
            }
            Ok(flags.tx_done())
        })
    }

    /// Polling mode: `true` when a clean packet is waiting for [`Sx127x::read_payload`].
    /// Otherwise keeps the radio in continuous receive.
    ///
    /// Always `false` while a receive callback is registered.
    pub fn received_packet(&self, size: u8) -> Result<bool, RadioError<TSPIERR>> {
        if self.with_handlers(|handlers| handlers.on_receive.is_registered()) {
            log::warn!("sx127x::received_packet called with a receive callback registered");
            return Ok(false);
        }
        self.with_chip(|chip| chip.poll_received(size))
    }

    /// Drains the last received packet from the FIFO.
    pub fn read_payload(&self) -> Result<Payload, RadioError<TSPIERR>> {
        self.with_chip(|chip| chip.read_payload())
    }

    /// RSSI of the last packet in dBm, calibrated for the configured band.
    pub fn packet_rssi(&self) -> Result<i16, RadioError<TSPIERR>> {
        self.with_chip(|chip| chip.packet_rssi())
    }

    /// SNR of the last packet in dB.
    pub fn packet_snr(&self) -> Result<f32, RadioError<TSPIERR>> {
        self.with_chip(|chip| chip.packet_snr())
    }

    /// Logs every register at trace level.
    pub fn dump_registers(&self) -> Result<(), RadioError<TSPIERR>> {
        self.with_chip(|chip| chip.dump_registers())
    }

    /// Services DIO0. Call this from the interrupt handler of the DIO0 pin.
    ///
    /// Flags are read and cleared, a received payload drained, all under the lock;
    /// the matching callback then runs after the lock is released. Failures are
    /// logged and never propagated.
    pub fn handle_interrupt(&self) {
        match self.with_chip(|chip| chip.service_interrupt()) {
            Ok(Interrupt::TxDone) => self.dispatch_transmit(),
            Ok(Interrupt::Received(payload)) => self.dispatch_receive(&payload),
            Ok(Interrupt::Dropped(flags)) => {
                if flags.is_empty() {
                    log::warn!("sx127x::handle_interrupt spurious, no flags set");
                } else if !flags.rx_done() {
                    log::warn!("sx127x::handle_interrupt no rx done: {flags:?}");
                } else if flags.crc_error() {
                    log::warn!("sx127x::handle_interrupt crc error");
                } else {
                    log::warn!("sx127x::handle_interrupt receive timeout");
                }
            }
            Err(err) => log::warn!("sx127x::handle_interrupt register access failed: {err:?}"),
        }
    }

    fn dispatch_transmit(&self) {
        let Some(mut handler) = self.with_handlers(|handlers| handlers.on_transmit.take()) else {
            log::warn!("sx127x::handle_interrupt tx done but no transmit callback");
            return;
        };
        handler(self);
        self.with_handlers(|handlers| handlers.on_transmit.restore(handler));
    }

    fn dispatch_receive(&self, payload: &[u8]) {
        let Some(mut handler) = self.with_handlers(|handlers| handlers.on_receive.take()) else {
            log::warn!("sx127x::handle_interrupt dropped {} bytes, no receive callback", payload.len());
            return;
        };
        handler(self, payload);
        self.with_handlers(|handlers| handlers.on_receive.restore(handler));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{FakeChip, FakeIrq};
    use crate::reg::Register;
    use std::sync::{Arc, Mutex as StdMutex};

    type Radio = Sx127x<FakeChip, FakeIrq>;

    fn radio_with(config: Config) -> (Radio, FakeChip, FakeIrq) {
        let chip = FakeChip::new();
        let irq = FakeIrq::new();
        let radio = Sx127x::new(chip.clone(), irq.clone(), config);
        radio.init().unwrap();
        (radio, chip, irq)
    }

    fn radio() -> (Radio, FakeChip, FakeIrq) {
        radio_with(Config::default())
    }

    #[test]
    fn init_rejects_unknown_version() {
        let chip = FakeChip::new();
        chip.set_register(Register::Version, 0x22);
        let radio = Sx127x::new(chip.clone(), FakeIrq::new(), Config::default());
        assert!(matches!(radio.init(), Err(RadioError::InvalidVersion(0x22))));
        assert_eq!(chip.register(Register::FrfMsb), 0);
    }

    #[test]
    fn init_applies_the_configuration() {
        let (radio, chip, _) = radio();
        assert_eq!(chip.mode(), Some(Mode::Standby));
        assert_eq!(radio.state(), RadioState::Standby);
        assert_eq!(
            [
                chip.register(Register::FrfMsb),
                chip.register(Register::FrfMid),
                chip.register(Register::FrfLsb)
            ],
            [0xE4, 0xC0, 0x00]
        );
        // 125 kHz, 4/5, explicit header.
        assert_eq!(chip.register(Register::ModemConfig1), 0x72);
        // SF7, CRC off.
        assert_eq!(chip.register(Register::ModemConfig2), 0x70);
        // AGC on, no low data rate optimization.
        assert_eq!(chip.register(Register::ModemConfig3), 0x04);
        assert_eq!(chip.register(Register::PaConfig), 0x80);
        assert_eq!(chip.register(Register::Ocp), 0x2B);
        assert_eq!(chip.register(Register::PaDac), 0x04);
        assert_eq!(chip.register(Register::Lna) & 0x03, 0x03);
        assert_eq!(chip.register(Register::PreambleLsb), 8);
        assert_eq!(chip.register(Register::SyncWord), 0x12);
        assert_eq!(chip.register(Register::DetectionOptimize), 0xC3);
    }

    #[test]
    fn low_data_rate_optimization_follows_symbol_time() {
        let (radio, chip, _) = radio();
        radio.set_spreading_factor(12).unwrap();
        assert_eq!(chip.register(Register::ModemConfig3), 0x0C);
        radio.set_signal_bandwidth(500_000).unwrap();
        assert_eq!(chip.register(Register::ModemConfig3), 0x04);
        assert_eq!(chip.register(Register::ModemConfig1) >> 4, 9);
        radio.set_spreading_factor(3).unwrap();
        assert_eq!(radio.spreading_factor().value(), 6);
        assert_eq!(chip.register(Register::DetectionOptimize), 0xC5);
        assert_eq!(chip.register(Register::DetectionThreshold), 0x0C);
    }

    #[test]
    fn settings_are_clamped_or_snapped() {
        let (radio, chip, _) = radio();
        radio.set_signal_bandwidth(100_000).unwrap();
        assert_eq!(radio.bandwidth().hz(), 125_000);
        radio.set_coding_rate(12).unwrap();
        assert_eq!(chip.register(Register::ModemConfig1) & 0x0E, 4 << 1);
        radio.enable_crc(true).unwrap();
        assert_eq!(chip.register(Register::ModemConfig2) & 0x04, 0x04);
        radio.set_tx_power(20, PaOutput::PaBoost).unwrap();
        assert_eq!(chip.register(Register::PaConfig), 0x8F);
        assert_eq!(chip.register(Register::PaDac), 0x07);
        assert_eq!(chip.register(Register::Ocp), 0x32);
        radio.set_preamble_length(0x0120).unwrap();
        assert_eq!(chip.register(Register::PreambleMsb), 0x01);
        assert_eq!(chip.register(Register::PreambleLsb), 0x20);
        radio.set_frequency(433_000_000).unwrap();
        assert_eq!(radio.frequency(), 433_000_000);
        assert!(chip.frequency_hz().abs_diff(433_000_000) < 62);
    }

    #[test]
    fn polled_transmit() {
        let (radio, chip, irq) = radio();
        let sent = radio.transmit(&[b"ab", b"cde"], HeaderMode::Explicit).unwrap();
        assert_eq!(sent, 5);
        assert_eq!(chip.transmitted(), [b"abcde".to_vec()]);
        assert_eq!(radio.state(), RadioState::Transmitting);
        assert!(!irq.is_armed());

        assert!(!radio.is_tx_done().unwrap());
        chip.complete_transmit();
        assert!(radio.is_tx_done().unwrap());
        assert_eq!(radio.state(), RadioState::Standby);
        assert!(!radio.is_tx_done().unwrap());
    }

    #[test]
    fn write_stops_at_a_full_fifo() {
        let (radio, chip, _) = radio();
        radio.begin_packet(HeaderMode::Explicit).unwrap();
        assert_eq!(radio.write(&[1; 200]).unwrap(), 200);
        assert_eq!(radio.write(&[2; 100]).unwrap(), 55);
        assert_eq!(radio.write(&[3]).unwrap(), 0);
        assert_eq!(chip.register(Register::PayloadLength), 255);
        radio.end_packet().unwrap();
        assert_eq!(chip.transmitted()[0].len(), 255);
    }

    #[test]
    fn interrupt_driven_receive() {
        let (radio, chip, irq) = radio();
        let received = Arc::new(StdMutex::new(Vec::new()));
        let sink = received.clone();
        radio.on_receive(move |_, payload| sink.lock().unwrap().push(payload.to_vec()));
        radio.receive(0).unwrap();
        assert!(irq.is_armed());
        assert_eq!(chip.register(Register::DioMapping1), 0x00);
        assert_eq!(chip.mode(), Some(Mode::RxContinuous));

        chip.receive_packet(b"hello");
        radio.handle_interrupt();

        assert_eq!(*received.lock().unwrap(), [b"hello".to_vec()]);
        assert_eq!(chip.register(Register::IrqFlags), 0);
        assert_eq!(irq.acknowledged(), 1);
    }

    #[test]
    fn crc_errors_are_dropped_and_receive_resumes() {
        let (radio, chip, _) = radio();
        let calls = Arc::new(StdMutex::new(0));
        let counter = calls.clone();
        radio.on_receive(move |_, _| *counter.lock().unwrap() += 1);
        radio.receive(0).unwrap();

        chip.set_register(Register::OpMode, Mode::Standby.op_mode());
        chip.raise_irq(
            IrqFlags::empty()
                .combine(IrqFlagBit::RxDone)
                .combine(IrqFlagBit::PayloadCrcError),
        );
        radio.handle_interrupt();

        assert_eq!(*calls.lock().unwrap(), 0);
        assert_eq!(chip.register(Register::IrqFlags), 0);
        assert_eq!(chip.mode(), Some(Mode::RxContinuous));
    }

    #[test]
    fn receive_timeouts_are_dropped_and_receive_resumes() {
        let (radio, chip, _) = radio();
        let calls = Arc::new(StdMutex::new(0));
        let counter = calls.clone();
        radio.on_receive(move |_, _| *counter.lock().unwrap() += 1);
        radio.receive(0).unwrap();

        chip.set_register(Register::OpMode, Mode::Standby.op_mode());
        chip.raise_irq(
            IrqFlags::empty()
                .combine(IrqFlagBit::RxDone)
                .combine(IrqFlagBit::RxTimeout),
        );
        radio.handle_interrupt();

        assert_eq!(*calls.lock().unwrap(), 0);
        assert_eq!(chip.register(Register::IrqFlags), 0);
        assert_eq!(chip.mode(), Some(Mode::RxContinuous));
        assert_eq!(radio.state(), RadioState::Receiving);
    }

    #[test]
    fn stray_interrupts_keep_the_receiver_listening() {
        let (radio, chip, _) = radio();
        let calls = Arc::new(StdMutex::new(0));
        let counter = calls.clone();
        radio.on_receive(move |_, _| *counter.lock().unwrap() += 1);
        radio.receive(0).unwrap();

        // A header without RxDone.
        chip.set_register(Register::OpMode, Mode::Sleep.op_mode());
        chip.raise_irq(IrqFlags::empty().combine(IrqFlagBit::ValidHeader));
        radio.handle_interrupt();
        assert_eq!(chip.register(Register::IrqFlags), 0);
        assert_eq!(chip.mode(), Some(Mode::RxContinuous));

        // An edge with nothing latched.
        chip.set_register(Register::OpMode, Mode::Standby.op_mode());
        radio.handle_interrupt();
        assert_eq!(chip.mode(), Some(Mode::RxContinuous));

        assert_eq!(*calls.lock().unwrap(), 0);
    }

    #[test]
    fn dropped_events_leave_an_idle_radio_alone() {
        let (radio, chip, _) = radio();
        chip.raise_irq(IrqFlags::empty().combine(IrqFlagBit::PayloadCrcError));
        radio.handle_interrupt();
        assert_eq!(chip.mode(), Some(Mode::Standby));
        assert_eq!(radio.state(), RadioState::Standby);
    }

    #[test]
    fn init_unmasks_all_interrupts() {
        let chip = FakeChip::new();
        chip.set_register(Register::IrqFlagsMask, 0xFF);
        let radio = Sx127x::new(chip.clone(), FakeIrq::new(), Config::default());
        radio.init().unwrap();
        assert_eq!(chip.register(Register::IrqFlagsMask), 0x00);
    }

    #[test]
    fn config_keeps_the_initial_settings() {
        let (radio, _, _) = radio();
        radio.set_frequency(433_000_000).unwrap();
        assert_eq!(radio.config().frequency_hz, 915_000_000);
        assert_eq!(radio.frequency(), 433_000_000);
    }

    #[test]
    fn transmit_callback_can_restart_receive() {
        let (radio, chip, irq) = radio();
        radio.on_receive(|_, _| {});
        radio.on_transmit(|radio| radio.receive(0).unwrap());
        radio.transmit(&[b"ping"], HeaderMode::Explicit).unwrap();
        assert!(irq.is_armed());
        assert_eq!(chip.register(Register::DioMapping1), 0x40);

        chip.complete_transmit();
        radio.handle_interrupt();

        assert_eq!(radio.state(), RadioState::Receiving);
        assert_eq!(chip.mode(), Some(Mode::RxContinuous));
        assert_eq!(chip.register(Register::DioMapping1), 0x00);
        assert!(irq.is_armed());
    }

    #[test]
    fn transmit_from_the_transmit_callback_stays_interrupt_driven() {
        let (radio, chip, irq) = radio();
        let remaining = Arc::new(StdMutex::new(1));
        let counter = remaining.clone();
        radio.on_transmit(move |radio| {
            let mut remaining = counter.lock().unwrap();
            if *remaining > 0 {
                *remaining -= 1;
                radio.transmit(&[b"second"], HeaderMode::Explicit).unwrap();
            }
        });
        radio.transmit(&[b"first"], HeaderMode::Explicit).unwrap();
        chip.complete_transmit();
        radio.handle_interrupt();

        assert!(irq.is_armed());
        assert_eq!(chip.transmitted(), [b"first".to_vec(), b"second".to_vec()]);
        chip.complete_transmit();
        radio.handle_interrupt();
        assert_eq!(*remaining.lock().unwrap(), 0);
    }

    #[test]
    fn callback_replaced_from_inside_a_callback_wins() {
        let (radio, chip, _) = radio();
        let log = Arc::new(StdMutex::new(Vec::new()));
        let first = log.clone();
        radio.on_receive(move |radio, _| {
            first.lock().unwrap().push("first");
            let second = first.clone();
            radio.on_receive(move |_, _| second.lock().unwrap().push("second"));
            radio.receive(0).unwrap();
        });
        radio.receive(0).unwrap();

        chip.receive_packet(b"1");
        radio.handle_interrupt();
        chip.receive_packet(b"2");
        radio.handle_interrupt();

        assert_eq!(*log.lock().unwrap(), ["first", "second"]);
    }

    #[test]
    fn polled_receive() {
        let (radio, chip, irq) = radio();
        radio.receive(0).unwrap();
        assert!(!irq.is_armed());
        assert!(!radio.received_packet(0).unwrap());

        chip.receive_packet(b"polled");
        chip.set_register(Register::PktRssiValue, 100);
        chip.set_register(Register::PktSnrValue, 0xF8);
        assert!(radio.received_packet(0).unwrap());
        assert_eq!(radio.read_payload().unwrap(), b"polled".as_slice());
        assert_eq!(radio.packet_rssi().unwrap(), -57);
        assert_eq!(radio.packet_snr().unwrap(), -2.0);
    }

    #[test]
    fn polling_is_refused_while_a_callback_is_registered() {
        let (radio, chip, _) = radio();
        radio.on_receive(|_, _| {});
        radio.on_transmit(|_| {});
        chip.receive_packet(b"x");
        assert!(!radio.received_packet(0).unwrap());
        chip.complete_transmit();
        assert!(!radio.is_tx_done().unwrap());
    }

    #[test]
    fn fixed_size_receive_uses_implicit_header() {
        let (radio, chip, _) = radio();
        radio.receive(8).unwrap();
        assert_eq!(chip.register(Register::ModemConfig1) & HeaderMode::BIT, HeaderMode::BIT);
        assert_eq!(chip.register(Register::PayloadLength), 8);
        radio.receive(0).unwrap();
        assert_eq!(chip.register(Register::ModemConfig1) & HeaderMode::BIT, 0);
    }

    #[test]
    fn registering_a_receive_callback_disarms_dio0() {
        let (radio, _, irq) = radio();
        radio.on_receive(|_, _| {});
        radio.receive(0).unwrap();
        assert!(irq.is_armed());
        radio.on_receive(|_, _| {});
        assert!(!irq.is_armed());
    }

    #[test]
    fn spi_failures_surface_as_errors_and_never_panic_the_isr() {
        let (radio, chip, _) = radio();
        chip.set_failing(true);
        assert!(matches!(
            radio.set_sync_word(0x34),
            Err(RadioError::Spi(SpiError::Write(_)))
        ));
        assert!(matches!(radio.irq_flags(), Err(RadioError::Spi(SpiError::Read(_)))));
        radio.handle_interrupt();
    }

    #[test]
    fn sleep_and_standby() {
        let (radio, chip, _) = radio();
        radio.sleep().unwrap();
        assert_eq!(chip.mode(), Some(Mode::Sleep));
        assert_eq!(radio.state(), RadioState::Sleep);
        radio.standby().unwrap();
        assert_eq!(chip.register(Register::OpMode), 0x81);
        radio.dump_registers().unwrap();
    }
}
