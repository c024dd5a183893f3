//! The link driver.

use alloc::sync::Arc;
use core::cell::{Cell, RefCell};
use core::num::Wrapping;
use core::sync::atomic::{AtomicBool, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embedded_hal::spi::SpiDevice;
use sx127x::conf::Config;
use sx127x::hal::IrqPin;
use sx127x::op::{HeaderMode, PaOutput};
use sx127x::Sx127x;

use crate::packet::{LoraPacket, WireHeader, HEADER_LEN};

type Error = ();

/// State shared with the radio callbacks.
struct Inbox {
    pending: Mutex<CriticalSectionRawMutex, RefCell<Option<LoraPacket>>>,
    sent: AtomicBool,
}

impl Inbox {
    fn new() -> Self {
        Self {
            pending: Mutex::new(RefCell::new(None)),
            sent: AtomicBool::new(false),
        }
    }

    fn store(&self, packet: LoraPacket) {
        self.pending.lock(|pending| pending.replace(Some(packet)));
    }

    /// Empties the inbox, logging the packet it held if any.
    fn discard(&self) {
        if let Some(lost) = self.take() {
            log::warn!(
                "lora::receive unread packet from {:#04x} seq {} discarded",
                lost.source,
                lost.sequence
            );
        }
    }

    fn take(&self) -> Option<LoraPacket> {
        self.pending.lock(|pending| pending.take())
    }

    fn is_available(&self) -> bool {
        self.pending.lock(|pending| pending.borrow().is_some())
    }
}

/// Addressed packets over an SX127x.
///
/// Owns the driver and registers both its callbacks. Every method takes `&self`
/// so the link can sit in a `static` shared with the DIO0 interrupt handler,
/// which calls [`LoraLink::handle_interrupt`].
pub struct LoraLink<SPI, IRQ> {
    radio: Sx127x<SPI, IRQ>,
    inbox: Arc<Inbox>,
    sequence: Mutex<CriticalSectionRawMutex, Cell<Wrapping<u8>>>,
}

impl<SPI, IRQ, TSPIERR> LoraLink<SPI, IRQ>
where
    TSPIERR: core::fmt::Debug,
    SPI: SpiDevice<Error = TSPIERR>,
    IRQ: IrqPin,
{
    /// Modem settings the link is meant to run with: 915 MHz, 125 kHz, SF9,
    /// coding rate 4/8, 5 dBm on PA_BOOST, CRC on.
    pub fn default_config() -> Config {
        Config::default()
            .set_frequency(915_000_000)
            .set_bandwidth(125_000)
            .set_spreading_factor(9)
            .set_coding_rate(8)
            .set_tx_power(5, PaOutput::PaBoost)
            .set_crc(true)
    }

    /// Initializes `radio`, installs the link's callbacks and starts listening.
    pub fn new(radio: Sx127x<SPI, IRQ>) -> Result<Self, Error> {
        radio.init().map_err(|err| {
            log::warn!("Error initializing radio: {err:?}");
        })?;

        let inbox = Arc::new(Inbox::new());

        let rx_inbox = inbox.clone();
        radio.on_receive(move |radio, payload| {
            // Every reception replaces the inbox, a runt included.
            rx_inbox.discard();
            if payload.len() <= HEADER_LEN {
                log::warn!("lora::receive dropped {} byte runt", payload.len());
                return;
            }
            let quality = radio
                .packet_rssi()
                .and_then(|rssi| radio.packet_snr().map(|snr| (rssi, snr)));
            let (rssi, snr) = match quality {
                Ok(quality) => quality,
                Err(err) => {
                    log::warn!("Error reading packet quality: {err:?}");
                    return;
                }
            };
            if let Some(packet) = LoraPacket::decode(payload, rssi, snr) {
                log::debug!(
                    "lora::receive {:#04x} -> {:#04x} seq {}, {} dBm",
                    packet.source,
                    packet.destination,
                    packet.sequence,
                    packet.rssi
                );
                rx_inbox.store(packet);
            }
        });

        let tx_inbox = inbox.clone();
        radio.on_transmit(move |radio| {
            tx_inbox.sent.store(true, Ordering::Release);
            if let Err(err) = radio.receive(0) {
                log::warn!("Error re-entering receive: {err:?}");
            }
        });

        radio.receive(0).map_err(|err| {
            log::warn!("Error entering receive: {err:?}");
        })?;
        log::trace!("lora::new listening");

        Ok(Self {
            radio,
            inbox,
            sequence: Mutex::new(Cell::new(Wrapping(0))),
        })
    }

    /// Sends `payload` from `source` to `destination`. Returns once the packet is
    /// handed to the modem; poll [`LoraLink::is_packet_sent`] for completion.
    ///
    /// Payloads longer than 251 bytes are cut to fit the FIFO. The header still
    /// declares the original length, truncated to one byte.
    pub fn send_packet(&self, destination: u8, source: u8, payload: &[u8]) -> Result<(), Error> {
        self.inbox.sent.store(false, Ordering::Release);
        let sequence = self.sequence.lock(|sequence| {
            let next = sequence.get() + Wrapping(1);
            sequence.set(next);
            next.0
        });
        let header = WireHeader::new(destination, source, sequence, payload.len()).to_bytes();
        let sent = self
            .radio
            .transmit(&[&header, payload], HeaderMode::Explicit)
            .map_err(|err| {
                log::warn!("Error sending lora packet: {err:?}");
            })?;
        log::trace!("lora::send_packet seq {sequence}, {sent} bytes to {destination:#04x}");
        Ok(())
    }

    /// Whether the last packet sent has left the antenna.
    pub fn is_packet_sent(&self) -> bool {
        self.inbox.sent.load(Ordering::Acquire)
    }

    /// Whether a packet is waiting in the inbox.
    pub fn is_packet_available(&self) -> bool {
        self.inbox.is_available()
    }

    /// Takes the waiting packet, leaving the inbox empty.
    pub fn read_packet(&self) -> Option<LoraPacket> {
        self.inbox.take()
    }

    /// Services DIO0. Call from the pin's interrupt handler.
    pub fn handle_interrupt(&self) {
        self.radio.handle_interrupt();
    }

    /// Retunes the carrier frequency.
    pub fn set_frequency(&self, frequency_hz: u32) -> Result<(), Error> {
        self.radio.set_frequency(frequency_hz).map_err(|err| {
            log::warn!("Error setting frequency: {err:?}");
        })
    }

    /// Puts the radio to sleep. Nothing is received until the next send.
    pub fn sleep(&self) -> Result<(), Error> {
        self.radio.sleep().map_err(|err| {
            log::warn!("Error putting radio to sleep: {err:?}");
        })
    }

    /// The underlying driver.
    pub fn radio(&self) -> &Sx127x<SPI, IRQ> {
        &self.radio
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::BROADCAST;
    use sx127x::mock::{FakeChip, FakeIrq};
    use sx127x::op::{Mode, RadioState};
    use sx127x::reg::Register;

    type Link = LoraLink<FakeChip, FakeIrq>;

    fn link() -> (Link, FakeChip, FakeIrq) {
        let chip = FakeChip::new();
        let irq = FakeIrq::new();
        let radio = Sx127x::new(chip.clone(), irq.clone(), Link::default_config());
        let link = LoraLink::new(radio).unwrap();
        (link, chip, irq)
    }

    fn deliver(link: &Link, chip: &FakeChip, payload: &[u8]) {
        chip.receive_packet(payload);
        link.handle_interrupt();
    }

    #[test]
    fn new_starts_listening_with_link_defaults() {
        let (link, chip, irq) = link();
        assert_eq!(chip.mode(), Some(Mode::RxContinuous));
        assert!(irq.is_armed());
        assert_eq!(link.radio().spreading_factor().value(), 9);
        // 125 kHz, 4/8, explicit header.
        assert_eq!(chip.register(Register::ModemConfig1), 0x78);
        // SF9, CRC on.
        assert_eq!(chip.register(Register::ModemConfig2), 0x94);
        assert_eq!(chip.register(Register::PaConfig), 0x83);
    }

    #[test]
    fn new_fails_on_a_missing_chip() {
        let chip = FakeChip::new();
        chip.set_register(Register::Version, 0x00);
        let radio = Sx127x::new(chip, FakeIrq::new(), Link::default_config());
        assert!(LoraLink::new(radio).is_err());
    }

    #[test]
    fn receives_a_broadcast_hello() {
        let (link, chip, _) = link();
        assert!(!link.is_packet_available());
        deliver(&link, &chip, b"\xFF\x01\x05\x05hello");

        assert!(link.is_packet_available());
        let packet = link.read_packet().unwrap();
        assert_eq!(packet.destination, 0xFF);
        assert_eq!(packet.source, 0x01);
        assert_eq!(packet.sequence, 5);
        assert_eq!(packet.length, 5);
        assert_eq!(packet.text, "hello");
        assert!(!link.is_packet_available());
        assert!(link.read_packet().is_none());
    }

    #[test]
    fn runts_leave_no_packet() {
        let (link, chip, _) = link();
        for runt in [&b""[..], b"\x01", b"\xFF\x01\x05\x00"] {
            deliver(&link, &chip, runt);
            assert!(!link.is_packet_available());
        }
    }

    #[test]
    fn a_runt_discards_an_unread_packet() {
        let (link, chip, _) = link();
        deliver(&link, &chip, b"\x02\x01\x01\x05first");
        assert!(link.is_packet_available());
        deliver(&link, &chip, b"\x02\x01\x02");
        assert!(!link.is_packet_available());
        assert!(link.read_packet().is_none());
    }

    #[test]
    fn a_second_packet_overwrites_an_unread_one() {
        let (link, chip, _) = link();
        deliver(&link, &chip, b"\x02\x01\x01\x05first");
        deliver(&link, &chip, b"\x02\x01\x02\x06second");
        let packet = link.read_packet().unwrap();
        assert_eq!(packet.sequence, 2);
        assert_eq!(packet.text, "second");
        assert!(!link.is_packet_available());
    }

    #[test]
    fn rssi_calibration_depends_on_band() {
        let (link, chip, _) = link();
        chip.set_register(Register::PktRssiValue, 100);
        chip.set_register(Register::PktSnrValue, 20);
        deliver(&link, &chip, b"\x02\x01\x01\x01a");
        let packet = link.read_packet().unwrap();
        assert_eq!(packet.rssi, -57);
        assert_eq!(packet.snr, 5.0);

        link.set_frequency(433_000_000).unwrap();
        deliver(&link, &chip, b"\x02\x01\x01\x01a");
        assert_eq!(link.read_packet().unwrap().rssi, -64);
    }

    #[test]
    fn sent_flag_follows_the_transmit_callback() {
        let (link, chip, irq) = link();
        link.send_packet(BROADCAST, 0x41, b"ping").unwrap();
        assert!(!link.is_packet_sent());
        assert_eq!(chip.transmitted(), [b"\xFF\x41\x01\x04ping".to_vec()]);
        assert!(irq.is_armed());

        chip.complete_transmit();
        link.handle_interrupt();
        assert!(link.is_packet_sent());
        assert_eq!(link.radio().state(), RadioState::Receiving);
        assert_eq!(chip.mode(), Some(Mode::RxContinuous));

        link.send_packet(0x02, 0x41, b"pong").unwrap();
        assert!(!link.is_packet_sent());
    }

    #[test]
    fn sequence_numbers_wrap() {
        let (link, chip, _) = link();
        for _ in 0..257 {
            link.send_packet(0x02, 0x41, b"x").unwrap();
            chip.complete_transmit();
            link.handle_interrupt();
        }
        let sequences: Vec<u8> = chip.transmitted().iter().map(|frame| frame[2]).collect();
        assert_eq!(sequences[0], 1);
        assert_eq!(sequences[254], 255);
        assert_eq!(sequences[255], 0);
        assert_eq!(sequences[256], 1);
    }

    #[test]
    fn oversized_payloads_are_cut_to_the_fifo() {
        let (link, chip, _) = link();
        link.send_packet(0x02, 0x41, &[b'a'; 300]).unwrap();
        let frame = &chip.transmitted()[0];
        assert_eq!(frame.len(), 255);
        assert_eq!(frame[3], 44);
    }

    #[test]
    fn sleep_stops_listening() {
        let (link, chip, _) = link();
        link.sleep().unwrap();
        assert_eq!(chip.mode(), Some(Mode::Sleep));
    }
}
