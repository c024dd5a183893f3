//! Register-level sequencing. Everything here runs with the driver lock held.

use embedded_hal::spi::SpiDevice;

use crate::conf::Config;
use crate::hal::IrqPin;
use crate::op::*;
use crate::reg::*;

use super::err::{RadioError, SpiError};

/// `RegVersion` of every SX1276/77/78/79 and RFM95/96/97/98.
pub const SX127X_VERSION: u8 = 0x12;

const AGC_AUTO_ON: u8 = 0x04;
const LOW_DATA_RATE_OPTIMIZE: u8 = 0x08;
const RX_PAYLOAD_CRC_ON: u8 = 0x04;
const LNA_BOOST_HF: u8 = 0x03;

/// Outcome of servicing a DIO0 interrupt.
pub(crate) enum Interrupt {
    TxDone,
    Received(Payload),
    Dropped(IrqFlags),
}

pub(crate) struct Chip<SPI, IRQ> {
    spi: SPI,
    irq: IRQ,
    frequency_hz: u32,
    bandwidth: Bandwidth,
    spreading_factor: SpreadingFactor,
    /// Last header mode written to `RegModemConfig1`, `None` until the first write.
    header_mode: Option<HeaderMode>,
    state: RadioState,
}

impl<SPI, IRQ, TSPIERR> Chip<SPI, IRQ>
where
    SPI: SpiDevice<Error = TSPIERR>,
    IRQ: IrqPin,
{
    pub(crate) fn new(spi: SPI, irq: IRQ) -> Self {
        Self {
            spi,
            irq,
            frequency_hz: 0,
            bandwidth: Bandwidth::BW125,
            spreading_factor: SpreadingFactor::clamp(SpreadingFactor::MIN),
            header_mode: None,
            state: RadioState::Sleep,
        }
    }

    pub(crate) fn init(&mut self, config: &Config) -> Result<(), RadioError<TSPIERR>> {
        log::trace!("sx127x::init start");
        let version = self.read_register(Register::Version)?;
        if version != SX127X_VERSION {
            log::warn!("sx127x::init unexpected version {version:#04x}");
            return Err(RadioError::InvalidVersion(version));
        }

        self.set_mode(Mode::Sleep)?;

        // AGC goes in first: bandwidth and spreading factor rewrite RegModemConfig3
        // for the low data rate bit and must find AGC already set.
        self.write_register(Register::ModemConfig3, AGC_AUTO_ON)?;

        self.set_frequency(config.frequency_hz)?;
        self.set_signal_bandwidth(config.bandwidth_hz)?;
        self.modify_register(Register::Lna, |lna| lna | LNA_BOOST_HF)?;
        self.set_tx_power(config.tx_power, config.pa_output)?;
        self.header_mode = None;
        self.set_header_mode(config.header_mode)?;
        self.set_spreading_factor(config.spreading_factor)?;
        self.set_coding_rate(config.coding_rate)?;
        self.set_preamble_length(config.preamble_length)?;
        self.set_sync_word(config.sync_word)?;
        self.enable_crc(config.crc)?;

        self.write_register(Register::FifoTxBaseAddr, FIFO_TX_BASE_ADDR)?;
        self.write_register(Register::FifoRxBaseAddr, FIFO_RX_BASE_ADDR)?;
        self.write_register(Register::IrqFlagsMask, 0x00)?;

        self.set_mode(Mode::Standby)?;
        log::trace!("sx127x::init done");
        Ok(())
    }

    pub(crate) fn state(&self) -> RadioState {
        self.state
    }

    pub(crate) fn frequency_hz(&self) -> u32 {
        self.frequency_hz
    }

    pub(crate) fn bandwidth(&self) -> Bandwidth {
        self.bandwidth
    }

    pub(crate) fn spreading_factor(&self) -> SpreadingFactor {
        self.spreading_factor
    }

    pub(crate) fn set_mode(&mut self, mode: Mode) -> Result<(), RadioError<TSPIERR>> {
        self.write_register(Register::OpMode, mode.op_mode())?;
        self.state = mode.into();
        Ok(())
    }

    pub(crate) fn set_frequency(&mut self, frequency_hz: u32) -> Result<(), RadioError<TSPIERR>> {
        let frf = frf_from_hz(frequency_hz);
        self.write_register(Register::FrfMsb, (frf >> 16) as u8)?;
        self.write_register(Register::FrfMid, (frf >> 8) as u8)?;
        self.write_register(Register::FrfLsb, frf as u8)?;
        self.frequency_hz = frequency_hz;
        log::trace!("sx127x::set_frequency {frequency_hz} Hz, frf {frf:#08x}");
        Ok(())
    }

    pub(crate) fn set_signal_bandwidth(&mut self, hz: u32) -> Result<(), RadioError<TSPIERR>> {
        let bandwidth = Bandwidth::snap(hz);
        if bandwidth.hz() != hz {
            log::trace!("sx127x::set_signal_bandwidth {hz} Hz snapped to {}", bandwidth.hz());
        }
        self.modify_register(Register::ModemConfig1, |cfg| {
            (cfg & 0x0F) | (bandwidth.bits() << 4)
        })?;
        self.bandwidth = bandwidth;
        self.update_low_data_rate_optimize()
    }

    pub(crate) fn set_spreading_factor(&mut self, sf: u8) -> Result<(), RadioError<TSPIERR>> {
        let spreading_factor = SpreadingFactor::clamp(sf);
        if spreading_factor.value() != sf {
            log::trace!(
                "sx127x::set_spreading_factor {sf} clamped to {}",
                spreading_factor.value()
            );
        }
        let (optimize, threshold) = spreading_factor.detection();
        self.write_register(Register::DetectionOptimize, optimize)?;
        self.write_register(Register::DetectionThreshold, threshold)?;
        self.modify_register(Register::ModemConfig2, |cfg| {
            (cfg & 0x0F) | ((spreading_factor.value() << 4) & 0xF0)
        })?;
        self.spreading_factor = spreading_factor;
        self.update_low_data_rate_optimize()
    }

    fn update_low_data_rate_optimize(&mut self) -> Result<(), RadioError<TSPIERR>> {
        let ldo = needs_low_data_rate_optimize(self.bandwidth, self.spreading_factor);
        log::trace!(
            "sx127x::ldo symbol {} ms, ldo: {ldo}",
            symbol_duration_ms(self.bandwidth, self.spreading_factor)
        );
        self.modify_register(Register::ModemConfig3, |cfg| {
            let cfg = cfg & !LOW_DATA_RATE_OPTIMIZE;
            if ldo {
                cfg | LOW_DATA_RATE_OPTIMIZE
            } else {
                cfg
            }
        })
    }

    pub(crate) fn set_coding_rate(&mut self, denominator: u8) -> Result<(), RadioError<TSPIERR>> {
        let coding_rate = CodingRate::clamp(denominator);
        self.modify_register(Register::ModemConfig1, |cfg| {
            (cfg & 0xF1) | (coding_rate.bits() << 1)
        })
    }

    pub(crate) fn set_tx_power(
        &mut self,
        level: i8,
        output: PaOutput,
    ) -> Result<(), RadioError<TSPIERR>> {
        let settings = PaSettings::new(level, output);
        log::trace!("sx127x::set_tx_power {level} on {output:?}: {settings:?}");
        self.write_register(Register::PaConfig, settings.pa_config)?;
        if let Some(pa_dac) = settings.pa_dac {
            self.modify_register(Register::PaDac, |dac| (dac & !PA_DAC_MASK) | pa_dac)?;
        }
        if let Some(ocp) = settings.ocp {
            self.write_register(Register::Ocp, ocp)?;
        }
        Ok(())
    }

    pub(crate) fn set_preamble_length(&mut self, length: u16) -> Result<(), RadioError<TSPIERR>> {
        let [msb, lsb] = length.to_be_bytes();
        self.write_register(Register::PreambleMsb, msb)?;
        self.write_register(Register::PreambleLsb, lsb)
    }

    pub(crate) fn set_sync_word(&mut self, sync_word: u8) -> Result<(), RadioError<TSPIERR>> {
        self.write_register(Register::SyncWord, sync_word)
    }

    pub(crate) fn enable_crc(&mut self, enable: bool) -> Result<(), RadioError<TSPIERR>> {
        self.modify_register(Register::ModemConfig2, |cfg| {
            if enable {
                cfg | RX_PAYLOAD_CRC_ON
            } else {
                cfg & !RX_PAYLOAD_CRC_ON
            }
        })
    }

    pub(crate) fn set_header_mode(&mut self, mode: HeaderMode) -> Result<(), RadioError<TSPIERR>> {
        if self.header_mode == Some(mode) {
            return Ok(());
        }
        self.modify_register(Register::ModemConfig1, |cfg| match mode {
            HeaderMode::Implicit => cfg | HeaderMode::BIT,
            HeaderMode::Explicit => cfg & !HeaderMode::BIT,
        })?;
        self.header_mode = Some(mode);
        Ok(())
    }

    pub(crate) fn begin_packet(&mut self, header: HeaderMode) -> Result<(), RadioError<TSPIERR>> {
        self.set_mode(Mode::Standby)?;
        self.set_header_mode(header)?;
        self.write_register(Register::FifoAddrPtr, FIFO_TX_BASE_ADDR)?;
        self.write_register(Register::PayloadLength, 0)
    }

    pub(crate) fn write(&mut self, data: &[u8]) -> Result<usize, RadioError<TSPIERR>> {
        let current = self.read_register(Register::PayloadLength)? as usize;
        let room = MAX_PKT_LENGTH.saturating_sub(FIFO_TX_BASE_ADDR as usize + current);
        let size = data.len().min(room);
        if size < data.len() {
            log::debug!(
                "sx127x::write FIFO full, accepted {size} of {} bytes",
                data.len()
            );
        }
        for &byte in &data[..size] {
            self.write_register(Register::Fifo, byte)?;
        }
        self.write_register(Register::PayloadLength, (current + size) as u8)?;
        Ok(size)
    }

    pub(crate) fn end_packet(&mut self, arm: bool) -> Result<(), RadioError<TSPIERR>> {
        if arm {
            self.irq.arm();
            self.write_register(Register::DioMapping1, Dio0Mapping::TxDone as u8)?;
        } else {
            self.irq.disarm();
        }
        self.set_mode(Mode::Tx)
    }

    pub(crate) fn receive(&mut self, size: u8, arm: bool) -> Result<(), RadioError<TSPIERR>> {
        self.set_header_mode(HeaderMode::for_rx_size(size))?;
        if size > 0 {
            self.write_register(Register::PayloadLength, size)?;
        }
        if arm {
            self.irq.arm();
            self.write_register(Register::DioMapping1, Dio0Mapping::RxDone as u8)?;
        } else {
            self.irq.disarm();
        }
        // The last packet always starts at RegFifoRxCurrentAddr, the FIFO pointer is set on read.
        self.set_mode(Mode::RxContinuous)
    }

    pub(crate) fn disarm(&mut self) {
        self.irq.disarm();
    }

    /// Reads `RegIrqFlags` and writes the same value back to clear what was read.
    pub(crate) fn irq_flags(&mut self) -> Result<IrqFlags, RadioError<TSPIERR>> {
        let flags = self.read_register(Register::IrqFlags)?;
        self.write_register(Register::IrqFlags, flags)?;
        Ok(flags.into())
    }

    pub(crate) fn read_payload(&mut self) -> Result<Payload, RadioError<TSPIERR>> {
        let start = self.read_register(Register::FifoRxCurrentAddr)?;
        self.write_register(Register::FifoAddrPtr, start)?;
        let length = match self.header_mode {
            Some(HeaderMode::Implicit) => self.read_register(Register::PayloadLength)?,
            _ => self.read_register(Register::RxNbBytes)?,
        };
        let mut payload = Payload::new();
        for _ in 0..length {
            let byte = self.read_register(Register::Fifo)?;
            if payload.push(byte).is_err() {
                break;
            }
        }
        log::trace!("sx127x::read_payload {length} bytes from {start:#04x}");
        Ok(payload)
    }

    pub(crate) fn packet_rssi(&mut self) -> Result<i16, RadioError<TSPIERR>> {
        let raw = self.read_register(Register::PktRssiValue)?;
        Ok(packet_rssi_dbm(raw, self.frequency_hz))
    }

    pub(crate) fn packet_snr(&mut self) -> Result<f32, RadioError<TSPIERR>> {
        let raw = self.read_register(Register::PktSnrValue)?;
        Ok(packet_snr_db(raw))
    }

    fn in_rx_continuous(&mut self) -> Result<bool, RadioError<TSPIERR>> {
        let op_mode = self.read_register(Register::OpMode)?;
        Ok(op_mode == Mode::RxContinuous.op_mode())
    }

    /// Puts the chip back into continuous receive if it has left it.
    fn resume_receive(&mut self) -> Result<(), RadioError<TSPIERR>> {
        if !self.in_rx_continuous()? {
            log::debug!("sx127x: radio left continuous receive, re-entering");
            self.write_register(Register::FifoAddrPtr, FIFO_RX_BASE_ADDR)?;
            self.set_mode(Mode::RxContinuous)?;
        }
        Ok(())
    }

    /// Classifies a DIO0 interrupt and drains the FIFO for a clean receive.
    pub(crate) fn service_interrupt(&mut self) -> Result<Interrupt, RadioError<TSPIERR>> {
        self.irq.acknowledge();
        let flags = self.irq_flags()?;
        log::trace!("sx127x::service_interrupt {flags:?}");

        if flags.tx_done() {
            self.irq.disarm();
            // The chip drops back to standby on its own after TxDone.
            self.state = RadioState::Standby;
            return Ok(Interrupt::TxDone);
        }
        if flags.is_clean_rx() {
            return Ok(Interrupt::Received(self.read_payload()?));
        }
        if self.state == RadioState::Receiving {
            self.resume_receive()?;
        }
        Ok(Interrupt::Dropped(flags))
    }

    /// Polling receive: `true` once a clean packet is waiting, otherwise makes sure
    /// the chip is listening.
    pub(crate) fn poll_received(&mut self, size: u8) -> Result<bool, RadioError<TSPIERR>> {
        let flags = self.irq_flags()?;
        self.set_header_mode(HeaderMode::for_rx_size(size))?;
        if size > 0 {
            self.write_register(Register::PayloadLength, size)?;
        }
        if flags.is_clean_rx() {
            return Ok(true);
        }
        self.resume_receive()?;
        Ok(false)
    }

    pub(crate) fn dump_registers(&mut self) -> Result<(), RadioError<TSPIERR>> {
        for addr in 0..REGISTER_COUNT {
            let value = self.read_addr(addr)?;
            log::trace!("{addr:#04x}: {value:#04x}");
        }
        Ok(())
    }

    fn read_register(&mut self, register: Register) -> Result<u8, RadioError<TSPIERR>> {
        self.read_addr(register.addr())
    }

    fn read_addr(&mut self, addr: u8) -> Result<u8, RadioError<TSPIERR>> {
        let mut buf = [addr & !WRITE_BIT, 0x00];
        self.spi
            .transfer_in_place(&mut buf)
            .map_err(SpiError::Read)?;
        Ok(buf[1])
    }

    fn write_register(&mut self, register: Register, value: u8) -> Result<(), RadioError<TSPIERR>> {
        let mut buf = [register.addr() | WRITE_BIT, value];
        self.spi
            .transfer_in_place(&mut buf)
            .map_err(SpiError::Write)?;
        Ok(())
    }

    fn modify_register(
        &mut self,
        register: Register,
        f: impl FnOnce(u8) -> u8,
    ) -> Result<(), RadioError<TSPIERR>> {
        let value = self.read_register(register)?;
        self.write_register(register, f(value))
    }
}
