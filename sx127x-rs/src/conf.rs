//! Wrapper for modem configuration parameters.

use super::op::*;

/// Configuration applied by [`crate::Sx127x::init`].
///
/// Values are requests: bandwidth is snapped to a supported value and the
/// spreading factor, coding rate and power level are clamped when applied.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Config {
    /// Carrier frequency in Hz (e.g. `915_000_000`).
    pub frequency_hz: u32,
    /// Signal bandwidth in Hz.
    pub bandwidth_hz: u32,
    /// Spreading factor, 6 to 12.
    pub spreading_factor: u8,
    /// Coding rate denominator, 5 to 8 for 4/5 to 4/8.
    pub coding_rate: u8,
    /// Preamble length in symbols.
    pub preamble_length: u16,
    /// LoRa sync word. `0x12` for private networks, `0x34` for LoRaWAN.
    pub sync_word: u8,
    /// Whether the payload CRC is generated and checked.
    pub crc: bool,
    /// Output power level in dBm.
    pub tx_power: i8,
    /// Power amplifier output.
    pub pa_output: PaOutput,
    /// Header mode the modem starts in.
    pub header_mode: HeaderMode,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            frequency_hz: 915_000_000,
            bandwidth_hz: 125_000,
            spreading_factor: 7,
            coding_rate: 5,
            preamble_length: 8,
            sync_word: 0x12,
            crc: false,
            tx_power: 2,
            pa_output: PaOutput::PaBoost,
            header_mode: HeaderMode::Explicit,
        }
    }
}

impl Config {
    /// Sets the carrier frequency.
    pub fn set_frequency(mut self, frequency_hz: u32) -> Self {
        self.frequency_hz = frequency_hz;
        self
    }

    /// Sets the signal bandwidth.
    pub fn set_bandwidth(mut self, bandwidth_hz: u32) -> Self {
        self.bandwidth_hz = bandwidth_hz;
        self
    }

    /// Sets the spreading factor.
    pub fn set_spreading_factor(mut self, spreading_factor: u8) -> Self {
        self.spreading_factor = spreading_factor;
        self
    }

    /// Sets the coding rate denominator.
    pub fn set_coding_rate(mut self, coding_rate: u8) -> Self {
        self.coding_rate = coding_rate;
        self
    }

    /// Sets the preamble length.
    pub fn set_preamble_length(mut self, preamble_length: u16) -> Self {
        self.preamble_length = preamble_length;
        self
    }

    /// Sets the sync word.
    pub fn set_sync_word(mut self, sync_word: u8) -> Self {
        self.sync_word = sync_word;
        self
    }

    /// Enables or disables the payload CRC.
    pub fn set_crc(mut self, crc: bool) -> Self {
        self.crc = crc;
        self
    }

    /// Sets the output power and amplifier path.
    pub fn set_tx_power(mut self, tx_power: i8, pa_output: PaOutput) -> Self {
        self.tx_power = tx_power;
        self.pa_output = pa_output;
        self
    }

    /// Sets the initial header mode.
    pub fn set_header_mode(mut self, header_mode: HeaderMode) -> Self {
        self.header_mode = header_mode;
        self
    }
}
