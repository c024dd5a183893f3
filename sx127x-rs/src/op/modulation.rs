//! LoRa modulation parameters and the arithmetic behind their register values.
//!
//! Out-of-range requests are never rejected: bandwidths snap to the next supported
//! value, spreading factor and coding rate are clamped.

/// Crystal oscillator frequency.
pub const FXOSC_HZ: u64 = 32_000_000;

/// `RegFrf` resolution is `FXOSC / 2^19`, about 61.035 Hz.
const FRF_SHIFT: u32 = 19;

/// Supported signal bandwidths in Hz, indexed by the `RegModemConfig1` bandwidth field.
pub const BANDWIDTHS_HZ: [u32; 10] = [
    7_800, 10_400, 15_600, 20_800, 31_250, 41_700, 62_500, 125_000, 250_000, 500_000,
];

/// Symbols longer than this require the low data rate optimization bit.
pub const LDO_SYMBOL_THRESHOLD_MS: u32 = 16;

/// Converts a carrier frequency to the 24-bit `RegFrf` value, rounding to the nearest step.
pub const fn frf_from_hz(frequency_hz: u32) -> u32 {
    let scaled = (frequency_hz as u64) << FRF_SHIFT;
    (((scaled + FXOSC_HZ / 2) / FXOSC_HZ) & 0x00FF_FFFF) as u32
}

/// Converts a `RegFrf` value back to Hz.
pub const fn hz_from_frf(frf: u32) -> u32 {
    let scaled = (frf as u64) * FXOSC_HZ;
    ((scaled + (1 << (FRF_SHIFT - 1))) >> FRF_SHIFT) as u32
}

/// A signal bandwidth from the supported table.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Bandwidth {
    index: u8,
}

impl Bandwidth {
    /// 125 kHz.
    pub const BW125: Self = Self { index: 7 };

    /// Picks the smallest supported bandwidth that is at least `hz`,
    /// or the widest one if `hz` exceeds them all.
    pub fn snap(hz: u32) -> Self {
        let index = BANDWIDTHS_HZ
            .iter()
            .position(|&bw| hz <= bw)
            .unwrap_or(BANDWIDTHS_HZ.len() - 1);
        Self { index: index as u8 }
    }

    /// The bandwidth in Hz.
    pub fn hz(self) -> u32 {
        BANDWIDTHS_HZ[self.index as usize]
    }

    /// The value of the 4-bit bandwidth field.
    pub fn bits(self) -> u8 {
        self.index
    }
}

/// A spreading factor in `6..=12`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SpreadingFactor {
    inner: u8,
}

impl SpreadingFactor {
    /// Lowest supported spreading factor.
    pub const MIN: u8 = 6;
    /// Highest supported spreading factor.
    pub const MAX: u8 = 12;

    /// Clamps `sf` into the supported range.
    pub fn clamp(sf: u8) -> Self {
        Self {
            inner: sf.clamp(Self::MIN, Self::MAX),
        }
    }

    /// The spreading factor.
    pub fn value(self) -> u8 {
        self.inner
    }

    /// `(RegDetectOptimize, RegDetectionThreshold)` for this spreading factor.
    /// SF6 needs its own pair.
    pub fn detection(self) -> (u8, u8) {
        if self.inner == 6 {
            (0xC5, 0x0C)
        } else {
            (0xC3, 0x0A)
        }
    }
}

/// A coding rate `4/denominator`, denominator in `5..=8`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CodingRate {
    denominator: u8,
}

impl CodingRate {
    /// Clamps `denominator` into `5..=8`.
    pub fn clamp(denominator: u8) -> Self {
        Self {
            denominator: denominator.clamp(5, 8),
        }
    }

    /// The denominator.
    pub fn denominator(self) -> u8 {
        self.denominator
    }

    /// The value of the 3-bit coding rate field.
    pub fn bits(self) -> u8 {
        self.denominator - 4
    }
}

/// Duration of one symbol in milliseconds, `1000 / (bw / 2^sf)`.
pub fn symbol_duration_ms(bandwidth: Bandwidth, sf: SpreadingFactor) -> f32 {
    1000.0 / (bandwidth.hz() as f32 / (1u32 << sf.value()) as f32)
}

/// Whether the low data rate optimization bit must be set.
pub fn needs_low_data_rate_optimize(bandwidth: Bandwidth, sf: SpreadingFactor) -> bool {
    // 1000 * 2^sf / bw > 16, kept in integers.
    (1000u32 << sf.value()) > LDO_SYMBOL_THRESHOLD_MS * bandwidth.hz()
}
