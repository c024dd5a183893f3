//! Transmit power and received signal quality.

/// Which power amplifier output drives the antenna.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum PaOutput {
    /// RFO pin, up to 14 dBm.
    Rfo,
    /// PA_BOOST pin, 2 to 20 dBm. RFM95 modules only wire this one.
    #[default]
    PaBoost,
}

/// `PaSelect` bit of `RegPaConfig`.
pub const PA_BOOST: u8 = 0x80;

/// `RegPaConfig` upper bits used on the RFO path: max power setting.
const RFO_MAX_POWER: u8 = 0x70;

/// `OcpOn` bit of `RegOcp`.
const OCP_ON: u8 = 0x20;

/// Bits of `RegPaDac` owned by the `PaDac` field.
pub const PA_DAC_MASK: u8 = 0x07;

/// Register values realising a requested output power.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PaSettings {
    /// Value for `RegPaConfig`.
    pub pa_config: u8,
    /// Value for the `PaDac` field of `RegPaDac`, if the path uses it.
    pub pa_dac: Option<u8>,
    /// Value for `RegOcp`, if the path uses it.
    pub ocp: Option<u8>,
}

impl PaSettings {
    /// Computes the register values for `level` on `output`, clamping the level
    /// to the path's range (`0..=14` for RFO, `2..=20` for PA_BOOST).
    pub fn new(level: i8, output: PaOutput) -> Self {
        match output {
            PaOutput::Rfo => {
                let level = level.clamp(0, 14) as u8;
                Self {
                    pa_config: RFO_MAX_POWER | level,
                    pa_dac: None,
                    ocp: None,
                }
            }
            PaOutput::PaBoost => {
                let level = level.clamp(2, 20) as u8;
                if level > 17 {
                    // +20 dBm mode, OCP trim 18: -30 + 10 * 18 = 150 mA.
                    Self {
                        pa_config: PA_BOOST | (level - 5),
                        pa_dac: Some(0x07),
                        ocp: Some(OCP_ON | 18),
                    }
                } else {
                    // Default PA_DAC, OCP trim 11: 45 + 5 * 11 = 100 mA.
                    Self {
                        pa_config: PA_BOOST | (level - 2),
                        pa_dac: Some(0x04),
                        ocp: Some(OCP_ON | 11),
                    }
                }
            }
        }
    }
}

/// Carrier frequencies from here up use the high-frequency port RSSI offset.
pub const HF_PORT_THRESHOLD_HZ: u32 = 868_000_000;

/// Packet RSSI in dBm from the raw `RegPktRssiValue`.
pub fn packet_rssi_dbm(raw: u8, frequency_hz: u32) -> i16 {
    let offset = if frequency_hz < HF_PORT_THRESHOLD_HZ {
        164
    } else {
        157
    };
    raw as i16 - offset
}

/// Packet SNR in dB from the raw `RegPktSnrValue` (two's complement, quarter dB steps).
pub fn packet_snr_db(raw: u8) -> f32 {
    (raw as i8) as f32 * 0.25
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rfo_path_clamps_to_fourteen() {
        assert_eq!(PaSettings::new(-3, PaOutput::Rfo).pa_config, 0x70);
        assert_eq!(PaSettings::new(9, PaOutput::Rfo).pa_config, 0x79);
        let max = PaSettings::new(20, PaOutput::Rfo);
        assert_eq!(max.pa_config, 0x7E);
        assert_eq!(max.pa_dac, None);
        assert_eq!(max.ocp, None);
    }

    #[test]
    fn boost_path_uses_low_current_settings_up_to_seventeen() {
        let low = PaSettings::new(0, PaOutput::PaBoost);
        assert_eq!(low.pa_config, PA_BOOST);
        let mid = PaSettings::new(17, PaOutput::PaBoost);
        assert_eq!(mid.pa_config, PA_BOOST | 15);
        assert_eq!(mid.pa_dac, Some(0x04));
        assert_eq!(mid.ocp, Some(0x20 | 11));
    }

    #[test]
    fn boost_path_uses_high_current_settings_above_seventeen() {
        let high = PaSettings::new(18, PaOutput::PaBoost);
        assert_eq!(high.pa_config, PA_BOOST | 13);
        let max = PaSettings::new(i8::MAX, PaOutput::PaBoost);
        assert_eq!(max.pa_config, PA_BOOST | 15);
        assert_eq!(max.pa_dac, Some(0x07));
        assert_eq!(max.ocp, Some(0x20 | 18));
    }

    #[test]
    fn rssi_offset_depends_on_band() {
        assert_eq!(packet_rssi_dbm(100, 433_000_000), -64);
        assert_eq!(packet_rssi_dbm(100, 867_999_999), -64);
        assert_eq!(packet_rssi_dbm(100, 868_000_000), -57);
        assert_eq!(packet_rssi_dbm(100, 915_000_000), -57);
    }

    #[test]
    fn snr_is_signed_quarter_db() {
        assert_eq!(packet_snr_db(40), 10.0);
        assert_eq!(packet_snr_db(0xF8), -2.0);
    }
}
