// Interfaces to the calibration and bad-channel services. The decoder never calls
// these itself; they are applied to decoded collections by the caller.
use super::fragment_type::RawChannelUnit;
use super::online_weights::{NominalWeights, WeightsProvider};
use super::records::Gain;

/// Converts amplitudes between units. Must be pure for a fixed conditions snapshot.
pub trait Calibrator: Send + Sync {
    fn calibrate(
        &self,
        drawer_idx: usize,
        channel: usize,
        gain: Gain,
        value: f32,
        from: RawChannelUnit,
        to: RawChannelUnit,
    ) -> f32;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelQuality {
    Good,
    /// Usable with care (e.g. noisy)
    Affected,
    Bad,
}

pub trait ChannelStatusProvider: Send + Sync {
    fn channel_status(&self, drawer_idx: usize, channel: usize, gain: Gain) -> ChannelQuality;
}

/// Nominal conversion through ADC counts, identical for every channel
#[derive(Debug, Clone, Copy, Default)]
pub struct NominalCalibration;

impl Calibrator for NominalCalibration {
    fn calibrate(
        &self,
        drawer_idx: usize,
        _channel: usize,
        gain: Gain,
        value: f32,
        from: RawChannelUnit,
        to: RawChannelUnit,
    ) -> f32 {
        if from.base_code() == to.base_code() {
            return value;
        }
        let to_adc = NominalWeights.weights(drawer_idx, from).adc_per_unit[gain.index()];
        let from_adc = NominalWeights.weights(drawer_idx, to).adc_per_unit[gain.index()];
        value * to_adc / from_adc
    }
}

/// Reports every channel as good
#[derive(Debug, Clone, Copy, Default)]
pub struct AllChannelsGood;

impl ChannelStatusProvider for AllChannelsGood {
    fn channel_status(&self, _drawer_idx: usize, _channel: usize, _gain: Gain) -> ChannelQuality {
        ChannelQuality::Good
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nominal_calibration() {
        let cal = NominalCalibration;
        let adc = 128.0;
        let pc = cal.calibrate(
            0,
            0,
            Gain::Low,
            adc,
            RawChannelUnit::OnlineAdcCounts,
            RawChannelUnit::PicoCoulombs,
        );
        assert!((pc - 100.0).abs() < 1e-3);
        let back = cal.calibrate(0, 0, Gain::Low, pc, RawChannelUnit::PicoCoulombs, RawChannelUnit::AdcCounts);
        assert!((back - adc).abs() < 1e-3);
        assert_eq!(
            cal.calibrate(0, 0, Gain::High, 5.0, RawChannelUnit::MegaElectronVolts, RawChannelUnit::OnlineMegaElectronVolts),
            5.0
        );
        assert_eq!(AllChannelsGood.channel_status(3, 4, Gain::High), ChannelQuality::Good);
    }
}
