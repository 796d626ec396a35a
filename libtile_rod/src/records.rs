use super::constants::{MISSING_AMPLITUDE, MISSING_QUALITY, MISSING_TIME};
use super::fragment_type::RawChannelUnit;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Gain {
    Low = 0,
    High = 1,
}

impl Gain {
    pub fn from_bit(bit: u32) -> Self {
        if bit & 1 == 1 {
            Self::High
        } else {
            Self::Low
        }
    }

    pub fn index(&self) -> usize {
        *self as usize
    }
}

/// Digitized samples of one readout channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSample {
    pub channel: usize,
    pub gain: Gain,
    pub samples: Vec<u16>,
}

impl ChannelSample {
    pub fn new(channel: usize, gain: Gain, samples: Vec<u16>) -> Self {
        Self {
            channel,
            gain,
            samples,
        }
    }
}

/// A channel reconstructed by the front-end DSP (amplitude, time, quality)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReconstructedChannel {
    pub channel: usize,
    pub gain: Gain,
    pub amplitude: f32,
    pub time: f32,
    pub quality: f32,
    pub pedestal: f32,
    pub unit: RawChannelUnit,
}

impl ReconstructedChannel {
    pub fn new(channel: usize, gain: Gain, amplitude: f32, time: f32, quality: f32, unit: RawChannelUnit) -> Self {
        Self {
            channel,
            gain,
            amplitude,
            time,
            quality,
            pedestal: 0.0,
            unit,
        }
    }

    /// Placeholder for a channel whose words could not be read
    pub fn missing(channel: usize, gain: Gain, unit: RawChannelUnit) -> Self {
        Self::new(channel, gain, MISSING_AMPLITUDE, MISSING_TIME, MISSING_QUALITY, unit)
    }

    pub fn is_missing(&self) -> bool {
        self.time == MISSING_TIME && self.quality == MISSING_QUALITY && self.amplitude == MISSING_AMPLITUDE
    }
}

/// One word of a beam-crate sub-fragment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BeamElement {
    pub frag_id: u16,
    pub channel: usize,
    pub value: u32,
}

/// Muon tag and transverse energy summary of one module, as computed by the DSP
#[derive(Debug, Clone, PartialEq, Default)]
pub struct L2Summary {
    pub frag_id: u16,
    pub muon_eta: Vec<f32>,
    pub muon_energy: Vec<f32>,
    pub muon_quality: Vec<u8>,
    /// MeV; None when the sub-fragment type carries no energy sum
    pub transverse_energy: Option<f32>,
}

/// Laser calibration block read from the laser crate
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LaserRecord {
    /// -1 for the original laser, -2 for laser II
    pub version: i32,
    pub counter: u32,
    pub filter: u32,
    pub shutter: bool,
    pub requested_intensity: u32,
    pub measured_intensity: u32,
    pub daq_type: u32,
    pub pmt_adc: [u32; 2],
    pub tdc: [u32; 2],
    /// Photodiode ADC counts
    pub diodes: Vec<u32>,
}

/// Samples of one muon-receiver (TMDB) channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TmdbDigits {
    pub frag_id: u16,
    pub channel: usize,
    pub samples: Vec<u8>,
}

/// Energy of one muon-receiver channel, MeV
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TmdbRawChannel {
    pub frag_id: u16,
    pub channel: usize,
    pub energy: f32,
}

/// Trigger decision bits of one module read by the muon receiver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TmdbDecision {
    pub frag_id: u16,
    pub bits: [bool; 4],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_channel() {
        let ch = ReconstructedChannel::missing(5, Gain::Low, RawChannelUnit::OnlineAdcCounts);
        assert!(ch.is_missing());
        assert_eq!(ch.time, -100.0);
        assert_eq!(ch.quality, 31.0);
        assert!(!ReconstructedChannel::new(5, Gain::High, 1.0, 0.0, 0.0, RawChannelUnit::AdcCounts).is_missing());
        assert_eq!(Gain::from_bit(3), Gain::High);
    }
}
