use std::sync::{Arc, OnceLock};

use super::constants::{COMPRESSED_SAMPLES, MAX_DRAWER_IDX, ONLINE_UNIT_COUNT};
use super::fragment_type::RawChannelUnit;
use super::hardware_id::drawer_idx;

/// Per-drawer weights used to rebuild the digits of compressed sub-fragments
#[derive(Debug, Clone, PartialEq)]
pub struct OnlineWeights {
    pub unit: RawChannelUnit,
    /// Normalized pulse shape sampled at the readout clock
    pub pulse_shape: [f32; COMPRESSED_SAMPLES],
    /// ADC counts per amplitude unit, indexed by gain
    pub adc_per_unit: [f32; 2],
}

impl OnlineWeights {
    /// Rebuild one sample from the reconstructed amplitude and pedestal
    pub fn sample(&self, gain: usize, pedestal: f32, amplitude: f32, index: usize) -> f32 {
        pedestal + amplitude * self.adc_per_unit[gain & 1] * self.pulse_shape[index % COMPRESSED_SAMPLES]
    }
}

/// Source of online weights. Values must be deterministic for a given key.
pub trait WeightsProvider: Send + Sync {
    fn weights(&self, drawer_idx: usize, unit: RawChannelUnit) -> OnlineWeights;
}

const NOMINAL_PULSE_SHAPE: [f32; COMPRESSED_SAMPLES] = [0.0, 0.155, 0.585, 1.0, 0.59, 0.21, 0.06];
/// Nominal ADC counts per pC, low and high gain
const NOMINAL_ADC_PER_PC: [f32; 2] = [1.28, 81.9];
const NOMINAL_PC_PER_MEV: f32 = 1.0 / 1050.0;

/// Nominal weights, the same for every drawer
#[derive(Debug, Clone, Copy, Default)]
pub struct NominalWeights;

impl WeightsProvider for NominalWeights {
    fn weights(&self, _drawer_idx: usize, unit: RawChannelUnit) -> OnlineWeights {
        let adc_per_unit = match unit.base_code() {
            0 => [1.0, 1.0],
            1 | 2 => NOMINAL_ADC_PER_PC,
            _ => NOMINAL_ADC_PER_PC.map(|v| v * NOMINAL_PC_PER_MEV),
        };
        OnlineWeights {
            unit,
            pulse_shape: NOMINAL_PULSE_SHAPE,
            adc_per_unit,
        }
    }
}

/// OnlineWeightCache memoizes provider lookups per (unit, drawer index).
///
/// Each slot is written at most once; reads after that take no lock.
pub struct OnlineWeightCache {
    slots: Box<[OnceLock<Arc<OnlineWeights>>]>,
    provider: Box<dyn WeightsProvider>,
}

impl std::fmt::Debug for OnlineWeightCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnlineWeightCache")
            .field("filled", &self.filled())
            .finish()
    }
}

impl Default for OnlineWeightCache {
    fn default() -> Self {
        Self::new(Box::new(NominalWeights))
    }
}

impl OnlineWeightCache {
    pub fn new(provider: Box<dyn WeightsProvider>) -> Self {
        Self {
            slots: (0..ONLINE_UNIT_COUNT * MAX_DRAWER_IDX)
                .map(|_| OnceLock::new())
                .collect(),
            provider,
        }
    }

    /// Weights for a drawer index and unit, computed on first use
    pub fn get(&self, unit: RawChannelUnit, drawer_idx: usize) -> Option<Arc<OnlineWeights>> {
        if drawer_idx >= MAX_DRAWER_IDX {
            return None;
        }
        let slot = &self.slots[unit.base_code() * MAX_DRAWER_IDX + drawer_idx];
        Some(
            slot.get_or_init(|| Arc::new(self.provider.weights(drawer_idx, unit)))
                .clone(),
        )
    }

    pub fn for_frag(&self, unit: RawChannelUnit, frag_id: u16) -> Option<Arc<OnlineWeights>> {
        self.get(unit, drawer_idx(frag_id))
    }

    /// Number of slots filled so far
    pub fn filled(&self) -> usize {
        self.slots.iter().filter(|s| s.get().is_some()).count()
    }
}
