//! Per-type sub-fragment unpackers.
//!
//! Every unpacker reads one sub-fragment payload into an [`Unpacked`] and never panics on
//! malformed input. A payload whose length contradicts the drawer format gives an
//! [`UnpackError`], which the caller counts and drops. Truncated reconstructed-channel
//! payloads are not errors; the missing channels are fabricated instead.
pub mod beam;
pub mod compressed;
pub mod digits;
pub mod l2;
pub mod laser;
pub mod quality;
pub mod reco;
pub mod tmdb;

use super::channel_order::ChannelOrder;
use super::constants::CHANNELS_PER_DRAWER;
use super::diagnostics::Diagnostics;
use super::error::UnpackError;
use super::fragment_type::{SubFragmentHeader, SubFragmentType};
use super::hardware_id::DrawerFormat;
use super::metadata::MetadataAggregator;
use super::online_weights::OnlineWeightCache;
use super::records::{ChannelSample, Gain, ReconstructedChannel};

/// Everything an unpacker needs to know besides the payload itself
#[derive(Debug, Clone, Copy)]
pub struct UnpackContext<'a> {
    pub header: SubFragmentHeader,
    pub version: u32,
    pub overhead: u32,
    pub format: DrawerFormat,
    pub order: &'a ChannelOrder,
    pub weights: &'a OnlineWeightCache,
    pub diag: &'a Diagnostics,
    pub mask_bad_digits: bool,
}

impl UnpackContext<'_> {
    pub fn frag_id(&self) -> u16 {
        self.header.frag_id
    }

    /// Number of gain sets in the payload: 2 for calibration-mode drawers
    pub fn gain_sets(&self) -> usize {
        self.format.gain_sets()
    }

    /// Logical channel and gain of a serialized position. In calibration mode the
    /// second block of 48 positions is high gain; otherwise `gain_bit` decides.
    pub fn locate(&self, position: usize, gain_bit: u32) -> (usize, Gain) {
        let gain = if self.format.is_calibration() {
            Gain::from_bit((position / CHANNELS_PER_DRAWER) as u32)
        } else {
            Gain::from_bit(gain_bit)
        };
        (self.order.channel(position), gain)
    }
}

/// Records and metadata read from one drawer sub-fragment
#[derive(Debug)]
pub struct Unpacked {
    pub digits: Vec<ChannelSample>,
    pub channels: Vec<ReconstructedChannel>,
    pub meta: MetadataAggregator,
}

impl Unpacked {
    pub fn new() -> Self {
        let mut meta = MetadataAggregator::new();
        meta.saw_fragment();
        Self {
            digits: Vec::new(),
            channels: Vec::new(),
            meta,
        }
    }
}

impl Default for Unpacked {
    fn default() -> Self {
        Self::new()
    }
}

/// Unpack a drawer sub-fragment. Types without drawer records (L2, laser, TMDB, beam)
/// are read by their own entry points and give an empty result here.
pub fn unpack_drawer(ctx: &UnpackContext, payload: &[u32]) -> Result<Unpacked, UnpackError> {
    match ctx.header.frag_type {
        SubFragmentType::Digits => digits::unpack_digits(ctx, payload),
        SubFragmentType::SparseDigits => digits::unpack_sparse_digits(ctx, payload),
        SubFragmentType::ExtendedDigits => digits::unpack_extended_digits(ctx, payload),
        SubFragmentType::RawChannels => reco::unpack_raw_channels(ctx, payload),
        SubFragmentType::SparseRawChannels => reco::unpack_sparse_raw_channels(ctx, payload),
        SubFragmentType::DspRawChannels => reco::unpack_dsp_raw_channels(ctx, payload),
        SubFragmentType::Compressed => compressed::unpack_compressed(ctx, payload),
        SubFragmentType::DataQuality => Ok(quality::unpack_quality(payload)),
        SubFragmentType::Unknown(code) => Err(UnpackError::UnknownType(code)),
        _ => Ok(Unpacked::new()),
    }
}

/// Check a fixed-size reconstructed payload against the drawer format. A payload exactly
/// the size of the other gain mode means the drawer tag is wrong.
pub(crate) fn check_gain_sets(
    ctx: &UnpackContext,
    words: usize,
    words_per_channel: usize,
) -> Result<usize, UnpackError> {
    let per_set = CHANNELS_PER_DRAWER * words_per_channel;
    let expected = per_set * ctx.gain_sets();
    let other = if ctx.format.is_calibration() {
        per_set
    } else {
        2 * per_set
    };
    if words == other {
        return Err(UnpackError::InconsistentFormat {
            words,
            expected: expected.to_string(),
        });
    }
    Ok(expected)
}
