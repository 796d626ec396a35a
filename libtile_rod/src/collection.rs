use std::collections::BTreeMap;

use super::conditions::{Calibrator, ChannelQuality, ChannelStatusProvider};
use super::fragment_type::{RawChannelUnit, ReconstructionMethod, SubFragmentHeader, SubFragmentType};
use super::hardware_id::{drawer_idx, DrawerFormat};
use super::metadata::{FragmentMetadata, FragmentStatus, MetadataAggregator};
use super::records::{ChannelSample, Gain, ReconstructedChannel};
use super::rod_fragment::RodHeader;
use super::unpack::Unpacked;

/// Everything decoded for one logical drawer
#[derive(Debug, Clone, PartialEq)]
pub struct DrawerCollection {
    pub frag_id: u16,
    pub format: DrawerFormat,
    pub unit: RawChannelUnit,
    pub method: ReconstructionMethod,
    /// Flag bits of the last reconstructed-channel sub-fragment
    pub bsflags: u32,
    pub digits: Vec<ChannelSample>,
    pub channels: Vec<ReconstructedChannel>,
    pub metadata: FragmentMetadata,
}

impl DrawerCollection {
    pub fn status(&self) -> FragmentStatus {
        self.metadata.status
    }

    pub fn drawer_idx(&self) -> usize {
        drawer_idx(self.frag_id)
    }

    pub fn is_empty(&self) -> bool {
        self.digits.is_empty() && self.channels.is_empty()
    }

    /// Amplitudes of the delivered channels converted to `to`. Fabricated channels are skipped.
    pub fn calibrated_amplitudes(&self, calibrator: &dyn Calibrator, to: RawChannelUnit) -> Vec<(usize, Gain, f32)> {
        let idx = self.drawer_idx();
        self.channels
            .iter()
            .filter(|ch| !ch.is_missing())
            .map(|ch| {
                (
                    ch.channel,
                    ch.gain,
                    calibrator.calibrate(idx, ch.channel, ch.gain, ch.amplitude, ch.unit, to),
                )
            })
            .collect()
    }

    /// Channels which were read and are not marked bad by the conditions
    pub fn usable_channels(&self, provider: &dyn ChannelStatusProvider) -> Vec<&ReconstructedChannel> {
        let idx = self.drawer_idx();
        self.channels
            .iter()
            .filter(|ch| !ch.is_missing())
            .filter(|ch| provider.channel_status(idx, ch.channel, ch.gain) != ChannelQuality::Bad)
            .collect()
    }
}

/// Collects the sub-fragments of one drawer into a DrawerCollection
#[derive(Debug)]
pub struct CollectionBuilder {
    frag_id: u16,
    format: DrawerFormat,
    unit: RawChannelUnit,
    method: ReconstructionMethod,
    bsflags: u32,
    digits: Vec<ChannelSample>,
    channels: Vec<ReconstructedChannel>,
    meta: MetadataAggregator,
}

impl CollectionBuilder {
    pub fn new(frag_id: u16, format: DrawerFormat) -> Self {
        Self {
            frag_id,
            format,
            unit: RawChannelUnit::default(),
            method: ReconstructionMethod::default(),
            bsflags: 0,
            digits: Vec::new(),
            channels: Vec::new(),
            meta: MetadataAggregator::new(),
        }
    }

    pub fn frag_id(&self) -> u16 {
        self.frag_id
    }

    pub fn format(&self) -> DrawerFormat {
        self.format
    }

    /// Note a matching sub-fragment, also one whose content was dropped
    pub fn saw_fragment(&mut self) {
        self.meta.saw_fragment();
    }

    /// Take over one unpacked sub-fragment. `keep_digits`/`keep_channels` select what
    /// the caller wants of types which carry both.
    pub fn absorb(&mut self, header: &SubFragmentHeader, unpacked: Unpacked, keep_digits: bool, keep_channels: bool) {
        let Unpacked {
            digits,
            channels,
            meta,
        } = unpacked;
        match header.frag_type {
            SubFragmentType::DspRawChannels | SubFragmentType::Compressed => {
                (self.unit, self.method) = header.unit_and_method();
                self.bsflags = header.bsflags();
            }
            SubFragmentType::RawChannels | SubFragmentType::SparseRawChannels => {
                self.unit = RawChannelUnit::AdcCounts;
                self.method = ReconstructionMethod::OptFilterDsp;
                self.bsflags = header.bsflags();
            }
            _ => (),
        }
        if keep_digits {
            self.digits.extend(digits);
        }
        if keep_channels {
            self.channels.extend(channels);
        }
        self.meta.merge(meta);
    }

    pub fn finish(self, rod: Option<&RodHeader>, error_bits: u32) -> DrawerCollection {
        DrawerCollection {
            frag_id: self.frag_id,
            format: self.format,
            unit: self.unit,
            method: self.method,
            bsflags: self.bsflags,
            digits: self.digits,
            channels: self.channels,
            metadata: self.meta.finish(rod, error_bits),
        }
    }
}

/// Drawer collections keyed by logical frag id
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DrawerContainer {
    drawers: BTreeMap<u16, DrawerCollection>,
}

impl DrawerContainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, collection: DrawerCollection) {
        self.drawers.insert(collection.frag_id, collection);
    }

    pub fn get(&self, frag_id: u16) -> Option<&DrawerCollection> {
        self.drawers.get(&frag_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DrawerCollection> {
        self.drawers.values()
    }

    pub fn len(&self) -> usize {
        self.drawers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drawers.is_empty()
    }

    /// Number of drawers per status value
    pub fn status_counts(&self) -> BTreeMap<FragmentStatus, usize> {
        let mut counts = BTreeMap::new();
        for drawer in self.drawers.values() {
            *counts.entry(drawer.status()).or_insert(0) += 1;
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conditions::{AllChannelsGood, NominalCalibration};
    use crate::test_support::id_word;

    struct BadOddChannels;

    impl ChannelStatusProvider for BadOddChannels {
        fn channel_status(&self, _drawer_idx: usize, channel: usize, _gain: Gain) -> ChannelQuality {
            if channel % 2 == 1 {
                ChannelQuality::Bad
            } else {
                ChannelQuality::Affected
            }
        }
    }

    fn collection() -> DrawerCollection {
        let header = SubFragmentHeader::new(id_word(0x205, 0x4, 1 << 30), false);
        let mut unpacked = Unpacked::new();
        unpacked.channels = vec![
            ReconstructedChannel::new(0, Gain::Low, 12.8, 0.0, 1.0, RawChannelUnit::OnlineAdcCounts),
            ReconstructedChannel::new(1, Gain::Low, 5.0, 0.0, 1.0, RawChannelUnit::OnlineAdcCounts),
            ReconstructedChannel::missing(2, Gain::Low, RawChannelUnit::OnlineAdcCounts),
        ];
        let mut builder = CollectionBuilder::new(0x205, DrawerFormat::nominal(0x205));
        builder.absorb(&header, unpacked, true, true);
        builder.finish(None, 0)
    }

    #[test]
    fn test_builder_takes_unit_and_flags() {
        let drawer = collection();
        assert_eq!(drawer.unit, RawChannelUnit::OnlinePicoCoulombs);
        assert_eq!(drawer.method, ReconstructionMethod::OptFilterDsp);
        assert_eq!(drawer.bsflags, 0x4004_0000);
        assert_eq!(drawer.channels.len(), 3);
        assert!(drawer.status().is_ok());
        assert_eq!(drawer.drawer_idx(), 20 + 64 + 5);
    }

    #[test]
    fn test_dropped_content() {
        let header = SubFragmentHeader::new(id_word(0x205, 0x5, 0), false);
        let mut unpacked = Unpacked::new();
        unpacked.digits = vec![ChannelSample::new(0, Gain::Low, vec![1, 2, 3])];
        let mut builder = CollectionBuilder::new(0x205, DrawerFormat::nominal(0x205));
        builder.absorb(&header, unpacked, false, true);
        let drawer = builder.finish(None, 0);
        assert!(drawer.is_empty());
        assert_eq!(drawer.method, ReconstructionMethod::OptFilterDspCompressed);

        let drawer = CollectionBuilder::new(0x205, DrawerFormat::nominal(0x205)).finish(None, 0);
        assert_eq!(drawer.status(), FragmentStatus::NO_FRAGMENT);
    }

    #[test]
    fn test_conditions_helpers() {
        let drawer = collection();
        let pc = drawer.calibrated_amplitudes(&NominalCalibration, RawChannelUnit::PicoCoulombs);
        assert_eq!(pc.len(), 2);
        assert!((pc[0].2 - 10.0).abs() < 1e-4);
        assert_eq!(drawer.usable_channels(&AllChannelsGood).len(), 2);
        let usable = drawer.usable_channels(&BadOddChannels);
        assert_eq!(usable.len(), 1);
        assert_eq!(usable[0].channel, 0);
    }

    #[test]
    fn test_container() {
        let mut container = DrawerContainer::new();
        container.insert(collection());
        container.insert(CollectionBuilder::new(0x206, DrawerFormat::nominal(0x206)).finish(None, 0));
        assert_eq!(container.len(), 2);
        assert_eq!(container.iter().map(|d| d.frag_id).collect::<Vec<_>>(), vec![0x205, 0x206]);
        let counts = container.status_counts();
        assert_eq!(counts[&FragmentStatus::OK], 1);
        assert_eq!(counts[&FragmentStatus::NO_FRAGMENT], 1);
    }
}
