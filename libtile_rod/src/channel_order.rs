use bit_set::BitSet;

use super::constants::{CHANNELS_PER_DRAWER, CHANNELS_PER_MINI_DRAWER};
use super::error::ChannelOrderError;
use super::fragment_type::SubFragmentType;
use super::hardware_id::DrawerKind;

/// Maps the serialized position of a channel inside a sub-fragment to its logical channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelOrder {
    name: &'static str,
    channels: Vec<usize>,
}

impl ChannelOrder {
    /// Build a table, checking that it is a permutation of all drawer channels
    pub fn new(name: &'static str, channels: Vec<usize>) -> Result<Self, ChannelOrderError> {
        if channels.len() != CHANNELS_PER_DRAWER {
            return Err(ChannelOrderError::BadLength {
                name,
                len: channels.len(),
                expected: CHANNELS_PER_DRAWER,
            });
        }
        let mut seen = BitSet::with_capacity(CHANNELS_PER_DRAWER);
        for &channel in channels.iter() {
            if channel >= CHANNELS_PER_DRAWER {
                return Err(ChannelOrderError::OutOfRange { name, channel });
            }
            if !seen.insert(channel) {
                return Err(ChannelOrderError::Duplicate { name, channel });
            }
        }
        Ok(Self { name, channels })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Logical channel at a serialized position. Positions past the table wrap per gain set.
    pub fn channel(&self, position: usize) -> usize {
        self.channels[position % CHANNELS_PER_DRAWER]
    }
}

fn identity() -> Vec<usize> {
    (0..CHANNELS_PER_DRAWER).collect()
}

/// Demonstrator long barrel: each mini-drawer reads its channels in reverse
fn demonstrator_long_barrel() -> Vec<usize> {
    (0..CHANNELS_PER_DRAWER)
        .map(|pos| {
            let md = pos / CHANNELS_PER_MINI_DRAWER;
            md * CHANNELS_PER_MINI_DRAWER + (CHANNELS_PER_MINI_DRAWER - 1 - pos % CHANNELS_PER_MINI_DRAWER)
        })
        .collect()
}

/// Demonstrator extended barrel: the two halves of the drawer are exchanged
fn demonstrator_extended_barrel() -> Vec<usize> {
    let half = CHANNELS_PER_DRAWER / 2;
    (0..CHANNELS_PER_DRAWER).map(|pos| (pos + half) % CHANNELS_PER_DRAWER).collect()
}

/// EBA15/EBC18: positions 0,1 and 18,19 are exchanged
fn special_extended_barrel() -> Vec<usize> {
    let mut channels = identity();
    channels.swap(0, 18);
    channels.swap(1, 19);
    channels
}

/// The named channel-order tables, built and validated once
#[derive(Debug, Clone)]
pub struct ChannelOrderTables {
    identity: ChannelOrder,
    demonstrator_long_barrel: ChannelOrder,
    demonstrator_extended_barrel: ChannelOrder,
    special_extended_barrel: ChannelOrder,
}

impl ChannelOrderTables {
    pub fn new() -> Result<Self, ChannelOrderError> {
        Ok(Self {
            identity: ChannelOrder::new("identity", identity())?,
            demonstrator_long_barrel: ChannelOrder::new(
                "demonstrator_long_barrel",
                demonstrator_long_barrel(),
            )?,
            demonstrator_extended_barrel: ChannelOrder::new(
                "demonstrator_extended_barrel",
                demonstrator_extended_barrel(),
            )?,
            special_extended_barrel: ChannelOrder::new(
                "special_extended_barrel",
                special_extended_barrel(),
            )?,
        })
    }

    /// Select the table for a sub-fragment type in a drawer of the given kind
    pub fn for_fragment(&self, frag_type: SubFragmentType, kind: DrawerKind) -> &ChannelOrder {
        let digits_or_channels = frag_type.has_digits() || frag_type.has_raw_channels();
        match kind {
            DrawerKind::DemonstratorLongBarrel if digits_or_channels => &self.demonstrator_long_barrel,
            DrawerKind::DemonstratorExtendedBarrel if digits_or_channels => {
                &self.demonstrator_extended_barrel
            }
            DrawerKind::SpecialExtendedBarrel if frag_type.has_raw_channels() => {
                &self.special_extended_barrel
            }
            _ => &self.identity,
        }
    }
}
