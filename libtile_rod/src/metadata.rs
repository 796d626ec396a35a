use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use super::constants::*;
use super::rod_fragment::RodHeader;

/// Bit-combinable status of one decoded fragment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct FragmentStatus(u32);

impl FragmentStatus {
    pub const OK: Self = Self(0x00);
    pub const CRC_ERROR: Self = Self(0x01);
    pub const ALL_FF: Self = Self(0x10);
    pub const ALL_00: Self = Self(0x20);
    pub const NO_FRAGMENT: Self = Self(0x40);
    pub const NO_ROB: Self = Self(0x80);

    pub const ALL: [(Self, &'static str); 5] = [
        (Self::CRC_ERROR, "crc_error"),
        (Self::ALL_FF, "all_ff"),
        (Self::ALL_00, "all_00"),
        (Self::NO_FRAGMENT, "no_fragment"),
        (Self::NO_ROB, "no_rob"),
    ];

    pub fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub fn bits(&self) -> u32 {
        self.0
    }

    pub fn is_ok(&self) -> bool {
        self.0 == 0
    }

    pub fn contains(&self, other: Self) -> bool {
        other.0 != 0 && self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }
}

impl BitOr for FragmentStatus {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for FragmentStatus {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for FragmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_ok() {
            return write!(f, "ok");
        }
        let names: Vec<&str> = Self::ALL
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        write!(f, "{}", names.join("|"))
    }
}

/// Format check: bit 31 must be set and bit 17 clear
pub fn dmu_format_error(word: u32) -> bool {
    (word >> DMU_FORMAT_BIT) & 1 == 0 || (word >> DMU_ZERO_BIT) & 1 == 1
}

/// Parity check: the population count must be odd
pub fn dmu_parity_error(word: u32) -> bool {
    word.count_ones() % 2 == 0
}

/// Accessors for one DMU header word
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DmuHeader(pub u32);

impl DmuHeader {
    pub fn is_good(&self) -> bool {
        !dmu_format_error(self.0) && !dmu_parity_error(self.0)
    }

    pub fn memory_parity_error(&self) -> bool {
        (self.0 >> DMU_MEMORY_PARITY_BIT) & 1 == 1
    }

    /// Recoverable
    pub fn single_strobe_error(&self) -> bool {
        (self.0 >> DMU_SINGLE_STROBE_BIT) & 1 == 1
    }

    /// Unrecoverable
    pub fn double_strobe_error(&self) -> bool {
        (self.0 >> DMU_DOUBLE_STROBE_BIT) & 1 == 1
    }

    pub fn bcid(&self) -> u32 {
        self.0 & DMU_BCID_MASK
    }

    /// Gain bit of channel `k` (0..3) behind this DMU
    pub fn gain(&self, k: usize) -> u8 {
        ((self.0 >> (DMU_GAIN_SHIFT + k as u32)) & 1) as u8
    }
}

/// Per-fragment summary words carried by the data-quality sub-fragment (type 0xA)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DataQuality {
    pub global_crc: u32,
    pub dsp_bcid: u32,
    pub bcid_error_mask: u32,
    pub memory_parity_mask: u32,
    pub single_strobe_mask: u32,
    pub double_strobe_mask: u32,
    pub header_format_mask: u32,
    pub header_parity_mask: u32,
    pub sample_format_mask: u32,
    pub sample_parity_mask: u32,
    pub fe_chip_mask: u32,
    pub rod_chip_mask: u32,
}

impl DataQuality {
    /// Quality words of simulated data, where every DMU is good
    pub fn all_good() -> Self {
        Self {
            dsp_bcid: 0xDEAD,
            fe_chip_mask: 0xFFFF,
            rod_chip_mask: 0xFFFF,
            ..Default::default()
        }
    }

    pub fn global_crc_error(&self) -> bool {
        self.global_crc & 1 == 1
    }
}

/// FragmentMetadata holds everything a decode learns about a drawer besides its channel records
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FragmentMetadata {
    pub dmu_headers: Vec<u32>,
    pub dmu_crc: Vec<u32>,
    /// High-gain shadow set, filled for calibration-mode drawers only
    pub dmu_headers_high: Vec<u32>,
    pub dmu_crc_high: Vec<u32>,
    /// Low 16 bits front-end CRC, high 16 bits ROD CRC, one bit per DMU
    pub crc_mask: u32,
    pub extra_words: Vec<u32>,
    pub quality: DataQuality,
    pub frag_size: u32,
    pub bcid: u32,
    pub lvl1_id: u32,
    pub lvl1_type: u32,
    pub det_ev_type: u32,
    pub rod_bcid: u32,
    pub error_bits: u32,
    pub status: FragmentStatus,
}

impl FragmentMetadata {
    pub fn global_crc_ok(&self) -> bool {
        !self.quality.global_crc_error()
    }

    /// One bit per DMU failing the format or parity check, over both gain sets
    pub fn suspect_dmus(&self) -> u32 {
        self.dmu_headers
            .iter()
            .chain(self.dmu_headers_high.iter())
            .enumerate()
            .filter(|(_, w)| !DmuHeader(**w).is_good())
            .fold(0, |mask, (idx, _)| mask | (1 << (idx % DMUS_PER_DRAWER)))
    }

    /// Channels behind a suspect DMU are delivered but should be treated with care
    pub fn is_channel_suspect(&self, channel: usize) -> bool {
        self.suspect_dmus() & (1 << (channel / CHANNELS_PER_DMU)) != 0
    }

    pub fn single_strobe_errors(&self) -> u32 {
        self.dmu_headers
            .iter()
            .enumerate()
            .filter(|(_, w)| DmuHeader(**w).single_strobe_error())
            .fold(self.quality.single_strobe_mask, |m, (i, _)| m | (1 << (i % DMUS_PER_DRAWER)))
    }

    pub fn double_strobe_errors(&self) -> u32 {
        self.dmu_headers
            .iter()
            .enumerate()
            .filter(|(_, w)| DmuHeader(**w).double_strobe_error())
            .fold(self.quality.double_strobe_mask, |m, (i, _)| m | (1 << (i % DMUS_PER_DRAWER)))
    }
}

/// MetadataAggregator collects what the unpackers report for one drawer and folds
/// it into a FragmentMetadata with a single status
#[derive(Debug, Clone, Default)]
pub struct MetadataAggregator {
    meta: FragmentMetadata,
    status: FragmentStatus,
    has_digits: bool,
    has_quality: bool,
    seen_fragment: bool,
}

impl MetadataAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Note that a matching sub-fragment was found, whatever its content
    pub fn saw_fragment(&mut self) {
        self.seen_fragment = true;
    }

    /// Check a payload for the all-ones / all-zeros patterns of a dead link
    pub fn check_payload(&mut self, payload: &[u32]) {
        if payload.is_empty() {
            return;
        }
        if payload.iter().all(|w| *w == 0xFFFF_FFFF) {
            self.status |= FragmentStatus::ALL_FF;
        } else if payload.iter().all(|w| *w == 0) {
            self.status |= FragmentStatus::ALL_00;
        }
    }

    /// Record the DMU words of a digits sub-fragment. `high` selects the shadow set.
    pub fn add_dmu(&mut self, header: u32, crc: u32, high: bool) {
        self.has_digits = true;
        if high {
            self.meta.dmu_headers_high.push(header);
            self.meta.dmu_crc_high.push(crc);
        } else {
            self.meta.dmu_headers.push(header);
            self.meta.dmu_crc.push(crc);
        }
    }

    pub fn set_digits_summary(&mut self, frag_size: u32, bcid: u32, crc_mask: u32, extra_words: &[u32]) {
        self.has_digits = true;
        self.meta.frag_size = frag_size;
        self.meta.bcid = bcid;
        self.meta.crc_mask = crc_mask;
        self.meta.extra_words = extra_words.to_vec();
    }

    pub fn set_quality(&mut self, quality: DataQuality) {
        self.has_quality = true;
        self.meta.quality = quality;
    }

    pub fn has_quality(&self) -> bool {
        self.has_quality
    }

    /// Take over what a single sub-fragment reported
    pub fn merge(&mut self, other: MetadataAggregator) {
        self.status |= other.status;
        self.seen_fragment |= other.seen_fragment;
        let MetadataAggregator { meta, has_digits, has_quality, .. } = other;
        self.meta.dmu_headers.extend(meta.dmu_headers);
        self.meta.dmu_crc.extend(meta.dmu_crc);
        self.meta.dmu_headers_high.extend(meta.dmu_headers_high);
        self.meta.dmu_crc_high.extend(meta.dmu_crc_high);
        if has_digits {
            self.has_digits = true;
            self.meta.frag_size = meta.frag_size;
            self.meta.bcid = meta.bcid;
            self.meta.crc_mask = meta.crc_mask;
            self.meta.extra_words = meta.extra_words;
        }
        if has_quality {
            self.set_quality(meta.quality);
        }
    }

    /// Fold everything into the final metadata
    pub fn finish(mut self, rod: Option<&RodHeader>, error_bits: u32) -> FragmentMetadata {
        if let Some(rod) = rod {
            self.meta.lvl1_id = rod.lvl1_id;
            self.meta.lvl1_type = rod.lvl1_type;
            self.meta.det_ev_type = rod.det_ev_type;
            self.meta.rod_bcid = rod.bcid;
        }
        self.meta.error_bits = error_bits;

        let mut status = self.status;
        if self.meta.quality.global_crc_error() {
            status |= FragmentStatus::CRC_ERROR;
        }
        let crc = self.meta.crc_mask;
        if self.has_digits && (crc & 0xFFFF) ^ (crc >> 16) != 0 {
            status |= FragmentStatus::CRC_ERROR;
        }
        let q = &self.meta.quality;
        if self.has_quality && q.fe_chip_mask ^ q.rod_chip_mask != 0 {
            status |= FragmentStatus::CRC_ERROR;
        }
        if !self.seen_fragment {
            status |= FragmentStatus::NO_FRAGMENT;
        }
        self.meta.status = status;
        self.meta
    }
}
