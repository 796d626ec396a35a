// Wire-format constants for Tile ROD/ROB fragments and their sub-fragments

/// Separator word in front of every sub-fragment (since Sep 2005)
pub const SUB_FRAGMENT_MARKER: u32 = 0xFF12_34FF;
/// Near-miss separator produced by buggy RODs, accepted with a warning
pub const SUB_FRAGMENT_MARKER_BUGGY: u32 = 0x0012_3400;
/// Size overhead of a sub-fragment with separator (marker, size, id+type)
pub const MARKED_OVERHEAD: u32 = 3;
/// Size overhead of a legacy sub-fragment (size, id+type)
pub const LEGACY_OVERHEAD: u32 = 2;
/// ROD format versions above this value always use the separator layout
pub const MARKED_LAYOUT_MIN_VERSION: u32 = 0xFF;

pub const ROD_HEADER_MARKER: u32 = 0xEE12_34EE;
pub const ROD_MIN_HEADER_SIZE: usize = 9;
pub const ROD_TRAILER_SIZE: usize = 3;
pub const ROB_HEADER_MARKER: u32 = 0xDD12_34DD;
pub const ROB_MIN_HEADER_SIZE: usize = 7;
/// Set in the fragment metadata when the ROD data size had to be recovered
pub const ROD_SIZE_ERROR: u32 = 0x10000;
/// RODs at or below this source id belong to the laser/beam crate
pub const LASER_CRATE_MAX_SOURCE: u32 = 0x50_FFFF;

// Id+type word
pub const FRAG_ID_MASK: u32 = 0xFFFF;
pub const BEAM_FRAG_ID_MASK: u32 = 0xFF;
pub const TYPE_SHIFT: u32 = 16;
pub const TYPE_MASK: u32 = 0xFF;
pub const TYPE_CLASS_MASK: u32 = 0xF0;
pub const FLAGS_MASK: u32 = 0xFFFF_0000;
pub const UNIT_SHIFT: u32 = 30;
pub const UNIT_MASK: u32 = 0x3;
pub const DATA_TYPE_SHIFT: u32 = 28;
pub const DATA_TYPE_MASK: u32 = 0x3;
pub const DATA_TYPE_SIMULATED: u32 = 3;
pub const CALIB_MARKER_SHIFT: u32 = 27;
pub const ALGORITHM_SHIFT: u32 = 24;
pub const ALGORITHM_MASK: u32 = 0x7;

// Drawer geometry
pub const CHANNELS_PER_DRAWER: usize = 48;
pub const DMUS_PER_DRAWER: usize = 16;
pub const CHANNELS_PER_DMU: usize = 3;
pub const DRAWERS_PER_PARTITION: usize = 64;
pub const MAX_ROS: u16 = 4;
/// Frag ids below this belong to the beam/ancillary address space
pub const BEAM_FRAG_LIMIT: u16 = 0x100;
/// Drawer index layout of the conditions database: ROS 0 has 20 slots
pub const MAX_DRAWER_ROS0: usize = 20;
pub const MAX_DRAWER_IDX: usize = MAX_DRAWER_ROS0 + MAX_ROS as usize * DRAWERS_PER_PARTITION;
pub const ONLINE_UNIT_COUNT: usize = 4;

// DMU header word
pub const DMU_FORMAT_BIT: u32 = 31;
pub const DMU_MEMORY_PARITY_BIT: u32 = 25;
pub const DMU_SINGLE_STROBE_BIT: u32 = 24;
pub const DMU_DOUBLE_STROBE_BIT: u32 = 23;
pub const DMU_ZERO_BIT: u32 = 17;
pub const DMU_GAIN_SHIFT: u32 = 12;
pub const DMU_BCID_MASK: u32 = 0xFFF;

// Digits
pub const SAMPLE_BITS: u32 = 10;
pub const SAMPLE_MASK: u32 = 0x3FF;
pub const ALLOWED_SAMPLE_COUNTS: [usize; 4] = [7, 9, 16, 32];
pub const MAX_DIGITS_TRAILER_WORDS: usize = 3;
pub const MINI_DRAWERS: usize = 4;
pub const CHANNELS_PER_MINI_DRAWER: usize = 12;
pub const EXTENDED_SAMPLE_MASK: u32 = 0xFFF;
pub const COMPRESSED_SAMPLES: usize = 7;

// Fabricated record for channels that could not be parsed
pub const MISSING_AMPLITUDE: f32 = 0.0;
pub const MISSING_TIME: f32 = -100.0;
pub const MISSING_QUALITY: f32 = 31.0;

// Reconstructed-channel packing
/// Amplitude scale of type 0x4 words per online unit (rows) and gain (columns)
pub const DSP_AMPLITUDE_FACTOR: [[f32; 2]; ONLINE_UNIT_COUNT] = [
    [16.0, 16.0],
    [32.0, 2048.0],
    [32.0, 2048.0],
    [0.031_25, 2.0],
];
pub const DSP_TIME_FACTOR: f32 = 16.0;
pub const RAW_AMPLITUDE_FACTOR: f32 = 16.0;
pub const RAW_TIME_FACTOR: f32 = 2.0;
pub const COMPRESSED_TIME_FACTOR: f32 = 4.0;

// Identity map
pub const TILE_DETECTOR_BASE: u32 = 0x50_0000;
pub const LASER_ROD_ID: u32 = 0x50_0000;
pub const LASER_FRAG_IDS: [u16; 2] = [0x16, 0x17];
pub const TMDB_ROD_OFFSET: u32 = 0x100;
pub const DRAWERS_PER_TMDB_BOARD: u16 = 8;
pub const TMDB_CHANNELS_LONG_BARREL: usize = 8;
pub const TMDB_CHANNELS_EXTENDED_BARREL: usize = 4;
pub const TMDB_DECISION_BITS: usize = 4;
pub const DEFAULT_FULL_TILE_MODE_RUN: u32 = 320_000;

pub const DEFAULT_MAX_PRINT: u32 = 1000;
