//! Builders for synthetic ROB/ROD/sub-fragment buffers used by unit tests

use super::constants::*;

/// A sub-fragment with the separator layout: [marker][size][id+type][payload..]
pub fn sub_fragment(frag_id: u16, frag_type: u8, flags: u32, payload: &[u32]) -> Vec<u32> {
    let mut words = vec![
        SUB_FRAGMENT_MARKER,
        payload.len() as u32 + MARKED_OVERHEAD,
        id_word(frag_id, frag_type, flags),
    ];
    words.extend_from_slice(payload);
    words
}

/// A sub-fragment with the legacy layout: [size][id+type][payload..]
pub fn legacy_sub_fragment(frag_id: u16, frag_type: u8, payload: &[u32]) -> Vec<u32> {
    let mut words = vec![
        payload.len() as u32 + LEGACY_OVERHEAD,
        id_word(frag_id, frag_type, 0),
    ];
    words.extend_from_slice(payload);
    words
}

/// `flags` are the high byte bits (unit, data type, calibration marker, algorithm)
pub fn id_word(frag_id: u16, frag_type: u8, flags: u32) -> u32 {
    (flags & 0xFF00_0000) | ((frag_type as u32) << TYPE_SHIFT) | frag_id as u32
}

/// A full ROD fragment with no status words and the given data block
pub fn rod(source_id: u32, version: u32, data: &[u32]) -> Vec<u32> {
    let mut words = vec![
        ROD_HEADER_MARKER,
        ROD_MIN_HEADER_SIZE as u32,
        version,
        source_id,
        400_000, // run number
        42,      // lvl1 id
        0x123,   // bcid
        0x81,    // lvl1 trigger type
        0x5,     // detector event type
    ];
    words.extend_from_slice(data);
    words.extend_from_slice(&[0, data.len() as u32, 0]);
    words
}

/// Wrap a ROD into a ROB with no status words and no checksum
pub fn rob(source_id: u32, rod: &[u32]) -> Vec<u32> {
    let header_size = ROB_MIN_HEADER_SIZE as u32;
    let mut words = vec![
        ROB_HEADER_MARKER,
        header_size + rod.len() as u32,
        header_size,
        0x0500_0000,
        source_id,
        0,
        0,
    ];
    words.extend_from_slice(rod);
    words
}

/// Set bit 0 when needed so that the word has odd parity
pub fn with_odd_parity(word: u32) -> u32 {
    if word.count_ones() % 2 == 1 {
        word
    } else {
        word ^ 1
    }
}

/// A DMU header word which passes the format and parity checks
pub fn good_dmu_header(gain_bits: u32, bcid: u32) -> u32 {
    // bit 16 is unused by the decoder, so it carries the parity fix instead of the bcid
    let word = (1 << DMU_FORMAT_BIT) | ((gain_bits & 0x7) << DMU_GAIN_SHIFT) | (bcid & DMU_BCID_MASK);
    if word.count_ones() % 2 == 1 {
        word
    } else {
        word | (1 << 16)
    }
}

/// Pack three 10-bit samples into one digits word
pub fn sample_word(s0: u32, s1: u32, s2: u32) -> u32 {
    (s0 & SAMPLE_MASK) | ((s1 & SAMPLE_MASK) << SAMPLE_BITS) | ((s2 & SAMPLE_MASK) << (2 * SAMPLE_BITS))
}

/// A type 0x2 raw channel word
pub fn raw_channel_word(gain: u32, amplitude: i16, time: i8, quality: u32) -> u32 {
    (gain << 31) | ((amplitude as u16 as u32) << 15) | ((time as u8 as u32) << 7) | (quality & 0x7F)
}

/// A type 0x4 DSP raw channel word
pub fn dsp_channel_word(gain: u32, amplitude: i16, time: i16, quality: u32) -> u32 {
    (gain << 31)
        | ((amplitude as u16 as u32) << 15)
        | ((time as u16 as u32 & 0x7FF) << 4)
        | (quality & 0xF)
}
