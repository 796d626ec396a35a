use bitvec::prelude::*;

use super::{check_gain_sets, UnpackContext, Unpacked};
use crate::constants::*;
use crate::error::UnpackError;
use crate::fragment_type::RawChannelUnit;
use crate::metadata::DataQuality;
use crate::records::{Gain, ReconstructedChannel};

/// Decode a type 0x2 word: bit 31 gain, bits 15-30 amplitude, bits 7-14 time, bits 0-6 quality
fn raw_channel(ctx: &UnpackContext, position: usize, word: u32) -> ReconstructedChannel {
    let (channel, gain) = ctx.locate(position, word >> 31);
    let amplitude = ((word >> 15) & 0xFFFF) as u16 as i16;
    let time = ((word >> 7) & 0xFF) as u8 as i8;
    ReconstructedChannel::new(
        channel,
        gain,
        amplitude as f32 / RAW_AMPLITUDE_FACTOR,
        time as f32 / RAW_TIME_FACTOR,
        (word & 0x7F) as f32,
        RawChannelUnit::AdcCounts,
    )
}

/// Decode a type 0x4 word: bit 31 gain, bits 15-30 amplitude, bits 4-14 time, bits 0-3 quality
fn dsp_channel(ctx: &UnpackContext, position: usize, word: u32, unit: RawChannelUnit) -> ReconstructedChannel {
    let (channel, gain) = ctx.locate(position, word >> 31);
    let amplitude = ((word >> 15) & 0xFFFF) as u16 as i16;
    // sign-extend the 11-bit time field
    let time = ((((word >> 4) & 0x7FF) << 21) as i32) >> 21;
    ReconstructedChannel::new(
        channel,
        gain,
        amplitude as f32 / DSP_AMPLITUDE_FACTOR[unit.base_code()][gain.index()],
        time as f32 / DSP_TIME_FACTOR,
        (word & 0xF) as f32,
        unit,
    )
}

/// Placeholder for a position whose word is missing
pub(crate) fn missing_channel(ctx: &UnpackContext, position: usize, unit: RawChannelUnit) -> ReconstructedChannel {
    let (channel, gain) = ctx.locate(position, 0);
    ReconstructedChannel::missing(channel, gain, unit)
}

fn log_truncated(ctx: &UnpackContext, words: usize, expected: usize) {
    if ctx.diag.warning() {
        spdlog::warn!(
            "Frag {:#x} type {:#x}: {} words instead of {}, missing channels filled",
            ctx.frag_id(),
            ctx.header.type_code,
            words,
            expected
        );
    }
}

/// Type 0x2: one word per channel and gain set
pub fn unpack_raw_channels(ctx: &UnpackContext, payload: &[u32]) -> Result<Unpacked, UnpackError> {
    let expected = check_gain_sets(ctx, payload.len(), 1)?;
    if payload.len() < expected {
        log_truncated(ctx, payload.len(), expected);
    }
    let mut out = Unpacked::new();
    out.meta.check_payload(payload);
    out.channels = (0..expected)
        .map(|pos| match payload.get(pos) {
            Some(word) => raw_channel(ctx, pos, *word),
            None => missing_channel(ctx, pos, RawChannelUnit::AdcCounts),
        })
        .collect();
    Ok(out)
}

/// Type 0x3: `2·G` bitmap words, then one type 0x2 word per set bit
pub fn unpack_sparse_raw_channels(ctx: &UnpackContext, payload: &[u32]) -> Result<Unpacked, UnpackError> {
    let bitmap_words = 2 * ctx.gain_sets();
    if payload.len() < bitmap_words {
        return Err(UnpackError::TooShort {
            words: payload.len(),
            min: bitmap_words,
        });
    }
    let (bitmap, words) = payload.split_at(bitmap_words);
    let limit = CHANNELS_PER_DRAWER * ctx.gain_sets();
    let present: Vec<usize> = bitmap
        .view_bits::<Lsb0>()
        .iter_ones()
        .take_while(|pos| *pos < limit)
        .collect();
    if words.len() < present.len() {
        log_truncated(ctx, words.len(), present.len());
    }

    let mut out = Unpacked::new();
    out.meta.check_payload(payload);
    out.channels = present
        .iter()
        .enumerate()
        .map(|(i, pos)| match words.get(i) {
            Some(word) => raw_channel(ctx, *pos, *word),
            None => missing_channel(ctx, *pos, RawChannelUnit::AdcCounts),
        })
        .collect();
    Ok(out)
}

/// Type 0x4: one word per channel and gain set, in the unit declared by the header flags
pub fn unpack_dsp_raw_channels(ctx: &UnpackContext, payload: &[u32]) -> Result<Unpacked, UnpackError> {
    let expected = check_gain_sets(ctx, payload.len(), 1)?;
    if payload.len() < expected {
        log_truncated(ctx, payload.len(), expected);
    }
    let (unit, _) = ctx.header.unit_and_method();
    let mut out = Unpacked::new();
    out.meta.check_payload(payload);
    out.channels = (0..expected)
        .map(|pos| match payload.get(pos) {
            Some(word) => dsp_channel(ctx, pos, *word, unit),
            None => missing_channel(ctx, pos, unit),
        })
        .collect();
    if ctx.header.is_simulated() {
        out.meta.set_quality(DataQuality::all_good());
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use super::*;
    use crate::hardware_id::{DrawerFormat, DrawerKind, DrawerMode};
    use crate::test_support::{dsp_channel_word, id_word, raw_channel_word};

    #[test]
    fn test_raw_channels() {
        let ctx = context(id_word(0x10A, 0x2, 0), DrawerMode::Normal, &DIAG);
        let payload: Vec<u32> = (0..48)
            .map(|i| raw_channel_word(i % 2, 16 * i as i16 - 160, -7, i))
            .collect();
        let out = unpack_raw_channels(&ctx, &payload).unwrap();
        assert_eq!(out.channels.len(), 48);
        let ch = out.channels[3];
        assert_eq!((ch.channel, ch.gain), (3, Gain::High));
        assert_eq!(ch.amplitude, -7.0);
        assert_eq!(ch.time, -3.5);
        assert_eq!(ch.quality, 3.0);
        assert_eq!(ch.unit, RawChannelUnit::AdcCounts);
    }

    #[test]
    fn test_truncated_raw_channels_are_filled() {
        let ctx = context(id_word(0x10A, 0x2, 0), DrawerMode::Normal, &DIAG);
        let payload: Vec<u32> = (0..40).map(|i| raw_channel_word(0, 32, 2, i)).collect();
        let out = unpack_raw_channels(&ctx, &payload).unwrap();
        assert_eq!(out.channels.len(), 48);
        assert!(out.channels[..40].iter().all(|c| !c.is_missing()));
        assert!(out.channels[40..].iter().all(|c| c.is_missing()));
    }

    #[test]
    fn test_raw_channels_wrong_mode() {
        let ctx = context(id_word(0x10A, 0x2, 0), DrawerMode::Calibration, &DIAG);
        let payload = vec![raw_channel_word(0, 32, 2, 1); 48];
        assert!(matches!(
            unpack_raw_channels(&ctx, &payload),
            Err(UnpackError::InconsistentFormat { words: 48, .. })
        ));
    }

    #[test]
    fn test_sparse_raw_channels() {
        let ctx = context(id_word(0x10A, 0x3, 0), DrawerMode::Normal, &DIAG);
        // positions 1, 5 and 33
        let payload = vec![
            (1 << 1) | (1 << 5),
            1 << 1,
            raw_channel_word(0, 160, 0, 1),
            raw_channel_word(1, 320, 0, 5),
            raw_channel_word(0, 480, 0, 33),
        ];
        let out = unpack_sparse_raw_channels(&ctx, &payload).unwrap();
        let got: Vec<(usize, f32)> = out.channels.iter().map(|c| (c.channel, c.amplitude)).collect();
        assert_eq!(got, vec![(1, 10.0), (5, 20.0), (33, 30.0)]);

        let out = unpack_sparse_raw_channels(&ctx, &payload[..3]).unwrap();
        assert_eq!(out.channels.len(), 3);
        assert!(out.channels[2].is_missing());
        assert!(unpack_sparse_raw_channels(&ctx, &payload[..1]).is_err());
    }

    #[test]
    fn test_dsp_raw_channels() {
        // online pC, real data
        let ctx = context(id_word(0x10A, 0x4, 1 << 30), DrawerMode::Normal, &DIAG);
        let payload: Vec<u32> = (0..48)
            .map(|i| dsp_channel_word(i % 2, 4096, -32, 9))
            .collect();
        let out = unpack_dsp_raw_channels(&ctx, &payload).unwrap();
        let (lo, hi) = (out.channels[0], out.channels[1]);
        assert_eq!(lo.unit, RawChannelUnit::OnlinePicoCoulombs);
        assert_eq!(lo.amplitude, 128.0);
        assert_eq!(hi.amplitude, 2.0);
        assert_eq!(lo.time, -2.0);
        assert_eq!(lo.quality, 9.0);
        assert!(!out.meta.has_quality());
    }

    #[test]
    fn test_simulated_dsp_marks_dmus_good() {
        // offline MeV, simulated, fit method
        let flags = (3 << 30) | (3 << 28) | (6 << 24);
        let ctx = context(id_word(0x10A, 0x4, flags), DrawerMode::Normal, &DIAG);
        let out = unpack_dsp_raw_channels(&ctx, &[dsp_channel_word(0, 64, 0, 0); 48]).unwrap();
        assert_eq!(out.channels[0].unit, RawChannelUnit::MegaElectronVolts);
        assert_eq!(out.channels[0].amplitude, 2048.0);
        let meta = out.meta.finish(None, 0);
        assert_eq!(meta.quality, DataQuality::all_good());
        assert!(meta.status.is_ok());
        assert!(meta.global_crc_ok());
    }

    #[test]
    fn test_special_drawer_order() {
        // EBA15 swaps positions 0,1 with 18,19
        let format = DrawerFormat::new(DrawerKind::SpecialExtendedBarrel, DrawerMode::Normal);
        let ctx = context_with(id_word(0x30E, 0x4, 0), format, &DIAG);
        let payload: Vec<u32> = (0..48).map(|i| dsp_channel_word(0, 16 * i as i16, 0, 0)).collect();
        let out = unpack_dsp_raw_channels(&ctx, &payload).unwrap();
        assert_eq!(out.channels[0].channel, 18);
        assert_eq!(out.channels[0].amplitude, 0.0);
        assert_eq!(out.channels[19].channel, 1);
        assert_eq!(out.channels[19].amplitude, 19.0);
    }
}
