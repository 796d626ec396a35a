use super::{UnpackContext, Unpacked};
use crate::constants::*;
use crate::error::UnpackError;
use crate::metadata::DmuHeader;
use crate::records::{ChannelSample, Gain};
use crate::word_stream::WordStream;

/// Type 0x0: `16·G` DMU blocks `[header][nsamp sample words][crc]` and up to 3 trailer words.
/// The sample count is derived from the payload length.
pub fn unpack_digits(ctx: &UnpackContext, payload: &[u32]) -> Result<Unpacked, UnpackError> {
    let blocks = DMUS_PER_DRAWER * ctx.gain_sets();
    let n_samples = ALLOWED_SAMPLE_COUNTS
        .iter()
        .copied()
        .find(|n| {
            let body = blocks * (n + 2);
            payload.len() >= body && payload.len() - body <= MAX_DIGITS_TRAILER_WORDS
        })
        .ok_or_else(|| UnpackError::InconsistentFormat {
            words: payload.len(),
            expected: format!("{blocks} DMU blocks of {ALLOWED_SAMPLE_COUNTS:?} samples"),
        })?;

    let block_size = n_samples + 2;
    let mut out = Unpacked::new();
    out.meta.check_payload(payload);
    for (b, block) in payload.chunks_exact(block_size).take(blocks).enumerate() {
        let header = DmuHeader(block[0]);
        out.meta
            .add_dmu(block[0], block[block_size - 1], b >= DMUS_PER_DRAWER);
        let masked = ctx.mask_bad_digits && !header.is_good();
        let sample_words = &block[1..=n_samples];
        for k in 0..CHANNELS_PER_DMU {
            let (channel, gain) = ctx.locate(b * CHANNELS_PER_DMU + k, header.gain(k) as u32);
            let samples = sample_words
                .iter()
                .map(|w| {
                    if masked {
                        0
                    } else {
                        ((w >> (SAMPLE_BITS * k as u32)) & SAMPLE_MASK) as u16
                    }
                })
                .collect();
            out.digits.push(ChannelSample::new(channel, gain, samples));
        }
    }

    let trailer = &payload[blocks * block_size..];
    out.meta.set_digits_summary(
        payload.len() as u32 + ctx.overhead,
        DmuHeader(payload[0]).bcid(),
        trailer.first().copied().unwrap_or(0),
        trailer,
    );
    Ok(out)
}

/// Type 0x1: blocks `[position, gain, n][ceil(n/3) sample words]` for the channels present.
/// A bad block ends the parse; what was read before it is kept.
pub fn unpack_sparse_digits(ctx: &UnpackContext, payload: &[u32]) -> Result<Unpacked, UnpackError> {
    let mut out = Unpacked::new();
    out.meta.check_payload(payload);
    let mut stream = WordStream::new(payload);
    while !stream.is_empty() {
        let word = stream.read()?;
        let position = (word & 0xFF) as usize;
        let gain = Gain::from_bit(word >> 8);
        let n_samples = ((word >> 16) & 0xFF) as usize;
        if position >= CHANNELS_PER_DRAWER {
            if ctx.diag.error() {
                spdlog::error!(
                    "Sparse digits of frag {:#x}: channel position {} out of range",
                    ctx.frag_id(),
                    position
                );
            }
            break;
        }
        let words = match stream.take(n_samples.div_ceil(CHANNELS_PER_DMU)) {
            Ok(words) => words,
            Err(e) => {
                if ctx.diag.error() {
                    spdlog::error!("Sparse digits of frag {:#x} truncated: {}", ctx.frag_id(), e);
                }
                break;
            }
        };
        let samples = (0..n_samples)
            .map(|i| {
                let shift = SAMPLE_BITS * (i % CHANNELS_PER_DMU) as u32;
                ((words[i / CHANNELS_PER_DMU] >> shift) & SAMPLE_MASK) as u16
            })
            .collect();
        out.digits
            .push(ChannelSample::new(ctx.order.channel(position), gain, samples));
    }
    Ok(out)
}

/// Type 0x6: four mini-drawers `[header][12 channels × 2 gains × nsamp/2 words]`, two
/// 12-bit samples per word. Both gains are always present.
pub fn unpack_extended_digits(ctx: &UnpackContext, payload: &[u32]) -> Result<Unpacked, UnpackError> {
    let per_pair = 2 * CHANNELS_PER_MINI_DRAWER * MINI_DRAWERS;
    let body = payload.len().saturating_sub(MINI_DRAWERS);
    if body == 0 || body % per_pair != 0 {
        return Err(UnpackError::InconsistentFormat {
            words: payload.len(),
            expected: format!("{MINI_DRAWERS} + n * {per_pair}"),
        });
    }
    let words_per_gain = body / per_pair;
    let md_size = 1 + 2 * CHANNELS_PER_MINI_DRAWER * words_per_gain;

    let mut out = Unpacked::new();
    out.meta.check_payload(payload);
    let mut headers = Vec::with_capacity(MINI_DRAWERS);
    for (md, block) in payload.chunks_exact(md_size).enumerate() {
        headers.push(block[0]);
        for (i, words) in block[1..].chunks_exact(words_per_gain).enumerate() {
            let position = md * CHANNELS_PER_MINI_DRAWER + i / 2;
            let samples = words
                .iter()
                .flat_map(|w| [w & EXTENDED_SAMPLE_MASK, (w >> 16) & EXTENDED_SAMPLE_MASK])
                .map(|s| s as u16)
                .collect();
            out.digits.push(ChannelSample::new(
                ctx.order.channel(position),
                Gain::from_bit(i as u32),
                samples,
            ));
        }
    }
    out.meta.set_digits_summary(
        payload.len() as u32 + ctx.overhead,
        headers[0] & DMU_BCID_MASK,
        0,
        &headers,
    );
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use super::*;
    use crate::diagnostics::Diagnostics;
    use crate::hardware_id::DrawerMode;
    use crate::metadata::FragmentStatus;
    use crate::test_support::{good_dmu_header, id_word, sample_word};

    /// DMU d carries samples (d, s, 100+d) for sample index s
    fn digits_payload(blocks: usize, n_samples: usize, gain_bits: u32, trailer: &[u32]) -> Vec<u32> {
        let mut words = Vec::new();
        for b in 0..blocks {
            words.push(good_dmu_header(gain_bits, 0x2A));
            for s in 0..n_samples {
                words.push(sample_word(b as u32, s as u32, 100 + b as u32));
            }
            words.push(0xC0C0);
        }
        words.extend_from_slice(trailer);
        words
    }

    #[test]
    fn test_normal_mode() {
        let ctx = context(id_word(0x105, 0x0, 0), DrawerMode::Normal, &DIAG);
        let payload = digits_payload(16, 7, 0b010, &[0x0003_0003]);
        let out = unpack_digits(&ctx, &payload).unwrap();
        assert_eq!(out.digits.len(), 48);
        let ch = out.digits.iter().find(|d| d.channel == 31).unwrap();
        // channel 31 is the second channel of DMU 10
        assert_eq!(ch.gain, Gain::High);
        assert_eq!(ch.samples, vec![0, 1, 2, 3, 4, 5, 6]);
        let ch = out.digits.iter().find(|d| d.channel == 32).unwrap();
        assert_eq!(ch.gain, Gain::Low);
        assert!(ch.samples.iter().all(|s| *s == 110));

        let meta = out.meta.finish(None, 0);
        assert_eq!(meta.dmu_headers.len(), 16);
        assert!(meta.dmu_headers_high.is_empty());
        assert_eq!(meta.crc_mask, 0x0003_0003);
        assert_eq!(meta.bcid, 0x2A);
        assert_eq!(meta.frag_size, payload.len() as u32 + MARKED_OVERHEAD);
        assert!(meta.status.is_ok());
    }

    #[test]
    fn test_calibration_mode_doubles_records() {
        let ctx = context(id_word(0x105, 0x0, 0), DrawerMode::Calibration, &DIAG);
        let payload = digits_payload(32, 9, 0, &[]);
        let out = unpack_digits(&ctx, &payload).unwrap();
        assert_eq!(out.digits.len(), 96);
        for channel in 0..48 {
            let gains: Vec<Gain> = out
                .digits
                .iter()
                .filter(|d| d.channel == channel)
                .map(|d| d.gain)
                .collect();
            assert_eq!(gains, vec![Gain::Low, Gain::High]);
        }
        let meta = out.meta.finish(None, 0);
        assert_eq!(meta.dmu_headers.len(), 16);
        assert_eq!(meta.dmu_headers_high.len(), 16);
    }

    #[test]
    fn test_bad_sample_count() {
        let ctx = context(id_word(0x105, 0x0, 0), DrawerMode::Normal, &DIAG);
        let payload = digits_payload(16, 8, 0, &[]);
        assert!(matches!(
            unpack_digits(&ctx, &payload),
            Err(UnpackError::InconsistentFormat { .. })
        ));
        // a normal-mode payload read as calibration mode
        let ctx = context(id_word(0x105, 0x0, 0), DrawerMode::Calibration, &DIAG);
        let payload = digits_payload(16, 7, 0, &[]);
        assert!(unpack_digits(&ctx, &payload).is_err());
    }

    #[test]
    fn test_crc_mismatch_keeps_data() {
        let ctx = context(id_word(0x105, 0x0, 0), DrawerMode::Normal, &DIAG);
        let payload = digits_payload(16, 7, 0, &[0x0001_0000]);
        let out = unpack_digits(&ctx, &payload).unwrap();
        assert_eq!(out.digits.len(), 48);
        let meta = out.meta.finish(None, 0);
        assert!(meta.status.contains(FragmentStatus::CRC_ERROR));
    }

    #[test]
    fn test_bad_dmu_masking() {
        let mut payload = digits_payload(16, 7, 0, &[]);
        // DMU 2 loses its format bit
        payload[2 * 9] &= !(1 << DMU_FORMAT_BIT);
        let mut ctx = context(id_word(0x105, 0x0, 0), DrawerMode::Normal, &DIAG);
        let out = unpack_digits(&ctx, &payload).unwrap();
        assert!(out.digits[6].samples.iter().all(|s| *s == 2));
        let meta = out.meta.finish(None, 0);
        assert_eq!(meta.suspect_dmus(), 1 << 2);
        assert!(meta.is_channel_suspect(7));

        ctx.mask_bad_digits = true;
        let out = unpack_digits(&ctx, &payload).unwrap();
        assert!(out.digits[6].samples.iter().all(|s| *s == 0));
        assert!(out.digits[9].samples.iter().all(|s| *s == 3));
    }

    #[test]
    fn test_sparse_digits() {
        let diag: &'static Diagnostics = Box::leak(Box::new(Diagnostics::default()));
        let ctx = context(id_word(0x105, 0x1, 0), DrawerMode::Normal, diag);
        let payload = vec![
            (4 << 16) | (1 << 8) | 7,
            sample_word(10, 11, 12),
            sample_word(13, 0, 0),
            (2 << 16) | 40,
            sample_word(1, 2, 0),
        ];
        let out = unpack_sparse_digits(&ctx, &payload).unwrap();
        assert_eq!(
            out.digits,
            vec![
                ChannelSample::new(7, Gain::High, vec![10, 11, 12, 13]),
                ChannelSample::new(40, Gain::Low, vec![1, 2]),
            ]
        );
        assert_eq!(diag.error_count(), 0);

        // position out of range stops the parse
        let payload = vec![(1 << 16) | 3, sample_word(5, 0, 0), (1 << 16) | 48, 0];
        let out = unpack_sparse_digits(&ctx, &payload).unwrap();
        assert_eq!(out.digits.len(), 1);
        assert_eq!(diag.error_count(), 1);

        // truncated block
        let payload = vec![(7 << 16) | 3, sample_word(5, 0, 0)];
        let out = unpack_sparse_digits(&ctx, &payload).unwrap();
        assert!(out.digits.is_empty());
        assert_eq!(diag.error_count(), 2);
    }

    #[test]
    fn test_extended_digits() {
        let ctx = context(id_word(0x105, 0x6, 0), DrawerMode::Normal, &DIAG);
        // 4 samples: 2 words per channel and gain
        let mut payload = Vec::new();
        for md in 0..4u32 {
            payload.push(0xA000 | md);
            for ch in 0..12u32 {
                for gain in 0..2u32 {
                    let v = md * 100 + ch * 2 + gain;
                    payload.push((v + 1) << 16 | v);
                    payload.push((v + 3) << 16 | (v + 2));
                }
            }
        }
        let out = unpack_extended_digits(&ctx, &payload).unwrap();
        assert_eq!(out.digits.len(), 96);
        let rec = out
            .digits
            .iter()
            .find(|d| d.channel == 14 && d.gain == Gain::High)
            .unwrap();
        // mini-drawer 1, channel 2, high gain
        assert_eq!(rec.samples, vec![105, 106, 107, 108]);
        let meta = out.meta.finish(None, 0);
        assert_eq!(meta.extra_words, vec![0xA000, 0xA001, 0xA002, 0xA003]);

        assert!(unpack_extended_digits(&ctx, &payload[..payload.len() - 1]).is_err());
        assert!(unpack_extended_digits(&ctx, &[0, 0, 0, 0]).is_err());
    }
}
