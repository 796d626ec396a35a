use super::reco::missing_channel;
use super::{check_gain_sets, UnpackContext, Unpacked};
use crate::constants::*;
use crate::error::UnpackError;
use crate::records::{ChannelSample, ReconstructedChannel};

/// Fields of one compressed channel
#[derive(Debug, Clone, Copy, PartialEq)]
struct CompressedChannel {
    gain_bit: u32,
    amplitude: i32,
    time: i8,
    pedestal: u32,
    residuals: [i32; COMPRESSED_SAMPLES],
    quality: u32,
}

impl CompressedChannel {
    fn new(first: u32, second: u32) -> Self {
        let mut residuals = [0; COMPRESSED_SAMPLES];
        for (i, r) in residuals.iter_mut().enumerate() {
            // 4-bit signed
            *r = ((((second >> (4 * i)) & 0xF) << 28) as i32) >> 28;
        }
        Self {
            gain_bit: first >> 31,
            amplitude: ((((first >> 16) & 0x7FFF) << 17) as i32) >> 17,
            time: ((first >> 8) & 0xFF) as u8 as i8,
            pedestal: first & 0xFF,
            residuals,
            quality: second >> 28,
        }
    }
}

/// Type 0x5: `48·G` word pairs holding a reconstructed channel and the residuals of its
/// samples. Both the channel and the rebuilt digits are returned.
pub fn unpack_compressed(ctx: &UnpackContext, payload: &[u32]) -> Result<Unpacked, UnpackError> {
    let expected = check_gain_sets(ctx, payload.len(), 2)? / 2;
    if payload.len() < 2 * expected && ctx.diag.warning() {
        spdlog::warn!(
            "Compressed frag {:#x}: {} words instead of {}, missing channels filled",
            ctx.frag_id(),
            payload.len(),
            2 * expected
        );
    }
    let (unit, _) = ctx.header.unit_and_method();
    let weights = ctx.weights.for_frag(unit, ctx.frag_id());

    let mut out = Unpacked::new();
    out.meta.check_payload(payload);
    let mut pairs = payload.chunks_exact(2);
    for position in 0..expected {
        let Some(pair) = pairs.next() else {
            out.channels.push(missing_channel(ctx, position, unit));
            continue;
        };
        let fields = CompressedChannel::new(pair[0], pair[1]);
        let (channel, gain) = ctx.locate(position, fields.gain_bit);
        let factor = DSP_AMPLITUDE_FACTOR[unit.base_code()][gain.index()] / 2.0;
        let amplitude = fields.amplitude as f32 / factor;
        let pedestal = fields.pedestal as f32;

        let mut reco = ReconstructedChannel::new(
            channel,
            gain,
            amplitude,
            fields.time as f32 / COMPRESSED_TIME_FACTOR,
            fields.quality as f32,
            unit,
        );
        reco.pedestal = pedestal;
        out.channels.push(reco);

        if let Some(weights) = &weights {
            let samples = fields
                .residuals
                .iter()
                .enumerate()
                .map(|(i, r)| {
                    let value = weights.sample(gain.index(), pedestal, amplitude, i) + *r as f32;
                    value.round().clamp(0.0, SAMPLE_MASK as f32) as u16
                })
                .collect();
            out.digits.push(ChannelSample::new(channel, gain, samples));
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use super::*;
    use crate::hardware_id::DrawerMode;
    use crate::records::Gain;
    use crate::test_support::id_word;

    fn pair(gain: u32, amplitude: i32, time: i8, pedestal: u32, residuals: [i32; 7], quality: u32) -> [u32; 2] {
        let first = (gain << 31)
            | (((amplitude as u32) & 0x7FFF) << 16)
            | ((time as u8 as u32) << 8)
            | (pedestal & 0xFF);
        let second = residuals
            .iter()
            .enumerate()
            .fold(quality << 28, |w, (i, r)| w | (((*r as u32) & 0xF) << (4 * i)));
        [first, second]
    }

    #[test]
    fn test_field_decoding() {
        let [a, b] = pair(1, -1600, -12, 200, [0, 1, -1, 7, -8, 3, -2], 5);
        let fields = CompressedChannel::new(a, b);
        assert_eq!(fields.gain_bit, 1);
        assert_eq!(fields.amplitude, -1600);
        assert_eq!(fields.time, -12);
        assert_eq!(fields.pedestal, 200);
        assert_eq!(fields.residuals, [0, 1, -1, 7, -8, 3, -2]);
        assert_eq!(fields.quality, 5);
    }

    #[test]
    fn test_keeps_channel_and_digits() {
        // online ADC counts: amplitude factor 16 / 2
        let ctx = context(id_word(0x110, 0x5, 0), DrawerMode::Normal, &DIAG);
        let payload: Vec<u32> = (0..48)
            .flat_map(|_| pair(0, 1600, 8, 40, [0, 1, -1, 2, -2, 3, -8], 2))
            .collect();
        let out = unpack_compressed(&ctx, &payload).unwrap();
        assert_eq!(out.channels.len(), 48);
        assert_eq!(out.digits.len(), 48);

        let reco = out.channels[7];
        assert_eq!((reco.channel, reco.gain), (7, Gain::Low));
        assert_eq!(reco.amplitude, 200.0);
        assert_eq!(reco.time, 2.0);
        assert_eq!(reco.pedestal, 40.0);
        assert_eq!(reco.quality, 2.0);
        assert_eq!(out.digits[7].samples, vec![40, 72, 156, 242, 156, 85, 44]);
    }

    #[test]
    fn test_truncated_pairs() {
        let ctx = context(id_word(0x110, 0x5, 0), DrawerMode::Normal, &DIAG);
        let mut payload: Vec<u32> = (0..10)
            .flat_map(|_| pair(0, 16, 0, 40, [0; 7], 0))
            .collect();
        payload.push(0x1234);
        let out = unpack_compressed(&ctx, &payload).unwrap();
        assert_eq!(out.channels.len(), 48);
        assert_eq!(out.digits.len(), 10);
        assert!(out.channels[10..].iter().all(|c| c.is_missing()));

        let ctx = context(id_word(0x110, 0x5, 0), DrawerMode::Calibration, &DIAG);
        assert!(unpack_compressed(&ctx, &vec![0x10; 96]).is_err());
    }
}
