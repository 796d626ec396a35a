use crate::constants::*;
use crate::error::UnpackError;
use crate::hardware_id::{drawer, frag_id, ros, Partition};
use crate::records::{TmdbDecision, TmdbDigits, TmdbRawChannel};

/// The muon receiver board behind a byte-stream id `(ros << 8) | board`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TmdbBoard {
    pub ros: u16,
    pub board: u16,
}

impl TmdbBoard {
    pub fn new(bs_frag_id: u16) -> Self {
        Self {
            ros: ros(bs_frag_id),
            board: drawer(bs_frag_id),
        }
    }

    pub fn channels_per_module(&self) -> usize {
        match Partition::from_ros(self.ros) {
            Some(p) if p.is_extended_barrel() => TMDB_CHANNELS_EXTENDED_BARREL,
            _ => TMDB_CHANNELS_LONG_BARREL,
        }
    }

    pub fn channels(&self) -> usize {
        DRAWERS_PER_TMDB_BOARD as usize * self.channels_per_module()
    }

    /// Logical frag id of module `m` read by this board
    pub fn module_frag(&self, module: usize) -> u16 {
        frag_id(self.ros, self.board * DRAWERS_PER_TMDB_BOARD + module as u16)
    }

    /// Logical frag id and module channel of a board channel
    fn locate(&self, channel: usize) -> (u16, usize) {
        let per_module = self.channels_per_module();
        (self.module_frag(channel / per_module), channel % per_module)
    }
}

/// Type 0x40: 8-bit samples, four per word, sample-major over the board channels
pub fn unpack_tmdb_digits(bs_frag_id: u16, payload: &[u32]) -> Result<Vec<TmdbDigits>, UnpackError> {
    let board = TmdbBoard::new(bs_frag_id);
    let n_channels = board.channels();
    let n_bytes = 4 * payload.len();
    if n_bytes == 0 || n_bytes % n_channels != 0 {
        return Err(UnpackError::InconsistentFormat {
            words: payload.len(),
            expected: format!("a multiple of {}", n_channels / 4),
        });
    }
    let n_samples = n_bytes / n_channels;
    let byte = |i: usize| (payload[i / 4] >> (8 * (i % 4))) as u8;
    Ok((0..n_channels)
        .map(|c| {
            let (frag_id, channel) = board.locate(c);
            TmdbDigits {
                frag_id,
                channel,
                samples: (0..n_samples).map(|s| byte(s * n_channels + c)).collect(),
            }
        })
        .collect())
}

/// Type 0x41: one f32 energy per board channel
pub fn unpack_tmdb_raw_channels(bs_frag_id: u16, payload: &[u32]) -> Result<Vec<TmdbRawChannel>, UnpackError> {
    let board = TmdbBoard::new(bs_frag_id);
    if payload.len() != board.channels() {
        return Err(UnpackError::InconsistentFormat {
            words: payload.len(),
            expected: board.channels().to_string(),
        });
    }
    Ok(payload
        .iter()
        .enumerate()
        .map(|(c, word)| {
            let (frag_id, channel) = board.locate(c);
            TmdbRawChannel {
                frag_id,
                channel,
                energy: f32::from_bits(*word),
            }
        })
        .collect())
}

/// Type 0x42: four decision bits per module, LSB first
pub fn unpack_tmdb_decisions(bs_frag_id: u16, payload: &[u32]) -> Result<Vec<TmdbDecision>, UnpackError> {
    let board = TmdbBoard::new(bs_frag_id);
    let word = payload
        .first()
        .copied()
        .ok_or(UnpackError::TooShort { words: 0, min: 1 })?;
    Ok((0..DRAWERS_PER_TMDB_BOARD as usize)
        .map(|m| {
            let nibble = word >> (TMDB_DECISION_BITS * m);
            TmdbDecision {
                frag_id: board.module_frag(m),
                bits: [0, 1, 2, 3].map(|k| (nibble >> k) & 1 == 1),
            }
        })
        .collect())
}
