use fxhash::FxHashMap;

use super::constants::*;
use super::diagnostics::Diagnostics;
use super::error::{RobFragmentError, RodFragmentError};
use super::word_stream::WordStream;

/// The fixed part of a ROD header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RodHeader {
    pub header_size: usize,
    pub version: u32,
    pub source_id: u32,
    pub run_number: u32,
    pub lvl1_id: u32,
    pub bcid: u32,
    pub lvl1_type: u32,
    pub det_ev_type: u32,
}

impl RodHeader {
    /// The minor version, which decides the sub-fragment layout
    pub fn minor_version(&self) -> u32 {
        self.version & 0xFFFF
    }

    fn is_laser_crate(&self) -> bool {
        self.source_id <= LASER_CRATE_MAX_SOURCE
    }
}

/// RodFragment is a parsed view over one ROD fragment.
///
/// The header is decoded eagerly. The data block is located using the trailer, with
/// recovery from inconsistent sizes; every recovery is counted as a warning and, for
/// detector RODs, flagged through `size_error`.
#[derive(Debug, Clone, Copy)]
pub struct RodFragment<'a> {
    pub header: RodHeader,
    data: &'a [u32],
    status: &'a [u32],
    pub size_error: bool,
}

impl<'a> RodFragment<'a> {
    pub fn parse(words: &'a [u32], diag: &Diagnostics) -> Result<Self, RodFragmentError> {
        let size = words.len();
        if size < ROD_MIN_HEADER_SIZE {
            return Err(RodFragmentError::TooSmall(size));
        }
        if words[0] != ROD_HEADER_MARKER {
            return Err(RodFragmentError::BadMarker(words[0]));
        }
        if (words[1] as usize) < ROD_MIN_HEADER_SIZE {
            return Err(RodFragmentError::BadHeaderSize(words[1]));
        }

        let header = RodHeader {
            header_size: words[1] as usize,
            version: words[2],
            source_id: words[3],
            run_number: words[4],
            lvl1_id: words[5],
            bcid: words[6],
            lvl1_type: words[7],
            det_ev_type: words[8],
        };

        let mut frag = Self {
            header,
            data: &[],
            status: &[],
            size_error: false,
        };
        frag.locate_blocks(words, diag);
        Ok(frag)
    }

    /// Find the data and status blocks, recovering what we can from a bad trailer
    fn locate_blocks(&mut self, words: &'a [u32], diag: &Diagnostics) {
        let size = words.len();
        let header_size = self.header.header_size;
        let source_id = self.header.source_id;

        if header_size >= size {
            if diag.warning() {
                spdlog::warn!(
                    "ROD {:#x}: header size {} is not smaller than fragment size {}; assuming no data",
                    source_id,
                    header_size,
                    size
                );
            }
            self.flag_size_error();
            return;
        }

        if header_size + ROD_TRAILER_SIZE > size {
            if diag.warning() {
                spdlog::warn!(
                    "ROD {:#x}: no room for the trailer in {} words; assuming data fills the fragment",
                    source_id,
                    size
                );
            }
            self.data = &words[header_size..];
            self.flag_size_error();
            return;
        }

        let mut n_status = words[size - 3] as usize;
        let mut n_data = words[size - 2] as usize;
        let status_first = words[size - 1] == 0;
        let room = size - header_size - ROD_TRAILER_SIZE;

        if n_data > 0 && n_data < ROD_TRAILER_SIZE {
            if diag.warning() {
                spdlog::warn!("ROD {:#x}: only {} data words; assuming no data", source_id, n_data);
            }
            self.flag_size_error();
            n_data = 0;
        }

        if n_data > room {
            let excess = n_data - room;
            let data_end = if excess < ROD_TRAILER_SIZE {
                if diag.warning() {
                    spdlog::warn!(
                        "ROD {:#x}: data size {} exceeds room {}; assuming a shortened trailer",
                        source_id,
                        n_data,
                        room
                    );
                }
                header_size + n_data
            } else {
                if diag.warning() {
                    spdlog::warn!(
                        "ROD {:#x}: data size {} exceeds room {}; assuming no trailer",
                        source_id,
                        n_data,
                        room
                    );
                }
                size
            };
            self.data = &words[header_size..data_end];
            self.flag_size_error();
            return;
        }

        if n_status + n_data > room {
            // The status block cannot fit next to the data, so it is read as data
            if status_first && diag.warning() {
                spdlog::warn!(
                    "ROD {:#x}: {} status words do not fit next to {} data words; reading them as data",
                    source_id,
                    n_status,
                    n_data
                );
            }
            n_status = 0;
            self.flag_size_error();
        }

        let (status_start, data_start) = if status_first {
            (header_size, header_size + n_status)
        } else {
            (header_size + n_data, header_size)
        };
        self.status = &words[status_start..status_start + n_status];
        self.data = &words[data_start..data_start + n_data];
    }

    fn flag_size_error(&mut self) {
        if !self.header.is_laser_crate() {
            self.size_error = true;
        }
    }

    pub fn data(&self) -> &'a [u32] {
        self.data
    }

    pub fn status(&self) -> &'a [u32] {
        self.status
    }

    /// Bits merged into the fragment metadata (the size error bit, if set)
    pub fn error_bits(&self) -> u32 {
        if self.size_error {
            ROD_SIZE_ERROR
        } else {
            0
        }
    }
}

/// A ROB fragment wrapping one ROD
#[derive(Debug, Clone, Copy)]
pub struct RobFragment<'a> {
    pub source_id: u32,
    pub version: u32,
    pub status: &'a [u32],
    pub checksum_type: u32,
    rod: &'a [u32],
}

impl<'a> RobFragment<'a> {
    /// Parse the ROB at the start of `words`. Returns the fragment and the number of words it spans.
    pub fn parse(words: &'a [u32]) -> Result<(Self, usize), RobFragmentError> {
        let mut stream = WordStream::new(words);
        let marker = stream.read()?;
        if marker != ROB_HEADER_MARKER {
            return Err(RobFragmentError::BadMarker(marker));
        }
        let total_size = stream.read()? as usize;
        let header_size = stream.read()? as usize;
        let version = stream.read()?;
        let source_id = stream.read()?;
        let n_status = stream.read()? as usize;

        if total_size > words.len() {
            return Err(RobFragmentError::BadSize {
                declared: total_size,
                available: words.len(),
            });
        }
        if header_size < ROB_MIN_HEADER_SIZE + n_status || header_size > total_size {
            return Err(RobFragmentError::BadHeaderSize(header_size));
        }
        let status = stream.take(n_status)?;
        let checksum_type = stream.read()?;
        let rod_end = if checksum_type != 0 {
            total_size.saturating_sub(1).max(header_size)
        } else {
            total_size
        };

        Ok((
            Self {
                source_id,
                version,
                status,
                checksum_type,
                rod: &words[header_size..rod_end],
            },
            total_size,
        ))
    }

    pub fn rod_words(&self) -> &'a [u32] {
        self.rod
    }

    pub fn rod(&self, diag: &Diagnostics) -> Result<RodFragment<'a>, RodFragmentError> {
        RodFragment::parse(self.rod, diag)
    }
}

/// RawEvent indexes the ROB fragments of one event buffer by source id
#[derive(Debug, Clone, Default)]
pub struct RawEvent<'a> {
    robs: FxHashMap<u32, RobFragment<'a>>,
    order: Vec<u32>,
}

impl<'a> RawEvent<'a> {
    /// Index every ROB in the buffer. A malformed ROB stops the scan; the ROBs before it are kept.
    pub fn from_words(words: &'a [u32], diag: &Diagnostics) -> Self {
        let mut event = Self::default();
        let mut pos = 0;
        while pos < words.len() {
            match RobFragment::parse(&words[pos..]) {
                Ok((rob, size)) if size > 0 => {
                    if event.robs.insert(rob.source_id, rob).is_none() {
                        event.order.push(rob.source_id);
                    } else if diag.warning() {
                        spdlog::warn!("Duplicate ROB {:#x} in event; keeping the last one", rob.source_id);
                    }
                    pos += size;
                }
                Ok(_) => {
                    if diag.error() {
                        spdlog::error!("ROB at word {} declares zero size; stopping the scan", pos);
                    }
                    break;
                }
                Err(e) => {
                    if diag.error() {
                        spdlog::error!("Bad ROB at word {}: {}; stopping the scan", pos, e);
                    }
                    break;
                }
            }
        }
        event
    }

    pub fn rob(&self, source_id: u32) -> Option<&RobFragment<'a>> {
        self.robs.get(&source_id)
    }

    /// ROBs in buffer order
    pub fn robs(&self) -> impl Iterator<Item = &RobFragment<'a>> {
        self.order.iter().filter_map(|id| self.robs.get(id))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Run number of the first ROD that parses
    pub fn run_number(&self, diag: &Diagnostics) -> Option<u32> {
        self.robs()
            .find_map(|rob| rob.rod(diag).ok())
            .map(|rod| rod.header.run_number)
    }
}
