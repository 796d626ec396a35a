use super::constants::*;
use super::diagnostics::Diagnostics;
use super::fragment_type::SubFragmentHeader;

/// One candidate sub-fragment found in a ROD data block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubFragment<'a> {
    /// Position of the size word in the ROD data block
    pub offset: usize,
    /// Declared word count, overhead included
    pub count: u32,
    pub overhead: u32,
    pub id_and_type: u32,
    /// The `count - overhead` words after the id+type word
    pub payload: &'a [u32],
}

impl SubFragment<'_> {
    pub fn header(&self, beam: bool) -> SubFragmentHeader {
        SubFragmentHeader::new(self.id_and_type, beam)
    }
}

/// Totals of a completed scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScanSummary {
    pub consumed: usize,
    pub declared: usize,
    pub corrupted: u32,
}

impl ScanSummary {
    pub fn is_consistent(&self) -> bool {
        self.consumed == self.declared
    }
}

/// SubFragmentScanner walks a ROD data block and yields its sub-fragments.
///
/// The layout is chosen from the first word: a separator marker means every sub-fragment
/// carries a 3-word overhead (marker, size, id+type), otherwise the legacy 2-word overhead.
/// A sub-fragment whose declared size is impossible is skipped by re-synchronizing on the
/// next marker. The scanner is `Clone`, so a scan can be restarted from any point.
#[derive(Debug, Clone)]
pub struct SubFragmentScanner<'a> {
    data: &'a [u32],
    diag: &'a Diagnostics,
    pos: usize,
    word_count: usize,
    overhead: u32,
    corrupted: u32,
    source_id: u32,
}

impl<'a> SubFragmentScanner<'a> {
    pub fn new(data: &'a [u32], version: u32, source_id: u32, diag: &'a Diagnostics) -> Self {
        let mut overhead = LEGACY_OVERHEAD;
        let mut pos = 0;
        if let Some(&first) = data.first() {
            let mut marked = first == SUB_FRAGMENT_MARKER;
            if first == SUB_FRAGMENT_MARKER_BUGGY {
                marked = true;
                if diag.warning() {
                    spdlog::warn!(
                        "Near-miss frag separator {:#010x} in ROD {:#x}",
                        first,
                        source_id
                    );
                }
            }
            if !marked && (version & 0xFFFF) > MARKED_LAYOUT_MIN_VERSION {
                marked = true;
                if diag.warning() {
                    spdlog::warn!(
                        "Corrupted frag separator {:#010x} instead of {:#010x} in ROD {:#x}",
                        first,
                        SUB_FRAGMENT_MARKER,
                        source_id
                    );
                }
            }
            if marked {
                // The first marker is not part of the word count
                pos = 1;
                overhead = MARKED_OVERHEAD;
            }
        }
        Self {
            data,
            diag,
            pos,
            word_count: 0,
            overhead,
            corrupted: 0,
            source_id,
        }
    }

    pub fn overhead(&self) -> u32 {
        self.overhead
    }

    pub fn is_marked(&self) -> bool {
        self.overhead == MARKED_OVERHEAD
    }

    /// Skip forward to just past the next marker, or to the end of the data
    fn resync(&mut self) -> usize {
        let mut skipped = 0;
        while self.word_count < self.data.len() {
            let word = self.data.get(self.pos).copied();
            self.pos += 1;
            self.word_count += 1;
            skipped += 1;
            if word == Some(SUB_FRAGMENT_MARKER) {
                break;
            }
        }
        skipped
    }

    /// Run the scan to the end and report the totals. A word-count mismatch is logged as an error.
    pub fn finish(mut self) -> ScanSummary {
        while self.next().is_some() {}
        let summary = ScanSummary {
            consumed: self.word_count,
            declared: self.data.len(),
            corrupted: self.corrupted,
        };
        if !summary.is_consistent() && self.diag.error() {
            spdlog::error!(
                "Incorrect ROD size in {:#x}: {} words instead of {}",
                self.source_id,
                summary.consumed,
                summary.declared
            );
        }
        summary
    }
}

impl<'a> Iterator for SubFragmentScanner<'a> {
    type Item = SubFragment<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let size = self.data.len();
        while self.word_count < size {
            let count = *self.data.get(self.pos)?;
            let id_and_type = *self.data.get(self.pos + 1)?;
            let remaining = size - self.word_count;

            if count < self.overhead || count as usize > remaining {
                self.corrupted += 1;
                let skipped = self.resync();
                if self.diag.error() {
                    let frag = SubFragmentHeader::new(id_and_type, false).frag_id;
                    if self.word_count < size {
                        spdlog::warn!(
                            "Frag {:#x} has unexpected size {}; skipping {} words to the next frag",
                            frag,
                            count,
                            skipped
                        );
                    } else {
                        spdlog::warn!(
                            "Frag {:#x} has unexpected size {}; ignoring {} words till the end of ROD frag",
                            frag,
                            count,
                            skipped
                        );
                    }
                }
                continue;
            }

            let start = self.pos + 2;
            let end = start + (count - self.overhead) as usize;
            let payload = self.data.get(start..end.min(size)).unwrap_or(&[]);
            let frag = SubFragment {
                offset: self.pos,
                count,
                overhead: self.overhead,
                id_and_type,
                payload,
            };
            self.pos += count as usize;
            self.word_count += count as usize;
            return Some(frag);
        }
        None
    }
}
