// The cabling description lists the drawers whose readout differs from what the
// frag id arithmetic gives: special extended barrel modules, demonstrator drawers,
// drawers running in calibration mode, and drawers read out under another
// byte-stream id. Each row is valid for a run range so that cabling changes across
// run eras can live in one file.
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use super::error::CablingError;
use super::hardware_id::{DrawerKind, DrawerMode};

const ENTRIES_PER_LINE: usize = 6; //frag_id,bs_frag_id,kind,mode,first_run,last_run

/// Load the default cabling for windows
#[cfg(target_family = "windows")]
fn load_default_cabling() -> String {
    String::from(include_str!("data\\default_cabling.csv"))
}

/// Load the default cabling for macos and linux
#[cfg(target_family = "unix")]
fn load_default_cabling() -> String {
    String::from(include_str!("data/default_cabling.csv"))
}

/// Parse a decimal or 0x-prefixed hexadecimal integer
fn parse_u16(s: &str) -> Result<u16, CablingError> {
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => Ok(u16::from_str_radix(hex, 16)?),
        None => Ok(s.parse()?),
    }
}

/// One override row of the cabling description
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CablingEntry {
    pub frag_id: u16,
    pub bs_frag_id: u16,
    pub kind: DrawerKind,
    pub mode: DrawerMode,
    pub first_run: u32,
    pub last_run: u32,
}

impl CablingEntry {
    pub fn covers(&self, run: u32) -> bool {
        self.first_run <= run && run <= self.last_run
    }

    fn overlaps(&self, other: &Self) -> bool {
        self.frag_id == other.frag_id
            && self.first_run <= other.last_run
            && other.first_run <= self.last_run
    }
}

/// CablingDescription is the static table the identity map is built from.
///
/// The table is read from a CSV file with *no* whitespace and a header line.
/// If no path is given the description bundled with the library is used.
#[derive(Debug, Clone, Default)]
pub struct CablingDescription {
    entries: Vec<CablingEntry>,
}

impl CablingDescription {
    /// Create a new CablingDescription
    /// If the path is None, we load the default that is bundled with the library
    pub fn new(path: Option<&Path>) -> Result<Self, CablingError> {
        let mut contents = String::new();
        if let Some(p) = path {
            let mut file = File::open(p)?;
            file.read_to_string(&mut contents)?;
        } else {
            contents = load_default_cabling();
        }
        Self::from_str(&contents)
    }

    /// The rows active for a run, at most one per frag id
    pub fn active(&self, run: u32) -> impl Iterator<Item = &CablingEntry> {
        self.entries.iter().filter(move |e| e.covers(run))
    }

    pub fn entries(&self) -> &[CablingEntry] {
        &self.entries
    }

    pub fn push(&mut self, entry: CablingEntry) -> Result<(), CablingError> {
        if entry.last_run < entry.first_run {
            return Err(CablingError::BadRunRange(entry.frag_id));
        }
        if self.entries.iter().any(|e| e.overlaps(&entry)) {
            return Err(CablingError::OverlappingRuns(entry.frag_id));
        }
        self.entries.push(entry);
        Ok(())
    }
}

impl FromStr for CablingDescription {
    type Err = CablingError;

    fn from_str(contents: &str) -> Result<Self, Self::Err> {
        let mut cabling = Self::default();
        let mut lines = contents.lines();
        lines.next(); // Skip the header
        for line in lines {
            if line.trim().is_empty() {
                continue;
            }
            let entries: Vec<&str> = line.trim().split_terminator(',').collect();
            if entries.len() != ENTRIES_PER_LINE {
                return Err(CablingError::BadFileFormat);
            }
            cabling.push(CablingEntry {
                frag_id: parse_u16(entries[0])?,
                bs_frag_id: parse_u16(entries[1])?,
                kind: DrawerKind::from_str(entries[2])?,
                mode: DrawerMode::from_str(entries[3])?,
                first_run: entries[4].parse()?,
                last_run: entries[5].parse()?,
            })?;
        }
        Ok(cabling)
    }
}
