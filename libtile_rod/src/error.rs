use std::path::PathBuf;
use thiserror::Error;

use super::worker_status::WorkerStatus;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WordStreamError {
    #[error("Insufficient data in word stream -- requested word {requested} but only {available} remain")]
    InsufficientData { requested: usize, available: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RodFragmentError {
    #[error("Incorrect ROD header marker {0:#010x}; expected 0xee1234ee")]
    BadMarker(u32),
    #[error("ROD fragment of {0} words is too small to hold a header and trailer")]
    TooSmall(usize),
    #[error("ROD fragment has header size {0}; expected at least {min}", min=super::constants::ROD_MIN_HEADER_SIZE)]
    BadHeaderSize(u32),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RobFragmentError {
    #[error("Incorrect ROB header marker {0:#010x}; expected 0xdd1234dd")]
    BadMarker(u32),
    #[error("ROB fragment declares {declared} words but only {available} are available")]
    BadSize { declared: usize, available: usize },
    #[error("ROB fragment has inconsistent header size {0}")]
    BadHeaderSize(usize),
    #[error("ROB fragment failed while reading words: {0}")]
    Truncated(#[from] WordStreamError),
}

/// Reasons an unpacker drops a whole sub-fragment
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnpackError {
    #[error("Sub-fragment type {0:#x} is not known")]
    UnknownType(u8),
    #[error("Sub-fragment has {words} data words which does not match the drawer format ({expected})")]
    InconsistentFormat { words: usize, expected: String },
    #[error("Sub-fragment is too short: {words} words, need at least {min}")]
    TooShort { words: usize, min: usize },
    #[error("Sub-fragment failed while reading words: {0}")]
    Truncated(#[from] WordStreamError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelOrderError {
    #[error("Channel order table {name} has {len} entries; expected {expected}")]
    BadLength {
        name: &'static str,
        len: usize,
        expected: usize,
    },
    #[error("Channel order table {name} maps two positions to channel {channel}")]
    Duplicate { name: &'static str, channel: usize },
    #[error("Channel order table {name} contains out-of-range channel {channel}")]
    OutOfRange { name: &'static str, channel: usize },
}

#[derive(Debug, Error)]
pub enum DrawerError {
    #[error("Found invalid drawer kind keyword: {0}")]
    InvalidKind(String),
    #[error("Found invalid drawer mode keyword: {0}")]
    InvalidMode(String),
}

#[derive(Debug, Error)]
pub enum CablingError {
    #[error("Cabling description failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Cabling description failed to parse an integer: {0}")]
    ParsingError(#[from] std::num::ParseIntError),
    #[error("Cabling description failed to parse a drawer keyword: {0}")]
    BadDrawer(#[from] DrawerError),
    #[error("Cabling description was given a file with the incorrect format; most likely the number of columns is incorrect")]
    BadFileFormat,
    #[error("Cabling description row for frag {0:#x} has an empty run range")]
    BadRunRange(u16),
    #[error("Cabling description has overlapping run ranges for frag {0:#x}")]
    OverlappingRuns(u16),
}

#[derive(Debug, Error)]
pub enum EventFileError {
    #[error("Could not open event file because file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Event file {0:?} does not contain a whole number of 32-bit words")]
    BadLength(PathBuf),
    #[error("Event file failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration as file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Config failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Config failed to parse YAML: {0}")]
    ParsingError(#[from] serde_yaml::Error),
}

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("Processor failed due to EventFile error: {0}")]
    EventFileError(#[from] EventFileError),
    #[error("Processor failed due to Config error: {0}")]
    ConfigError(#[from] ConfigError),
    #[error("Processor failed due to Cabling error: {0}")]
    CablingError(#[from] CablingError),
    #[error("Processor failed due to ChannelOrder error: {0}")]
    ChannelOrderError(#[from] ChannelOrderError),
    #[error("Processor did not find any event files in {0:?}")]
    NoEventFiles(PathBuf),
    #[error("Processor failed to write the summary: {0}")]
    SummaryError(#[from] serde_yaml::Error),
    #[error("Processor failed due to Send error: {0}")]
    SendError(#[from] std::sync::mpsc::SendError<WorkerStatus>),
    #[error("Processor failed due to IO error: {0}")]
    IoError(#[from] std::io::Error),
}
