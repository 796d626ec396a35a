use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, ReadBytesExt};

use super::error::EventFileError;

const WORD_BYTES: u64 = 4;
const EVENT_FILE_EXTENSION: &str = "dat";

/// EventFile is one event buffer read from disk: a little-endian stream of 32-bit words
#[derive(Debug, Clone)]
pub struct EventFile {
    path: PathBuf,
    words: Vec<u32>,
}

impl EventFile {
    /// Read the whole file. Its size must be a multiple of 4 bytes.
    pub fn open(path: &Path) -> Result<Self, EventFileError> {
        if !path.exists() {
            return Err(EventFileError::BadFilePath(path.to_path_buf()));
        }
        let size = path.metadata()?.len();
        if size % WORD_BYTES != 0 {
            return Err(EventFileError::BadLength(path.to_path_buf()));
        }
        let mut words = vec![0; (size / WORD_BYTES) as usize];
        let mut reader = BufReader::new(File::open(path)?);
        reader.read_u32_into::<LittleEndian>(&mut words)?;
        // The file grew between the size check and the read
        if reader.bytes().next().is_some() {
            return Err(EventFileError::BadLength(path.to_path_buf()));
        }
        Ok(Self {
            path: path.to_path_buf(),
            words,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn words(&self) -> &[u32] {
        &self.words
    }

    pub fn size_bytes(&self) -> u64 {
        self.words.len() as u64 * WORD_BYTES
    }
}

/// Every `.dat` file in `dir`, sorted by name, and their total size in bytes
pub fn list_event_files(dir: &Path) -> Result<(Vec<PathBuf>, u64), EventFileError> {
    if !dir.is_dir() {
        return Err(EventFileError::BadFilePath(dir.to_path_buf()));
    }
    let mut files: Vec<PathBuf> = Vec::new();
    for item in dir.read_dir()? {
        let path = item?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == EVENT_FILE_EXTENSION) {
            files.push(path);
        }
    }
    files.sort();

    let mut total_bytes = 0;
    for path in files.iter() {
        total_bytes += path.metadata()?.len();
    }
    Ok((files, total_bytes))
}
