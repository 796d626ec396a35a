use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::constants::{DEFAULT_FULL_TILE_MODE_RUN, DEFAULT_MAX_PRINT};
use super::diagnostics::Diagnostics;
use super::error::ConfigError;
use super::identity_map::IdentityOptions;

/// Switches of the ROD decoder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderOptions {
    /// Unpack digits sub-fragments (type 0x0)
    pub use_frag0: bool,
    /// Unpack sparse digits sub-fragments (type 0x1)
    pub use_frag1: bool,
    /// Unpack reconstructed channel sub-fragments (types 0x2, 0x3, 0x4)
    pub use_frag4: bool,
    /// Keep the digits rebuilt from compressed sub-fragments (type 0x5)
    pub use_frag5_raw: bool,
    /// Keep the reconstructed channels of compressed sub-fragments (type 0x5)
    pub use_frag5_reco: bool,
    /// Zero the samples of channels behind a DMU with a bad header
    pub mask_bad_digits: bool,
    /// Treat every drawer as running in calibration mode
    pub force_calibration_mode: bool,
    pub full_tile_mode_run: u32,
    pub demonstrator_frag_ids: Vec<u16>,
    pub max_warning_print: u32,
    pub max_error_print: u32,
    /// Log the metadata of every decoded drawer at debug level
    pub verbose: bool,
}

impl Default for DecoderOptions {
    fn default() -> Self {
        Self {
            use_frag0: true,
            use_frag1: true,
            use_frag4: true,
            use_frag5_raw: true,
            use_frag5_reco: true,
            mask_bad_digits: false,
            force_calibration_mode: false,
            full_tile_mode_run: DEFAULT_FULL_TILE_MODE_RUN,
            demonstrator_frag_ids: Vec::new(),
            max_warning_print: DEFAULT_MAX_PRINT,
            max_error_print: DEFAULT_MAX_PRINT,
            verbose: false,
        }
    }
}

impl DecoderOptions {
    pub fn identity_options(&self) -> IdentityOptions {
        IdentityOptions {
            full_tile_mode_run: self.full_tile_mode_run,
            demonstrator_frag_ids: self.demonstrator_frag_ids.clone(),
        }
    }

    pub fn diagnostics(&self) -> Diagnostics {
        Diagnostics::new(self.max_warning_print, self.max_error_print)
    }
}

/// Structure representing the application configuration. Contains pathing and run information
/// Configs are seralizable and deserializable to YAML using serde and serde_yaml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding the `.dat` event files
    pub data_path: PathBuf,
    /// Cabling description CSV; None uses the bundled default
    pub cabling_path: Option<PathBuf>,
    /// Where to write the YAML run summary, if anywhere
    pub summary_path: Option<PathBuf>,
    /// Run number used for events whose ROD headers carry run 0
    pub run_number: u32,
    pub n_threads: i32,
    #[serde(default)]
    pub decoder: DecoderOptions,
}

impl Default for Config {
    /// Generate a new Config object. All fields will be empty/invalid
    fn default() -> Self {
        Self {
            data_path: PathBuf::from("None"),
            cabling_path: None,
            summary_path: None,
            run_number: 0,
            n_threads: 1,
            decoder: DecoderOptions::default(),
        }
    }
}

impl Config {
    /// Read the configuration in a YAML file
    /// Returns a Config if successful
    pub fn read_config_file(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            return Err(ConfigError::BadFilePath(config_path.to_path_buf()));
        }

        let yaml_str = std::fs::read_to_string(config_path)?;

        Ok(serde_yaml::from_str::<Self>(&yaml_str)?)
    }

    /// Check that the data directory exists
    pub fn get_data_directory(&self) -> Result<&Path, ConfigError> {
        if self.data_path.is_dir() {
            Ok(&self.data_path)
        } else {
            Err(ConfigError::BadFilePath(self.data_path.clone()))
        }
    }

    pub fn is_n_threads_valid(&self) -> bool {
        self.n_threads >= 1
    }
}
