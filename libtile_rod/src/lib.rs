//! # libtile_rod
//!
//! libtile_rod decodes the readout-driver (ROD) fragments of the Tile hadronic calorimeter,
//! written in Rust. It takes the raw 32-bit word buffers of an event (ROB fragments wrapping
//! ROD fragments), splits every ROD into its sub-fragments, unpacks each sub-fragment
//! according to its type, and delivers per-drawer collections of digitized samples,
//! reconstructed channels and fragment metadata. A run-aware identity map translates between
//! logical drawer ids and the ROD/ROB source ids they are read out through.
//!
//! ## Structure
//!
//! - `rod_fragment`: ROB/ROD headers and the event buffer index
//! - `scanner`: splits a ROD data block into sub-fragments and re-synchronizes on corruption
//! - `fragment_type`: the id+type word and the closed set of type codes
//! - `unpack`: one unpacker per sub-fragment type
//! - `metadata`: DMU header checks, CRC masks and the per-drawer status
//! - `identity_map`: logical id <-> ROD/ROB routing, rebuilt per run
//! - `decoder`: ties the above together into `DecodedEvent`s
//! - `process`: decodes a directory of event files with a pool of workers
//!
//! Decoding never fails past the decoder: malformed sub-fragments are dropped and counted in
//! the shared `Diagnostics`, missing drawers are delivered with a `NoFragment` or `NoRob`
//! status so that downstream code can apply its own masking.
//!
//! ## Configuration
//!
//! The processor reads a YAML configuration. A template can be made with
//! `tile_rod_cli new -p <path>`. The format is as follows:
//!
//! ```yml
//! data_path: /path/to/event/files
//! cabling_path: null
//! summary_path: summary.yaml
//! run_number: 0
//! n_threads: 4
//! decoder:
//!   use_frag0: true
//!   use_frag1: true
//!   use_frag4: true
//!   use_frag5_raw: true
//!   use_frag5_reco: true
//!   mask_bad_digits: false
//!   force_calibration_mode: false
//!   full_tile_mode_run: 320000
//!   demonstrator_frag_ids: []
//!   max_warning_print: 1000
//!   max_error_print: 1000
//!   verbose: false
//! ```
//!
//! Every `.dat` file in `data_path` is one event buffer of little-endian 32-bit words. If
//! `cabling_path` is `null`, the bundled cabling description is used. `run_number` is only
//! used for events whose ROD headers carry run 0.
//!
//! ### Cabling Description Format
//!
//! The cabling description is a CSV file with *no* whitespaces listing the drawers whose
//! readout differs from the nominal one. The columns are as follows:
//!
//! ```csv
//! frag_id,bs_frag_id,kind,mode,first_run,last_run
//! ```
//!
//! Ids may be decimal or `0x` hexadecimal. `kind` is one of `long_barrel`,
//! `extended_barrel`, `special_extended_barrel`, `demo_long_barrel`, `demo_extended_barrel`;
//! `mode` is `normal` or `calib`. A row applies to the runs
//! `first_run..=last_run`.
//!
//! ## Output
//!
//! The library hands `DecodedEvent`s to the caller; the processor reduces them to a
//! `RunSummary` (per-status drawer counts, record counts, nominal charge sum) which the
//! command line tool prints and optionally writes as YAML. Library messages go through
//! `spdlog`; the command line tool sends them to `tile_rod.log`.
pub mod cabling;
pub mod channel_order;
pub mod collection;
pub mod conditions;
pub mod config;
pub mod constants;
pub mod decoder;
pub mod diagnostics;
pub mod error;
pub mod event_file;
pub mod fragment_type;
pub mod hardware_id;
pub mod identity_map;
pub mod metadata;
pub mod online_weights;
pub mod process;
pub mod records;
pub mod rod_fragment;
pub mod scanner;
pub mod unpack;
pub mod word_stream;
pub mod worker_status;

#[cfg(test)]
mod test_support;
