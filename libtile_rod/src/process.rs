use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::cabling::CablingDescription;
use super::conditions::{AllChannelsGood, NominalCalibration};
use super::config::Config;
use super::decoder::{DecodedEvent, RodDecoder};
use super::error::{EventFileError, ProcessorError};
use super::event_file::{list_event_files, EventFile};
use super::fragment_type::RawChannelUnit;
use super::identity_map::RoutingTable;
use super::rod_fragment::RawEvent;
use super::worker_status::{BarColor, WorkerStatus};

/// Counts accumulated over the decoded events of one worker (or of all workers once merged)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub files: usize,
    pub skipped_files: usize,
    pub bytes: u64,
    pub events: u64,
    pub runs: BTreeSet<u32>,
    /// Number of drawers per status, keyed by the status name
    pub drawer_status: BTreeMap<String, u64>,
    pub digits: u64,
    pub channels: u64,
    pub usable_channels: u64,
    /// Sum of the delivered channel amplitudes in pC, nominal calibration
    pub total_charge_pc: f64,
    pub l2_summaries: u64,
    pub laser_records: u64,
    pub beam_elements: u64,
    pub tmdb_records: u64,
}

impl RunSummary {
    pub fn add_event(&mut self, event: &DecodedEvent) {
        self.events += 1;
        self.runs.insert(event.run_number);
        for (status, count) in event.drawers.status_counts() {
            *self.drawer_status.entry(status.to_string()).or_insert(0) += count as u64;
        }
        for drawer in event.drawers.iter() {
            self.digits += drawer.digits.len() as u64;
            self.channels += drawer.channels.len() as u64;
            self.usable_channels += drawer.usable_channels(&AllChannelsGood).len() as u64;
            self.total_charge_pc += drawer
                .calibrated_amplitudes(&NominalCalibration, RawChannelUnit::PicoCoulombs)
                .iter()
                .map(|(_, _, pc)| *pc as f64)
                .sum::<f64>();
        }
        self.l2_summaries += event.l2.len() as u64;
        self.laser_records += event.laser.is_some() as u64;
        self.beam_elements += event.beam.len() as u64;
        self.tmdb_records +=
            (event.tmdb_digits.len() + event.tmdb_raw_channels.len() + event.tmdb_decisions.len()) as u64;
    }

    pub fn merge(&mut self, other: RunSummary) {
        self.files += other.files;
        self.skipped_files += other.skipped_files;
        self.bytes += other.bytes;
        self.events += other.events;
        self.runs.extend(other.runs);
        for (status, count) in other.drawer_status {
            *self.drawer_status.entry(status).or_insert(0) += count;
        }
        self.digits += other.digits;
        self.channels += other.channels;
        self.usable_channels += other.usable_channels;
        self.total_charge_pc += other.total_charge_pc;
        self.l2_summaries += other.l2_summaries;
        self.laser_records += other.laser_records;
        self.beam_elements += other.beam_elements;
        self.tmdb_records += other.tmdb_records;
    }

    /// Write the summary as YAML
    pub fn write(&self, path: &Path) -> Result<(), ProcessorError> {
        let yaml_str = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml_str)?;
        Ok(())
    }
}

/// Build the shared decoder and routing table described by the configuration
pub fn create_decoder(config: &Config) -> Result<(Arc<RodDecoder>, Arc<RoutingTable>), ProcessorError> {
    let cabling = CablingDescription::new(config.cabling_path.as_deref())?;
    let routing = RoutingTable::new(cabling, config.decoder.identity_options(), config.run_number);
    let decoder = RodDecoder::new(config.decoder.clone())?;
    Ok((Arc::new(decoder), Arc::new(routing)))
}

/// Decode one event file. `fallback_run` stands in for a ROD run number of 0.
fn process_file(
    fallback_run: u32,
    decoder: &RodDecoder,
    routing: &RoutingTable,
    path: &Path,
    summary: &mut RunSummary,
) -> Result<u32, ProcessorError> {
    let file = match EventFile::open(path) {
        Ok(f) => f,
        Err(EventFileError::BadLength(p)) => {
            spdlog::warn!("Skipping {} as it is not a whole number of words", p.display());
            summary.skipped_files += 1;
            return Ok(0);
        }
        Err(e) => return Err(e.into()),
    };
    summary.files += 1;
    summary.bytes += file.size_bytes();

    let event = RawEvent::from_words(file.words(), decoder.diagnostics());
    if event.is_empty() {
        spdlog::warn!("No ROB fragments in {}", path.display());
        return Ok(0);
    }
    let run = event
        .run_number(decoder.diagnostics())
        .filter(|r| *r != 0)
        .unwrap_or(fallback_run);
    let map = routing.for_run(run);
    let decoded = decoder.decode_event(&event, &map);
    summary.add_event(&decoded);
    Ok(run)
}

/// Decode a subset of the event files
pub fn process_subset(
    config: Config,
    decoder: Arc<RodDecoder>,
    routing: Arc<RoutingTable>,
    tx: Sender<WorkerStatus>,
    worker_id: usize,
    subset: Vec<PathBuf>,
) -> Result<RunSummary, ProcessorError> {
    let mut summary = RunSummary::default();
    let total_bytes: u64 = subset
        .iter()
        .filter_map(|path| path.metadata().ok())
        .map(|meta| meta.len())
        .sum();
    spdlog::info!(
        "Worker {} decoding {} files with total size {}",
        worker_id,
        subset.len(),
        human_bytes::human_bytes(total_bytes as f64)
    );

    let mut run_number = 0;
    let mut done_bytes = 0;
    tx.send(WorkerStatus::new(0.0, run_number, worker_id, BarColor::CYAN))?;
    for path in subset.iter() {
        let before = summary.bytes;
        let run = process_file(config.run_number, &decoder, &routing, path, &mut summary)?;
        if run != 0 {
            run_number = run;
        }
        done_bytes += summary.bytes - before;
        let color = if summary.skipped_files > 0 {
            BarColor::RED
        } else {
            BarColor::CYAN
        };
        tx.send(WorkerStatus::new(
            done_bytes as f32 / total_bytes.max(1) as f32,
            run_number,
            worker_id,
            color,
        ))?;
    }
    tx.send(WorkerStatus::new(1.0, run_number, worker_id, BarColor::GREEN))?;
    spdlog::info!(
        "Worker {} done: {} events from {} files",
        worker_id,
        summary.events,
        summary.files
    );
    Ok(summary)
}

/// Every event file of the data directory
pub fn collect_files(config: &Config) -> Result<Vec<PathBuf>, ProcessorError> {
    let data_path = config.get_data_directory()?;
    let (files, total_bytes) = list_event_files(data_path)?;
    if files.is_empty() {
        return Err(ProcessorError::NoEventFiles(data_path.to_path_buf()));
    }
    spdlog::info!(
        "Found {} event files with total size {}",
        files.len(),
        human_bytes::human_bytes(total_bytes as f64)
    );
    Ok(files)
}

/// Deal the files round-robin over the workers
pub fn create_subsets(config: &Config, files: Vec<PathBuf>) -> Vec<Vec<PathBuf>> {
    let mut subsets: Vec<Vec<PathBuf>> = vec![Vec::new(); config.n_threads.max(1) as usize];
    let n_subsets = subsets.len();

    for (idx, file) in files.into_iter().enumerate() {
        subsets[idx % n_subsets].push(file)
    }

    subsets
}

/// Decode every event file with a single worker, writing the summary if asked to.
/// The command line tool runs several `process_subset` workers instead.
pub fn process(config: Config, tx: Sender<WorkerStatus>, worker_id: usize) -> Result<RunSummary, ProcessorError> {
    let files = collect_files(&config)?;
    let (decoder, routing) = create_decoder(&config)?;
    let summary_path = config.summary_path.clone();
    let summary = process_subset(config, decoder.clone(), routing, tx, worker_id, files)?;
    decoder.diagnostics().report(false);
    if let Some(path) = summary_path {
        summary.write(&path)?;
    }
    Ok(summary)
}
