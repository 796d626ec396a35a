use clap::{Arg, Command};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use indicatif_log_bridge::LogWrapper;
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc};

use libtile_rod::config::Config;
use libtile_rod::process::{collect_files, create_decoder, create_subsets, process_subset, RunSummary};
use libtile_rod::worker_status::{BarColor, WorkerStatus};

fn make_template_config(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::default();
    let yaml_str = serde_yaml::to_string(&config)?;
    std::fs::write(path, yaml_str)?;
    Ok(())
}

/// Route the library messages to a log file
fn init_file_logger() -> Result<(), spdlog::Error> {
    let file_sink = Arc::new(
        spdlog::sink::FileSink::builder()
            .path(PathBuf::from("./tile_rod.log"))
            .formatter(Box::new(spdlog::formatter::PatternFormatter::new(
                spdlog::formatter::pattern!(
                    "[{date_short} {time_short}] - [thread: {tid}] - [{^{level}}] - {payload}{eol}"
                ),
            )))
            .truncate(true)
            .build()?,
    );
    let logger = Arc::new(
        spdlog::Logger::builder()
            .flush_level_filter(spdlog::LevelFilter::All)
            .sink(file_sink)
            .build()?,
    );
    spdlog::set_default_logger(logger);
    Ok(())
}

fn bar_style(color: BarColor) -> ProgressStyle {
    let color = match color {
        BarColor::CYAN => "cyan",
        BarColor::RED => "red",
        BarColor::GREEN => "green",
    };
    ProgressStyle::with_template(&format!(
        "{{prefix}} [{{bar:40.{color}/blue}}] {{percent:>3}}% {{msg}}"
    ))
    .unwrap_or_else(|_| ProgressStyle::default_bar())
}

fn update_bar(bar: &ProgressBar, status: &WorkerStatus) {
    bar.set_style(bar_style(status.color));
    bar.set_position((status.progress * 100.0) as u64);
    if status.run_number != 0 {
        bar.set_message(format!("run {}", status.run_number));
    }
}

fn log_summary(summary: &RunSummary) {
    log::info!(
        "Decoded {} events from {} files ({} skipped), total size {}",
        summary.events,
        summary.files,
        summary.skipped_files,
        human_bytes::human_bytes(summary.bytes as f64)
    );
    log::info!("Runs: {:?}", summary.runs);
    for (status, count) in summary.drawer_status.iter() {
        log::info!("Drawers with status {status}: {count}");
    }
    log::info!(
        "Digits: {} Channels: {} (usable {}) Total charge: {:.1} pC",
        summary.digits,
        summary.channels,
        summary.usable_channels,
        summary.total_charge_pc
    );
    log::info!(
        "L2 summaries: {} Laser records: {} Beam elements: {} TMDB records: {}",
        summary.l2_summaries,
        summary.laser_records,
        summary.beam_elements,
        summary.tmdb_records
    );
}

fn main() {
    // Create a cli
    let matches = Command::new("tile_rod_cli")
        .arg_required_else_help(true)
        .subcommand(Command::new("new").about("Make a template configuration yaml file"))
        .arg(
            Arg::new("path")
                .short('p')
                .long("path")
                .help("Path to the file"),
        )
        .get_matches();

    // Initialize feedback
    let logger = simplelog::TermLogger::new(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    );

    let pb_manager = MultiProgress::new();

    LogWrapper::new(pb_manager.clone(), logger)
        .try_init()
        .expect("Could not create logging/progress!");

    let Some(config_path) = matches.get_one::<String>("path").map(PathBuf::from) else {
        log::error!("A path is required (-p/--path)");
        return;
    };

    if let Some(("new", _)) = matches.subcommand() {
        log::info!(
            "Making a template config at {}...",
            config_path.to_string_lossy()
        );
        match make_template_config(&config_path) {
            Ok(()) => log::info!("Done."),
            Err(e) => log::error!("Could not write the template config: {e}"),
        }
        return;
    }

    if let Err(e) = init_file_logger() {
        log::warn!("Could not create the log file, library messages are lost: {e}");
    }
    spdlog::info!("Starting tile_rod_cli");

    // Load our config
    log::info!("Loading config from {}...", config_path.to_string_lossy());
    let config = match Config::read_config_file(&config_path) {
        Ok(c) => c,
        Err(e) => {
            log::error!("{e}");
            return;
        }
    };
    if !config.is_n_threads_valid() {
        log::error!("n_threads must be at least 1, found {}", config.n_threads);
        return;
    }
    log::info!("Config successfully loaded.");
    log::info!("Data Path: {}", config.data_path.to_string_lossy());
    match &config.cabling_path {
        Some(path) => log::info!("Cabling Path: {}", path.to_string_lossy()),
        None => log::info!("Cabling Path: bundled default"),
    }
    log::info!("Run Number: {} Number of Workers: {}", config.run_number, config.n_threads);

    let files = match collect_files(&config) {
        Ok(f) => f,
        Err(e) => {
            log::error!("{e}");
            return;
        }
    };
    let (decoder, routing) = match create_decoder(&config) {
        Ok(d) => d,
        Err(e) => {
            log::error!("{e}");
            return;
        }
    };

    // Spawn the workers, one bar each
    let (tx, rx) = mpsc::channel::<WorkerStatus>();
    let mut bars: Vec<ProgressBar> = Vec::new();
    let mut workers = Vec::new();
    for subset in create_subsets(&config, files) {
        // Dont make empty workers
        if subset.is_empty() {
            continue;
        }
        let idx = workers.len();
        let bar = pb_manager.add(ProgressBar::new(100));
        bar.set_style(bar_style(BarColor::CYAN));
        bar.set_prefix(format!("Worker {idx}"));
        bars.push(bar);
        let (conf, decoder, routing, tx) = (config.clone(), decoder.clone(), routing.clone(), tx.clone());
        workers.push(std::thread::spawn(move || {
            process_subset(conf, decoder, routing, tx, idx, subset)
        }));
    }
    drop(tx);

    // Blocks until every worker has dropped its sender
    for status in rx.iter() {
        if let Some(bar) = bars.get(status.worker_id) {
            update_bar(bar, &status);
        }
    }

    let mut summary = RunSummary::default();
    for worker in workers {
        match worker.join() {
            Ok(Ok(s)) => summary.merge(s),
            Ok(Err(e)) => log::error!("Processor error: {e}"),
            Err(_) => log::error!("An error occured joining one of the workers!"),
        }
    }
    for bar in bars {
        bar.finish();
    }

    log_summary(&summary);
    decoder.diagnostics().report(true);
    let diag = decoder.diagnostics();
    if diag.error_count() > 0 {
        log::warn!(
            "Decoding raised {} warnings and {} errors, see tile_rod.log",
            diag.warning_count(),
            diag.error_count()
        );
    }
    if let Some(path) = &config.summary_path {
        match summary.write(path) {
            Ok(()) => log::info!("Wrote summary to {}", path.to_string_lossy()),
            Err(e) => log::error!("{e}"),
        }
    }

    log::info!("Done.");
}
