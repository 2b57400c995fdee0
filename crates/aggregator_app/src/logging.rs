//! Process logger for the aggregator binary.
//!
//! Always writes `./aggregator.log`; `--verbose` adds terminal output.

use std::fs::File;
use std::path::PathBuf;

use log::LevelFilter;
use simplelog::{
    ColorChoice, CombinedLogger, Config, ConfigBuilder, SharedLogger, TermLogger, TerminalMode,
    WriteLogger,
};

const LOG_FILE: &str = "./aggregator.log";

pub enum LogDestination {
    File,
    Both,
}

impl LogDestination {
    pub fn from_verbose(verbose: bool) -> Self {
        if verbose {
            LogDestination::Both
        } else {
            LogDestination::File
        }
    }
}

pub fn initialize(destination: LogDestination) {
    let level = match destination {
        LogDestination::File => LevelFilter::Info,
        LogDestination::Both => LevelFilter::Debug,
    };
    let config = build_config();

    let mut loggers: Vec<Box<dyn SharedLogger>> = Vec::new();
    if let LogDestination::Both = destination {
        loggers.push(TermLogger::new(
            level,
            config.clone(),
            TerminalMode::Stderr,
            ColorChoice::Auto,
        ));
    }
    if let Some(file_logger) = create_file_logger(level, config) {
        loggers.push(file_logger);
    }
    if loggers.is_empty() {
        return;
    }

    let _ = CombinedLogger::init(loggers);
}

fn build_config() -> Config {
    ConfigBuilder::new()
        .set_time_format_rfc3339()
        .set_target_level(LevelFilter::Error)
        .add_filter_allow_str("aggregator")
        .build()
}

fn create_file_logger(level: LevelFilter, config: Config) -> Option<Box<WriteLogger<File>>> {
    let log_path = PathBuf::from(LOG_FILE);
    match File::create(&log_path) {
        Ok(file) => Some(WriteLogger::new(level, config, file)),
        Err(err) => {
            eprintln!("Warning: could not create log file at {}: {err}", log_path.display());
            None
        }
    }
}
