//! Logger setup for the `metview` binary.
//!
//! Progress goes to stderr so stdout stays clean for result tables. With
//! `logging.file = true` each run is also appended to `./metview.log`.

use std::fs::{File, OpenOptions};
use std::path::Path;

use log::LevelFilter;
use simplelog::{
    ColorChoice, CombinedLogger, Config, ConfigBuilder, SharedLogger, TermLogger, TerminalMode,
    WriteLogger,
};

const LOG_FILENAME: &str = "metview.log";

/// Destination for log output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogDestination {
    /// Stderr only.
    Terminal,
    /// Stderr plus ./metview.log.
    Both,
}

pub fn initialize(destination: LogDestination, level: LevelFilter) {
    let config = quiet_http_config();
    let mut loggers: Vec<Box<dyn SharedLogger>> = Vec::with_capacity(2);
    loggers.push(TermLogger::new(
        level,
        config.clone(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    ));

    if destination == LogDestination::Both {
        match open_log_file(Path::new(LOG_FILENAME)) {
            Ok(file) => loggers.push(WriteLogger::new(level, config, file)),
            Err(err) => eprintln!("metview: not logging to {LOG_FILENAME}: {err}"),
        }
    }

    // A logger may already be installed (tests); keep it.
    let _ = CombinedLogger::init(loggers);
}

/// RFC 3339 timestamps; HTTP client internals filtered out.
fn quiet_http_config() -> Config {
    let mut builder = ConfigBuilder::new();
    builder
        .set_time_format_rfc3339()
        .set_target_level(LevelFilter::Error);
    for noisy in ["hyper", "hyper_util", "reqwest", "rustls"] {
        builder.add_filter_ignore_str(noisy);
    }
    builder.build()
}

fn open_log_file(path: &Path) -> std::io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}
