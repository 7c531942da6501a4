use clap::Parser;
use log::LevelFilter;
use std::path::PathBuf;

/// Run a statically linked ELF32 executable, paging its segments in on
/// first access, and report paging statistics.
#[derive(Debug, Clone, Parser)]
#[command(name = "smart-loader", version)]
pub struct Options {
    /// Log verbosity: off, error, warn, info, debug or trace.
    #[arg(long, env = "SMART_LOADER_LOG", default_value_t = LevelFilter::Warn)]
    pub log_level: LevelFilter,

    /// Number of page fills to keep for the debug log.
    #[arg(long = "journal", value_name = "N", default_value_t = 64)]
    pub journal_capacity: usize,

    /// The executable to load.
    pub executable: PathBuf,
}

impl Options {
    /// Defaults for `executable`.
    #[must_use]
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            log_level: LevelFilter::Warn,
            journal_capacity: 64,
            executable: executable.into(),
        }
    }
}
