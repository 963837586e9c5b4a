use std::{io::IsTerminal, path::Path, path::PathBuf};

use serde::{Deserialize, Serialize};
use time::{OffsetDateTime, macros::format_description};

use crate::logger::{
    error::{LoggerError, LoggerResult},
    object::{LoggerFilter, LoggerFormat, LoggerLevel, LoggerTimeZone},
};

/// Stem used when neither `filename`, `program` nor the executable name is available.
const FALLBACK_PROGRAM: &str = "fancylog";

/// Logger configuration.
///
/// Created once per process and consumed by [`build`](crate::build).
/// The destination directory is passed to the builder alongside it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfiguration {
    /// Program name, used as the log file stem (defaults to the executable name).
    pub program: Option<String>,
    /// Program version written into the header.
    pub version: Option<String>,
    /// Overrides the log file stem.
    pub filename: Option<String>,
    /// Title of the first header section.
    pub log_header: String,
    /// Threshold of the console sink.
    pub console_log_level: LoggerLevel,
    /// Threshold of the file sink.
    pub file_log_level: LoggerLevel,
    /// Extra per-module directives applied to every sink.
    pub filter: Option<LoggerFilter>,
    /// Layout of the log file.
    pub file_format: LoggerFormat,
    /// Timezone for timestamps and the file-name stamp.
    pub tz: LoggerTimeZone,
    pub log_to_console: bool,
    pub log_to_file: bool,
    /// Whether to embed `_<YYYY-MM-DD>_<HH-MM-SS>` in the file name.
    pub timestamp: bool,
    pub write_header: bool,
    pub log_git_info: bool,
    pub log_arguments: bool,
    pub log_variables: bool,
    /// Start the worker relay right away.
    pub multiprocessing_aware: bool,
    /// Directory inspected for git metadata (defaults to the working directory).
    pub repository: Option<PathBuf>,
    /// Whether to use colored console output.
    pub use_color: bool,
}

impl Default for LogConfiguration {
    fn default() -> Self {
        Self {
            program: None,
            version: None,
            filename: None,
            log_header: "LOG".to_string(),
            console_log_level: LoggerLevel::Info,
            file_log_level: LoggerLevel::Debug,
            filter: None,
            file_format: LoggerFormat::default(),
            tz: LoggerTimeZone::default(),
            log_to_console: true,
            log_to_file: true,
            timestamp: true,
            write_header: true,
            log_git_info: true,
            log_arguments: true,
            log_variables: true,
            multiprocessing_aware: false,
            repository: None,
            use_color: true,
        }
    }
}

impl LogConfiguration {
    /// Prints everything down to `debug` on the console when `verbose`,
    /// otherwise `info` and above.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.console_log_level = if verbose {
            LoggerLevel::Debug
        } else {
            LoggerLevel::Info
        };
        self
    }

    /// Determines whether colored output should be used.
    ///
    /// Color is enabled only if:
    /// 1. `use_color` config is `true` (user hasn't explicitly disabled it), AND
    /// 2. stdout is a terminal (not redirected to a file/pipe)
    pub fn should_use_color(&self) -> bool {
        self.use_color && std::io::stdout().is_terminal()
    }

    /// Most verbose threshold among the enabled sinks.
    pub fn most_verbose_level(&self) -> LoggerLevel {
        let console = self.log_to_console.then_some(self.console_log_level);
        let file = self.log_to_file.then_some(self.file_log_level);
        match (console, file) {
            (Some(c), Some(f)) => c.min(f),
            (Some(level), None) | (None, Some(level)) => level,
            (None, None) => LoggerLevel::Critical,
        }
    }

    /// Rejects flag combinations that cannot produce a working logger.
    pub fn validate(&self, output_dir: &Path) -> LoggerResult<()> {
        if !self.log_to_console && !self.log_to_file {
            return Err(LoggerError::MalformedConfiguration(
                "both console and file logging are disabled".to_string(),
            ));
        }
        if self.log_to_file && output_dir.as_os_str().is_empty() {
            return Err(LoggerError::MalformedConfiguration(
                "file logging requested without an output directory".to_string(),
            ));
        }
        if let Some(name) = &self.filename {
            if name.trim().is_empty() || name.contains(['/', '\\']) {
                return Err(LoggerError::MalformedConfiguration(format!(
                    "filename {name:?} must be a plain, non-empty file stem"
                )));
            }
        }
        Ok(())
    }

    /// Name of the running program: `program`, else the executable stem.
    pub fn program_name(&self) -> String {
        self.program
            .clone()
            .or_else(|| {
                std::env::current_exe()
                    .ok()
                    .and_then(|exe| exe.file_stem().map(|s| s.to_string_lossy().into_owned()))
            })
            .unwrap_or_else(|| FALLBACK_PROGRAM.to_string())
    }

    /// Log file name for a run started at `started`.
    pub fn log_file_name(&self, started: OffsetDateTime) -> String {
        let stem = self.filename.clone().unwrap_or_else(|| self.program_name());
        log_file_name(&stem, self.timestamp.then_some(started))
    }
}

/// `<stem>_<YYYY-MM-DD>_<HH-MM-SS>.log`, or `<stem>.log` without a timestamp.
///
/// Tooling parses this shape; keep it stable.
pub fn log_file_name(stem: &str, started: Option<OffsetDateTime>) -> String {
    let stamp = format_description!("[year]-[month]-[day]_[hour]-[minute]-[second]");
    match started.and_then(|at| at.format(&stamp).ok()) {
        Some(stamp) => format!("{stem}_{stamp}.log"),
        None => format!("{stem}.log"),
    }
}
