//! Separate log files for a single computation or third-party tool,
//! linked from the main log.

mod subprocess;

pub use subprocess::CaptureConfig;

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tracing::{Dispatch, dispatcher, info};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    Layer,
    fmt::{self, writer::MakeWriterExt},
    layer::SubscriberExt,
};

use crate::logger::{
    LogLayout, LoggerError, LoggerLevel, LoggerResult, LoggerTimeZone, log, log_file_name,
};

/// Options of a [`SubLog`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SubLogOptions {
    /// Name of the parent logger; the sub-log is named `<parent>.sublog.<name>`.
    pub parent: Option<String>,
    pub file_log_level: LoggerLevel,
    /// Also print sub-log records on the console.
    pub log_to_console: bool,
    pub timestamp: bool,
    pub tz: LoggerTimeZone,
    pub capture: CaptureConfig,
}

impl Default for SubLogOptions {
    fn default() -> Self {
        Self {
            parent: None,
            file_log_level: LoggerLevel::Debug,
            log_to_console: false,
            timestamp: true,
            tz: LoggerTimeZone::default(),
            capture: CaptureConfig::default(),
        }
    }
}

/// A log file of its own, referenced from the main log.
///
/// Records emitted inside [`SubLog::in_scope`] go to the sub-log only. The
/// current logger receives a reference when the sub-log starts and when it
/// is closed; closing happens on [`SubLog::close`] or on drop, so a sub-log
/// is finished even when its computation panics.
pub struct SubLog {
    name: String,
    logger_name: String,
    path: PathBuf,
    dispatch: Dispatch,
    capture: CaptureConfig,
    closed: bool,
}

impl SubLog {
    /// Opens `<name>[_<YYYY-MM-DD>_<HH-MM-SS>].log` in `output_dir` for appending.
    pub fn open(
        name: &str,
        output_dir: impl AsRef<Path>,
        options: SubLogOptions,
    ) -> LoggerResult<Self> {
        if name.trim().is_empty() || name.contains(['/', '\\']) {
            return Err(LoggerError::MalformedConfiguration(format!(
                "sub-log name {name:?} must be a plain, non-empty file stem"
            )));
        }

        let dir = output_dir.as_ref();
        fs::create_dir_all(dir).map_err(|e| LoggerError::filesystem(dir, e))?;

        let file_name = log_file_name(name, options.timestamp.then(|| options.tz.now()));
        let path = dir.join(&file_name);
        let appender = RollingFileAppender::builder()
            .rotation(Rotation::NEVER)
            .filename_prefix(file_name)
            .build(dir)
            .map_err(|e| LoggerError::filesystem(&path, io::Error::other(e)))?;

        let logger_name = match &options.parent {
            Some(parent) => format!("{parent}.sublog.{name}"),
            None => format!("fancylog.sublog.{name}"),
        };
        let level = options.file_log_level;

        let mut sinks: Vec<log::SinkStack> = vec![
            fmt::layer()
                .event_format(LogLayout::labelled(options.tz, &logger_name))
                .with_ansi(false)
                .with_writer(appender.with_max_level(level.as_level()))
                .boxed(),
        ];
        if options.log_to_console {
            sinks.push(log::console_sink(
                LogLayout::labelled(options.tz, &logger_name),
                level,
                false,
            ));
        }
        let stack = level.as_filter().and_then(sinks);
        let dispatch = Dispatch::new(tracing_subscriber::registry().with(stack));

        let sublog = Self {
            name: name.to_string(),
            logger_name,
            path,
            dispatch,
            capture: options.capture,
            closed: false,
        };

        info!(
            "Starting sub-log '{}', see {} for details",
            sublog.name,
            sublog.path.display()
        );
        sublog.in_scope(|| info!("Sub-log '{}' started", sublog.name));
        Ok(sublog)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `<parent>.sublog.<name>`, shown as the process column of every record.
    pub fn logger_name(&self) -> &str {
        &self.logger_name
    }

    pub fn log_file(&self) -> &Path {
        &self.path
    }

    /// Runs `f` with this sub-log as the default subscriber of the current thread.
    pub fn in_scope<T>(&self, f: impl FnOnce() -> T) -> T {
        dispatcher::with_default(&self.dispatch, f)
    }

    /// Writes the closing records.
    pub fn close(mut self) {
        self.finish();
    }

    fn finish(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        self.in_scope(|| info!("Sub-log '{}' finished", self.name));
        info!(
            "Sub-log '{}' finished, log saved to {}",
            self.name,
            self.path.display()
        );
    }
}

impl Drop for SubLog {
    fn drop(&mut self) {
        self.finish();
    }
}

impl std::fmt::Debug for SubLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubLog")
            .field("logger_name", &self.logger_name)
            .field("path", &self.path)
            .field("closed", &self.closed)
            .finish()
    }
}

/// Runs `f` inside a new sub-log and closes it afterwards.
///
/// `tracing` macros called from `f` on the current thread write to the sub-log.
///
/// # Examples
/// ```no_run
/// use fancylog::{SubLogOptions, sub_log};
///
/// let status = sub_log("alignment", "logs", SubLogOptions::default(), |sl| {
///     tracing::info!("aligning");
///     sl.run_subprocess(std::process::Command::new("echo").arg("done"))
///         .map(|out| out.status)
/// })
/// .unwrap();
/// ```
pub fn sub_log<T>(
    name: &str,
    output_dir: impl AsRef<Path>,
    options: SubLogOptions,
    f: impl FnOnce(&SubLog) -> T,
) -> LoggerResult<T> {
    let sublog = SubLog::open(name, output_dir, options)?;
    let result = sublog.in_scope(|| f(&sublog));
    sublog.close();
    Ok(result)
}
