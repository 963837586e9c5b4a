use std::{fmt, process};

use colored::Colorize;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::{
    fmt::{FmtContext, FormatEvent, FormatFields, format::Writer, time::FormatTime},
    registry::LookupSpan,
};

use crate::logger::object::{timer::LoggerClock, timezone::LoggerTimeZone};

/// Separator between the columns of a text record.
pub(crate) const COLUMN_SEPARATOR: &str = " - ";

/// Text layout of a single record:
///
/// `2024-03-05 14:07:09 PM - INFO - main[4242] train.rs:31 - message key=value`
///
/// Columns are timestamp, level, process label with origin, then message and fields.
/// The level column is colored only when the writer accepts ANSI escapes.
#[derive(Debug, Clone)]
pub struct LogLayout {
    clock: LoggerClock,
    process: String,
}

impl LogLayout {
    /// Layout for records emitted by the process that owns the sinks.
    pub fn main(tz: LoggerTimeZone) -> Self {
        Self::labelled(tz, "main")
    }

    /// Layout for records emitted by a worker process behind a relay.
    pub fn worker(tz: LoggerTimeZone) -> Self {
        Self::labelled(tz, "worker")
    }

    /// Layout whose process column reads `<label>[<pid>]`.
    pub fn labelled(tz: LoggerTimeZone, label: &str) -> Self {
        Self {
            clock: LoggerClock::new(tz),
            process: format!("{label}[{}]", process::id()),
        }
    }

    pub fn process_label(&self) -> &str {
        &self.process
    }
}

impl<S, N> FormatEvent<S, N> for LogLayout
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let meta = event.metadata();

        self.clock.format_time(&mut writer)?;
        writer.write_str(COLUMN_SEPARATOR)?;

        let name = level_name(meta.level());
        if writer.has_ansi_escapes() {
            let painted = match *meta.level() {
                Level::TRACE => name.purple(),
                Level::DEBUG => name.blue(),
                Level::INFO => name.green(),
                Level::WARN => name.yellow(),
                Level::ERROR => name.red(),
            };
            write!(writer, "{painted}")?;
        } else {
            writer.write_str(name)?;
        }
        writer.write_str(COLUMN_SEPARATOR)?;

        write!(writer, "{} ", self.process)?;
        let origin = meta
            .file()
            .and_then(|file| file.rsplit(['/', '\\']).next())
            .unwrap_or_else(|| meta.target());
        match meta.line() {
            Some(line) => write!(writer, "{origin}:{line}")?,
            None => writer.write_str(origin)?,
        }
        writer.write_str(COLUMN_SEPARATOR)?;

        ctx.format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Level names as written in the level column.
pub(crate) fn level_name(level: &Level) -> &'static str {
    match *level {
        Level::TRACE => "TRACE",
        Level::DEBUG => "DEBUG",
        Level::INFO => "INFO",
        Level::WARN => "WARNING",
        Level::ERROR => "ERROR",
    }
}

fn level_from_name(name: &str) -> Option<Level> {
    match name {
        "TRACE" => Some(Level::TRACE),
        "DEBUG" => Some(Level::DEBUG),
        "INFO" => Some(Level::INFO),
        "WARN" | "WARNING" => Some(Level::WARN),
        "ERROR" => Some(Level::ERROR),
        _ => None,
    }
}

/// Recovers the level of a record already rendered by this crate,
/// either in the text layout or as a JSON line.
///
/// Returns `None` for anything else (raw prints, panic messages).
pub(crate) fn parse_level(line: &str) -> Option<Level> {
    let trimmed = line.trim_start();
    if trimmed.starts_with('{') {
        let record: serde_json::Value = serde_json::from_str(trimmed).ok()?;
        return level_from_name(record.get("level")?.as_str()?);
    }

    let mut columns = line.splitn(3, COLUMN_SEPARATOR);
    let _timestamp = columns.next()?;
    let level = columns.next()?;
    columns.next()?;
    level_from_name(level)
}
