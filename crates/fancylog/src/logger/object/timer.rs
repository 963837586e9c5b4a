use std::fmt;

use time::{format_description::well_known::Rfc3339, macros::format_description};
use tracing_subscriber::fmt::{format::Writer, time::FormatTime};

use crate::logger::object::timezone::LoggerTimeZone;

/// RFC3339 timestamp formatter used by the JSON layout.
///
/// Reads the offset on every invocation, so a local offset detected after
/// the subscriber was installed is still honoured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggerRfc3339 {
    tz: LoggerTimeZone,
}

impl LoggerRfc3339 {
    pub fn new(tz: LoggerTimeZone) -> Self {
        Self { tz }
    }
}

impl FormatTime for LoggerRfc3339 {
    fn format_time(&self, w: &mut Writer<'_>) -> fmt::Result {
        match self.tz.now().format(&Rfc3339) {
            Ok(ts) => write!(w, "{}", ts),
            Err(_) => write!(w, "<invalid-time>"),
        }
    }
}

/// Wall-clock formatter for the text layout: `2024-03-05 14:07:09 PM`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggerClock {
    tz: LoggerTimeZone,
}

impl LoggerClock {
    pub fn new(tz: LoggerTimeZone) -> Self {
        Self { tz }
    }
}

impl FormatTime for LoggerClock {
    fn format_time(&self, w: &mut Writer<'_>) -> fmt::Result {
        let format = format_description!("[year]-[month]-[day] [hour]:[minute]:[second] [period]");
        match self.tz.now().format(&format) {
            Ok(ts) => write!(w, "{}", ts),
            Err(_) => write!(w, "<invalid-time>"),
        }
    }
}
