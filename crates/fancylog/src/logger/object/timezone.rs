use std::{fmt, str::FromStr, sync::Mutex};

use serde::{Deserialize, Serialize};
use time::{OffsetDateTime, UtcOffset};

use crate::logger::error::LoggerError;

/// Detected local offset; `None` until the first detection attempt.
static LOCAL_OFFSET: Mutex<Option<UtcOffset>> = Mutex::new(None);

/// Timezone of record timestamps, the file-name stamp and the `Ran at` line.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LoggerTimeZone {
    #[default]
    Utc,
    /// System timezone. See [`init_local_offset`].
    Local,
}

impl LoggerTimeZone {
    pub fn offset(self) -> UtcOffset {
        match self {
            Self::Utc => UtcOffset::UTC,
            Self::Local => local_offset(),
        }
    }

    pub fn now(self) -> OffsetDateTime {
        OffsetDateTime::now_utc().to_offset(self.offset())
    }

    /// Human-readable form for the log header: `UTC` or `local (UTC+02)`.
    pub fn describe(self, at: OffsetDateTime) -> String {
        match self {
            Self::Utc => "UTC".to_string(),
            Self::Local => format!("local ({})", offset_label(at.offset())),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Utc => "utc",
            Self::Local => "local",
        }
    }
}

impl FromStr for LoggerTimeZone {
    type Err = LoggerError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [Self::Utc, Self::Local]
            .into_iter()
            .find(|tz| s.trim().eq_ignore_ascii_case(tz.as_str()))
            .ok_or_else(|| LoggerError::InvalidTimeZone(s.to_string()))
    }
}

impl fmt::Display for LoggerTimeZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Detects the local UTC offset while the process is still single-threaded.
///
/// **Call it first thing in `main()`**: on most Unix platforms the offset
/// cannot be read once other threads exist, and [`LoggerTimeZone::Local`]
/// then falls back to UTC. Worker processes spawned through a
/// [`WorkerRelay`](crate::WorkerRelay) should call it too.
///
/// # Example
/// ```no_run
/// use fancylog::{LogConfiguration, LoggerTimeZone, build, init_local_offset};
///
/// fn main() {
///     init_local_offset();
///
///     let cfg = LogConfiguration {
///         tz: LoggerTimeZone::Local,
///         ..Default::default()
///     };
///     let _logger = build("logs", &cfg).unwrap();
/// }
/// ```
pub fn init_local_offset() {
    let detected = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    *lock_offset() = Some(detected);
}

fn lock_offset() -> std::sync::MutexGuard<'static, Option<UtcOffset>> {
    LOCAL_OFFSET
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

fn local_offset() -> UtcOffset {
    let mut slot = lock_offset();
    *slot.get_or_insert_with(|| {
        UtcOffset::current_local_offset().unwrap_or_else(|_| {
            eprintln!(
                "fancylog: local timezone could not be detected, using UTC. \
                 Call init_local_offset() before spawning threads."
            );
            UtcOffset::UTC
        })
    })
}

/// `UTC+02`, `UTC+05:30`, `UTC-03`.
fn offset_label(offset: UtcOffset) -> String {
    let (hours, minutes, _) = offset.as_hms();
    match minutes {
        0 => format!("UTC{hours:+03}"),
        m => format!("UTC{hours:+03}:{:02}", m.unsigned_abs()),
    }
}
