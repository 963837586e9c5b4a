use std::{env, str::FromStr};

use crate::{
    logger::{LoggerFilter, LoggerFormat, LoggerLevel, LoggerResult, LoggerTimeZone, log},
    multiprocess::{
        WORKER_ENV, WORKER_FILTER_ENV, WORKER_FORMAT_ENV, WORKER_LEVEL_ENV, WORKER_TZ_ENV,
    },
};

/// Settings a relay passes to its workers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct WorkerSettings {
    pub level: LoggerLevel,
    pub filter: Option<LoggerFilter>,
    pub format: LoggerFormat,
    pub tz: LoggerTimeZone,
}

impl WorkerSettings {
    /// Reads the settings from `lookup`, or `None` if the process was not
    /// spawned by a relay. Unparsable values fall back to defaults.
    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Option<Self> {
        lookup(WORKER_ENV)?;
        Some(Self {
            level: parse_or_default(lookup(WORKER_LEVEL_ENV), LoggerLevel::Debug),
            filter: lookup(WORKER_FILTER_ENV).and_then(|f| f.parse().ok()),
            format: parse_or_default(lookup(WORKER_FORMAT_ENV), LoggerFormat::Text),
            tz: parse_or_default(lookup(WORKER_TZ_ENV), LoggerTimeZone::Utc),
        })
    }

    fn from_env() -> Option<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }
}

fn parse_or_default<T: FromStr>(value: Option<String>, default: T) -> T {
    value.and_then(|v| v.parse().ok()).unwrap_or(default)
}

/// Sets up logging in a worker process spawned by a [`WorkerRelay`](crate::WorkerRelay).
///
/// Records are written to stderr in the layout the main process expects,
/// at the level it asked for. Returns `Ok(false)` and installs nothing when
/// the process was not spawned by a relay, so it is safe to call
/// unconditionally at the top of a worker's `main`.
///
/// # Examples
/// ```no_run
/// fn main() {
///     fancylog::init_worker_logging().expect("worker logging");
///     tracing::info!("processing shard");
/// }
/// ```
pub fn init_worker_logging() -> LoggerResult<bool> {
    let Some(settings) = WorkerSettings::from_env() else {
        return Ok(false);
    };
    log::install(log::worker_stack(
        settings.level,
        settings.filter.as_ref(),
        settings.format,
        settings.tz,
    ))?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn absent_marker_means_not_a_worker() {
        let settings = WorkerSettings::from_lookup(lookup(&[(WORKER_LEVEL_ENV, "info")]));
        assert_eq!(settings, None);
    }

    #[test]
    fn reads_settings_passed_by_the_relay() {
        let settings = WorkerSettings::from_lookup(lookup(&[
            (WORKER_ENV, "1"),
            (WORKER_LEVEL_ENV, "warning"),
            (WORKER_FORMAT_ENV, "json"),
            (WORKER_TZ_ENV, "local"),
            (WORKER_FILTER_ENV, "etl=trace,warn"),
        ]));
        assert_eq!(
            settings,
            Some(WorkerSettings {
                level: LoggerLevel::Warning,
                filter: Some(LoggerFilter::new("etl=trace,warn").unwrap()),
                format: LoggerFormat::Json,
                tz: LoggerTimeZone::Local,
            })
        );
    }

    #[test]
    fn garbage_values_fall_back_to_defaults() {
        let settings = WorkerSettings::from_lookup(lookup(&[
            (WORKER_ENV, "1"),
            (WORKER_LEVEL_ENV, "loud"),
            (WORKER_FILTER_ENV, "etl=loud"),
        ]));
        assert_eq!(
            settings,
            Some(WorkerSettings {
                level: LoggerLevel::Debug,
                filter: None,
                format: LoggerFormat::Text,
                tz: LoggerTimeZone::Utc,
            })
        );
    }
}
