use std::{convert::TryFrom, str::FromStr};

use serde::{Deserialize, Serialize};
use tracing_subscriber::{EnvFilter, filter::LevelFilter};

use crate::logger::LoggerError;

/// Wrapper around a `tracing_subscriber::EnvFilter` directive string.
///
/// Narrows what reaches the sinks per module (e.g. `"my_crate=trace,hyper=warn"`).
/// Records without a matching directive fall back to the most verbose sink threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String")]
#[serde(into = "String")]
pub struct LoggerFilter(String);

impl LoggerFilter {
    /// Creates a new `LoggerFilter` from a string-like value.
    ///
    /// # Examples
    /// ```
    /// use fancylog::LoggerFilter;
    ///
    /// let filter = LoggerFilter::new("my_crate=trace,warn").unwrap();
    /// assert_eq!(filter.as_str(), "my_crate=trace,warn");
    /// ```
    pub fn new(s: impl Into<String>) -> Result<Self, LoggerError> {
        Self::try_from(s.into())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Builds an `EnvFilter` whose default directive is `default`.
    pub fn to_env_filter(&self, default: LevelFilter) -> EnvFilter {
        env_filter(Some(self), default)
    }
}

/// Global filter for a sink stack: `default` plus optional directives.
pub(crate) fn env_filter(filter: Option<&LoggerFilter>, default: LevelFilter) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(default.into())
        .parse_lossy(filter.map(LoggerFilter::as_str).unwrap_or_default())
}

impl FromStr for LoggerFilter {
    type Err = LoggerError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from(s.to_owned())
    }
}

impl TryFrom<String> for LoggerFilter {
    type Error = LoggerError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        match EnvFilter::try_new(&s) {
            Ok(_) => Ok(LoggerFilter(s)),
            Err(e) => Err(LoggerError::InvalidFilter(format!("{}: {}", s, e))),
        }
    }
}

impl From<LoggerFilter> for String {
    fn from(f: LoggerFilter) -> Self {
        f.0
    }
}
