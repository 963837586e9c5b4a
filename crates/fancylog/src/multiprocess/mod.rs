mod relay;
mod worker;

pub(crate) use relay::RelaySinks;
pub use relay::{WorkerHandle, WorkerRelay};
pub use worker::init_worker_logging;

use crate::logger::ActiveLogger;

/// Marks a process spawned by a [`WorkerRelay`].
pub const WORKER_ENV: &str = "FANCYLOG_WORKER";
/// Level the worker logs at.
pub const WORKER_LEVEL_ENV: &str = "FANCYLOG_WORKER_LEVEL";
/// Layout the worker logs in (`text` or `json`).
pub const WORKER_FORMAT_ENV: &str = "FANCYLOG_WORKER_FORMAT";
pub const WORKER_TZ_ENV: &str = "FANCYLOG_WORKER_TZ";
/// Filter directives of the main logger, when it has any.
pub const WORKER_FILTER_ENV: &str = "FANCYLOG_WORKER_FILTER";

/// Makes logging safe for worker processes of `logger`.
///
/// Idempotent. The relay costs nothing until a worker is spawned through
/// [`WorkerRelay::spawn`]; workers call [`init_worker_logging`] on startup.
///
/// # Examples
/// ```no_run
/// use std::process::Command;
///
/// let logger = fancylog::build("logs", &Default::default()).unwrap();
/// let relay = fancylog::enable_multiprocess_safety(&logger);
///
/// let worker = relay.spawn(&mut Command::new("./worker")).unwrap();
/// worker.wait().unwrap();
/// ```
pub fn enable_multiprocess_safety(logger: &ActiveLogger) -> &WorkerRelay {
    logger.relay()
}
