use std::{
    io::{self, BufRead, BufReader, Read, Write},
    process::{Child, Command, ExitStatus, Stdio},
    sync::Arc,
    thread::{self, JoinHandle},
};

use tracing::{Level, warn};
use tracing_appender::non_blocking::NonBlocking;

use crate::{
    logger::{
        LoggerError, LoggerFilter, LoggerFormat, LoggerLevel, LoggerResult, LoggerTimeZone, log,
    },
    multiprocess::{
        WORKER_ENV, WORKER_FILTER_ENV, WORKER_FORMAT_ENV, WORKER_LEVEL_ENV, WORKER_TZ_ENV,
    },
};

/// Sinks of the main process that worker records are forwarded to.
#[derive(Clone)]
pub(crate) struct RelaySinks {
    /// Generation of the sink stack the relay belongs to.
    pub generation: u64,
    /// File writer and its threshold.
    pub file: Option<(NonBlocking, LoggerLevel)>,
    /// Console threshold.
    pub console: Option<LoggerLevel>,
    /// Level, layout and timezone workers are asked to log with.
    pub level: LoggerLevel,
    pub format: LoggerFormat,
    pub tz: LoggerTimeZone,
    /// Directives workers apply on top of `level`.
    pub filter: Option<LoggerFilter>,
}

impl RelaySinks {
    /// Routes one line read from a worker's stderr.
    fn forward(&self, pid: u32, line: &str) {
        // Sinks detached or replaced since the relay started.
        if log::current_generation() != Some(self.generation) {
            return;
        }
        if line.trim().is_empty() {
            return;
        }
        let Some(level) = crate::logger::object::layout::parse_level(line) else {
            warn!(target: "fancylog::worker", pid, "{line}");
            return;
        };

        let mut record = String::with_capacity(line.len() + 1);
        record.push_str(line);
        record.push('\n');

        if let Some((writer, threshold)) = &self.file {
            if threshold.allows(&level) {
                // One write is one message for the writer thread.
                let _ = writer.clone().write_all(record.as_bytes());
            }
        }
        if let Some(threshold) = self.console {
            if threshold.allows(&level) {
                let _ = if level <= Level::WARN {
                    io::stderr().lock().write_all(record.as_bytes())
                } else {
                    io::stdout().lock().write_all(record.as_bytes())
                };
            }
        }
    }
}

/// Forwards log records of worker processes into the main process sinks.
///
/// Workers log to their stderr (see [`init_worker_logging`](crate::init_worker_logging));
/// a pump thread per worker reads whole lines and hands each line to the
/// sinks in a single write, so records of concurrent workers never interleave.
pub struct WorkerRelay {
    sinks: Arc<RelaySinks>,
}

impl WorkerRelay {
    pub(crate) fn new(sinks: RelaySinks) -> Self {
        Self {
            sinks: Arc::new(sinks),
        }
    }

    /// Spawns `command` as a worker whose records are relayed.
    ///
    /// The child's stderr is replaced by a pipe; its stdout is left alone.
    pub fn spawn(&self, command: &mut Command) -> LoggerResult<WorkerHandle> {
        command
            .env(WORKER_ENV, "1")
            .env(WORKER_LEVEL_ENV, self.sinks.level.as_str())
            .env(WORKER_FORMAT_ENV, self.sinks.format.as_str())
            .env(WORKER_TZ_ENV, self.sinks.tz.as_str())
            .stderr(Stdio::piped());
        match &self.sinks.filter {
            Some(filter) => command.env(WORKER_FILTER_ENV, filter.as_str()),
            None => command.env_remove(WORKER_FILTER_ENV),
        };

        let mut child = command.spawn().map_err(LoggerError::Spawn)?;
        let pid = child.id();
        let Some(stderr) = child.stderr.take() else {
            let _ = child.kill();
            return Err(LoggerError::Spawn(io::Error::other(
                "worker stderr was not captured",
            )));
        };

        let sinks = Arc::clone(&self.sinks);
        let pump = thread::Builder::new()
            .name(format!("fancylog-relay-{pid}"))
            .spawn(move || pump(pid, stderr, &sinks));
        let pump = match pump {
            Ok(pump) => pump,
            Err(err) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(LoggerError::Spawn(err));
            }
        };

        Ok(WorkerHandle {
            child,
            pump: Some(pump),
        })
    }
}

fn pump(pid: u32, stream: impl Read, sinks: &RelaySinks) {
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::with_capacity(512);
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                sinks.forward(pid, line.trim_end_matches(['\n', '\r']));
            }
            Err(err) => {
                warn!(target: "fancylog::worker", pid, error = %err, "Lost the log stream of a worker");
                break;
            }
        }
    }
}

/// A worker process spawned through a [`WorkerRelay`].
pub struct WorkerHandle {
    child: Child,
    pump: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    pub fn id(&self) -> u32 {
        self.child.id()
    }

    /// Waits for the worker to exit and for its last records to be relayed.
    pub fn wait(mut self) -> LoggerResult<ExitStatus> {
        let status = self.child.wait().map_err(LoggerError::Spawn)?;
        self.drain();
        Ok(status)
    }

    fn drain(&mut self) {
        if let Some(pump) = self.pump.take() {
            let _ = pump.join();
        }
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        // The pump exits on its own once the child closes stderr.
        if matches!(self.child.try_wait(), Ok(Some(_))) {
            self.drain();
        }
    }
}
