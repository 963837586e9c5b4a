use std::{
    io,
    sync::{Mutex, MutexGuard, PoisonError},
};

use tracing::Level;
use tracing_appender::non_blocking::NonBlocking;
use tracing_subscriber::{
    Layer, Registry,
    filter::LevelFilter,
    fmt::{self, writer::MakeWriterExt},
    layer::SubscriberExt,
    reload,
    util::SubscriberInitExt,
};

use crate::logger::{
    config::LogConfiguration,
    error::{LoggerError, LoggerResult},
    object::{
        LogLayout, LoggerFilter, LoggerFormat, LoggerLevel, LoggerRfc3339, LoggerTimeZone,
        filter::env_filter,
    },
};

/// A complete set of sinks with their global filter, swapped as a unit.
pub(crate) type SinkStack = Box<dyn Layer<Registry> + Send + Sync>;

/// Reload handle of the process-wide subscriber.
///
/// `generation` grows on every swap so that a stale [`ActiveLogger`](crate::ActiveLogger)
/// can tell it no longer owns the installed sinks.
struct Switchboard {
    handle: reload::Handle<SinkStack, Registry>,
    generation: u64,
}

static SWITCHBOARD: Mutex<Option<Switchboard>> = Mutex::new(None);

fn switchboard() -> MutexGuard<'static, Option<Switchboard>> {
    SWITCHBOARD.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Installs `stack` as the process-wide sink stack.
///
/// The first call registers the global subscriber; later calls replace the
/// previous stack in place. Returns the generation of the new stack.
pub(crate) fn install(stack: SinkStack) -> LoggerResult<u64> {
    let mut board = switchboard();
    if let Some(board) = board.as_mut() {
        board
            .handle
            .reload(stack)
            .map_err(|e| LoggerError::Reload(e.to_string()))?;
        board.generation += 1;
        return Ok(board.generation);
    }

    let (layer, handle) = reload::Layer::new(stack);
    tracing_subscriber::registry()
        .with(layer)
        .try_init()
        .map_err(|_| LoggerError::AlreadyInitialized)?;

    *board = Some(Switchboard {
        handle,
        generation: 1,
    });
    Ok(1)
}

/// Detaches every sink.
///
/// With `Some(generation)` the sinks are only detached while that generation
/// is still installed. Returns whether anything was detached.
pub(crate) fn detach(generation: Option<u64>) -> LoggerResult<bool> {
    let mut board = switchboard();
    let Some(board) = board.as_mut() else {
        return Ok(false);
    };
    if generation.is_some_and(|owner| owner != board.generation) {
        return Ok(false);
    }

    board
        .handle
        .reload(LevelFilter::OFF.boxed())
        .map_err(|e| LoggerError::Reload(e.to_string()))?;
    board.generation += 1;
    Ok(true)
}

pub(crate) fn current_generation() -> Option<u64> {
    switchboard().as_ref().map(|board| board.generation)
}

/// Builds the sink stack of the main process: console and file sinks
/// behind one global filter.
///
/// Per-sink thresholds are enforced by the writers, so a record is formatted
/// at most once per sink and never reaches a sink below its threshold.
pub(crate) fn main_stack(cfg: &LogConfiguration, file: Option<NonBlocking>) -> SinkStack {
    let mut sinks: Vec<SinkStack> = Vec::with_capacity(2);

    if cfg.log_to_console {
        sinks.push(console_sink(
            LogLayout::main(cfg.tz),
            cfg.console_log_level,
            cfg.should_use_color(),
        ));
    }
    if let Some(writer) = file.filter(|_| cfg.log_to_file) {
        let writer = writer.with_max_level(cfg.file_log_level.as_level());
        sinks.push(match cfg.file_format {
            LoggerFormat::Json => json_sink(cfg.tz, writer),
            LoggerFormat::Text => fmt::layer()
                .event_format(LogLayout::main(cfg.tz))
                .with_ansi(false)
                .with_writer(writer)
                .boxed(),
        });
    }

    let filter = env_filter(cfg.filter.as_ref(), cfg.most_verbose_level().as_filter());
    filter.and_then(sinks).boxed()
}

/// Builds the sink stack of a worker process: every record goes to stderr,
/// where the parent's relay picks it up.
pub(crate) fn worker_stack(
    level: LoggerLevel,
    filter: Option<&LoggerFilter>,
    format: LoggerFormat,
    tz: LoggerTimeZone,
) -> SinkStack {
    let sink = match format {
        LoggerFormat::Json => json_sink(tz, io::stderr),
        LoggerFormat::Text => fmt::layer()
            .event_format(LogLayout::worker(tz))
            .with_ansi(false)
            .with_writer(io::stderr)
            .boxed(),
    };
    env_filter(filter, level.as_filter()).and_then(sink).boxed()
}

/// Console sink: WARNING and above go to stderr, the rest to stdout.
pub(crate) fn console_sink(layout: LogLayout, level: LoggerLevel, ansi: bool) -> SinkStack {
    let writer = io::stderr
        .with_max_level(Level::WARN)
        .or_else(io::stdout)
        .with_max_level(level.as_level());

    fmt::layer()
        .event_format(layout)
        .with_ansi(ansi)
        .with_writer(writer)
        .boxed()
}

fn json_sink<W>(tz: LoggerTimeZone, writer: W) -> SinkStack
where
    W: for<'w> fmt::MakeWriter<'w> + Send + Sync + 'static,
{
    fmt::layer()
        .json()
        .with_current_span(false)
        .with_span_list(false)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false)
        .with_timer(LoggerRfc3339::new(tz))
        .with_writer(writer)
        .boxed()
}
