use std::{
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
    sync::OnceLock,
};

use tracing::{debug, info, warn};
use tracing_appender::non_blocking::{NonBlocking, NonBlockingBuilder, WorkerGuard};

use crate::{
    logger::{
        config::LogConfiguration,
        error::{LoggerError, LoggerResult},
        log,
        object::LoggerFormat,
    },
    multiprocess::{RelaySinks, WorkerRelay},
    provenance::{
        ArgumentSnapshot, Attributes, CommandLine, GitProbe, RepositoryStatus, header::Provenance,
    },
};

/// Sets up logging for a run: destination file, provenance header and sinks.
///
/// [`build`](crate::build) is the shorthand for a builder without provenance inputs.
#[derive(Debug, Clone)]
pub struct LoggerBuilder {
    output_dir: PathBuf,
    config: LogConfiguration,
    variables: Vec<Attributes>,
    arguments: Option<ArgumentSnapshot>,
    command_line: Option<CommandLine>,
    git: GitProbe,
}

impl LoggerBuilder {
    pub fn new(output_dir: impl Into<PathBuf>, config: &LogConfiguration) -> Self {
        Self {
            output_dir: output_dir.into(),
            config: config.clone(),
            variables: Vec::new(),
            arguments: None,
            command_line: None,
            git: GitProbe::default(),
        }
    }

    /// Snapshots written to the `VARIABLES` section, in order.
    pub fn variables(mut self, variables: impl IntoIterator<Item = Attributes>) -> Self {
        self.variables.extend(variables);
        self
    }

    pub fn variable(mut self, variable: Attributes) -> Self {
        self.variables.push(variable);
        self
    }

    /// Parsed arguments written below the raw command line.
    pub fn arguments(mut self, arguments: ArgumentSnapshot) -> Self {
        self.arguments = Some(arguments);
        self
    }

    /// Overrides the captured process command line.
    pub fn command_line(mut self, command_line: CommandLine) -> Self {
        self.command_line = Some(command_line);
        self
    }

    pub fn git_probe(mut self, probe: GitProbe) -> Self {
        self.git = probe;
        self
    }

    /// Creates the log file, writes the header and installs the sinks.
    ///
    /// A second call replaces the sinks of the first one.
    ///
    /// # Errors
    /// - [`LoggerError::MalformedConfiguration`] for unusable flag combinations.
    /// - [`LoggerError::Filesystem`] if the directory or file cannot be created or
    ///   written; no log file is left behind.
    /// - [`LoggerError::AlreadyInitialized`] if another global subscriber is installed.
    pub fn build(self) -> LoggerResult<ActiveLogger> {
        let cfg = &self.config;
        cfg.validate(&self.output_dir)?;

        let started = cfg.tz.now();
        let repository = cfg.log_git_info.then(|| {
            let dir = cfg
                .repository
                .clone()
                .or_else(|| std::env::current_dir().ok())
                .unwrap_or_else(|| PathBuf::from("."));
            self.git.describe(&dir)
        });

        let file = if cfg.log_to_file {
            let path = self.output_dir.join(cfg.log_file_name(started));
            let header = Provenance {
                config: cfg,
                output_dir: &self.output_dir,
                started,
                repository: repository.as_ref(),
                command_line: &self.command_line.clone().unwrap_or_else(CommandLine::capture),
                arguments: self.arguments.as_ref(),
                variables: &self.variables,
            }
            .render();
            Some(open_log_file(&self.output_dir, path, &header)?)
        } else {
            None
        };

        let stack = log::main_stack(cfg, file.as_ref().map(|f| f.writer.clone()));
        let generation = match log::install(stack) {
            Ok(generation) => generation,
            Err(err) => {
                if let Some(file) = file {
                    file.discard();
                }
                return Err(err);
            }
        };

        let logger = ActiveLogger {
            config: self.config.clone(),
            generation,
            relay: OnceLock::new(),
            file,
        };

        info!("Starting logging");
        if logger.config.multiprocessing_aware {
            logger.relay();
            info!("Multiprocess relay active, logging from all worker processes");
        } else {
            info!("Not logging multiple processes");
        }
        if let Some(notice) = repository.as_ref().and_then(RepositoryStatus::notice) {
            info!("{notice}");
        }
        if let Some(path) = logger.log_file() {
            debug!(path = %path.display(), "Log file created");
        }
        Ok(logger)
    }
}

/// Shorthand for `LoggerBuilder::new(output_dir, config).build()`.
pub fn build(output_dir: impl AsRef<Path>, config: &LogConfiguration) -> LoggerResult<ActiveLogger> {
    LoggerBuilder::new(output_dir.as_ref(), config).build()
}

/// Detaches every sink, whichever [`ActiveLogger`] installed them.
pub fn disable_logging() -> LoggerResult<()> {
    log::detach(None).map(|_| ())
}

struct LogFile {
    path: PathBuf,
    writer: NonBlocking,
    guard: WorkerGuard,
}

impl LogFile {
    /// Stops the writer thread and removes the file.
    fn discard(self) {
        drop(self.writer);
        drop(self.guard);
        let _ = fs::remove_file(&self.path);
    }
}

/// Creates (or truncates) the log file, writes `header` and hands the file
/// to a lossless non-blocking writer.
fn open_log_file(dir: &Path, path: PathBuf, header: &str) -> LoggerResult<LogFile> {
    fs::create_dir_all(dir).map_err(|e| LoggerError::filesystem(dir, e))?;

    let mut file = File::create(&path).map_err(|e| LoggerError::filesystem(&path, e))?;
    if let Err(e) = file.write_all(header.as_bytes()).and_then(|()| file.flush()) {
        drop(file);
        let _ = fs::remove_file(&path);
        return Err(LoggerError::filesystem(&path, e));
    }

    let (writer, guard) = NonBlockingBuilder::default()
        .lossy(false)
        .thread_name("fancylog-writer")
        .finish(file);
    Ok(LogFile {
        path,
        writer,
        guard,
    })
}

/// Handle to the installed logging configuration.
///
/// Keep it alive for as long as the program logs. Dropping it detaches its
/// sinks (unless a later [`build`] already replaced them) and flushes the
/// log file.
pub struct ActiveLogger {
    config: LogConfiguration,
    generation: u64,
    relay: OnceLock<WorkerRelay>,
    file: Option<LogFile>,
}

impl ActiveLogger {
    /// Path of the log file, if file logging is enabled.
    pub fn log_file(&self) -> Option<&Path> {
        self.file.as_ref().map(|f| f.path.as_path())
    }

    pub fn config(&self) -> &LogConfiguration {
        &self.config
    }

    /// Whether this handle's sinks are still the installed ones.
    pub fn is_current(&self) -> bool {
        log::current_generation() == Some(self.generation)
    }

    /// The worker relay, started on first use.
    pub fn relay(&self) -> &WorkerRelay {
        self.relay.get_or_init(|| {
            let cfg = &self.config;
            WorkerRelay::new(RelaySinks {
                generation: self.generation,
                file: self
                    .file
                    .as_ref()
                    .map(|f| (f.writer.clone(), cfg.file_log_level)),
                console: cfg.log_to_console.then_some(cfg.console_log_level),
                level: cfg.most_verbose_level(),
                format: if cfg.log_to_file {
                    cfg.file_format
                } else {
                    LoggerFormat::Text
                },
                tz: cfg.tz,
                filter: cfg.filter.clone(),
            })
        })
    }
}

impl std::fmt::Debug for ActiveLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActiveLogger")
            .field("log_file", &self.log_file())
            .field("generation", &self.generation)
            .field("relay", &self.relay.get().is_some())
            .finish()
    }
}

impl Drop for ActiveLogger {
    fn drop(&mut self) {
        // A failed reload leaves the sinks in place, so they still get the warning.
        if let Err(err) = log::detach(Some(self.generation)) {
            warn!(error = %err, "Failed to detach logging sinks");
        }
        // Dropping the guard afterwards flushes the file.
    }
}
