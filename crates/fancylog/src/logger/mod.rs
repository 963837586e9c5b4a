mod builder;
mod config;
mod error;
pub(crate) mod log;
pub(crate) mod object;

pub use builder::{ActiveLogger, LoggerBuilder, build, disable_logging};
pub use config::{LogConfiguration, log_file_name};
pub use error::{LoggerError, LoggerResult};
pub use object::{
    LogLayout, LoggerClock, LoggerFilter, LoggerFormat, LoggerLevel, LoggerRfc3339,
    LoggerTimeZone, init_local_offset,
};

/// Sets up logging for a run and returns the handle that keeps it alive.
///
/// Creates `output_dir` if needed, opens `<program>_<YYYY-MM-DD>_<HH-MM-SS>.log`
/// inside it, writes the provenance header and installs the console and file
/// sinks into the global `tracing` subscriber. Once initialized, all `tracing`
/// macros (`info!`, `debug!`, etc.) go to these sinks.
///
/// Same as [`build`], with variables and parsed arguments for the header.
///
/// # Important: Local Timezone
/// For using `LoggerTimeZone::Local`, you **must** call [`init_local_offset`]
/// in `main()` function before spawning any threads.
///
/// # Examples
/// ```no_run
/// use fancylog::{Attributes, LogConfiguration, init_logger};
///
/// #[derive(serde::Serialize)]
/// struct Params {
///     epochs: u32,
/// }
///
/// fn main() {
///     let config = LogConfiguration::default().verbose(true);
///     let params = Attributes::of(&Params { epochs: 3 }).unwrap();
///     let _logger = init_logger("logs", &config, [params]).expect("Failed to initialize logger");
///
///     tracing::info!("Logger initialized successfully");
/// }
/// ```
pub fn init_logger(
    output_dir: impl AsRef<std::path::Path>,
    config: &LogConfiguration,
    variables: impl IntoIterator<Item = crate::provenance::Attributes>,
) -> LoggerResult<ActiveLogger> {
    LoggerBuilder::new(output_dir.as_ref(), config)
        .variables(variables)
        .build()
}
