use std::{
    env,
    path::PathBuf,
    process::{Command, ExitCode},
};

use clap::{CommandFactory, FromArgMatches, Parser, Subcommand};
use serde::Serialize;
use tracing::{debug, info, warn};

use fancylog::{
    ArgumentSnapshot, Attributes, LogConfiguration, LoggerBuilder, LoggerFormat, SubLogOptions,
    enable_multiprocess_safety, init_local_offset, init_worker_logging, sub_log,
};

/// Fancylog example.
#[derive(Debug, Parser)]
#[command(name = "fancylog-demo")]
struct Cli {
    /// Directory for log files.
    directory: Option<PathBuf>,

    /// Print debug records on the console.
    #[arg(short, long)]
    verbose: bool,

    /// Write the log file as JSON lines.
    #[arg(long)]
    json: bool,

    /// Number of worker processes to spawn.
    #[arg(long, default_value_t = 0)]
    workers: usize,

    #[command(subcommand)]
    role: Option<Role>,
}

#[derive(Debug, Subcommand)]
enum Role {
    /// Runs as a worker of another demo process.
    Worker {
        #[arg(long)]
        id: usize,
    },
}

#[derive(Debug, Serialize)]
struct MadeUpPaths {
    path1: String,
    path2: String,
    path3: String,
}

#[derive(Debug, Serialize)]
struct MadeUpArgs {
    arg1: bool,
    another_arg: String,
    the_last_arg: u32,
}

fn main() -> anyhow::Result<ExitCode> {
    // 0) before any thread exists
    init_local_offset();

    let matches = Cli::command().get_matches();
    let cli = Cli::from_arg_matches(&matches)?;

    if let Some(Role::Worker { id }) = cli.role {
        return worker(id);
    }
    let Some(directory) = cli.directory else {
        Cli::command().print_help()?;
        return Ok(ExitCode::FAILURE);
    };

    // 1) variables
    let args = MadeUpArgs {
        arg1: true,
        another_arg: "path/to/somewhere".into(),
        the_last_arg: 1000,
    };
    let paths = MadeUpPaths {
        path1: "/path/to/the_first_place".into(),
        path2: "/path/to/the_second_place".into(),
        path3: "/path/to/the_third_place".into(),
    };

    // 2) logger
    let cfg = LogConfiguration {
        program: Some("fancylog-demo".into()),
        version: Some(env!("CARGO_PKG_VERSION").into()),
        file_format: if cli.json {
            LoggerFormat::Json
        } else {
            LoggerFormat::Text
        },
        multiprocessing_aware: cli.workers > 0,
        ..Default::default()
    }
    .verbose(cli.verbose);

    let logger = LoggerBuilder::new(&directory, &cfg)
        .arguments(ArgumentSnapshot::from_matches(&Cli::command(), &matches))
        .variable(Attributes::of(&args)?)
        .variable(Attributes::of(&paths)?)
        .build()?;

    info!("This is an info message");
    debug!("This is a debug message");

    // 3) workers
    if cli.workers > 0 {
        let relay = enable_multiprocess_safety(&logger);
        let exe = env::current_exe()?;
        let handles = (0..cli.workers)
            .map(|id| relay.spawn(Command::new(&exe).args(["worker", "--id", &id.to_string()])))
            .collect::<Result<Vec<_>, _>>()?;
        for handle in handles {
            let status = handle.wait()?;
            info!(%status, "Worker finished");
        }
    }

    // 4) sub-log
    let status = sub_log(
        "listing",
        &directory,
        SubLogOptions::default(),
        |sl| -> anyhow::Result<_> {
            info!("Listing the output directory");
            Ok(sl.run_subprocess(Command::new("ls").arg("-l").arg(&directory))?.status)
        },
    )??;
    info!(%status, "Listing finished");

    warn!("This fun logging experience is about to end :(");
    Ok(ExitCode::SUCCESS)
}

fn worker(id: usize) -> anyhow::Result<ExitCode> {
    if !init_worker_logging()? {
        anyhow::bail!("the worker role is only meant to be spawned by the demo itself");
    }
    for step in 0..3 {
        info!(worker = id, step, "Working");
    }
    debug!(worker = id, "Worker done");
    Ok(ExitCode::SUCCESS)
}
