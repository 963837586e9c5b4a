use std::{
    fs,
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard, PoisonError},
};

use fancylog::{
    ArgValue, ArgumentSnapshot, Attributes, CommandLine, GitProbe, LogConfiguration, LoggerBuilder,
    LoggerError, LoggerFormat, LoggerLevel, build, disable_logging,
};
use tempfile::TempDir;
use tracing::{debug, info, trace, warn};

/// Every test here swaps the process-wide subscriber.
static SERIAL: Mutex<()> = Mutex::new(());

fn serial() -> MutexGuard<'static, ()> {
    SERIAL.lock().unwrap_or_else(PoisonError::into_inner)
}

fn file_only(program: &str) -> LogConfiguration {
    LogConfiguration {
        program: Some(program.into()),
        timestamp: false,
        log_to_console: false,
        log_git_info: false,
        ..Default::default()
    }
}

fn log_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "log"))
        .collect();
    files.sort();
    files
}

#[test]
fn creates_missing_destination_and_writes_header() {
    let _serial = serial();
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path().join("nested").join("logs");

    let logger = build(&dir, &file_only("train")).unwrap();
    info!("first record");
    let path = logger.log_file().unwrap().to_path_buf();
    drop(logger);

    assert_eq!(path, dir.join("train.log"));
    let contents = fs::read_to_string(&path).unwrap();
    assert!(contents.starts_with("**************  LOG  **************\n\nRan at: "));
    assert!(contents.contains(&format!("Output directory: {}", dir.display())));
    assert!(contents.contains("**************  COMMAND LINE ARGUMENTS  **************"));
    assert!(contents.contains("**************  LOGGING  **************\n\n"));
    assert!(!contents.contains("GIT INFO"));

    let records: Vec<&str> = contents
        .lines()
        .filter(|line| line.contains(" - INFO - main["))
        .collect();
    assert!(records[0].ends_with(" - Starting logging"));
    assert!(records[1].ends_with(" - Not logging multiple processes"));
    assert!(records[2].ends_with(" - first record"));
}

#[test]
fn timestamped_file_name() {
    let _serial = serial();
    let tmp = TempDir::new().unwrap();
    let cfg = LogConfiguration {
        timestamp: true,
        ..file_only("stamped")
    };

    let logger = build(tmp.path(), &cfg).unwrap();
    let name = logger
        .log_file()
        .unwrap()
        .file_name()
        .unwrap()
        .to_string_lossy()
        .into_owned();
    drop(logger);

    // stamped_YYYY-MM-DD_HH-MM-SS.log
    let stamp = name
        .strip_prefix("stamped_")
        .and_then(|rest| rest.strip_suffix(".log"))
        .unwrap();
    assert_eq!(stamp.len(), 19);
    assert_eq!(&stamp[10..11], "_");
    assert!(stamp.chars().all(|c| c.is_ascii_digit() || c == '-' || c == '_'));
}

#[test]
fn records_below_threshold_are_dropped() {
    let _serial = serial();
    let tmp = TempDir::new().unwrap();
    let cfg = LogConfiguration {
        file_log_level: LoggerLevel::Info,
        ..file_only("levels")
    };

    let logger = build(tmp.path(), &cfg).unwrap();
    trace!("trace marker");
    debug!("debug marker");
    info!("info marker");
    warn!("warn marker");
    tracing::error!("error marker");
    let path = logger.log_file().unwrap().to_path_buf();
    drop(logger);

    let contents = fs::read_to_string(path).unwrap();
    assert!(!contents.contains("trace marker"));
    assert!(!contents.contains("debug marker"));
    for (level, marker) in [
        ("INFO", "info marker"),
        ("WARNING", "warn marker"),
        ("ERROR", "error marker"),
    ] {
        let lines: Vec<&str> = contents.lines().filter(|l| l.contains(marker)).collect();
        assert_eq!(lines.len(), 1, "{marker} must appear exactly once");
        assert!(lines[0].contains(&format!(" - {level} - ")));
    }
}

#[test]
fn debug_records_reach_the_file_by_default() {
    let _serial = serial();
    let tmp = TempDir::new().unwrap();

    let logger = build(tmp.path(), &file_only("verbose")).unwrap();
    debug!("debug marker");
    let path = logger.log_file().unwrap().to_path_buf();
    drop(logger);

    let contents = fs::read_to_string(path).unwrap();
    assert_eq!(contents.matches("debug marker").count(), 1);
}

#[test]
fn filter_directives_narrow_every_sink() {
    let _serial = serial();
    let tmp = TempDir::new().unwrap();
    let cfg = LogConfiguration {
        filter: Some("logger=warn".parse().unwrap()),
        ..file_only("filtered")
    };

    let logger = build(tmp.path(), &cfg).unwrap();
    info!("filtered out");
    warn!("kept");
    let path = logger.log_file().unwrap().to_path_buf();
    drop(logger);

    let contents = fs::read_to_string(path).unwrap();
    assert!(!contents.contains("filtered out"));
    assert!(contents.contains("kept"));
}

#[test]
fn rebuilding_replaces_the_sinks() {
    let _serial = serial();
    let tmp = TempDir::new().unwrap();

    let first = build(tmp.path(), &file_only("first")).unwrap();
    let second = build(tmp.path(), &file_only("second")).unwrap();
    info!("idempotence marker");

    assert!(!first.is_current());
    assert!(second.is_current());

    // A stale handle must not detach the sinks installed after it.
    drop(first);
    info!("after stale drop");
    drop(second);

    let mut markers = 0;
    for path in log_files(tmp.path()) {
        markers += fs::read_to_string(path)
            .unwrap()
            .matches("idempotence marker")
            .count();
    }
    assert_eq!(markers, 1);

    let second = fs::read_to_string(tmp.path().join("second.log")).unwrap();
    assert!(second.contains("idempotence marker"));
    assert!(second.contains("after stale drop"));
}

#[test]
fn rebuilding_on_the_same_file_does_not_duplicate_records() {
    let _serial = serial();
    let tmp = TempDir::new().unwrap();

    let first = build(tmp.path(), &file_only("same")).unwrap();
    drop(first);
    let second = build(tmp.path(), &file_only("same")).unwrap();
    info!("single marker");
    drop(second);

    let contents = fs::read_to_string(tmp.path().join("same.log")).unwrap();
    assert_eq!(contents.matches("single marker").count(), 1);
    assert_eq!(contents.matches("Starting logging").count(), 1);
}

#[test]
fn json_file_format() {
    let _serial = serial();
    let tmp = TempDir::new().unwrap();
    let cfg = LogConfiguration {
        file_format: LoggerFormat::Json,
        ..file_only("structured")
    };

    let logger = build(tmp.path(), &cfg).unwrap();
    info!(answer = 42, "json marker");
    let path = logger.log_file().unwrap().to_path_buf();
    drop(logger);

    let contents = fs::read_to_string(path).unwrap();
    let (_, records) = contents
        .split_once("**************  LOGGING  **************\n\n")
        .unwrap();
    let records: Vec<serde_json::Value> = records
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();

    let marker = records
        .iter()
        .find(|r| r["fields"]["message"] == "json marker")
        .unwrap();
    assert_eq!(marker["level"], "INFO");
    assert_eq!(marker["fields"]["answer"], 42);
    assert!(marker["timestamp"].as_str().unwrap().ends_with('Z'));
    assert!(marker["filename"].as_str().unwrap().ends_with("logger.rs"));
    assert!(marker["line_number"].is_u64());
}

#[test]
fn uncreatable_destination_fails_without_leaving_a_file() {
    let _serial = serial();
    let tmp = TempDir::new().unwrap();
    let blocker = tmp.path().join("blocker");
    fs::write(&blocker, "not a directory").unwrap();

    let err = build(blocker.join("logs"), &file_only("nowhere")).unwrap_err();
    assert!(matches!(err, LoggerError::Filesystem { .. }));
    assert!(log_files(tmp.path()).is_empty());
}

#[test]
fn rejects_configuration_without_sinks() {
    let _serial = serial();
    let tmp = TempDir::new().unwrap();
    let cfg = LogConfiguration {
        log_to_file: false,
        ..file_only("silent")
    };

    let err = build(tmp.path(), &cfg).unwrap_err();
    assert!(matches!(err, LoggerError::MalformedConfiguration(_)));
    assert!(log_files(tmp.path()).is_empty());
}

#[test]
fn console_only_logger_creates_no_file() {
    let _serial = serial();
    let tmp = TempDir::new().unwrap();
    let cfg = LogConfiguration {
        log_to_file: false,
        log_to_console: true,
        use_color: false,
        console_log_level: LoggerLevel::Error,
        ..file_only("console")
    };

    let logger = build(tmp.path().join("unused"), &cfg).unwrap();
    assert!(logger.log_file().is_none());
    drop(logger);
    assert!(!tmp.path().join("unused").exists());
}

#[test]
fn disable_logging_detaches_every_sink() {
    let _serial = serial();
    let tmp = TempDir::new().unwrap();

    let logger = build(tmp.path(), &file_only("disabled")).unwrap();
    info!("before disable");
    disable_logging().unwrap();
    info!("after disable");
    assert!(!logger.is_current());
    let path = logger.log_file().unwrap().to_path_buf();
    drop(logger);

    let contents = fs::read_to_string(path).unwrap();
    assert!(contents.contains("before disable"));
    assert!(!contents.contains("after disable"));
}

#[test]
fn header_records_provenance() {
    let _serial = serial();
    let tmp = TempDir::new().unwrap();
    let cfg = LogConfiguration {
        version: Some("0.4.1".into()),
        log_header: "TRAINING RUN".into(),
        log_git_info: true,
        repository: Some(tmp.path().to_path_buf()),
        ..file_only("provenance")
    };

    let logger = LoggerBuilder::new(tmp.path(), &cfg)
        .command_line(CommandLine::from_args(["train", "--epochs", "3"]))
        .arguments(ArgumentSnapshot::new().with("epochs", ArgValue::Single("3".into())))
        .variable(Attributes::new("Params").with("lr", 0.01).with("_hidden", 1))
        .git_probe(GitProbe::with_program("fancylog-no-such-git-binary"))
        .build()
        .unwrap();
    let path = logger.log_file().unwrap().to_path_buf();
    drop(logger);

    let contents = fs::read_to_string(path).unwrap();
    assert!(contents.starts_with("**************  TRAINING RUN  **************"));
    assert!(contents.contains("Version: 0.4.1"));
    assert!(contents.contains(
        "**************  GIT INFO  **************\n\nGit is not available. \
         Cannot check if software is in a git repository"
    ));
    assert!(contents.contains("Command: train\nInput arguments: [\"--epochs\", \"3\"]"));
    assert!(contents.contains("epochs: 3"));
    assert!(contents.contains("**************  VARIABLES  **************\n\nParams:\nlr: 0.01"));
    assert!(!contents.contains("_hidden"));

    // The notice is also logged once logging has started.
    let notices = contents
        .lines()
        .filter(|line| line.contains(" - INFO - ") && line.contains("Git is not available"))
        .count();
    assert_eq!(notices, 1);
}
