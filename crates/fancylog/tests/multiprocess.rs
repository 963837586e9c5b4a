use std::{
    collections::BTreeSet,
    env, fs,
    process::{Command, Stdio},
    sync::{Mutex, MutexGuard, PoisonError},
};

use fancylog::{
    LogConfiguration, LoggerFormat, WorkerHandle, build, disable_logging, enable_multiprocess_safety,
};
use tempfile::TempDir;
use tracing::{info, warn};

/// Set on the re-executed test binary to make `worker_entry` act as a worker.
const WORKER_ID: &str = "FANCYLOG_TEST_WORKER_ID";
const LINES: usize = 1000;

static SERIAL: Mutex<()> = Mutex::new(());

fn serial() -> MutexGuard<'static, ()> {
    SERIAL.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Body of a worker process. A no-op in the regular test run.
#[test]
fn worker_entry() {
    let Ok(id) = env::var(WORKER_ID) else {
        return;
    };
    assert!(fancylog::init_worker_logging().unwrap());

    for seq in 0..LINES {
        info!(worker = %id, seq, "worker line");
    }
    warn!(worker = %id, "worker finished");
    eprintln!("raw worker noise");
}

fn spawn_worker(relay: &fancylog::WorkerRelay, id: usize) -> WorkerHandle {
    let exe = env::current_exe().unwrap();
    relay
        .spawn(
            Command::new(exe)
                .args(["worker_entry", "--exact", "--nocapture", "--test-threads=1"])
                .env(WORKER_ID, id.to_string())
                .stdout(Stdio::null()),
        )
        .unwrap()
}

fn relay_config(format: LoggerFormat) -> LogConfiguration {
    LogConfiguration {
        program: Some("relay".into()),
        timestamp: false,
        log_to_console: false,
        log_git_info: false,
        multiprocessing_aware: true,
        file_format: format,
        ..Default::default()
    }
}

#[test]
fn not_a_worker_without_a_relay() {
    if env::var(WORKER_ID).is_ok() {
        return;
    }
    assert!(!fancylog::init_worker_logging().unwrap());
}

#[test]
fn relays_worker_lines_without_interleaving() {
    if env::var(WORKER_ID).is_ok() {
        return;
    }
    let _serial = serial();
    let tmp = TempDir::new().unwrap();

    let logger = build(tmp.path(), &relay_config(LoggerFormat::Text)).unwrap();
    let relay = enable_multiprocess_safety(&logger);
    let workers: Vec<WorkerHandle> = (0..2).map(|id| spawn_worker(relay, id)).collect();

    for seq in 0..LINES {
        info!(seq, "parent line");
    }
    for worker in workers {
        assert!(worker.wait().unwrap().success());
    }
    let path = logger.log_file().unwrap().to_path_buf();
    drop(logger);

    let contents = fs::read_to_string(path).unwrap();
    assert!(contents.contains("Multiprocess relay active"));

    let (_, records) = contents
        .split_once("**************  LOGGING  **************\n\n")
        .unwrap();
    for line in records.lines() {
        let columns: Vec<&str> = line.splitn(4, " - ").collect();
        assert_eq!(columns.len(), 4, "mangled record: {line:?}");
        assert!(
            ["DEBUG", "INFO", "WARNING"].contains(&columns[1]),
            "mangled record: {line:?}"
        );
    }

    let parent: Vec<&str> = records
        .lines()
        .filter(|l| l.contains(" - parent line "))
        .collect();
    assert_eq!(parent.len(), LINES);
    assert!(parent.iter().all(|l| l.contains(" - INFO - main[")));

    for id in 0..2 {
        let tag = format!("worker line worker={id} seq=");
        let seqs: BTreeSet<usize> = records
            .lines()
            .filter(|l| l.contains(" - INFO - worker[") && l.contains(&tag))
            .map(|l| l.rsplit('=').next().unwrap().parse().unwrap())
            .collect();
        assert_eq!(seqs.len(), LINES, "worker {id} lost lines");
    }

    let noise: Vec<&str> = records
        .lines()
        .filter(|l| l.contains(" - raw worker noise pid="))
        .collect();
    assert_eq!(noise.len(), 2);
    assert!(noise.iter().all(|l| l.contains(" - WARNING - main[")));
}

#[test]
fn relays_json_workers() {
    if env::var(WORKER_ID).is_ok() {
        return;
    }
    let _serial = serial();
    let tmp = TempDir::new().unwrap();

    let logger = build(tmp.path(), &relay_config(LoggerFormat::Json)).unwrap();
    let worker = spawn_worker(enable_multiprocess_safety(&logger), 7);
    assert!(worker.wait().unwrap().success());
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

    let worker_lines = records
        .iter()
        .filter(|r| r["fields"]["message"] == "worker line" && r["fields"]["worker"] == "7")
        .count();
    assert_eq!(worker_lines, LINES);
}

fn records_of(contents: &str) -> &str {
    contents
        .split_once("**************  LOGGING  **************\n\n")
        .map(|(_, records)| records)
        .unwrap()
}

#[test]
fn disabled_logging_drops_worker_lines() {
    if env::var(WORKER_ID).is_ok() {
        return;
    }
    let _serial = serial();
    let tmp = TempDir::new().unwrap();

    let logger = build(tmp.path(), &relay_config(LoggerFormat::Text)).unwrap();
    let relay = enable_multiprocess_safety(&logger);
    disable_logging().unwrap();

    assert!(spawn_worker(relay, 3).wait().unwrap().success());
    let path = logger.log_file().unwrap().to_path_buf();
    drop(logger);

    let contents = fs::read_to_string(path).unwrap();
    let records = records_of(&contents);
    assert!(!records.contains("worker line"));
    assert!(!records.contains("worker finished"));
    assert!(!records.contains("raw worker noise"));
}

#[test]
fn replaced_logger_stops_relaying() {
    if env::var(WORKER_ID).is_ok() {
        return;
    }
    let _serial = serial();
    let tmp = TempDir::new().unwrap();

    let first = build(tmp.path().join("first"), &relay_config(LoggerFormat::Text)).unwrap();
    let stale_relay = enable_multiprocess_safety(&first);
    let second = build(tmp.path().join("second"), &relay_config(LoggerFormat::Text)).unwrap();

    assert!(spawn_worker(stale_relay, 4).wait().unwrap().success());
    let paths = [
        first.log_file().unwrap().to_path_buf(),
        second.log_file().unwrap().to_path_buf(),
    ];
    drop(first);
    drop(second);

    for path in paths {
        let contents = fs::read_to_string(&path).unwrap();
        assert!(
            !records_of(&contents).contains("worker line"),
            "{} received lines from a stale relay",
            path.display()
        );
    }
}

#[test]
fn workers_apply_the_filter_directives() {
    if env::var(WORKER_ID).is_ok() {
        return;
    }
    let _serial = serial();
    let tmp = TempDir::new().unwrap();
    let cfg = LogConfiguration {
        filter: Some("multiprocess=warn".parse().unwrap()),
        ..relay_config(LoggerFormat::Text)
    };

    let logger = build(tmp.path(), &cfg).unwrap();
    let worker = spawn_worker(enable_multiprocess_safety(&logger), 5);
    info!("parent info");
    warn!("parent warning");
    assert!(worker.wait().unwrap().success());
    let path = logger.log_file().unwrap().to_path_buf();
    drop(logger);

    let contents = fs::read_to_string(path).unwrap();
    let records = records_of(&contents);
    assert!(!records.contains("parent info"));
    assert!(records.contains("parent warning"));
    assert!(!records.contains("worker line"));

    let finished: Vec<&str> = records
        .lines()
        .filter(|l| l.contains("worker finished worker=5"))
        .collect();
    assert_eq!(finished.len(), 1);
    assert!(finished[0].contains(" - WARNING - worker["));
}
