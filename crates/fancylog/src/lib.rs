mod logger;
pub use logger::*;

mod provenance;
pub use provenance::*;

mod multiprocess;
pub use multiprocess::*;

mod sublog;
pub use sublog::{CaptureConfig, SubLog, SubLogOptions, sub_log};
