pub mod filter;
pub use filter::LoggerFilter;

pub mod format;
pub use format::LoggerFormat;

pub mod layout;
pub use layout::LogLayout;

pub mod level;
pub use level::LoggerLevel;

pub mod timer;
pub use timer::{LoggerClock, LoggerRfc3339};

pub mod timezone;
pub use timezone::{LoggerTimeZone, init_local_offset};
