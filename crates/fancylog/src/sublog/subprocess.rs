use std::{
    borrow::Cow,
    process::{Command, Output, Stdio},
};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    logger::{LoggerError, LoggerResult},
    sublog::SubLog,
};

/// How captured subprocess output is logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Max line length before truncation.
    pub max_line_length: usize,
    /// Log stdout at INFO level (false = DEBUG).
    pub stdout_info: bool,
    /// Log stderr at WARN level (false = DEBUG).
    pub stderr_warn: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            max_line_length: 4096,
            stdout_info: true,
            stderr_warn: true,
        }
    }
}

impl SubLog {
    /// Runs `command` to completion and records its output in the sub-log.
    ///
    /// Stdout and stderr are always captured, whatever `command` was set up
    /// with. Each line is logged as `[stdout] ..` or `[stderr] ..`, followed by
    /// the return code.
    ///
    /// # Errors
    /// [`LoggerError::Spawn`] if the command cannot be started.
    pub fn run_subprocess(&self, command: &mut Command) -> LoggerResult<Output> {
        self.in_scope(|| info!("Running command: {command:?}"));

        let output = command
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|err| {
                self.in_scope(|| warn!(error = %err, "Command could not be started"));
                LoggerError::Spawn(err)
            })?;

        let capture = self.capture;
        self.in_scope(|| {
            for line in String::from_utf8_lossy(&output.stdout).trim().lines() {
                let line = truncate_line(line, capture.max_line_length);
                if capture.stdout_info {
                    info!("[stdout] {line}");
                } else {
                    debug!("[stdout] {line}");
                }
            }
            for line in String::from_utf8_lossy(&output.stderr).trim().lines() {
                let line = truncate_line(line, capture.max_line_length);
                if capture.stderr_warn {
                    warn!("[stderr] {line}");
                } else {
                    debug!("[stderr] {line}");
                }
            }

            match output.status.code() {
                Some(code) => info!("Command finished with return code {code}"),
                None => warn!("Command terminated by a signal ({})", output.status),
            }
        });

        Ok(output)
    }
}

/// Cuts `line` to at most `max` bytes on a char boundary.
fn truncate_line(line: &str, max: usize) -> Cow<'_, str> {
    if line.len() <= max {
        return Cow::Borrowed(line);
    }
    let mut end = max;
    while !line.is_char_boundary(end) {
        end -= 1;
    }
    Cow::Owned(format!("{}... ({} bytes truncated)", &line[..end], line.len() - end))
}
