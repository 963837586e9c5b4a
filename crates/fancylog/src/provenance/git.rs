use std::{
    ffi::OsString,
    fmt, io,
    path::Path,
    process::{Command, Stdio},
};

use serde::Serialize;
use tracing::debug;

/// Commit currently checked out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeadCommit {
    pub summary: String,
    /// Author date, strict ISO 8601.
    pub authored_at: String,
    pub committer_name: String,
    pub committer_email: String,
}

/// Version-control state of a working tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepositoryInfo {
    /// Branch name, or `HEAD` when detached.
    pub branch: String,
    pub commit_hash: String,
    pub full_hash: String,
    /// Tracked files differ from `HEAD` (untracked files are ignored).
    pub is_dirty: bool,
    /// URL of `origin`, else of the first configured remote.
    pub remote_url: Option<String>,
    pub head: HeadCommit,
}

/// Outcome of [`describe_repository`]. Never an error: every state renders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "info", rename_all = "snake_case")]
pub enum RepositoryStatus {
    NotARepository,
    DependencyUnavailable,
    Available(RepositoryInfo),
}

impl RepositoryStatus {
    pub fn info(&self) -> Option<&RepositoryInfo> {
        match self {
            RepositoryStatus::Available(info) => Some(info),
            _ => None,
        }
    }

    /// One-line explanation when no repository information is available.
    pub fn notice(&self) -> Option<&'static str> {
        match self {
            RepositoryStatus::NotARepository => Some(
                "Software does not appear to be in a git repository. \
                 Perhaps it was installed in some other way?",
            ),
            RepositoryStatus::DependencyUnavailable => {
                Some("Git is not available. Cannot check if software is in a git repository")
            }
            RepositoryStatus::Available(_) => None,
        }
    }
}

impl fmt::Display for RepositoryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let info = match (self.info(), self.notice()) {
            (Some(info), _) => info,
            (None, Some(notice)) => return f.write_str(notice),
            (None, None) => return Ok(()),
        };

        writeln!(f, "Branch: {}", info.branch)?;
        writeln!(f, "Commit hash: {}", info.commit_hash)?;
        writeln!(f, "Full hash: {}", info.full_hash)?;
        writeln!(f, "Commit message: {}", info.head.summary)?;
        writeln!(f, "Commit date & time: {}", info.head.authored_at)?;
        writeln!(f, "Commit author: {}", info.head.committer_name)?;
        writeln!(f, "Commit author email: {}", info.head.committer_email)?;
        let tree = if info.is_dirty { "dirty" } else { "clean" };
        writeln!(f, "Working tree: {tree}")?;
        write!(
            f,
            "Remote: {}",
            info.remote_url.as_deref().unwrap_or("None")
        )
    }
}

/// Reads repository state through the `git` command line.
#[derive(Debug, Clone)]
pub struct GitProbe {
    program: OsString,
}

impl Default for GitProbe {
    fn default() -> Self {
        Self {
            program: OsString::from("git"),
        }
    }
}

impl GitProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses `program` instead of `git` from `PATH`.
    pub fn with_program(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn describe(&self, path: &Path) -> RepositoryStatus {
        match self.inspect(path) {
            Ok(Some(info)) => RepositoryStatus::Available(info),
            Ok(None) => RepositoryStatus::NotARepository,
            Err(err) => {
                debug!(program = ?self.program, error = %err, "git could not be executed");
                RepositoryStatus::DependencyUnavailable
            }
        }
    }

    /// `Ok(None)` when `path` is not inside a work tree with at least one commit.
    fn inspect(&self, path: &Path) -> io::Result<Option<RepositoryInfo>> {
        if self.git(path, &["rev-parse", "--is-inside-work-tree"])?.as_deref() != Some("true") {
            return Ok(None);
        }
        let Some(full_hash) = self.git(path, &["rev-parse", "--verify", "--quiet", "HEAD"])? else {
            return Ok(None);
        };
        let Some(branch) = self.git(path, &["rev-parse", "--abbrev-ref", "HEAD"])? else {
            return Ok(None);
        };
        let Some(log) = self.git(path, &["log", "-1", "--format=%h%x00%s%x00%aI%x00%cn%x00%ce"])?
        else {
            return Ok(None);
        };
        let Some(status) = self.git(path, &["status", "--porcelain", "--untracked-files=no"])?
        else {
            return Ok(None);
        };

        let fields: Vec<&str> = log.split('\0').collect();
        let &[short, summary, authored_at, committer_name, committer_email] = fields.as_slice() else {
            return Ok(None);
        };

        Ok(Some(RepositoryInfo {
            branch,
            commit_hash: short.to_string(),
            full_hash,
            is_dirty: !status.is_empty(),
            remote_url: self.remote_url(path)?,
            head: HeadCommit {
                summary: summary.to_string(),
                authored_at: authored_at.to_string(),
                committer_name: committer_name.to_string(),
                committer_email: committer_email.to_string(),
            },
        }))
    }

    fn remote_url(&self, path: &Path) -> io::Result<Option<String>> {
        if let Some(url) = self.git(path, &["remote", "get-url", "origin"])? {
            return Ok(Some(url));
        }
        let remotes = self.git(path, &["remote"])?.unwrap_or_default();
        match remotes.lines().next() {
            Some(first) => self.git(path, &["remote", "get-url", first]),
            None => Ok(None),
        }
    }

    /// Runs `git -C <path> <args>`.
    ///
    /// `Err` only when the program cannot be started; a failing command is `Ok(None)`.
    fn git(&self, path: &Path, args: &[&str]) -> io::Result<Option<String>> {
        let output = Command::new(&self.program)
            .arg("-C")
            .arg(path)
            .args(args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()?;

        if !output.status.success() {
            return Ok(None);
        }
        Ok(Some(
            String::from_utf8_lossy(&output.stdout).trim().to_string(),
        ))
    }
}

/// Inspects `path` for git metadata with the default [`GitProbe`].
pub fn describe_repository(path: impl AsRef<Path>) -> RepositoryStatus {
    GitProbe::default().describe(path.as_ref())
}
