//! Routing of node stdout/stderr into log files.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::{Context, Result};

/// Pair of files receiving a node's stdout and stderr.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSink {
    pub stdout_path: PathBuf,
    pub stderr_path: PathBuf,
}

impl LogSink {
    pub fn new(stdout_path: impl Into<PathBuf>, stderr_path: impl Into<PathBuf>) -> Self {
        Self {
            stdout_path: stdout_path.into(),
            stderr_path: stderr_path.into(),
        }
    }

    /// Point `cmd`'s output streams at the sink files, creating parents and
    /// appending to existing files.
    pub fn attach(&self, cmd: &mut Command) -> Result<()> {
        cmd.stdout(Stdio::from(open_append(&self.stdout_path)?));
        cmd.stderr(Stdio::from(open_append(&self.stderr_path)?));
        Ok(())
    }
}

fn open_append(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log directory {}", parent.display()))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file {}", path.display()))
}
