use crate::error::{Kiro2ApiError, Result};
use chrono::{DateTime, Local};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Append-only destination for the detached daemon's stdout and stderr.
///
/// Every instance appends; the file is never truncated or rotated.
#[derive(Debug, Clone)]
pub struct LogSink {
    path: PathBuf,
}

impl LogSink {
    pub fn with_path<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Open the log for appending, creating it and its directory if needed
    pub fn open_append(&self) -> Result<File> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                Kiro2ApiError::LogFileError(format!(
                    "Failed to create log directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| {
                Kiro2ApiError::LogFileError(format!("{}: {}", self.path.display(), e))
            })
    }

    /// Append a single timestamped line, e.g. a session start or stop marker
    pub fn append_line(&self, message: &str) -> Result<()> {
        let mut file = self.open_append()?;
        let line = format_log_line(&Local::now(), message);
        file.write_all(line.as_bytes())
            .map_err(|e| Kiro2ApiError::LogFileError(format!("Failed to write to log: {}", e)))?;
        Ok(())
    }

    /// Get the path to the log file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn format_log_line(timestamp: &DateTime<Local>, message: &str) -> String {
    format!("[{}] {}\n", timestamp.format("%Y-%m-%d %H:%M:%S"), message)
}
