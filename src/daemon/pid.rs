// PID file management for the daemon process

use crate::error::{Kiro2ApiError, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Durable record of the running daemon's process id.
///
/// The file holds the decimal pid and nothing else. Unreadable or
/// unparsable content is treated as absent and the file is removed.
#[derive(Debug, Clone)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    /// Create a PID file manager for the given path
    pub fn with_path<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Read the recorded pid, if any
    pub fn read(&self) -> Option<u32> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), "unreadable PID file: {}", e);
                self.discard_corrupt();
                return None;
            }
        };

        match content.trim().parse::<u32>() {
            Ok(pid) if pid > 0 => Some(pid),
            _ => {
                tracing::warn!(
                    path = %self.path.display(),
                    content = %content.trim(),
                    "corrupt PID file, removing"
                );
                self.discard_corrupt();
                None
            }
        }
    }

    /// Overwrite the file with `pid`, creating the parent directory if needed
    pub fn write(&self, pid: u32) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                Kiro2ApiError::PidFileError(format!(
                    "Failed to create {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        fs::write(&self.path, pid.to_string())
            .map_err(|e| Kiro2ApiError::PidFileError(format!("Failed to write PID file: {}", e)))?;

        tracing::debug!(pid, path = %self.path.display(), "wrote PID file");
        Ok(())
    }

    /// Remove the file; a missing file is not an error
    pub fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::debug!(path = %self.path.display(), "removed PID file");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Kiro2ApiError::PidFileError(format!(
                "Failed to remove PID file: {}",
                e
            ))),
        }
    }

    /// Check if the PID file exists
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Get the path to the PID file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn discard_corrupt(&self) {
        if let Err(e) = self.clear() {
            tracing::warn!("{}", e);
        }
    }
}

/// Clears the PID file when dropped, provided it still names `pid`.
///
/// Held by the daemon for its whole life so that every orderly exit path,
/// including a failed service startup, removes the identity record.
#[derive(Debug)]
pub struct PidGuard {
    pid_file: PidFile,
    pid: u32,
}

impl PidGuard {
    /// Record `pid` and return a guard that clears it again
    pub fn register(pid_file: PidFile, pid: u32) -> Result<Self> {
        pid_file.write(pid)?;
        Ok(Self { pid_file, pid })
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }
}

impl Drop for PidGuard {
    fn drop(&mut self) {
        // A newer instance may have taken over the record (last writer wins).
        if self.pid_file.read() != Some(self.pid) {
            return;
        }
        if let Err(e) = self.pid_file.clear() {
            tracing::warn!("{}", e);
        }
    }
}
