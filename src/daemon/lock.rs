// Exclusive lock held while a start is in progress

use crate::error::{Kiro2ApiError, Result};
use std::fs::{self, File, OpenOptions};
use std::path::Path;

/// Serialises concurrent `start` invocations.
///
/// Taken before the liveness pre-check, inherited across the detach forks and
/// released by the daemon once it has recorded its pid. A second start that
/// finds the lock held reports the service as already starting.
pub struct StartLock {
    #[cfg(unix)]
    _lock: nix::fcntl::Flock<File>,
    #[cfg(not(unix))]
    _file: File,
}

impl StartLock {
    pub fn acquire(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                Kiro2ApiError::LockError(format!("Failed to create {}: {}", parent.display(), e))
            })?;
        }

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|e| {
                Kiro2ApiError::LockError(format!("Failed to open {}: {}", path.display(), e))
            })?;

        Self::lock(file)
    }

    #[cfg(unix)]
    fn lock(file: File) -> Result<Self> {
        use nix::errno::Errno;
        use nix::fcntl::{Flock, FlockArg};

        match Flock::lock(file, FlockArg::LockExclusiveNonblock) {
            Ok(lock) => Ok(Self { _lock: lock }),
            Err((_, errno)) if errno == Errno::EWOULDBLOCK => Err(
                Kiro2ApiError::AlreadyRunning("another start is in progress".to_string()),
            ),
            Err((_, errno)) => Err(Kiro2ApiError::LockError(format!(
                "Failed to lock start file: {}",
                errno
            ))),
        }
    }

    #[cfg(not(unix))]
    fn lock(file: File) -> Result<Self> {
        Ok(Self { _file: file })
    }
}
