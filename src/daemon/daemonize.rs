// Detaching the daemon from the invoking terminal

use crate::error::{Kiro2ApiError, Result};
use crate::logs::LogSink;
use std::path::PathBuf;

/// Work the detached process performs; its result becomes the exit status
pub type DaemonEntry = Box<dyn FnOnce() -> Result<()>>;

/// What the detached instance needs to know before it runs
#[derive(Debug, Clone)]
pub struct DetachRequest {
    pub port: u16,
    pub log: LogSink,
    /// Configuration file the invoking process was started with, if any
    pub config_path: Option<PathBuf>,
}

/// Turns the current invocation into a background daemon
pub trait Detacher {
    /// Detach and run `entry` in the surviving process.
    ///
    /// Implementations that replace the invoking process never return in it.
    /// `Ok` means the daemon was launched by some other means and the caller
    /// may report and return.
    fn detach_and_run(&self, request: &DetachRequest, entry: DaemonEntry) -> Result<()>;
}

/// Classic double-fork daemonization
#[cfg(unix)]
#[derive(Debug, Clone, Copy, Default)]
pub struct ForkDetacher;

#[cfg(unix)]
impl Detacher for ForkDetacher {
    fn detach_and_run(&self, request: &DetachRequest, entry: DaemonEntry) -> Result<()> {
        use nix::sys::stat::{umask, Mode};
        use nix::unistd::{chdir, setsid};
        use std::fs::OpenOptions;

        // Open both targets while errors can still reach the terminal.
        let log = request.log.open_append()?;
        let devnull = OpenOptions::new()
            .read(true)
            .open("/dev/null")
            .map_err(|e| Kiro2ApiError::SessionError(format!("Failed to open /dev/null: {}", e)))?;

        // First fork: the invoking process exits, the child is not a session leader.
        fork_and_exit_parent("first")?;

        chdir("/").map_err(|e| {
            Kiro2ApiError::SessionError(format!("Failed to change directory to /: {}", e))
        })?;
        setsid().map_err(|e| Kiro2ApiError::SessionError(format!("setsid failed: {}", e)))?;
        umask(Mode::empty());

        // Second fork: the session leader exits so the daemon can never
        // reacquire a controlling terminal.
        fork_and_exit_parent("second")?;

        redirect_stdio(&devnull, &log)?;
        drop(devnull);
        drop(log);

        crate::logging::use_log_file_format();

        let code = match entry() {
            Ok(()) => 0,
            Err(e) => {
                tracing::error!("daemon exited with error: {}", e);
                1
            }
        };
        std::process::exit(code);
    }
}

#[cfg(unix)]
fn fork_and_exit_parent(stage: &str) -> Result<()> {
    use nix::unistd::{fork, ForkResult};

    // SAFETY: the supervisor is single-threaded at this point; no runtime or
    // helper threads are started before detaching.
    match unsafe { fork() } {
        Ok(ForkResult::Parent { .. }) => std::process::exit(0),
        Ok(ForkResult::Child) => Ok(()),
        Err(e) => Err(Kiro2ApiError::ForkFailure(format!(
            "{} fork failed: {}",
            stage, e
        ))),
    }
}

/// Point stdin at `/dev/null` and stdout/stderr at the log
#[cfg(unix)]
fn redirect_stdio(devnull: &std::fs::File, log: &std::fs::File) -> Result<()> {
    use nix::libc::{STDERR_FILENO, STDIN_FILENO, STDOUT_FILENO};
    use nix::unistd::dup2;
    use std::os::unix::io::AsRawFd;

    for (source, target) in [
        (devnull.as_raw_fd(), STDIN_FILENO),
        (log.as_raw_fd(), STDOUT_FILENO),
        (log.as_raw_fd(), STDERR_FILENO),
    ] {
        dup2(source, target).map_err(|e| {
            Kiro2ApiError::SessionError(format!("Failed to redirect fd {}: {}", target, e))
        })?;
    }

    Ok(())
}

/// Launches the daemon as a detached child running `run --port P`.
///
/// Used where fork and sessions are unavailable; the child re-enters the
/// binary in foreground mode with the same stream redirection.
#[cfg(not(unix))]
#[derive(Debug, Clone, Default)]
pub struct SpawnDetacher;

#[cfg(not(unix))]
impl Detacher for SpawnDetacher {
    fn detach_and_run(&self, request: &DetachRequest, entry: DaemonEntry) -> Result<()> {
        use std::process::{Command, Stdio};

        // The child rebuilds its own entry from the command line.
        drop(entry);

        let exe = std::env::current_exe()?;
        let stdout = request.log.open_append()?;
        let stderr = stdout.try_clone()?;

        let mut command = Command::new(exe);
        command
            .arg("run")
            .arg("--port")
            .arg(request.port.to_string());
        if let Some(ref config_path) = request.config_path {
            command.arg("--config").arg(config_path);
        }
        command
            .current_dir(std::env::temp_dir())
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr);

        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            const DETACHED_PROCESS: u32 = 0x0000_0008;
            const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
            command.creation_flags(DETACHED_PROCESS | CREATE_NEW_PROCESS_GROUP);
        }

        let child = command
            .spawn()
            .map_err(|e| Kiro2ApiError::ForkFailure(format!("Failed to spawn daemon: {}", e)))?;
        tracing::info!(pid = child.id(), "spawned detached daemon");
        Ok(())
    }
}

/// Detacher for the current platform
#[cfg(unix)]
pub fn platform_detacher() -> Box<dyn Detacher> {
    Box::new(ForkDetacher)
}

/// Detacher for the current platform
#[cfg(not(unix))]
pub fn platform_detacher() -> Box<dyn Detacher> {
    Box::new(SpawnDetacher)
}
