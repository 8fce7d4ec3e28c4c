// Process table access: liveness checks and signal delivery

use crate::error::{Kiro2ApiError, Result};
use std::fmt;

/// Answers whether a process id currently exists
pub trait ProcessProbe {
    /// Must never fail: anything short of a confirmed live process is `false`.
    fn exists(&self, pid: u32) -> bool;
}

/// Delivers stop signals to a process id
pub trait ProcessSignaller {
    fn signal(&self, pid: u32, signal: StopSignal) -> Result<()>;
}

/// Signals the controlling side sends to a daemon
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopSignal {
    /// Graceful termination request (SIGTERM)
    Terminate,
    /// Forceful kill (SIGKILL)
    Kill,
}

impl fmt::Display for StopSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopSignal::Terminate => write!(f, "SIGTERM"),
            StopSignal::Kill => write!(f, "SIGKILL"),
        }
    }
}

/// Probe and signaller backed by the real OS process table
#[derive(Debug, Clone, Copy, Default)]
pub struct OsProcesses;

#[cfg(unix)]
fn to_nix_pid(pid: u32) -> Option<nix::unistd::Pid> {
    // 0 and negative values address process groups, never a single process.
    match i32::try_from(pid) {
        Ok(raw) if raw > 0 => Some(nix::unistd::Pid::from_raw(raw)),
        _ => None,
    }
}

#[cfg(unix)]
impl ProcessProbe for OsProcesses {
    fn exists(&self, pid: u32) -> bool {
        use nix::sys::signal::kill;

        let Some(target) = to_nix_pid(pid) else {
            return false;
        };

        // Signal 0 performs the permission and existence checks only.
        // EPERM means we could not confirm the process is ours: report it dead.
        kill(target, None).is_ok()
    }
}

#[cfg(unix)]
impl ProcessSignaller for OsProcesses {
    fn signal(&self, pid: u32, signal: StopSignal) -> Result<()> {
        use nix::sys::signal::{kill, Signal};

        let target = to_nix_pid(pid)
            .ok_or_else(|| Kiro2ApiError::SignalError(format!("Invalid process id: {}", pid)))?;
        let sig = match signal {
            StopSignal::Terminate => Signal::SIGTERM,
            StopSignal::Kill => Signal::SIGKILL,
        };

        kill(target, sig).map_err(|e| {
            Kiro2ApiError::SignalError(format!("Failed to send {} to {}: {}", signal, pid, e))
        })
    }
}

#[cfg(not(unix))]
impl ProcessProbe for OsProcesses {
    fn exists(&self, pid: u32) -> bool {
        use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

        let sys_pid = Pid::from_u32(pid);
        let mut system = System::new();
        system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[sys_pid]),
            true,
            ProcessRefreshKind::new(),
        );
        system.process(sys_pid).is_some()
    }
}

#[cfg(not(unix))]
impl ProcessSignaller for OsProcesses {
    fn signal(&self, pid: u32, signal: StopSignal) -> Result<()> {
        use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, Signal, System};

        let sys_pid = Pid::from_u32(pid);
        let mut system = System::new();
        system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[sys_pid]),
            true,
            ProcessRefreshKind::new(),
        );
        let process = system
            .process(sys_pid)
            .ok_or_else(|| Kiro2ApiError::SignalError(format!("No such process: {}", pid)))?;

        let delivered = match signal {
            StopSignal::Terminate => process
                .kill_with(Signal::Term)
                .unwrap_or_else(|| process.kill()),
            StopSignal::Kill => process.kill(),
        };

        if delivered {
            Ok(())
        } else {
            Err(Kiro2ApiError::SignalError(format!(
                "Failed to send {} to {}",
                signal, pid
            )))
        }
    }
}
