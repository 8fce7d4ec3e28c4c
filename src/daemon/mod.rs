// Daemon module - Detaching, identity tracking and lifecycle supervision

pub mod daemonize;
pub mod lock;
pub mod manager;
pub mod pid;
pub mod probe;
pub mod signals;

pub use daemonize::{platform_detacher, DaemonEntry, DetachRequest, Detacher};
#[cfg(unix)]
pub use daemonize::ForkDetacher;
pub use manager::{
    DaemonManager, DaemonStatus, ProcessControl, RestartOutcome, StartOutcome, StopOutcome,
};
pub use pid::{PidFile, PidGuard};
pub use probe::{OsProcesses, ProcessProbe, ProcessSignaller, StopSignal};
pub use signals::ShutdownSignal;
