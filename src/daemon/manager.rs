// Daemon lifecycle management

use super::daemonize::{platform_detacher, DaemonEntry, DetachRequest, Detacher};
use super::lock::StartLock;
use super::pid::{PidFile, PidGuard};
use super::probe::{OsProcesses, ProcessProbe, ProcessSignaller, StopSignal};
use super::signals::ShutdownSignal;
use crate::config::SupervisorConfig;
use crate::error::{Kiro2ApiError, Result};
use crate::logs::{read_last_lines, LogSink};
use crate::service::{ListenerService, ServiceRunner};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use tokio_util::sync::CancellationToken;

/// Process table access the supervisor needs: liveness plus signal delivery
pub trait ProcessControl: ProcessProbe + ProcessSignaller {}

impl<T: ProcessProbe + ProcessSignaller> ProcessControl for T {}

/// Result of a start request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    /// The daemon was launched in the background
    Detached { port: u16 },
    /// A live instance already holds the identity record
    AlreadyRunning { pid: u32 },
    /// Another start currently holds the start lock
    StartInProgress,
    /// The service ran in the foreground and has exited
    Exited,
}

/// Result of a stop request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopOutcome {
    /// No identity record existed
    NotRunning,
    /// The record named a process that no longer exists; it was cleared
    Stale { pid: u32 },
    /// The process was signalled; `forced` when SIGKILL was needed
    Stopped { pid: u32, forced: bool },
}

/// Result of a restart request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestartOutcome {
    pub stop: StopOutcome,
    /// Whether the previous instance was confirmed gone before starting anew
    pub old_exited: bool,
    pub start: StartOutcome,
}

/// Daemon status information
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DaemonStatus {
    NotRunning,
    /// The record named a dead process; it was cleared
    Stale { pid: u32 },
    Running {
        pid: u32,
        pid_file: PathBuf,
        log_file: PathBuf,
        recent_logs: Vec<String>,
    },
}

/// Supervises the single kiro2api daemon instance identified by the PID file
pub struct DaemonManager {
    config: SupervisorConfig,
    config_path: Option<PathBuf>,
    pid_file: PidFile,
    log: LogSink,
    processes: Box<dyn ProcessControl>,
    detacher: Box<dyn Detacher>,
    runner: Arc<dyn ServiceRunner>,
}

impl DaemonManager {
    /// Create a daemon manager backed by the real process table
    pub fn new(config: SupervisorConfig) -> Self {
        let runner = Arc::new(ListenerService::new(config.host.clone()));
        Self {
            pid_file: PidFile::with_path(config.pid_file()),
            log: LogSink::with_path(config.log_file()),
            config,
            config_path: None,
            processes: Box::new(OsProcesses),
            detacher: platform_detacher(),
            runner,
        }
    }

    /// Remember the configuration file so a re-spawned daemon loads it too
    pub fn with_config_path(mut self, path: Option<PathBuf>) -> Self {
        self.config_path = path;
        self
    }

    pub fn with_processes(mut self, processes: impl ProcessControl + 'static) -> Self {
        self.processes = Box::new(processes);
        self
    }

    pub fn with_detacher(mut self, detacher: impl Detacher + 'static) -> Self {
        self.detacher = Box::new(detacher);
        self
    }

    pub fn with_runner(mut self, runner: impl ServiceRunner + 'static) -> Self {
        self.runner = Arc::new(runner);
        self
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    pub fn pid_file(&self) -> &PidFile {
        &self.pid_file
    }

    pub fn log(&self) -> &LogSink {
        &self.log
    }

    /// Pid of the live daemon, clearing a stale record on the way
    pub fn running_pid(&self) -> Option<u32> {
        let pid = self.pid_file.read()?;
        if self.processes.exists(pid) {
            Some(pid)
        } else {
            tracing::info!(pid, "clearing stale PID file");
            self.clear_record();
            None
        }
    }

    /// Check if the daemon is currently running
    pub fn is_running(&self) -> bool {
        self.running_pid().is_some()
    }

    /// Start the daemon in the background on `port`.
    ///
    /// With the fork detacher this only returns in the invoking process when
    /// no detach happened (already running) or detaching failed.
    pub fn start(&self, port: u16) -> Result<StartOutcome> {
        let lock = match self.pre_check()? {
            Ok(lock) => lock,
            Err(outcome) => return Ok(outcome),
        };

        let request = DetachRequest {
            port,
            log: self.log.clone(),
            config_path: self.config_path.clone(),
        };

        tracing::debug!(port, log = %self.log.path().display(), "detaching daemon");
        self.detacher
            .detach_and_run(&request, self.daemon_entry(port, lock))?;

        Ok(StartOutcome::Detached { port })
    }

    /// Run the service in the foreground: register, serve, clean up
    pub fn run_foreground(&self, port: u16) -> Result<StartOutcome> {
        let lock = match self.pre_check()? {
            Ok(lock) => lock,
            Err(outcome) => return Ok(outcome),
        };

        self.daemon_entry(port, lock)()?;
        Ok(StartOutcome::Exited)
    }

    /// Stop the daemon: SIGTERM, wait, then SIGKILL if it is still alive
    pub fn stop(&self) -> Result<StopOutcome> {
        let Some(pid) = self.pid_file.read() else {
            return Ok(StopOutcome::NotRunning);
        };

        if !self.processes.exists(pid) {
            tracing::info!(pid, "clearing stale PID file");
            self.clear_record();
            return Ok(StopOutcome::Stale { pid });
        }

        tracing::info!(pid, "stopping daemon");
        if let Err(e) = self.processes.signal(pid, StopSignal::Terminate) {
            // The process may have exited since the liveness check.
            tracing::debug!(pid, "{}", e);
        }

        let exited = self.wait_for_exit(pid, self.config.stop_polls());
        if !exited {
            tracing::warn!(
                pid,
                "daemon did not stop within {}s, sending SIGKILL",
                self.config.stop_timeout_secs
            );
            if let Err(e) = self.processes.signal(pid, StopSignal::Kill) {
                tracing::debug!(pid, "{}", e);
            }
        }

        self.clear_record();
        Ok(StopOutcome::Stopped {
            pid,
            forced: !exited,
        })
    }

    /// Stop any running instance, give it a grace period, then start again.
    ///
    /// The new instance is started even when the old one was not confirmed
    /// gone within the grace period.
    pub fn restart(&self, port: u16) -> Result<RestartOutcome> {
        let (stop, old_exited) = self.stop_for_restart()?;
        let start = self.start(port)?;
        Ok(RestartOutcome {
            stop,
            old_exited,
            start,
        })
    }

    /// Stop phase of a restart: stop, then wait out the grace period.
    ///
    /// Returns the stop outcome and whether the old process is confirmed gone.
    /// Callers that report progress print the stop outcome before calling
    /// `start`, since a successful detach never returns to them.
    pub fn stop_for_restart(&self) -> Result<(StopOutcome, bool)> {
        let stop = self.stop()?;

        let old_exited = match stop {
            StopOutcome::Stopped { pid, .. } => {
                let gone = !self.processes.exists(pid)
                    || self.wait_for_exit(pid, self.config.restart_polls());
                if !gone {
                    tracing::warn!(pid, "previous instance still alive, starting anyway");
                }
                gone
            }
            StopOutcome::NotRunning | StopOutcome::Stale { .. } => true,
        };

        Ok((stop, old_exited))
    }

    /// Get daemon status information
    pub fn status(&self) -> DaemonStatus {
        let Some(pid) = self.pid_file.read() else {
            return DaemonStatus::NotRunning;
        };

        if !self.processes.exists(pid) {
            tracing::info!(pid, "clearing stale PID file");
            self.clear_record();
            return DaemonStatus::Stale { pid };
        }

        let recent_logs = self.recent_logs(self.config.status_log_lines);
        DaemonStatus::Running {
            pid,
            pid_file: self.pid_file.path().to_path_buf(),
            log_file: self.log.path().to_path_buf(),
            recent_logs,
        }
    }

    /// Last `lines` lines of the daemon log; unreadable logs yield nothing
    pub fn recent_logs(&self, lines: usize) -> Vec<String> {
        read_last_lines(self.log.path(), lines).unwrap_or_else(|e| {
            tracing::warn!("{}", e);
            Vec::new()
        })
    }

    /// Liveness pre-check shared by start and foreground runs.
    ///
    /// Returns the start lock when the caller may proceed, or the outcome to
    /// report instead.
    fn pre_check(&self) -> Result<std::result::Result<StartLock, StartOutcome>> {
        let lock = match StartLock::acquire(&self.config.lock_file()) {
            Ok(lock) => lock,
            Err(Kiro2ApiError::AlreadyRunning(reason)) => {
                tracing::debug!("{}", reason);
                return Ok(Err(StartOutcome::StartInProgress));
            }
            Err(e) => return Err(e),
        };

        match self.running_pid() {
            Some(pid) => Ok(Err(StartOutcome::AlreadyRunning { pid })),
            None => Ok(Ok(lock)),
        }
    }

    /// Build what the daemon process runs once it is on its own
    fn daemon_entry(&self, port: u16, lock: StartLock) -> DaemonEntry {
        let pid_file = self.pid_file.clone();
        let log = self.log.clone();
        let runner = Arc::clone(&self.runner);

        Box::new(move || run_daemon(pid_file, log, runner, port, lock))
    }

    /// Poll once per interval until `pid` disappears or the budget runs out
    fn wait_for_exit(&self, pid: u32, polls: u64) -> bool {
        for _ in 0..polls {
            thread::sleep(self.config.poll_interval());
            if !self.processes.exists(pid) {
                return true;
            }
        }
        false
    }

    fn clear_record(&self) {
        if let Err(e) = self.pid_file.clear() {
            tracing::warn!("{}", e);
        }
    }
}

/// Daemon side: record our pid, wire up shutdown, hand off to the service
fn run_daemon(
    pid_file: PidFile,
    log: LogSink,
    runner: Arc<dyn ServiceRunner>,
    port: u16,
    lock: StartLock,
) -> Result<()> {
    let pid = std::process::id();
    let guard = PidGuard::register(pid_file, pid)?;
    drop(lock);

    let shutdown = CancellationToken::new();
    let _signals = ShutdownSignal::install(shutdown.clone())?;

    if let Err(e) = log.append_line(&format!("kiro2api started pid={} port={}", pid, port)) {
        tracing::warn!("{}", e);
    }
    tracing::info!(pid, port, "kiro2api running");

    let result = runner.run(port, shutdown);

    let marker = match &result {
        Ok(()) => format!("kiro2api stopped pid={}", pid),
        Err(e) => format!("kiro2api failed pid={}: {}", pid, e),
    };
    if let Err(e) = log.append_line(&marker) {
        tracing::warn!("{}", e);
    }

    drop(guard);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Process table double: a set of live pids and pids that ignore SIGTERM
    #[derive(Clone, Default)]
    struct FakeProcesses {
        state: Arc<Mutex<FakeState>>,
    }

    #[derive(Default)]
    struct FakeState {
        alive: HashSet<u32>,
        ignores_term: HashSet<u32>,
        sent: Vec<(u32, StopSignal)>,
        probes: usize,
    }

    impl FakeProcesses {
        fn with_alive(pids: &[u32]) -> Self {
            let fake = Self::default();
            fake.state.lock().unwrap().alive.extend(pids);
            fake
        }

        fn ignore_term(&self, pid: u32) {
            self.state.lock().unwrap().ignores_term.insert(pid);
        }

        fn sent(&self) -> Vec<(u32, StopSignal)> {
            self.state.lock().unwrap().sent.clone()
        }

        fn probes(&self) -> usize {
            self.state.lock().unwrap().probes
        }
    }

    impl ProcessProbe for FakeProcesses {
        fn exists(&self, pid: u32) -> bool {
            let mut state = self.state.lock().unwrap();
            state.probes += 1;
            state.alive.contains(&pid)
        }
    }

    impl ProcessSignaller for FakeProcesses {
        fn signal(&self, pid: u32, signal: StopSignal) -> Result<()> {
            let mut state = self.state.lock().unwrap();
            state.sent.push((pid, signal));
            if !state.alive.contains(&pid) {
                return Err(Kiro2ApiError::SignalError("No such process".to_string()));
            }
            if signal == StopSignal::Kill || !state.ignores_term.contains(&pid) {
                state.alive.remove(&pid);
            }
            Ok(())
        }
    }

    /// Detacher double that records requests without forking
    #[derive(Clone, Default)]
    struct RecordingDetacher {
        requests: Arc<Mutex<Vec<u16>>>,
    }

    impl Detacher for RecordingDetacher {
        fn detach_and_run(&self, request: &DetachRequest, _entry: DaemonEntry) -> Result<()> {
            self.requests.lock().unwrap().push(request.port);
            Ok(())
        }
    }

    struct FailingDetacher;

    impl Detacher for FailingDetacher {
        fn detach_and_run(&self, _request: &DetachRequest, _entry: DaemonEntry) -> Result<()> {
            Err(Kiro2ApiError::ForkFailure("first fork failed: EAGAIN".to_string()))
        }
    }

    fn test_config(dir: &TempDir) -> SupervisorConfig {
        let mut config = SupervisorConfig::with_state_dir(dir.path());
        config.poll_interval_ms = 100;
        config.stop_timeout_secs = 1;
        config.restart_grace_secs = 1;
        config
    }

    fn manager(dir: &TempDir, processes: &FakeProcesses) -> (DaemonManager, RecordingDetacher) {
        let detacher = RecordingDetacher::default();
        let manager = DaemonManager::new(test_config(dir))
            .with_processes(processes.clone())
            .with_detacher(detacher.clone());
        (manager, detacher)
    }

    #[test]
    fn test_stop_twice_when_not_running() {
        let temp_dir = TempDir::new().unwrap();
        let processes = FakeProcesses::default();
        let (manager, _) = manager(&temp_dir, &processes);

        assert_eq!(manager.stop().unwrap(), StopOutcome::NotRunning);
        assert_eq!(manager.stop().unwrap(), StopOutcome::NotRunning);
        assert!(!manager.pid_file().exists());
        assert!(processes.sent().is_empty());
    }

    #[test]
    fn test_stale_record_is_cleared_by_every_command() {
        let temp_dir = TempDir::new().unwrap();
        let processes = FakeProcesses::default();
        let (manager, detacher) = manager(&temp_dir, &processes);

        manager.pid_file().write(4000).unwrap();
        assert_eq!(manager.stop().unwrap(), StopOutcome::Stale { pid: 4000 });
        assert_eq!(manager.pid_file().read(), None);

        manager.pid_file().write(4000).unwrap();
        assert_eq!(manager.status(), DaemonStatus::Stale { pid: 4000 });
        assert_eq!(manager.pid_file().read(), None);

        manager.pid_file().write(4000).unwrap();
        assert_eq!(
            manager.start(9000).unwrap(),
            StartOutcome::Detached { port: 9000 }
        );
        assert_eq!(manager.pid_file().read(), None);
        assert_eq!(*detacher.requests.lock().unwrap(), vec![9000]);

        assert!(processes.sent().is_empty());
    }

    #[test]
    fn test_no_double_start() {
        let temp_dir = TempDir::new().unwrap();
        let processes = FakeProcesses::with_alive(&[777]);
        let (manager, detacher) = manager(&temp_dir, &processes);

        manager.pid_file().write(777).unwrap();

        assert_eq!(
            manager.start(9000).unwrap(),
            StartOutcome::AlreadyRunning { pid: 777 }
        );
        assert!(detacher.requests.lock().unwrap().is_empty());
        assert_eq!(manager.pid_file().read(), Some(777));
    }

    #[test]
    fn test_start_reports_in_progress_while_locked() {
        let temp_dir = TempDir::new().unwrap();
        let processes = FakeProcesses::default();
        let (manager, detacher) = manager(&temp_dir, &processes);

        let _held = StartLock::acquire(&manager.config().lock_file()).unwrap();

        assert_eq!(manager.start(9000).unwrap(), StartOutcome::StartInProgress);
        assert!(detacher.requests.lock().unwrap().is_empty());
    }

    #[test]
    fn test_fork_failure_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let manager = DaemonManager::new(test_config(&temp_dir))
            .with_processes(FakeProcesses::default())
            .with_detacher(FailingDetacher);

        assert!(matches!(
            manager.start(9000),
            Err(Kiro2ApiError::ForkFailure(_))
        ));
        assert!(!manager.pid_file().exists());
    }

    #[test]
    fn test_graceful_stop() {
        let temp_dir = TempDir::new().unwrap();
        let processes = FakeProcesses::with_alive(&[321]);
        let (manager, _) = manager(&temp_dir, &processes);

        manager.pid_file().write(321).unwrap();

        assert_eq!(
            manager.stop().unwrap(),
            StopOutcome::Stopped {
                pid: 321,
                forced: false
            }
        );
        assert_eq!(processes.sent(), vec![(321, StopSignal::Terminate)]);
        assert!(!manager.pid_file().exists());
    }

    #[test]
    fn test_stop_escalates_to_kill_after_poll_budget() {
        let temp_dir = TempDir::new().unwrap();
        let processes = FakeProcesses::with_alive(&[321]);
        processes.ignore_term(321);
        let (manager, _) = manager(&temp_dir, &processes);

        manager.pid_file().write(321).unwrap();
        let polls = manager.config().stop_polls() as usize;

        assert_eq!(
            manager.stop().unwrap(),
            StopOutcome::Stopped {
                pid: 321,
                forced: true
            }
        );
        assert_eq!(
            processes.sent(),
            vec![(321, StopSignal::Terminate), (321, StopSignal::Kill)]
        );
        // One probe before signalling, then the poll budget.
        assert_eq!(processes.probes(), 1 + polls);
        assert!(!manager.pid_file().exists());
    }

    #[test]
    fn test_default_budget_is_ten_polls() {
        let temp_dir = TempDir::new().unwrap();
        let manager = DaemonManager::new(SupervisorConfig::with_state_dir(temp_dir.path()));
        assert_eq!(manager.config().stop_polls(), 10);
        assert_eq!(manager.config().restart_polls(), 5);
    }

    #[test]
    fn test_restart_stops_then_starts() {
        let temp_dir = TempDir::new().unwrap();
        let processes = FakeProcesses::with_alive(&[50]);
        let (manager, detacher) = manager(&temp_dir, &processes);

        manager.pid_file().write(50).unwrap();

        let outcome = manager.restart(9100).unwrap();
        assert_eq!(
            outcome,
            RestartOutcome {
                stop: StopOutcome::Stopped {
                    pid: 50,
                    forced: false
                },
                old_exited: true,
                start: StartOutcome::Detached { port: 9100 },
            }
        );
        assert_eq!(*detacher.requests.lock().unwrap(), vec![9100]);
    }

    #[test]
    fn test_restart_starts_even_if_old_instance_lingers() {
        let temp_dir = TempDir::new().unwrap();
        let processes = FakeProcesses::with_alive(&[50]);
        let (manager, detacher) = manager(&temp_dir, &processes);

        manager.pid_file().write(50).unwrap();

        // Neither signal takes effect: the pid stays in the table.
        let manager = manager.with_processes(Unkillable(processes.clone()));

        let outcome = manager.restart(9100).unwrap();
        assert!(!outcome.old_exited);
        assert_eq!(outcome.start, StartOutcome::Detached { port: 9100 });
        assert_eq!(*detacher.requests.lock().unwrap(), vec![9100]);
    }

    #[test]
    fn test_restart_when_not_running_just_starts() {
        let temp_dir = TempDir::new().unwrap();
        let processes = FakeProcesses::default();
        let (manager, _) = manager(&temp_dir, &processes);

        let outcome = manager.restart(8989).unwrap();
        assert_eq!(outcome.stop, StopOutcome::NotRunning);
        assert!(outcome.old_exited);
        assert_eq!(outcome.start, StartOutcome::Detached { port: 8989 });
    }

    #[test]
    fn test_stop_for_restart_leaves_start_to_the_caller() {
        let temp_dir = TempDir::new().unwrap();
        let processes = FakeProcesses::with_alive(&[50]);
        let (manager, detacher) = manager(&temp_dir, &processes);

        assert_eq!(
            manager.stop_for_restart().unwrap(),
            (StopOutcome::NotRunning, true)
        );

        manager.pid_file().write(50).unwrap();
        assert_eq!(
            manager.stop_for_restart().unwrap(),
            (
                StopOutcome::Stopped {
                    pid: 50,
                    forced: false
                },
                true
            )
        );
        assert!(!manager.pid_file().exists());
        assert!(detacher.requests.lock().unwrap().is_empty());
    }

    #[test]
    fn test_is_running_clears_stale_record() {
        let temp_dir = TempDir::new().unwrap();
        let processes = FakeProcesses::with_alive(&[77]);
        let (manager, _) = manager(&temp_dir, &processes);

        assert!(!manager.is_running());

        manager.pid_file().write(77).unwrap();
        assert!(manager.is_running());
        assert!(manager.pid_file().exists());

        manager.pid_file().write(78).unwrap();
        assert!(!manager.is_running());
        assert!(!manager.pid_file().exists());
    }

    #[test]
    fn test_status_running_reports_paths_and_recent_logs() {
        let temp_dir = TempDir::new().unwrap();
        let processes = FakeProcesses::with_alive(&[42]);
        let (manager, _) = manager(&temp_dir, &processes);

        manager.pid_file().write(42).unwrap();
        for i in 1..=8 {
            manager.log().append_line(&format!("entry {}", i)).unwrap();
        }

        match manager.status() {
            DaemonStatus::Running {
                pid,
                pid_file,
                log_file,
                recent_logs,
            } => {
                assert_eq!(pid, 42);
                assert_eq!(pid_file, temp_dir.path().join("kiro2api.pid"));
                assert_eq!(log_file, temp_dir.path().join("kiro2api.log"));
                assert_eq!(recent_logs.len(), 5);
                assert!(recent_logs[0].ends_with("entry 4"));
                assert!(recent_logs[4].ends_with("entry 8"));
            }
            other => panic!("unexpected status: {:?}", other),
        }
    }

    #[test]
    fn test_status_running_without_log_file() {
        let temp_dir = TempDir::new().unwrap();
        let processes = FakeProcesses::with_alive(&[42]);
        let (manager, _) = manager(&temp_dir, &processes);

        manager.pid_file().write(42).unwrap();

        assert!(matches!(
            manager.status(),
            DaemonStatus::Running { recent_logs, .. } if recent_logs.is_empty()
        ));
    }

    #[test]
    fn test_status_with_corrupt_record() {
        let temp_dir = TempDir::new().unwrap();
        let processes = FakeProcesses::default();
        let (manager, _) = manager(&temp_dir, &processes);

        std::fs::write(manager.pid_file().path(), "garbage").unwrap();

        assert_eq!(manager.status(), DaemonStatus::NotRunning);
        assert!(!manager.pid_file().exists());
    }

    /// Runner that checks the registration done before the handoff
    struct AssertingRunner {
        pid_file: PidFile,
    }

    impl ServiceRunner for AssertingRunner {
        fn run(&self, port: u16, _shutdown: CancellationToken) -> Result<()> {
            assert_eq!(port, 9300);
            assert_eq!(self.pid_file.read(), Some(std::process::id()));
            Ok(())
        }
    }

    struct FailingRunner;

    impl ServiceRunner for FailingRunner {
        fn run(&self, _port: u16, _shutdown: CancellationToken) -> Result<()> {
            Err(Kiro2ApiError::StartupError("address in use".to_string()))
        }
    }

    #[test]
    fn test_foreground_registers_and_cleans_up() {
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(&temp_dir);
        let runner = AssertingRunner {
            pid_file: PidFile::with_path(config.pid_file()),
        };
        let manager = DaemonManager::new(config).with_runner(runner);

        assert_eq!(manager.run_foreground(9300).unwrap(), StartOutcome::Exited);
        assert!(!manager.pid_file().exists());

        let logs = manager.recent_logs(10);
        assert!(logs[0].contains(&format!("kiro2api started pid={} port=9300", std::process::id())));
        assert!(logs[1].contains("kiro2api stopped"));

        // The start lock was released once the pid was recorded.
        assert!(StartLock::acquire(&manager.config().lock_file()).is_ok());
    }

    #[test]
    fn test_foreground_startup_error_clears_record() {
        let temp_dir = TempDir::new().unwrap();
        let manager = DaemonManager::new(test_config(&temp_dir)).with_runner(FailingRunner);

        assert!(matches!(
            manager.run_foreground(9300),
            Err(Kiro2ApiError::StartupError(_))
        ));
        assert!(!manager.pid_file().exists());
        assert!(manager.recent_logs(1)[0].contains("kiro2api failed"));
    }

    /// Wrapper whose signals never remove the pid from the table
    struct Unkillable(FakeProcesses);

    impl ProcessProbe for Unkillable {
        fn exists(&self, pid: u32) -> bool {
            self.0.exists(pid)
        }
    }

    impl ProcessSignaller for Unkillable {
        fn signal(&self, pid: u32, signal: StopSignal) -> Result<()> {
            self.0.state.lock().unwrap().sent.push((pid, signal));
            Ok(())
        }
    }
}
