use crate::error::{Kiro2ApiError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the per-user state directory under the home directory
pub const STATE_DIR_NAME: &str = ".kiro2api";

/// Environment variable that overrides the state directory
pub const STATE_DIR_ENV: &str = "KIRO2API_HOME";

const PID_FILE_NAME: &str = "kiro2api.pid";
const LOG_FILE_NAME: &str = "kiro2api.log";
const LOCK_FILE_NAME: &str = "kiro2api.lock";
const CONFIG_FILE_NAME: &str = "config.toml";

/// Supervisor configuration: where the daemon keeps its identity and logs,
/// and how patient the controlling side is when stopping it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorConfig {
    /// Directory holding the PID file, log file and start lock
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,

    /// PID file override (defaults to `<state_dir>/kiro2api.pid`)
    #[serde(default)]
    pub pid_file: Option<PathBuf>,

    /// Log file override (defaults to `<state_dir>/kiro2api.log`)
    #[serde(default)]
    pub log_file: Option<PathBuf>,

    /// Address the service binds to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port used when none is given on the command line
    #[serde(default = "default_port")]
    pub default_port: u16,

    /// How long to wait for a graceful exit before sending SIGKILL (in seconds)
    #[serde(default = "default_stop_timeout")]
    pub stop_timeout_secs: u64,

    /// Interval between liveness checks while stopping (in milliseconds)
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Extra time restart waits for the old instance to disappear (in seconds)
    #[serde(default = "default_restart_grace")]
    pub restart_grace_secs: u64,

    /// Number of log lines shown by `status`
    #[serde(default = "default_status_log_lines")]
    pub status_log_lines: usize,
}

// Default value functions for serde
fn default_state_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(STATE_DIR_ENV).filter(|v| !v.is_empty()) {
        return PathBuf::from(dir);
    }

    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(STATE_DIR_NAME)
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8989
}

fn default_stop_timeout() -> u64 {
    10
}

fn default_poll_interval() -> u64 {
    1000
}

fn default_restart_grace() -> u64 {
    5
}

fn default_status_log_lines() -> usize {
    5
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self::with_state_dir(default_state_dir())
    }
}

impl SupervisorConfig {
    /// Create a configuration rooted at a specific state directory
    pub fn with_state_dir<P: AsRef<Path>>(state_dir: P) -> Self {
        Self {
            state_dir: state_dir.as_ref().to_path_buf(),
            pid_file: None,
            log_file: None,
            host: default_host(),
            default_port: default_port(),
            stop_timeout_secs: default_stop_timeout(),
            poll_interval_ms: default_poll_interval(),
            restart_grace_secs: default_restart_grace(),
            status_log_lines: default_status_log_lines(),
        }
    }

    /// Load the configuration.
    ///
    /// An explicit path must exist. Without one, `<state_dir>/config.toml` is
    /// read when present and built-in defaults are used otherwise.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => {
                let path = Self::default_config_path();
                if path.exists() {
                    Self::from_file(&path)?
                } else {
                    Self::default()
                }
            }
        };

        config.validate()?;
        Ok(config)
    }

    /// Location of the optional configuration file
    pub fn default_config_path() -> PathBuf {
        default_state_dir().join(CONFIG_FILE_NAME)
    }

    /// Load a configuration file (supports TOML and JSON)
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Kiro2ApiError::ConfigError(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        let extension = path.extension().and_then(|s| s.to_str()).unwrap_or("");

        let mut config: SupervisorConfig = match extension {
            "toml" => toml::from_str(&contents)
                .map_err(|e| Kiro2ApiError::InvalidConfig(format!("Failed to parse TOML: {}", e)))?,
            "json" => serde_json::from_str(&contents)
                .map_err(|e| Kiro2ApiError::InvalidConfig(format!("Failed to parse JSON: {}", e)))?,
            _ => {
                return Err(Kiro2ApiError::InvalidConfig(format!(
                    "Unsupported file format: {}. Use .toml or .json",
                    extension
                )))
            }
        };

        config.expand_paths();
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.state_dir.as_os_str().is_empty() {
            return Err(Kiro2ApiError::ConfigError(
                "state_dir must not be empty".to_string(),
            ));
        }

        if self.default_port == 0 {
            return Err(Kiro2ApiError::ConfigError(
                "default_port must be between 1 and 65535".to_string(),
            ));
        }

        if self.stop_timeout_secs == 0 {
            return Err(Kiro2ApiError::ConfigError(
                "stop_timeout_secs must be at least 1".to_string(),
            ));
        }

        if self.poll_interval_ms == 0 {
            return Err(Kiro2ApiError::ConfigError(
                "poll_interval_ms must be at least 1".to_string(),
            ));
        }

        if self.status_log_lines == 0 {
            return Err(Kiro2ApiError::ConfigError(
                "status_log_lines must be at least 1".to_string(),
            ));
        }

        if self.pid_file() == self.log_file() {
            return Err(Kiro2ApiError::ConfigError(format!(
                "pid_file and log_file must differ (both are {})",
                self.pid_file().display()
            )));
        }

        Ok(())
    }

    /// Path of the identity (PID) file
    pub fn pid_file(&self) -> PathBuf {
        self.pid_file
            .clone()
            .unwrap_or_else(|| self.state_dir.join(PID_FILE_NAME))
    }

    /// Path of the append-only daemon log
    pub fn log_file(&self) -> PathBuf {
        self.log_file
            .clone()
            .unwrap_or_else(|| self.state_dir.join(LOG_FILE_NAME))
    }

    /// Path of the lock taken while a start is in progress
    pub fn lock_file(&self) -> PathBuf {
        self.state_dir.join(LOCK_FILE_NAME)
    }

    /// Get stop timeout as Duration
    pub fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_timeout_secs)
    }

    /// Get poll interval as Duration
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Get restart grace period as Duration
    pub fn restart_grace(&self) -> Duration {
        Duration::from_secs(self.restart_grace_secs)
    }

    /// Number of liveness polls that fit in the stop timeout
    pub fn stop_polls(&self) -> u64 {
        Self::polls_within(self.stop_timeout(), self.poll_interval())
    }

    /// Number of liveness polls that fit in the restart grace period
    pub fn restart_polls(&self) -> u64 {
        Self::polls_within(self.restart_grace(), self.poll_interval())
    }

    fn polls_within(window: Duration, interval: Duration) -> u64 {
        let interval_ms = interval.as_millis().max(1);
        let polls = window.as_millis().div_ceil(interval_ms);
        polls.max(1) as u64
    }

    /// Expand `~` and environment variables in path fields
    fn expand_paths(&mut self) {
        self.state_dir = expand_path(&self.state_dir);
        self.pid_file = self.pid_file.as_deref().map(expand_path);
        self.log_file = self.log_file.as_deref().map(expand_path);
    }
}

/// Expand a leading `~` and `$VAR` / `${VAR}` references in a path
fn expand_path(path: &Path) -> PathBuf {
    let mut expanded = path.to_string_lossy().into_owned();

    if expanded == "~" || expanded.starts_with("~/") {
        if let Some(home) = dirs::home_dir() {
            expanded = format!("{}{}", home.display(), &expanded[1..]);
        }
    }

    PathBuf::from(expand_vars(&expanded))
}

/// Substitute `$NAME` and `${NAME}` with the exact variable they name.
///
/// Unset or malformed references are left as written.
fn expand_vars(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(idx) = rest.find('$') {
        out.push_str(&rest[..idx]);
        let after = &rest[idx + 1..];

        let (name, consumed) = match after.strip_prefix('{') {
            Some(braced) => match braced.find('}') {
                Some(end) => (&braced[..end], end + 2),
                None => ("", 0),
            },
            None => {
                let end = after
                    .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                    .unwrap_or(after.len());
                (&after[..end], end)
            }
        };

        match lookup_var(name) {
            Some(value) => {
                out.push_str(&value);
                rest = &after[consumed..];
            }
            None => {
                out.push('$');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

fn lookup_var(name: &str) -> Option<String> {
    let valid = name.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        return None;
    }
    std::env::var(name).ok()
}
