use thiserror::Error;

/// Main error type for the kiro2api supervisor
#[derive(Debug, Error)]
pub enum Kiro2ApiError {
    // Detach errors
    #[error("Fork failed: {0}")]
    ForkFailure(String),

    #[error("Failed to isolate daemon session: {0}")]
    SessionError(String),

    // Identity store and log sink errors
    #[error("PID file error: {0}")]
    PidFileError(String),

    #[error("Failed to open log file: {0}")]
    LogFileError(String),

    #[error("Start lock error: {0}")]
    LockError(String),

    #[error("kiro2api is already running: {0}")]
    AlreadyRunning(String),

    // Signal errors
    #[error("Signal error: {0}")]
    SignalError(String),

    // Service runner errors
    #[error("Service failed to start: {0}")]
    StartupError(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid configuration file: {0}")]
    InvalidConfig(String),

    // IO errors (automatically converted from std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for kiro2api operations
pub type Result<T> = std::result::Result<T, Kiro2ApiError>;
