// Tracing setup for the controlling CLI and the detached daemon

use std::sync::OnceLock;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, reload, EnvFilter, Layer, Registry};

type FormatLayer = Box<dyn Layer<Registry> + Send + Sync>;

static FORMAT_HANDLE: OnceLock<reload::Handle<FormatLayer, Registry>> = OnceLock::new();

/// Default filter when `RUST_LOG` is unset
const DEFAULT_FILTER: &str = "kiro2api=info";

/// Install the global subscriber with terminal-friendly output on stderr
pub fn init() {
    let (format, handle) = reload::Layer::new(terminal_layer());
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    if tracing_subscriber::registry()
        .with(format)
        .with(filter)
        .try_init()
        .is_ok()
    {
        let _ = FORMAT_HANDLE.set(handle);
    }
}

/// Switch to timestamped, uncoloured output once stderr points at the log file
pub fn use_log_file_format() {
    if let Some(handle) = FORMAT_HANDLE.get() {
        if let Err(e) = handle.reload(log_file_layer()) {
            eprintln!("failed to switch log format: {}", e);
        }
    }
}

fn terminal_layer() -> FormatLayer {
    fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .compact()
        .boxed()
}

fn log_file_layer() -> FormatLayer {
    fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(false)
        .boxed()
}
