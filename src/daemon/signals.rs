// Bridge from termination signals to a cancellation token

use crate::error::{Kiro2ApiError, Result};
use tokio_util::sync::CancellationToken;

/// Cancels a token when SIGINT or SIGTERM arrives.
///
/// The OS handler only records the signal. Cleanup happens on the normal
/// return path once the service observes the cancelled token.
pub struct ShutdownSignal {
    #[cfg(unix)]
    handle: signal_hook::iterator::Handle,
}

impl ShutdownSignal {
    #[cfg(unix)]
    pub fn install(token: CancellationToken) -> Result<Self> {
        use signal_hook::consts::{SIGINT, SIGTERM};
        use signal_hook::iterator::Signals;

        let mut signals = Signals::new([SIGINT, SIGTERM])
            .map_err(|e| Kiro2ApiError::SignalError(format!("Failed to install handlers: {}", e)))?;
        let handle = signals.handle();

        std::thread::Builder::new()
            .name("signal-bridge".to_string())
            .spawn(move || {
                if let Some(sig) = signals.forever().next() {
                    tracing::info!(signal = sig, "received termination signal, shutting down");
                    token.cancel();
                }
            })
            .map_err(|e| {
                Kiro2ApiError::SignalError(format!("Failed to spawn signal bridge: {}", e))
            })?;

        Ok(Self { handle })
    }

    #[cfg(not(unix))]
    pub fn install(token: CancellationToken) -> Result<Self> {
        ctrlc::set_handler(move || {
            tracing::info!("received termination signal, shutting down");
            token.cancel();
        })
        .map_err(|e| Kiro2ApiError::SignalError(format!("Failed to install handler: {}", e)))?;

        Ok(Self {})
    }
}

#[cfg(unix)]
impl Drop for ShutdownSignal {
    fn drop(&mut self) {
        self.handle.close();
    }
}
