// Service runner - the long-running server the daemon hands control to

use crate::error::{Kiro2ApiError, Result};
use std::time::Instant;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{timeout, Duration};
use tokio_util::sync::CancellationToken;

/// Largest request head read before answering
const MAX_REQUEST_HEAD: usize = 8 * 1024;

/// How long a client gets to send its request head
const READ_TIMEOUT: Duration = Duration::from_secs(5);

/// A blocking server loop that runs until `shutdown` is cancelled
pub trait ServiceRunner: Send + Sync {
    /// Fails with `StartupError` when the service cannot come up.
    fn run(&self, port: u16, shutdown: CancellationToken) -> Result<()>;
}

/// TCP listener answering every request with a JSON health document.
///
/// Stands in for the API server: it owns the port for the daemon's lifetime
/// and lets callers confirm which process is serving it.
#[derive(Debug, Clone)]
pub struct ListenerService {
    host: String,
}

impl ListenerService {
    pub fn new(host: impl Into<String>) -> Self {
        Self { host: host.into() }
    }

    /// Accept connections on an already bound listener until cancelled
    pub async fn serve(&self, listener: TcpListener, shutdown: CancellationToken) -> Result<()> {
        let started = Instant::now();
        let addr = listener.local_addr()?;
        tracing::info!(%addr, "service listening");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        tracing::debug!(%peer, "accepted connection");
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(stream, started).await {
                                tracing::debug!(%peer, "connection error: {}", e);
                            }
                        });
                    }
                    Err(e) => tracing::warn!("failed to accept connection: {}", e),
                },
            }
        }

        tracing::info!(%addr, "service stopped");
        Ok(())
    }
}

impl ServiceRunner for ListenerService {
    fn run(&self, port: u16, shutdown: CancellationToken) -> Result<()> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("kiro2api-worker")
            .build()
            .map_err(|e| Kiro2ApiError::StartupError(format!("Failed to start runtime: {}", e)))?;

        runtime.block_on(async {
            let listener = TcpListener::bind((self.host.as_str(), port))
                .await
                .map_err(|e| {
                    Kiro2ApiError::StartupError(format!(
                        "Failed to bind {}:{}: {}",
                        self.host, port, e
                    ))
                })?;
            self.serve(listener, shutdown).await
        })
    }
}

async fn handle_connection(mut stream: TcpStream, started: Instant) -> std::io::Result<()> {
    let mut head = Vec::with_capacity(1024);
    let mut buf = [0u8; 1024];

    // Read until the end of the request head; the body is irrelevant.
    while !head.windows(4).any(|w| w == b"\r\n\r\n") && head.len() < MAX_REQUEST_HEAD {
        let read = match timeout(READ_TIMEOUT, stream.read(&mut buf)).await {
            Ok(read) => read?,
            Err(_) => break,
        };
        if read == 0 {
            break;
        }
        head.extend_from_slice(&buf[..read]);
    }

    let body = health_body(started);
    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    );
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await
}

fn health_body(started: Instant) -> String {
    serde_json::json!({
        "service": "kiro2api",
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "pid": std::process::id(),
        "uptime_secs": started.elapsed().as_secs(),
    })
    .to_string()
}
