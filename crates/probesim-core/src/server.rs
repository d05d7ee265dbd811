//! Command server
//!
//! The protocol engine: reads one command line at a time from the transport,
//! dispatches it, and writes the response back. Runs until cancelled or the
//! transport fails. The periodic sampler shares the transport writer and the
//! sample cursor with this loop.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{PeriodicSampler, SampleStore, TransportError, TxHandle};

/// Reply sent for anything that does not parse as a command
pub const INVALID_COMMAND_REPLY: &str = "Invalid Command";

/// One parsed command line. Parsed fresh from each line, no persistent
/// identity.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// `GET_SAMPLE`: reply with the record at the cursor, advance the cursor
    GetSample,
    /// `PERIOD <n>`: reconfigure the periodic sampler
    SetPeriod(f64),
    /// Anything else (including malformed period values)
    Unknown(String),
}

/// Parse a normalized (trimmed, uppercased) line into a [`Command`].
///
/// A `PERIOD` value must parse as a finite, non-negative number; anything
/// else falls through to `Unknown`.
pub fn parse_command(line: &str) -> Command {
    if line == "GET_SAMPLE" {
        return Command::GetSample;
    }
    if let Some(raw) = line.strip_prefix("PERIOD ") {
        if let Ok(value) = raw.trim().parse::<f64>() {
            if value.is_finite() && value >= 0.0 {
                return Command::SetPeriod(value);
            }
        }
    }
    Command::Unknown(line.to_string())
}

/// Command server lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// Serving commands
    Running,
    /// Tearing down: sampler cancelled, transport closing
    Stopping,
    /// Terminal
    Stopped,
}

/// The command-response loop over one serial session.
///
/// Owns the read half of the transport and the periodic sampler; shares the
/// write half (via [`TxHandle`]) and the sample cursor with the sampler.
pub struct CommandServer<R> {
    reader: BufReader<R>,
    tx: TxHandle,
    store: Arc<SampleStore>,
    sampler: PeriodicSampler,
    shutdown: CancellationToken,
    state: ServerState,
}

impl<R: AsyncRead + Unpin> CommandServer<R> {
    /// Create a server over an opened transport
    pub fn new(
        reader: R,
        tx: TxHandle,
        store: Arc<SampleStore>,
        sampler: PeriodicSampler,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            reader: BufReader::new(reader),
            tx,
            store,
            sampler,
            shutdown,
            state: ServerState::Running,
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> ServerState {
        self.state
    }

    /// Serve the session until cancelled, the peer disconnects, or the
    /// transport fails. Cleanup (sampler cancel, transport close) runs on
    /// every exit path; a transport failure is returned after cleanup.
    pub async fn run(mut self) -> Result<(), TransportError> {
        info!("command server running");
        let result = self.serve().await;
        self.stop().await;
        result
    }

    async fn serve(&mut self) -> Result<(), TransportError> {
        let mut buf = Vec::new();
        loop {
            buf.clear();
            let read = tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!("shutdown requested");
                    return Ok(());
                }
                read = self.reader.read_until(b'\n', &mut buf) => read,
            };

            match read {
                // Peer closed the line: end the session, no reconnect
                Ok(0) => {
                    info!("peer closed the connection");
                    return Ok(());
                }
                Ok(_) => {}
                Err(e) => {
                    error!("transport read failed: {e}");
                    return Err(e.into());
                }
            }

            // Invalid UTF-8 becomes an unknown command rather than a fatal error
            let line = String::from_utf8_lossy(&buf).trim_end().to_uppercase();
            if line.is_empty() {
                continue;
            }
            self.dispatch(&line).await?;
        }
    }

    /// Dispatch one normalized command line. A malformed command is reported
    /// to the peer and never aborts the loop; a failed response write does.
    async fn dispatch(&mut self, line: &str) -> Result<(), TransportError> {
        match parse_command(line) {
            Command::GetSample => {
                let record = self.store.next();
                self.tx.send_line(&record.concat_values()).await
            }
            Command::SetPeriod(value) => {
                self.sampler.configure(value).await;
                self.tx
                    .send_line(&format!("SET NEW PERIOD: {value} (seconds)"))
                    .await
            }
            Command::Unknown(text) => {
                debug!("invalid command: {text}");
                self.tx.send_line(INVALID_COMMAND_REPLY).await
            }
        }
    }

    /// Idempotent teardown: cancel the push timer, close the transport
    async fn stop(&mut self) {
        if self.state != ServerState::Running {
            return;
        }
        self.state = ServerState::Stopping;
        self.sampler.disable().await;
        if let Err(e) = self.tx.shutdown().await {
            warn!("closing transport: {e}");
        }
        self.state = ServerState::Stopped;
        info!("command server stopped");
    }
}
