//! Serial transport
//!
//! Opens the serial line and provides the shared writer handle used by both
//! the command server and the periodic sampler.

use std::sync::Arc;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tokio_serial::{SerialPortBuilderExt, SerialStream};

use super::TransportError;

/// Baud rate the emulated device runs at
pub const DEFAULT_BAUD_RATE: u32 = 9200;

/// Open the serial port for the session.
///
/// Open failure is fatal at startup and surfaced as
/// [`TransportError::Open`], distinct from runtime I/O errors.
pub fn open(port: &str, baud_rate: u32) -> Result<SerialStream, TransportError> {
    let stream = tokio_serial::new(port, baud_rate)
        .open_native_async()
        .map_err(|source| TransportError::Open {
            port: port.to_string(),
            source,
        })?;

    #[cfg(unix)]
    let stream = {
        let mut stream = stream;
        // Allow reopening the same virtual port across emulator restarts
        if let Err(e) = stream.set_exclusive(false) {
            tracing::warn!("could not clear exclusive mode on {port}: {e}");
        }
        stream
    };

    Ok(stream)
}

/// Cloneable handle to the write half of the transport.
///
/// Both the command server and the periodic sampler write through this
/// handle; the lock makes each line one atomic unit, so writes from the two
/// activities interleave but never tear.
#[derive(Clone)]
pub struct TxHandle {
    writer: Arc<Mutex<Box<dyn AsyncWrite + Send + Unpin>>>,
}

impl TxHandle {
    /// Wrap the write half of a transport
    pub fn new(writer: impl AsyncWrite + Send + Unpin + 'static) -> Self {
        Self {
            writer: Arc::new(Mutex::new(Box::new(writer))),
        }
    }

    /// Write one newline-terminated line and flush it.
    ///
    /// Payload and terminator go out as a single write, so the line is the
    /// atomic unit on the wire.
    pub async fn send_line(&self, text: &str) -> Result<(), TransportError> {
        let mut line = Vec::with_capacity(text.len() + 1);
        line.extend_from_slice(text.as_bytes());
        line.push(b'\n');

        let mut writer = self.writer.lock().await;
        writer.write_all(&line).await?;
        writer.flush().await?;
        Ok(())
    }

    /// Close the write half. Called exactly once at session end.
    pub async fn shutdown(&self) -> Result<(), TransportError> {
        let mut writer = self.writer.lock().await;
        writer.shutdown().await?;
        Ok(())
    }
}

impl std::fmt::Debug for TxHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TxHandle").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn test_send_line_appends_newline() {
        let (client, server) = tokio::io::duplex(256);
        let tx = TxHandle::new(server);
        tx.send_line("12").await.unwrap();
        tx.send_line("34").await.unwrap();
        tx.shutdown().await.unwrap();

        let mut out = String::new();
        let mut client = client;
        client.read_to_string(&mut out).await.unwrap();
        assert_eq!(out, "12\n34\n");
    }

    #[tokio::test]
    async fn test_open_missing_port_is_open_error() {
        let err = open("/dev/definitely-not-a-port", DEFAULT_BAUD_RATE).unwrap_err();
        match err {
            TransportError::Open { port, .. } => {
                assert_eq!(port, "/dev/definitely-not-a-port");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
