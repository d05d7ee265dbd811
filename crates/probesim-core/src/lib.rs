//! # probesim Core Library
//!
//! Emulates a sensor device attached to a serial line. The device serves
//! row-formatted sample data from a delimited text file in response to
//! line-oriented commands, and supports a host-configurable periodic
//! "auto-sample" push over the same line.
//!
//! This library provides:
//! - Sample file loading and the shared, wrapping read cursor
//! - Serial transport plumbing (open, shared writer handle)
//! - The cancellable periodic sampler
//! - The command server loop (`GET_SAMPLE`, `PERIOD <n>`)
//!
//! ## Example
//!
//! ```rust,ignore
//! use probesim_core::{transport, CommandServer, PeriodicSampler, SampleStore, TxHandle};
//! use tokio_util::sync::CancellationToken;
//!
//! let store = std::sync::Arc::new(SampleStore::from_path("samples.csv")?);
//! let stream = transport::open("/dev/ttyUSB0", transport::DEFAULT_BAUD_RATE)?;
//! let (reader, writer) = tokio::io::split(stream);
//! let tx = TxHandle::new(writer);
//! let sampler = PeriodicSampler::new(store.clone(), tx.clone());
//! let server = CommandServer::new(reader, tx, store, sampler, CancellationToken::new());
//! server.run().await?;
//! ```

#![warn(missing_docs)]

mod error;
mod sampler;
mod server;
mod store;
pub mod transport;

pub use error::{SourceError, TransportError};
pub use sampler::PeriodicSampler;
pub use server::{parse_command, Command, CommandServer, ServerState, INVALID_COMMAND_REPLY};
pub use store::{SampleRecord, SampleStore};
pub use transport::TxHandle;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
