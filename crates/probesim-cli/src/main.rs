//! probesim — serial sensor device emulator
//!
//! Serves row-formatted samples from a file over a serial line and supports
//! a host-configurable periodic auto-sample push. Stands in for real
//! hardware during integration testing of a data-acquisition client.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use probesim_core::{transport, CommandServer, PeriodicSampler, SampleStore, TxHandle};

#[derive(Parser, Debug)]
#[command(name = "probesim", version, about)]
struct Cli {
    /// The serial port the emulator should serve on, e.g., /dev/ttyUSB0
    serial_port: String,

    /// The path to the sample data file, e.g., /path/to/file.txt
    filename: PathBuf,

    /// The interval in seconds between unsolicited sample pushes (0 disables)
    #[arg(default_value_t = 0.0, value_parser = parse_period)]
    period: f64,
}

fn parse_period(raw: &str) -> Result<f64, String> {
    let value: f64 = raw
        .parse()
        .map_err(|_| format!("'{raw}' is not a number"))?;
    if !value.is_finite() || value < 0.0 {
        return Err("period must be a finite, non-negative number of seconds".to_string());
    }
    Ok(value)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let store = Arc::new(
        SampleStore::from_path(&cli.filename)
            .with_context(|| format!("loading sample file {}", cli.filename.display()))?,
    );
    info!(
        "loaded {} samples ({} columns) from {}",
        store.len(),
        store.columns().len(),
        cli.filename.display()
    );

    let stream = transport::open(&cli.serial_port, transport::DEFAULT_BAUD_RATE)
        .with_context(|| format!("connecting to serial device {}", cli.serial_port))?;

    let (reader, writer) = tokio::io::split(stream);
    let tx = TxHandle::new(writer);

    let mut sampler = PeriodicSampler::new(Arc::clone(&store), tx.clone());
    sampler.configure(cli.period).await;

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupt received, shutting down");
                shutdown.cancel();
            }
        });
    }

    let server = CommandServer::new(reader, tx, store, sampler, shutdown);
    info!("emulator started on {}", cli.serial_port);
    server.run().await.context("serial session failed")?;
    info!("emulator stopped");

    Ok(())
}
