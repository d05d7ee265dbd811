//! Periodic sampler
//!
//! Owns the cancellable repeating push timer. On each tick it pulls the next
//! sample from the store and writes it to the transport, independently of any
//! pending request/response on the command side.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{SampleStore, TxHandle};

/// Repeating auto-sample push, reconfigurable at any time.
///
/// Either disabled (no task) or armed with exactly one live timer task.
/// Reconfiguration cancels the previous task and waits for the cancellation
/// to complete before arming the replacement, so two timers can never fire
/// concurrently.
pub struct PeriodicSampler {
    store: Arc<SampleStore>,
    tx: TxHandle,
    timer: Option<Timer>,
}

/// A live timer: the cooperative cancel signal plus the handle to join on
struct Timer {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl PeriodicSampler {
    /// Create a disabled sampler
    pub fn new(store: Arc<SampleStore>, tx: TxHandle) -> Self {
        Self {
            store,
            tx,
            timer: None,
        }
    }

    /// Whether a push timer is currently armed
    pub fn is_armed(&self) -> bool {
        self.timer.is_some()
    }

    /// Replace the push timer.
    ///
    /// Cancels any armed timer first (confirmed, not fire-and-forget): the
    /// cancel is cooperative, observed only between pushes, so an in-flight
    /// push always completes as a whole line before the task exits. A period
    /// greater than zero arms a new repeating timer whose first push happens
    /// one full period after arming; zero, anything non-finite, or a period
    /// too large for a timer leaves the sampler disabled.
    pub async fn configure(&mut self, period_secs: f64) {
        if let Some(timer) = self.timer.take() {
            timer.cancel.cancel();
            // Wait for the old timer to actually stop before re-arming
            let _ = timer.task.await;
        }

        if !(period_secs > 0.0) || !period_secs.is_finite() {
            debug!("periodic sampling disabled");
            return;
        }
        let period = match Duration::try_from_secs_f64(period_secs) {
            Ok(period) => period,
            Err(_) => {
                warn!("period {period_secs}s is too large for a timer; periodic sampling disabled");
                return;
            }
        };

        let store = Arc::clone(&self.store);
        let tx = self.tx.clone();
        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();

        debug!("periodic sampling armed, period {period_secs}s");
        // Schedule from the moment of reconfiguration, not first poll
        let mut ticker = time::interval_at(Instant::now() + period, period);
        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = task_cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let record = store.next();
                        // A failed push must not kill the timer; only
                        // configure(0) or shutdown removes it.
                        if let Err(e) = tx.send_line(&record.concat_values()).await {
                            warn!("periodic sample push failed: {e}");
                        }
                    }
                }
            }
        });
        self.timer = Some(Timer { cancel, task });
    }

    /// Cancel any armed timer
    pub async fn disable(&mut self) {
        self.configure(0.0).await;
    }
}

impl std::fmt::Debug for PeriodicSampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeriodicSampler")
            .field("armed", &self.is_armed())
            .finish()
    }
}
