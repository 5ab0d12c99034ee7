//! Janitor
//!
//! Background task that periodically removes expired entries.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::error::{Error, Result};

/// Bulk eviction entry point driven by a [`Janitor`]
pub trait ExpirySweep: Send + Sync + 'static {
    /// Remove every expired entry, returning how many were removed
    fn delete_expired(&self) -> usize;
}

/// Janitor lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JanitorState {
    /// Constructed, not started
    Idle,
    /// Sweep loop active
    Running,
    /// Terminal
    Stopped,
}

/// Shortest sweep interval a janitor accepts
pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

const IDLE: u8 = 0;
const RUNNING: u8 = 1;
const STOPPED: u8 = 2;

impl JanitorState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            IDLE => JanitorState::Idle,
            RUNNING => JanitorState::Running,
            _ => JanitorState::Stopped,
        }
    }
}

/// Periodic eviction driver
#[derive(Debug)]
pub struct Janitor {
    interval: Duration,
    state: AtomicU8,
    cancel: CancellationToken,
}

impl Janitor {
    /// Create an idle janitor. Intervals below [`MIN_INTERVAL`] are raised to it.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval: interval.max(MIN_INTERVAL),
            state: AtomicU8::new(IDLE),
            cancel: CancellationToken::new(),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn state(&self) -> JanitorState {
        JanitorState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Spawn the sweep loop on the current Tokio runtime.
    ///
    /// The loop holds only a weak reference to `target` and exits on the
    /// first tick after the target is dropped.
    pub fn start<T: ExpirySweep>(&self, target: &Arc<T>) -> Result<JoinHandle<()>> {
        let handle = tokio::runtime::Handle::try_current().map_err(|_| Error::NoRuntime)?;

        if let Err(current) =
            self.state
                .compare_exchange(IDLE, RUNNING, Ordering::AcqRel, Ordering::Acquire)
        {
            return Err(Error::JanitorNotIdle {
                state: JanitorState::from_u8(current),
            });
        }

        info!("Janitor started, interval: {:?}", self.interval);
        Ok(handle.spawn(run(
            Arc::downgrade(target),
            self.interval,
            self.cancel.clone(),
        )))
    }

    /// Token the sweep loop watches for cancellation
    pub(crate) fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Signal the loop to exit without waiting for it.
    ///
    /// Returns true if this call performed the stop; later calls are no-ops.
    pub fn stop(&self) -> bool {
        if self.state.swap(STOPPED, Ordering::AcqRel) == STOPPED {
            return false;
        }
        self.cancel.cancel();
        info!("Janitor stopped");
        true
    }
}

async fn run<T: ExpirySweep>(target: Weak<T>, period: Duration, cancel: CancellationToken) {
    // First sweep fires one full interval after start
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let Some(target) = target.upgrade() else {
                    debug!("Janitor target dropped, exiting");
                    break;
                };
                sweep(target.as_ref());
            }
        }
    }
}

fn sweep<T: ExpirySweep>(target: &T) {
    match panic::catch_unwind(AssertUnwindSafe(|| target.delete_expired())) {
        Ok(0) => {}
        Ok(removed) => debug!(removed = removed, "Cleaned up expired keys"),
        Err(_) => error!("Expired-entry sweep panicked; janitor keeps running"),
    }
}
