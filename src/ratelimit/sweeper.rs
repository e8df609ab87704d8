//! Background sweep of expired hit records.

use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use super::store::WindowStore;

/// Handle to a running sweep task.
///
/// The task stops when this handle is dropped or when the store it watches
/// is dropped; it never holds the store alive on its own.
#[derive(Debug)]
pub struct Sweeper {
    handle: JoinHandle<()>,
}

impl Sweeper {
    /// Start sweeping `store` every `interval` on the current tokio runtime.
    ///
    /// A zero interval is raised to one second.
    pub fn spawn(store: &Arc<WindowStore>, interval: Duration) -> Self {
        let interval = interval.max(Duration::from_secs(1));
        let store = Arc::downgrade(store);

        info!(interval_ms = interval.as_millis() as u64, "Starting hit record sweeper");

        let handle = tokio::spawn(sweep_loop(store, interval));
        Self { handle }
    }

    /// Whether the sweep task has exited.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Stop the sweep task.
    pub fn stop(self) {
        self.handle.abort();
    }
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn sweep_loop(store: Weak<WindowStore>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let Some(store) = store.upgrade() else {
            debug!("Hit store dropped, stopping sweeper");
            return;
        };
        store.clean_store();
    }
}
