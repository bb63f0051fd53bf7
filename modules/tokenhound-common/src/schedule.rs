use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

/// A periodic job with a single execution slot.
///
/// The job runs inline on the task's own loop, so a tick that comes due
/// while a run is still going is dropped rather than queued. `start` is
/// idempotent and `cancel` takes effect between runs.
pub struct RecurringTask {
    name: &'static str,
    period: Duration,
    handle: Mutex<Option<JoinHandle<()>>>,
    shutdown: watch::Sender<bool>,
}

impl RecurringTask {
    pub fn new(name: &'static str, period: Duration) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            name,
            period,
            handle: Mutex::new(None),
            shutdown,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Spawn the loop. The first run happens one period from now.
    /// Returns `false` if the loop is already running.
    pub fn start<F, Fut>(&self, mut job: F) -> bool
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut slot = self.handle.lock().unwrap_or_else(|e| e.into_inner());
        if slot.as_ref().is_some_and(|h| !h.is_finished()) {
            debug!(task = self.name, "Recurring task already running");
            return false;
        }

        self.shutdown.send_replace(false);
        let mut shutdown = self.shutdown.subscribe();
        let name = self.name;
        let period = self.period;

        *slot = Some(tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            info!(task = name, period_secs = period.as_secs(), "Recurring task started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                        continue;
                    }
                }
                if *shutdown.borrow() {
                    break;
                }
                job().await;
            }

            info!(task = name, "Recurring task stopped");
        }));
        true
    }

    /// Stop after the current run, if any, finishes.
    pub fn cancel(&self) {
        self.shutdown.send_replace(true);
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    /// Cancel and wait for the loop to exit.
    pub async fn shutdown(&self) {
        self.cancel();
        let handle = self.handle.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

impl Drop for RecurringTask {
    fn drop(&mut self) {
        self.shutdown.send_replace(true);
    }
}
