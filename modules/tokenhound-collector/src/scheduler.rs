use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use tracing::{info, warn};

use tokenhound_common::config::SchedulerBackoff;
use tokenhound_common::RecurringTask;

use crate::identity::IdentityRotator;
use crate::orchestrator::{CollectionOrchestrator, RunGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Succeeded { attempts: u32 },
    /// Per-tick attempt budget spent without a snapshot.
    Exhausted { attempts: u32 },
    /// Failure ceiling hit; paused and reset the counter.
    CeilingReached,
    /// A previous tick was still in flight.
    Skipped,
}

/// Drives the orchestrator on a fixed period with failure-aware backoff.
pub struct CollectionLoop {
    orchestrator: Arc<CollectionOrchestrator>,
    rotator: Arc<dyn IdentityRotator>,
    backoff: SchedulerBackoff,
    in_flight: AtomicBool,
    task: RecurringTask,
}

impl CollectionLoop {
    pub fn new(orchestrator: Arc<CollectionOrchestrator>, rotator: Arc<dyn IdentityRotator>) -> Self {
        let backoff = orchestrator.config().backoff.clone();
        let period = orchestrator.config().period;
        Self {
            orchestrator,
            rotator,
            backoff,
            in_flight: AtomicBool::new(false),
            task: RecurringTask::new("collector", period),
        }
    }

    /// Log whether the proxy control endpoint answers. Never fatal.
    pub async fn check_health(&self) -> bool {
        let reachable = self.rotator.is_reachable().await;
        if reachable {
            info!("Proxy control endpoint reachable");
        } else {
            warn!("Proxy control endpoint unreachable, identity rotation will fail");
        }
        reachable
    }

    /// One orchestrator cycle, unless one is already in flight.
    pub async fn run_single(&self) -> bool {
        let Some(_guard) = RunGuard::acquire(&self.in_flight) else {
            info!("Collection already in flight, skipping");
            return false;
        };
        self.orchestrator.collect_all().await
    }

    /// Keep attempting until a cycle succeeds, the per-tick budget runs
    /// out, or consecutive failures reach the ceiling.
    pub async fn run_with_retry(&self) -> TickOutcome {
        if self.orchestrator.is_running() {
            info!("Collection already in flight, skipping tick");
            return TickOutcome::Skipped;
        }

        let mut attempts = 0;
        loop {
            let failures = self.orchestrator.consecutive_failures();
            if failures >= self.backoff.hard_ceiling {
                warn!(
                    consecutive_failures = failures,
                    pause_secs = self.backoff.long_pause.as_secs(),
                    "Failure ceiling reached, pausing before resetting"
                );
                tokio::time::sleep(self.backoff.long_pause).await;
                self.orchestrator.reset_failures();
                return TickOutcome::CeilingReached;
            }

            if attempts >= self.backoff.max_attempts_per_tick {
                warn!(attempts, consecutive_failures = failures, "Attempt budget for this tick spent");
                return TickOutcome::Exhausted { attempts };
            }

            attempts += 1;
            info!(attempt = attempts, max_attempts = self.backoff.max_attempts_per_tick, "Collection attempt");
            if self.run_single().await {
                return TickOutcome::Succeeded { attempts };
            }

            let failures = self.orchestrator.consecutive_failures();
            if failures < self.backoff.hard_ceiling {
                let wait = self.backoff.wait_for(failures);
                info!(consecutive_failures = failures, wait_secs = wait.as_secs(), "Backing off");
                tokio::time::sleep(wait).await;
            }
        }
    }

    /// Start the periodic loop. The first tick is one period out.
    pub fn start(self: &Arc<Self>) -> bool {
        let weak = Arc::downgrade(self);
        self.task.start(move || {
            let weak = weak.clone();
            async move {
                if let Some(this) = weak.upgrade() {
                    let outcome = this.run_with_retry().await;
                    info!(?outcome, "Scheduled collection tick done");
                }
            }
        })
    }

    pub fn is_scheduled(&self) -> bool {
        self.task.is_running()
    }

    pub async fn shutdown(&self) {
        self.task.shutdown().await;
    }
}
