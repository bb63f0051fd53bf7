use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use rand::Rng;
use tracing::{error, info, warn};

use tokenhound_common::{Clock, CollectorConfig, ListingRow, Snapshot, TokenhoundError};

use crate::fetcher::PageSource;
use crate::identity::IdentityRotator;

/// Clears a busy flag when dropped, so early returns and panics release it.
pub(crate) struct RunGuard<'a>(&'a AtomicBool);

impl<'a> RunGuard<'a> {
    pub(crate) fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Counters that survive across cycles.
#[derive(Debug, Clone)]
pub struct CollectionState {
    pub consecutive_failures: u32,
    pub last_success: DateTime<Utc>,
    pub total_attempts: u64,
    /// Index into the user-agent pool used by the previous cycle.
    pub last_user_agent: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Snapshot replaced with this many rows.
    Collected(usize),
    /// Every page came back empty; the snapshot was left alone.
    NoRows,
    /// The failure window ran out; took the extended break instead.
    Degraded,
    /// Another cycle was already running.
    Skipped,
    Failed,
}

impl CycleOutcome {
    pub fn is_success(self) -> bool {
        matches!(self, CycleOutcome::Collected(_))
    }
}

/// Runs one collection cycle at a time across all listing pages and
/// replaces the snapshot when anything was collected.
pub struct CollectionOrchestrator {
    source: Arc<dyn PageSource>,
    rotator: Arc<dyn IdentityRotator>,
    clock: Arc<dyn Clock>,
    config: CollectorConfig,
    running: AtomicBool,
    state: Mutex<CollectionState>,
}

impl CollectionOrchestrator {
    pub fn new(
        source: Arc<dyn PageSource>,
        rotator: Arc<dyn IdentityRotator>,
        clock: Arc<dyn Clock>,
        config: CollectorConfig,
    ) -> Self {
        let state = CollectionState {
            consecutive_failures: 0,
            last_success: clock.now(),
            total_attempts: 0,
            last_user_agent: None,
        };
        Self {
            source,
            rotator,
            clock,
            config,
            running: AtomicBool::new(false),
            state: Mutex::new(state),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CollectionState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn state(&self) -> CollectionState {
        self.lock().clone()
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.lock().consecutive_failures
    }

    pub fn reset_failures(&self) {
        self.lock().consecutive_failures = 0;
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn config(&self) -> &CollectorConfig {
        &self.config
    }

    /// Run one cycle. `true` only when a snapshot was written.
    pub async fn collect_all(&self) -> bool {
        self.run_cycle().await.is_success()
    }

    pub async fn run_cycle(&self) -> CycleOutcome {
        let Some(_guard) = RunGuard::acquire(&self.running) else {
            info!("Collection cycle already running, skipping");
            return CycleOutcome::Skipped;
        };

        let started = Instant::now();
        let (attempt, failures, since_success) = {
            let mut state = self.lock();
            state.total_attempts += 1;
            let since = (self.clock.now() - state.last_success)
                .to_std()
                .unwrap_or(Duration::ZERO);
            (state.total_attempts, state.consecutive_failures, since)
        };
        info!(
            attempt,
            consecutive_failures = failures,
            secs_since_success = since_success.as_secs(),
            "Starting collection cycle"
        );

        if since_success > self.config.degradation_window {
            warn!(
                minutes_since_success = since_success.as_secs() / 60,
                break_secs = self.config.extended_cooldown.as_secs(),
                "No successful collection for too long, taking an extended break"
            );
            tokio::time::sleep(self.config.extended_cooldown).await;
            let mut state = self.lock();
            state.consecutive_failures = 0;
            state.last_success = self.clock.now();
            return CycleOutcome::Degraded;
        }

        let user_agent = self.next_user_agent();

        let outcome = match self.collect_pages(&user_agent).await {
            Ok(0) => {
                let failures = self.record_failure();
                warn!(consecutive_failures = failures, "No rows collected, snapshot left untouched");
                CycleOutcome::NoRows
            }
            Ok(rows) => {
                {
                    let mut state = self.lock();
                    state.consecutive_failures = 0;
                    state.last_success = self.clock.now();
                }
                info!(rows, "Snapshot replaced");
                CycleOutcome::Collected(rows)
            }
            Err(e) => {
                let failures = self.record_failure();
                error!(error = %e, consecutive_failures = failures, "Collection cycle failed");
                CycleOutcome::Failed
            }
        };

        info!(
            attempt,
            elapsed_secs = started.elapsed().as_secs(),
            ?outcome,
            "Collection cycle finished"
        );
        outcome
    }

    fn record_failure(&self) -> u32 {
        let mut state = self.lock();
        state.consecutive_failures += 1;
        state.consecutive_failures
    }

    async fn collect_pages(&self, user_agent: &str) -> Result<usize, TokenhoundError> {
        let mut rows: Vec<ListingRow> = Vec::new();
        let last_page = self.config.last_page;

        for page in self.config.pages() {
            let page_rows = self.fetch_with_retry(page, user_agent).await;
            info!(page, rows = page_rows.len(), "Page done");
            rows.extend(page_rows);

            if page < last_page {
                tokio::time::sleep(self.config.inter_page_delay).await;
            }
        }

        if rows.is_empty() {
            return Ok(0);
        }

        let snapshot = Snapshot::new(rows, self.clock.now());
        snapshot.save(&self.config.snapshot_path)?;
        Ok(snapshot.total_tokens)
    }

    /// Rotates identity before every retry, and once more when the last
    /// attempt ended in a navigation timeout so the next page starts fresh.
    async fn fetch_with_retry(&self, page: u32, user_agent: &str) -> Vec<ListingRow> {
        let policy = &self.config.retry;

        for attempt in 1..=policy.max_attempts {
            info!(page, attempt, max_attempts = policy.max_attempts, "Fetching listing page");
            let final_attempt = attempt == policy.max_attempts;

            match self.source.fetch_page(page, user_agent).await {
                Ok(rows) if !rows.is_empty() => return rows,
                Ok(_) => warn!(page, attempt, "Page came back empty"),
                Err(e) => {
                    warn!(page, attempt, error = %e, "Error fetching listing page");
                    if final_attempt && e.is_timeout() {
                        self.rotate_identity().await;
                    }
                }
            }

            if !final_attempt {
                let backoff = policy.backoff(attempt);
                info!(page, attempt, backoff_secs = backoff.as_secs(), "Rotating identity before retry");
                self.rotate_identity().await;
                tokio::time::sleep(backoff).await;
            }
        }

        warn!(page, max_attempts = policy.max_attempts, "Giving up on page");
        Vec::new()
    }

    async fn rotate_identity(&self) {
        match self.rotator.rotate().await {
            Ok(()) => info!("Proxy identity rotated"),
            Err(e) => warn!(error = %e, "Identity rotation failed"),
        }
    }

    /// Pick a user agent different from the previous cycle's.
    fn next_user_agent(&self) -> String {
        let agents = &self.config.user_agents;
        if agents.is_empty() {
            return String::new();
        }
        let mut state = self.lock();
        let index = pick_distinct(agents.len(), state.last_user_agent);
        state.last_user_agent = Some(index);
        agents[index].clone()
    }
}

fn pick_distinct(len: usize, previous: Option<usize>) -> usize {
    if len <= 1 {
        return 0;
    }
    let mut rng = rand::rng();
    loop {
        let candidate = rng.random_range(0..len);
        if Some(candidate) != previous {
            return candidate;
        }
    }
}
