use std::collections::HashSet;

use anyhow::{Context, Result};
use tracing::{debug, error, info, warn};

use tokenhound_common::store::read_json;
use tokenhound_common::{EnricherConfig, ResultStore, Snapshot, SocialFeed, SocialPost};

use crate::classifier::{Classifier, Halt};
use crate::market::{rejoin, SnapshotWatcher};

/// What one `run` did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Classification calls made.
    pub attempted: usize,
    /// Records inserted or replaced.
    pub stored: usize,
    /// Calls that produced nothing worth keeping.
    pub skipped: usize,
    /// The provider ran out of quota and the rest of the queue was deferred.
    pub quota_exhausted: bool,
    /// The provider refused the credentials and the rest of the queue was deferred.
    pub credentials_rejected: bool,
}

impl RunSummary {
    /// Whether the run stopped before the end of its queue.
    pub fn halted(&self) -> bool {
        self.quota_exhausted || self.credentials_rejected
    }
}

/// Owns the result store and feeds symbols through the classifier, one at
/// a time, keeping market fields in step with the latest snapshot.
pub struct EnrichmentOrchestrator {
    classifier: Classifier,
    config: EnricherConfig,
    store: ResultStore,
    snapshot: Option<Snapshot>,
    watcher: SnapshotWatcher,
}

impl EnrichmentOrchestrator {
    /// Load the store and the current snapshot, then bring stored market
    /// fields up to date before any classification happens.
    ///
    /// An unreadable store is fatal: overwriting it would lose scored work.
    pub fn open(classifier: Classifier, config: EnricherConfig) -> Result<Self> {
        let store = ResultStore::load(&config.store_path)
            .with_context(|| format!("loading result store {}", config.store_path.display()))?;
        let snapshot = load_snapshot(&config);
        let watcher = SnapshotWatcher::new(&config.snapshot_path);

        info!(
            records = store.len(),
            snapshot_rows = snapshot.as_ref().map_or(0, |s| s.tokens.len()),
            model = classifier.model_name(),
            "Enrichment orchestrator ready"
        );

        let mut orchestrator = Self {
            classifier,
            config,
            store,
            snapshot,
            watcher,
        };

        if !orchestrator.store.is_empty() {
            if let Some(snapshot) = &orchestrator.snapshot {
                rejoin(orchestrator.store.records_mut(), snapshot);
                orchestrator.persist();
            }
        }
        Ok(orchestrator)
    }

    pub fn store(&self) -> &ResultStore {
        &self.store
    }

    pub fn config(&self) -> &EnricherConfig {
        &self.config
    }

    /// Read the social feed. A missing feed is empty.
    pub fn load_feed(&self) -> Result<SocialFeed> {
        let path = &self.config.social_feed_path;
        let feed = read_json::<SocialFeed>(path)
            .with_context(|| format!("loading social feed {}", path.display()))?;
        match feed {
            Some(feed) => Ok(feed),
            None => {
                warn!(path = %path.display(), "Social feed not found, nothing to enrich");
                Ok(SocialFeed::new())
            }
        }
    }

    /// Feed symbols with no stored record, in feed order.
    pub fn unseen(&self, feed: &SocialFeed) -> Vec<String> {
        let known: HashSet<String> = self.store.symbols();
        feed.keys().filter(|s| !known.contains(*s)).cloned().collect()
    }

    /// Startup pass: only symbols never scored before.
    pub async fn initial_pass(&mut self) -> Result<RunSummary> {
        let feed = self.load_feed()?;
        let symbols = self.unseen(&feed);
        info!(
            unseen = symbols.len(),
            known = self.store.len(),
            "Starting initial enrichment pass"
        );
        Ok(self.run(&symbols, &feed).await)
    }

    /// Re-score every symbol in the feed.
    pub async fn full_pass(&mut self) -> Result<RunSummary> {
        let feed = self.load_feed()?;
        let symbols: Vec<String> = feed.keys().cloned().collect();
        info!(symbols = symbols.len(), "Starting full enrichment pass");
        Ok(self.run(&symbols, &feed).await)
    }

    /// Classify `symbols` in order, pacing calls and persisting each kept
    /// record. Stops early on quota exhaustion or rejected credentials.
    pub async fn run(&mut self, symbols: &[String], feed: &SocialFeed) -> RunSummary {
        let mut summary = RunSummary::default();

        for (index, symbol) in symbols.iter().enumerate() {
            if index > 0 && !self.config.inter_call_delay.is_zero() {
                tokio::time::sleep(self.config.inter_call_delay).await;
            }

            self.refresh_market_if_changed();

            let posts: &[SocialPost] = feed
                .get(symbol)
                .map(|entry| entry.tweets.as_slice())
                .unwrap_or_default();
            let market = self.snapshot.as_ref().and_then(|s| s.find(symbol));
            if market.is_none() {
                debug!(symbol = %symbol, "No listing row for symbol");
            }

            info!(
                symbol = %symbol,
                position = index + 1,
                total = symbols.len(),
                posts = posts.len(),
                "Classifying"
            );
            summary.attempted += 1;

            match self.classifier.classify(symbol, posts, market).await {
                Ok(Some(record)) if record.is_complete() => {
                    let overall = record.overall;
                    let action = self.store.upsert(record);
                    info!(symbol = %symbol, overall, ?action, "Stored analysis");
                    summary.stored += 1;
                    self.persist();
                }
                Ok(Some(_)) => {
                    warn!(symbol = %symbol, "Incomplete analysis discarded");
                    summary.skipped += 1;
                }
                Ok(None) => summary.skipped += 1,
                Err(halt) => {
                    error!(
                        symbol = %symbol,
                        error = %halt,
                        remaining = symbols.len() - index - 1,
                        "Inference halted, deferring the rest of the queue"
                    );
                    match halt {
                        Halt::QuotaExhausted(_) => summary.quota_exhausted = true,
                        Halt::CredentialsRejected(_) => summary.credentials_rejected = true,
                    }
                    break;
                }
            }
        }

        info!(
            attempted = summary.attempted,
            stored = summary.stored,
            skipped = summary.skipped,
            quota_exhausted = summary.quota_exhausted,
            credentials_rejected = summary.credentials_rejected,
            "Enrichment run finished"
        );
        summary
    }

    /// Re-join market fields if the snapshot file was rewritten since the
    /// last look. Scores are untouched. Returns whether a refresh happened.
    pub fn refresh_market_if_changed(&mut self) -> bool {
        if !self.watcher.has_advanced() {
            return false;
        }
        let Some(snapshot) = load_snapshot(&self.config) else {
            return false;
        };
        rejoin(self.store.records_mut(), &snapshot);
        self.snapshot = Some(snapshot);
        self.persist();
        true
    }

    fn persist(&self) {
        match self.store.save(&self.config.store_path) {
            Ok(true) => debug!(records = self.store.len(), "Result store written"),
            Ok(false) => debug!("Result store empty, not written"),
            Err(e) => error!(error = %e, "Failed to write result store"),
        }
    }
}

/// The current snapshot, or `None` if it is missing or unreadable.
fn load_snapshot(config: &EnricherConfig) -> Option<Snapshot> {
    match Snapshot::load(&config.snapshot_path) {
        Ok(Some(snapshot)) => Some(snapshot),
        Ok(None) => {
            warn!(path = %config.snapshot_path.display(), "No snapshot yet, scoring without market data");
            None
        }
        Err(e) => {
            warn!(error = %e, "Snapshot unreadable, keeping previous market data");
            None
        }
    }
}
