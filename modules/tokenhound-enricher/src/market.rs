use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::{debug, info};

use tokenhound_common::parse::{parse_change, parse_price};
use tokenhound_common::{AnalysisRecord, ListingRow, MarketFields, Snapshot};

fn non_empty(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

/// Market fields for a newly scored record. Missing values get placeholders.
pub fn market_fields(row: Option<&ListingRow>) -> MarketFields {
    let mut fields = MarketFields::default();
    if let Some(row) = row {
        refresh_market_fields(&mut fields, row);
    }
    fields
}

/// Overwrite `fields` with whatever `row` has; blank row values keep the
/// existing ones.
pub fn refresh_market_fields(fields: &mut MarketFields, row: &ListingRow) {
    if let Some(price) = non_empty(&row.price) {
        fields.price = parse_price(price);
    }
    if let Some(volume) = non_empty(&row.volume) {
        fields.volume = volume.to_string();
    }
    if let Some(mcap) = non_empty(&row.mcap) {
        fields.market_cap = mcap.to_string();
    }
    if let Some(liquidity) = non_empty(&row.liquidity) {
        fields.liquidity = liquidity.to_string();
    }
    if let Some(change) = non_empty(&row.change_24h) {
        fields.change_24h = parse_change(change);
    }
    if let Some(age) = non_empty(&row.age) {
        fields.age = age.to_string();
    }
    if let Some(href) = row.href.as_deref().and_then(non_empty) {
        fields.href = href.to_string();
    }
}

/// Re-join market fields for every record whose symbol is in `snapshot`.
/// Scores are left alone. Returns how many records were touched.
pub fn rejoin(records: &mut [AnalysisRecord], snapshot: &Snapshot) -> usize {
    let mut updated = 0;
    for record in records.iter_mut() {
        if let Some(row) = snapshot.find(&record.symbol) {
            refresh_market_fields(&mut record.market, row);
            updated += 1;
        }
    }
    info!(updated, total = records.len(), "Market data re-joined");
    updated
}

/// Tracks the snapshot file's modification time between checks.
#[derive(Debug)]
pub struct SnapshotWatcher {
    path: PathBuf,
    last_seen: Option<SystemTime>,
}

impl SnapshotWatcher {
    /// Starts from the file's current mtime, so only later writes count.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let last_seen = modified(&path);
        Self { path, last_seen }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True once per advance of the file's mtime.
    pub fn has_advanced(&mut self) -> bool {
        let Some(current) = modified(&self.path) else {
            return false;
        };
        let advanced = self.last_seen.map_or(true, |seen| current > seen);
        if advanced {
            debug!(path = %self.path.display(), "Snapshot file changed");
            self.last_seen = Some(current);
        }
        advanced
    }
}

fn modified(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}
