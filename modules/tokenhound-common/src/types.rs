use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Listing rows and snapshots
// ---------------------------------------------------------------------------

/// One row of a listing page, kept as the site displays it.
///
/// Rows have no stable key; `symbol` is what downstream joins use, and two
/// pairs can share one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingRow {
    pub name: String,
    pub symbol: String,
    /// Quote-side symbol of the pair.
    pub symbol1: String,
    pub price: String,
    pub volume: String,
    pub liquidity: String,
    pub mcap: String,
    pub transactions: String,
    pub age: String,
    #[serde(rename = "change-5m")]
    pub change_5m: String,
    #[serde(rename = "change-1h")]
    pub change_1h: String,
    #[serde(rename = "change-6h")]
    pub change_6h: String,
    #[serde(rename = "change-24h")]
    pub change_24h: String,
    pub href: Option<String>,
}

/// Everything captured in one collection cycle. Replaces the previous
/// snapshot wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "totalTokens")]
    pub total_tokens: usize,
    pub tokens: Vec<ListingRow>,
}

impl Snapshot {
    pub fn new(tokens: Vec<ListingRow>, timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            total_tokens: tokens.len(),
            tokens,
        }
    }

    /// First row carrying `symbol`.
    pub fn find(&self, symbol: &str) -> Option<&ListingRow> {
        self.tokens.iter().find(|row| row.symbol == symbol)
    }
}

// ---------------------------------------------------------------------------
// Social feed
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SocialPost {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SocialEntry {
    #[serde(default)]
    pub tweets: Vec<SocialPost>,
}

/// Symbol → recent posts, produced by an external collaborator.
pub type SocialFeed = BTreeMap<String, SocialEntry>;

// ---------------------------------------------------------------------------
// Analysis records
// ---------------------------------------------------------------------------

/// One scored token as stored in the result file.
///
/// The score fields come from the model; the market fields are a join
/// against the latest snapshot and can be refreshed on their own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRecord {
    pub symbol: String,
    pub risk: u8,
    pub investment_potential: u8,
    pub overall: u16,
    pub rationale: String,
    #[serde(flatten)]
    pub market: MarketFields,
}

impl AnalysisRecord {
    /// Records without a rationale are never kept.
    pub fn is_complete(&self) -> bool {
        !self.symbol.is_empty() && !self.rationale.trim().is_empty() && (1..=10).contains(&self.risk)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketFields {
    #[serde(default)]
    pub price: f64,
    #[serde(default = "not_available")]
    pub volume: String,
    #[serde(default = "not_available")]
    pub market_cap: String,
    #[serde(default = "not_available")]
    pub liquidity: String,
    #[serde(default, rename = "change24h")]
    pub change_24h: f64,
    #[serde(default = "not_available")]
    pub age: String,
    #[serde(default = "no_link")]
    pub href: String,
}

impl Default for MarketFields {
    fn default() -> Self {
        Self {
            price: 0.0,
            volume: not_available(),
            market_cap: not_available(),
            liquidity: not_available(),
            change_24h: 0.0,
            age: not_available(),
            href: no_link(),
        }
    }
}

fn not_available() -> String {
    "N/A".to_string()
}

fn no_link() -> String {
    "#".to_string()
}

/// Summary of the highest-scoring record, written at the top of the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestToken {
    pub symbol: String,
    pub overall: u16,
    pub rationale: String,
}

impl From<&AnalysisRecord> for BestToken {
    fn from(record: &AnalysisRecord) -> Self {
        Self {
            symbol: record.symbol.clone(),
            overall: record.overall,
            rationale: record.rationale.clone(),
        }
    }
}
