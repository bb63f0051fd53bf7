use std::collections::HashSet;
use std::io::Write;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::TokenhoundError;
use crate::types::{AnalysisRecord, BestToken, Snapshot};

type Result<T> = std::result::Result<T, TokenhoundError>;

// ---------------------------------------------------------------------------
// File helpers
// ---------------------------------------------------------------------------

/// Serialize `value` as pretty JSON and move it over `path` in one rename,
/// so readers never observe a half-written file.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(|e| TokenhoundError::io(dir, e))?;

    let json = serde_json::to_vec_pretty(value).map_err(|e| TokenhoundError::json(path, e))?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| TokenhoundError::io(dir, e))?;
    tmp.write_all(&json).map_err(|e| TokenhoundError::io(tmp.path(), e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| TokenhoundError::io(tmp.path(), e))?;
    tmp.persist(path)
        .map_err(|e| TokenhoundError::io(path, e.error))?;

    debug!(path = %path.display(), bytes = json.len(), "Wrote JSON file");
    Ok(())
}

/// Read and decode a JSON file. `Ok(None)` when the file does not exist.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(TokenhoundError::io(path, e)),
    };
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|e| TokenhoundError::json(path, e))
}

impl Snapshot {
    pub fn load(path: &Path) -> Result<Option<Self>> {
        read_json(path)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        write_json_atomic(path, self)
    }
}

// ---------------------------------------------------------------------------
// ResultStore
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct StoreFileOut<'a> {
    best_token: BestToken,
    results: &'a [AnalysisRecord],
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StoreFileIn {
    Wrapped {
        #[serde(default)]
        results: Vec<Value>,
    },
    Legacy(Vec<Value>),
}

/// Outcome of [`ResultStore::upsert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Inserted,
    Replaced,
}

/// Ordered analysis records, keyed by symbol, persisted as one JSON file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultStore {
    records: Vec<AnalysisRecord>,
}

impl ResultStore {
    pub fn new(records: Vec<AnalysisRecord>) -> Self {
        Self { records }
    }

    /// Load the store file. A missing file is an empty store; a top-level
    /// array is accepted as the legacy shape. Only an unreadable file is an
    /// error: individual records that do not decode are dropped.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = match read_json::<StoreFileIn>(path)? {
            None => return Ok(Self::default()),
            Some(StoreFileIn::Wrapped { results }) => results,
            Some(StoreFileIn::Legacy(results)) => results,
        };

        let total = raw.len();
        let records: Vec<AnalysisRecord> = raw
            .into_iter()
            .enumerate()
            .filter_map(|(index, value)| match serde_json::from_value(value) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(path = %path.display(), index, error = %e, "Dropping undecodable stored record");
                    None
                }
            })
            .collect();
        if records.len() < total {
            warn!(kept = records.len(), total, "Result store loaded with records dropped");
        }
        Ok(Self::new(records))
    }

    /// Rewrite the whole file with the recomputed best record.
    /// Returns `false` without touching disk when the store is empty.
    pub fn save(&self, path: &Path) -> Result<bool> {
        let Some(best) = self.best() else {
            return Ok(false);
        };
        write_json_atomic(
            path,
            &StoreFileOut {
                best_token: best,
                results: &self.records,
            },
        )?;
        Ok(true)
    }

    /// Replace the record with the same symbol, or append.
    pub fn upsert(&mut self, record: AnalysisRecord) -> Upsert {
        match self.records.iter_mut().find(|r| r.symbol == record.symbol) {
            Some(existing) => {
                *existing = record;
                Upsert::Replaced
            }
            None => {
                self.records.push(record);
                Upsert::Inserted
            }
        }
    }

    /// Highest `overall`; ties go to the earliest record.
    pub fn best(&self) -> Option<BestToken> {
        let mut best: Option<&AnalysisRecord> = None;
        for record in &self.records {
            if best.map_or(true, |b| record.overall > b.overall) {
                best = Some(record);
            }
        }
        best.map(BestToken::from)
    }

    pub fn symbols(&self) -> HashSet<String> {
        self.records.iter().map(|r| r.symbol.clone()).collect()
    }

    pub fn get(&self, symbol: &str) -> Option<&AnalysisRecord> {
        self.records.iter().find(|r| r.symbol == symbol)
    }

    pub fn records(&self) -> &[AnalysisRecord] {
        &self.records
    }

    pub fn records_mut(&mut self) -> &mut [AnalysisRecord] {
        &mut self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
