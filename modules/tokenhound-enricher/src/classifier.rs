use std::sync::Arc;

use ai_client::util::{first_json_object, strip_code_blocks, strip_control_chars, truncate_to_char_boundary};
use ai_client::CompletionModel;
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use tokenhound_common::{AnalysisRecord, ListingRow, SocialPost};

use crate::market::market_fields;

// ---------------------------------------------------------------------------
// Response parsing
// ---------------------------------------------------------------------------

/// Why a model response was discarded.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClassifyFailure {
    #[error("response is not valid JSON: {0}")]
    Malformed(String),

    #[error("response JSON is not an object")]
    NotAnObject,

    #[error("missing or non-numeric field {0}")]
    MissingScore(&'static str),

    #[error("{field} = {value} is outside {min}..={max}")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: u16,
        max: u16,
    },

    #[error("empty rationale")]
    EmptyRationale,
}

/// Validated scores from one model answer.
#[derive(Debug, Clone, PartialEq)]
pub struct Scores {
    pub risk: u8,
    pub potential: u8,
    pub overall: u16,
    pub rationale: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Memecoin(Scores),
    NotMemecoin,
}

/// Pull the verdict out of free-form model text.
///
/// Code fences and control characters are removed, then the first
/// `{...}` span is parsed (or the whole text when there is none).
pub fn parse_verdict(raw: &str) -> Result<Verdict, ClassifyFailure> {
    let cleaned = strip_control_chars(&strip_code_blocks(raw));
    let candidate = first_json_object(&cleaned).unwrap_or(&cleaned);

    let value: Value =
        serde_json::from_str(candidate).map_err(|e| ClassifyFailure::Malformed(e.to_string()))?;
    let object = value.as_object().ok_or(ClassifyFailure::NotAnObject)?;

    if object.get("is_memecoin").and_then(Value::as_bool) != Some(true) {
        return Ok(Verdict::NotMemecoin);
    }

    let risk = score(object.get("risk"), "risk", 1, 10)?;
    let potential = score(object.get("potential"), "potential", 1, 10)?;
    let overall = score(object.get("overall"), "overall", 1, 100)?;
    let rationale = object
        .get("rationale")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .ok_or(ClassifyFailure::EmptyRationale)?
        .to_string();

    Ok(Verdict::Memecoin(Scores {
        risk: risk as u8,
        potential: potential as u8,
        overall,
        rationale,
    }))
}

fn score(
    value: Option<&Value>,
    field: &'static str,
    min: u16,
    max: u16,
) -> Result<u16, ClassifyFailure> {
    let number = value
        .and_then(Value::as_f64)
        .ok_or(ClassifyFailure::MissingScore(field))?;
    let rounded = number.round();
    if !(f64::from(min)..=f64::from(max)).contains(&rounded) {
        return Err(ClassifyFailure::OutOfRange {
            field,
            value: number,
            min,
            max,
        });
    }
    Ok(rounded as u16)
}

// ---------------------------------------------------------------------------
// Classifier
// ---------------------------------------------------------------------------

/// A provider answer that no later call in the same pass can get past.
/// Stop the current pass.
#[derive(Debug, Error)]
pub enum Halt {
    #[error("inference quota exhausted: {0}")]
    QuotaExhausted(String),
    #[error("inference credentials rejected: {0}")]
    CredentialsRejected(String),
}

pub struct Classifier {
    model: Arc<dyn CompletionModel>,
    max_posts: usize,
}

impl Classifier {
    pub fn new(model: Arc<dyn CompletionModel>, max_posts: usize) -> Self {
        Self { model, max_posts }
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    pub fn build_prompt(&self, symbol: &str, posts: &[SocialPost], market: Option<&ListingRow>) -> String {
        let market_line = market
            .and_then(|row| serde_json::to_string(row).ok())
            .map(|json| format!("Token info: {json}\n"))
            .unwrap_or_default();
        let posts_text = posts
            .iter()
            .take(self.max_posts)
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join(" | ");

        format!(
            "Determine if the following token is a memecoin. Use the recent tweets below if available. \
             If there is not enough tweet data, use the token's market data and name to make your determination. \
             If it is a memecoin, analyze it for risk (1-10, 10=highest risk), investment potential \
             (1-10, 10=best potential), and an overall score (1-100, 100=best overall). \
             Token symbol: {symbol}\n\
             {market_line}\
             Recent tweets: {posts_text}\n\
             Respond ONLY with a single JSON object, no extra text, no code blocks, no explanations. \
             The JSON object MUST have these exact keys: symbol, is_memecoin (boolean), risk, potential, overall, rationale. \
             Example: {{ \"symbol\": \"{symbol}\", \"is_memecoin\": true, \"risk\": 5, \"potential\": 7, \"overall\": 65, \"rationale\": \"...\" }}"
        )
    }

    /// Score one symbol. `Ok(None)` covers non-memecoins, transport errors
    /// and unusable answers. Quota exhaustion and rejected credentials are
    /// the only `Err`s.
    pub async fn classify(
        &self,
        symbol: &str,
        posts: &[SocialPost],
        market: Option<&ListingRow>,
    ) -> Result<Option<AnalysisRecord>, Halt> {
        let prompt = self.build_prompt(symbol, posts, market);

        let text = match self.model.complete(&prompt).await {
            Ok(text) => text,
            Err(e) if e.is_rate_limited() => return Err(Halt::QuotaExhausted(e.to_string())),
            Err(e) if e.is_auth_failure() => return Err(Halt::CredentialsRejected(e.to_string())),
            Err(e) => {
                warn!(symbol, model = self.model.name(), error = %e, "Inference call failed");
                return Ok(None);
            }
        };

        match parse_verdict(&text) {
            Ok(Verdict::Memecoin(scores)) => Ok(Some(AnalysisRecord {
                symbol: symbol.to_string(),
                risk: scores.risk,
                investment_potential: scores.potential,
                overall: scores.overall,
                rationale: scores.rationale,
                market: market_fields(market),
            })),
            Ok(Verdict::NotMemecoin) => {
                info!(symbol, "Not a memecoin, skipping");
                Ok(None)
            }
            Err(reason) => {
                warn!(
                    symbol,
                    %reason,
                    response = truncate_to_char_boundary(&text, 300),
                    "Discarding unusable model response"
                );
                Ok(None)
            }
        }
    }
}
