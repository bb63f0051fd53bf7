// Test doubles for the enrichment pipeline.
//
// - ScriptedModel (CompletionModel) answers from a queue and records prompts
// - memecoin_reply / not_memecoin_reply build answers in the expected shape
// - market_row builds a listing row for snapshot fixtures

use std::collections::VecDeque;
use std::sync::Mutex;

use ai_client::{AiError, CompletionModel};
use async_trait::async_trait;

use tokenhound_common::ListingRow;

enum Scripted {
    Text(String),
    RateLimited,
    Unauthorized,
    Unavailable,
}

/// Replays queued answers in order. An empty queue answers `EmptyResponse`.
#[derive(Default)]
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Scripted>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, text: impl Into<String>) -> Self {
        self.push(Scripted::Text(text.into()))
    }

    /// Queue a 429 from the provider.
    pub fn rate_limited(self) -> Self {
        self.push(Scripted::RateLimited)
    }

    /// Queue a 401 from the provider.
    pub fn unauthorized(self) -> Self {
        self.push(Scripted::Unauthorized)
    }

    /// Queue a transport failure.
    pub fn unavailable(self) -> Self {
        self.push(Scripted::Unavailable)
    }

    fn push(self, reply: Scripted) -> Self {
        self.replies.lock().unwrap().push_back(reply);
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionModel for ScriptedModel {
    async fn complete(&self, prompt: &str) -> ai_client::Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        match self.replies.lock().unwrap().pop_front() {
            Some(Scripted::Text(text)) => Ok(text),
            Some(Scripted::RateLimited) => Err(AiError::RateLimited("quota exceeded".into())),
            Some(Scripted::Unauthorized) => Err(AiError::Unauthorized {
                status: 401,
                message: "ACCESS_TOKEN_EXPIRED".into(),
            }),
            Some(Scripted::Unavailable) => Err(AiError::Network("connection reset".into())),
            None => Err(AiError::EmptyResponse),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

pub fn memecoin_reply(symbol: &str, risk: u8, potential: u8, overall: u16) -> String {
    format!(
        "```json\n{{\"symbol\": \"{symbol}\", \"is_memecoin\": true, \"risk\": {risk}, \"potential\": {potential}, \"overall\": {overall}, \"rationale\": \"{symbol} rides a meme\"}}\n```"
    )
}

pub fn not_memecoin_reply(symbol: &str) -> String {
    format!(
        "{{\"symbol\": \"{symbol}\", \"is_memecoin\": false, \"risk\": 2, \"potential\": 6, \"overall\": 70, \"rationale\": \"infrastructure token\"}}"
    )
}

pub fn market_row(symbol: &str, volume: &str) -> ListingRow {
    ListingRow {
        name: format!("{symbol} Token"),
        symbol: symbol.to_string(),
        symbol1: "APT".to_string(),
        price: "$0.0042".to_string(),
        volume: volume.to_string(),
        liquidity: "$80K".to_string(),
        mcap: "$1.2M".to_string(),
        transactions: "1,024".to_string(),
        age: "3h".to_string(),
        change_5m: "1.2%".to_string(),
        change_1h: "-4.5%".to_string(),
        change_6h: "12%".to_string(),
        change_24h: "-7.5%".to_string(),
        href: Some(format!("https://dexscreener.com/aptos/{}", symbol.to_lowercase())),
    }
}
