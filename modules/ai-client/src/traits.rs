use async_trait::async_trait;

use crate::error::Result;

// =============================================================================
// CompletionModel Trait
// =============================================================================

/// Single-turn prompt in, raw model text out.
#[async_trait]
pub trait CompletionModel: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;

    fn name(&self) -> &str;
}
