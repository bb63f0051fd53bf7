pub mod error;
pub mod gemini;
pub mod traits;
pub mod util;

pub use error::{AiError, Result};
pub use gemini::{AccessToken, Gemini, GeminiAuth, GenerationConfig};
pub use traits::CompletionModel;
