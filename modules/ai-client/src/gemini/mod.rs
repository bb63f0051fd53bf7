mod client;
pub(crate) mod types;

pub use types::GenerationConfig;

use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::{AiError, Result};
use crate::traits::CompletionModel;
use client::GeminiClient;
use types::GenerateRequest;

const GENERATIVE_LANGUAGE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

// =============================================================================
// Auth
// =============================================================================

#[derive(Debug, Clone)]
pub enum GeminiAuth {
    /// Generative Language API key.
    ApiKey(String),
    /// Vertex AI with an OAuth access token.
    Vertex {
        project: String,
        location: String,
        access_token: AccessToken,
    },
}

/// Where the Vertex bearer token comes from.
#[derive(Debug, Clone)]
pub enum AccessToken {
    /// Fixed for the life of the process (e.g. `gcloud auth print-access-token`).
    Static(String),
    /// Re-read before every request, so an external refresher can rotate it.
    File(PathBuf),
}

impl AccessToken {
    fn current(&self) -> Result<String> {
        match self {
            AccessToken::Static(token) => Ok(token.clone()),
            AccessToken::File(path) => {
                let token = std::fs::read_to_string(path).map_err(|e| {
                    AiError::Config(format!("reading access token {}: {e}", path.display()))
                })?;
                let token = token.trim();
                if token.is_empty() {
                    return Err(AiError::Config(format!(
                        "access token file {} is empty",
                        path.display()
                    )));
                }
                Ok(token.to_string())
            }
        }
    }
}

impl From<&str> for AccessToken {
    fn from(token: &str) -> Self {
        AccessToken::Static(token.to_string())
    }
}

// =============================================================================
// Gemini
// =============================================================================

#[derive(Debug, Clone)]
pub struct Gemini {
    auth: GeminiAuth,
    model: String,
    generation: GenerationConfig,
    base_url: Option<String>,
}

impl Gemini {
    pub fn new(auth: GeminiAuth, model: impl Into<String>) -> Self {
        Self {
            auth,
            model: model.into(),
            generation: GenerationConfig::default(),
            base_url: None,
        }
    }

    /// Vertex AI when `GOOGLE_CLOUD_PROJECT` is set, otherwise `GEMINI_API_KEY`.
    ///
    /// Vertex prefers `GOOGLE_ACCESS_TOKEN_FILE`, re-read per request, over a
    /// fixed `GOOGLE_ACCESS_TOKEN`.
    pub fn from_env(model: impl Into<String>) -> Result<Self> {
        let auth = match std::env::var("GOOGLE_CLOUD_PROJECT") {
            Ok(project) if !project.is_empty() => GeminiAuth::Vertex {
                project,
                location: std::env::var("GOOGLE_CLOUD_LOCATION")
                    .unwrap_or_else(|_| "us-central1".to_string()),
                access_token: access_token_from_env()?,
            },
            _ => GeminiAuth::ApiKey(std::env::var("GEMINI_API_KEY").map_err(|_| {
                AiError::Config(
                    "set GOOGLE_CLOUD_PROJECT (Vertex AI) or GEMINI_API_KEY".into(),
                )
            })?),
        };
        Ok(Self::new(auth, model))
    }

    pub fn with_generation(mut self, generation: GenerationConfig) -> Self {
        self.generation = generation;
        self
    }

    /// Override the API root (everything before `/models/…` or `/projects/…`).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn endpoint(&self) -> String {
        match &self.auth {
            GeminiAuth::ApiKey(_) => {
                let root = self.base_url.as_deref().unwrap_or(GENERATIVE_LANGUAGE_URL);
                format!(
                    "{}/models/{}:generateContent",
                    root.trim_end_matches('/'),
                    self.model
                )
            }
            GeminiAuth::Vertex {
                project, location, ..
            } => {
                let root = self
                    .base_url
                    .clone()
                    .unwrap_or_else(|| format!("https://{location}-aiplatform.googleapis.com/v1"));
                format!(
                    "{}/projects/{project}/locations/{location}/publishers/google/models/{}:generateContent",
                    root.trim_end_matches('/'),
                    self.model
                )
            }
        }
    }

    fn client(&self) -> Result<GeminiClient> {
        let header = match &self.auth {
            GeminiAuth::ApiKey(key) => client::api_key(key),
            GeminiAuth::Vertex { access_token, .. } => client::bearer(&access_token.current()?),
        };
        GeminiClient::new(self.endpoint(), header)
    }

    /// Send one user prompt and return the first candidate's text.
    pub async fn generate(&self, prompt: &str) -> Result<String> {
        let request = GenerateRequest::user(prompt, self.generation);
        let response = self.client()?.generate(&request).await?;
        response.text().ok_or(AiError::EmptyResponse)
    }
}

fn access_token_from_env() -> Result<AccessToken> {
    match std::env::var("GOOGLE_ACCESS_TOKEN_FILE") {
        Ok(path) if !path.is_empty() => Ok(AccessToken::File(PathBuf::from(path))),
        _ => std::env::var("GOOGLE_ACCESS_TOKEN")
            .map(AccessToken::Static)
            .map_err(|_| {
                AiError::Config(
                    "set GOOGLE_ACCESS_TOKEN_FILE or GOOGLE_ACCESS_TOKEN for Vertex AI".into(),
                )
            }),
    }
}

#[async_trait]
impl CompletionModel for Gemini {
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.generate(prompt).await
    }

    fn name(&self) -> &str {
        &self.model
    }
}
