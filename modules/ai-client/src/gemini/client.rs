use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::StatusCode;
use tracing::debug;

use super::types::*;
use crate::error::{AiError, Result};

pub(crate) struct GeminiClient {
    http: reqwest::Client,
    endpoint: String,
    headers: HeaderMap,
}

impl GeminiClient {
    pub fn new(endpoint: String, auth_header: (&'static str, String)) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let (name, value) = auth_header;
        headers.insert(
            name,
            HeaderValue::from_str(&value).map_err(|e| AiError::Config(e.to_string()))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        Ok(Self {
            http: reqwest::Client::new(),
            endpoint,
            headers,
        })
    }

    pub async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse> {
        debug!(endpoint = %self.endpoint, "Gemini generateContent request");

        let response = self
            .http
            .post(&self.endpoint)
            .headers(self.headers.clone())
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let message = response.text().await.unwrap_or_default();
            return Err(AiError::RateLimited(message));
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let message = response.text().await.unwrap_or_default();
            return Err(AiError::Unauthorized {
                status: status.as_u16(),
                message,
            });
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(AiError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json().await?)
    }
}

pub(crate) fn bearer(token: &str) -> (&'static str, String) {
    ("authorization", format!("Bearer {token}"))
}

pub(crate) fn api_key(key: &str) -> (&'static str, String) {
    ("x-goog-api-key", key.to_string())
}
