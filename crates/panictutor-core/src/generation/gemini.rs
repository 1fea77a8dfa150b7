//! Gemini `generateContent` client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use super::{GenerationRequest, ResponseShape, TextGenerator};
use crate::error::GenerationError;
use crate::storage::{ApiKeyStore, GenerationConfig};

pub struct GeminiGenerator {
    client: Client,
    endpoint: String,
    model: String,
    timeout: Duration,
    keys: ApiKeyStore,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    parts: Option<Vec<Part>>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

impl GeminiGenerator {
    /// Build a client for `config`, reading the API key from `keys` on every call.
    pub fn new(config: &GenerationConfig, keys: ApiKeyStore) -> Result<Self, GenerationError> {
        let timeout = config.timeout();
        let client = Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            timeout,
            keys,
        })
    }

    fn url(&self) -> String {
        format!("{}/models/{}:generateContent", self.endpoint, self.model)
    }

    fn api_key(&self) -> Result<String, GenerationError> {
        match self.keys.get() {
            Ok(Some(key)) => Ok(key),
            Ok(None) => Err(GenerationError::NotConfigured),
            Err(e) => {
                tracing::warn!(error = %e, "API key lookup failed");
                Err(GenerationError::NotConfigured)
            }
        }
    }

    /// Timeouts while connecting, sending or reading the body all count as
    /// [`GenerationError::Timeout`].
    fn transport_error(&self, e: reqwest::Error) -> GenerationError {
        if e.is_timeout() {
            GenerationError::Timeout {
                secs: self.timeout.as_secs(),
            }
        } else {
            GenerationError::Transport(e)
        }
    }

    fn body(request: &GenerationRequest) -> serde_json::Value {
        let mut body = json!({
            "contents": [{ "parts": [{ "text": request.prompt }] }]
        });
        if request.shape == ResponseShape::QuestionAnswer {
            body["generationConfig"] = json!({ "responseMimeType": "application/json" });
        }
        body
    }
}

#[async_trait]
impl TextGenerator for GeminiGenerator {
    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationError> {
        let key = self.api_key()?;
        tracing::debug!(model = %self.model, shape = ?request.shape, "calling text generator");

        let resp = self
            .client
            .post(self.url())
            .header("x-goog-api-key", key)
            .json(&Self::body(&request))
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = resp.status();
        let text = resp.text().await.map_err(|e| self.transport_error(e))?;
        if !status.is_success() {
            return Err(GenerationError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        let parsed: GeminiResponse =
            serde_json::from_str(&text).map_err(|e| GenerationError::Malformed(e.to_string()))?;

        let message = parsed
            .candidates
            .into_iter()
            .flatten()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| c.parts)
            .into_iter()
            .flatten()
            .next()
            .and_then(|p| p.text)
            .map(|t| t.trim().to_string())
            .unwrap_or_default();

        if message.is_empty() {
            return Err(GenerationError::Empty);
        }
        Ok(message)
    }
}

impl std::fmt::Debug for GeminiGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiGenerator")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
