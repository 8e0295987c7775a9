use crate::config::Config;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure modes of a single call to the generative-text endpoint.
///
/// None of these reach the callers of the translation or summary services;
/// they only decide which fallback is used and how it is logged.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("no provider credential configured")]
    ConfigurationAbsent,

    #[error("provider unreachable: {0}")]
    Connectivity(#[source] reqwest::Error),

    #[error("provider call timed out")]
    Timeout,

    #[error("malformed provider response: {0}")]
    MalformedResponse(String),

    #[error("provider error ({status}): {body}")]
    Provider { status: StatusCode, body: String },
}

impl ProviderError {
    /// Connectivity failures and timeouts are the expected causes of
    /// continuity mode; everything else points at the provider itself.
    pub fn is_network(&self) -> bool {
        matches!(self, ProviderError::Connectivity(_) | ProviderError::Timeout)
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    parts: Option<Vec<ResponsePart>>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

impl GenerateResponse {
    /// Walk `candidates[0].content.parts[0].text`, naming the first missing level.
    /// A blank text counts as missing.
    fn into_text(self) -> Result<String, ProviderError> {
        let candidate = self
            .candidates
            .and_then(|c| c.into_iter().next())
            .ok_or_else(|| ProviderError::MalformedResponse("missing candidates[0]".into()))?;
        let content = candidate
            .content
            .ok_or_else(|| ProviderError::MalformedResponse("missing candidates[0].content".into()))?;
        let part = content.parts.and_then(|p| p.into_iter().next()).ok_or_else(|| {
            ProviderError::MalformedResponse("missing candidates[0].content.parts[0]".into())
        })?;
        let text = part.text.ok_or_else(|| {
            ProviderError::MalformedResponse("missing candidates[0].content.parts[0].text".into())
        })?;
        if text.trim().is_empty() {
            return Err(ProviderError::MalformedResponse(
                "empty candidates[0].content.parts[0].text".into(),
            ));
        }
        Ok(text)
    }
}

/// Client for the Gemini `generateContent` endpoint.
///
/// One request per call, no retries. The request timeout comes from the
/// config and is baked into the underlying `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
}

impl GeminiClient {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            client,
            api_url: config.gemini_api_url.clone(),
            api_key: config.gemini_api_key.clone(),
        })
    }

    pub fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }

    /// Send `prompt` and return the first candidate's text.
    pub async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(ProviderError::ConfigurationAbsent)?;

        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
        };

        let response = self
            .client
            .post(&self.api_url)
            .query(&[("key", api_key)])
            .json(&request)
            .send()
            .await
            .map_err(classify_transport_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|e| format!("<failed to read body: {}>", e));
            return Err(ProviderError::Provider { status, body });
        }

        let body = response.text().await.map_err(classify_transport_error)?;
        let parsed: GenerateResponse = serde_json::from_str(&body)
            .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;

        parsed.into_text()
    }
}

fn classify_transport_error(error: reqwest::Error) -> ProviderError {
    if error.is_timeout() {
        ProviderError::Timeout
    } else if error.is_connect() || error.is_request() {
        ProviderError::Connectivity(error)
    } else {
        ProviderError::Provider {
            status: error.status().unwrap_or(StatusCode::BAD_GATEWAY),
            body: error.to_string(),
        }
    }
}
