//! Google Gemini `generateContent` client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

use crate::domain::errors::ModelError;
use crate::domain::ports::{LanguageModel, ModelRequest};

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    /// Model name, e.g. "gemini-2.0-flash".
    pub model: String,
    /// Base endpoint URL without the `/models/...` suffix.
    pub endpoint: String,
    pub timeout_secs: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "gemini-2.0-flash".to_string(),
            endpoint: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            timeout_secs: 30,
        }
    }
}

pub struct GeminiClient {
    client: reqwest::Client,
    config: GeminiConfig,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Result<Self, ModelError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ModelError::Http(e.to_string()))?;
        Ok(Self { client, config })
    }

    fn build_url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.endpoint.trim_end_matches('/'),
            self.config.model
        )
    }
}

// Gemini API request/response structures

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(rename = "systemInstruction", skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiSystemInstruction>,
    #[serde(rename = "generationConfig")]
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    role: String,
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
struct GeminiSystemInstruction {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Debug, Serialize)]
struct GeminiGenerationConfig {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
    error: Option<GeminiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContentResponse>,
}

#[derive(Debug, Deserialize)]
struct GeminiContentResponse {
    #[serde(default)]
    parts: Vec<GeminiPartResponse>,
}

#[derive(Debug, Deserialize)]
struct GeminiPartResponse {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    message: String,
}

fn build_request(request: ModelRequest) -> GeminiRequest {
    GeminiRequest {
        contents: vec![GeminiContent {
            role: "user".to_string(),
            parts: vec![GeminiPart { text: request.user }],
        }],
        system_instruction: if request.system.is_empty() {
            None
        } else {
            Some(GeminiSystemInstruction {
                parts: vec![GeminiPart {
                    text: request.system,
                }],
            })
        },
        generation_config: GeminiGenerationConfig {
            temperature: request.temperature,
        },
    }
}

/// Concatenates every text part of the first candidate.
fn response_text(body: &str) -> Result<String, ModelError> {
    let parsed: GeminiResponse =
        serde_json::from_str(body).map_err(|e| ModelError::Response(e.to_string()))?;

    if let Some(error) = parsed.error {
        return Err(ModelError::Response(format!(
            "Gemini API error: {}",
            error.message
        )));
    }

    let content = parsed
        .candidates
        .and_then(|c| c.into_iter().next())
        .and_then(|c| c.content)
        .ok_or_else(|| ModelError::Response("No content in response".to_string()))?;

    Ok(content
        .parts
        .into_iter()
        .map(|p| p.text)
        .collect::<Vec<_>>()
        .concat())
}

#[async_trait]
impl LanguageModel for GeminiClient {
    async fn generate(&self, request: ModelRequest) -> Result<String, ModelError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            "x-goog-api-key",
            HeaderValue::from_str(&self.config.api_key)
                .map_err(|e| ModelError::Http(e.to_string()))?,
        );

        let response = self
            .client
            .post(self.build_url())
            .headers(headers)
            .json(&build_request(request))
            .send()
            .await
            .map_err(|e| ModelError::Http(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ModelError::Response(format!("HTTP {}: {}", status, text)));
        }

        let text = response
            .text()
            .await
            .map_err(|e| ModelError::Http(e.to_string()))?;
        response_text(&text)
    }
}
