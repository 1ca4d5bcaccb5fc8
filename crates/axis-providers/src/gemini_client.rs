use std::time::Duration;

use serde::Deserialize;
use serde_json::{json, Value};

use crate::provider_error::ProviderError;

pub const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";
const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 1024;

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_base: String,
    pub api_key: String,
    pub model: String,
    pub request_timeout_ms: u64,
    pub max_output_tokens: u32,
    pub temperature: Option<f32>,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_base: DEFAULT_GEMINI_API_BASE.to_string(),
            api_key: api_key.into(),
            model: DEFAULT_GEMINI_MODEL.to_string(),
            request_timeout_ms: 30_000,
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
            temperature: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeminiRole {
    User,
    Model,
}

impl GeminiRole {
    fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Model => "model",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeminiTurn {
    pub role: GeminiRole,
    pub text: String,
}

impl GeminiTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: GeminiRole::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: GeminiRole::Model,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone)]
/// Minimal `generateContent` client: one system instruction, alternating
/// user/model turns, text out.
pub struct GeminiClient {
    client: reqwest::Client,
    config: GeminiConfig,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Result<Self, ProviderError> {
        if config.api_key.trim().is_empty() {
            return Err(ProviderError::MissingApiKey);
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms.max(1)))
            .build()?;
        Ok(Self { client, config })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn generate_content_url(&self) -> String {
        let base = self.config.api_base.trim_end_matches('/');
        if base.contains(":generateContent") {
            return base.replace("{model}", &self.config.model);
        }
        format!("{base}/models/{}:generateContent", self.config.model)
    }

    pub async fn generate(
        &self,
        system: &str,
        turns: &[GeminiTurn],
    ) -> Result<String, ProviderError> {
        let body = build_generate_content_body(system, turns, &self.config);
        let response = self
            .client
            .post(self.generate_content_url())
            .query(&[("key", self.config.api_key.as_str())])
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        let raw = response.text().await?;
        if !status.is_success() {
            return Err(ProviderError::HttpStatus {
                status: status.as_u16(),
                body: raw,
            });
        }
        parse_generate_content_text(&raw)
    }
}

fn build_generate_content_body(system: &str, turns: &[GeminiTurn], config: &GeminiConfig) -> Value {
    let contents = turns
        .iter()
        .filter(|turn| !turn.text.trim().is_empty())
        .map(|turn| {
            json!({
                "role": turn.role.as_str(),
                "parts": [{ "text": turn.text }],
            })
        })
        .collect::<Vec<_>>();
    let mut body = json!({ "contents": contents });
    if !system.trim().is_empty() {
        body["systemInstruction"] = json!({ "parts": [{ "text": system }] });
    }
    let mut generation_config = json!({ "maxOutputTokens": config.max_output_tokens });
    if let Some(temperature) = config.temperature {
        generation_config["temperature"] = json!(temperature);
    }
    body["generationConfig"] = generation_config;
    body
}

fn parse_generate_content_text(raw: &str) -> Result<String, ProviderError> {
    let parsed: GenerateContentResponse = serde_json::from_str(raw)?;
    let candidate = parsed
        .candidates
        .and_then(|mut candidates| candidates.drain(..).next())
        .ok_or_else(|| {
            ProviderError::InvalidResponse("response contained no candidates".to_string())
        })?;
    let text = candidate
        .content
        .and_then(|content| content.parts)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|part| part.text)
        .collect::<Vec<_>>()
        .join("");
    if text.trim().is_empty() {
        return Err(ProviderError::InvalidResponse(
            "response contained no text".to_string(),
        ));
    }
    Ok(text)
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<GenerateContentCandidate>>,
}

#[derive(Debug, Deserialize)]
struct GenerateContentCandidate {
    content: Option<GenerateContentContent>,
}

#[derive(Debug, Deserialize)]
struct GenerateContentContent {
    parts: Option<Vec<GenerateContentPart>>,
}

#[derive(Debug, Deserialize)]
struct GenerateContentPart {
    text: Option<String>,
}
