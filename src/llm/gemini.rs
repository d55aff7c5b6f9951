use std::env;
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{LanguageModel, ModelError, build_agent, post_json};
use crate::config::LlmConfig;

/// Client for the Gemini `generateContent` REST endpoint
#[derive(Debug, Clone)]
pub struct GeminiClient {
    endpoint: String,
    model: String,
    api_key_env: String,
    api_key: Option<String>,
    temperature: f32,
    agent: ureq::Agent,
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest<'a> {
    contents: [Content<'a>; 1],
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: [Part<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

impl GeminiClient {
    /// Create a client; the API key is read from `config.api_key_env`.
    ///
    /// A missing key is not an error here. Every call then fails with
    /// [`ModelError::MissingApiKey`], which the answer pipeline reports as
    /// a degraded-service message.
    #[inline]
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty());

        if api_key.is_none() {
            info!(
                "{} is not set; Gemini calls will fail until it is provided",
                config.api_key_env
            );
        }

        Ok(Self {
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key_env: config.api_key_env.clone(),
            api_key,
            temperature: config.temperature,
            agent: build_agent(Duration::from_secs(config.timeout_seconds)),
        })
    }

    #[inline]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    fn request_url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.endpoint, self.model
        )
    }
}

impl LanguageModel for GeminiClient {
    #[inline]
    fn model_name(&self) -> &str {
        &self.model
    }

    #[inline]
    fn invoke(&self, prompt: &str) -> Result<String, ModelError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ModelError::MissingApiKey(self.api_key_env.clone()))?;

        let request = GenerateContentRequest {
            contents: [Content {
                role: "user",
                parts: [Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: self.temperature,
            },
        };
        let body = serde_json::to_string(&request)
            .map_err(|e| ModelError::InvalidResponse(format!("request encoding: {e}")))?;

        let response_text = post_json(
            &self.agent,
            &self.request_url(),
            &[("x-goog-api-key", api_key)],
            &body,
        )?;

        let response: GenerateContentResponse = serde_json::from_str(&response_text)
            .map_err(|e| ModelError::InvalidResponse(e.to_string()))?;

        let text: String = response
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect()
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(ModelError::EmptyResponse);
        }

        debug!("Gemini returned {} characters", text.len());
        Ok(text)
    }
}
