use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use super::{LanguageModel, ModelError, build_agent, post_json};
use crate::config::{LlmConfig, OllamaConfig};

/// Text generation through a local Ollama server
#[derive(Debug, Clone)]
pub struct OllamaGenerator {
    generate_url: Url,
    model: String,
    temperature: f32,
    agent: ureq::Agent,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

impl OllamaGenerator {
    #[inline]
    pub fn new(ollama: &OllamaConfig, llm: &LlmConfig) -> Result<Self> {
        let generate_url = ollama
            .ollama_url()
            .context("Failed to generate Ollama URL from config")?
            .join("/api/generate")
            .context("Failed to build generate URL")?;

        Ok(Self {
            generate_url,
            model: llm.model.clone(),
            temperature: llm.temperature,
            agent: build_agent(Duration::from_secs(llm.timeout_seconds)),
        })
    }
}

impl LanguageModel for OllamaGenerator {
    #[inline]
    fn model_name(&self) -> &str {
        &self.model
    }

    #[inline]
    fn invoke(&self, prompt: &str) -> Result<String, ModelError> {
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: GenerateOptions {
                temperature: self.temperature,
            },
        };
        let body = serde_json::to_string(&request)
            .map_err(|e| ModelError::InvalidResponse(format!("request encoding: {e}")))?;

        let response_text = post_json(&self.agent, self.generate_url.as_str(), &[], &body)?;

        let response: GenerateResponse = serde_json::from_str(&response_text)
            .map_err(|e| ModelError::InvalidResponse(e.to_string()))?;

        if response.response.trim().is_empty() {
            return Err(ModelError::EmptyResponse);
        }

        debug!("Ollama returned {} characters", response.response.len());
        Ok(response.response)
    }
}
