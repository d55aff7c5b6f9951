//! Language model collaborators
//!
//! A [`LanguageModel`] turns a fully formatted prompt into answer text.
//! Calls are made exactly once; there is no retry at this layer.

pub mod gemini;
pub mod ollama;


use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use crate::config::{Config, LlmProvider};

pub use gemini::GeminiClient;
pub use ollama::OllamaGenerator;

/// Longest error body kept in [`ModelError::Http`]
const MAX_ERROR_BODY_CHARS: usize = 500;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("API key missing: environment variable {0} is not set")]
    MissingApiKey(String),

    #[error("Model endpoint returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid model response: {0}")]
    InvalidResponse(String),

    #[error("Model returned an empty response")]
    EmptyResponse,
}

/// A hosted text generation model
pub trait LanguageModel: Send + Sync {
    fn model_name(&self) -> &str;

    /// Send one prompt and return the generated text
    fn invoke(&self, prompt: &str) -> Result<String, ModelError>;
}

/// Build the language model selected by `[llm]`
#[inline]
pub fn build_language_model(config: &Config) -> anyhow::Result<Arc<dyn LanguageModel>> {
    let model: Arc<dyn LanguageModel> = match config.llm.provider {
        LlmProvider::Gemini => Arc::new(GeminiClient::new(&config.llm)?),
        LlmProvider::Ollama => Arc::new(OllamaGenerator::new(&config.ollama, &config.llm)?),
    };
    Ok(model)
}

pub(crate) fn build_agent(timeout: Duration) -> ureq::Agent {
    ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .http_status_as_error(false)
        .build()
        .into()
}

/// POST a JSON body once and return the response text of a 2xx reply
pub(crate) fn post_json(
    agent: &ureq::Agent,
    url: &str,
    headers: &[(&str, &str)],
    body: &str,
) -> Result<String, ModelError> {
    debug!("POST {} ({} bytes)", url, body.len());

    let mut request = agent.post(url).header("Content-Type", "application/json");
    for (name, value) in headers {
        request = request.header(*name, *value);
    }

    let mut response = request
        .send(body)
        .map_err(|e| ModelError::Transport(e.to_string()))?;

    let status = response.status();
    let text = response
        .body_mut()
        .read_to_string()
        .map_err(|e| ModelError::Transport(e.to_string()))?;

    if !status.is_success() {
        return Err(ModelError::Http {
            status: status.as_u16(),
            body: text.chars().take(MAX_ERROR_BODY_CHARS).collect(),
        });
    }

    Ok(text)
}
