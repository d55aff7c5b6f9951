//! Turning retrieval results into an answer.
//!
//! The assembler picks the best chunks, builds a bounded context, asks the
//! language model once and attaches ranked citations. Model failures never
//! escape this module; they become [`Answer::Unavailable`].

pub mod prompt;

#[cfg(test)]
mod tests;

use std::time::Duration;

use tracing::{debug, warn};

use crate::config::RetrievalConfig;
use crate::database::RetrievalResult;
use crate::llm::LanguageModel;
use crate::rate_limit::CooldownActive;

pub use prompt::format_prompt;

pub const NOT_FOUND_MESSAGE: &str =
    "I could not find this information in the available documents.";

pub const SERVICE_UNAVAILABLE_MESSAGE: &str = "The AI service is currently rate-limited. \
     This system uses controlled API usage with throttling and caching. \
     Please try again later.";

/// Outcome of one question
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    /// Model reply with ranked citations
    Answered { text: String, sources: Vec<String> },
    /// Retrieval found nothing; the model was not called
    NotFound,
    /// The cooldown window has not elapsed
    RateLimited { retry_after: Duration },
    /// The model call failed
    Unavailable { reason: String },
}

impl Answer {
    /// Text shown to the user
    #[inline]
    pub fn message(&self) -> String {
        match self {
            Self::Answered { text, .. } => text.clone(),
            Self::NotFound => NOT_FOUND_MESSAGE.to_string(),
            Self::RateLimited { retry_after } => format!(
                "Please wait {} seconds before asking another question.",
                CooldownActive {
                    remaining: *retry_after
                }
                .wait_seconds()
            ),
            Self::Unavailable { .. } => SERVICE_UNAVAILABLE_MESSAGE.to_string(),
        }
    }

    /// Citations; empty unless the question was answered
    #[inline]
    pub fn sources(&self) -> &[String] {
        match self {
            Self::Answered { sources, .. } => sources,
            _ => &[],
        }
    }

    #[inline]
    pub fn into_parts(self) -> (String, Vec<String>) {
        match self {
            Self::Answered { text, sources } => (text, sources),
            other => (other.message(), Vec::new()),
        }
    }
}

/// Concatenate the first `max_results` chunks, one per line, capped at
/// `max_chars` characters
#[inline]
pub fn build_context(results: &[RetrievalResult], max_results: usize, max_chars: usize) -> String {
    let context: String = results
        .iter()
        .take(max_results)
        .flat_map(|result| [result.chunk.content.as_str(), "\n"])
        .collect();

    match context.char_indices().nth(max_chars) {
        Some((cut, _)) => context[..cut].to_string(),
        None => context,
    }
}

/// Citation line for the result at 1-based `rank`
#[inline]
pub fn format_citation(rank: usize, result: &RetrievalResult) -> String {
    format!(
        "#{} {} (line {}) — relevance: {:.4}",
        rank, result.chunk.source, result.chunk.line_number, result.score
    )
}

/// Build an answer from retrieval results.
///
/// Calls `model` exactly once when there is at least one result.
#[inline]
pub fn assemble_answer(
    model: &dyn LanguageModel,
    question: &str,
    results: &[RetrievalResult],
    settings: &RetrievalConfig,
) -> Answer {
    if results.is_empty() {
        return Answer::NotFound;
    }

    let selected = &results[..results.len().min(settings.context_results)];
    let sources: Vec<String> = selected
        .iter()
        .enumerate()
        .map(|(i, result)| format_citation(i + 1, result))
        .collect();
    let context = build_context(selected, selected.len(), settings.max_context_chars);
    let prompt = format_prompt(&context, question);

    debug!(
        "Invoking {} with {} context chunks ({} chars)",
        model.model_name(),
        selected.len(),
        context.chars().count()
    );

    match model.invoke(&prompt) {
        Ok(text) => Answer::Answered { text, sources },
        Err(e) => {
            warn!("Language model call failed: {}", e);
            Answer::Unavailable {
                reason: e.to_string(),
            }
        }
    }
}
