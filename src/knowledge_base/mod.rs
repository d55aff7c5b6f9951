//! Question answering service.
//!
//! [`KnowledgeBase`] wires the cooldown gate, the retriever and the answer
//! assembler together. It is `Send + Sync` and meant to be shared behind an
//! `Arc` for the lifetime of the process so the cooldown applies across
//! questions.


use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::Result;
use crate::answer::{Answer, assemble_answer};
use crate::config::RetrievalConfig;
use crate::database::VectorIndex;
use crate::embeddings::Embedder;
use crate::llm::LanguageModel;
use crate::rate_limit::{Clock, CooldownGate};
use crate::retriever::Retriever;

pub struct KnowledgeBase {
    retriever: Retriever,
    model: Arc<dyn LanguageModel>,
    gate: CooldownGate,
    settings: RetrievalConfig,
}

impl KnowledgeBase {
    #[inline]
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        model: Arc<dyn LanguageModel>,
        settings: RetrievalConfig,
    ) -> Self {
        let gate = CooldownGate::new(Duration::from_secs(settings.cooldown_seconds));
        Self::with_gate(embedder, index, model, settings, gate)
    }

    /// Like [`KnowledgeBase::new`] but reading time from `clock`
    #[inline]
    pub fn with_clock(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        model: Arc<dyn LanguageModel>,
        settings: RetrievalConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let gate =
            CooldownGate::with_clock(Duration::from_secs(settings.cooldown_seconds), clock);
        Self::with_gate(embedder, index, model, settings, gate)
    }

    fn with_gate(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        model: Arc<dyn LanguageModel>,
        settings: RetrievalConfig,
        gate: CooldownGate,
    ) -> Self {
        Self {
            retriever: Retriever::new(embedder, index),
            model,
            gate,
            settings,
        }
    }

    #[inline]
    pub fn gate(&self) -> &CooldownGate {
        &self.gate
    }

    /// Answer one question from the indexed documents.
    ///
    /// The cooldown is checked before any retrieval work. Retrieval errors
    /// are returned; model errors are folded into [`Answer::Unavailable`].
    #[inline]
    pub async fn answer_question(&self, question: &str) -> Result<Answer> {
        let mut permit = match self.gate.try_acquire() {
            Ok(permit) => permit,
            Err(cooldown) => {
                info!(
                    "Question refused, cooldown has {} seconds left",
                    cooldown.wait_seconds()
                );
                return Ok(Answer::RateLimited {
                    retry_after: cooldown.remaining,
                });
            }
        };

        let results = self
            .retriever
            .retrieve(question, self.settings.top_k)
            .await?;

        if results.is_empty() {
            debug!("No chunks matched the question");
            return Ok(Answer::NotFound);
        }

        permit.record_call();
        let answer = assemble_answer(self.model.as_ref(), question, &results, &self.settings);
        drop(permit);

        Ok(answer)
    }
}
