//! Test doubles shared by the integration tests.
//!
//! Every test binary compiles this module, but none of them uses all of it.
#![allow(dead_code, reason = "each test binary uses a different subset")]

use kb_copilot::embeddings::Embedder;
use kb_copilot::llm::{LanguageModel, ModelError};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

pub const HASH_DIMENSION: usize = 512;

/// Deterministic bag-of-words embedder.
///
/// Lowercased words are hashed into a fixed number of buckets and the
/// resulting count vector is normalised, so texts sharing words end up close.
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new() -> Self {
        Self {
            dimension: HASH_DIMENSION,
        }
    }

    fn bucket(&self, word: &str) -> usize {
        // FNV-1a
        let hash = word.bytes().fold(0xcbf2_9ce4_8422_2325_u64, |hash, byte| {
            (hash ^ u64::from(byte)).wrapping_mul(0x0100_0000_01b3)
        });
        (hash % self.dimension as u64) as usize
    }
}

impl Embedder for HashingEmbedder {
    fn model_name(&self) -> &str {
        "hashing-bow"
    }

    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        let mut vector = vec![0.0_f32; self.dimension];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            vector[self.bucket(&word.to_lowercase())] += 1.0;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }
        Ok(vector)
    }
}

/// Language model double that records prompts and can be told to fail
#[derive(Default)]
pub struct ScriptedModel {
    pub calls: AtomicUsize,
    pub fail: AtomicBool,
    pub prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts
            .lock()
            .expect("prompt log should not be poisoned")
            .last()
            .cloned()
    }
}

impl LanguageModel for ScriptedModel {
    fn model_name(&self) -> &str {
        "scripted"
    }

    fn invoke(&self, prompt: &str) -> Result<String, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts
            .lock()
            .expect("prompt log should not be poisoned")
            .push(prompt.to_string());

        if self.fail.load(Ordering::SeqCst) {
            return Err(ModelError::Http {
                status: 429,
                body: "RESOURCE_EXHAUSTED".to_string(),
            });
        }
        Ok("Employees are entitled to 20 paid leaves per year. Source: policy.txt".to_string())
    }
}

pub const POLICY_TXT: &str = "Employees get 20 paid leaves per year.\n\
\n\
Remote work is allowed two days per week.\n";

pub const OFFICE_TXT: &str = "The office cafeteria opens at noon.\n\
Security badges must be worn at all times.\n";
