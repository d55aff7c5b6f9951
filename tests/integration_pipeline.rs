#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

// End-to-end question answering over an in-memory index

mod common;

use common::{HashingEmbedder, OFFICE_TXT, POLICY_TXT, ScriptedModel};
use kb_copilot::answer::{Answer, NOT_FOUND_MESSAGE, SERVICE_UNAVAILABLE_MESSAGE};
use kb_copilot::config::RetrievalConfig;
use kb_copilot::database::{InMemoryIndex, VectorIndex};
use kb_copilot::embeddings::{ChunkingConfig, SourceDocument};
use kb_copilot::indexer::Indexer;
use kb_copilot::knowledge_base::KnowledgeBase;
use kb_copilot::rate_limit::ManualClock;
use std::sync::Arc;
use std::time::Duration;

const LEAVE_QUESTION: &str = "How many paid leaves are employees entitled to?";

struct Pipeline {
    kb: KnowledgeBase,
    index: Arc<InMemoryIndex>,
    indexer: Indexer,
    model: Arc<ScriptedModel>,
    clock: Arc<ManualClock>,
}

fn pipeline() -> Pipeline {
    pipeline_with(RetrievalConfig::default())
}

fn pipeline_with(settings: RetrievalConfig) -> Pipeline {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let embedder = Arc::new(HashingEmbedder::new());
    let index = Arc::new(InMemoryIndex::new());
    let model = Arc::new(ScriptedModel::default());
    let clock = Arc::new(ManualClock::new());

    let indexer = Indexer::new(embedder.clone(), index.clone(), ChunkingConfig::default());
    let kb = KnowledgeBase::with_clock(
        embedder,
        index.clone(),
        model.clone(),
        settings,
        clock.clone(),
    );

    Pipeline {
        kb,
        index,
        indexer,
        model,
        clock,
    }
}

fn knowledge_files() -> Vec<SourceDocument> {
    vec![
        SourceDocument::new("office.txt", OFFICE_TXT),
        SourceDocument::new("policy.txt", POLICY_TXT),
    ]
}

#[tokio::test]
async fn answers_leave_question_citing_policy_line() {
    let p = pipeline();
    p.indexer
        .index_documents(&knowledge_files())
        .await
        .expect("indexing should succeed");

    let answer = p
        .kb
        .answer_question(LEAVE_QUESTION)
        .await
        .expect("question should be answered");

    let (text, sources) = answer.into_parts();
    assert!(text.contains("20 paid leaves"));
    assert_eq!(sources.len(), 3);
    assert!(
        sources[0].starts_with("#1 policy.txt (line 1) — relevance: "),
        "unexpected top source: {}",
        sources[0]
    );
    assert!(sources[1].starts_with("#2 "));
    assert!(sources[2].starts_with("#3 "));

    let prompt = p.model.last_prompt().expect("model should be prompted");
    assert!(prompt.contains("Context:\nEmployees get 20 paid leaves per year.\n"));
    assert!(prompt.contains(&format!("Question: {}", LEAVE_QUESTION)));
    assert_eq!(p.model.call_count(), 1);
}

#[tokio::test]
async fn citations_are_ranked_by_ascending_distance() {
    let p = pipeline();
    p.indexer
        .index_documents(&knowledge_files())
        .await
        .expect("indexing should succeed");

    let answer = p
        .kb
        .answer_question(LEAVE_QUESTION)
        .await
        .expect("question should be answered");

    let scores: Vec<f64> = answer
        .sources()
        .iter()
        .map(|s| {
            s.rsplit("relevance: ")
                .next()
                .and_then(|score| score.parse().ok())
                .expect("citation should end with a score")
        })
        .collect();
    assert!(scores.windows(2).all(|pair| pair[0] <= pair[1]));
}

#[tokio::test]
async fn empty_index_answers_not_found_without_model_call() {
    let p = pipeline();

    let answer = p
        .kb
        .answer_question("What is the refund policy?")
        .await
        .expect("question should be answered");

    assert_eq!(answer, Answer::NotFound);
    let (text, sources) = answer.into_parts();
    assert_eq!(text, NOT_FOUND_MESSAGE);
    assert!(sources.is_empty());
    assert_eq!(p.model.call_count(), 0);
}

#[tokio::test]
async fn model_failure_is_degraded_and_starts_cooldown() {
    let p = pipeline();
    p.indexer
        .index_documents(&knowledge_files())
        .await
        .expect("indexing should succeed");
    p.model.set_failing(true);

    let failed = p
        .kb
        .answer_question(LEAVE_QUESTION)
        .await
        .expect("failure should be reported as an answer");
    let (text, sources) = failed.into_parts();
    assert_eq!(text, SERVICE_UNAVAILABLE_MESSAGE);
    assert!(sources.is_empty());

    p.clock.advance(Duration::from_secs(30));
    let refused = p
        .kb
        .answer_question(LEAVE_QUESTION)
        .await
        .expect("refusal should be reported as an answer");
    assert_eq!(
        refused.message(),
        "Please wait 30 seconds before asking another question."
    );
    assert!(refused.sources().is_empty());
    assert_eq!(p.model.call_count(), 1);
}

#[tokio::test]
async fn second_question_within_window_is_refused_then_allowed() {
    let p = pipeline();
    p.indexer
        .index_documents(&knowledge_files())
        .await
        .expect("indexing should succeed");

    p.kb.answer_question(LEAVE_QUESTION)
        .await
        .expect("first question");

    p.clock.advance(Duration::from_secs(10));
    let refused = p
        .kb
        .answer_question("Can I work remotely?")
        .await
        .expect("second question");
    assert_eq!(
        refused,
        Answer::RateLimited {
            retry_after: Duration::from_secs(50)
        }
    );

    p.clock.advance(Duration::from_secs(50));
    let allowed = p
        .kb
        .answer_question("Can I work remotely?")
        .await
        .expect("third question");
    assert!(matches!(allowed, Answer::Answered { .. }));
    assert_eq!(p.model.call_count(), 2);
}

#[tokio::test]
async fn reingest_replaces_knowledge() {
    let p = pipeline();
    p.indexer
        .index_documents(&knowledge_files())
        .await
        .expect("first indexing should succeed");
    p.indexer
        .index_documents(&[SourceDocument::new("office.txt", OFFICE_TXT)])
        .await
        .expect("second indexing should succeed");

    assert_eq!(p.index.count().await.expect("count should succeed"), 2);

    let answer = p
        .kb
        .answer_question(LEAVE_QUESTION)
        .await
        .expect("question should be answered");
    assert!(answer.sources().iter().all(|s| s.contains("office.txt")));
}

#[tokio::test]
async fn context_is_truncated_to_configured_characters() {
    let p = pipeline_with(RetrievalConfig {
        max_context_chars: 500,
        ..RetrievalConfig::default()
    });
    let long_lines: String = (0..3)
        .map(|i| format!("leaves {} {}\n", i, "x".repeat(390)))
        .chain((0..3).map(|i| format!("paid {} {}\n", i, "y".repeat(390))))
        .collect();
    p.indexer
        .index_documents(&[SourceDocument::new("long.txt", long_lines)])
        .await
        .expect("indexing should succeed");

    let answer = p
        .kb
        .answer_question("paid leaves")
        .await
        .expect("question should be answered");
    assert_eq!(answer.sources().len(), 3);

    let prompt = p.model.last_prompt().expect("model should be prompted");
    let context = prompt
        .split("Context:\n")
        .nth(1)
        .and_then(|rest| rest.split("\n\nQuestion:").next())
        .expect("prompt should contain a context section");
    assert_eq!(context.chars().count(), 500);
    assert_eq!(context.lines().count(), 2);
}
