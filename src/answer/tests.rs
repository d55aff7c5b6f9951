use super::*;
use crate::embeddings::DocumentChunk;
use crate::llm::ModelError;
use std::sync::Mutex;

struct RecordingModel {
    reply: Result<String, u16>,
    prompts: Mutex<Vec<String>>,
}

impl RecordingModel {
    fn replying(text: &str) -> Self {
        Self {
            reply: Ok(text.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn failing_with(status: u16) -> Self {
        Self {
            reply: Err(status),
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().expect("lock should not be poisoned").clone()
    }
}

impl LanguageModel for RecordingModel {
    fn model_name(&self) -> &str {
        "recording"
    }

    fn invoke(&self, prompt: &str) -> Result<String, ModelError> {
        self.prompts
            .lock()
            .expect("lock should not be poisoned")
            .push(prompt.to_string());
        match &self.reply {
            Ok(text) => Ok(text.clone()),
            Err(status) => Err(ModelError::Http {
                status: *status,
                body: "quota exceeded".to_string(),
            }),
        }
    }
}

fn result(content: &str, source: &str, line_number: u32, score: f32) -> RetrievalResult {
    RetrievalResult {
        chunk: DocumentChunk {
            content: content.to_string(),
            source: source.to_string(),
            line_number,
        },
        score,
        embedding_model: "test".to_string(),
    }
}

fn four_results() -> Vec<RetrievalResult> {
    vec![
        result("Employees get 20 paid leaves per year.", "policy.txt", 3, 0.1234),
        result("Leave requests go to your manager.", "policy.txt", 5, 0.5),
        result("Holidays follow the regional calendar.", "holidays.txt", 1, 0.75),
        result("The cafeteria opens at noon.", "office.txt", 9, 1.5),
    ]
}

#[test]
fn citation_format() {
    let citation = format_citation(1, &result("x", "policy.txt", 3, 0.12345));

    assert_eq!(citation, "#1 policy.txt (line 3) — relevance: 0.1235");
}

#[test]
fn citation_pads_score_to_four_decimals() {
    let citation = format_citation(2, &result("x", "a.txt", 10, 0.5));

    assert_eq!(citation, "#2 a.txt (line 10) — relevance: 0.5000");
}

#[test]
fn context_joins_chunks_with_newlines() {
    let context = build_context(&four_results(), 3, 2000);

    assert_eq!(
        context,
        "Employees get 20 paid leaves per year.\n\
         Leave requests go to your manager.\n\
         Holidays follow the regional calendar.\n"
    );
}

#[test]
fn context_is_truncated_by_characters() {
    let results = vec![
        result(&"é".repeat(1500), "a.txt", 1, 0.0),
        result(&"ü".repeat(1500), "b.txt", 1, 0.1),
    ];

    let context = build_context(&results, 3, 2000);

    assert_eq!(context.chars().count(), 2000);
    assert!(context.starts_with(&"é".repeat(1500)));
    assert!(context.ends_with('ü'));
}

#[test]
fn prompt_contains_context_and_question() {
    let prompt = format_prompt("Employees get 20 paid leaves per year.\n", "How many leaves?");

    assert!(prompt.starts_with("You are an elite Knowledge Base Assistant"));
    assert!(prompt.contains("Answer the user's question using ONLY the provided context."));
    assert!(prompt.contains(prompt::MISSING_ANSWER_REPLY));
    assert!(prompt.contains("Always list the source file name"));
    assert!(prompt.contains("Context:\nEmployees get 20 paid leaves per year.\n"));
    assert!(prompt.contains("Question: How many leaves?"));
    assert!(prompt.trim_end().ends_with("Answer:"));
}

#[test]
fn assembles_answer_from_top_three() {
    let model = RecordingModel::replying("You get 20 paid leaves. Source: policy.txt");
    let settings = RetrievalConfig::default();

    let answer = assemble_answer(&model, "How many paid leaves?", &four_results(), &settings);

    let (text, sources) = answer.into_parts();
    assert_eq!(text, "You get 20 paid leaves. Source: policy.txt");
    assert_eq!(
        sources,
        vec![
            "#1 policy.txt (line 3) — relevance: 0.1234",
            "#2 policy.txt (line 5) — relevance: 0.5000",
            "#3 holidays.txt (line 1) — relevance: 0.7500",
        ]
    );

    let prompts = model.prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("Holidays follow the regional calendar."));
    assert!(!prompts[0].contains("cafeteria"));
}

#[test]
fn fewer_results_than_context_limit() {
    let model = RecordingModel::replying("answer");
    let results = vec![result("only one", "a.txt", 1, 0.0)];

    let answer = assemble_answer(&model, "q", &results, &RetrievalConfig::default());

    assert_eq!(answer.sources().len(), 1);
}

#[test]
fn no_results_skips_model() {
    let model = RecordingModel::replying("should not be used");

    let answer = assemble_answer(&model, "q", &[], &RetrievalConfig::default());

    assert_eq!(answer, Answer::NotFound);
    assert_eq!(answer.message(), NOT_FOUND_MESSAGE);
    assert!(answer.sources().is_empty());
    assert!(model.prompts().is_empty());
}

#[test]
fn model_failure_becomes_unavailable() {
    let model = RecordingModel::failing_with(429);

    let answer = assemble_answer(&model, "q", &four_results(), &RetrievalConfig::default());

    match &answer {
        Answer::Unavailable { reason } => assert!(reason.contains("429")),
        other => panic!("expected unavailable answer, got {:?}", other),
    }
    let (text, sources) = answer.into_parts();
    assert_eq!(text, SERVICE_UNAVAILABLE_MESSAGE);
    assert!(sources.is_empty());
    assert_eq!(model.prompts().len(), 1);
}

#[test]
fn rate_limited_message_rounds_up() {
    let answer = Answer::RateLimited {
        retry_after: Duration::from_millis(42_300),
    };

    assert_eq!(
        answer.message(),
        "Please wait 43 seconds before asking another question."
    );
    assert!(answer.sources().is_empty());
}

#[test]
fn unavailable_message_is_fixed() {
    assert_eq!(
        SERVICE_UNAVAILABLE_MESSAGE,
        "The AI service is currently rate-limited. This system uses controlled API usage with throttling and caching. Please try again later."
    );
}
