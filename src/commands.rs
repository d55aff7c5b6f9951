use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{error, info, warn};

use crate::answer::Answer;
use crate::config::{Config, show_config};
use crate::database::{VectorIndex, VectorStore};
use crate::embeddings::{Embedder, OllamaClient};
use crate::indexer::Indexer;
use crate::knowledge_base::KnowledgeBase;
use crate::llm::build_language_model;

/// Print or initialise the configuration file
#[inline]
pub fn configure(config: &Config, init: bool) -> Result<()> {
    if init {
        let path = config.config_file_path();
        if path.exists() {
            println!("Configuration already exists at {}", path.display());
        } else {
            config.save().context("Failed to write configuration")?;
            println!("Wrote default configuration to {}", path.display());
        }
        return Ok(());
    }

    show_config(config)
}

fn connect_embedder(config: &Config) -> Result<OllamaClient> {
    let client =
        OllamaClient::new(&config.ollama).context("Failed to initialize Ollama client")?;
    client
        .health_check()
        .context("Ollama embedding service is not ready")?;
    Ok(client)
}

/// Rebuild the vector index from every `.txt` file in the data directory
#[inline]
pub async fn ingest(config: &Config, data_dir: Option<PathBuf>) -> Result<()> {
    let data_dir = data_dir.unwrap_or_else(|| config.data_dir.clone());
    info!("Ingesting documents from {}", data_dir.display());

    let embedder = Arc::new(connect_embedder(config)?);
    let store = Arc::new(
        VectorStore::new(config)
            .await
            .context("Failed to initialize LanceDB vector store")?,
    );

    let report = Indexer::new(embedder, store, config.chunking.clone())
        .index_directory(&data_dir)
        .await?;

    if report.documents == 0 {
        warn!("No .txt files found in {}", data_dir.display());
    }

    println!("✅ Documents indexed successfully.");
    println!("  Documents: {}", report.documents);
    println!("  Chunks: {}", report.chunks);
    if let Some(dimension) = report.embedding_dimension {
        println!("  Embedding dimension: {}", dimension);
    }

    Ok(())
}

async fn open_knowledge_base(config: &Config) -> Result<KnowledgeBase> {
    let embedder: Arc<dyn Embedder> = Arc::new(connect_embedder(config)?);
    let store: Arc<dyn VectorIndex> = Arc::new(
        VectorStore::new(config)
            .await
            .context("Failed to initialize LanceDB vector store")?,
    );
    let model = build_language_model(config)?;

    Ok(KnowledgeBase::new(
        embedder,
        store,
        model,
        config.retrieval.clone(),
    ))
}

/// Format an answer and its citations for the terminal
#[inline]
pub fn render_answer(answer: &Answer) -> String {
    let mut output = format!("Answer:\n{}\n", answer.message());

    if answer.sources().is_empty() {
        output.push_str("\nNo sources available for this response.\n");
    } else {
        output.push_str("\nSources (ranked):\n");
        for source in answer.sources() {
            output.push_str("  ");
            output.push_str(source);
            output.push('\n');
        }
    }

    output
}

fn is_exit_command(line: &str) -> bool {
    line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit")
}

/// Answer one question, or read questions from stdin until EOF or `exit`
#[inline]
pub async fn ask(config: &Config, question: Option<String>) -> Result<()> {
    let kb = open_knowledge_base(config).await?;

    if let Some(question) = question {
        let answer = kb.answer_question(&question).await?;
        print!("{}", render_answer(&answer));
        return Ok(());
    }

    println!("Ask a question about your documents (type 'exit' to quit).");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if is_exit_command(question) {
            break;
        }

        match kb.answer_question(question).await {
            Ok(answer) => println!("{}", render_answer(&answer)),
            Err(e) => {
                error!("Failed to answer question: {}", e);
                println!("Error: {}\n", e);
            }
        }
    }

    Ok(())
}

fn describe_path(path: &Path) -> String {
    if path.exists() {
        path.display().to_string()
    } else {
        format!("{} (missing)", path.display())
    }
}

/// Show index location, record count and service configuration
#[inline]
pub async fn show_status(config: &Config) -> Result<()> {
    println!("📊 Knowledge Base Status");
    println!("{}", "=".repeat(50));
    println!();

    println!("Data directory: {}", describe_path(&config.data_dir));
    println!(
        "Vector index: {}",
        describe_path(&config.vector_database_path())
    );

    let store = VectorStore::new(config)
        .await
        .context("Failed to initialize LanceDB vector store")?;
    match store.count().await {
        Ok(count) => println!("Indexed chunks: {}", count),
        Err(e) => println!("Indexed chunks: unavailable ({})", e),
    }
    if !store.validate_integrity().await? {
        println!("⚠️  Vector index failed its integrity check; run 'kb-copilot ingest'");
    }
    println!();

    println!(
        "Embedding model: {} at {}",
        config.ollama.model,
        config
            .ollama_url()
            .map_or_else(|e| format!("<invalid: {}>", e), |url| url.to_string())
    );
    match OllamaClient::new(&config.ollama).and_then(|client| client.health_check()) {
        Ok(()) => println!("Ollama: ✓ reachable"),
        Err(e) => println!("Ollama: ✗ {}", e),
    }
    println!(
        "Language model: {:?} / {}",
        config.llm.provider, config.llm.model
    );
    println!(
        "Cooldown: {}s between model calls",
        config.retrieval.cooldown_seconds
    );

    Ok(())
}
