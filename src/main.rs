use clap::{Parser, Subcommand};
use kb_copilot::Result;
use kb_copilot::commands::{ask, configure, ingest, show_status};
use kb_copilot::config::{Config, load_config_env, resolve_config_dir};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "kb-copilot")]
#[command(about = "Answer questions about your text documents with cited sources")]
#[command(version)]
struct Cli {
    /// Directory holding config.toml and the vector index (defaults to ~/.kb-copilot)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show or initialise the configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
        /// Write the default configuration file if none exists
        #[arg(long, conflicts_with = "show")]
        init: bool,
    },
    /// Index every .txt file in the data directory, replacing the previous index
    Ingest {
        /// Directory to read documents from instead of the configured one
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
    /// Ask a question; without one, read questions from stdin
    Ask {
        question: Option<String>,
    },
    /// Show index location and record count
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let config_dir = resolve_config_dir(cli.config_dir.as_deref())
        .map_err(|e| kb_copilot::KbError::Config(e.to_string()))?;
    load_config_env(&config_dir);
    let config = Config::load(&config_dir)?;

    match cli.command {
        Commands::Config { show: _, init } => {
            configure(&config, init)?;
        }
        Commands::Ingest { data_dir } => {
            ingest(&config, data_dir).await?;
        }
        Commands::Ask { question } => {
            ask(&config, question).await?;
        }
        Commands::Status => {
            show_status(&config).await?;
        }
    }

    Ok(())
}
