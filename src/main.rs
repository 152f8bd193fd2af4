//! # Caremind — Caregiver Support Assistant
//!
//! Multi-source retrieval orchestration and answer synthesis for caregivers
//! of autistic children.
//!
//! Usage:
//!   caremind ask "How do I request an IEP?"        # One-shot question
//!   caremind chat                                  # Interactive session
//!   caremind ingest --file guide.txt               # Shared knowledge base
//!   caremind ingest --file iep.txt --user alice    # Private user document
//!   caremind config --init                         # Write default config

use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use caremind_core::config::CaremindConfig;
use caremind_core::types::OwnerScope;
use caremind_engine::SynthesisEngine;
use caremind_flows::FlowStore;
use caremind_memory::{ConversationMemoryManager, MemoryDb};
use caremind_rag::{DocumentIngestor, create_vector_store};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "caremind", version, about = "💙 Caremind — Caregiver Support Assistant")]
struct Cli {
    /// Path to config file (default: ~/.caremind/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ask a single question and print the answer
    Ask {
        question: String,
        /// User id for private documents and memory (default: "default")
        #[arg(short, long, default_value = "default")]
        user: String,
        /// Start from a guided flow node
        #[arg(long)]
        node: Option<String>,
    },
    /// Interactive chat session
    Chat {
        #[arg(short, long, default_value = "default")]
        user: String,
    },
    /// Ingest a text document into the knowledge base
    Ingest {
        /// Path to a plain-text file
        #[arg(short, long)]
        file: PathBuf,
        /// Ingest into this user's private collection instead of the shared KB
        #[arg(short, long)]
        user: Option<String>,
    },
    /// Remove a previously ingested document and all its chunks
    Remove {
        /// Filename the document was ingested under
        #[arg(short, long)]
        file: String,
        #[arg(short, long)]
        user: Option<String>,
    },
    /// Show or initialize the configuration
    Config {
        /// Write the default config to ~/.caremind/config.toml
        #[arg(long)]
        init: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "caremind=debug" } else { "caremind=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let config = match &cli.config {
        Some(path) => CaremindConfig::load_from(path)?,
        None => CaremindConfig::load()?,
    };
    // Config problems are fatal before any request is served
    config.validate().context("invalid configuration")?;

    match cli.command {
        Command::Ask { question, user, node } => {
            let (engine, memory) = build_engine(&config)?;
            let mut session = memory.start_session(user);
            if let Some(node) = node {
                session.enter_guided(node);
            }

            let response = engine.synthesize(&mut session, &question).await?;
            print_response(&response);
        }
        Command::Chat { user } => {
            let (engine, memory) = build_engine(&config)?;
            let mut session = memory.start_session(user);
            println!("💙 Caremind — type your question, or 'quit' to exit.\n");

            let stdin = std::io::stdin();
            loop {
                print!("you> ");
                std::io::stdout().flush()?;
                let mut line = String::new();
                if stdin.lock().read_line(&mut line)? == 0 {
                    break;
                }
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if line == "quit" || line == "exit" {
                    break;
                }

                match engine.synthesize(&mut session, line).await {
                    Ok(response) => print_response(&response),
                    Err(e) => eprintln!("❌ {e}"),
                }
            }
        }
        Command::Ingest { file, user } => {
            let owner = owner_scope(user);
            let filename = file
                .file_name()
                .and_then(|n| n.to_str())
                .context("file has no valid name")?
                .to_string();
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;

            let ingestor = build_ingestor(&config)?;
            let report = ingestor.ingest_text(&owner, &filename, &text).await?;
            if report.file_skipped {
                println!("⏭️  {filename} was already ingested, skipped.");
            } else {
                println!(
                    "✅ Ingested {filename}: {} chunk(s) stored, {} duplicate(s) skipped.",
                    report.stored, report.duplicates
                );
            }
        }
        Command::Remove { file, user } => {
            let owner = owner_scope(user);
            let ingestor = build_ingestor(&config)?;
            ingestor.remove_document(&owner, &file).await?;
            println!("🗑️  Removed {file} and all its chunks.");
        }
        Command::Config { init } => {
            if init {
                config.save()?;
                println!("✅ Config written to {}", CaremindConfig::default_path().display());
            } else {
                println!("{}", toml::to_string_pretty(&config)?);
            }
        }
    }

    Ok(())
}

fn owner_scope(user: Option<String>) -> OwnerScope {
    match user {
        Some(id) => OwnerScope::user(id),
        None => OwnerScope::Shared,
    }
}

fn build_ingestor(config: &CaremindConfig) -> Result<DocumentIngestor> {
    let store: Arc<_> = Arc::from(create_vector_store(config)?);
    let embedder: Arc<_> = Arc::from(caremind_providers::create_embedder(config)?);
    Ok(DocumentIngestor::new(store, embedder, config))
}

fn build_engine(
    config: &CaremindConfig,
) -> Result<(SynthesisEngine, Arc<ConversationMemoryManager>)> {
    let store: Arc<_> = Arc::from(create_vector_store(config)?);
    let embedder: Arc<_> = Arc::from(caremind_providers::create_embedder(config)?);
    let provider: Arc<_> = Arc::from(caremind_providers::create_provider(config)?);
    let flows = Arc::new(FlowStore::from_config(config)?);

    let db_path = if config.memory.db_path.is_empty() {
        CaremindConfig::home_dir().join("memory.db")
    } else {
        PathBuf::from(&config.memory.db_path)
    };
    let db = Arc::new(MemoryDb::open(&db_path)?);
    let memory = Arc::new(ConversationMemoryManager::new(
        Arc::clone(&store),
        Arc::clone(&embedder),
        db,
        config,
    ));

    let engine =
        SynthesisEngine::new(provider, embedder, store, flows, Arc::clone(&memory), config);
    Ok((engine, memory))
}

fn print_response(response: &caremind_core::types::SynthesizedResponse) {
    println!("\n{}\n", response.answer);
    if !response.sources.is_empty() {
        let labels: Vec<&str> = response.sources.iter().map(|s| s.label.as_str()).collect();
        println!("📚 Sources: {}", labels.join(", "));
    }
    println!("ℹ️  Confidence: {:.0}%", response.confidence * 100.0);
    for step in &response.next_steps {
        println!("➡️  Next: {step}");
    }
    println!();
}
