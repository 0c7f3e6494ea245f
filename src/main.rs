//! # Persona: profile chat agent
//!
//! Answers visitors' questions as one person, grounded in their summary and
//! resume.
//!
//! Usage:
//!   persona serve                      # Chat widget on http://127.0.0.1:7860
//!   persona chat                       # Terminal chat
//!   persona index --force              # Rebuild the retrieval index
//!   persona search "current job" -k 3  # Inspect raw retrieval

use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use persona_agent::Agent;
use persona_core::PersonaConfig;
use persona_core::error::PersonaError;
use persona_core::types::Message;
use persona_knowledge::BuildOutcome;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "persona", version, about = "💬 Persona: chat with a profile, grounded in its documents")]
struct Cli {
    /// Config file (default: ~/.persona/config.toml)
    #[arg(short, long)]
    config: Option<String>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the chat widget and JSON chat API
    Serve {
        /// Bind address (overrides gateway.host)
        #[arg(long)]
        host: Option<String>,
        /// Port (overrides gateway.port)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Chat in the terminal
    Chat,
    /// Build the retrieval index, reusing it when nothing changed
    Index {
        /// Re-embed even if the cached index matches
        #[arg(long)]
        force: bool,
    },
    /// Show the chunks retrieved for a query
    Search {
        query: String,
        /// Number of chunks (default: rag.retrieval_k)
        #[arg(short)]
        k: Option<usize>,
    },
}

fn load_config(path: Option<&str>) -> Result<PersonaConfig> {
    let config = match path {
        Some(p) => {
            let mut config =
                PersonaConfig::load_from(std::path::Path::new(shellexpand::tilde(p).as_ref()))?;
            config.apply_env()?;
            config
        }
        None => PersonaConfig::load()?,
    };
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "persona=debug,persona_agent=debug,persona_knowledge=debug,persona_tools=debug,tower_http=debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Serve { host, port } => serve(config, host, port).await,
        Command::Chat => chat(config).await,
        Command::Index { force } => index(config, force).await,
        Command::Search { query, k } => search(config, &query, k).await,
    }
}

async fn serve(mut config: PersonaConfig, host: Option<String>, port: Option<u16>) -> Result<()> {
    if let Some(host) = host {
        config.gateway.host = host;
    }
    if let Some(port) = port {
        config.gateway.port = port;
    }
    let gateway = config.gateway.clone();

    match Agent::new(config).await {
        Ok(agent) => persona_gateway::start(&gateway, Arc::new(agent)).await,
        Err(e @ PersonaError::NotFound { .. }) => {
            persona_gateway::start_setup(&gateway, e.to_string()).await
        }
        Err(e) => Err(e.into()),
    }
}

async fn chat(config: PersonaConfig) -> Result<()> {
    let agent = Agent::new(config).await?;
    println!("💬 Chatting as {}. Type 'exit' to quit.\n", agent.name());

    let mut history: Vec<Message> = Vec::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let message = line.trim();
        if message.is_empty() {
            continue;
        }
        if matches!(message, "exit" | "quit") {
            break;
        }

        match agent.chat_with_history(message, history.clone()).await {
            Ok(turn) => {
                println!("\n{}\n", turn.answer);
                history.push(Message::user(message));
                history.push(Message::assistant(turn.answer));
            }
            Err(e) if e.is_recoverable() => eprintln!("⚠️  {e} (try again)\n"),
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

async fn index(config: PersonaConfig, force: bool) -> Result<()> {
    persona_knowledge::check_sources(&config)?;
    let embedder = persona_providers::create_embedder(&config)?;
    let (index, outcome) = persona_knowledge::build_profile_index(&config, embedder, force).await?;
    match outcome {
        BuildOutcome::Built { chunks } => println!("✅ Indexed {chunks} chunks"),
        BuildOutcome::Reused { chunks } => println!("♻️  Index up to date ({chunks} chunks)"),
    }
    println!("   {}", config.index_dir().join("index.db").display());
    println!("   collection '{}'", index.collection());
    Ok(())
}

async fn search(config: PersonaConfig, query: &str, k: Option<usize>) -> Result<()> {
    persona_knowledge::check_sources(&config)?;
    let embedder = persona_providers::create_embedder(&config)?;
    let (index, _) = persona_knowledge::build_profile_index(&config, embedder, false).await?;
    let hits = index.search(query, k.unwrap_or(config.rag.retrieval_k)).await?;
    if hits.is_empty() {
        println!("No results.");
    }
    for (i, hit) in hits.iter().enumerate() {
        let page = hit.chunk.page.map(|p| format!(" p.{p}")).unwrap_or_default();
        println!(
            "#{} [{}{}] distance {:.4}\n{}\n",
            i + 1,
            hit.chunk.provenance,
            page,
            hit.distance,
            hit.chunk.text
        );
    }
    Ok(())
}
