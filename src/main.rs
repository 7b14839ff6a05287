use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mkdocs_rag::display::illustrative_images;
use mkdocs_rag::{
    AnswerError, AnswerRecord, ChatSession, ConfigError, ProviderError, ProviderKind,
    QueryAnswerer, Settings, StoreKind, doctor, logging, setup,
};
use serde::Serialize;

/// mkdocs-rag - answer questions about MkDocs from its own documentation
#[derive(Parser)]
#[command(name = "mkdocs-rag")]
#[command(about = "Answers MkDocs questions grounded in the indexed documentation")]
#[command(version)]
struct Cli {
    /// Service providing embeddings and answers
    #[arg(long, global = true, value_enum)]
    provider: Option<ProviderKind>,

    /// Vector store holding the indexed chunks
    #[arg(long, global = true, value_enum)]
    store: Option<StoreKind>,

    /// Collection to search
    #[arg(long, global = true, value_name = "NAME")]
    collection: Option<String>,

    /// Path of the local SQLite store
    #[arg(long, global = true, value_name = "PATH")]
    db_path: Option<PathBuf>,

    /// Base URL of the Chroma server
    #[arg(long, global = true, value_name = "URL")]
    chroma_url: Option<String>,

    /// Enable debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand)]
enum Commands {
    /// Answer a single question
    Ask(AskCommand),
    /// Ask questions interactively until `exit`, `quit` or end of input
    Chat,
    /// Check configuration, vector store and model provider
    Doctor,
}

/// Answer a single question
#[derive(Parser)]
struct AskCommand {
    /// The question to answer
    #[arg(value_name = "QUESTION")]
    question: String,

    /// Number of chunks to retrieve
    #[arg(short = 'k', long, value_name = "N")]
    top_k: Option<usize>,

    /// Sampling temperature for generation
    #[arg(short, long, value_name = "T")]
    temperature: Option<f32>,

    /// Print the answer as JSON
    #[arg(long)]
    json: bool,
}

/// JSON shape printed by `ask --json`.
#[derive(Serialize)]
struct AskOutput<'a> {
    answer: &'a str,
    sources: Vec<&'a str>,
    images: Vec<&'a str>,
}

fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let result = run(&cli);

    if let Err(e) = result {
        // Determine exit code based on error type
        let exit_code = if is_user_error(&e) { 1 } else { 2 };
        eprintln!("Error: {e:#}");
        std::process::exit(exit_code);
    }
}

fn run(cli: &Cli) -> Result<()> {
    let settings = load_settings(cli)?;

    match &cli.command {
        Commands::Ask(cmd) => handle_ask(cmd, settings),
        Commands::Chat => handle_chat(&settings),
        Commands::Doctor => handle_doctor(&settings),
    }
}

/// Determines if an error is a user error (vs internal error).
///
/// User errors are empty questions and invalid configuration, including a
/// missing API key. Everything else is a collaborator or I/O failure.
fn is_user_error(error: &anyhow::Error) -> bool {
    error.chain().any(|cause| {
        if let Some(e) = cause.downcast_ref::<AnswerError>() {
            return e.is_user_error();
        }
        cause.is::<ConfigError>()
            || matches!(
                cause.downcast_ref::<ProviderError>(),
                Some(ProviderError::MissingApiKey { .. })
            )
    })
}

/// Reads settings from the environment, then applies global flags.
fn load_settings(cli: &Cli) -> Result<Settings> {
    let mut settings = Settings::from_env()?;
    apply_overrides(cli, &mut settings);
    Ok(settings)
}

fn apply_overrides(cli: &Cli, settings: &mut Settings) {
    if let Some(provider) = cli.provider {
        settings.provider = provider;
    }
    if let Some(store) = cli.store {
        settings.store = store;
    }
    if let Some(collection) = &cli.collection {
        settings.collection = collection.clone();
    }
    if let Some(path) = &cli.db_path {
        settings.db_path = path.clone();
    }
    if let Some(url) = &cli.chroma_url {
        settings.chroma_url = url.clone();
    }
}

/// Handles the ask command by answering one question.
fn handle_ask(cmd: &AskCommand, mut settings: Settings) -> Result<()> {
    // Validate before any collaborator is built
    if cmd.question.trim().is_empty() {
        return Err(AnswerError::EmptyQuestion.into());
    }

    if let Some(top_k) = cmd.top_k {
        settings.top_k = top_k;
    }
    if let Some(temperature) = cmd.temperature {
        settings.temperature = temperature;
    }

    let answerer = setup::build_answerer(&settings)?;
    execute_ask(&answerer, &cmd.question, cmd.json)
}

/// Executes the ask command logic with a provided answerer.
///
/// This function is separated from `handle_ask` to allow testing with stub collaborators.
fn execute_ask(answerer: &QueryAnswerer, question: &str, json: bool) -> Result<()> {
    let record = answerer
        .answer(question)
        .context("Failed to answer question")?;
    let fallback = answerer.config().fallback_answer();
    let images = illustrative_images(&record, fallback);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if json {
        let output = AskOutput {
            answer: &record.answer,
            sources: record.sources.iter().map(String::as_str).collect(),
            images,
        };
        serde_json::to_writer_pretty(&mut out, &output)?;
        writeln!(out)?;
    } else {
        write_record(&mut out, &record, &images)?;
    }
    Ok(())
}

/// Writes an answer followed by its sources and illustrative images.
fn write_record(out: &mut impl Write, record: &AnswerRecord, images: &[&str]) -> io::Result<()> {
    writeln!(out, "{}", record.answer.trim())?;
    if !record.sources.is_empty() {
        writeln!(out)?;
        writeln!(out, "Sources:")?;
        for source in &record.sources {
            writeln!(out, "  - {source}")?;
        }
    }
    if !images.is_empty() {
        writeln!(out)?;
        writeln!(out, "Images:")?;
        for image in images {
            writeln!(out, "  - {image}")?;
        }
    }
    Ok(())
}

/// Handles the chat command with an interactive stdin loop.
fn handle_chat(settings: &Settings) -> Result<()> {
    let answerer = setup::build_answerer(settings)?;
    let stdin = io::stdin();
    let stdout = io::stdout();
    run_chat(&answerer, stdin.lock(), &mut stdout.lock())
}

/// Runs the chat loop until `exit`, `quit` or end of input.
fn run_chat(answerer: &QueryAnswerer, input: impl BufRead, out: &mut impl Write) -> Result<()> {
    let mut session = ChatSession::new(answerer);

    writeln!(out, "Ask about MkDocs. Type 'exit' to quit.")?;
    write!(out, "> ")?;
    out.flush()?;

    for line in input.lines() {
        let line = line.context("Failed to read input")?;
        if is_exit_command(&line) {
            break;
        }

        if let Some(reply) = session.ask(&line) {
            writeln!(out)?;
            writeln!(out, "{}", reply.content.trim())?;
            if !reply.sources.is_empty() {
                writeln!(out, "Sources: {}", reply.sources.join(", "))?;
            }
            for image in &reply.images {
                writeln!(out, "Image: {image}")?;
            }
            writeln!(out)?;
        }

        write!(out, "> ")?;
        out.flush()?;
    }

    writeln!(out)?;
    Ok(())
}

fn is_exit_command(line: &str) -> bool {
    matches!(line.trim().to_lowercase().as_str(), "exit" | "quit")
}

/// Handles the doctor command.
fn handle_doctor(settings: &Settings) -> Result<()> {
    if !doctor::run_health_checks(settings)? {
        anyhow::bail!("One or more health checks failed");
    }
    Ok(())
}
