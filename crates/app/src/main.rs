use chrono::Utc;
use clap::{Parser, Subcommand};
use pdf_rag_core::{
    build, fallback_chain, load_latest, CharacterNgramEmbedder, LazyGenerator, PdfExtractor,
    QaEngine, RagConfig, DEFAULT_MODEL,
};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "pdf-rag", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Directory where index bundles are cached.
    #[arg(long, global = true, default_value = "./rag_cache")]
    cache: PathBuf,

    /// Completion endpoint for the generation model.
    #[arg(
        long,
        global = true,
        env = "RAG_GEN_ENDPOINT",
        default_value = "http://localhost:8080/v1/completions"
    )]
    gen_endpoint: String,

    /// Preferred generation model; built-in alternates are tried when it fails.
    #[arg(long, global = true, env = "RAG_GEN_MODEL", default_value = DEFAULT_MODEL)]
    gen_model: String,

    /// Bearer token for the generation endpoint.
    #[arg(long, global = true, env = "RAG_GEN_API_KEY")]
    gen_api_key: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Build the index bundle from a folder of PDFs.
    Build {
        /// Folder containing the corpus PDFs (no recursion).
        #[arg(long)]
        corpus: PathBuf,
        /// Cap pages read per pdf, for quick pilot builds.
        #[arg(long)]
        max_pages: Option<usize>,
    },
    /// Answer one question against the latest built index.
    Ask {
        #[arg(long)]
        question: String,
    },
    /// Interactive question loop against the latest built index.
    Repl,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    info!(
        version = env!("CARGO_PKG_VERSION"),
        started_at = %Utc::now().to_rfc3339(),
        "pdf-rag boot"
    );

    match cli.command {
        Command::Build { corpus, max_pages } => {
            let config = RagConfig {
                limit_pages: max_pages,
                ..RagConfig::default()
            };
            let report = build(
                &corpus,
                &cli.cache,
                &config,
                &CharacterNgramEmbedder::default(),
                &PdfExtractor::new(),
            )?;

            for skipped in &report.skipped_files {
                warn!(path = %skipped.path.display(), reason = %skipped.reason, "skipped pdf");
            }
            if report.reused {
                println!(
                    "bundle {} already up to date ({} chunks)",
                    report.bundle_id, report.n_chunks
                );
            } else {
                println!(
                    "bundle {} written with {} chunks ({} files skipped)",
                    report.bundle_id,
                    report.n_chunks,
                    report.skipped_files.len()
                );
            }
        }
        Command::Ask { ref question } => {
            let engine = load_engine(&cli)?;
            println!("A: {}", engine.answer(&question));
        }
        Command::Repl => {
            let engine = load_engine(&cli)?;
            println!("index loaded ({} chunks); type 'exit' to quit", engine.n_chunks());

            let stdin = std::io::stdin();
            loop {
                print!("Q: ");
                std::io::stdout().flush()?;

                let mut line = String::new();
                if stdin.lock().read_line(&mut line)? == 0 {
                    break;
                }
                let question = line.trim();
                if question.is_empty() {
                    continue;
                }
                if matches!(question.to_lowercase().as_str(), "exit" | "quit" | "q") {
                    break;
                }
                println!("A: {}\n", engine.answer(question));
            }
        }
    }

    Ok(())
}

fn load_engine(cli: &Cli) -> anyhow::Result<QaEngine<CharacterNgramEmbedder, LazyGenerator>> {
    let index = load_latest(&cli.cache)?;
    let candidates = fallback_chain(&cli.gen_model, &cli.gen_endpoint, cli.gen_api_key.as_deref());
    Ok(QaEngine::new(
        index,
        CharacterNgramEmbedder::default(),
        LazyGenerator::new(candidates),
        RagConfig::default(),
    ))
}
