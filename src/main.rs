//! ragdex CLI entry point

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use dialoguer::Confirm;
use ragdex::{
    cache::SessionCache,
    commands::{cmd_ask, cmd_chat, cmd_extend, cmd_index, cmd_list, IndexOutcome},
    config::default_model,
    estimate::{print_estimate, CostEstimate},
    remote::OpenAiClient,
    Config, Result,
};
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "ragdex")]
#[command(version, about = "Index local documents into hosted vector stores and ask questions against them", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index a directory or glob into a new vector store
    Index {
        /// Directory or glob pattern (supports **)
        pattern: String,
    },

    /// Attach new files to an already-indexed session
    Extend {
        /// Existing session: auto, a vs_ store id, or the original path/glob
        session: String,

        /// Directory or glob with the files to attach
        pattern: String,
    },

    /// Ask a single question against a store
    Ask {
        /// Model to answer with
        #[arg(long, env = "RAGDEX_MODEL", default_value_t = default_model())]
        model: String,

        /// System prompt for the answer
        #[arg(long, env = "RAGDEX_SYSTEM")]
        system: Option<String>,

        /// Store to query: auto, a vs_ store id, or an indexed path/glob
        target: String,

        /// The question
        #[arg(trailing_var_arg = true, required = true)]
        question: Vec<String>,
    },

    /// Start an interactive chat against a store
    Chat {
        /// Model to answer with
        #[arg(long, env = "RAGDEX_MODEL", default_value_t = default_model())]
        model: String,

        /// System prompt for the session
        #[arg(long, env = "RAGDEX_SYSTEM")]
        system: Option<String>,

        /// Store to chat with: auto, a vs_ store id, or an indexed path/glob
        target: String,
    },

    /// List cached sessions
    List,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() {
    if let Err(e) = run() {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    match cli.command {
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "ragdex", &mut std::io::stdout());
            Ok(())
        }

        Commands::List => {
            let cache = SessionCache::open(Config::default_cache_path());
            cmd_list(&cache);
            Ok(())
        }

        Commands::Index { pattern } => {
            let config = Config::load(default_model(), None)?;
            let remote = OpenAiClient::new(&config)?;
            let mut cache = SessionCache::open(&config.cache_path);

            let outcome = cmd_index(&mut cache, &remote, &pattern, &mut interactive_confirm)?;
            match outcome {
                IndexOutcome::Completed { store_id, report } => {
                    report_failures(&report);
                    println!("\n=== Session cached ===");
                    println!("Key: {}", SessionCache::canonicalize(&pattern));
                    println!("ID : {store_id}");
                    println!("Saved to: {}", cache.path().display());
                }
                IndexOutcome::Aborted => println!("Aborted; nothing was uploaded."),
                IndexOutcome::NothingToDo { .. } => unreachable!("index never short-circuits"),
            }
            Ok(())
        }

        Commands::Extend { session, pattern } => {
            let config = Config::load(default_model(), None)?;
            let remote = OpenAiClient::new(&config)?;
            let mut cache = SessionCache::open(&config.cache_path);

            let outcome =
                cmd_extend(&mut cache, &remote, &session, &pattern, &mut interactive_confirm)?;
            match outcome {
                IndexOutcome::Completed { store_id, report } => {
                    report_failures(&report);
                    println!("\nExtension complete for {store_id}.");
                }
                IndexOutcome::NothingToDo { .. } => {}
                IndexOutcome::Aborted => println!("Aborted; nothing was uploaded."),
            }
            Ok(())
        }

        Commands::Ask {
            model,
            system,
            target,
            question,
        } => {
            let config = Config::load(model, system)?;
            let remote = OpenAiClient::new(&config)?;
            let cache = SessionCache::open(&config.cache_path);

            let store_id = cache.resolve(&target)?;
            let answer = cmd_ask(&remote, &config, &store_id, &question.join(" "))?;
            println!("{answer}");
            Ok(())
        }

        Commands::Chat {
            model,
            system,
            target,
        } => {
            let config = Config::load(model, system)?;
            let remote = OpenAiClient::new(&config)?;
            let cache = SessionCache::open(&config.cache_path);

            let store_id = cache.resolve(&target)?;
            cmd_chat(&remote, &config, &store_id)
        }
    }
}

/// The human-in-the-loop cost gate: show the estimate, default to "no".
fn interactive_confirm(est: &CostEstimate) -> bool {
    print_estimate(est);
    Confirm::new()
        .with_prompt("Proceed with indexing at this approximate cost?")
        .default(false)
        .interact()
        .unwrap_or(false)
}

fn report_failures(report: &ragdex::commands::UploadReport) {
    let failures = report.failures();
    if failures.is_empty() {
        return;
    }
    println!("\n{} files failed to upload:", failures.len());
    for (path, reason) in failures {
        println!("  {}: {}", path.display(), reason);
    }
}
