//! Award interpreter binary: HTTP server and one-shot CLI.

use std::path::PathBuf;
use std::sync::Arc;

use award_interpreter::api::{AppState, OptionsRequest, ResolutionsRequest, create_router};
use award_interpreter::config::ConfigLoader;
use award_interpreter::models::Session;
use award_interpreter::pipeline::{Orchestrator, SessionStore};
use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, eyre};
use rust_decimal::Decimal;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Award interpreter: award documents to rule specifications, gap reports
/// and updated payroll configuration.
#[derive(Parser)]
#[command(name = "award-interpreter", version, about, long_about = None)]
struct Cli {
    /// Path to settings.yaml.
    #[arg(
        long,
        env = "AWARD_INTERPRETER_SETTINGS",
        default_value = "config/settings.yaml",
        global = true
    )]
    settings: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the HTTP API.
    Serve {
        /// Socket address; defaults to server.bind from the settings.
        #[arg(long)]
        bind: Option<String>,
    },

    /// Run one award through the pipeline and print the session.
    Process {
        /// Award URL, local path or bare award code (e.g. MA000002).
        reference: String,

        /// Use the generative configuration strategy.
        #[arg(long)]
        generative: bool,

        /// Chunks retrieved per rule category.
        #[arg(long)]
        retrieval_k: Option<usize>,

        /// Confidence below which entries are flagged.
        #[arg(long)]
        confidence_threshold: Option<f64>,

        /// Session cost ceiling in USD.
        #[arg(long)]
        budget: Option<Decimal>,
    },

    /// Resolve the ambiguities of a waiting session and finish it.
    Resume {
        /// The session id.
        session_id: String,

        /// JSON file with `{"resolutions": [...]}`.
        #[arg(long)]
        resolutions: PathBuf,
    },

    /// Print a stored session.
    Status {
        /// The session id.
        session_id: String,
    },
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("award_interpreter=info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();
}

fn print_session(session: &Session) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(session)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    init_tracing();

    let config = ConfigLoader::load(&cli.settings)
        .wrap_err_with(|| format!("loading {}", cli.settings.display()))?;

    match cli.command {
        Command::Serve { bind } => {
            let orchestrator = Arc::new(Orchestrator::from_config(&config)?);
            let bind = bind.unwrap_or_else(|| config.settings().server.bind.clone());
            let listener = tokio::net::TcpListener::bind(&bind)
                .await
                .wrap_err_with(|| format!("binding {}", bind))?;
            info!(address = %bind, "Listening");
            axum::serve(listener, create_router(AppState::new(orchestrator))).await?;
        }
        Command::Process {
            reference,
            generative,
            retrieval_k,
            confidence_threshold,
            budget,
        } => {
            let orchestrator = Orchestrator::from_config(&config)?;
            let options = OptionsRequest {
                use_generative_config: generative.then_some(true),
                retrieval_k,
                confidence_threshold,
                cost_budget: budget,
            }
            .resolve(orchestrator.defaults())
            .map_err(|message| eyre!(message))?;
            let session = orchestrator.process(&reference, options).await?;
            print_session(&session)?;
        }
        Command::Resume {
            session_id,
            resolutions,
        } => {
            let orchestrator = Orchestrator::from_config(&config)?;
            let content = std::fs::read_to_string(&resolutions)
                .wrap_err_with(|| format!("reading {}", resolutions.display()))?;
            let request: ResolutionsRequest = serde_json::from_str(&content)?;
            let session = orchestrator.resume(&session_id, request.resolutions).await?;
            print_session(&session)?;
        }
        Command::Status { session_id } => {
            let store = SessionStore::new(config.settings().paths.sessions_dir.clone());
            print_session(&store.load(&session_id).await?)?;
        }
    }
    Ok(())
}
