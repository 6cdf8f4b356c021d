//! CLI entry and dispatch.

use anyhow::{Context, Result};
use clap::Parser;

use crate::config;

mod commands;

#[derive(Parser)]
#[command(name = "psique")]
#[command(version = "0.1")]
#[command(about = "Psychology tutor in your terminal")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Override the model from config
    #[arg(short, long)]
    model: Option<String>,

    /// Persona to chat with (student or debate)
    #[arg(short, long)]
    persona: Option<String>,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Explains a single psychology concept and exits
    Explore {
        /// The concept to explain
        #[arg(short, long)]
        concept: String,
    },

    /// Starts an interactive tutoring conversation
    Chat,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(clap::Subcommand)]
enum ConfigCommands {
    /// Show the path to the config file
    Path,
    /// Initialize a default config file (if not present)
    Init,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    init_tracing();

    // one tokio runtime for everything
    let rt = tokio::runtime::Runtime::new().context("create tokio runtime")?;

    rt.block_on(async move { dispatch(cli).await })
}

/// RUST_LOG-gated diagnostics on stderr. Failures stay user-visible on
/// their own; logging is additive.
fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("off"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn dispatch(cli: Cli) -> Result<()> {
    let mut config = config::Config::load().context("load config")?;

    if let Some(model) = cli.model.as_deref() {
        let trimmed = model.trim();
        if !trimmed.is_empty() {
            config.model = trimmed.to_string();
        }
    }

    // default to chat mode
    let Some(command) = cli.command else {
        return commands::chat::run(&config, cli.persona.as_deref()).await;
    };

    match command {
        Commands::Explore { concept } => commands::explore::run(&concept, &config).await,

        Commands::Chat => commands::chat::run(&config, cli.persona.as_deref()).await,

        Commands::Config { command } => match command {
            ConfigCommands::Path => commands::config::path(),
            ConfigCommands::Init => commands::config::init(),
        },
    }
}
