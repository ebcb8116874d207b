//! FinQA CLI: the main entry point.
//!
//! Commands:
//! - `conditions` List the study's experimental conditions
//! - `study`      Run conditions over a dataset sample and write result files
//! - `chat`       Ask questions about one record interactively
//! - `config`     Show, initialize, or validate configuration

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "finqa",
    about = "FinQA: ablation study harness for conversational financial QA",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file to use instead of ~/.finqa/config.toml
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// List the experimental conditions
    Conditions,

    /// Run an ablation study
    Study(commands::study::StudyArgs),

    /// Interactive session over one dataset record
    Chat {
        /// Record id, e.g. `Single_JKHY/2009/page_28.pdf-3`
        record_id: String,

        /// Condition id to answer under (see `finqa conditions`)
        #[arg(short = 'k', long, default_value_t = 7)]
        condition: u8,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration (secrets redacted)
    Show,

    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Validate the configuration
    Validate,

    /// Print the config file path
    Path,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays clean for tables and answers
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Conditions => commands::conditions::run(config_path).await?,
        Commands::Study(args) => commands::study::run(config_path, args).await?,
        Commands::Chat {
            record_id,
            condition,
        } => commands::chat::run(config_path, &record_id, condition).await?,
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show(config_path).await?,
            ConfigAction::Init { force } => commands::config_cmd::init(config_path, force).await?,
            ConfigAction::Validate => commands::config_cmd::validate(config_path).await?,
            ConfigAction::Path => commands::config_cmd::path(config_path).await?,
        },
    }

    Ok(())
}
