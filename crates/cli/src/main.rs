//! Campus CLI
//!
//! Main entry point for the campus command-line tool.
//! Builds per-document retrieval indexes and queries them.

mod commands;

use campus_core::{config::AppConfig, logging, AppResult, StoreBackend};
use clap::{Parser, Subcommand};
use commands::{
    BuildCommand, ChunksCommand, ContextCommand, DeleteCommand, ListCommand, QueryCommand,
    SectionsCommand, StatsCommand,
};
use std::path::PathBuf;

/// Campus CLI - per-document retrieval over course material
#[derive(Parser, Debug)]
#[command(name = "campus")]
#[command(about = "Per-document retrieval over course material", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "CAMPUS_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "CAMPUS_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    /// Index store backend (fs, sqlite)
    #[arg(long, global = true, env = "CAMPUS_STORE")]
    store: Option<StoreBackend>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build (or rebuild) document indexes
    Build(BuildCommand),

    /// Rank a document's chunks against a question
    Query(QueryCommand),

    /// Print retrieved chunks as a prompt context block
    Context(ContextCommand),

    /// Show how a file would be chunked
    Chunks(ChunksCommand),

    /// Detect headings in a file, or print selected sections
    Sections(SectionsCommand),

    /// Discard a document's index
    Delete(DeleteCommand),

    /// Show statistics for a document index
    Stats(StatsCommand),

    /// List indexed documents
    List(ListCommand),
}

#[tokio::main]
async fn main() -> AppResult<()> {
    // Parse command-line arguments first (needed for logging config)
    let cli = Cli::parse();

    // Load base configuration from the config file and environment
    let config = AppConfig::load_from(cli.workspace.clone(), cli.config.clone())?;

    // Apply CLI overrides
    let config = config.with_overrides(
        cli.workspace,
        cli.config,
        cli.store,
        cli.log_level,
        cli.verbose,
        cli.no_color,
    );

    // Initialize logging with final configuration
    logging::init_logging(config.log_level.as_deref(), config.no_color)?;

    tracing::info!("Campus CLI starting");
    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!("Store: {}", config.store);

    config.validate()?;
    config.ensure_campus_dir()?;

    let command_name = match &cli.command {
        Commands::Build(_) => "build",
        Commands::Query(_) => "query",
        Commands::Context(_) => "context",
        Commands::Chunks(_) => "chunks",
        Commands::Sections(_) => "sections",
        Commands::Delete(_) => "delete",
        Commands::Stats(_) => "stats",
        Commands::List(_) => "list",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    // Route to command handlers
    let result = match cli.command {
        Commands::Build(cmd) => cmd.execute(&config).await,
        Commands::Query(cmd) => cmd.execute(&config).await,
        Commands::Context(cmd) => cmd.execute(&config).await,
        Commands::Chunks(cmd) => cmd.execute(&config).await,
        Commands::Sections(cmd) => cmd.execute(&config).await,
        Commands::Delete(cmd) => cmd.execute(&config).await,
        Commands::Stats(cmd) => cmd.execute(&config).await,
        Commands::List(cmd) => cmd.execute(&config).await,
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result
}
