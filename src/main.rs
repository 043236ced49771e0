mod cli;
mod server;
mod tools;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use slp::config::SlpConfig;
use slp::program::types::ProgramStatus;

#[derive(Parser)]
#[command(name = "slp", version, about = "Latent program cache MCP server for LLM hosts")]
struct Cli {
    /// Config file (defaults to ~/.slp/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum Transport {
    Stdio,
    Http,
}

#[derive(Clone, Copy, ValueEnum)]
enum StatusFilter {
    Experimental,
    Active,
    Retired,
}

impl From<StatusFilter> for ProgramStatus {
    fn from(s: StatusFilter) -> Self {
        match s {
            StatusFilter::Experimental => ProgramStatus::Experimental,
            StatusFilter::Active => ProgramStatus::Active,
            StatusFilter::Retired => ProgramStatus::Retired,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Start the MCP server
    Serve {
        /// Overrides `server.transport` from the config
        #[arg(long, value_enum)]
        transport: Option<Transport>,
    },
    /// Manage the embedding model
    Model {
        #[command(subcommand)]
        action: ModelAction,
    },
    /// Look up the cached program a query would match
    Lookup {
        query: String,
        #[arg(long)]
        profile: Option<String>,
    },
    /// Show program store statistics
    Stats,
    /// Show full details for one program
    Inspect { id: String },
    /// List programs, most recently updated first
    List {
        #[arg(long, value_enum)]
        status: Option<StatusFilter>,
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
    /// Promote, retire, decay, and evict programs
    Maintain {
        /// Report eviction candidates without deleting them
        #[arg(long)]
        dry_run: bool,
    },
    /// Export all programs as JSON to stdout
    Export,
    /// Import programs from an export file
    Import { file: PathBuf },
    /// Regenerate all query vectors with the configured embedding provider
    ReEmbed,
    /// Check database health
    Doctor,
}

#[derive(Subcommand)]
enum ModelAction {
    /// Download the embedding model to ~/.slp/models/
    Download,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => SlpConfig::load_from(path)?,
        None => SlpConfig::load()?,
    };

    // Log to stderr so stdout stays clean for MCP JSON-RPC.
    let filter = EnvFilter::try_new(&config.server.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Serve { transport } => {
            let transport = match transport {
                Some(t) => t,
                None if config.server.transport == "http" => Transport::Http,
                None => Transport::Stdio,
            };
            match transport {
                Transport::Stdio => server::serve_stdio(config).await?,
                Transport::Http => server::serve_http(config).await?,
            }
        }
        Command::Model { action } => match action {
            ModelAction::Download => cli::model_download(&config.embedding).await?,
        },
        Command::Lookup { query, profile } => cli::lookup::lookup(&config, &query, profile)?,
        Command::Stats => cli::stats::stats(&config)?,
        Command::Inspect { id } => cli::inspect::inspect(&config, &id)?,
        Command::List { status, limit } => {
            cli::list::list(&config, status.map(ProgramStatus::from), limit)?
        }
        Command::Maintain { dry_run } => cli::maintenance::maintain(&config, dry_run)?,
        Command::Export => cli::export::export(&config)?,
        Command::Import { file } => cli::import::import(&config, &file).await?,
        Command::ReEmbed => cli::re_embed::re_embed(&config).await?,
        Command::Doctor => cli::doctor::doctor(&config)?,
    }

    Ok(())
}
