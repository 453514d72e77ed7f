use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use symdex::{LoggingConfig, WriterConfig};

mod cli;

#[derive(Parser)]
#[command(name = "symdex")]
#[command(author = "Symdex Project Team")]
#[command(version)]
#[command(about = "Inspect and initialize code-symbol index databases", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to .symdex.toml in the current directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show library version and supported database version
    Info,

    /// Create a database, or verify an existing one can be opened
    Init {
        /// Database file
        db: PathBuf,
    },

    /// Show row counts of a database
    Stats {
        /// Database file
        db: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Check whether a database's schema version is supported
    Check {
        /// Database file
        db: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

fn load_config(path: Option<&PathBuf>) -> Result<WriterConfig> {
    match path {
        Some(path) => WriterConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => Ok(WriterConfig::from_dir(".")),
    }
}

fn init_logging(debug: bool, verbose: bool, logging: &LoggingConfig) {
    let level = if debug {
        "debug"
    } else if verbose {
        "info"
    } else {
        logging.level.as_str()
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    match logging.format.as_str() {
        "pretty" => builder.pretty().init(),
        "full" => builder.init(),
        _ => builder.compact().init(),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_ref())?;
    init_logging(cli.debug, cli.verbose, &config.logging);

    debug!("symdex {} starting", symdex::DatabaseWriter::version_string());

    match cli.command {
        Commands::Info => cli::info::show_info(),
        Commands::Init { db } => cli::init::init_database(&db, &config)?,
        Commands::Stats { db, format } => cli::stats::show_stats(&db, format)?,
        Commands::Check { db } => cli::check::check_database(&db)?,
    }

    Ok(())
}
