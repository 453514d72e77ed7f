use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::path::Path;

use symdex::{DatabaseWriter, IndexStats};

use crate::OutputFormat;

#[derive(Serialize)]
struct StatsReport<'a> {
    database: &'a str,
    version: String,
    size_bytes: u64,
    #[serde(flatten)]
    stats: IndexStats,
}

pub fn show_stats(db_path: &Path, format: OutputFormat) -> Result<()> {
    if !db_path.exists() {
        bail!("{} does not exist", db_path.display());
    }

    // Read-only: a report must not create tables or switch the journal mode.
    let stats = DatabaseWriter::read_stats(db_path)
        .with_context(|| format!("Failed to read {}", db_path.display()))?;

    let size_bytes = std::fs::metadata(db_path)?.len();
    let database = db_path.to_string_lossy();

    match format {
        OutputFormat::Json => {
            let report = StatsReport {
                database: &database,
                version: DatabaseWriter::version_string(),
                size_bytes,
                stats,
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Text => {
            println!("symdex {}", DatabaseWriter::version_string());
            println!("Database: {}", database);
            println!("\n📊 Index Statistics:");
            println!("  Files: {}", stats.total_files);
            println!("  Symbols: {}", stats.total_symbols);
            println!("  References: {}", stats.total_references);
            println!("  Local symbols: {}", stats.total_local_symbols);
            println!("  Source locations: {}", stats.total_locations);
            println!("  Errors: {}", stats.total_errors);
            println!("  Size: {:.2} MB", size_bytes as f64 / (1024.0 * 1024.0));
        }
    }

    Ok(())
}
