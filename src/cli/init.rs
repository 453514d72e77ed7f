use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;

use symdex::{DatabaseWriter, WriterConfig};

pub fn init_database(db_path: &Path, config: &WriterConfig) -> Result<()> {
    let existed = db_path.exists();

    let db = DatabaseWriter::open_with_config(db_path, config)
        .with_context(|| format!("Failed to open {}", db_path.display()))?;
    let empty = db.is_empty()?;
    db.close()?;

    info!("Database ready at {}", db_path.display());

    if existed {
        println!("✓ {} is a valid database{}", db_path.display(), if empty { " (empty)" } else { "" });
    } else {
        println!("✓ Created {}", db_path.display());
    }
    println!("  Database version: {}", DatabaseWriter::supported_database_version());

    Ok(())
}
