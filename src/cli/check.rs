use anyhow::{bail, Context, Result};
use std::path::Path;

use symdex::{DatabaseWriter, SUPPORTED_DATABASE_VERSION};

/// Report whether the file can be opened by this build. The file is only read.
pub fn check_database(db_path: &Path) -> Result<()> {
    if !db_path.exists() {
        bail!("{} does not exist", db_path.display());
    }

    let stored = DatabaseWriter::stored_schema_version(db_path)
        .with_context(|| format!("Failed to read {}", db_path.display()))?;

    match stored {
        None => {
            println!("{}: no schema yet, will be initialized on first open", db_path.display());
        }
        Some(version) if version == SUPPORTED_DATABASE_VERSION => {
            println!("{}: database version {} is supported", db_path.display(), version);
        }
        Some(version) => {
            bail!(
                "{}: database version {} is not supported (expected {})",
                db_path.display(),
                version,
                SUPPORTED_DATABASE_VERSION
            );
        }
    }

    Ok(())
}
