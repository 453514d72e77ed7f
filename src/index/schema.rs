use rusqlite::{Connection, OptionalExtension};
use tracing::{debug, info};

use super::ids::{reset_counters, seed_counters};
use crate::error::{Error, Result};

/// SQLite schema version this build reads and writes
pub const SCHEMA_VERSION: i64 = 25;

/// What an opened file contains, determined without writing to it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaState {
    /// No tables at all: a new or zero-length file
    Empty,
    /// Tables created by this schema version
    Current,
    /// Tables from another version (0 when no version table exists)
    Incompatible(i64),
}

/// Inspect the schema version stored in a database. Read-only.
pub fn inspect_schema(conn: &Connection) -> Result<SchemaState> {
    let table_count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'",
        [],
        |row| row.get(0),
    )?;
    if table_count == 0 {
        return Ok(SchemaState::Empty);
    }

    let has_version_table = conn
        .query_row(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = 'schema_version'",
            [],
            |row| row.get::<_, String>(0),
        )
        .optional()?
        .is_some();
    if !has_version_table {
        return Ok(SchemaState::Incompatible(0));
    }

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )?;

    debug!("Stored schema version: {}", version);

    if version == SCHEMA_VERSION {
        Ok(SchemaState::Current)
    } else {
        Ok(SchemaState::Incompatible(version))
    }
}

/// Initialize the database schema, or verify an existing one.
///
/// A file written by another schema version is refused and left untouched.
pub fn init_schema(conn: &Connection) -> Result<()> {
    match inspect_schema(conn)? {
        SchemaState::Empty => {
            info!("Initializing symbol index schema v{}", SCHEMA_VERSION);
            let tx = conn.unchecked_transaction()?;
            create_schema(&tx)?;
            tx.commit()?;
            Ok(())
        }
        SchemaState::Current => Ok(()),
        SchemaState::Incompatible(found) => Err(Error::SchemaVersionMismatch {
            found,
            supported: SCHEMA_VERSION,
        }),
    }
}

fn create_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        );

        CREATE TABLE id_counter (
            space TEXT PRIMARY KEY,
            last_id INTEGER NOT NULL
        );

        CREATE TABLE files (
            id INTEGER PRIMARY KEY,
            path TEXT NOT NULL UNIQUE,
            language TEXT
        );

        CREATE TABLE symbols (
            id INTEGER PRIMARY KEY,
            serialized_name TEXT NOT NULL UNIQUE,
            kind TEXT,
            definition_kind TEXT NOT NULL DEFAULT 'unknown'
        );

        CREATE TABLE symbol_references (
            id INTEGER PRIMARY KEY,
            source_symbol_id INTEGER NOT NULL REFERENCES symbols(id),
            target_symbol_id INTEGER NOT NULL REFERENCES symbols(id),
            kind TEXT NOT NULL,
            ambiguous INTEGER NOT NULL DEFAULT 0
        );

        CREATE INDEX idx_references_source ON symbol_references(source_symbol_id, kind);
        CREATE INDEX idx_references_target ON symbol_references(target_symbol_id, kind);

        CREATE TABLE local_symbols (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE
        );

        CREATE TABLE source_locations (
            id INTEGER PRIMARY KEY,
            element_id INTEGER NOT NULL,
            file_id INTEGER NOT NULL REFERENCES files(id),
            start_line INTEGER NOT NULL,
            start_column INTEGER NOT NULL,
            end_line INTEGER NOT NULL,
            end_column INTEGER NOT NULL,
            kind TEXT NOT NULL
        );

        CREATE INDEX idx_locations_element ON source_locations(element_id, kind);
        CREATE INDEX idx_locations_file ON source_locations(file_id);

        CREATE TABLE errors (
            id INTEGER PRIMARY KEY,
            message TEXT NOT NULL,
            fatal INTEGER NOT NULL
        );",
    )?;

    seed_counters(conn)?;

    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [SCHEMA_VERSION])?;

    info!("v{} schema created successfully", SCHEMA_VERSION);

    Ok(())
}

/// Delete every recorded row and restart all id spaces at 1.
/// The schema itself is kept.
pub fn clear_tables(conn: &Connection) -> Result<()> {
    info!("Clearing all index tables");

    conn.execute_batch(
        "DELETE FROM source_locations;
         DELETE FROM symbol_references;
         DELETE FROM errors;
         DELETE FROM local_symbols;
         DELETE FROM symbols;
         DELETE FROM files;",
    )?;
    reset_counters(conn)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_init_schema() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<rusqlite::Result<Vec<_>>>()
            .unwrap();

        for table in [
            "errors",
            "files",
            "id_counter",
            "local_symbols",
            "schema_version",
            "source_locations",
            "symbol_references",
            "symbols",
        ] {
            assert!(tables.contains(&table.to_string()), "missing table {table}");
        }
    }

    #[test]
    fn test_schema_version() {
        let conn = Connection::open_in_memory().unwrap();
        assert_eq!(inspect_schema(&conn).unwrap(), SchemaState::Empty);

        init_schema(&conn).unwrap();
        assert_eq!(inspect_schema(&conn).unwrap(), SchemaState::Current);
    }

    #[test]
    fn test_idempotent_init() {
        let conn = Connection::open_in_memory().unwrap();

        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_rejects_other_version() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE schema_version (version INTEGER PRIMARY KEY);
             INSERT INTO schema_version (version) VALUES (24);",
        )
        .unwrap();

        assert_eq!(inspect_schema(&conn).unwrap(), SchemaState::Incompatible(24));
        match init_schema(&conn) {
            Err(Error::SchemaVersionMismatch { found, supported }) => {
                assert_eq!(found, 24);
                assert_eq!(supported, SCHEMA_VERSION);
            }
            other => panic!("expected version mismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_rejects_foreign_database() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute("CREATE TABLE notes (body TEXT)", []).unwrap();

        assert_eq!(inspect_schema(&conn).unwrap(), SchemaState::Incompatible(0));
        assert!(init_schema(&conn).is_err());
    }

    #[test]
    fn test_clear_tables() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn.execute("INSERT INTO files (id, path) VALUES (1, '/a.cpp')", []).unwrap();
        conn.execute("UPDATE id_counter SET last_id = 1 WHERE space = 'file'", []).unwrap();

        clear_tables(&conn).unwrap();

        let files: i64 = conn
            .query_row("SELECT COUNT(*) FROM files", [], |row| row.get(0))
            .unwrap();
        assert_eq!(files, 0);
        assert_eq!(inspect_schema(&conn).unwrap(), SchemaState::Current);
    }
}
