use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use super::ids::{next_id, ErrorId, IdSpace};
use super::{ErrorRecord, SourceRange};
use crate::error::Result;

/// Append an indexing error. Errors are never deduplicated.
pub fn insert(conn: &Connection, message: &str, fatal: bool) -> Result<ErrorId> {
    let id = ErrorId::from_raw(next_id(conn, IdSpace::Error)?);
    conn.execute(
        "INSERT INTO errors (id, message, fatal) VALUES (?1, ?2, ?3)",
        params![id, message, fatal],
    )?;

    debug!("Recorded {} error {}: {}", if fatal { "fatal" } else { "non-fatal" }, id, message);

    Ok(id)
}

pub fn exists(conn: &Connection, id: ErrorId) -> Result<bool> {
    let found = conn
        .query_row("SELECT 1 FROM errors WHERE id = ?1", [id], |_| Ok(()))
        .optional()?;
    Ok(found.is_some())
}

/// All errors in recording order, each with its first location
pub fn all(conn: &Connection) -> Result<Vec<ErrorRecord>> {
    let mut stmt = conn.prepare(
        "SELECT e.id, e.message, e.fatal,
                l.file_id, l.start_line, l.start_column, l.end_line, l.end_column
         FROM errors e
         LEFT JOIN source_locations l ON l.id = (
             SELECT MIN(id) FROM source_locations
             WHERE element_id = e.id AND kind = 'error'
         )
         ORDER BY e.id",
    )?;

    let errors = stmt
        .query_map([], |row| {
            let range = match row.get(3)? {
                Some(file_id) => Some(SourceRange {
                    file_id,
                    start_line: row.get(4)?,
                    start_column: row.get(5)?,
                    end_line: row.get(6)?,
                    end_column: row.get(7)?,
                }),
                None => None,
            };
            Ok(ErrorRecord {
                id: row.get(0)?,
                message: row.get(1)?,
                fatal: row.get(2)?,
                range,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(errors)
}

pub fn count(conn: &Connection) -> Result<usize> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM errors", [], |row| row.get(0))?;
    Ok(count as usize)
}
