use rusqlite::{params, Connection, Row};
use tracing::debug;

use super::ids::{next_id, FileId, IdSpace};
use super::{files, Element, LocationKind, LocationRecord, SourceRange};
use crate::error::{Error, Result};

/// Attach a range to an element and return the location id.
///
/// Identical locations are stored as separate rows. The file must exist;
/// the element is checked by the caller, which knows its id space.
pub fn insert(conn: &Connection, element_id: i64, kind: LocationKind, range: &SourceRange) -> Result<i64> {
    if !files::exists(conn, range.file_id)? {
        return Err(Error::InvalidReference { what: "file", id: range.file_id.get() });
    }

    let id = next_id(conn, IdSpace::Location)?;
    conn.execute(
        "INSERT INTO source_locations (
            id, element_id, file_id, start_line, start_column, end_line, end_column, kind
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            id,
            element_id,
            range.file_id,
            range.start_line,
            range.start_column,
            range.end_line,
            range.end_column,
            kind,
        ],
    )?;

    debug!(
        "Recorded {} location for {}: {}:{}:{}-{}:{}",
        kind.as_str(),
        element_id,
        range.file_id,
        range.start_line,
        range.start_column,
        range.end_line,
        range.end_column
    );

    Ok(id)
}

/// All locations owned by `element`, in recording order
pub fn find_for(conn: &Connection, element: Element) -> Result<Vec<LocationRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, file_id, start_line, start_column, end_line, end_column, kind
         FROM source_locations WHERE element_id = ?1 ORDER BY id",
    )?;

    // Different id spaces share raw values, so keep only kinds this element can own.
    let locations = stmt
        .query_map([element.raw_id()], row_to_location)?
        .collect::<std::result::Result<Vec<_>, _>>()?
        .into_iter()
        .filter(|location| location.kind.owner() == element.space())
        .collect();

    Ok(locations)
}

/// Locations recorded in a file, ordered by position
pub fn find_in_file(conn: &Connection, file_id: FileId) -> Result<Vec<LocationRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, file_id, start_line, start_column, end_line, end_column, kind
         FROM source_locations WHERE file_id = ?1
         ORDER BY start_line, start_column, id",
    )?;
    let locations = stmt
        .query_map([file_id], row_to_location)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(locations)
}

pub fn count(conn: &Connection) -> Result<usize> {
    let count: i64 =
        conn.query_row("SELECT COUNT(*) FROM source_locations", [], |row| row.get(0))?;
    Ok(count as usize)
}

fn row_to_location(row: &Row) -> rusqlite::Result<LocationRecord> {
    Ok(LocationRecord {
        id: row.get(0)?,
        range: SourceRange {
            file_id: row.get(1)?,
            start_line: row.get(2)?,
            start_column: row.get(3)?,
            end_line: row.get(4)?,
            end_column: row.get(5)?,
        },
        kind: row.get(6)?,
    })
}
