use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use super::cache::IdCache;
use super::ids::{next_id, IdSpace, LocalSymbolId};
use crate::error::Result;

/// Local symbols keyed by name alone.
///
/// Two locals with the same name in different functions share one id; the
/// occurrences are told apart only by their locations.
#[derive(Debug, Default)]
pub struct LocalSymbolTable {
    cache: IdCache<String, LocalSymbolId>,
}

impl LocalSymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, conn: &Connection, name: &str) -> Result<LocalSymbolId> {
        if let Some(id) = self.cache.get(name) {
            return Ok(id);
        }

        let existing = conn
            .query_row("SELECT id FROM local_symbols WHERE name = ?1", [name], |row| {
                row.get::<_, LocalSymbolId>(0)
            })
            .optional()?;

        let id = match existing {
            Some(id) => id,
            None => {
                let id = LocalSymbolId::from_raw(next_id(conn, IdSpace::LocalSymbol)?);
                conn.execute(
                    "INSERT INTO local_symbols (id, name) VALUES (?1, ?2)",
                    params![id, name],
                )?;
                debug!("Recorded local symbol {}: {}", id, name);
                id
            }
        };

        self.cache.stage(name.to_string(), id);
        Ok(id)
    }

    pub fn cache_mut(&mut self) -> &mut IdCache<String, LocalSymbolId> {
        &mut self.cache
    }
}

pub fn exists(conn: &Connection, id: LocalSymbolId) -> Result<bool> {
    let found = conn
        .query_row("SELECT 1 FROM local_symbols WHERE id = ?1", [id], |_| Ok(()))
        .optional()?;
    Ok(found.is_some())
}

pub fn name(conn: &Connection, id: LocalSymbolId) -> Result<Option<String>> {
    let name = conn
        .query_row("SELECT name FROM local_symbols WHERE id = ?1", [id], |row| row.get(0))
        .optional()?;
    Ok(name)
}

pub fn count(conn: &Connection) -> Result<usize> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM local_symbols", [], |row| row.get(0))?;
    Ok(count as usize)
}
