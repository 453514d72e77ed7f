use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use super::cache::IdCache;
use super::ids::{next_id, IdSpace, SymbolId};
use super::name::{self, NameHierarchy};
use super::{DefinitionKind, SymbolKind, SymbolRecord};
use crate::error::{Error, Result};

/// Symbols keyed by their name hierarchy.
///
/// Lookups go through an in-memory cache keyed on the hierarchy itself; the
/// serialized key is only used for the persisted unique column.
#[derive(Debug, Default)]
pub struct SymbolTable {
    cache: IdCache<NameHierarchy, SymbolId>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the id of `name`, inserting a new symbol on first sight.
    pub fn record(&mut self, conn: &Connection, name: &NameHierarchy) -> Result<SymbolId> {
        if name.is_empty() {
            return Err(Error::InvalidArgument("symbol name has no elements".to_string()));
        }
        if let Some(id) = self.cache.get(name) {
            return Ok(id);
        }

        let key = name::serialize(name);
        let existing = conn
            .query_row(
                "SELECT id FROM symbols WHERE serialized_name = ?1",
                [&key],
                |row| row.get::<_, SymbolId>(0),
            )
            .optional()?;

        let id = match existing {
            Some(id) => id,
            None => {
                let id = SymbolId::from_raw(next_id(conn, IdSpace::Symbol)?);
                conn.execute(
                    "INSERT INTO symbols (id, serialized_name) VALUES (?1, ?2)",
                    params![id, key],
                )?;
                debug!("Recorded symbol {}: {}", id, name);
                id
            }
        };

        self.cache.stage(name.clone(), id);
        Ok(id)
    }

    pub fn set_kind(&self, conn: &Connection, id: SymbolId, kind: SymbolKind) -> Result<()> {
        let updated = conn.execute(
            "UPDATE symbols SET kind = ?2 WHERE id = ?1",
            params![id, kind],
        )?;
        if updated == 0 {
            return Err(Error::NotFound { what: "symbol", id: id.get() });
        }
        Ok(())
    }

    pub fn set_definition_kind(&self, conn: &Connection, id: SymbolId, kind: DefinitionKind) -> Result<()> {
        let updated = conn.execute(
            "UPDATE symbols SET definition_kind = ?2 WHERE id = ?1",
            params![id, kind],
        )?;
        if updated == 0 {
            return Err(Error::NotFound { what: "symbol", id: id.get() });
        }
        Ok(())
    }

    pub fn cache_mut(&mut self) -> &mut IdCache<NameHierarchy, SymbolId> {
        &mut self.cache
    }
}

pub fn exists(conn: &Connection, id: SymbolId) -> Result<bool> {
    let found = conn
        .query_row("SELECT 1 FROM symbols WHERE id = ?1", [id], |_| Ok(()))
        .optional()?;
    Ok(found.is_some())
}

/// Get symbol by ID
pub fn get(conn: &Connection, id: SymbolId) -> Result<Option<SymbolRecord>> {
    let row = conn
        .query_row(
            "SELECT id, serialized_name, kind, definition_kind FROM symbols WHERE id = ?1",
            [id],
            |row| {
                Ok((
                    row.get::<_, SymbolId>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<SymbolKind>>(2)?,
                    row.get::<_, DefinitionKind>(3)?,
                ))
            },
        )
        .optional()?;

    row.map(|(id, key, kind, definition_kind)| {
        Ok(SymbolRecord {
            id,
            name: name::deserialize(&key)?,
            kind,
            definition_kind,
        })
    })
    .transpose()
}

pub fn count(conn: &Connection) -> Result<usize> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM symbols", [], |row| row.get(0))?;
    Ok(count as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::name::NameElement;
    use crate::index::schema::init_schema;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn
    }

    fn api() -> NameHierarchy {
        NameHierarchy::new("::", vec![NameElement::named("api")])
    }

    #[test]
    fn test_record_is_idempotent() {
        let conn = setup();
        let mut table = SymbolTable::new();

        let first = table.record(&conn, &api()).unwrap();
        let second = table.record(&conn, &api()).unwrap();
        let class = table.record(&conn, &api().child(NameElement::named("MyType"))).unwrap();

        assert_eq!(first.get(), 1);
        assert_eq!(first, second);
        assert_eq!(class.get(), 2);
        assert_eq!(count(&conn).unwrap(), 2);
    }

    #[test]
    fn test_record_finds_rows_missing_from_cache() {
        let conn = setup();
        let id = SymbolTable::new().record(&conn, &api()).unwrap();

        // A fresh table has an empty cache and must fall back to the row.
        let mut table = SymbolTable::new();
        assert_eq!(table.record(&conn, &api()).unwrap(), id);
        assert_eq!(count(&conn).unwrap(), 1);
    }

    #[test]
    fn test_separator_is_part_of_identity() {
        let conn = setup();
        let mut table = SymbolTable::new();

        let cpp = table.record(&conn, &api()).unwrap();
        let java = table
            .record(&conn, &NameHierarchy::new(".", vec![NameElement::named("api")]))
            .unwrap();
        assert_ne!(cpp, java);
    }

    #[test]
    fn test_rejects_empty_name() {
        let conn = setup();
        let result = SymbolTable::new().record(&conn, &NameHierarchy::new("::", vec![]));
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_kinds_last_write_wins() {
        let conn = setup();
        let mut table = SymbolTable::new();
        let id = table.record(&conn, &api()).unwrap();

        let fresh = get(&conn, id).unwrap().unwrap();
        assert_eq!(fresh.kind, None);
        assert_eq!(fresh.definition_kind, DefinitionKind::Unknown);

        table.set_kind(&conn, id, SymbolKind::Class).unwrap();
        table.set_kind(&conn, id, SymbolKind::Namespace).unwrap();
        table.set_definition_kind(&conn, id, DefinitionKind::Implicit).unwrap();
        table.set_definition_kind(&conn, id, DefinitionKind::Explicit).unwrap();

        let symbol = get(&conn, id).unwrap().unwrap();
        assert_eq!(symbol.name, api());
        assert_eq!(symbol.kind, Some(SymbolKind::Namespace));
        assert_eq!(symbol.definition_kind, DefinitionKind::Explicit);
    }

    #[test]
    fn test_update_unknown_symbol() {
        let conn = setup();
        let table = SymbolTable::new();
        let missing = SymbolId::from_raw(42);

        assert!(matches!(
            table.set_kind(&conn, missing, SymbolKind::Class),
            Err(Error::NotFound { what: "symbol", id: 42 })
        ));
        assert!(matches!(
            table.set_definition_kind(&conn, missing, DefinitionKind::Explicit),
            Err(Error::NotFound { .. })
        ));
        assert!(!exists(&conn, missing).unwrap());
        assert!(get(&conn, missing).unwrap().is_none());
    }
}
