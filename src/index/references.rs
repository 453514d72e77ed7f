use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::debug;

use super::ids::{next_id, IdSpace, ReferenceId, SymbolId};
use super::{symbols, ReferenceKind, ReferenceRecord};
use crate::error::{Error, Result};

/// Insert a reference occurrence. Never deduplicated: identical arguments
/// produce a new id every time.
pub fn insert(
    conn: &Connection,
    source: SymbolId,
    target: SymbolId,
    kind: ReferenceKind,
) -> Result<ReferenceId> {
    for id in [source, target] {
        if !symbols::exists(conn, id)? {
            return Err(Error::InvalidReference { what: "symbol", id: id.get() });
        }
    }

    let id = ReferenceId::from_raw(next_id(conn, IdSpace::Reference)?);
    conn.execute(
        "INSERT INTO symbol_references (id, source_symbol_id, target_symbol_id, kind)
         VALUES (?1, ?2, ?3, ?4)",
        params![id, source, target, kind],
    )?;

    debug!("Recorded {} reference {}: {} -> {}", kind.as_str(), id, source, target);

    Ok(id)
}

/// Flag a reference whose target could be one of several symbols
pub fn mark_ambiguous(conn: &Connection, id: ReferenceId) -> Result<()> {
    let updated = conn.execute(
        "UPDATE symbol_references SET ambiguous = 1 WHERE id = ?1",
        [id],
    )?;
    if updated == 0 {
        return Err(Error::NotFound { what: "reference", id: id.get() });
    }
    Ok(())
}

pub fn exists(conn: &Connection, id: ReferenceId) -> Result<bool> {
    let found = conn
        .query_row("SELECT 1 FROM symbol_references WHERE id = ?1", [id], |_| Ok(()))
        .optional()?;
    Ok(found.is_some())
}

pub fn get(conn: &Connection, id: ReferenceId) -> Result<Option<ReferenceRecord>> {
    let reference = conn
        .query_row(
            "SELECT id, source_symbol_id, target_symbol_id, kind, ambiguous
             FROM symbol_references WHERE id = ?1",
            [id],
            row_to_reference,
        )
        .optional()?;
    Ok(reference)
}

/// Find references from a symbol, in recording order
pub fn find_from(conn: &Connection, source: SymbolId) -> Result<Vec<ReferenceRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, source_symbol_id, target_symbol_id, kind, ambiguous
         FROM symbol_references WHERE source_symbol_id = ?1 ORDER BY id",
    )?;
    let references = stmt
        .query_map([source], row_to_reference)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(references)
}

/// Find references to a symbol, in recording order
pub fn find_to(conn: &Connection, target: SymbolId) -> Result<Vec<ReferenceRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, source_symbol_id, target_symbol_id, kind, ambiguous
         FROM symbol_references WHERE target_symbol_id = ?1 ORDER BY id",
    )?;
    let references = stmt
        .query_map([target], row_to_reference)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(references)
}

pub fn count(conn: &Connection) -> Result<usize> {
    let count: i64 =
        conn.query_row("SELECT COUNT(*) FROM symbol_references", [], |row| row.get(0))?;
    Ok(count as usize)
}

fn row_to_reference(row: &Row) -> rusqlite::Result<ReferenceRecord> {
    Ok(ReferenceRecord {
        id: row.get(0)?,
        source: row.get(1)?,
        target: row.get(2)?,
        kind: row.get(3)?,
        ambiguous: row.get(4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::name::{NameElement, NameHierarchy};
    use crate::index::schema::init_schema;
    use crate::index::symbols::SymbolTable;

    fn setup() -> (Connection, SymbolId, SymbolId) {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        let mut table = SymbolTable::new();
        let base = table
            .record(&conn, &NameHierarchy::new("::", vec![NameElement::named("BaseType")]))
            .unwrap();
        let class = table
            .record(&conn, &NameHierarchy::new("::", vec![NameElement::named("MyType")]))
            .unwrap();
        (conn, base, class)
    }

    #[test]
    fn test_insert_never_deduplicates() {
        let (conn, base, class) = setup();

        let first = insert(&conn, class, base, ReferenceKind::Inheritance).unwrap();
        let second = insert(&conn, class, base, ReferenceKind::Inheritance).unwrap();

        assert_eq!(first.get(), 1);
        assert_eq!(second.get(), 2);
        assert_eq!(count(&conn).unwrap(), 2);

        let stored = get(&conn, first).unwrap().unwrap();
        assert_eq!(stored.source, class);
        assert_eq!(stored.target, base);
        assert_eq!(stored.kind, ReferenceKind::Inheritance);
        assert!(!stored.ambiguous);
    }

    #[test]
    fn test_dangling_endpoints_are_rejected() {
        let (conn, base, _) = setup();
        let ghost = SymbolId::from_raw(77);

        let result = insert(&conn, ghost, base, ReferenceKind::Call);
        assert!(matches!(result, Err(Error::InvalidReference { what: "symbol", id: 77 })));
        let result = insert(&conn, base, ghost, ReferenceKind::Call);
        assert!(matches!(result, Err(Error::InvalidReference { .. })));

        assert_eq!(count(&conn).unwrap(), 0);
    }

    #[test]
    fn test_find_from_and_to() {
        let (conn, base, class) = setup();
        let inherit = insert(&conn, class, base, ReferenceKind::Inheritance).unwrap();
        let usage = insert(&conn, base, class, ReferenceKind::TypeUsage).unwrap();

        let from_class = find_from(&conn, class).unwrap();
        assert_eq!(from_class.len(), 1);
        assert_eq!(from_class[0].id, inherit);

        let to_class = find_to(&conn, class).unwrap();
        assert_eq!(to_class.len(), 1);
        assert_eq!(to_class[0].id, usage);
    }

    #[test]
    fn test_mark_ambiguous() {
        let (conn, base, class) = setup();
        let id = insert(&conn, class, base, ReferenceKind::Call).unwrap();

        mark_ambiguous(&conn, id).unwrap();
        assert!(get(&conn, id).unwrap().unwrap().ambiguous);

        let missing = mark_ambiguous(&conn, ReferenceId::from_raw(50));
        assert!(matches!(missing, Err(Error::NotFound { what: "reference", id: 50 })));
    }
}
