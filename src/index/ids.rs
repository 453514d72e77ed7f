// Typed identifiers and the persisted id allocator

use rusqlite::types::{FromSql, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Result;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Wrap a raw id, e.g. one read back from another tool.
            pub fn from_raw(raw: i64) -> Self {
                Self(raw)
            }

            pub fn get(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.0))
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                i64::column_result(value).map(Self)
            }
        }
    };
}

define_id!(
    /// Id of a recorded source file
    FileId
);
define_id!(
    /// Id of a recorded symbol
    SymbolId
);
define_id!(
    /// Id of a single reference occurrence
    ReferenceId
);
define_id!(
    /// Id of a local symbol (parameter, local variable)
    LocalSymbolId
);
define_id!(
    /// Id of a recorded indexing error
    ErrorId
);

/// Independent id spaces, each backed by one counter row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdSpace {
    File,
    Symbol,
    Reference,
    LocalSymbol,
    Error,
    Location,
}

impl IdSpace {
    pub const ALL: [IdSpace; 6] = [
        IdSpace::File,
        IdSpace::Symbol,
        IdSpace::Reference,
        IdSpace::LocalSymbol,
        IdSpace::Error,
        IdSpace::Location,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IdSpace::File => "file",
            IdSpace::Symbol => "symbol",
            IdSpace::Reference => "reference",
            IdSpace::LocalSymbol => "local_symbol",
            IdSpace::Error => "error",
            IdSpace::Location => "location",
        }
    }
}

/// Create the counter rows. Existing counters are left untouched.
pub fn seed_counters(conn: &Connection) -> Result<()> {
    for space in IdSpace::ALL {
        conn.execute(
            "INSERT OR IGNORE INTO id_counter (space, last_id) VALUES (?1, 0)",
            [space.as_str()],
        )?;
    }
    Ok(())
}

/// Reset every counter so the next id in each space is 1 again.
pub fn reset_counters(conn: &Connection) -> Result<()> {
    conn.execute("UPDATE id_counter SET last_id = 0", [])?;
    Ok(())
}

/// Advance the counter for `space` and return the new id.
///
/// Runs inside the caller's transaction, so a rollback also rewinds the
/// counter.
pub fn next_id(conn: &Connection, space: IdSpace) -> Result<i64> {
    let id = conn.query_row(
        "UPDATE id_counter SET last_id = last_id + 1 WHERE space = ?1 RETURNING last_id",
        params![space.as_str()],
        |row| row.get(0),
    )?;
    Ok(id)
}

/// Highest id issued so far in `space`.
pub fn last_id(conn: &Connection, space: IdSpace) -> Result<i64> {
    let id = conn.query_row(
        "SELECT last_id FROM id_counter WHERE space = ?1",
        params![space.as_str()],
        |row| row.get(0),
    )?;
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::schema::init_schema;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn
    }

    #[test]
    fn test_ids_increase_per_space() {
        let conn = setup();

        assert_eq!(next_id(&conn, IdSpace::Symbol).unwrap(), 1);
        assert_eq!(next_id(&conn, IdSpace::Symbol).unwrap(), 2);
        assert_eq!(next_id(&conn, IdSpace::File).unwrap(), 1);
        assert_eq!(next_id(&conn, IdSpace::Symbol).unwrap(), 3);
        assert_eq!(last_id(&conn, IdSpace::Symbol).unwrap(), 3);
        assert_eq!(last_id(&conn, IdSpace::Reference).unwrap(), 0);
    }

    #[test]
    fn test_counter_rolls_back_with_transaction() {
        let mut conn = setup();
        next_id(&conn, IdSpace::Symbol).unwrap();

        {
            let tx = conn.transaction().unwrap();
            assert_eq!(next_id(&tx, IdSpace::Symbol).unwrap(), 2);
            tx.rollback().unwrap();
        }

        assert_eq!(next_id(&conn, IdSpace::Symbol).unwrap(), 2);
    }

    #[test]
    fn test_reset_counters() {
        let conn = setup();
        next_id(&conn, IdSpace::Error).unwrap();
        next_id(&conn, IdSpace::Error).unwrap();

        reset_counters(&conn).unwrap();
        assert_eq!(next_id(&conn, IdSpace::Error).unwrap(), 1);
    }

    #[test]
    fn test_seed_is_idempotent() {
        let conn = setup();
        next_id(&conn, IdSpace::File).unwrap();

        seed_counters(&conn).unwrap();
        assert_eq!(last_id(&conn, IdSpace::File).unwrap(), 1);
    }
}
