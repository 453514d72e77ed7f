// Transaction state machine over a single SQLite connection

use rusqlite::Connection;
use tracing::{info, warn};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Active,
}

/// Tracks the explicit transaction bracketing a bulk recording run.
///
/// Nested transactions are not supported: `begin` while active is an error.
#[derive(Debug)]
pub struct TransactionManager {
    state: State,
}

impl TransactionManager {
    pub fn new() -> Self {
        Self { state: State::Idle }
    }

    pub fn is_active(&self) -> bool {
        self.state == State::Active
    }

    pub fn begin(&mut self, conn: &Connection) -> Result<()> {
        if self.is_active() {
            return Err(Error::TransactionState("a transaction is already active"));
        }
        conn.execute_batch("BEGIN IMMEDIATE")?;
        self.state = State::Active;
        info!("Transaction started");
        Ok(())
    }

    /// Commit the active transaction. If SQLite refuses the commit the
    /// transaction is rolled back and the manager returns to idle.
    pub fn commit(&mut self, conn: &Connection) -> Result<()> {
        if !self.is_active() {
            return Err(Error::TransactionState("no transaction to commit"));
        }
        self.state = State::Idle;

        if let Err(e) = conn.execute_batch("COMMIT") {
            warn!("Commit failed, rolling back: {}", e);
            if !conn.is_autocommit() {
                let _ = conn.execute_batch("ROLLBACK");
            }
            return Err(e.into());
        }

        info!("Transaction committed");
        Ok(())
    }

    pub fn rollback(&mut self, conn: &Connection) -> Result<()> {
        if !self.is_active() {
            return Err(Error::TransactionState("no transaction to roll back"));
        }
        self.state = State::Idle;
        conn.execute_batch("ROLLBACK")?;
        info!("Transaction rolled back");
        Ok(())
    }
}

impl Default for TransactionManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Run `op` as one atomic unit.
///
/// Uses a savepoint, so inside an explicit transaction a failing call leaves
/// no partial rows behind, and outside one the savepoint is the transaction.
pub fn atomically<T, F>(conn: &mut Connection, op: F) -> Result<T>
where
    F: FnOnce(&Connection) -> Result<T>,
{
    let savepoint = conn.savepoint()?;
    let value = op(&savepoint)?;
    savepoint.commit()?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute("CREATE TABLE t (v INTEGER NOT NULL)", []).unwrap();
        conn
    }

    fn count(conn: &Connection) -> i64 {
        conn.query_row("SELECT COUNT(*) FROM t", [], |row| row.get(0)).unwrap()
    }

    #[test]
    fn test_commit_and_rollback() {
        let conn = setup();
        let mut tx = TransactionManager::new();

        tx.begin(&conn).unwrap();
        conn.execute("INSERT INTO t VALUES (1)", []).unwrap();
        tx.commit(&conn).unwrap();

        tx.begin(&conn).unwrap();
        conn.execute("INSERT INTO t VALUES (2)", []).unwrap();
        tx.rollback(&conn).unwrap();

        assert_eq!(count(&conn), 1);
        assert!(!tx.is_active());
    }

    #[test]
    fn test_state_errors() {
        let conn = setup();
        let mut tx = TransactionManager::new();

        assert!(matches!(tx.commit(&conn), Err(Error::TransactionState(_))));
        assert!(matches!(tx.rollback(&conn), Err(Error::TransactionState(_))));

        tx.begin(&conn).unwrap();
        assert!(matches!(tx.begin(&conn), Err(Error::TransactionState(_))));
        assert!(tx.is_active());
        tx.commit(&conn).unwrap();
    }

    #[test]
    fn test_atomically_outside_transaction() {
        let mut conn = setup();

        atomically(&mut conn, |c| {
            c.execute("INSERT INTO t VALUES (1)", [])?;
            Ok(())
        })
        .unwrap();

        let failed: Result<()> = atomically(&mut conn, |c| {
            c.execute("INSERT INTO t VALUES (2)", [])?;
            c.execute("INSERT INTO t VALUES (NULL)", [])?;
            Ok(())
        });

        assert!(failed.is_err());
        assert_eq!(count(&conn), 1);
        assert!(conn.is_autocommit());
    }

    #[test]
    fn test_atomically_inside_transaction() {
        let mut conn = setup();
        let mut tx = TransactionManager::new();
        tx.begin(&conn).unwrap();

        atomically(&mut conn, |c| {
            c.execute("INSERT INTO t VALUES (1)", [])?;
            Ok(())
        })
        .unwrap();
        let failed: Result<()> = atomically(&mut conn, |c| {
            c.execute("INSERT INTO t VALUES (2)", [])?;
            c.execute("INSERT INTO t VALUES (NULL)", [])?;
            Ok(())
        });
        assert!(failed.is_err());

        // The failed call is undone but the transaction stays open.
        assert!(!conn.is_autocommit());
        tx.commit(&conn).unwrap();
        assert_eq!(count(&conn), 1);
    }
}
