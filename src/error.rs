//! Error type shared by every index operation.

/// Failures surfaced by the index store.
///
/// Each record operation returns one of these instead of setting a global
/// error slot; the variant tells the caller which contract was broken.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The database file was written by an incompatible schema version.
    #[error("database schema version {found} is not supported (expected {supported})")]
    SchemaVersionMismatch {
        /// Version stored in the file (0 when the file has no version table).
        found: i64,
        /// Version this build reads and writes.
        supported: i64,
    },

    /// Failure reported by SQLite.
    #[error("storage: {0}")]
    Storage(#[from] rusqlite::Error),

    /// Failure reported by the filesystem.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// A foreign id (file, source or target symbol) was never recorded.
    #[error("invalid reference: {what} {id} does not exist")]
    InvalidReference {
        /// Kind of entity the id was expected to name.
        what: &'static str,
        /// The dangling id.
        id: i64,
    },

    /// An update targeted an id that was never recorded.
    #[error("{what} {id} not found")]
    NotFound {
        /// Kind of entity the id was expected to name.
        what: &'static str,
        /// The unknown id.
        id: i64,
    },

    /// Transaction call issued in the wrong state.
    #[error("transaction state: {0}")]
    TransactionState(&'static str),

    /// A persisted name key could not be decoded.
    #[error("malformed name key: {0}")]
    MalformedName(String),

    /// Caller passed a value the store refuses to record.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Configuration could not be loaded or failed validation.
    #[error("config: {0}")]
    Config(String),
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;
