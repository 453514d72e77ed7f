use rusqlite::{Connection, OpenFlags};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::files::FileTable;
use super::ids::{ErrorId, FileId, LocalSymbolId, ReferenceId, SymbolId};
use super::local_symbols::LocalSymbolTable;
use super::name::{NameElement, NameHierarchy};
use super::schema::{clear_tables, init_schema, inspect_schema, SchemaState, SCHEMA_VERSION};
use super::symbols::SymbolTable;
use super::transaction::{atomically, TransactionManager};
use super::{
    errors, files, local_symbols, locations, references, symbols, DefinitionKind, Element,
    ErrorRecord, FileRecord, IndexStats, LocationKind, LocationRecord, ReferenceKind,
    ReferenceRecord, SourceRange, SymbolKind, SymbolRecord,
};
use crate::config::{StorageConfig, WriterConfig};
use crate::error::{Error, Result};

/// Schema version written by this build
pub const SUPPORTED_DATABASE_VERSION: i64 = SCHEMA_VERSION;

/// Name shared by every target of an unresolved reference
const UNSOLVED_SYMBOL_NAME: &str = "unsolved symbol";

/// The dedup tables and their caches
#[derive(Debug, Default)]
struct Tables {
    symbols: SymbolTable,
    files: FileTable,
    locals: LocalSymbolTable,
}

struct Checkpoint {
    symbols: usize,
    files: usize,
    locals: usize,
}

impl Tables {
    fn checkpoint(&mut self) -> Checkpoint {
        Checkpoint {
            symbols: self.symbols.cache_mut().checkpoint(),
            files: self.files.cache_mut().checkpoint(),
            locals: self.locals.cache_mut().checkpoint(),
        }
    }

    fn rewind(&mut self, checkpoint: &Checkpoint) {
        self.symbols.cache_mut().rewind(checkpoint.symbols);
        self.files.cache_mut().rewind(checkpoint.files);
        self.locals.cache_mut().rewind(checkpoint.locals);
    }

    fn commit(&mut self) {
        self.symbols.cache_mut().commit();
        self.files.cache_mut().commit();
        self.locals.cache_mut().commit();
    }

    fn discard(&mut self) {
        self.symbols.cache_mut().discard();
        self.files.cache_mut().discard();
        self.locals.cache_mut().discard();
    }

    fn clear(&mut self) {
        self.symbols.cache_mut().clear();
        self.files.cache_mut().clear();
        self.locals.cache_mut().clear();
    }
}

/// Writer handle for one symbol database.
///
/// Owns a single SQLite connection and the in-memory dedup caches. One
/// writer per database at a time; the handle is not meant to be shared
/// across threads. Every record call is atomic on its own; wrap bulk runs in
/// [`begin_transaction`](Self::begin_transaction) /
/// [`commit_transaction`](Self::commit_transaction) for speed and
/// all-or-nothing visibility.
///
/// Dropping the writer closes the connection, which rolls back any
/// transaction that was not committed.
pub struct DatabaseWriter {
    conn: Connection,
    db_path: Option<PathBuf>,
    transaction: TransactionManager,
    tables: Tables,
    last_error: Option<String>,
}

impl DatabaseWriter {
    /// Create or open a database with the default configuration
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_config(db_path, &WriterConfig::default())
    }

    /// Create or open a database.
    ///
    /// A new file gets the current schema. An existing file written by a
    /// different schema version is refused without being modified.
    pub fn open_with_config(db_path: impl AsRef<Path>, config: &WriterConfig) -> Result<Self> {
        config.validate()?;
        let db_path = db_path.as_ref().to_path_buf();

        info!("Opening database at: {}", db_path.display());

        if config.storage.create_parent_dirs {
            if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(&db_path)?;
        Self::from_connection(conn, Some(db_path), &config.storage)
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn, None, &StorageConfig::default())
    }

    fn from_connection(conn: Connection, db_path: Option<PathBuf>, storage: &StorageConfig) -> Result<Self> {
        // Checked before any pragma so a refused file is left untouched.
        if let SchemaState::Incompatible(found) = inspect_schema(&conn)? {
            return Err(Error::SchemaVersionMismatch {
                found,
                supported: SUPPORTED_DATABASE_VERSION,
            });
        }

        apply_pragmas(&conn, storage)?;
        init_schema(&conn)?;

        Ok(Self {
            conn,
            db_path,
            transaction: TransactionManager::new(),
            tables: Tables::default(),
            last_error: None,
        })
    }

    /// Close the database. An open transaction is rolled back.
    pub fn close(mut self) -> Result<()> {
        if self.transaction.is_active() {
            warn!("Closing database with an open transaction, rolling back");
            self.transaction.rollback(&self.conn)?;
        }

        let Self { conn, db_path, .. } = self;
        conn.close().map_err(|(_, e)| Error::from(e))?;

        if let Some(path) = db_path {
            info!("Closed database at: {}", path.display());
        }
        Ok(())
    }

    /// Read the schema version of an existing file without opening it for
    /// writing. `None` means the file holds no tables yet.
    pub fn stored_schema_version(db_path: impl AsRef<Path>) -> Result<Option<i64>> {
        let conn = Connection::open_with_flags(db_path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        let version = match inspect_schema(&conn)? {
            SchemaState::Empty => None,
            SchemaState::Current => Some(SCHEMA_VERSION),
            SchemaState::Incompatible(found) => Some(found),
        };
        Ok(version)
    }

    pub fn version_string() -> String {
        format!("v{}.db{}", env!("CARGO_PKG_VERSION"), SUPPORTED_DATABASE_VERSION)
    }

    pub fn supported_database_version() -> i64 {
        SUPPORTED_DATABASE_VERSION
    }

    /// Path of the database file, `None` for in-memory databases
    pub fn path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Message of the most recent failed record or transaction call;
    /// cleared by the next successful one. Reads leave it alone. The
    /// failing call itself also returns the error.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn is_in_transaction(&self) -> bool {
        self.transaction.is_active()
    }

    // ========== Transactions ==========

    /// Start an explicit transaction. Fails if one is already active.
    pub fn begin_transaction(&mut self) -> Result<()> {
        let result = self.transaction.begin(&self.conn);
        self.track(result)
    }

    /// Make every call since `begin_transaction` durable and visible.
    pub fn commit_transaction(&mut self) -> Result<()> {
        let result = self.transaction.commit(&self.conn);
        match result {
            Ok(()) => self.tables.commit(),
            Err(_) => self.tables.discard(),
        }
        self.track(result)
    }

    /// Undo every call since `begin_transaction`, including id allocation.
    pub fn rollback_transaction(&mut self) -> Result<()> {
        let result = self.transaction.rollback(&self.conn);
        self.tables.discard();
        self.track(result)
    }

    // ========== Files ==========

    /// Record a file by path. Paths are normalized lexically and
    /// deduplicated, so recording the same path again returns the same id.
    pub fn record_file(&mut self, path: impl AsRef<Path>) -> Result<FileId> {
        let path = path.as_ref();
        self.atomic(|conn, tables| tables.files.record(conn, path))
    }

    /// Set the file's language tag, replacing any previous one
    pub fn record_file_language(&mut self, file_id: FileId, language: &str) -> Result<()> {
        self.atomic(|conn, tables| tables.files.set_language(conn, file_id, language))
    }

    // ========== Symbols ==========

    /// Return the id for `name`, creating the symbol on first sight
    pub fn record_symbol(&mut self, name: &NameHierarchy) -> Result<SymbolId> {
        self.atomic(|conn, tables| tables.symbols.record(conn, name))
    }

    pub fn record_symbol_kind(&mut self, symbol_id: SymbolId, kind: SymbolKind) -> Result<()> {
        self.atomic(|conn, tables| tables.symbols.set_kind(conn, symbol_id, kind))
    }

    pub fn record_symbol_definition_kind(&mut self, symbol_id: SymbolId, kind: DefinitionKind) -> Result<()> {
        self.atomic(|conn, tables| tables.symbols.set_definition_kind(conn, symbol_id, kind))
    }

    pub fn record_symbol_location(&mut self, symbol_id: SymbolId, range: SourceRange) -> Result<()> {
        self.record_symbol_range(symbol_id, LocationKind::Symbol, range)
    }

    pub fn record_symbol_scope_location(&mut self, symbol_id: SymbolId, range: SourceRange) -> Result<()> {
        self.record_symbol_range(symbol_id, LocationKind::Scope, range)
    }

    pub fn record_symbol_signature_location(&mut self, symbol_id: SymbolId, range: SourceRange) -> Result<()> {
        self.record_symbol_range(symbol_id, LocationKind::Signature, range)
    }

    pub fn record_qualifier_location(&mut self, symbol_id: SymbolId, range: SourceRange) -> Result<()> {
        self.record_symbol_range(symbol_id, LocationKind::Qualifier, range)
    }

    fn record_symbol_range(&mut self, symbol_id: SymbolId, kind: LocationKind, range: SourceRange) -> Result<()> {
        self.atomic(|conn, _| {
            if !symbols::exists(conn, symbol_id)? {
                return Err(Error::NotFound { what: "symbol", id: symbol_id.get() });
            }
            locations::insert(conn, symbol_id.get(), kind, &range)?;
            Ok(())
        })
    }

    // ========== References ==========

    /// Record one reference occurrence from `source` to `target`
    pub fn record_reference(&mut self, source: SymbolId, target: SymbolId, kind: ReferenceKind) -> Result<ReferenceId> {
        self.atomic(|conn, _| references::insert(conn, source, target, kind))
    }

    pub fn record_reference_location(&mut self, reference_id: ReferenceId, range: SourceRange) -> Result<()> {
        self.atomic(|conn, _| {
            if !references::exists(conn, reference_id)? {
                return Err(Error::NotFound { what: "reference", id: reference_id.get() });
            }
            locations::insert(conn, reference_id.get(), LocationKind::Reference, &range)?;
            Ok(())
        })
    }

    pub fn record_reference_is_ambiguous(&mut self, reference_id: ReferenceId) -> Result<()> {
        self.atomic(|conn, _| references::mark_ambiguous(conn, reference_id))
    }

    /// Record a reference from `context` whose target could not be resolved
    pub fn record_reference_to_unsolved_symbol(
        &mut self,
        context: SymbolId,
        kind: ReferenceKind,
        range: SourceRange,
    ) -> Result<ReferenceId> {
        let unsolved = NameHierarchy::new("", vec![NameElement::named(UNSOLVED_SYMBOL_NAME)]);
        self.atomic(|conn, tables| {
            let target = tables.symbols.record(conn, &unsolved)?;
            let reference_id = references::insert(conn, context, target, kind)?;
            locations::insert(conn, reference_id.get(), LocationKind::Unsolved, &range)?;
            Ok(reference_id)
        })
    }

    // ========== Local symbols ==========

    pub fn record_local_symbol(&mut self, name: &str) -> Result<LocalSymbolId> {
        self.atomic(|conn, tables| tables.locals.record(conn, name))
    }

    /// Record one occurrence of a local symbol
    pub fn record_local_symbol_location(&mut self, local_id: LocalSymbolId, range: SourceRange) -> Result<()> {
        self.atomic(|conn, _| {
            if !local_symbols::exists(conn, local_id)? {
                return Err(Error::NotFound { what: "local symbol", id: local_id.get() });
            }
            locations::insert(conn, local_id.get(), LocationKind::LocalSymbol, &range)?;
            Ok(())
        })
    }

    // ========== File-owned ranges ==========

    pub fn record_comment_location(&mut self, range: SourceRange) -> Result<()> {
        self.atomic(|conn, _| {
            locations::insert(conn, range.file_id.get(), LocationKind::Comment, &range)?;
            Ok(())
        })
    }

    /// Record a range that consumers must treat as one unit
    pub fn record_atomic_source_range(&mut self, range: SourceRange) -> Result<()> {
        self.atomic(|conn, _| {
            locations::insert(conn, range.file_id.get(), LocationKind::AtomicRange, &range)?;
            Ok(())
        })
    }

    // ========== Errors ==========

    pub fn record_error(&mut self, message: &str, fatal: bool, range: SourceRange) -> Result<ErrorId> {
        self.atomic(|conn, _| {
            let error_id = errors::insert(conn, message, fatal)?;
            locations::insert(conn, error_id.get(), LocationKind::Error, &range)?;
            Ok(error_id)
        })
    }

    // ========== Maintenance ==========

    /// Delete all recorded data and restart every id space at 1
    pub fn clear(&mut self) -> Result<()> {
        if self.transaction.is_active() {
            let result = Err(Error::TransactionState("cannot clear during a transaction"));
            return self.track(result);
        }
        self.atomic(|conn, _| clear_tables(conn))?;
        self.tables.clear();
        Ok(())
    }

    /// True when no file, symbol or local symbol has been recorded
    pub fn is_empty(&self) -> Result<bool> {
        Ok(files::count(&self.conn)? == 0
            && symbols::count(&self.conn)? == 0
            && local_symbols::count(&self.conn)? == 0)
    }

    /// Get index statistics
    pub fn stats(&self) -> Result<IndexStats> {
        collect_stats(&self.conn)
    }

    /// Get statistics of an existing database through a read-only
    /// connection. The file is not modified, not even its journal mode.
    pub fn read_stats(db_path: impl AsRef<Path>) -> Result<IndexStats> {
        let db_path = db_path.as_ref();
        let conn = Connection::open_with_flags(db_path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        match inspect_schema(&conn)? {
            SchemaState::Current => collect_stats(&conn),
            SchemaState::Empty => Err(Error::InvalidArgument(format!(
                "{} holds no symbol database",
                db_path.display()
            ))),
            SchemaState::Incompatible(found) => Err(Error::SchemaVersionMismatch {
                found,
                supported: SUPPORTED_DATABASE_VERSION,
            }),
        }
    }

    // ========== Reads ==========

    pub fn symbol(&self, symbol_id: SymbolId) -> Result<Option<SymbolRecord>> {
        symbols::get(&self.conn, symbol_id)
    }

    pub fn file(&self, file_id: FileId) -> Result<Option<FileRecord>> {
        files::get(&self.conn, file_id)
    }

    pub fn reference(&self, reference_id: ReferenceId) -> Result<Option<ReferenceRecord>> {
        references::get(&self.conn, reference_id)
    }

    pub fn references_from(&self, source: SymbolId) -> Result<Vec<ReferenceRecord>> {
        references::find_from(&self.conn, source)
    }

    pub fn references_to(&self, target: SymbolId) -> Result<Vec<ReferenceRecord>> {
        references::find_to(&self.conn, target)
    }

    pub fn local_symbol_name(&self, local_id: LocalSymbolId) -> Result<Option<String>> {
        local_symbols::name(&self.conn, local_id)
    }

    pub fn locations_of(&self, element: Element) -> Result<Vec<LocationRecord>> {
        locations::find_for(&self.conn, element)
    }

    pub fn locations_in_file(&self, file_id: FileId) -> Result<Vec<LocationRecord>> {
        locations::find_in_file(&self.conn, file_id)
    }

    pub fn errors(&self) -> Result<Vec<ErrorRecord>> {
        errors::all(&self.conn)
    }

    /// Run one record operation atomically and keep the caches in step
    /// with what the database actually holds.
    fn atomic<T, F>(&mut self, op: F) -> Result<T>
    where
        F: FnOnce(&Connection, &mut Tables) -> Result<T>,
    {
        let checkpoint = self.tables.checkpoint();
        let tables = &mut self.tables;
        let result = atomically(&mut self.conn, |conn| op(conn, tables));

        match &result {
            Ok(_) if !self.transaction.is_active() => self.tables.commit(),
            Ok(_) => {}
            Err(_) => self.tables.rewind(&checkpoint),
        }
        self.track(result)
    }

    fn track<T>(&mut self, result: Result<T>) -> Result<T> {
        match &result {
            Ok(_) => self.last_error = None,
            Err(e) => {
                debug!("Operation failed: {}", e);
                self.last_error = Some(e.to_string());
            }
        }
        result
    }
}

fn collect_stats(conn: &Connection) -> Result<IndexStats> {
    Ok(IndexStats {
        total_files: files::count(conn)?,
        total_symbols: symbols::count(conn)?,
        total_references: references::count(conn)?,
        total_local_symbols: local_symbols::count(conn)?,
        total_locations: locations::count(conn)?,
        total_errors: errors::count(conn)?,
    })
}

fn apply_pragmas(conn: &Connection, storage: &StorageConfig) -> Result<()> {
    let journal_mode: String = conn.pragma_update_and_check(
        None,
        "journal_mode",
        &storage.journal_mode,
        |row| row.get(0),
    )?;
    debug!("Journal mode: {}", journal_mode);

    conn.pragma_update(None, "synchronous", &storage.synchronous)?;
    conn.pragma_update(None, "foreign_keys", true)?;
    conn.busy_timeout(Duration::from_millis(storage.busy_timeout_ms))?;
    Ok(())
}
