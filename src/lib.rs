//! Persistent store for code-symbol indexes.
//!
//! An indexer drives a [`DatabaseWriter`]: it records files, symbols named by
//! a [`NameHierarchy`], references between symbols, local symbols, source
//! locations and indexing errors. Identical names and paths are deduplicated
//! to a single stable id, and bulk runs can be bracketed in one transaction.
//!
//! ```no_run
//! use symdex::{DatabaseWriter, NameElement, NameHierarchy, ReferenceKind, SourceRange, SymbolKind};
//!
//! # fn main() -> symdex::Result<()> {
//! let mut db = DatabaseWriter::open("project.srctrldb")?;
//! db.begin_transaction()?;
//!
//! let file = db.record_file("/src/main.cpp")?;
//! db.record_file_language(file, "cpp")?;
//!
//! let api = NameHierarchy::new("::", vec![NameElement::named("api")]);
//! let api_id = db.record_symbol(&api)?;
//! db.record_symbol_kind(api_id, SymbolKind::Namespace)?;
//!
//! let my_type = db.record_symbol(&api.child(NameElement::named("MyType")))?;
//! let reference = db.record_reference(my_type, api_id, ReferenceKind::Usage)?;
//! db.record_reference_location(reference, SourceRange::new(file, 4, 1, 4, 3))?;
//!
//! db.commit_transaction()?;
//! db.close()?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod index;

pub use config::{LoggingConfig, StorageConfig, WriterConfig, CONFIG_FILE_NAME};
pub use error::{Error, Result};
pub use index::db::{DatabaseWriter, SUPPORTED_DATABASE_VERSION};
pub use index::ids::{ErrorId, FileId, LocalSymbolId, ReferenceId, SymbolId};
pub use index::name::{NameElement, NameHierarchy};
pub use index::{
    DefinitionKind, Element, ErrorRecord, FileRecord, IndexStats, LocationKind, LocationRecord,
    ReferenceKind, ReferenceRecord, SourceRange, SymbolKind, SymbolRecord,
};
