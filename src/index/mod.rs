// Index storage: data model, tables and the writer facade

pub mod cache;
pub mod db;
pub mod errors;
pub mod files;
pub mod ids;
pub mod local_symbols;
pub mod locations;
pub mod name;
pub mod references;
pub mod schema;
pub mod symbols;
pub mod transaction;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::Error;
use ids::{ErrorId, FileId, IdSpace, LocalSymbolId, ReferenceId, SymbolId};
use name::NameHierarchy;

/// Symbol kinds
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Type,
    BuiltinType,
    Module,
    Namespace,
    Package,
    Struct,
    Class,
    Interface,
    Annotation,
    GlobalVariable,
    Field,
    Function,
    Method,
    Enum,
    EnumConstant,
    Typedef,
    TypeParameter,
    Macro,
    Union,
}

impl SymbolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolKind::Type => "type",
            SymbolKind::BuiltinType => "builtin_type",
            SymbolKind::Module => "module",
            SymbolKind::Namespace => "namespace",
            SymbolKind::Package => "package",
            SymbolKind::Struct => "struct",
            SymbolKind::Class => "class",
            SymbolKind::Interface => "interface",
            SymbolKind::Annotation => "annotation",
            SymbolKind::GlobalVariable => "global_variable",
            SymbolKind::Field => "field",
            SymbolKind::Function => "function",
            SymbolKind::Method => "method",
            SymbolKind::Enum => "enum",
            SymbolKind::EnumConstant => "enum_constant",
            SymbolKind::Typedef => "typedef",
            SymbolKind::TypeParameter => "type_parameter",
            SymbolKind::Macro => "macro",
            SymbolKind::Union => "union",
        }
    }
}

impl FromStr for SymbolKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "type" => Ok(SymbolKind::Type),
            "builtin_type" => Ok(SymbolKind::BuiltinType),
            "module" => Ok(SymbolKind::Module),
            "namespace" => Ok(SymbolKind::Namespace),
            "package" => Ok(SymbolKind::Package),
            "struct" => Ok(SymbolKind::Struct),
            "class" => Ok(SymbolKind::Class),
            "interface" => Ok(SymbolKind::Interface),
            "annotation" => Ok(SymbolKind::Annotation),
            "global_variable" => Ok(SymbolKind::GlobalVariable),
            "field" => Ok(SymbolKind::Field),
            "function" => Ok(SymbolKind::Function),
            "method" => Ok(SymbolKind::Method),
            "enum" => Ok(SymbolKind::Enum),
            "enum_constant" => Ok(SymbolKind::EnumConstant),
            "typedef" => Ok(SymbolKind::Typedef),
            "type_parameter" => Ok(SymbolKind::TypeParameter),
            "macro" => Ok(SymbolKind::Macro),
            "union" => Ok(SymbolKind::Union),
            _ => Err(Error::InvalidArgument(format!("unknown symbol kind: {s}"))),
        }
    }
}

/// Whether a symbol's definition was seen in source
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DefinitionKind {
    /// Only referenced so far
    #[default]
    Unknown,
    /// Generated by the compiler, e.g. a default constructor
    Implicit,
    /// Written in source
    Explicit,
}

impl DefinitionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DefinitionKind::Unknown => "unknown",
            DefinitionKind::Implicit => "implicit",
            DefinitionKind::Explicit => "explicit",
        }
    }
}

impl FromStr for DefinitionKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unknown" => Ok(DefinitionKind::Unknown),
            "implicit" => Ok(DefinitionKind::Implicit),
            "explicit" => Ok(DefinitionKind::Explicit),
            _ => Err(Error::InvalidArgument(format!("unknown definition kind: {s}"))),
        }
    }
}

/// Reference kinds
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    TypeUsage,
    Usage,
    Call,
    Inheritance,
    Override,
    TypeArgument,
    TemplateSpecialization,
    Include,
    Import,
    MacroUsage,
    AnnotationUsage,
}

impl ReferenceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferenceKind::TypeUsage => "type_usage",
            ReferenceKind::Usage => "usage",
            ReferenceKind::Call => "call",
            ReferenceKind::Inheritance => "inheritance",
            ReferenceKind::Override => "override",
            ReferenceKind::TypeArgument => "type_argument",
            ReferenceKind::TemplateSpecialization => "template_specialization",
            ReferenceKind::Include => "include",
            ReferenceKind::Import => "import",
            ReferenceKind::MacroUsage => "macro_usage",
            ReferenceKind::AnnotationUsage => "annotation_usage",
        }
    }
}

impl FromStr for ReferenceKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "type_usage" => Ok(ReferenceKind::TypeUsage),
            "usage" => Ok(ReferenceKind::Usage),
            "call" => Ok(ReferenceKind::Call),
            "inheritance" => Ok(ReferenceKind::Inheritance),
            "override" => Ok(ReferenceKind::Override),
            "type_argument" => Ok(ReferenceKind::TypeArgument),
            "template_specialization" => Ok(ReferenceKind::TemplateSpecialization),
            "include" => Ok(ReferenceKind::Include),
            "import" => Ok(ReferenceKind::Import),
            "macro_usage" => Ok(ReferenceKind::MacroUsage),
            "annotation_usage" => Ok(ReferenceKind::AnnotationUsage),
            _ => Err(Error::InvalidArgument(format!("unknown reference kind: {s}"))),
        }
    }
}

/// Role of a stored source range
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum LocationKind {
    /// Name token of a symbol
    Symbol,
    /// Body of a symbol, highlighted while it is active
    Scope,
    /// Declaration shown in tooltips
    Signature,
    /// Qualifier naming a symbol, e.g. `api::` in `api::MyType`
    Qualifier,
    Reference,
    /// Reference whose target could not be resolved
    Unsolved,
    LocalSymbol,
    Error,
    Comment,
    /// Range consumers must not split
    AtomicRange,
}

impl LocationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LocationKind::Symbol => "symbol",
            LocationKind::Scope => "scope",
            LocationKind::Signature => "signature",
            LocationKind::Qualifier => "qualifier",
            LocationKind::Reference => "reference",
            LocationKind::Unsolved => "unsolved",
            LocationKind::LocalSymbol => "local_symbol",
            LocationKind::Error => "error",
            LocationKind::Comment => "comment",
            LocationKind::AtomicRange => "atomic_range",
        }
    }

    /// Id space of the element a location of this kind belongs to
    pub fn owner(&self) -> IdSpace {
        match self {
            LocationKind::Symbol
            | LocationKind::Scope
            | LocationKind::Signature
            | LocationKind::Qualifier => IdSpace::Symbol,
            LocationKind::Reference | LocationKind::Unsolved => IdSpace::Reference,
            LocationKind::LocalSymbol => IdSpace::LocalSymbol,
            LocationKind::Error => IdSpace::Error,
            LocationKind::Comment | LocationKind::AtomicRange => IdSpace::File,
        }
    }
}

impl FromStr for LocationKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "symbol" => Ok(LocationKind::Symbol),
            "scope" => Ok(LocationKind::Scope),
            "signature" => Ok(LocationKind::Signature),
            "qualifier" => Ok(LocationKind::Qualifier),
            "reference" => Ok(LocationKind::Reference),
            "unsolved" => Ok(LocationKind::Unsolved),
            "local_symbol" => Ok(LocationKind::LocalSymbol),
            "error" => Ok(LocationKind::Error),
            "comment" => Ok(LocationKind::Comment),
            "atomic_range" => Ok(LocationKind::AtomicRange),
            _ => Err(Error::InvalidArgument(format!("unknown location kind: {s}"))),
        }
    }
}

// Kinds are persisted as their `as_str` text.
macro_rules! impl_sql_text {
    ($($kind:ty),*) => {
        $(
            impl ToSql for $kind {
                fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                    Ok(ToSqlOutput::from(self.as_str()))
                }
            }

            impl FromSql for $kind {
                fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                    value
                        .as_str()?
                        .parse()
                        .map_err(|e: Error| FromSqlError::Other(Box::new(e)))
                }
            }
        )*
    };
}

impl_sql_text!(SymbolKind, DefinitionKind, ReferenceKind, LocationKind);

/// A span in a recorded file. Lines and columns are 1-based and inclusive.
///
/// The store keeps ranges exactly as given; it does not check that start
/// precedes end.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct SourceRange {
    pub file_id: FileId,
    pub start_line: u32,
    pub start_column: u32,
    pub end_line: u32,
    pub end_column: u32,
}

impl SourceRange {
    pub fn new(file_id: FileId, start_line: u32, start_column: u32, end_line: u32, end_column: u32) -> Self {
        Self {
            file_id,
            start_line,
            start_column,
            end_line,
            end_column,
        }
    }
}

/// Any entity that can own locations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Element {
    File(FileId),
    Symbol(SymbolId),
    Reference(ReferenceId),
    LocalSymbol(LocalSymbolId),
    Error(ErrorId),
}

impl Element {
    pub fn space(&self) -> IdSpace {
        match self {
            Element::File(_) => IdSpace::File,
            Element::Symbol(_) => IdSpace::Symbol,
            Element::Reference(_) => IdSpace::Reference,
            Element::LocalSymbol(_) => IdSpace::LocalSymbol,
            Element::Error(_) => IdSpace::Error,
        }
    }

    pub fn raw_id(&self) -> i64 {
        match self {
            Element::File(id) => id.get(),
            Element::Symbol(id) => id.get(),
            Element::Reference(id) => id.get(),
            Element::LocalSymbol(id) => id.get(),
            Element::Error(id) => id.get(),
        }
    }
}

/// Symbol row as stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolRecord {
    pub id: SymbolId,
    pub name: NameHierarchy,
    pub kind: Option<SymbolKind>,
    pub definition_kind: DefinitionKind,
}

/// File row as stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: FileId,
    pub path: String,
    pub language: Option<String>,
}

/// Reference row as stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceRecord {
    pub id: ReferenceId,
    pub source: SymbolId,
    pub target: SymbolId,
    pub kind: ReferenceKind,
    pub ambiguous: bool,
}

/// Location row as stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationRecord {
    pub id: i64,
    pub kind: LocationKind,
    pub range: SourceRange,
}

/// Error row joined with its location
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub id: ErrorId,
    pub message: String,
    pub fatal: bool,
    pub range: Option<SourceRange>,
}

/// Row counts per table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    pub total_files: usize,
    pub total_symbols: usize,
    pub total_references: usize,
    pub total_local_symbols: usize,
    pub total_locations: usize,
    pub total_errors: usize,
}
