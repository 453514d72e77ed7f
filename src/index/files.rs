use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Component, Path, PathBuf};
use tracing::debug;

use super::cache::IdCache;
use super::ids::{next_id, FileId, IdSpace};
use super::FileRecord;
use crate::error::{Error, Result};

/// Source files keyed by normalized path
#[derive(Debug, Default)]
pub struct FileTable {
    cache: IdCache<String, FileId>,
}

impl FileTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the id of `path`, inserting a new file on first sight.
    pub fn record(&mut self, conn: &Connection, path: &Path) -> Result<FileId> {
        let key = normalize_path(path)?;
        if let Some(id) = self.cache.get(key.as_str()) {
            return Ok(id);
        }

        let existing = conn
            .query_row("SELECT id FROM files WHERE path = ?1", [&key], |row| {
                row.get::<_, FileId>(0)
            })
            .optional()?;

        let id = match existing {
            Some(id) => id,
            None => {
                let id = FileId::from_raw(next_id(conn, IdSpace::File)?);
                conn.execute(
                    "INSERT INTO files (id, path) VALUES (?1, ?2)",
                    params![id, key],
                )?;
                debug!("Recorded file {}: {}", id, key);
                id
            }
        };

        self.cache.stage(key, id);
        Ok(id)
    }

    /// Overwrite the language tag. Tags are free-form and not validated.
    pub fn set_language(&self, conn: &Connection, id: FileId, language: &str) -> Result<()> {
        let updated = conn.execute(
            "UPDATE files SET language = ?2 WHERE id = ?1",
            params![id, language],
        )?;
        if updated == 0 {
            return Err(Error::NotFound { what: "file", id: id.get() });
        }
        Ok(())
    }

    pub fn cache_mut(&mut self) -> &mut IdCache<String, FileId> {
        &mut self.cache
    }
}

/// Lexically normalize a path: drop `.` components and resolve `..`
/// against preceding components. The filesystem is not consulted.
/// Paths that are not valid UTF-8 are refused.
pub fn normalize_path(path: &Path) -> Result<String> {
    if path.as_os_str().is_empty() {
        return Err(Error::InvalidArgument("file path is empty".to_string()));
    }

    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let can_pop = matches!(
                    normalized.components().next_back(),
                    Some(Component::Normal(_))
                );
                if can_pop {
                    normalized.pop();
                } else if !normalized.has_root() {
                    normalized.push(component);
                }
            }
            other => normalized.push(other),
        }
    }

    if normalized.as_os_str().is_empty() {
        normalized.push(Component::CurDir);
    }
    normalized
        .to_str()
        .map(str::to_owned)
        .ok_or_else(|| Error::InvalidArgument("file path is not valid UTF-8".to_string()))
}

pub fn exists(conn: &Connection, id: FileId) -> Result<bool> {
    let found = conn
        .query_row("SELECT 1 FROM files WHERE id = ?1", [id], |_| Ok(()))
        .optional()?;
    Ok(found.is_some())
}

pub fn get(conn: &Connection, id: FileId) -> Result<Option<FileRecord>> {
    let file = conn
        .query_row(
            "SELECT id, path, language FROM files WHERE id = ?1",
            [id],
            |row| {
                Ok(FileRecord {
                    id: row.get(0)?,
                    path: row.get(1)?,
                    language: row.get(2)?,
                })
            },
        )
        .optional()?;
    Ok(file)
}

pub fn count(conn: &Connection) -> Result<usize> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM files", [], |row| row.get(0))?;
    Ok(count as usize)
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
    fn test_record_is_idempotent_on_path() {
        let conn = setup();
        let mut table = FileTable::new();

        let a = table.record(&conn, Path::new("/src/a.cpp")).unwrap();
        let again = table.record(&conn, Path::new("/src/./a.cpp")).unwrap();
        let via_parent = table.record(&conn, Path::new("/src/lib/../a.cpp")).unwrap();
        let b = table.record(&conn, Path::new("/src/b.cpp")).unwrap();

        assert_eq!(a.get(), 1);
        assert_eq!(a, again);
        assert_eq!(a, via_parent);
        assert_eq!(b.get(), 2);
        assert_eq!(count(&conn).unwrap(), 2);
    }

    #[test]
    fn test_language_last_write_wins() {
        let conn = setup();
        let mut table = FileTable::new();
        let id = table.record(&conn, Path::new("/a.cpp")).unwrap();

        assert_eq!(get(&conn, id).unwrap().unwrap().language, None);
        table.set_language(&conn, id, "c").unwrap();
        table.set_language(&conn, id, "cpp").unwrap();

        let file = get(&conn, id).unwrap().unwrap();
        assert_eq!(file.path, "/a.cpp");
        assert_eq!(file.language.as_deref(), Some("cpp"));
    }

    #[test]
    fn test_language_on_unknown_file() {
        let conn = setup();
        let result = FileTable::new().set_language(&conn, FileId::from_raw(9), "cpp");
        assert!(matches!(result, Err(Error::NotFound { what: "file", id: 9 })));
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path(Path::new("/a//b/./c")).unwrap(), "/a/b/c");
        assert_eq!(normalize_path(Path::new("/a/b/../c")).unwrap(), "/a/c");
        assert_eq!(normalize_path(Path::new("/../a")).unwrap(), "/a");
        assert_eq!(normalize_path(Path::new("../a/./b")).unwrap(), "../a/b");
        assert_eq!(normalize_path(Path::new("./")).unwrap(), ".");
        assert!(matches!(
            normalize_path(Path::new("")),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_paths_are_refused() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let conn = setup();
        let mut table = FileTable::new();

        let a = table.record(&conn, Path::new(OsStr::from_bytes(b"/src/a\xff.cpp")));
        let b = table.record(&conn, Path::new(OsStr::from_bytes(b"/src/a\xfe.cpp")));

        assert!(matches!(a, Err(Error::InvalidArgument(_))));
        assert!(matches!(b, Err(Error::InvalidArgument(_))));
        assert_eq!(count(&conn).unwrap(), 0);
    }
}
