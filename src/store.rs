//! Verse stores: the read-only source of verse coordinates and rows.

use std::path::{Path, PathBuf};

use rusqlite::{Connection, OpenFlags, OptionalExtension as _, params};
use sha2::{Digest as _, Sha256};

use crate::error::Error;
use crate::names::NameSet;
use crate::types::{CanonicalBook, VerseCoordinate, VerseRow};

/// Gap between consecutive canonical book ids in the common module numbering (10, 20, ...).
pub const DEFAULT_BOOK_STRIDE: u32 = 10;

/// A `(chapter, verse)` bound within one book.
pub type VersePosition = (u32, u32);

/// Start of any book.
pub const BOOK_START: VersePosition = (0, 0);

/// Past the end of any book.
pub const BOOK_END: VersePosition = (u32::MAX, u32::MAX);

/// Read-only access to one module's verses.
pub trait VerseStore {
    /// Step between consecutive canonical book ids in this module's numbering.
    fn book_stride(&self) -> u32 {
        return DEFAULT_BOOK_STRIDE;
    }

    /// Content fingerprint used to decide whether a cached index is still fresh.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the backing data cannot be read.
    fn fingerprint(&self) -> Result<String, Error>;

    /// Rows of `book` with `low <= (chapter, verse) <= high`, ascending.
    ///
    /// # Errors
    ///
    /// Returns the store's read error.
    fn query_range(&self, book: u32, low: VersePosition, high: VersePosition) -> Result<Vec<VerseRow>, Error>;

    /// Feed every `(book, chapter, verse)` in the module to `visit`, in any order.
    ///
    /// # Errors
    ///
    /// Returns the store's read error.
    fn visit_coordinates(&self, visit: &mut dyn FnMut(VerseCoordinate)) -> Result<(), Error>;
}

/// A module stored as a SQLite database with a
/// `verses(book_number, chapter, verse, text)` table and an optional
/// `books(book_number, short_name, long_name)` table.
#[derive(Debug)]
pub struct SqliteVerseStore {
    /// Read-only connection.
    conn: Connection,
    /// Database file, hashed for the fingerprint.
    path: PathBuf,
    /// Book numbering stride.
    stride: u32,
}

impl SqliteVerseStore {
    /// Names the module itself declares, or an empty set if it has no `books` table.
    ///
    /// # Errors
    ///
    /// Returns `Error::Sqlite` on query failure or `Error::NameTable` on duplicate ids.
    pub fn book_names(&self) -> Result<NameSet, Error> {
        let has_table: Option<String> = self
            .conn
            .query_row(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name = 'books'",
                [],
                |row| return row.get(0),
            )
            .optional()?;
        if has_table.is_none() {
            return Ok(NameSet::default());
        }

        let mut stmt = self
            .conn
            .prepare("SELECT book_number, short_name, long_name FROM books ORDER BY book_number")?;
        let rows = stmt.query_map([], |row| {
            let short: Option<String> = row.get(1)?;
            return Ok(CanonicalBook {
                full_name: row.get(2)?,
                id: row.get(0)?,
                short_names: short.into_iter().filter(|s| return !s.trim().is_empty()).collect(),
            });
        })?;

        let books = rows.collect::<Result<Vec<_>, _>>()?;
        return NameSet::from_books(books);
    }

    /// Open a module read-only.
    ///
    /// # Errors
    ///
    /// Returns `Error::ModuleNotFound` if the file does not exist,
    /// or `Error::Sqlite` if it cannot be opened.
    pub fn open(path: &Path) -> Result<Self, Error> {
        if !path.is_file() {
            return Err(Error::ModuleNotFound {
                dir: path.parent().map(Path::to_path_buf).unwrap_or_default(),
                name: path.display().to_string(),
            });
        }
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        return Ok(Self {
            conn,
            path: path.to_path_buf(),
            stride: DEFAULT_BOOK_STRIDE,
        });
    }

    /// Database file backing this store.
    pub fn path(&self) -> &Path {
        return &self.path;
    }

    /// Override the book numbering stride.
    #[must_use]
    pub fn with_stride(mut self, stride: u32) -> Self {
        self.stride = stride;
        return self;
    }
}

impl VerseStore for SqliteVerseStore {
    fn book_stride(&self) -> u32 {
        return self.stride;
    }

    fn fingerprint(&self) -> Result<String, Error> {
        let mut file = std::fs::File::open(&self.path)?;
        let mut hasher = Sha256::new();
        std::io::copy(&mut file, &mut hasher)?;
        return Ok(format!("{:x}", hasher.finalize()));
    }

    fn query_range(&self, book: u32, low: VersePosition, high: VersePosition) -> Result<Vec<VerseRow>, Error> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT book_number, chapter, verse, text FROM verses \
             WHERE book_number = ?1 \
             AND (chapter > ?2 OR (chapter = ?2 AND verse >= ?3)) \
             AND (chapter < ?4 OR (chapter = ?4 AND verse <= ?5)) \
             ORDER BY chapter, verse",
        )?;
        let rows = stmt.query_map(params![book, low.0, low.1, high.0, high.1], |row| {
            return Ok(VerseRow {
                book: row.get(0)?,
                chapter: row.get(1)?,
                text: row.get(3)?,
                verse: row.get(2)?,
            });
        })?;
        return Ok(rows.collect::<Result<Vec<_>, _>>()?);
    }

    fn visit_coordinates(&self, visit: &mut dyn FnMut(VerseCoordinate)) -> Result<(), Error> {
        let mut stmt = self.conn.prepare("SELECT book_number, chapter, verse FROM verses")?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            visit(VerseCoordinate {
                book: row.get(0)?,
                chapter: row.get(1)?,
                verse: row.get(2)?,
            });
        }
        return Ok(());
    }
}

/// A module held in memory, mainly for tests and embedding callers.
#[derive(Debug, Clone, Default)]
pub struct MemoryVerseStore {
    /// Rows in (book, chapter, verse) order.
    rows: Vec<VerseRow>,
    /// Book numbering stride.
    stride: u32,
}

impl MemoryVerseStore {
    /// Build a store from rows in any order.
    pub fn new(mut rows: Vec<VerseRow>) -> Self {
        rows.sort_by_key(|r| return (r.book, r.chapter, r.verse));
        return Self {
            rows,
            stride: DEFAULT_BOOK_STRIDE,
        };
    }

    /// Override the book numbering stride.
    #[must_use]
    pub const fn with_stride(mut self, stride: u32) -> Self {
        self.stride = stride;
        return self;
    }
}

impl VerseStore for MemoryVerseStore {
    fn book_stride(&self) -> u32 {
        return self.stride;
    }

    fn fingerprint(&self) -> Result<String, Error> {
        let mut hasher = Sha256::new();
        for row in &self.rows {
            hasher.update(format!("{}:{}:{}:{}\n", row.book, row.chapter, row.verse, row.text).as_bytes());
        }
        return Ok(format!("{:x}", hasher.finalize()));
    }

    fn query_range(&self, book: u32, low: VersePosition, high: VersePosition) -> Result<Vec<VerseRow>, Error> {
        return Ok(self
            .rows
            .iter()
            .filter(|r| {
                let position = (r.chapter, r.verse);
                return r.book == book && position >= low && position <= high;
            })
            .cloned()
            .collect());
    }

    fn visit_coordinates(&self, visit: &mut dyn FnMut(VerseCoordinate)) -> Result<(), Error> {
        for row in &self.rows {
            visit(VerseCoordinate {
                book: row.book,
                chapter: row.chapter,
                verse: row.verse,
            });
        }
        return Ok(());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_module(dir: &Path) -> PathBuf {
        let path = dir.join("TEST.SQLite3");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE verses (book_number INTEGER, chapter INTEGER, verse INTEGER, text TEXT);
             CREATE TABLE books (book_number INTEGER, short_name TEXT, long_name TEXT);
             INSERT INTO books VALUES (500, 'Ин', 'От Иоанна');
             INSERT INTO verses VALUES (500, 3, 16, 'a'), (500, 3, 17, 'b'), (500, 3, 18, 'c'),
                                       (500, 4, 1, 'd'), (500, 4, 2, 'e'), (500, 2, 25, 'z');",
        )
        .unwrap();
        path
    }

    #[test]
    fn sqlite_range_includes_boundary_chapters_at_verse_level() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteVerseStore::open(&create_module(dir.path())).unwrap();

        let rows = store.query_range(500, (3, 17), (4, 1)).unwrap();
        let texts: Vec<&str> = rows.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["b", "c", "d"]);
    }

    #[test]
    fn sqlite_whole_book_bounds() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteVerseStore::open(&create_module(dir.path())).unwrap();

        let rows = store.query_range(500, BOOK_START, BOOK_END).unwrap();
        assert_eq!(rows.len(), 6);
        assert_eq!(rows.first().unwrap().text, "z");
    }

    #[test]
    fn sqlite_visits_every_coordinate_and_reads_names() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteVerseStore::open(&create_module(dir.path())).unwrap();

        let mut count = 0;
        store.visit_coordinates(&mut |_| count += 1).unwrap();
        assert_eq!(count, 6);

        let names = store.book_names().unwrap();
        assert_eq!(crate::names::NameResolver::resolve(&names, "ин").unwrap().id, 500);
    }

    #[test]
    fn missing_module_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let result = SqliteVerseStore::open(&dir.path().join("NOPE.SQLite3"));
        assert!(matches!(result, Err(Error::ModuleNotFound { .. })));
    }

    #[test]
    fn memory_fingerprint_tracks_content() {
        let row = |verse, text: &str| VerseRow { book: 10, chapter: 1, text: text.to_string(), verse };
        let a = MemoryVerseStore::new(vec![row(1, "x")]);
        let b = MemoryVerseStore::new(vec![row(1, "y")]);
        assert_ne!(a.fingerprint().unwrap(), b.fingerprint().unwrap());
        assert_eq!(a.fingerprint().unwrap(), a.clone().fingerprint().unwrap());
    }
}
