//! Book name sets: case-insensitive exact lookup of full names and aliases.

use std::collections::HashMap;
use std::path::Path;

use tracing::warn;

use crate::error::Error;
use crate::types::CanonicalBook;

/// English names shipped with the crate, numbered in steps of 10 from Genesis.
const DEFAULT_NAMES_JSON: &str = include_str!("../assets/default_names.json");

/// Maps free-text book tokens to canonical books. Implementations are
/// synchronous and side-effect free.
pub trait NameResolver {
    /// Look a book up by identifier.
    fn book(&self, id: u32) -> Option<&CanonicalBook>;

    /// Exact, case-insensitive match against every full name and alias.
    fn resolve(&self, name: &str) -> Option<&CanonicalBook>;
}

/// One independent set of book names. Two sets may share ids but differ in names.
#[derive(Debug, Clone, Default)]
pub struct NameSet {
    /// Books sorted by id.
    books: Vec<CanonicalBook>,
    /// Id to position in `books`.
    by_id: HashMap<u32, usize>,
    /// Normalized name or alias to position in `books`.
    by_name: HashMap<String, usize>,
}

impl NameSet {
    /// The embedded English name set.
    ///
    /// # Errors
    ///
    /// Returns `Error::Json` or `Error::NameTable` if the embedded table is invalid.
    pub fn default_set() -> Result<Self, Error> {
        return Self::from_json(DEFAULT_NAMES_JSON);
    }

    /// Build a name set, indexing every full name and alias.
    ///
    /// A name claimed by two different books keeps its first owner; the
    /// later claim is dropped with a warning, since module-supplied tables
    /// are not always clean.
    ///
    /// # Errors
    ///
    /// Returns `Error::NameTable` if two books share an id or a book has no name.
    pub fn from_books(mut books: Vec<CanonicalBook>) -> Result<Self, Error> {
        books.sort_by_key(|b| return b.id);

        let mut by_id = HashMap::with_capacity(books.len());
        let mut by_name = HashMap::new();

        for (position, book) in books.iter().enumerate() {
            if book.full_name.trim().is_empty() {
                return Err(Error::NameTable {
                    reason: format!("book {} has an empty name", book.id),
                });
            }
            if by_id.insert(book.id, position).is_some() {
                return Err(Error::NameTable {
                    reason: format!("duplicate book id {}", book.id),
                });
            }

            for name in std::iter::once(&book.full_name).chain(&book.short_names) {
                let key = normalize(name);
                if key.is_empty() {
                    continue;
                }
                match by_name.get(&key).copied() {
                    None => {
                        by_name.insert(key, position);
                    },
                    Some(owner) if owner == position => {},
                    Some(_) => warn!(name = %name, book = book.id, "name already claimed by another book, skipping"),
                }
            }
        }

        return Ok(Self { books, by_id, by_name });
    }

    /// Parse a JSON array of `{"id", "name", "aliases"}` objects.
    ///
    /// # Errors
    ///
    /// Returns `Error::Json` if the content is not a valid table,
    /// or `Error::NameTable` if it is structurally inconsistent.
    pub fn from_json(content: &str) -> Result<Self, Error> {
        let books: Vec<CanonicalBook> = serde_json::from_str(content)?;
        return Self::from_books(books);
    }

    /// Read a JSON name table from disk.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the file cannot be read, plus any `from_json` error.
    pub fn from_json_file(path: &Path) -> Result<Self, Error> {
        let content = std::fs::read_to_string(path)?;
        return Self::from_json(&content);
    }

    /// All books in id order.
    pub fn books(&self) -> &[CanonicalBook] {
        return &self.books;
    }

    /// Whether the set has no books.
    pub fn is_empty(&self) -> bool {
        return self.books.is_empty();
    }

    /// Number of books in the set.
    pub fn len(&self) -> usize {
        return self.books.len();
    }
}

impl NameResolver for NameSet {
    fn book(&self, id: u32) -> Option<&CanonicalBook> {
        return self.by_id.get(&id).and_then(|&i| return self.books.get(i));
    }

    fn resolve(&self, name: &str) -> Option<&CanonicalBook> {
        return self.by_name.get(&normalize(name)).and_then(|&i| return self.books.get(i));
    }
}

/// Full name for display: the primary set first, then the fallback, then the bare id.
pub fn display_name(id: u32, primary: &dyn NameResolver, fallback: Option<&dyn NameResolver>) -> String {
    return primary
        .book(id)
        .or_else(|| return fallback.and_then(|f| return f.book(id)))
        .map_or_else(|| return id.to_string(), |b| return b.full_name.clone());
}

/// Lowercase and collapse internal whitespace so "1  john" matches "1 John".
fn normalize(name: &str) -> String {
    return name.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
}
