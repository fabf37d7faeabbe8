//! CLI commands for scriptref: parse, fetch, index, modules, books.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use scriptref::config::{Config, MODULE_EXTENSION, NameSource};
use scriptref::error::Error;
use scriptref::names::{self, NameSet};
use scriptref::{ChapterIndex, IndexCache, RangeFetcher, RangeWithCount, ReferenceParser, SqliteVerseStore};

/// Everything one module command needs: store, index, and name sets.
struct Session {
    /// Name set used for display when `names` lacks a book.
    fallback: NameSet,
    /// The module's chapter index.
    index: Arc<ChapterIndex>,
    /// Module key used for caching.
    key: String,
    /// Name set citations are parsed with.
    names: NameSet,
    /// The open module.
    store: SqliteVerseStore,
}

impl Session {
    /// Open a module, load or build its index, and pick name sets.
    ///
    /// # Errors
    ///
    /// Returns errors from module resolution, index building, or name loading.
    fn open(root: &Path, module: &str, module_names: bool) -> Result<Self, Error> {
        let config = Config::load(root)?;
        let (key, path) = config.resolve_module(module)?;
        let store = SqliteVerseStore::open(&path)?.with_stride(config.book_stride);

        let cache = IndexCache::new(&config.cache_dir);
        let index = cache.get_or_build(&key, &store)?;

        let default_names = config.default_names()?;
        let use_module = module_names || config.names == NameSource::Module;
        let module_set = if use_module { store.book_names()? } else { NameSet::default() };

        let (names, fallback) = if module_set.is_empty() {
            (default_names, NameSet::default())
        } else {
            (module_set, default_names)
        };

        return Ok(Self { fallback, index, key, names, store });
    }

    /// Parse a citation against this module.
    ///
    /// # Errors
    ///
    /// Returns `Error::Citation` if the citation is rejected.
    fn parse(&self, citation: &str) -> Result<Vec<RangeWithCount>, Error> {
        return Ok(ReferenceParser::new(&self.index, &self.names).parse(citation)?);
    }
}

/// List the book names citations are parsed with for a module.
///
/// # Errors
///
/// Returns errors from opening the module.
pub fn books(module: &str, module_names: bool) -> Result<(), Error> {
    let session = Session::open(&PathBuf::from("."), module, module_names)?;

    let mut present = 0_usize;
    for book in session.names.books() {
        let marker = if session.index.exists_in_module(book.id) {
            present = present.saturating_add(1);
            " "
        } else {
            "-"
        };
        let others = book.short_names.get(1..).unwrap_or_default().join(", ");
        println!(
            "{marker}{:>4}  {:<8} {:<20} {others}",
            book.id,
            book.primary_short_name(),
            book.full_name
        );
    }
    println!("{} books, {present} in {}", session.names.len(), session.key);
    return Ok(());
}

/// Print the verses a citation denotes.
///
/// # Errors
///
/// Returns `Error::Citation` for a rejected citation, or store errors.
pub fn fetch(module: &str, citation: &str, module_names: bool) -> Result<(), Error> {
    let session = Session::open(&PathBuf::from("."), module, module_names)?;
    let ranges = session.parse(citation)?;

    let fetcher = RangeFetcher::new(&session.store, &session.index);
    let rows = fetcher.fetch(ranges.iter().map(|r| return &r.range))?;

    for row in &rows {
        let book = names::display_name(row.book, &session.names, Some(&session.fallback));
        println!("{book} {}:{}  {}", row.chapter, row.verse, row.text);
    }
    return Ok(());
}

/// Load or build the chapter index of a module and summarize it.
///
/// # Errors
///
/// Returns errors from module resolution, artifact removal, or index building.
pub fn index(module: &str, rebuild: bool) -> Result<(), Error> {
    let root = PathBuf::from(".");
    let config = Config::load(&root)?;
    let (key, path) = config.resolve_module(module)?;
    let store = SqliteVerseStore::open(&path)?.with_stride(config.book_stride);

    let cache = IndexCache::new(&config.cache_dir);
    if rebuild {
        cache.invalidate(&key)?;
    }
    let index = cache.get_or_build(&key, &store)?;

    println!("module: {}", store.path().display());
    if index.is_empty() {
        println!("{key}: no indexable verses");
    } else {
        let books = index.books().len();
        let chapters = index.chapter_count();
        println!("{key}: {books} books, {chapters} chapters");
    }
    if let Some(artifact) = cache.artifact_path(&key) {
        println!("artifact: {}", artifact.display());
    }
    return Ok(());
}

/// List modules found under the configured module directory, sorted by name.
///
/// # Errors
///
/// Returns errors from config loading.
pub fn modules() -> Result<(), Error> {
    let root = PathBuf::from(".");
    let config = Config::load(&root)?;

    let mut found: Vec<(String, PathBuf)> = walkdir::WalkDir::new(&config.module_dir)
        .max_depth(2)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| {
            return e
                .path()
                .extension()
                .is_some_and(|ext| return ext.eq_ignore_ascii_case(MODULE_EXTENSION));
        })
        .filter_map(|e| {
            let stem = e.path().file_stem()?.to_string_lossy().into_owned();
            return Some((stem, e.path().to_path_buf()));
        })
        .collect();
    found.sort();

    if found.is_empty() {
        println!("No modules found in {}.", config.module_dir.display());
        return Ok(());
    }
    for (name, path) in &found {
        println!("{name} -> {}", path.display());
    }
    return Ok(());
}

/// Resolve a citation and print its ranges, as text or JSON.
///
/// # Errors
///
/// Returns `Error::Citation` for a rejected citation, or errors from opening the module.
pub fn parse(module: &str, citation: &str, json: bool, module_names: bool) -> Result<(), Error> {
    let session = Session::open(&PathBuf::from("."), module, module_names)?;
    let ranges = session.parse(citation)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&ranges)?);
        return Ok(());
    }

    for counted in &ranges {
        println!(
            "{}\t{} verses\toffset {}",
            counted.range, counted.verse_count, counted.start_offset
        );
    }
    let total: u32 = ranges.iter().fold(0, |acc, r| return acc.saturating_add(r.verse_count));
    println!("{} ranges, {total} verses in {}", ranges.len(), session.key);
    return Ok(());
}
