//! Chapter index caching: one shared in-memory copy per module, backed by an
//! on-disk artifact so later processes skip the rebuild.

use std::collections::HashMap;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::Error;
use crate::index::{ChapterEntry, ChapterIndex, ChapterIndexBuilder};
use crate::store::VerseStore;

/// Bumped whenever the artifact layout changes; older artifacts are rebuilt.
const ARTIFACT_VERSION: u32 = 1;

/// The persisted form of one module's chapter index.
/// Entries are strictly sorted by (book, chapter); `parse` rejects anything else.
#[derive(Debug, Serialize, Deserialize)]
pub struct IndexArtifact {
    /// Indexed chapters in key order.
    pub chapters: Vec<ChapterEntry>,
    /// Fingerprint of the store the index was built from.
    pub fingerprint: String,
    /// Module key the artifact belongs to.
    pub module: String,
    /// Layout version.
    pub version: u32,
}

impl IndexArtifact {
    /// Capture an index for persistence.
    pub fn new(module: &str, fingerprint: String, index: &ChapterIndex) -> Self {
        return Self {
            chapters: index.entries(),
            fingerprint,
            module: module.to_string(),
            version: ARTIFACT_VERSION,
        };
    }

    /// Whether the artifact describes the store with this fingerprint.
    pub fn is_fresh(&self, fingerprint: &str) -> bool {
        return self.version == ARTIFACT_VERSION && self.fingerprint == fingerprint;
    }

    /// Parse an artifact from JSON content.
    ///
    /// # Errors
    ///
    /// Returns `Error::IndexCorrupt` if the content is not valid JSON
    /// or the entries are not strictly sorted.
    pub fn parse(path: &Path, content: &str) -> Result<Self, Error> {
        let artifact: Self = serde_json::from_str(content).map_err(|e| return Error::IndexCorrupt {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        enforce_chapter_entry_ordering(path, &artifact.chapters)?;
        return Ok(artifact);
    }

    /// Read an artifact from disk, or `None` if there is none.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` for read failures other than not-found,
    /// or `Error::IndexCorrupt` if the content cannot be trusted.
    pub fn read(path: &Path) -> Result<Option<Self>, Error> {
        let content = match std::fs::read_to_string(path) {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::Io(e)),
            Ok(c) => c,
        };
        return Self::parse(path, &content).map(Some);
    }

    /// Rebuild the index the artifact describes.
    pub fn to_index(&self) -> ChapterIndex {
        return ChapterIndex::from_entries(&self.chapters);
    }

    /// Write the artifact, replacing any previous one in a single rename.
    ///
    /// # Errors
    ///
    /// Returns `Error::Json` if serialization fails,
    /// or `Error::Io` if the file cannot be written.
    pub fn write(&self, path: &Path) -> Result<(), Error> {
        let parent = path
            .parent()
            .filter(|p| return !p.as_os_str().is_empty())
            .unwrap_or_else(|| return Path::new("."));
        std::fs::create_dir_all(parent)?;

        let content = serde_json::to_string(self)?;
        // One staging file per writer.
        let mut staging = tempfile::NamedTempFile::new_in(parent)?;
        staging.write_all(content.as_bytes())?;
        staging.persist(path).map_err(|e| return Error::Io(e.error))?;
        return Ok(());
    }
}

/// Validate that artifact entries are strictly sorted by (book, chapter).
///
/// # Errors
///
/// Returns `Error::IndexCorrupt` if any adjacent pair is out of order or repeated.
fn enforce_chapter_entry_ordering(path: &Path, entries: &[ChapterEntry]) -> Result<(), Error> {
    for pair in entries.windows(2) {
        let [first, second] = pair else {
            continue;
        };
        if (first.book, first.chapter) >= (second.book, second.chapter) {
            return Err(Error::IndexCorrupt {
                path: path.to_path_buf(),
                reason: format!(
                    "entries not sorted: {}:{} >= {}:{}",
                    first.book, first.chapter, second.book, second.chapter,
                ),
            });
        }
    }
    return Ok(());
}

/// The cell one module's index lives in. Holding its lock is what makes a
/// build exclusive; `None` means not built yet (or the last build failed).
type Slot = Arc<Mutex<Option<Arc<ChapterIndex>>>>;

/// Process-lifetime cache of chapter indexes keyed by module name.
///
/// At most one build runs per module key: concurrent callers for the same
/// module block on that module's slot and receive the finished index.
/// Different modules build independently.
#[derive(Debug, Default)]
pub struct IndexCache {
    /// Directory holding `<module>.index.json` artifacts; `None` keeps everything in memory.
    cache_dir: Option<PathBuf>,
    /// Per-module slots.
    slots: Mutex<HashMap<String, Slot>>,
}

impl IndexCache {
    /// A cache that persists artifacts under `cache_dir`.
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        return Self {
            cache_dir: Some(cache_dir.into()),
            slots: Mutex::default(),
        };
    }

    /// A cache with no on-disk artifacts.
    pub fn in_memory() -> Self {
        return Self::default();
    }

    /// Where the artifact for `module` lives, if this cache persists.
    pub fn artifact_path(&self, module: &str) -> Option<PathBuf> {
        return self
            .cache_dir
            .as_ref()
            .map(|dir| return dir.join(format!("{}.index.json", sanitize_module_key(module))));
    }

    /// The index for `module`, built from `store` on first use.
    ///
    /// # Errors
    ///
    /// Returns `Error::IndexBuild` if the store cannot be read.
    pub fn get_or_build<S: VerseStore + ?Sized>(&self, module: &str, store: &S) -> Result<Arc<ChapterIndex>, Error> {
        let slot = self.slot(module);
        let mut guard = slot.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(index) = guard.as_ref() {
            debug!(module, "chapter index served from memory");
            return Ok(Arc::clone(index));
        }

        let index = Arc::new(self.load_or_rebuild(module, store)?);
        *guard = Some(Arc::clone(&index));
        return Ok(index);
    }

    /// Forget the in-memory index and delete the artifact for `module`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the artifact exists but cannot be removed.
    pub fn invalidate(&self, module: &str) -> Result<(), Error> {
        let slot = self.slot(module);
        let mut guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
        *guard = None;

        if let Some(path) = self.artifact_path(module) {
            remove_if_present(&path)?;
        }
        return Ok(());
    }

    /// Load a fresh artifact, or build from the store and persist the result.
    ///
    /// # Errors
    ///
    /// Returns `Error::IndexBuild` if the store cannot be fingerprinted or read.
    fn load_or_rebuild<S: VerseStore + ?Sized>(&self, module: &str, store: &S) -> Result<ChapterIndex, Error> {
        let build_failed = |e: Error| return Error::IndexBuild {
            module: module.to_string(),
            reason: e.to_string(),
        };
        let fingerprint = store.fingerprint().map_err(build_failed)?;
        let artifact_path = self.artifact_path(module);

        if let Some(path) = &artifact_path {
            match IndexArtifact::read(path) {
                Ok(Some(artifact)) if artifact.is_fresh(&fingerprint) => {
                    debug!(module, path = %path.display(), "chapter index loaded from artifact");
                    return Ok(artifact.to_index());
                },
                Ok(Some(_)) => debug!(module, "chapter index artifact is stale"),
                Ok(None) => {},
                Err(e) => {
                    warn!(module, error = %e, "discarding unreadable chapter index artifact");
                    remove_if_present(path).map_err(build_failed)?;
                },
            }
        }

        let mut builder = ChapterIndexBuilder::default();
        store
            .visit_coordinates(&mut |coordinate| builder.push(coordinate))
            .map_err(build_failed)?;
        let index = builder.finish();
        info!(module, chapters = index.chapter_count(), "built chapter index");

        if let Some(path) = &artifact_path {
            let artifact = IndexArtifact::new(module, fingerprint, &index);
            if let Err(e) = artifact.write(path) {
                warn!(module, error = %e, "could not persist chapter index artifact");
            }
        }

        return Ok(index);
    }

    /// The slot for `module`, created empty on first request.
    fn slot(&self, module: &str) -> Slot {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        return Arc::clone(slots.entry(module.to_string()).or_default());
    }
}

/// Delete a file, treating "already gone" as success.
///
/// # Errors
///
/// Returns `Error::Io` for any other removal failure.
fn remove_if_present(path: &Path) -> Result<(), Error> {
    return match std::fs::remove_file(path) {
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::Io(e)),
        Ok(()) => Ok(()),
    };
}

/// Module names become file stems; anything outside `[A-Za-z0-9._-]` is replaced.
fn sanitize_module_key(module: &str) -> String {
    return module
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                return c;
            }
            return '_';
        })
        .collect();
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    use super::*;
    use crate::store::{MemoryVerseStore, VersePosition};
    use crate::types::{VerseCoordinate, VerseRow};

    /// Counts coordinate scans and sleeps during them to widen race windows.
    struct CountingStore {
        inner: MemoryVerseStore,
        scans: AtomicUsize,
    }

    impl CountingStore {
        fn new() -> Self {
            let rows = (1..=5)
                .map(|verse| VerseRow { book: 720, chapter: 1, text: format!("v{verse}"), verse })
                .collect();
            Self { inner: MemoryVerseStore::new(rows), scans: AtomicUsize::new(0) }
        }
    }

    impl VerseStore for CountingStore {
        fn fingerprint(&self) -> Result<String, Error> {
            self.inner.fingerprint()
        }

        fn query_range(&self, book: u32, low: VersePosition, high: VersePosition) -> Result<Vec<VerseRow>, Error> {
            self.inner.query_range(book, low, high)
        }

        fn visit_coordinates(&self, visit: &mut dyn FnMut(VerseCoordinate)) -> Result<(), Error> {
            self.scans.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(50));
            self.inner.visit_coordinates(visit)
        }
    }

    #[test]
    fn concurrent_requests_build_once() {
        let cache = IndexCache::in_memory();
        let store = CountingStore::new();

        thread::scope(|s| {
            let handles: Vec<_> = (0..8).map(|_| s.spawn(|| cache.get_or_build("KJV", &store).unwrap())).collect();
            let indexes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
            for index in &indexes {
                assert_eq!(index.verse_count(720, 1), Some(5));
                assert!(Arc::ptr_eq(index, &indexes[0]));
            }
        });

        assert_eq!(store.scans.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn artifact_skips_rebuild_in_a_new_cache() {
        let dir = tempfile::tempdir().unwrap();
        let store = CountingStore::new();

        IndexCache::new(dir.path()).get_or_build("KJV", &store).unwrap();
        assert!(dir.path().join("KJV.index.json").is_file());

        let index = IndexCache::new(dir.path()).get_or_build("KJV", &store).unwrap();
        assert_eq!(index.last_chapter_and_verse(720), Some((1, 5)));
        assert_eq!(store.scans.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn corrupt_artifact_is_rebuilt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("KJV.index.json");
        std::fs::write(&path, "{ not json").unwrap();

        let store = CountingStore::new();
        let index = IndexCache::new(dir.path()).get_or_build("KJV", &store).unwrap();

        assert_eq!(index.verse_count(720, 1), Some(5));
        assert_eq!(store.scans.load(Ordering::SeqCst), 1);
        assert!(IndexArtifact::read(&path).unwrap().is_some());
    }

    #[test]
    fn stale_fingerprint_triggers_rebuild() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("KJV.index.json");
        let stale = IndexArtifact::new("KJV", "old".to_string(), &ChapterIndex::default());
        stale.write(&path).unwrap();

        let store = CountingStore::new();
        IndexCache::new(dir.path()).get_or_build("KJV", &store).unwrap();
        assert_eq!(store.scans.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unsorted_artifact_is_corrupt() {
        let content = r#"{"chapters":[{"book":20,"chapter":1,"verses":3},{"book":10,"chapter":1,"verses":3}],
                          "fingerprint":"x","module":"KJV","version":1}"#;
        let result = IndexArtifact::parse(Path::new("KJV.index.json"), content);
        assert!(matches!(result, Err(Error::IndexCorrupt { .. })));
    }

    #[test]
    fn invalidate_forces_rebuild() {
        let dir = tempfile::tempdir().unwrap();
        let cache = IndexCache::new(dir.path());
        let store = CountingStore::new();

        cache.get_or_build("KJV", &store).unwrap();
        cache.invalidate("KJV").unwrap();
        assert!(!dir.path().join("KJV.index.json").exists());

        cache.get_or_build("KJV", &store).unwrap();
        assert_eq!(store.scans.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn concurrent_artifact_writes_leave_one_valid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("KJV.index.json");
        let index: ChapterIndex = (1..=5).map(|verse| VerseCoordinate { book: 720, chapter: 1, verse }).collect();

        thread::scope(|s| {
            for n in 0..8 {
                let (path, index) = (&path, &index);
                s.spawn(move || IndexArtifact::new("KJV", format!("fp{n}"), index).write(path).unwrap());
            }
        });

        let artifact = IndexArtifact::read(&path).unwrap().unwrap();
        assert_eq!(artifact.to_index(), index);
        let leftovers = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn module_keys_are_file_safe() {
        assert_eq!(sanitize_module_key("RST+/x"), "RST__x");
        assert_eq!(sanitize_module_key("KJV-2.0"), "KJV-2.0");
    }
}
