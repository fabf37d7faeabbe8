//! Per-module chapter index: how many verses each (book, chapter) holds.

use std::collections::BTreeMap;
use std::ops::Bound;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::types::VerseCoordinate;

/// Chapters per book the composite key can address.
const CHAPTER_SPACE: u32 = 1000;

/// Composite key `book * 1000 + chapter`. Chapters outside `1..1000` have no key.
pub fn chapter_key(book: u32, chapter: u32) -> Option<u32> {
    if chapter == 0 || chapter >= CHAPTER_SPACE {
        return None;
    }
    return book.checked_mul(CHAPTER_SPACE)?.checked_add(chapter);
}

/// Split a composite key back into `(book, chapter)`.
const fn split_key(key: u32) -> (u32, u32) {
    return (key / CHAPTER_SPACE, key % CHAPTER_SPACE);
}

/// One persisted index entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterEntry {
    /// Canonical book identifier.
    pub book: u32,
    /// Chapter number.
    pub chapter: u32,
    /// Highest verse number seen in the chapter.
    pub verses: u32,
}

/// Every (book, chapter) present in one module mapped to its verse count.
/// Immutable once built; share it behind an `Arc`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChapterIndex {
    /// Composite chapter key to verse count.
    chapters: BTreeMap<u32, u32>,
}

impl ChapterIndex {
    /// Distinct books present in the module, ascending.
    pub fn books(&self) -> Vec<u32> {
        let mut books: Vec<u32> = self.chapters.keys().map(|&k| return split_key(k).0).collect();
        books.dedup();
        return books;
    }

    /// Number of indexed chapters across all books.
    pub fn chapter_count(&self) -> usize {
        return self.chapters.len();
    }

    /// Entries in key order, for persistence.
    pub fn entries(&self) -> Vec<ChapterEntry> {
        return self
            .chapters
            .iter()
            .map(|(&key, &verses)| {
                let (book, chapter) = split_key(key);
                return ChapterEntry { book, chapter, verses };
            })
            .collect();
    }

    /// True if any chapter of `book` is indexed.
    pub fn exists_in_module(&self, book: u32) -> bool {
        return self.book_chapters(book).next().is_some();
    }

    /// Rebuild from persisted entries. Later duplicates keep the larger count.
    pub fn from_entries(entries: &[ChapterEntry]) -> Self {
        let mut builder = ChapterIndexBuilder::default();
        for entry in entries {
            builder.push(VerseCoordinate {
                book: entry.book,
                chapter: entry.chapter,
                verse: entry.verses,
            });
        }
        return builder.finish();
    }

    /// Whether nothing was indexed.
    pub fn is_empty(&self) -> bool {
        return self.chapters.is_empty();
    }

    /// The highest (chapter, verse) recorded for `book`.
    pub fn last_chapter_and_verse(&self, book: u32) -> Option<(u32, u32)> {
        let (&key, &verses) = self.book_chapters(book).next_back()?;
        return Some((split_key(key).1, verses));
    }

    /// Verses in one chapter, or `None` if the module lacks that chapter.
    pub fn verse_count(&self, book: u32, chapter: u32) -> Option<u32> {
        return self.chapters.get(&chapter_key(book, chapter)?).copied();
    }

    /// Sum of verses in chapters `1..chapter` of `book`.
    pub fn verses_before(&self, book: u32, chapter: u32) -> u32 {
        let Some(first) = chapter_key(book, 1) else {
            return 0;
        };
        let Some(upper) = chapter_key(book, chapter) else {
            return 0;
        };
        return self.sum_keys((Bound::Included(first), Bound::Excluded(upper)));
    }

    /// Sum of verses in every indexed chapter strictly between two chapter
    /// positions, crossing book boundaries if needed.
    pub fn verses_between(&self, from: (u32, u32), to: (u32, u32)) -> u32 {
        let (Some(low), Some(high)) = (chapter_key(from.0, from.1), chapter_key(to.0, to.1)) else {
            return 0;
        };
        if low >= high {
            return 0;
        }
        return self.sum_keys((Bound::Excluded(low), Bound::Excluded(high)));
    }

    /// Chapters of one book in key order.
    fn book_chapters(&self, book: u32) -> std::collections::btree_map::Range<'_, u32, u32> {
        let low = book.saturating_mul(CHAPTER_SPACE);
        let high = low.saturating_add(CHAPTER_SPACE);
        return self.chapters.range(low..high);
    }

    /// Sum verse counts over a key range without overflowing.
    fn sum_keys(&self, bounds: (Bound<u32>, Bound<u32>)) -> u32 {
        return self.chapters.range(bounds).fold(0_u32, |acc, (_, &v)| return acc.saturating_add(v));
    }
}

/// Accumulates `max(verse)` per (book, chapter) from an unordered stream of coordinates.
#[derive(Debug, Default)]
pub struct ChapterIndexBuilder {
    /// Running maxima keyed by composite chapter key.
    chapters: BTreeMap<u32, u32>,
    /// Coordinates dropped because their chapter has no key.
    skipped: usize,
}

impl ChapterIndexBuilder {
    /// Freeze the accumulated counts into an index.
    pub fn finish(self) -> ChapterIndex {
        if self.skipped > 0 {
            warn!(skipped = self.skipped, "ignored verses whose chapter number cannot be indexed");
        }
        return ChapterIndex { chapters: self.chapters };
    }

    /// Record one verse position.
    pub fn push(&mut self, coordinate: VerseCoordinate) {
        let Some(key) = chapter_key(coordinate.book, coordinate.chapter) else {
            self.skipped = self.skipped.saturating_add(1);
            return;
        };
        let slot = self.chapters.entry(key).or_insert(0);
        *slot = (*slot).max(coordinate.verse);
    }
}

impl FromIterator<VerseCoordinate> for ChapterIndex {
    fn from_iter<I: IntoIterator<Item = VerseCoordinate>>(iter: I) -> Self {
        let mut builder = ChapterIndexBuilder::default();
        for coordinate in iter {
            builder.push(coordinate);
        }
        return builder.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coords(triples: &[(u32, u32, u32)]) -> ChapterIndex {
        triples
            .iter()
            .map(|&(book, chapter, verse)| VerseCoordinate { book, chapter, verse })
            .collect()
    }

    #[test]
    fn keeps_max_verse_regardless_of_order() {
        let index = coords(&[(500, 3, 16), (500, 3, 36), (500, 3, 1), (500, 1, 51)]);
        assert_eq!(index.verse_count(500, 3), Some(36));
        assert_eq!(index.verse_count(500, 1), Some(51));
        assert_eq!(index.verse_count(500, 2), None);
    }

    #[test]
    fn books_absent_from_module() {
        let index = coords(&[(470, 1, 25), (500, 1, 51)]);
        assert!(index.exists_in_module(470));
        assert!(!index.exists_in_module(480));
        assert_eq!(index.books(), vec![470, 500]);
    }

    #[test]
    fn last_chapter_and_verse_of_book() {
        let index = coords(&[(500, 1, 51), (500, 21, 25), (500, 20, 31), (510, 1, 26)]);
        assert_eq!(index.last_chapter_and_verse(500), Some((21, 25)));
        assert_eq!(index.last_chapter_and_verse(490), None);
    }

    #[test]
    fn verses_between_crosses_books() {
        let index = coords(&[(10, 1, 31), (10, 2, 25), (10, 3, 24), (20, 1, 22), (20, 2, 25)]);
        assert_eq!(index.verses_between((10, 1), (10, 3)), 25);
        assert_eq!(index.verses_between((10, 2), (20, 2)), 24 + 22);
        assert_eq!(index.verses_between((10, 3), (10, 1)), 0);
    }

    #[test]
    fn verses_before_counts_earlier_chapters_only() {
        let index = coords(&[(10, 1, 31), (10, 2, 25), (10, 3, 24)]);
        assert_eq!(index.verses_before(10, 1), 0);
        assert_eq!(index.verses_before(10, 3), 56);
    }

    #[test]
    fn unkeyable_chapters_are_skipped() {
        let index = coords(&[(10, 0, 5), (10, 1000, 3), (10, 1, 2)]);
        assert_eq!(index.chapter_count(), 1);
    }

    #[test]
    fn entries_rebuild_the_same_index() {
        let index = coords(&[(10, 1, 31), (20, 4, 12)]);
        assert_eq!(ChapterIndex::from_entries(&index.entries()), index);
    }
}
