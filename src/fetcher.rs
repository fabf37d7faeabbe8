//! Range fetching: turn resolved ranges into verse rows, one bounded
//! store query per book touched.

use tracing::debug;

use crate::error::Error;
use crate::index::ChapterIndex;
use crate::store::{BOOK_END, BOOK_START, VerseStore};
use crate::types::{Range, VerseRow};

/// Reads the verses a list of ranges denotes from one module.
pub struct RangeFetcher<'a, S: VerseStore + ?Sized> {
    /// The module's chapter index; decides which in-between books exist.
    index: &'a ChapterIndex,
    /// The module's rows.
    store: &'a S,
}

impl<'a, S: VerseStore + ?Sized> RangeFetcher<'a, S> {
    /// A fetcher over one module.
    pub const fn new(store: &'a S, index: &'a ChapterIndex) -> Self {
        return Self { index, store };
    }

    /// Rows for every range, ranges in the order given and each range in
    /// canonical (book, chapter, verse) order.
    ///
    /// # Errors
    ///
    /// Returns the store's read error.
    pub fn fetch<'r>(&self, ranges: impl IntoIterator<Item = &'r Range>) -> Result<Vec<VerseRow>, Error> {
        let mut rows = Vec::new();
        for range in ranges {
            self.fetch_range(range, &mut rows)?;
        }
        return Ok(rows);
    }

    /// Books strictly between `first` and `last` that the module contains.
    ///
    /// Candidates step from `first` by the store's stride; books the index
    /// knows that fall off that lattice are added so irregular numbering
    /// is not skipped.
    pub fn middle_books(&self, first: u32, last: u32) -> Vec<u32> {
        let stride = self.store.book_stride().max(1);
        let mut books: Vec<u32> = std::iter::successors(first.checked_add(stride), |b| return b.checked_add(stride))
            .take_while(|&b| return b < last)
            .chain(self.index.books().into_iter().filter(|&b| return b > first && b < last))
            .filter(|&b| return self.index.exists_in_module(b))
            .collect();
        books.sort_unstable();
        books.dedup();
        return books;
    }

    /// Append the rows of one range.
    ///
    /// # Errors
    ///
    /// Returns the store's read error.
    fn fetch_range(&self, range: &Range, rows: &mut Vec<VerseRow>) -> Result<(), Error> {
        let start = range.start();
        let end = range.end();

        if range.is_single_book() {
            debug!(book = start.book, %range, "single-book query");
            rows.extend(self.store.query_range(
                start.book,
                (start.chapter, start.verse),
                (end.chapter, end.verse),
            )?);
            return Ok(());
        }

        let middle = self.middle_books(start.book, end.book);
        debug!(%range, middle = ?middle, "cross-book query");

        rows.extend(self.store.query_range(start.book, (start.chapter, start.verse), BOOK_END)?);
        for book in middle {
            rows.extend(self.store.query_range(book, BOOK_START, BOOK_END)?);
        }
        rows.extend(self.store.query_range(end.book, BOOK_START, (end.chapter, end.verse))?);
        return Ok(());
    }
}
