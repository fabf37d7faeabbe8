//! Resolve scripture citations such as `"Jn 3:16-18; 4:1"` into exact verse
//! ranges against one text module, count the verses they span, and fetch
//! the rows they denote.
//!
//! The pieces compose bottom-up: a [`names::NameResolver`] and a
//! [`index::ChapterIndex`] feed the [`parser::ReferenceParser`], whose ranges
//! the [`fetcher::RangeFetcher`] reads from a [`store::VerseStore`].

pub mod cache;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod fetcher;
pub mod index;
pub mod names;
pub mod parser;
pub mod store;
pub mod types;

pub use cache::IndexCache;
pub use error::{CitationError, Error};
pub use fetcher::RangeFetcher;
pub use index::ChapterIndex;
pub use names::{NameResolver, NameSet};
pub use parser::{ParseState, ReferenceParser, parse};
pub use store::{MemoryVerseStore, SqliteVerseStore, VerseStore};
pub use types::{CanonicalBook, Range, RangeWithCount, Reference, VerseRow};
