/// Core domain types for scriptref books, references, ranges, and rows.
use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// A book as one name set knows it. Ids are shared across name sets; names are not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalBook {
    /// Human-readable full name.
    #[serde(rename = "name")]
    pub full_name: String,
    /// Canonical book identifier, stable across modules.
    pub id: u32,
    /// Aliases; the first one is the primary abbreviation.
    #[serde(default, rename = "aliases")]
    pub short_names: Vec<String>,
}

impl CanonicalBook {
    /// The primary abbreviation, or the full name when none is known.
    pub fn primary_short_name(&self) -> &str {
        return self.short_names.first().map_or(self.full_name.as_str(), String::as_str);
    }
}

/// A single verse position. `display_book` keeps whatever the user typed
/// (or the resolved default) for messages; it never takes part in comparisons.
#[derive(Debug, Clone, Serialize)]
pub struct Reference {
    /// Canonical book identifier.
    pub book: u32,
    /// One-based chapter number.
    pub chapter: u32,
    /// Book token as typed, for display and round-tripping.
    pub display_book: String,
    /// One-based verse number.
    pub verse: u32,
}

impl Reference {
    /// The `(book, chapter, verse)` triple used for ordering.
    pub const fn key(&self) -> (u32, u32, u32) {
        return (self.book, self.chapter, self.verse);
    }
}

impl std::fmt::Display for Reference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        return write!(f, "{} {}:{}", self.display_book, self.chapter, self.verse);
    }
}

impl PartialEq for Reference {
    fn eq(&self, other: &Self) -> bool {
        return self.key() == other.key();
    }
}

impl Eq for Reference {}

impl Ord for Reference {
    /// Lexicographic on (book, chapter, verse).
    fn cmp(&self, other: &Self) -> Ordering {
        return self.key().cmp(&other.key());
    }
}

impl PartialOrd for Reference {
    /// Delegate to `Ord` implementation.
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        return Some(self.cmp(other));
    }
}

/// An inclusive span of verses. Constructed only via `Range::new`,
/// which refuses a start that sorts after the end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Range {
    /// Last verse of the span.
    end: Reference,
    /// First verse of the span.
    start: Reference,
}

impl Range {
    /// Build a range, or `None` if `end` precedes `start`.
    pub fn new(start: Reference, end: Reference) -> Option<Self> {
        if start > end {
            return None;
        }
        return Some(Self { end, start });
    }

    /// Last verse of the span.
    pub const fn end(&self) -> &Reference {
        return &self.end;
    }

    /// Whether start and end lie in the same book.
    pub const fn is_single_book(&self) -> bool {
        return self.start.book == self.end.book;
    }

    /// First verse of the span.
    pub const fn start(&self) -> &Reference {
        return &self.start;
    }
}

impl std::fmt::Display for Range {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.start == self.end {
            return write!(f, "{}", self.start);
        }
        if self.is_single_book() && self.start.chapter == self.end.chapter {
            return write!(f, "{}-{}", self.start, self.end.verse);
        }
        return write!(f, "{} - {}", self.start, self.end);
    }
}

/// A range together with figures derived from the module's chapter index.
/// Only the parser builds these, so the counts always describe `range`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RangeWithCount {
    /// The resolved span.
    pub range: Range,
    /// One-based position of `range.start` counted from chapter 1 verse 1 of its book.
    pub start_offset: u32,
    /// Verses spanned, inclusive.
    pub verse_count: u32,
}

/// A verse position as the store enumerates it for index construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerseCoordinate {
    /// Canonical book identifier.
    pub book: u32,
    /// Chapter number.
    pub chapter: u32,
    /// Verse number.
    pub verse: u32,
}

/// A raw verse as stored, markup untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerseRow {
    /// Canonical book identifier.
    pub book: u32,
    /// Chapter number.
    pub chapter: u32,
    /// Stored verse text.
    pub text: String,
    /// Verse number.
    pub verse: u32,
}
