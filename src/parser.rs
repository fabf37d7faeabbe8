//! Citation parsing: raw strings like "Jn 3:16-18; 4" into validated,
//! counted verse ranges. A citation is all-or-nothing.

use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;

use crate::error::CitationError;
use crate::index::ChapterIndex;
use crate::names::NameResolver;
use crate::types::{Range, RangeWithCount, Reference};

/// `chapter:verse`, both plain decimal.
static CHAPTER_VERSE: LazyLock<Regex> =
    LazyLock::new(|| return Regex::new(r"^(\d+):(\d+)$").expect("valid regex"));

/// Parse state carried from one component to the next within a single citation.
///
/// It lets `"3:16, 18"` read `18` as a verse of chapter 3 while `"3, 5"`
/// reads `5` as a chapter. Never shared between citations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseState {
    /// Book of the most recent component.
    pub current_book: Option<u32>,
    /// Book token as typed for `current_book`.
    pub current_book_token: Option<String>,
    /// Chapter of the most recent component.
    pub current_chapter: Option<u32>,
    /// Whether the most recent component named a specific verse.
    pub last_was_verse: bool,
}

/// How much a component pinned down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precision {
    /// A bare book name.
    Book,
    /// A book and chapter.
    Chapter,
    /// A specific verse.
    Verse,
}

/// One side of a range as parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubPart {
    /// How specific the text was.
    pub precision: Precision,
    /// The position it denotes; chapter and verse default to 1 when unspecified.
    pub reference: Reference,
}

/// A comma/semicolon separated part of a citation, for diagnostics.
#[derive(Debug, Clone, Copy)]
pub struct Part<'a> {
    /// One-based position among the non-blank parts.
    pub number: usize,
    /// Trimmed text of the part.
    pub text: &'a str,
}

/// Resolves citations against one module's chapter index using one name set.
pub struct ReferenceParser<'a, R: NameResolver + ?Sized> {
    /// Chapter index of the module citations are checked against.
    index: &'a ChapterIndex,
    /// Name set book tokens are resolved with.
    names: &'a R,
}

impl<'a, R: NameResolver + ?Sized> ReferenceParser<'a, R> {
    /// A parser for one module and one name set.
    pub const fn new(index: &'a ChapterIndex, names: &'a R) -> Self {
        return Self { index, names };
    }

    /// Parse a full citation into ranges, in input order.
    ///
    /// # Errors
    ///
    /// Returns the first `CitationError` met; no partial result is produced.
    pub fn parse(&self, raw: &str) -> Result<Vec<RangeWithCount>, CitationError> {
        let mut state = ParseState::default();
        let mut ranges = Vec::new();

        let parts = raw.split([',', ';']).map(str::trim).filter(|p| return !p.is_empty());
        for (position, text) in parts.enumerate() {
            let part = Part {
                number: position.saturating_add(1),
                text,
            };
            let (range, next) = self.parse_part(part, state)?;
            ranges.push(self.with_counts(range));
            state = next;
        }

        return Ok(ranges);
    }

    /// Like `parse`, but a rejected citation logs its diagnostic and yields nothing.
    pub fn parse_or_empty(&self, raw: &str) -> Vec<RangeWithCount> {
        return match self.parse(raw) {
            Ok(ranges) => ranges,
            Err(e) => {
                warn!(citation = raw, error = %e, "citation rejected");
                Vec::new()
            },
        };
    }

    /// Parse one side of a range, returning it with the state the next component sees.
    ///
    /// # Errors
    ///
    /// Returns `UnknownBook`, `BookNotInModule`, `OutOfRange`, or `Malformed`.
    pub fn parse_sub_part(
        &self,
        token: &str,
        state: ParseState,
        part: Part<'_>,
    ) -> Result<(SubPart, ParseState), CitationError> {
        let tokens: Vec<&str> = token.split_whitespace().collect();
        if tokens.is_empty() {
            return Err(malformed(part, token, "empty reference"));
        }

        let mut next = state;
        let (book, display, rest) = match self.resolve_leading_book(&tokens) {
            Some((book, consumed)) => {
                let typed = tokens.get(..consumed).unwrap_or_default().join(" ");
                next.current_book = Some(book);
                next.current_book_token = Some(typed.clone());
                next.current_chapter = None;
                next.last_was_verse = false;
                (book, typed, tokens.get(consumed..).unwrap_or_default())
            },
            None => {
                let carried = next.current_book.filter(|_| return !looks_like_book_name(&tokens));
                let Some(book) = carried else {
                    return Err(CitationError::UnknownBook {
                        context: part.text.to_string(),
                        part: part.number,
                        token: leading_name_tokens(&tokens),
                    });
                };
                (book, next.current_book_token.clone().unwrap_or_default(), tokens.as_slice())
            },
        };

        if !self.index.exists_in_module(book) {
            return Err(CitationError::BookNotInModule {
                context: part.text.to_string(),
                part: part.number,
                token: display,
            });
        }

        let at = |chapter: u32, verse: u32| {
            return Reference {
                book,
                chapter,
                display_book: display.clone(),
                verse,
            };
        };

        return match rest {
            [] => {
                next.current_chapter = Some(1);
                next.last_was_verse = false;
                Ok((
                    SubPart {
                        precision: Precision::Book,
                        reference: at(1, 1),
                    },
                    next,
                ))
            },
            [number] if number.contains(':') => {
                let (chapter, verse) = self.chapter_and_verse(book, &display, number, part)?;
                next.current_chapter = Some(chapter);
                next.last_was_verse = true;
                Ok((
                    SubPart {
                        precision: Precision::Verse,
                        reference: at(chapter, verse),
                    },
                    next,
                ))
            },
            [number] => {
                let value = parse_number(number).map_err(|reason| return malformed(part, number, reason))?;
                match next.current_chapter.filter(|_| return next.last_was_verse) {
                    // A bare number after a verse continues that chapter's verses, unchecked.
                    Some(chapter) => Ok((
                        SubPart {
                            precision: Precision::Verse,
                            reference: at(chapter, value),
                        },
                        next,
                    )),
                    None => {
                        self.chapter_verses(book, &display, value, number, part)?;
                        next.current_chapter = Some(value);
                        next.last_was_verse = false;
                        Ok((
                            SubPart {
                                precision: Precision::Chapter,
                                reference: at(value, 1),
                            },
                            next,
                        ))
                    },
                }
            },
            extra => Err(malformed(part, &extra.join(" "), "unexpected extra tokens")),
        };
    }

    // ── Internals ─────────────────────────────────────────────────────

    /// Validate a `chapter:verse` token against the index.
    ///
    /// # Errors
    ///
    /// Returns `Malformed` if the shape is wrong, `OutOfRange` if either number is too large.
    fn chapter_and_verse(
        &self,
        book: u32,
        display: &str,
        token: &str,
        part: Part<'_>,
    ) -> Result<(u32, u32), CitationError> {
        let shape_error = || return malformed(part, token, "expected chapter:verse");
        let captures = CHAPTER_VERSE.captures(token).ok_or_else(shape_error)?;
        let (Some(chapter), Some(verse)) = (captures.get(1), captures.get(2)) else {
            return Err(shape_error());
        };

        let chapter = parse_number(chapter.as_str()).map_err(|reason| return malformed(part, token, reason))?;
        let verse = parse_number(verse.as_str()).map_err(|reason| return malformed(part, token, reason))?;

        let verses = self.chapter_verses(book, display, chapter, token, part)?;
        if verse > verses {
            return Err(CitationError::OutOfRange {
                book: format!("{display} {chapter}"),
                context: part.text.to_string(),
                limit: verses,
                part: part.number,
                token: token.to_string(),
                unit: "verses",
            });
        }
        return Ok((chapter, verse));
    }

    /// Verses in `chapter`, or `OutOfRange` naming how many chapters the book has.
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` if the module has no such chapter.
    fn chapter_verses(
        &self,
        book: u32,
        display: &str,
        chapter: u32,
        token: &str,
        part: Part<'_>,
    ) -> Result<u32, CitationError> {
        return self.index.verse_count(book, chapter).ok_or_else(|| {
            let limit = self.index.last_chapter_and_verse(book).map_or(0, |(last, _)| return last);
            return CitationError::OutOfRange {
                book: display.to_string(),
                context: part.text.to_string(),
                limit,
                part: part.number,
                token: token.to_string(),
                unit: "chapters",
            };
        });
    }

    /// The end a bare start implies: whole book, whole chapter, or the verse itself.
    fn implied_end(&self, start: &SubPart) -> Reference {
        let reference = &start.reference;
        let (chapter, verse) = match start.precision {
            Precision::Book => self
                .index
                .last_chapter_and_verse(reference.book)
                .unwrap_or((reference.chapter, reference.verse)),
            Precision::Chapter => (
                reference.chapter,
                self.index.verse_count(reference.book, reference.chapter).unwrap_or(reference.verse),
            ),
            Precision::Verse => (reference.chapter, reference.verse),
        };
        return Reference {
            chapter,
            verse,
            ..reference.clone()
        };
    }

    /// An explicit end that did not name a verse runs to the end of its chapter.
    fn explicit_end(&self, end: SubPart) -> Reference {
        let mut reference = end.reference;
        if end.precision != Precision::Verse {
            if let Some(verses) = self.index.verse_count(reference.book, reference.chapter) {
                reference.verse = verses;
            }
        }
        return reference;
    }

    /// Parse one part: a start, an optional `-` and end, then order-check the pair.
    ///
    /// # Errors
    ///
    /// Returns any sub-part error, `Malformed` for a blank side, or `InvertedRange`.
    fn parse_part(&self, part: Part<'_>, state: ParseState) -> Result<(Range, ParseState), CitationError> {
        let (start_text, end_text) = match part.text.split_once('-') {
            Some((start, end)) => (start.trim(), Some(end.trim())),
            None => (part.text, None),
        };
        if start_text.is_empty() {
            return Err(malformed(part, part.text, "missing start of range"));
        }

        let (start, state) = self.parse_sub_part(start_text, state, part)?;
        let (end, state) = match end_text {
            None => (self.implied_end(&start), state),
            Some("") => return Err(malformed(part, part.text, "missing end of range")),
            Some(text) => {
                let (end, state) = self.parse_sub_part(text, state, part)?;
                (self.explicit_end(end), state)
            },
        };

        let range = Range::new(start.reference, end).ok_or_else(|| {
            return CitationError::InvertedRange {
                context: part.text.to_string(),
                end: end_text.unwrap_or_default().to_string(),
                part: part.number,
                start: start_text.to_string(),
            };
        })?;
        return Ok((range, state));
    }

    /// Greedy longest match: try the first N tokens as a book name, then N-1, down to 1.
    fn resolve_leading_book(&self, tokens: &[&str]) -> Option<(u32, usize)> {
        for consumed in (1..=tokens.len()).rev() {
            let candidate = tokens.get(..consumed)?.join(" ");
            if let Some(book) = self.names.resolve(&candidate) {
                return Some((book.id, consumed));
            }
        }
        return None;
    }

    /// Attach verse count and start offset derived from the index.
    fn with_counts(&self, range: Range) -> RangeWithCount {
        let start = range.start();
        let end = range.end();

        let verse_count = if (start.book, start.chapter) == (end.book, end.chapter) {
            end.verse.saturating_sub(start.verse).saturating_add(1)
        } else {
            let in_start_chapter = self
                .index
                .verse_count(start.book, start.chapter)
                .unwrap_or(start.verse)
                .saturating_sub(start.verse)
                .saturating_add(1);
            let between = self
                .index
                .verses_between((start.book, start.chapter), (end.book, end.chapter));
            in_start_chapter.saturating_add(between).saturating_add(end.verse)
        };
        let start_offset = self
            .index
            .verses_before(start.book, start.chapter)
            .saturating_add(start.verse);

        return RangeWithCount {
            range,
            start_offset,
            verse_count,
        };
    }
}

/// Parse `raw` against one module index with one name set.
///
/// # Errors
///
/// Returns the first `CitationError` met; no partial result is produced.
pub fn parse<R: NameResolver + ?Sized>(
    index: &ChapterIndex,
    names: &R,
    raw: &str,
) -> Result<Vec<RangeWithCount>, CitationError> {
    return ReferenceParser::new(index, names).parse(raw);
}

/// Leading tokens that should have named a book: all but a trailing number, if any.
fn leading_name_tokens(tokens: &[&str]) -> String {
    let name = match tokens.split_last() {
        Some((last, init)) if !init.is_empty() && last.contains(|c: char| return c.is_ascii_digit()) => init,
        _ => tokens,
    };
    return name.join(" ");
}

/// Tokens that cannot be a chapter/verse continuation of a carried book:
/// any token without a digit is taken as a failed book name.
fn looks_like_book_name(tokens: &[&str]) -> bool {
    return tokens
        .iter()
        .any(|token| return !token.contains(|c: char| return c.is_ascii_digit()));
}

/// Build a `Malformed` error for `token` within `part`.
fn malformed(part: Part<'_>, token: &str, reason: &'static str) -> CitationError {
    return CitationError::Malformed {
        context: part.text.to_string(),
        part: part.number,
        reason,
        token: token.to_string(),
    };
}

/// A chapter or verse number: ASCII digits only, at least 1.
///
/// # Errors
///
/// Returns a short reason suitable for `Malformed`.
fn parse_number(token: &str) -> Result<u32, &'static str> {
    if token.is_empty() || !token.bytes().all(|b| return b.is_ascii_digit()) {
        return Err("expected a number");
    }
    let value: u32 = token.parse().map_err(|_err| return "number too large")?;
    if value == 0 {
        return Err("numbers start at 1");
    }
    return Ok(value);
}
