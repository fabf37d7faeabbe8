/// Crate-level error types for scriptref diagnostics.
use std::path::PathBuf;

/// Why a citation string was rejected. Any one of these abandons the whole
/// citation; no partial list of ranges is ever returned alongside it.
///
/// Every variant names the offending token, the 1-based position of the
/// comma/semicolon separated part it came from, and that part's text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CitationError {
    /// A book resolved canonically but the module has no chapters for it.
    #[error("book `{token}` is not present in this module (part {part}: `{context}`)")]
    BookNotInModule {
        /// Raw text of the part containing the token.
        context: String,
        /// One-based index of the part within the citation.
        part: usize,
        /// Book token as the user typed it.
        token: String,
    },

    /// The end of a range precedes its start.
    #[error("range `{start}` - `{end}` is reversed (part {part}: `{context}`)")]
    InvertedRange {
        /// Raw text of the part containing the range.
        context: String,
        /// Token that produced the end of the range.
        end: String,
        /// One-based index of the part within the citation.
        part: usize,
        /// Token that produced the start of the range.
        start: String,
    },

    /// A non-numeric token where a number was required, or excess tokens.
    #[error("malformed token `{token}`: {reason} (part {part}: `{context}`)")]
    Malformed {
        /// Raw text of the part containing the token.
        context: String,
        /// One-based index of the part within the citation.
        part: usize,
        /// Short description of what was expected.
        reason: &'static str,
        /// The offending token.
        token: String,
    },

    /// A chapter or verse exceeds what the module's index records.
    #[error("`{token}` is out of range, {book} has {limit} {unit} (part {part}: `{context}`)")]
    OutOfRange {
        /// Display name of the book the number was checked against.
        book: String,
        /// Raw text of the part containing the token.
        context: String,
        /// Highest valid value for this component.
        limit: u32,
        /// One-based index of the part within the citation.
        part: usize,
        /// The offending token.
        token: String,
        /// `"chapters"` or `"verses"`.
        unit: &'static str,
    },

    /// Neither the name set nor carried-forward state yields a book.
    #[error("unknown book `{token}` (part {part}: `{context}`)")]
    UnknownBook {
        /// Raw text of the part containing the token.
        context: String,
        /// One-based index of the part within the citation.
        part: usize,
        /// Token that failed to resolve.
        token: String,
    },
}

impl CitationError {
    /// The token this error points at.
    pub fn token(&self) -> &str {
        return match self {
            Self::BookNotInModule { token, .. }
            | Self::Malformed { token, .. }
            | Self::OutOfRange { token, .. }
            | Self::UnknownBook { token, .. } => token,
            Self::InvertedRange { end, .. } => end,
        };
    }
}

/// All errors in scriptref carry enough context to produce a useful diagnostic
/// without a debugger. Each variant names the module, file, or reason for failure.
#[allow(clippy::error_impl_error, reason = "crate-level error type")]
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A citation could not be resolved against the module.
    #[error(transparent)]
    Citation(#[from] CitationError),

    /// The verse store could not be read while building a chapter index.
    #[error("index build failed for `{module}`: {reason}")]
    IndexBuild {
        /// Module key the index was requested for.
        module: String,
        /// Description of the failure.
        reason: String,
    },

    /// An index artifact exists but cannot be trusted.
    #[error("index artifact corrupt: {}: {reason}", path.display())]
    IndexCorrupt {
        /// Path to the artifact.
        path: PathBuf,
        /// Description of the corruption.
        reason: String,
    },

    /// Underlying I/O error from the filesystem.
    #[error("io: {0}")]
    Io(
        /// The wrapped I/O error.
        #[from]
        std::io::Error,
    ),

    /// JSON (de)serialization failed.
    #[error("json: {0}")]
    Json(
        /// The wrapped JSON error.
        #[from]
        serde_json::Error,
    ),

    /// A module name or path does not point at an existing store.
    #[error("module not found: `{name}` (looked in {})", dir.display())]
    ModuleNotFound {
        /// Directory that was searched.
        dir: PathBuf,
        /// Module name or path as given.
        name: String,
    },

    /// A name table is structurally invalid.
    #[error("name table invalid: {reason}")]
    NameTable {
        /// Description of the problem.
        reason: String,
    },

    /// The verse store reported a SQLite error.
    #[error("sqlite: {0}")]
    Sqlite(
        /// The wrapped SQLite error.
        #[from]
        rusqlite::Error,
    ),

    /// TOML deserialization failed.
    #[error("toml deserialize: {0}")]
    TomlDe(
        /// The wrapped TOML deserialization error.
        #[from]
        toml::de::Error,
    ),
}
