use std::fmt::Write as _;

use crate::error::{CitationError, Error};

const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

/// Render an error as valid markdown with bold headings and print to stderr.
pub fn print_error(e: &Error) {
    let md = render_error(e);
    for line in md.lines() {
        if line.starts_with('#') {
            eprintln!("{BOLD}{line}{RESET}");
        } else {
            eprintln!("{line}");
        }
    }
}

/// Render an error as a structured markdown diagnostic.
///
/// Each variant produces a block with what happened and, where there is
/// one, how to fix it.
pub fn render_error(e: &Error) -> String {
    return match e {
        Error::Citation(citation) => render_citation_error(citation),
        Error::IndexBuild { module, reason } => format!("\
# Error: Index Build Failed

Could not build the chapter index for `{module}`: {reason}
"),
        Error::IndexCorrupt { path, reason } => format!("\
# Error: Index Artifact Corrupt

`{}`: {reason}

## Fix

Rebuild the index:

    scriptref index <module> --rebuild
", path.display()),
        Error::ModuleNotFound { dir, name } => format!("\
# Error: Module Not Found

`{name}` is neither a file nor a module in `{}`.

## Fix

List the modules that are available:

    scriptref modules
", dir.display()),
        Error::NameTable { reason } => format!("\
# Error: Invalid Name Table

{reason}
"),
        Error::Io(e) => format!("\
# Error: I/O

{e}
"),
        Error::Json(e) => format!("\
# Error: Invalid JSON

{e}
"),
        Error::Sqlite(e) => format!("\
# Error: SQLite

{e}
"),
        Error::TomlDe(e) => format!("\
# Error: Invalid TOML

{e}
"),
    };
}

/// Render a rejected citation with the offending token underlined in its part.
pub fn render_citation_error(e: &CitationError) -> String {
    let (title, context, part) = match e {
        CitationError::BookNotInModule { context, part, .. } => ("Book Not In Module", context, *part),
        CitationError::InvertedRange { context, part, .. } => ("Reversed Range", context, *part),
        CitationError::Malformed { context, part, .. } => ("Malformed Citation", context, *part),
        CitationError::OutOfRange { context, part, .. } => ("Out Of Range", context, *part),
        CitationError::UnknownBook { context, part, .. } => ("Unknown Book", context, *part),
    };

    let mut out = format!("# Error: {title}\n\n{e}\n\n## Part {part}\n\n");
    let _ = writeln!(out, "    {context}");
    if let Some(marker) = underline(context, e.token()) {
        let _ = writeln!(out, "    {marker}");
    }

    let hint = match e {
        CitationError::BookNotInModule { .. } => "This module does not contain that book. Try another module.",
        CitationError::InvertedRange { .. } => {
            "Write the earlier verse first. A bare number after a verse is read as a verse of the same chapter."
        },
        CitationError::Malformed { .. } => "Use `Book chapter`, `Book chapter:verse`, or a `-` range of those.",
        CitationError::OutOfRange { .. } => "Check the chapter and verse numbers against this module.",
        CitationError::UnknownBook { .. } => "List the accepted book names:\n\n    scriptref books <module>",
    };
    let _ = write!(out, "\n## Fix\n\n{hint}\n");
    return out;
}

/// A `^^^` marker under the first occurrence of `token` in `context`.
fn underline(context: &str, token: &str) -> Option<String> {
    if token.is_empty() {
        return None;
    }
    let byte_offset = context.find(token)?;
    let column = context.get(..byte_offset)?.chars().count();
    let width = token.chars().count();
    return Some(format!("{}{}", " ".repeat(column), "^".repeat(width)));
}
