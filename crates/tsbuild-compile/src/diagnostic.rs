//! Compiler diagnostics and `tsc` output parsing.

use std::fmt;
use std::path::{Path, PathBuf};

/// Severity of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Error,
    Warning,
    Suggestion,
    Message,
}

impl Category {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "error" => Some(Self::Error),
            "warning" => Some(Self::Warning),
            "suggestion" => Some(Self::Suggestion),
            "message" => Some(Self::Message),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Suggestion => "suggestion",
            Self::Message => "message",
        }
    }
}

/// Position of a diagnostic in a source file. Line and column are 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub file: PathBuf,
    pub line: u32,
    pub column: u32,
}

/// One compiler diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Where it was reported; `None` for global diagnostics.
    pub location: Option<Location>,
    pub category: Category,
    /// The `TS` code, e.g. `2322`. Zero when the compiler gave none.
    pub code: u32,
    /// Message text; chained messages are joined with newlines.
    pub message: String,
    /// The offending source line, when it has been looked up.
    pub excerpt: Option<String>,
}

impl Diagnostic {
    /// A diagnostic not tied to any file.
    pub fn global(category: Category, code: u32, message: impl Into<String>) -> Self {
        Self {
            location: None,
            category,
            code,
            message: message.into(),
            excerpt: None,
        }
    }

    pub fn is_error(&self) -> bool {
        self.category == Category::Error
    }

    /// File this diagnostic points at, if any.
    pub fn file(&self) -> Option<&Path> {
        self.location.as_ref().map(|l| l.file.as_path())
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(loc) = &self.location {
            write!(f, "{}({},{}): ", loc.file.display(), loc.line, loc.column)?;
        }
        write!(f, "{} TS{}: {}", self.category.as_str(), self.code, self.message)
    }
}

/// Parse the output of `tsc --pretty false`.
///
/// Each diagnostic starts on its own line; indented lines continue the
/// message of the diagnostic before them. Anything else is ignored.
pub fn parse_tsc_output(output: &str) -> Vec<Diagnostic> {
    let mut diagnostics: Vec<Diagnostic> = Vec::new();

    for line in output.lines() {
        if line.trim().is_empty() {
            continue;
        }

        if line.starts_with(char::is_whitespace) {
            if let Some(last) = diagnostics.last_mut() {
                last.message.push('\n');
                last.message.push_str(line.trim());
            }
            continue;
        }

        if let Some(diagnostic) = parse_line(line) {
            diagnostics.push(diagnostic);
        }
    }

    diagnostics
}

fn parse_line(line: &str) -> Option<Diagnostic> {
    if let Some(idx) = line.find("): ") {
        if let Some(location) = parse_location(&line[..=idx]) {
            if let Some(mut diagnostic) = parse_body(&line[idx + 3..]) {
                diagnostic.location = Some(location);
                return Some(diagnostic);
            }
        }
    }
    parse_body(line)
}

/// `path/to/file.ts(12,5)`
fn parse_location(s: &str) -> Option<Location> {
    let open = s.rfind('(')?;
    let inner = s[open + 1..].strip_suffix(')')?;
    let (line, column) = inner.split_once(',')?;
    let file = &s[..open];
    if file.is_empty() {
        return None;
    }

    Some(Location {
        file: PathBuf::from(file),
        line: line.trim().parse().ok()?,
        column: column.trim().parse().ok()?,
    })
}

/// `error TS2322: message`
fn parse_body(s: &str) -> Option<Diagnostic> {
    let (category, rest) = s.split_once(' ')?;
    let category = Category::parse(category)?;
    let (code, message) = rest.strip_prefix("TS")?.split_once(": ")?;

    Some(Diagnostic::global(category, code.parse().ok()?, message))
}
