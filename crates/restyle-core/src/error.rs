use std::fmt;
use thiserror::Error;

/// Failures that can occur while constructing an engine. Malformed stylesheet
/// input is never an error: it is repaired or surfaced as a [`Warning`].
#[derive(Error, Debug)]
pub enum RestyleError {
    #[error("invalid pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        source: regex::Error,
    },

    #[error("invalid JSON configuration: {0}")]
    Config(#[from] serde_json::Error),

    #[error("mixin '{name}' declares an empty arity range")]
    EmptyArity { name: String },
}

/// Non-fatal condition recorded during a migration run. The caller decides
/// whether accumulated warnings should block a downstream write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    pub kind: WarningKind,
    pub detail: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    /// Brace depth never returned to zero before end of input.
    UnterminatedBlock,
    /// An `@include` named a mixin the registry does not know.
    UnknownMixin,
    /// A rule matched both a chrome-exclusion pattern and a migration
    /// category; exclusion won.
    AmbiguousCategory,
    /// Mismatched parentheses inside a selector list; the list was treated
    /// as a single unit instead of being split.
    MalformedSelectorList,
    /// The repair pass could not reach brace balance.
    UnbalancedOutput,
}

impl Warning {
    pub fn new(kind: WarningKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.detail)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Span {
    pub line: usize,
    pub column: usize,
}

impl Span {
    pub const fn dummy() -> Self {
        Self { line: 0, column: 0 }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.line == 0 && self.column == 0 {
            write!(f, "<unknown>")
        } else {
            write!(f, "{}:{}", self.line, self.column)
        }
    }
}
