use crate::checks::CheckDescriptor;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity of a diagnostic. Only `Error` affects the compiler's exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Note,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Note => "note",
        }
    }
}

/// Single position in a contract source file (1-based row/column).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Position {
    pub row: usize,
    pub column: usize,
}

impl Position {
    pub const fn new(row: usize, column: usize) -> Self {
        Self { row, column }
    }
}

/// Span in a contract source file (1-based row/column positions).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Span {
    pub start: Position,
    pub end: Position,
}

impl Span {
    pub const fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// A span covering `len` columns of a single row.
    pub const fn on_row(row: usize, column: usize, len: usize) -> Self {
        Self {
            start: Position::new(row, column),
            end: Position::new(row, column + len),
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.row, self.column)
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.start, f)
    }
}

/// Secondary location attached to a diagnostic, rendered as a note.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct RelatedLocation {
    pub span: Span,
    pub message: String,
}

/// A single finding produced by the checker.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub struct Diagnostic {
    pub check: &'static CheckDescriptor,
    pub severity: Severity,
    pub file: Option<String>,
    pub span: Span,
    pub message: String,
    pub related: Vec<RelatedLocation>,
}

impl Diagnostic {
    pub fn new(check: &'static CheckDescriptor, span: Span, message: impl Into<String>) -> Self {
        Self {
            check,
            severity: check.severity,
            file: None,
            span,
            message: message.into(),
            related: Vec::new(),
        }
    }

    pub fn with_related(mut self, span: Span, message: impl Into<String>) -> Self {
        self.related.push(RelatedLocation {
            span,
            message: message.into(),
        });
        self
    }

    pub fn code(&self) -> &'static str {
        self.check.name
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// The diagnostic followed by one `Note` diagnostic per related location.
    ///
    /// Consumers that only understand flat lists (editors, CI annotations) use
    /// this view; the notes keep the parent's code so they can be grouped.
    pub fn flatten(&self) -> Vec<FlatDiagnostic> {
        let mut out = Vec::with_capacity(1 + self.related.len());
        out.push(FlatDiagnostic {
            severity: self.severity,
            code: self.check.name,
            span: self.span,
            message: self.message.clone(),
        });
        for rel in &self.related {
            out.push(FlatDiagnostic {
                severity: Severity::Note,
                code: self.check.name,
                span: rel.span,
                message: rel.message.clone(),
            });
        }
        out
    }

    fn sort_key(&self) -> (Span, Severity, &'static str, &str) {
        (self.span, self.severity, self.check.name, self.message.as_str())
    }
}

/// One entry of [`Diagnostic::flatten`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlatDiagnostic {
    pub severity: Severity,
    pub code: &'static str,
    pub span: Span,
    pub message: String,
}

/// Accumulates the diagnostics of one routine.
///
/// Nothing here aborts: every check pushes into the sink and the caller
/// decides afterwards whether later compiler phases may run.
#[derive(Debug, Default)]
pub struct DiagnosticSink {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diag: Diagnostic) {
        self.diagnostics.push(diag);
    }

    /// Sorted by primary position; ties broken by severity, code and text so
    /// the order never depends on which analysis ran first.
    pub fn into_sorted(mut self) -> Vec<Diagnostic> {
        for diag in &mut self.diagnostics {
            diag.related.sort();
            diag.related.dedup();
        }
        self.diagnostics
            .sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        self.diagnostics
    }
}
