//! Results of checking a program: diagnostics plus the facts lowering needs.

use crate::diagnostics::{Diagnostic, Severity, Span};
use crate::fields::{ArrayReadOp, TxnField};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt::Write as _;

/// An array field read that passed both dataflow checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedRead {
    pub span: Span,
    /// `None` when the field is read straight off a submit expression.
    pub binding: Option<String>,
    pub field: TxnField,
    pub group_index: usize,
    #[serde(flatten)]
    pub op: ArrayReadOp,
}

#[derive(Debug, Clone)]
pub struct RoutineReport {
    pub routine: String,
    /// Sorted by primary location.
    pub diagnostics: Vec<Diagnostic>,
    /// Sorted by location.
    pub resolved_reads: Vec<ResolvedRead>,
}

impl RoutineReport {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProgramReport {
    pub file: Option<String>,
    /// In input order.
    pub routines: Vec<RoutineReport>,
}

impl ProgramReport {
    pub fn diagnostics(&self) -> impl Iterator<Item = &Diagnostic> {
        self.routines.iter().flat_map(|r| r.diagnostics.iter())
    }

    pub fn has_errors(&self) -> bool {
        self.routines.iter().any(RoutineReport::has_errors)
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics()
            .filter(|d| d.severity == severity)
            .count()
    }

    /// SHA-256 over a canonical rendering of every diagnostic and resolved read.
    ///
    /// Two runs over the same input and summary produce the same digest, so
    /// build tooling can cache on it.
    pub fn digest(&self) -> String {
        let mut canonical = String::new();
        for routine in &self.routines {
            let _ = writeln!(canonical, "routine {}", routine.routine);
            for diag in &routine.diagnostics {
                for flat in diag.flatten() {
                    let _ = writeln!(
                        canonical,
                        "{}\t{}\t{}-{}\t{}",
                        flat.severity.as_str(),
                        flat.code,
                        flat.span.start,
                        flat.span.end,
                        flat.message
                    );
                }
            }
            for read in &routine.resolved_reads {
                let _ = writeln!(
                    canonical,
                    "read\t{}\t{}\t{}\t{}",
                    read.span.start,
                    read.binding.as_deref().unwrap_or("-"),
                    read.field,
                    read.op
                );
            }
        }
        hex::encode(Sha256::digest(canonical.as_bytes()))
    }
}
