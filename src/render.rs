//! Output formats for program reports.

use crate::diagnostics::{Diagnostic, Severity};
use crate::report::{ProgramReport, ResolvedRead};
use serde::Serialize;
use std::fmt::Write as _;

/// Fallback file label for reports whose input named no file.
pub const STDIN_LABEL: &str = "stdin";

fn file_label<'a>(diag: &'a Diagnostic, report: &'a ProgramReport) -> &'a str {
    diag.file
        .as_deref()
        .or(report.file.as_deref())
        .unwrap_or(STDIN_LABEL)
}

/// One line per diagnostic, `file:row:col: severity: code: message`, each
/// followed by its `note:` lines.
pub fn render_pretty(report: &ProgramReport) -> String {
    let mut out = String::new();
    for diag in report.diagnostics() {
        let file = file_label(diag, report);
        for flat in diag.flatten() {
            let _ = writeln!(
                out,
                "{}:{}:{}: {}: {}: {}",
                file,
                flat.span.start.row,
                flat.span.start.column,
                flat.severity.as_str(),
                flat.code,
                flat.message
            );
        }
    }
    out
}

/// GitHub Actions workflow commands. Warnings become errors under
/// `deny_warnings`; related locations become notices.
pub fn render_github(report: &ProgramReport, deny_warnings: bool) -> String {
    let mut out = String::new();
    for diag in report.diagnostics() {
        let file = github_escape(file_label(diag, report));
        for flat in diag.flatten() {
            let kind = match flat.severity {
                Severity::Error => "error",
                Severity::Warning if deny_warnings => "error",
                Severity::Warning => "warning",
                Severity::Note => "notice",
            };
            let _ = writeln!(
                out,
                "::{} file={},line={},col={},endLine={},endColumn={},title={}::{}",
                kind,
                file,
                flat.span.start.row,
                flat.span.start.column,
                flat.span.end.row,
                flat.span.end.column,
                flat.code,
                github_escape(&flat.message)
            );
        }
    }
    out
}

pub fn github_escape(s: &str) -> String {
    s.replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

#[derive(Debug, Serialize)]
pub struct JsonReport {
    pub file: String,
    pub digest: String,
    pub errors: usize,
    pub warnings: usize,
    pub diagnostics: Vec<JsonDiagnostic>,
    pub resolved_reads: Vec<JsonRead>,
}

#[derive(Debug, Serialize)]
pub struct JsonDiagnostic {
    pub routine: String,
    pub row: usize,
    pub column: usize,
    pub end_row: usize,
    pub end_column: usize,
    pub severity: Severity,
    pub code: String,
    pub message: String,
    pub related: Vec<JsonRelated>,
}

#[derive(Debug, Serialize)]
pub struct JsonRelated {
    pub row: usize,
    pub column: usize,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct JsonRead {
    pub routine: String,
    #[serde(flatten)]
    pub read: ResolvedRead,
}

pub fn json_report(report: &ProgramReport) -> JsonReport {
    let mut diagnostics = Vec::new();
    let mut resolved_reads = Vec::new();
    for routine in &report.routines {
        for diag in &routine.diagnostics {
            diagnostics.push(JsonDiagnostic {
                routine: routine.routine.clone(),
                row: diag.span.start.row,
                column: diag.span.start.column,
                end_row: diag.span.end.row,
                end_column: diag.span.end.column,
                severity: diag.severity,
                code: diag.code().to_string(),
                message: diag.message.clone(),
                related: diag
                    .related
                    .iter()
                    .map(|rel| JsonRelated {
                        row: rel.span.start.row,
                        column: rel.span.start.column,
                        message: rel.message.clone(),
                    })
                    .collect(),
            });
        }
        resolved_reads.extend(routine.resolved_reads.iter().map(|read| JsonRead {
            routine: routine.routine.clone(),
            read: read.clone(),
        }));
    }

    JsonReport {
        file: report
            .file
            .clone()
            .unwrap_or_else(|| STDIN_LABEL.to_string()),
        digest: report.digest(),
        errors: report.count(Severity::Error),
        warnings: report.count(Severity::Warning),
        diagnostics,
        resolved_reads,
    }
}
