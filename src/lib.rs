//! Inner transaction ownership and staleness checker.
//!
//! The crate consumes a typed control-flow graph per subroutine and rejects
//! programs that mishandle inner transaction parameters ("builders") and
//! submitted transaction results ("handles"): structural misuse such as
//! aliasing or passing them across subroutines, array field reads through a
//! handle whose group buffer may have been overwritten by a later submission,
//! and reads whose position in the submitted group is not a compile-time
//! constant. Reads that pass are resolved to the opcode lowering should emit.

pub mod call_graph;
pub mod cfg;
pub mod checks;
pub mod classify;
pub mod cli;
pub mod config;
pub mod dataflow;
pub mod diagnostics;
pub mod effects;
pub mod error;
pub mod escape;
pub mod fields;
pub mod group_index;
pub mod ir;
pub mod level;
pub mod oracle;
pub mod render;
pub mod report;
pub mod staleness;
pub mod telemetry;

use crate::call_graph::CallGraph;
use crate::cfg::Cfg;
use crate::checks::CheckSettings;
use crate::classify::BindingTable;
use crate::config::EffectsConfig;
use crate::dataflow::{ForwardAnalysis, solve};
use crate::diagnostics::{Diagnostic, DiagnosticSink};
use crate::effects::{BlockEffects, Effect};
use crate::error::CheckResult;
use crate::fields::ArrayReadOp;
use crate::group_index::{GroupIndexResolver, Resolution};
use crate::ir::{Program, Routine};
use crate::oracle::{CallEffects, MaySubmitSummary};
use crate::report::{ProgramReport, ResolvedRead, RoutineReport};
use crate::staleness::StalenessTracker;
use std::path::Path;

/// Checker runs the structural pass and both dataflow analyses per routine.
#[derive(Debug, Clone)]
pub struct Checker {
    settings: CheckSettings,
    effects: EffectsConfig,
}

impl Checker {
    pub fn new(settings: CheckSettings, effects: EffectsConfig) -> Self {
        Self { settings, effects }
    }

    /// May-submit summary for `program`.
    ///
    /// Facts pinned by the input and then by configuration override whatever
    /// the call graph implies; the graph propagates them to callers.
    pub fn summarize(&self, program: &Program) -> MaySubmitSummary {
        let mut pinned = program.may_submit.clone().unwrap_or_default();
        pinned.extend(
            self.effects
                .may_submit
                .iter()
                .map(|(name, submits)| (name.clone(), *submits)),
        );
        CallGraph::build(program).summarize(&pinned, self.effects.unknown_calls_may_submit)
    }

    /// Check every routine of `program`.
    ///
    /// Only malformed input is an `Err`; findings are in the report.
    pub fn check_program(&self, program: &Program) -> CheckResult<ProgramReport> {
        let summary = instrument_block!("summarize", { self.summarize(program) });
        let routines = instrument_block!("check_routines", {
            program
                .routines
                .iter()
                .map(|routine| self.check_routine(program, routine, &summary))
                .collect::<CheckResult<Vec<_>>>()
        })?;
        Ok(ProgramReport {
            file: program.file.clone(),
            routines,
        })
    }

    /// Check one routine of `program` against a may-submit oracle.
    pub fn check_routine(
        &self,
        program: &Program,
        routine: &Routine,
        oracle: &dyn CallEffects,
    ) -> CheckResult<RoutineReport> {
        let cfg = Cfg::new(routine)?;
        let mut bindings = BindingTable::build(routine);
        let mut sink = DiagnosticSink::new();

        let demotions = escape::enforce(program, routine, &bindings, &mut sink);
        for name in demotions.routine_wide() {
            bindings.substitute_plain(name);
        }

        let effects = BlockEffects::compute(&cfg, &bindings, oracle, &demotions);
        let resolved_reads = check_reads(&cfg, &effects, &mut sink);

        let diagnostics = self.finish(sink, program.file.as_deref());
        trace_debug!(
            routine = routine.name.as_str(),
            diagnostics = diagnostics.len(),
            demoted = demotions.names().len(),
            resolved_reads = resolved_reads.len(),
            "routine checked"
        );
        Ok(RoutineReport {
            routine: routine.name.clone(),
            diagnostics,
            resolved_reads,
        })
    }

    /// Apply configured levels, drop allowed checks and sort.
    fn finish(&self, sink: DiagnosticSink, file: Option<&str>) -> Vec<Diagnostic> {
        let mut configured = DiagnosticSink::new();
        for mut diag in sink.into_sorted() {
            let Some(severity) = self.settings.severity_for(diag.check) else {
                continue;
            };
            diag.severity = severity;
            diag.file = file.map(str::to_string);
            configured.push(diag);
        }
        configured.into_sorted()
    }
}

impl Default for Checker {
    fn default() -> Self {
        Self::new(CheckSettings::default(), EffectsConfig::default())
    }
}

/// Solve both analyses, then replay each reachable block with the two states
/// in lockstep to judge every array read at its own program point.
fn check_reads<'p>(
    cfg: &Cfg<'p>,
    effects: &BlockEffects<'p>,
    sink: &mut DiagnosticSink,
) -> Vec<ResolvedRead> {
    let staleness = instrument_block!("staleness", { solve(cfg, effects, &StalenessTracker) });
    let groups = instrument_block!("group_index", { solve(cfg, effects, &GroupIndexResolver) });

    let mut resolved = Vec::new();
    for &block in cfg.reverse_postorder() {
        let (Some(stale_in), Some(group_in)) = (staleness.entry(block), groups.entry(block))
        else {
            continue;
        };
        let mut stale = stale_in.clone();
        let mut group = group_in.clone();

        for effect in effects.of(block) {
            match effect {
                Effect::ArrayRead {
                    binding,
                    field,
                    span,
                } => {
                    // staleness wins: one fatal diagnostic per read site
                    if let Some(diag) = staleness::check_read(&stale, binding, *field, *span) {
                        sink.push(diag);
                    } else {
                        match group_index::resolve_read(&group, binding, *field, *span) {
                            Resolution::Resolved { index, op } => resolved.push(ResolvedRead {
                                span: *span,
                                binding: Some((*binding).to_string()),
                                field: *field,
                                group_index: index,
                                op,
                            }),
                            Resolution::Rejected(diag) => sink.push(diag),
                            Resolution::Unbound => {
                                trace_debug!(binding = *binding, %span, "read of unbound handle");
                            }
                        }
                    }
                }
                Effect::InlineArrayRead { field, span } => resolved.push(ResolvedRead {
                    span: *span,
                    binding: None,
                    field: *field,
                    group_index: 0,
                    op: ArrayReadOp::Itxnas,
                }),
                Effect::Submit { .. } | Effect::Call { .. } | Effect::Define { .. } => {}
            }
            StalenessTracker.apply(&mut stale, effect);
            GroupIndexResolver.apply(&mut group, effect);
        }
    }

    resolved.sort_by_key(|read| read.span);
    resolved
}

/// Parse a program from its JSON form.
pub fn parse_program(source: &str) -> CheckResult<Program> {
    Ok(serde_json::from_str(source)?)
}

/// Read and parse a program file. The file path becomes the report label
/// unless the program names its own source file.
pub fn load_program(path: &Path) -> CheckResult<Program> {
    let source = std::fs::read_to_string(path)?;
    let mut program = parse_program(&source)?;
    if program.file.is_none() {
        program.file = Some(path.display().to_string());
    }
    Ok(program)
}
