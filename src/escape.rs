//! Structural rules for inner transaction parameters and handles.
//!
//! Builders and handles behave as linear values scoped to the routine that
//! created them. This pass walks every statement once, without looking at
//! control flow, and rejects the forms that would let a resource alias another
//! binding, leave the routine, or lose its per-element facts inside an
//! aggregate.

use crate::checks::{
    EXPRESSION_RESULT_IGNORED, GROUP_NOT_DESTRUCTURED, RESOURCE_ESCAPE,
    RESOURCE_IN_ASSIGNMENT_EXPRESSION, RESOURCE_IN_TUPLE, RESOURCE_REASSIGNMENT,
    RESOURCE_SIGNATURE, UNSUBMITTED_PARAMS,
};
use crate::classify::{BindingTable, ResourceKind, classify};
use crate::diagnostics::{Diagnostic, DiagnosticSink, Span};
use crate::ir::{BlockId, Expr, ExprKind, Program, Routine, StmtKind, Target, Terminator};
use std::collections::{BTreeMap, BTreeSet};

/// Bindings that took part in a violation and where they stop being tracked.
///
/// Resources declared in the signature are untracked in the whole routine.
/// Any other offender is forgotten right after the statement that misused it,
/// so reads before the violation are still judged.
#[derive(Debug, Default)]
pub struct Demotions<'p> {
    routine_wide: BTreeSet<&'p str>,
    /// Keyed by block and statement index; the terminator has index `stmts.len()`.
    after: BTreeMap<(BlockId, usize), Vec<(&'p str, Span)>>,
}

impl<'p> Demotions<'p> {
    pub fn routine_wide(&self) -> impl Iterator<Item = &'p str> + '_ {
        self.routine_wide.iter().copied()
    }

    /// Bindings to forget after statement `stmt` of `block`, with the span of
    /// the violation.
    pub fn after(&self, block: BlockId, stmt: usize) -> &[(&'p str, Span)] {
        self.after
            .get(&(block, stmt))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Every demoted name, wherever it is demoted.
    pub fn names(&self) -> BTreeSet<&'p str> {
        let mut names = self.routine_wide.clone();
        names.extend(self.after.values().flatten().map(|(name, _)| *name));
        names
    }
}

/// Run every structural rule over `routine`.
///
/// Returns the bindings that took part in a violation; the caller stops
/// tracking them in the dataflow analyses.
pub fn enforce<'p>(
    program: &'p Program,
    routine: &'p Routine,
    bindings: &BindingTable,
    sink: &mut DiagnosticSink,
) -> Demotions<'p> {
    let mut enforcer = EscapeEnforcer {
        program,
        routine,
        bindings,
        sink,
        cursor: None,
        demoted: Demotions::default(),
    };
    enforcer.signature();
    for block in &routine.blocks {
        for (index, stmt) in block.stmts.iter().enumerate() {
            enforcer.cursor = Some((block.id, index));
            match &stmt.kind {
                StmtKind::Assign { targets, value } => enforcer.assign(targets, value),
                StmtKind::Expr { expr } => enforcer.bare_statement(expr),
            }
        }
        enforcer.cursor = Some((block.id, block.stmts.len()));
        enforcer.terminator(&block.terminator);
    }
    enforcer.demoted
}

struct EscapeEnforcer<'p, 's> {
    program: &'p Program,
    routine: &'p Routine,
    bindings: &'s BindingTable,
    sink: &'s mut DiagnosticSink,
    /// Statement being checked; `None` while checking the signature.
    cursor: Option<(BlockId, usize)>,
    demoted: Demotions<'p>,
}

impl<'p> EscapeEnforcer<'p, '_> {
    fn report(&mut self, diag: Diagnostic, offender: Option<&'p str>) {
        if let Some(name) = offender {
            self.demote(name, diag.span);
        }
        self.sink.push(diag);
    }

    fn demote(&mut self, name: &'p str, span: Span) {
        match self.cursor {
            Some(at) => self.demoted.after.entry(at).or_default().push((name, span)),
            None => {
                self.demoted.routine_wide.insert(name);
            }
        }
    }

    fn signature(&mut self) {
        let routine = self.routine;
        for param in &routine.params {
            if param.kind.is_resource() {
                self.report(
                    Diagnostic::new(
                        &RESOURCE_SIGNATURE,
                        param.span,
                        format!(
                            "parameter `{}` of subroutine `{}` is declared as {}, which cannot be passed between subroutines",
                            param.name,
                            routine.name,
                            param.kind.describe()
                        ),
                    ),
                    Some(param.name.as_str()),
                );
            }
        }
        if routine.returns.is_resource() {
            let span = routine.returns_span.unwrap_or(routine.span);
            self.report(
                Diagnostic::new(
                    &RESOURCE_SIGNATURE,
                    span,
                    format!(
                        "subroutine `{}` declares a return type of {}, which cannot be returned from a subroutine",
                        routine.name,
                        routine.returns.describe()
                    ),
                ),
                None,
            );
        }
    }

    fn assign(&mut self, targets: &'p [Target], value: &'p Expr) {
        match (targets, &value.kind) {
            ([target], _) => self.bind(target, value),
            (_, ExprKind::Submit { params }) if params.len() != targets.len() => {
                let diag = Diagnostic::new(
                    &GROUP_NOT_DESTRUCTURED,
                    value.span,
                    format!(
                        "submit of {} inner transaction(s) is destructured into {} names; use exactly one name per submitted transaction",
                        params.len(),
                        targets.len()
                    ),
                );
                for target in targets {
                    self.demote(&target.name, diag.span);
                }
                self.sink.push(diag);
                self.visit_children(value);
            }
            (_, ExprKind::Tuple { items }) if items.len() == targets.len() => {
                for (target, item) in targets.iter().zip(items) {
                    self.bind(target, item);
                }
            }
            _ => self.visit(value, true),
        }
    }

    /// Rules for binding `value` to the single name `target`.
    fn bind(&mut self, target: &'p Target, value: &'p Expr) {
        let production = classify(value, self.bindings);
        if production.is_group() {
            self.report(
                Diagnostic::new(
                    &GROUP_NOT_DESTRUCTURED,
                    target.span,
                    format!(
                        "result of submitting {} inner transactions is bound to the single name `{}`; destructure it into {} names, one per transaction",
                        production.arity, target.name, production.arity
                    ),
                ),
                Some(target.name.as_str()),
            );
            self.visit_children(value);
            return;
        }

        if production.kind.is_resource() && !production.fresh {
            let source = subject(value, production.kind);
            let message = match production.kind {
                ResourceKind::Handle => format!(
                    "{source} cannot be reassigned to `{}`; read its fields through the original name",
                    target.name
                ),
                _ => format!(
                    "{source} cannot be reassigned to `{}`; parameters must be copied using the explicit copy operation",
                    target.name
                ),
            };
            self.report(
                Diagnostic::new(&RESOURCE_REASSIGNMENT, value.span, message),
                Some(target.name.as_str()),
            );
        }
        self.visit(value, false);
    }

    fn bare_statement(&mut self, expr: &'p Expr) {
        if matches!(
            expr.kind,
            ExprKind::CreateParams { .. } | ExprKind::CopyParams { .. }
        ) {
            self.sink.push(Diagnostic::new(
                &EXPRESSION_RESULT_IGNORED,
                expr.span,
                "expression result is ignored",
            ));
            self.sink.push(Diagnostic::new(
                &UNSUBMITTED_PARAMS,
                expr.span,
                "statement has no effect, did you forget to submit the inner transaction parameters?",
            ));
        }
        // a bare submit is executed for its side effect, grouped or not
        self.visit(expr, true);
    }

    fn terminator(&mut self, terminator: &'p Terminator) {
        match terminator {
            Terminator::Branch { cond, .. } => self.visit(cond, false),
            Terminator::Return {
                value: Some(value), ..
            } => {
                let production = classify(value, self.bindings);
                if production.kind.is_resource() {
                    self.report(
                        Diagnostic::new(
                            &RESOURCE_ESCAPE,
                            value.span,
                            format!(
                                "{} cannot be returned from subroutine `{}`",
                                subject(value, production.kind),
                                self.routine.name
                            ),
                        ),
                        binding_name(value),
                    );
                    self.visit_children(value);
                } else {
                    self.visit(value, false);
                }
            }
            Terminator::Return { value: None, .. } | Terminator::Goto { .. } => {}
        }
    }

    /// Check `expr` and everything below it. `group_allowed` is true only at
    /// positions where a grouped submit's arity has already been checked.
    fn visit(&mut self, expr: &'p Expr, group_allowed: bool) {
        let group_size = match &expr.kind {
            ExprKind::Submit { params } => params.len(),
            _ => 0,
        };
        if group_size > 1 && !group_allowed {
            self.sink.push(Diagnostic::new(
                &GROUP_NOT_DESTRUCTURED,
                expr.span,
                format!(
                    "result of submitting {group_size} inner transactions must be destructured by an assignment, one name per transaction"
                ),
            ));
        }
        self.visit_node(expr);
    }

    /// Rules that apply to the operands of `expr`, then recurse.
    fn visit_node(&mut self, expr: &'p Expr) {
        match &expr.kind {
            ExprKind::Call { target, args } => {
                for (index, arg) in args.iter().enumerate() {
                    let production = classify(arg, self.bindings);
                    if !production.kind.is_resource() {
                        self.visit(arg, false);
                        continue;
                    }
                    let param = self.param_label(target, index);
                    self.report(
                        Diagnostic::new(
                            &RESOURCE_ESCAPE,
                            arg.span,
                            format!(
                                "{} cannot be passed to subroutine `{target}` as {param}",
                                subject(arg, production.kind)
                            ),
                        ),
                        binding_name(arg),
                    );
                    self.visit_children(arg);
                }
            }
            ExprKind::AssignExpr { target, value } => {
                let production = classify(value, self.bindings);
                if production.kind.is_resource() {
                    self.report(
                        Diagnostic::new(
                            &RESOURCE_IN_ASSIGNMENT_EXPRESSION,
                            expr.span,
                            format!(
                                "{} cannot be bound to `{}` inside an assignment expression; use an assignment statement",
                                subject(value, production.kind),
                                target.name
                            ),
                        ),
                        Some(target.name.as_str()),
                    );
                    self.visit_children(value);
                } else {
                    self.visit(value, false);
                }
            }
            ExprKind::Tuple { items } => {
                for item in items {
                    let production = classify(item, self.bindings);
                    if !production.kind.is_resource() {
                        self.visit(item, false);
                        continue;
                    }
                    self.report(
                        Diagnostic::new(
                            &RESOURCE_IN_TUPLE,
                            item.span,
                            format!(
                                "{} cannot be stored in a tuple; bind it to its own name instead",
                                subject(item, production.kind)
                            ),
                        ),
                        binding_name(item),
                    );
                    self.visit_children(item);
                }
            }
            _ => self.visit_children(expr),
        }
    }

    fn visit_children(&mut self, expr: &'p Expr) {
        for child in expr.children() {
            self.visit(child, false);
        }
    }

    fn param_label(&self, callee: &str, index: usize) -> String {
        self.program
            .routine(callee)
            .and_then(|r| r.params.get(index))
            .map(|p| format!("parameter `{}`", p.name))
            .unwrap_or_else(|| format!("argument {}", index + 1))
    }
}

fn binding_name(expr: &Expr) -> Option<&str> {
    match &expr.kind {
        ExprKind::Var { name } => Some(name),
        ExprKind::AssignExpr { target, .. } => Some(target.name.as_str()),
        _ => None,
    }
}

/// `inner transaction `h``, or just the kind for unnamed values.
fn subject(expr: &Expr, kind: ResourceKind) -> String {
    match binding_name(expr) {
        Some(name) => format!("{} `{name}`", kind.describe()),
        None => kind.describe().to_string(),
    }
}
