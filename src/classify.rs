//! Ownership classification of expressions and bindings.
//!
//! | Expression | Kind | Fresh |
//! |------------|------|-------|
//! | parameter construction / explicit copy | Builder | ✓ |
//! | `submit(p)` | Handle | ✓ |
//! | `submit(p1, .., pN)` | N × Handle | ✓ |
//! | read of a binding | the binding's kind | ✗ |
//! | anything else | Plain | ✗ |

use crate::ir::{Expr, ExprKind, Routine, StmtKind, Target};
use crate::diagnostics::Span;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Ownership class of a value.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    #[default]
    Plain,
    /// Unsubmitted inner transaction parameters.
    Builder,
    /// Result of submitting inner transaction parameters.
    Handle,
}

impl ResourceKind {
    pub fn is_resource(self) -> bool {
        !matches!(self, ResourceKind::Plain)
    }

    /// Noun used in diagnostics.
    pub fn describe(self) -> &'static str {
        match self {
            ResourceKind::Plain => "value",
            ResourceKind::Builder => "inner transaction parameters",
            ResourceKind::Handle => "inner transaction",
        }
    }
}

/// What an expression produces, as far as ownership is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Production {
    pub kind: ResourceKind,
    /// Number of values produced: `N` for a grouped submit, otherwise 1.
    pub arity: usize,
    /// True for constructors, copies and submits; false for binding reads.
    pub fresh: bool,
}

impl Production {
    const PLAIN: Production = Production {
        kind: ResourceKind::Plain,
        arity: 1,
        fresh: false,
    };

    fn fresh(kind: ResourceKind, arity: usize) -> Self {
        Self {
            kind,
            arity,
            fresh: true,
        }
    }

    pub fn is_group(&self) -> bool {
        self.kind == ResourceKind::Handle && self.arity > 1
    }
}

/// Classify `expr` given the kinds of the routine's bindings.
pub fn classify(expr: &Expr, bindings: &BindingTable) -> Production {
    match &expr.kind {
        ExprKind::Var { name } => Production {
            kind: bindings.kind_of(name),
            arity: 1,
            fresh: false,
        },
        ExprKind::CreateParams { .. } | ExprKind::CopyParams { .. } => {
            Production::fresh(ResourceKind::Builder, 1)
        }
        ExprKind::Submit { params } => Production::fresh(ResourceKind::Handle, params.len()),
        ExprKind::AssignExpr { value, .. } => classify(value, bindings),
        _ => Production::PLAIN,
    }
}

/// A named local and how it was defined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub name: String,
    pub span: Span,
    pub kind: ResourceKind,
    pub from_fresh_production: bool,
}

/// Resource kinds of every name in a routine.
///
/// Names are routine-scoped and the front end has already unified their
/// types, so a single kind per name is enough.
#[derive(Debug, Clone, Default)]
pub struct BindingTable {
    kinds: BTreeMap<String, ResourceKind>,
    bindings: Vec<Binding>,
}

impl BindingTable {
    /// Build the table for `routine`, following binding-to-binding reads until
    /// every name's kind is known.
    pub fn build(routine: &Routine) -> Self {
        let mut table = BindingTable::default();
        for param in &routine.params {
            table.kinds.insert(param.name.clone(), param.kind);
        }

        loop {
            let mut bindings = Vec::new();
            for block in &routine.blocks {
                for stmt in &block.stmts {
                    if let StmtKind::Assign { targets, value } = &stmt.kind {
                        table.collect_assignment(targets, value, &mut bindings);
                    }
                    for_each_assign_expr(stmt.value(), &mut |target, value| {
                        table.collect_assignment(std::slice::from_ref(target), value, &mut bindings);
                    });
                }
            }

            let mut changed = false;
            for binding in &bindings {
                let entry = table.kinds.entry(binding.name.clone()).or_default();
                if binding.kind > *entry {
                    *entry = binding.kind;
                    changed = true;
                }
            }
            table.bindings = bindings;
            if !changed {
                return table;
            }
        }
    }

    fn collect_assignment(&self, targets: &[Target], value: &Expr, out: &mut Vec<Binding>) {
        let production = classify(value, self);
        let per_target: Vec<(ResourceKind, bool)> = match (&value.kind, targets.len()) {
            (_, 1) if production.arity == 1 => vec![(production.kind, production.fresh)],
            // the aggregate itself carries no per-element facts
            (_, 1) => vec![(ResourceKind::Plain, false)],
            (_, n) if production.is_group() && production.arity == n => {
                vec![(ResourceKind::Handle, true); n]
            }
            (ExprKind::Tuple { items }, n) if items.len() == n => items
                .iter()
                .map(|item| {
                    let p = classify(item, self);
                    if p.arity == 1 {
                        (p.kind, p.fresh)
                    } else {
                        (ResourceKind::Plain, false)
                    }
                })
                .collect(),
            (_, n) => vec![(ResourceKind::Plain, false); n],
        };

        for (target, (kind, fresh)) in targets.iter().zip(per_target) {
            out.push(Binding {
                name: target.name.clone(),
                span: target.span,
                kind,
                from_fresh_production: fresh,
            });
        }
    }

    pub fn kind_of(&self, name: &str) -> ResourceKind {
        self.kinds.get(name).copied().unwrap_or_default()
    }

    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    /// Treat `name` as Plain in the whole routine. Used for resources
    /// declared in the signature, which are rejected before any statement.
    pub fn substitute_plain(&mut self, name: &str) {
        if let Some(kind) = self.kinds.get_mut(name) {
            *kind = ResourceKind::Plain;
        }
    }

    pub fn handle_names(&self) -> impl Iterator<Item = &str> {
        self.kinds
            .iter()
            .filter(|(_, kind)| **kind == ResourceKind::Handle)
            .map(|(name, _)| name.as_str())
    }
}

/// Visit every assignment expression nested in `expr`, innermost first.
pub fn for_each_assign_expr<'e>(expr: &'e Expr, f: &mut impl FnMut(&'e Target, &'e Expr)) {
    for child in expr.children() {
        for_each_assign_expr(child, f);
    }
    if let ExprKind::AssignExpr { target, value } = &expr.kind {
        f(target, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{BasicBlock, BlockId, Stmt, Terminator};

    fn span(col: usize) -> Span {
        Span::on_row(1, col, 1)
    }

    fn routine(stmts: Vec<Stmt>) -> Routine {
        Routine {
            name: "r".to_string(),
            span: span(1),
            params: Vec::new(),
            returns: ResourceKind::Plain,
            returns_span: None,
            blocks: vec![BasicBlock {
                id: BlockId(0),
                stmts,
                terminator: Terminator::Return {
                    value: None,
                    span: span(1),
                },
            }],
        }
    }

    #[test]
    fn grouped_submit_produces_one_handle_per_params() {
        let table = BindingTable::default();
        let submit = Expr::submit(vec![Expr::var("p1", span(1)), Expr::var("p2", span(2))], span(3));
        let p = classify(&submit, &table);
        assert_eq!(p.kind, ResourceKind::Handle);
        assert_eq!(p.arity, 2);
        assert!(p.fresh);
        assert!(p.is_group());
    }

    #[test]
    fn binding_kinds_follow_reads_of_other_bindings() {
        let r = routine(vec![
            Stmt::assign(vec![Target::new("c", span(1))], Expr::var("b", span(2)), span(1)),
            Stmt::assign(
                vec![Target::new("b", span(3))],
                Expr::var("a", span(4)),
                span(3),
            ),
            Stmt::assign(
                vec![Target::new("a", span(5))],
                Expr::submit(vec![Expr::create_params(span(6))], span(5)),
                span(5),
            ),
        ]);
        let table = BindingTable::build(&r);
        assert_eq!(table.kind_of("a"), ResourceKind::Handle);
        assert_eq!(table.kind_of("b"), ResourceKind::Handle);
        assert_eq!(table.kind_of("c"), ResourceKind::Handle);
        let c = table.bindings().iter().find(|b| b.name == "c").unwrap();
        assert!(!c.from_fresh_production);
    }

    #[test]
    fn aggregate_binding_of_group_is_plain() {
        let r = routine(vec![Stmt::assign(
            vec![Target::new("t", span(1))],
            Expr::submit(vec![Expr::var("p1", span(2)), Expr::var("p2", span(3))], span(4)),
            span(1),
        )]);
        let table = BindingTable::build(&r);
        assert_eq!(table.kind_of("t"), ResourceKind::Plain);
    }

    #[test]
    fn substitution_demotes_to_plain() {
        let r = routine(vec![Stmt::assign(
            vec![Target::new("h", span(1))],
            Expr::submit(vec![Expr::create_params(span(2))], span(3)),
            span(1),
        )]);
        let mut table = BindingTable::build(&r);
        table.substitute_plain("h");
        assert_eq!(table.kind_of("h"), ResourceKind::Plain);
        assert_eq!(table.handle_names().count(), 0);
    }
}
