//! Evaluation-order effects of statements.
//!
//! Both dataflow analyses see a basic block as a flat sequence of the events
//! that matter to them: submissions, calls that may submit, array reads
//! through handles, and (re)definitions of handle bindings. Events are emitted
//! in evaluation order, so `f(h.logs[0])` reads before calling `f` while
//! `h2 = submit(p)` invalidates before defining `h2`. A tuple destructuring
//! `a, b = submit(p), submit(q)` is modelled element by element, so the
//! second submit invalidates `a`.

use crate::cfg::Cfg;
use crate::classify::{BindingTable, ResourceKind};
use crate::diagnostics::Span;
use crate::escape::Demotions;
use crate::fields::TxnField;
use crate::ir::{BlockId, Expr, ExprKind, Stmt, StmtKind, Target, Terminator};
use crate::oracle::CallEffects;

/// How a handle binding got its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Destructured or bound directly from a submit expression.
    Submission {
        site: Span,
        position: usize,
        group_size: usize,
    },
    /// Anything else, or a binding that stops being tracked after a
    /// structural violation; the binding's facts are forgotten.
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect<'p> {
    /// Array field read through a handle binding.
    ArrayRead {
        binding: &'p str,
        field: TxnField,
        span: Span,
    },
    /// Array field read straight off a single submit expression.
    InlineArrayRead { field: TxnField, span: Span },
    Submit { span: Span },
    /// Call of a routine whose may-submit summary is true.
    Call { target: &'p str, span: Span },
    Define {
        name: &'p str,
        span: Span,
        origin: Origin,
    },
}

impl Effect<'_> {
    /// Whether this event may overwrite the transaction group buffer.
    pub fn invalidates(&self) -> bool {
        matches!(self, Effect::Submit { .. } | Effect::Call { .. })
    }
}

/// Precomputed effects for every block of a routine.
#[derive(Debug)]
pub struct BlockEffects<'p> {
    blocks: Vec<Vec<Effect<'p>>>,
}

impl<'p> BlockEffects<'p> {
    pub fn compute(
        cfg: &Cfg<'p>,
        bindings: &BindingTable,
        oracle: &dyn CallEffects,
        demotions: &Demotions<'p>,
    ) -> Self {
        let blocks = cfg
            .routine()
            .blocks
            .iter()
            .map(|block| {
                let mut collector = Collector {
                    bindings,
                    oracle,
                    out: Vec::new(),
                };
                for (index, stmt) in block.stmts.iter().enumerate() {
                    collector.stmt(stmt);
                    collector.forget(demotions.after(block.id, index));
                }
                collector.terminator(&block.terminator);
                collector.forget(demotions.after(block.id, block.stmts.len()));
                collector.out
            })
            .collect();
        Self { blocks }
    }

    pub fn of(&self, block: BlockId) -> &[Effect<'p>] {
        &self.blocks[block.index()]
    }
}

/// Effects of a single statement, in evaluation order.
pub fn stmt_effects<'p>(
    stmt: &'p Stmt,
    bindings: &BindingTable,
    oracle: &dyn CallEffects,
) -> Vec<Effect<'p>> {
    let mut collector = Collector {
        bindings,
        oracle,
        out: Vec::new(),
    };
    collector.stmt(stmt);
    collector.out
}

struct Collector<'a, 'p> {
    bindings: &'a BindingTable,
    oracle: &'a dyn CallEffects,
    out: Vec<Effect<'p>>,
}

impl<'p> Collector<'_, 'p> {
    fn stmt(&mut self, stmt: &'p Stmt) {
        match &stmt.kind {
            StmtKind::Assign { targets, value } => match &value.kind {
                ExprKind::Tuple { items } if items.len() == targets.len() && targets.len() > 1 => {
                    for (target, item) in targets.iter().zip(items) {
                        self.expr(item);
                        self.define(target, origin_of(item, 0, 1));
                    }
                }
                _ => self.assign(targets, value),
            },
            StmtKind::Expr { expr } => self.expr(expr),
        }
    }

    fn assign(&mut self, targets: &'p [Target], value: &'p Expr) {
        self.expr(value);
        for (position, target) in targets.iter().enumerate() {
            let origin = origin_of(value, position, targets.len());
            self.define(target, origin);
        }
    }

    fn terminator(&mut self, terminator: &'p Terminator) {
        match terminator {
            Terminator::Branch { cond, .. } => self.expr(cond),
            Terminator::Return {
                value: Some(value), ..
            } => self.expr(value),
            Terminator::Return { value: None, .. } | Terminator::Goto { .. } => {}
        }
    }

    fn expr(&mut self, expr: &'p Expr) {
        for child in expr.children() {
            self.expr(child);
        }

        match &expr.kind {
            ExprKind::FieldRead { base, field, .. } if field.is_array() => match &base.kind {
                ExprKind::Var { name } if self.bindings.kind_of(name) == ResourceKind::Handle => {
                    self.out.push(Effect::ArrayRead {
                        binding: name,
                        field: *field,
                        span: expr.span,
                    });
                }
                ExprKind::Submit { params } if params.len() == 1 => {
                    self.out.push(Effect::InlineArrayRead {
                        field: *field,
                        span: expr.span,
                    });
                }
                _ => {}
            },
            ExprKind::Submit { .. } => self.out.push(Effect::Submit { span: expr.span }),
            ExprKind::Call { target, .. } if self.oracle.may_submit(target) => {
                self.out.push(Effect::Call {
                    target,
                    span: expr.span,
                });
            }
            ExprKind::AssignExpr { target, value } => {
                let origin = origin_of(value, 0, 1);
                self.define(target, origin);
            }
            _ => {}
        }
    }

    fn forget(&mut self, demoted: &[(&'p str, Span)]) {
        for &(name, span) in demoted {
            if self.bindings.kind_of(name) == ResourceKind::Handle {
                self.out.push(Effect::Define {
                    name,
                    span,
                    origin: Origin::Other,
                });
            }
        }
    }

    fn define(&mut self, target: &'p Target, origin: Origin) {
        if self.bindings.kind_of(&target.name) != ResourceKind::Handle {
            return;
        }
        self.out.push(Effect::Define {
            name: &target.name,
            span: target.span,
            origin,
        });
    }
}

/// Origin of the `position`-th of `targets` values bound from `value`.
fn origin_of(value: &Expr, position: usize, targets: usize) -> Origin {
    match &value.kind {
        ExprKind::Submit { params } if params.len() == targets => Origin::Submission {
            site: value.span,
            position,
            group_size: params.len(),
        },
        _ => Origin::Other,
    }
}
