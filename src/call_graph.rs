//! Whole-program call graph and the may-submit summary derived from it.
//!
//! A routine may submit if it contains a submit expression or calls a routine
//! that may submit. The summary is the least fixpoint of that rule, propagated
//! backwards along caller edges, so every member of a call cycle ends up with
//! the disjunction of the cycle's direct facts.

use crate::ir::{Expr, ExprKind, Program, Terminator};
use crate::oracle::MaySubmitSummary;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// Call graph for the entire program.
#[derive(Clone, Debug, Default)]
pub struct CallGraph {
    /// Maps routine -> routines it calls.
    pub calls: BTreeMap<String, BTreeSet<String>>,
    /// Maps routine -> routines calling it.
    pub callers: BTreeMap<String, BTreeSet<String>>,
    /// Routines containing a submit expression.
    pub direct_submitters: BTreeSet<String>,
}

impl CallGraph {
    /// Build a call graph from a typed program.
    pub fn build(program: &Program) -> Self {
        let mut graph = CallGraph::default();

        for routine in &program.routines {
            let mut callees = BTreeSet::new();
            let mut submits = false;
            for block in &routine.blocks {
                let exprs = block
                    .stmts
                    .iter()
                    .map(|s| s.value())
                    .chain(terminator_exprs(&block.terminator));
                for expr in exprs {
                    scan_expr(expr, &mut callees, &mut submits);
                }
            }
            if submits {
                graph.direct_submitters.insert(routine.name.clone());
            }
            graph.calls.insert(routine.name.clone(), callees);
        }

        graph.build_caller_map();
        graph
    }

    fn build_caller_map(&mut self) {
        for (caller, callees) in &self.calls {
            for callee in callees {
                self.callers
                    .entry(callee.clone())
                    .or_default()
                    .insert(caller.clone());
            }
        }
    }

    /// Routines referenced as call targets but not defined in the program.
    pub fn external_routines(&self) -> BTreeSet<&str> {
        self.calls
            .values()
            .flatten()
            .filter(|callee| !self.calls.contains_key(*callee))
            .map(String::as_str)
            .collect()
    }

    /// Compute may-submit for every routine in the program.
    ///
    /// `overrides` pins the answer for the routines it names, defined or
    /// external. Other external routines fall back to `unknown_may_submit`.
    pub fn summarize(
        &self,
        overrides: &BTreeMap<String, bool>,
        unknown_may_submit: bool,
    ) -> MaySubmitSummary {
        let mut may_submit: BTreeSet<String> = self
            .direct_submitters
            .iter()
            .filter(|name| !overrides.contains_key(*name))
            .cloned()
            .collect();
        for external in self.external_routines() {
            if !overrides.contains_key(external) && unknown_may_submit {
                may_submit.insert(external.to_string());
            }
        }
        for (name, submits) in overrides {
            if *submits {
                may_submit.insert(name.clone());
            }
        }

        let mut queue: VecDeque<String> = may_submit.iter().cloned().collect();
        while let Some(current) = queue.pop_front() {
            let Some(callers) = self.callers.get(&current) else {
                continue;
            };
            for caller in callers {
                // an explicit fact wins over anything the graph implies
                if overrides.contains_key(caller) {
                    continue;
                }
                if may_submit.insert(caller.clone()) {
                    queue.push_back(caller.clone());
                }
            }
        }

        let mut summary = MaySubmitSummary::new(BTreeMap::new(), unknown_may_submit);
        for name in self.calls.keys() {
            summary.insert(name.clone(), may_submit.contains(name));
        }
        for name in self.external_routines() {
            summary.insert(name, may_submit.contains(name));
        }
        for (name, submits) in overrides {
            summary.insert(name.clone(), *submits);
        }
        summary
    }
}

fn terminator_exprs(terminator: &Terminator) -> Option<&Expr> {
    match terminator {
        Terminator::Branch { cond, .. } => Some(cond),
        Terminator::Return { value, .. } => value.as_ref(),
        Terminator::Goto { .. } => None,
    }
}

fn scan_expr(expr: &Expr, callees: &mut BTreeSet<String>, submits: &mut bool) {
    match &expr.kind {
        ExprKind::Submit { .. } => *submits = true,
        ExprKind::Call { target, .. } => {
            callees.insert(target.clone());
        }
        _ => {}
    }
    for child in expr.children() {
        scan_expr(child, callees, submits);
    }
}
