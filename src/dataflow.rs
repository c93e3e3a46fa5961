//! Generic forward dataflow over a routine's CFG.
//!
//! An analysis supplies a join-semilattice and a transfer function over
//! [`Effect`]s; [`solve`] computes the least fixpoint of block entry states with
//! a worklist ordered by reverse postorder. Blocks never reached from the entry
//! keep no state at all.

use crate::cfg::Cfg;
use crate::effects::{BlockEffects, Effect};
use crate::ir::BlockId;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// A join-semilattice with an in-place least upper bound.
pub trait JoinSemiLattice: Clone + PartialEq + fmt::Debug {
    /// Replace `self` with `self ⊔ other`; returns whether `self` changed.
    fn join(&mut self, other: &Self) -> bool;
}

/// Per-binding facts. A missing binding is bottom.
#[derive(Clone, PartialEq, Eq)]
pub struct BindingFacts<V> {
    facts: BTreeMap<String, V>,
}

impl<V> Default for BindingFacts<V> {
    fn default() -> Self {
        Self {
            facts: BTreeMap::new(),
        }
    }
}

impl<V> BindingFacts<V> {
    pub fn get(&self, name: &str) -> Option<&V> {
        self.facts.get(name)
    }

    pub fn set(&mut self, name: &str, value: V) {
        self.facts.insert(name.to_string(), value);
    }

    pub fn remove(&mut self, name: &str) {
        self.facts.remove(name);
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut V> {
        self.facts.values_mut()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.facts.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }
}

impl<V: fmt::Debug> fmt::Debug for BindingFacts<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.facts.iter()).finish()
    }
}

impl<V: JoinSemiLattice> JoinSemiLattice for BindingFacts<V> {
    fn join(&mut self, other: &Self) -> bool {
        let mut changed = false;
        for (name, theirs) in &other.facts {
            match self.facts.get_mut(name) {
                Some(ours) => changed |= ours.join(theirs),
                None => {
                    self.facts.insert(name.clone(), theirs.clone());
                    changed = true;
                }
            }
        }
        changed
    }
}

/// A forward analysis over evaluation-order effects.
pub trait ForwardAnalysis<'p> {
    type Domain: JoinSemiLattice;

    /// Name used in trace output.
    const NAME: &'static str;

    /// State on entry to the routine.
    fn entry_state(&self) -> Self::Domain;

    /// Transfer function for one effect. Must be monotone.
    fn apply(&self, state: &mut Self::Domain, effect: &Effect<'p>);
}

/// Least fixpoint of an analysis: the state on entry to every reachable block.
#[derive(Debug)]
pub struct Fixpoint<D> {
    entry_states: Vec<Option<D>>,
    iterations: usize,
}

impl<D> Fixpoint<D> {
    /// Entry state of `block`, `None` if it is unreachable.
    pub fn entry(&self, block: BlockId) -> Option<&D> {
        self.entry_states[block.index()].as_ref()
    }

    /// Number of block visits the worklist needed.
    pub fn iterations(&self) -> usize {
        self.iterations
    }
}

/// Run `analysis` to its least fixpoint over `cfg`.
pub fn solve<'p, A: ForwardAnalysis<'p>>(
    cfg: &Cfg<'p>,
    effects: &BlockEffects<'p>,
    analysis: &A,
) -> Fixpoint<A::Domain> {
    let rpo = cfg.reverse_postorder();
    let mut rpo_index = vec![usize::MAX; cfg.len()];
    for (pos, block) in rpo.iter().enumerate() {
        rpo_index[block.index()] = pos;
    }

    let mut entry_states: Vec<Option<A::Domain>> = vec![None; cfg.len()];
    entry_states[cfg.entry().index()] = Some(analysis.entry_state());

    let mut worklist = BTreeSet::from([rpo_index[cfg.entry().index()]]);
    let mut iterations = 0usize;

    while let Some(pos) = worklist.pop_first() {
        iterations += 1;
        let block = rpo[pos];
        let Some(mut state) = entry_states[block.index()].clone() else {
            continue;
        };
        for effect in effects.of(block) {
            analysis.apply(&mut state, effect);
        }

        for succ in cfg.successors(block) {
            let changed = match &mut entry_states[succ.index()] {
                Some(existing) => existing.join(&state),
                slot => {
                    *slot = Some(state.clone());
                    true
                }
            };
            if changed {
                worklist.insert(rpo_index[succ.index()]);
            }
        }
    }

    crate::trace_debug!(
        analysis = A::NAME,
        routine = cfg.routine().name.as_str(),
        iterations,
        "dataflow fixpoint reached"
    );

    Fixpoint {
        entry_states,
        iterations,
    }
}
