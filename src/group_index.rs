//! Group index resolution for array reads through handles.
//!
//! Array fields of a handle are read with an opcode that needs the handle's
//! position in its submitted group as a compile-time constant. Each binding is
//! tracked in a flat lattice: absent (bottom), a single constant index, or
//! non-constant once two paths disagree.

use crate::checks::NON_CONSTANT_GROUP_INDEX;
use crate::dataflow::{BindingFacts, ForwardAnalysis, JoinSemiLattice};
use crate::diagnostics::{Diagnostic, Span};
use crate::effects::{Effect, Origin};
use crate::fields::{ArrayReadOp, TxnField};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupSlot {
    Const {
        index: usize,
        /// Size of the submitted group; `None` once paths with different
        /// group sizes merge at the same index.
        group_size: Option<usize>,
        sites: BTreeSet<Span>,
    },
    /// Submit sites paired with the index each one assigns.
    NonConstant { contributions: BTreeSet<(Span, usize)> },
}

impl GroupSlot {
    fn submitted(site: Span, index: usize, group_size: usize) -> Self {
        GroupSlot::Const {
            index,
            group_size: Some(group_size),
            sites: BTreeSet::from([site]),
        }
    }

    fn contributions(&self) -> BTreeSet<(Span, usize)> {
        match self {
            GroupSlot::Const { index, sites, .. } => {
                sites.iter().map(|site| (*site, *index)).collect()
            }
            GroupSlot::NonConstant { contributions } => contributions.clone(),
        }
    }

    /// Constant index, if every path agrees on one.
    pub fn constant(&self) -> Option<usize> {
        match self {
            GroupSlot::Const { index, .. } => Some(*index),
            GroupSlot::NonConstant { .. } => None,
        }
    }
}

impl JoinSemiLattice for GroupSlot {
    fn join(&mut self, other: &Self) -> bool {
        match (&mut *self, other) {
            (
                GroupSlot::Const {
                    index,
                    group_size,
                    sites,
                },
                GroupSlot::Const {
                    index: their_index,
                    group_size: their_size,
                    sites: their_sites,
                },
            ) if *index == *their_index => {
                let before = sites.len();
                sites.extend(their_sites.iter().copied());
                let mut changed = sites.len() != before;
                if group_size.is_some() && *group_size != *their_size {
                    *group_size = None;
                    changed = true;
                }
                changed
            }
            (GroupSlot::NonConstant { contributions }, theirs) => {
                let before = contributions.len();
                contributions.extend(theirs.contributions());
                contributions.len() != before
            }
            (ours, theirs) => {
                let mut contributions = ours.contributions();
                contributions.extend(theirs.contributions());
                *ours = GroupSlot::NonConstant { contributions };
                true
            }
        }
    }
}

pub type GroupState = BindingFacts<GroupSlot>;

/// Dataflow client tracking [`GroupSlot`] per handle binding.
pub struct GroupIndexResolver;

impl<'p> ForwardAnalysis<'p> for GroupIndexResolver {
    type Domain = GroupState;
    const NAME: &'static str = "group_index";

    fn entry_state(&self) -> GroupState {
        GroupState::default()
    }

    fn apply(&self, state: &mut GroupState, effect: &Effect<'p>) {
        match effect {
            Effect::Define {
                name,
                origin:
                    Origin::Submission {
                        site,
                        position,
                        group_size,
                    },
                ..
            } => state.set(name, GroupSlot::submitted(*site, *position, *group_size)),
            Effect::Define {
                name,
                origin: Origin::Other,
                ..
            } => state.remove(name),
            // submissions overwrite contents, never positions
            Effect::Submit { .. }
            | Effect::Call { .. }
            | Effect::ArrayRead { .. }
            | Effect::InlineArrayRead { .. } => {}
        }
    }
}

/// Outcome of resolving one array read.
#[derive(Debug)]
pub enum Resolution {
    Resolved { index: usize, op: ArrayReadOp },
    Rejected(Diagnostic),
    /// The binding holds no handle on any path reaching the read.
    Unbound,
}

/// Resolve an array read of `binding` against the state just before it.
pub fn resolve_read(
    state: &GroupState,
    binding: &str,
    field: TxnField,
    span: Span,
) -> Resolution {
    match state.get(binding) {
        None => Resolution::Unbound,
        Some(GroupSlot::Const {
            index, group_size, ..
        }) => Resolution::Resolved {
            index: *index,
            op: ArrayReadOp::for_slot(*index, *group_size),
        },
        Some(GroupSlot::NonConstant { contributions }) => {
            let mut diag = Diagnostic::new(
                &NON_CONSTANT_GROUP_INDEX,
                span,
                format!(
                    "cannot read array field `{field}` of inner transaction `{binding}` because its position in the submitted group depends on the path taken; move the read into each branch, directly after the submit that defines `{binding}`"
                ),
            );
            for (site, index) in contributions {
                diag = diag.with_related(
                    *site,
                    format!("this submit puts `{binding}` at group index {index}"),
                );
            }
            Resolution::Rejected(diag)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site(row: usize) -> Span {
        Span::on_row(row, 1, 6)
    }

    #[test]
    fn equal_indices_stay_constant_and_collect_sites() {
        let mut left = GroupSlot::submitted(site(1), 0, 1);
        let right = GroupSlot::submitted(site(2), 0, 1);
        assert!(left.join(&right));
        assert_eq!(left.constant(), Some(0));
        assert!(!left.join(&right));
    }

    #[test]
    fn differing_group_sizes_forget_the_size() {
        let mut left = GroupSlot::submitted(site(1), 1, 2);
        assert!(left.join(&GroupSlot::submitted(site(2), 1, 3)));
        let GroupSlot::Const { group_size, .. } = &left else {
            panic!("expected constant slot");
        };
        assert_eq!(*group_size, None);
    }

    #[test]
    fn disagreeing_indices_become_non_constant() {
        let mut left = GroupSlot::submitted(site(1), 0, 1);
        assert!(left.join(&GroupSlot::submitted(site(2), 1, 2)));
        assert_eq!(left.constant(), None);
        assert_eq!(
            left.contributions(),
            BTreeSet::from([(site(1), 0), (site(2), 1)])
        );
        // absorbing
        assert!(!left.join(&GroupSlot::submitted(site(1), 0, 1)));
    }

    #[test]
    fn rejected_read_has_one_note_per_site() {
        let mut state = GroupState::default();
        let mut slot = GroupSlot::submitted(site(1), 0, 1);
        slot.join(&GroupSlot::submitted(site(2), 1, 2));
        state.set("a", slot);

        let Resolution::Rejected(diag) = resolve_read(&state, "a", TxnField::Logs, site(5)) else {
            panic!("expected rejection");
        };
        assert_eq!(diag.related.len(), 2);
        assert!(diag.related[1].message.contains("group index 1"));
    }

    #[test]
    fn last_handle_reads_through_itxnas() {
        let mut state = GroupState::default();
        state.set("b", GroupSlot::submitted(site(1), 1, 2));
        state.set("a", GroupSlot::submitted(site(1), 0, 2));
        assert!(matches!(
            resolve_read(&state, "b", TxnField::Logs, site(2)),
            Resolution::Resolved {
                index: 1,
                op: ArrayReadOp::Itxnas
            }
        ));
        assert!(matches!(
            resolve_read(&state, "a", TxnField::Logs, site(2)),
            Resolution::Resolved {
                index: 0,
                op: ArrayReadOp::Gitxnas { group_index: 0 }
            }
        ));
        assert!(matches!(
            resolve_read(&state, "c", TxnField::Logs, site(2)),
            Resolution::Unbound
        ));
    }
}
