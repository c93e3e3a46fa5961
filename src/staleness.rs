//! Staleness tracking for inner transaction handles.
//!
//! `Fresh ⊑ Stale`. A handle is Fresh right after the submit that defined it
//! and turns Stale at any later submit or call that may submit. Merges are
//! pessimistic: Stale on any incoming path means Stale after the merge.

use crate::checks::STALE_ARRAY_READ;
use crate::dataflow::{BindingFacts, ForwardAnalysis, JoinSemiLattice};
use crate::diagnostics::{Diagnostic, Span};
use crate::effects::{Effect, Origin};
use crate::fields::TxnField;
use std::collections::BTreeSet;

/// Program point that may have overwritten the transaction group buffer.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Invalidation {
    pub span: Span,
    /// Routine called, `None` for a submit expression.
    pub call: Option<String>,
}

impl Invalidation {
    fn note(&self, binding: &str) -> String {
        match &self.call {
            None => format!("`{binding}` may be overwritten by this submit"),
            Some(routine) => format!(
                "`{binding}` may be overwritten by this call to `{routine}`, which may submit an inner transaction"
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Staleness {
    Fresh,
    /// Carries every invalidation seen since the binding's last definition.
    Stale { causes: BTreeSet<Invalidation> },
}

impl Staleness {
    pub fn is_fresh(&self) -> bool {
        matches!(self, Staleness::Fresh)
    }

    fn invalidate(&mut self, cause: &Invalidation) {
        match self {
            Staleness::Fresh => {
                *self = Staleness::Stale {
                    causes: BTreeSet::from([cause.clone()]),
                };
            }
            Staleness::Stale { causes } => {
                causes.insert(cause.clone());
            }
        }
    }
}

impl JoinSemiLattice for Staleness {
    fn join(&mut self, other: &Self) -> bool {
        let Staleness::Stale { causes: theirs } = other else {
            return false;
        };
        match self {
            Staleness::Fresh => {
                *self = Staleness::Stale {
                    causes: theirs.clone(),
                };
                true
            }
            Staleness::Stale { causes: ours } => {
                let before = ours.len();
                ours.extend(theirs.iter().cloned());
                ours.len() != before
            }
        }
    }
}

pub type StalenessState = BindingFacts<Staleness>;

/// Dataflow client tracking [`Staleness`] per handle binding.
pub struct StalenessTracker;

impl<'p> ForwardAnalysis<'p> for StalenessTracker {
    type Domain = StalenessState;
    const NAME: &'static str = "staleness";

    fn entry_state(&self) -> StalenessState {
        StalenessState::default()
    }

    fn apply(&self, state: &mut StalenessState, effect: &Effect<'p>) {
        let cause = match effect {
            Effect::Submit { span } => Invalidation {
                span: *span,
                call: None,
            },
            Effect::Call { target, span } => Invalidation {
                span: *span,
                call: Some((*target).to_string()),
            },
            Effect::Define {
                name,
                origin: Origin::Submission { .. },
                ..
            } => {
                state.set(name, Staleness::Fresh);
                return;
            }
            Effect::Define {
                name,
                origin: Origin::Other,
                ..
            } => {
                state.remove(name);
                return;
            }
            Effect::ArrayRead { .. } | Effect::InlineArrayRead { .. } => return,
        };
        for value in state.values_mut() {
            value.invalidate(&cause);
        }
    }
}

/// Check an array read of `binding` against the state just before it.
pub fn check_read(
    state: &StalenessState,
    binding: &str,
    field: TxnField,
    span: Span,
) -> Option<Diagnostic> {
    let Some(Staleness::Stale { causes }) = state.get(binding) else {
        return None;
    };

    let mut diag = Diagnostic::new(
        &STALE_ARRAY_READ,
        span,
        format!(
            "array field `{field}` of inner transaction `{binding}` is read after `{binding}` may have been overwritten by another submit; move this read before the next submit or call that can submit"
        ),
    );
    for cause in causes {
        diag = diag.with_related(cause.span, cause.note(binding));
    }
    Some(diag)
}
