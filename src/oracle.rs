//! Call-effect oracle: whether calling a routine may submit an inner transaction.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Read-only, precomputed may-submit facts keyed by routine identity.
pub trait CallEffects {
    fn may_submit(&self, routine: &str) -> bool;
}

/// Explicit may-submit map with a fallback for routines it does not name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaySubmitSummary {
    routines: BTreeMap<String, bool>,
    /// Answer for routines missing from the map; `true` keeps the analysis sound.
    unknown_may_submit: bool,
}

impl Default for MaySubmitSummary {
    fn default() -> Self {
        Self {
            routines: BTreeMap::new(),
            unknown_may_submit: true,
        }
    }
}

impl MaySubmitSummary {
    pub fn new(routines: BTreeMap<String, bool>, unknown_may_submit: bool) -> Self {
        Self {
            routines,
            unknown_may_submit,
        }
    }

    pub fn insert(&mut self, routine: impl Into<String>, may_submit: bool) {
        self.routines.insert(routine.into(), may_submit);
    }

    pub fn unknown_may_submit(&self) -> bool {
        self.unknown_may_submit
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> {
        self.routines.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl CallEffects for MaySubmitSummary {
    fn may_submit(&self, routine: &str) -> bool {
        self.routines
            .get(routine)
            .copied()
            .unwrap_or(self.unknown_may_submit)
    }
}

impl<F: Fn(&str) -> bool> CallEffects for F {
    fn may_submit(&self, routine: &str) -> bool {
        self(routine)
    }
}
