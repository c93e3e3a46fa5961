use crate::diagnostics::Severity;
use crate::error::{CheckError, CheckResult};
use crate::level::CheckLevel;
use std::collections::HashMap;

// ============================================================================
// Check Categories
// ============================================================================

/// Error classes produced by the checker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CheckCategory {
    /// Aliasing, cross-boundary passing or aggregate binding of a resource.
    StructuralMisuse,
    /// Array field read through a handle whose group buffer may be overwritten.
    Staleness,
    /// Array field read through a handle whose group slot is not a constant.
    NonConstantIndex,
    /// A parameter object built and then dropped on the floor.
    UnusedResource,
}

impl CheckCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckCategory::StructuralMisuse => "structural_misuse",
            CheckCategory::Staleness => "staleness",
            CheckCategory::NonConstantIndex => "non_constant_index",
            CheckCategory::UnusedResource => "unused_resource",
        }
    }
}

/// Analysis kinds determine how a check examines a routine:
/// - `Structural` checks walk statements without looking at control flow
/// - `Dataflow` checks run on the fixpoint of a CFG analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Hash)]
pub enum AnalysisKind {
    #[default]
    Structural,
    Dataflow,
}

impl AnalysisKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisKind::Structural => "structural",
            AnalysisKind::Dataflow => "dataflow",
        }
    }
}

/// Static metadata describing a check.
#[derive(Debug, PartialEq, Eq)]
pub struct CheckDescriptor {
    pub name: &'static str,
    pub category: CheckCategory,
    pub description: &'static str,
    /// Severity emitted when no configuration applies.
    pub severity: Severity,
    /// Fatal checks guard soundness and cannot be reconfigured.
    pub fatal: bool,
    pub analysis: AnalysisKind,
}

impl CheckDescriptor {
    const fn fatal(
        name: &'static str,
        category: CheckCategory,
        analysis: AnalysisKind,
        description: &'static str,
    ) -> Self {
        Self {
            name,
            category,
            description,
            severity: Severity::Error,
            fatal: true,
            analysis,
        }
    }
}

// ============================================================================
// Structural checks
// ============================================================================

pub static RESOURCE_REASSIGNMENT: CheckDescriptor = CheckDescriptor::fatal(
    "resource_reassignment",
    CheckCategory::StructuralMisuse,
    AnalysisKind::Structural,
    "Inner transaction parameters or results bound from another binding instead of a fresh construction or submit",
);

pub static RESOURCE_IN_ASSIGNMENT_EXPRESSION: CheckDescriptor = CheckDescriptor::fatal(
    "resource_in_assignment_expression",
    CheckCategory::StructuralMisuse,
    AnalysisKind::Structural,
    "Inner transaction parameters or results used in an assignment expression",
);

pub static RESOURCE_ESCAPE: CheckDescriptor = CheckDescriptor::fatal(
    "resource_escape",
    CheckCategory::StructuralMisuse,
    AnalysisKind::Structural,
    "Inner transaction parameters or results passed to or returned from a subroutine",
);

pub static RESOURCE_SIGNATURE: CheckDescriptor = CheckDescriptor::fatal(
    "resource_signature",
    CheckCategory::StructuralMisuse,
    AnalysisKind::Structural,
    "Subroutine parameter or return type declared as inner transaction parameters or result",
);

pub static GROUP_NOT_DESTRUCTURED: CheckDescriptor = CheckDescriptor::fatal(
    "group_not_destructured",
    CheckCategory::StructuralMisuse,
    AnalysisKind::Structural,
    "Grouped submit result not destructured into one name per transaction",
);

pub static RESOURCE_IN_TUPLE: CheckDescriptor = CheckDescriptor::fatal(
    "resource_in_tuple",
    CheckCategory::StructuralMisuse,
    AnalysisKind::Structural,
    "Inner transaction parameters or results stored inside a tuple",
);

pub static EXPRESSION_RESULT_IGNORED: CheckDescriptor = CheckDescriptor {
    name: "expression_result_ignored",
    category: CheckCategory::UnusedResource,
    description: "Value of an expression statement is discarded",
    severity: Severity::Warning,
    fatal: false,
    analysis: AnalysisKind::Structural,
};

pub static UNSUBMITTED_PARAMS: CheckDescriptor = CheckDescriptor::fatal(
    "unsubmitted_params",
    CheckCategory::UnusedResource,
    AnalysisKind::Structural,
    "Inner transaction parameters constructed as a statement and never submitted",
);

// ============================================================================
// Dataflow checks
// ============================================================================

pub static STALE_ARRAY_READ: CheckDescriptor = CheckDescriptor::fatal(
    "stale_array_read",
    CheckCategory::Staleness,
    AnalysisKind::Dataflow,
    "Array field read from an inner transaction after another submit may have overwritten it",
);

pub static NON_CONSTANT_GROUP_INDEX: CheckDescriptor = CheckDescriptor::fatal(
    "non_constant_group_index",
    CheckCategory::NonConstantIndex,
    AnalysisKind::Dataflow,
    "Array field read from an inner transaction whose group index depends on control flow",
);

static ALL_CHECKS: &[&CheckDescriptor] = &[
    &RESOURCE_REASSIGNMENT,
    &RESOURCE_IN_ASSIGNMENT_EXPRESSION,
    &RESOURCE_ESCAPE,
    &RESOURCE_SIGNATURE,
    &GROUP_NOT_DESTRUCTURED,
    &RESOURCE_IN_TUPLE,
    &EXPRESSION_RESULT_IGNORED,
    &UNSUBMITTED_PARAMS,
    &STALE_ARRAY_READ,
    &NON_CONSTANT_GROUP_INDEX,
];

pub fn all_checks() -> &'static [&'static CheckDescriptor] {
    ALL_CHECKS
}

pub fn find_check(name: &str) -> Option<&'static CheckDescriptor> {
    ALL_CHECKS.iter().copied().find(|c| c.name == name)
}

/// Per-check configuration derived from `itxn-check.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckSettings {
    levels: HashMap<&'static str, CheckLevel>,
}

impl CheckSettings {
    /// Apply configured levels. Unknown names and attempts to reconfigure a
    /// fatal check are rejected.
    pub fn with_config_levels(
        mut self,
        levels: impl IntoIterator<Item = (String, CheckLevel)>,
    ) -> CheckResult<Self> {
        for (name, level) in levels {
            let check = configurable(&name)?;
            self.levels.insert(check.name, level);
        }
        Ok(self)
    }

    pub fn disable(mut self, disabled: impl IntoIterator<Item = String>) -> CheckResult<Self> {
        for name in disabled {
            let check = configurable(&name)?;
            self.levels.insert(check.name, CheckLevel::Allow);
        }
        Ok(self)
    }

    /// Severity to emit for `check`, `None` when the check is allowed.
    pub fn severity_for(&self, check: &'static CheckDescriptor) -> Option<Severity> {
        if check.fatal {
            return Some(check.severity);
        }
        match self.levels.get(check.name) {
            Some(level) => level.severity(),
            None => Some(check.severity),
        }
    }
}

fn configurable(name: &str) -> CheckResult<&'static CheckDescriptor> {
    let Some(check) = find_check(name) else {
        crate::check_bail!("unknown check `{name}`");
    };
    if check.fatal {
        return Err(CheckError::config(format!(
            "check `{name}` guards against reading overwritten transaction data and cannot be reconfigured"
        )));
    }
    Ok(check)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_names_are_unique() {
        let mut names: Vec<_> = all_checks().iter().map(|c| c.name).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), all_checks().len());
    }

    #[test]
    fn fatal_checks_cannot_be_downgraded() {
        let err = CheckSettings::default()
            .with_config_levels([("stale_array_read".to_string(), CheckLevel::Allow)])
            .unwrap_err();
        assert!(matches!(err, CheckError::Config(_)));
    }

    #[test]
    fn advisory_check_can_be_promoted() {
        let settings = CheckSettings::default()
            .with_config_levels([(
                "expression_result_ignored".to_string(),
                CheckLevel::Error,
            )])
            .unwrap();
        assert_eq!(
            settings.severity_for(&EXPRESSION_RESULT_IGNORED),
            Some(Severity::Error)
        );
    }

    #[test]
    fn unknown_check_is_rejected() {
        assert!(CheckSettings::default().disable(["nope".to_string()]).is_err());
    }
}
