use crate::diagnostics::Severity;
use serde::{Deserialize, Serialize};

/// Configured level of an advisory check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckLevel {
    Allow,
    Warn,
    Error,
}

impl CheckLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckLevel::Allow => "allow",
            CheckLevel::Warn => "warning",
            CheckLevel::Error => "error",
        }
    }

    /// Severity a diagnostic is emitted with, `None` when suppressed.
    pub fn severity(&self) -> Option<Severity> {
        match self {
            CheckLevel::Allow => None,
            CheckLevel::Warn => Some(Severity::Warning),
            CheckLevel::Error => Some(Severity::Error),
        }
    }
}

impl Default for CheckLevel {
    fn default() -> Self {
        Self::Warn
    }
}
