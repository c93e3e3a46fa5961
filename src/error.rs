use thiserror::Error;

/// Result alias for errors emitted by the checker internals.
pub type CheckResult<T> = Result<T, CheckError>;

/// Structured error type for failures that are not diagnostics.
///
/// Problems in the analyzed contract are always reported as
/// [`crate::diagnostics::Diagnostic`]s. This type covers everything that stops
/// the checker from running at all: unreadable input, bad configuration, or a
/// control-flow graph the front end should never have produced.
#[derive(Debug, Error)]
pub enum CheckError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid program input: {0}")]
    Input(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("malformed control-flow graph in routine `{routine}`: {reason}")]
    MalformedCfg { routine: String, reason: String },

    #[error("{0}")]
    Other(String),
}

impl CheckError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn malformed_cfg(routine: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedCfg {
            routine: routine.into(),
            reason: reason.into(),
        }
    }

    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}

/// Convenience macro mirroring `anyhow::bail!` but returning CheckError.
#[macro_export]
macro_rules! check_bail {
    ($($arg:tt)*) => {
        return Err($crate::error::CheckError::other(format!($($arg)*)));
    };
}
