//! Error types for flag evaluation

use thiserror::Error;

/// Result type for flag operations
pub type FlagResult<T> = Result<T, FlagError>;

/// Flag evaluation errors
///
/// Expected non-matches (unsatisfied prerequisites, no matching rule, a subject
/// without a key) are never reported through this type. Only definitional
/// problems in the flag data surface as errors.
#[derive(Debug, Error)]
pub enum FlagError {
    /// A target, rule or fallthrough selected a variation index the flag does not have
    #[error("Undefined variation for flag {flag}")]
    UndefinedVariation {
        /// Key of the flag being evaluated
        flag: String,
    },

    /// A prerequisite refers back to a flag that is already being evaluated
    #[error("Cyclic prerequisite for flag {flag}: {chain}")]
    CyclicPrerequisite {
        /// Key of the flag that closes the cycle
        flag: String,
        /// Prerequisite path, e.g. `a -> b -> a`
        chain: String,
    },

    /// Prerequisites are nested deeper than the configured limit
    #[error("Prerequisite depth for flag {flag} exceeds {max_depth}")]
    PrerequisiteDepthExceeded {
        /// Key of the flag at which the limit was hit
        flag: String,
        /// Configured limit
        max_depth: usize,
    },

    /// Store error (loading, parsing, backend)
    #[error("Feature store error: {0}")]
    Store(String),

    /// Configuration error
    #[error("Evaluator configuration error: {0}")]
    Config(String),

    /// JSON (de)serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl FlagError {
    /// Create an undefined variation error for a flag
    pub fn undefined_variation<S: Into<String>>(flag: S) -> Self {
        Self::UndefinedVariation { flag: flag.into() }
    }

    /// Create a new store error
    pub fn store<S: Into<String>>(msg: S) -> Self {
        Self::Store(msg.into())
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Check if this error is an undefined variation error
    pub fn is_undefined_variation(&self) -> bool {
        matches!(self, Self::UndefinedVariation { .. })
    }

    /// Check if this error came from a cyclic prerequisite graph
    pub fn is_cyclic_prerequisite(&self) -> bool {
        matches!(self, Self::CyclicPrerequisite { .. })
    }

    /// Errors that abort the whole prerequisite chain instead of only
    /// marking one prerequisite as unsatisfied.
    pub(crate) fn aborts_chain(&self) -> bool {
        matches!(
            self,
            Self::CyclicPrerequisite { .. } | Self::PrerequisiteDepthExceeded { .. }
        )
    }
}
