//! Evaluator configuration and builder

use crate::error::{FlagError, FlagResult};
use crate::evaluator::Evaluator;
use crate::operators::OperatorRegistry;
use serde_json::Value;
use std::env;
use tracing::debug;

/// Environment variable overriding [`EvaluatorConfig::max_prerequisite_depth`]
pub const MAX_PREREQUISITE_DEPTH_ENV: &str = "ARMATURE_FLAGS_MAX_PREREQUISITE_DEPTH";

/// Default limit on prerequisite nesting
pub const DEFAULT_MAX_PREREQUISITE_DEPTH: usize = 64;

/// Configuration for the evaluator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluatorConfig {
    /// How many prerequisite levels may be nested below the evaluated flag
    pub max_prerequisite_depth: usize,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            max_prerequisite_depth: DEFAULT_MAX_PREREQUISITE_DEPTH,
        }
    }
}

impl EvaluatorConfig {
    /// Create a new evaluator builder
    pub fn builder() -> EvaluatorBuilder {
        EvaluatorBuilder::new()
    }

    /// Create config from environment variables.
    ///
    /// Unset or unparsable values fall back to the defaults.
    pub fn from_env() -> Self {
        let max_prerequisite_depth = env::var(MAX_PREREQUISITE_DEPTH_ENV)
            .ok()
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(DEFAULT_MAX_PREREQUISITE_DEPTH);

        Self {
            max_prerequisite_depth,
        }
    }

    fn validate(&self) -> FlagResult<()> {
        if self.max_prerequisite_depth == 0 {
            return Err(FlagError::config("max_prerequisite_depth must be at least 1"));
        }
        Ok(())
    }
}

/// Builder for creating an [`Evaluator`]
pub struct EvaluatorBuilder {
    config: EvaluatorConfig,
    operators: OperatorRegistry,
}

impl EvaluatorBuilder {
    /// Create a new builder with default config and the built-in operators
    pub fn new() -> Self {
        Self {
            config: EvaluatorConfig::default(),
            operators: OperatorRegistry::new(),
        }
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: EvaluatorConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the prerequisite nesting limit
    pub fn max_prerequisite_depth(mut self, depth: usize) -> Self {
        self.config.max_prerequisite_depth = depth;
        self
    }

    /// Replace the operator registry
    pub fn operators(mut self, operators: OperatorRegistry) -> Self {
        self.operators = operators;
        self
    }

    /// Register one additional operator
    pub fn operator<F>(mut self, name: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&Value, &Value) -> bool + Send + Sync + 'static,
    {
        self.operators.register(name, predicate);
        self
    }

    /// Build the evaluator
    pub fn build(self) -> FlagResult<Evaluator> {
        self.config.validate()?;

        debug!(
            max_prerequisite_depth = self.config.max_prerequisite_depth,
            operators = ?self.operators,
            "Building flag evaluator"
        );

        Ok(Evaluator::with_parts(self.config, self.operators))
    }
}

impl Default for EvaluatorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
