//! Flag evaluation
//!
//! [`Evaluator::evaluate`] is the entry point. An off flag serves its off
//! variation immediately. An on flag first resolves its prerequisites, one
//! at a time and in declared order, recursing into each prerequisite flag
//! and recording an event for it. The first unsatisfied prerequisite stops
//! the walk and the flag falls back to its off variation. When all
//! prerequisites hold, targets, rules and the fallthrough decide.
//!
//! Prerequisite keys already on the evaluation path are reported as
//! [`FlagError::CyclicPrerequisite`] instead of being followed again.

use crate::config::{EvaluatorBuilder, EvaluatorConfig};
use crate::error::{FlagError, FlagResult};
use crate::event::FeatureEvent;
use crate::flag::FeatureFlag;
use crate::matcher;
use crate::operators::OperatorRegistry;
use crate::stores::FeatureStore;
use crate::user::User;
use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Outcome of [`Evaluator::evaluate`]
#[derive(Debug, Default)]
pub struct EvaluationResult {
    /// Variation index served, if any
    pub variation: Option<usize>,

    /// Value served, if any
    pub value: Option<Value>,

    /// One event per prerequisite evaluated, in evaluation order
    pub events: Vec<FeatureEvent>,

    /// Definitional error in the flag data
    pub error: Option<FlagError>,
}

impl EvaluationResult {
    fn inert() -> Self {
        Self::default()
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Outcome of [`Evaluator::variation`]
#[derive(Debug)]
pub struct VariationOutcome {
    /// Served value, or the caller's default
    pub value: Value,

    pub variation: Option<usize>,

    /// Prerequisite events followed by the event for the flag itself
    pub events: Vec<FeatureEvent>,

    pub error: Option<FlagError>,
}

/// `Ok(None)`: a prerequisite was not satisfied.
type Resolution = FlagResult<Option<(usize, Value)>>;

/// Feature flag evaluator
#[derive(Debug, Clone)]
pub struct Evaluator {
    config: EvaluatorConfig,
    operators: Arc<OperatorRegistry>,
}

impl Evaluator {
    /// Evaluator with default config and the built-in operators
    pub fn new() -> Self {
        Self::with_parts(EvaluatorConfig::default(), OperatorRegistry::new())
    }

    /// Create a new evaluator builder
    pub fn builder() -> EvaluatorBuilder {
        EvaluatorBuilder::new()
    }

    pub(crate) fn with_parts(config: EvaluatorConfig, operators: OperatorRegistry) -> Self {
        Self {
            config,
            operators: Arc::new(operators),
        }
    }

    pub fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    pub fn operators(&self) -> &OperatorRegistry {
        &self.operators
    }

    /// Evaluate `flag` for `user`.
    ///
    /// A missing flag, a missing user or a user without a key yields an
    /// empty result. When nothing matched or a prerequisite failed, the off
    /// variation is served. A definitional error is returned together with
    /// the off variation index, a null value and the events collected so far.
    pub async fn evaluate(
        &self,
        flag: Option<&FeatureFlag>,
        user: Option<&User>,
        store: &dyn FeatureStore,
    ) -> EvaluationResult {
        let Some(user) = user.filter(|u| u.key.is_some()) else {
            trace!("User missing or without key, skipping evaluation");
            return EvaluationResult::inert();
        };
        let Some(flag) = flag else {
            trace!("Flag missing, skipping evaluation");
            return EvaluationResult::inert();
        };

        if !flag.on {
            trace!(flag = %flag.key, "Flag is off");
            return EvaluationResult {
                variation: flag.off_variation,
                value: flag.variation_value(flag.off_variation),
                ..Default::default()
            };
        }

        let mut events = Vec::new();
        let mut path = vec![flag.key.clone()];
        let resolution = self
            .evaluate_internal(flag, user, store, &mut events, &mut path)
            .await;

        match resolution {
            Ok(Some((variation, value))) => {
                debug!(flag = %flag.key, variation = variation, "Flag evaluated");
                EvaluationResult {
                    variation: Some(variation),
                    value: Some(value),
                    events,
                    error: None,
                }
            }
            Ok(None) => {
                debug!(flag = %flag.key, "Prerequisites not met, serving off variation");
                EvaluationResult {
                    variation: flag.off_variation,
                    value: flag.variation_value(flag.off_variation),
                    events,
                    error: None,
                }
            }
            Err(error) => {
                warn!(flag = %flag.key, error = %error, "Flag evaluation failed");
                EvaluationResult {
                    variation: flag.off_variation,
                    value: None,
                    events,
                    error: Some(error),
                }
            }
        }
    }

    /// Look `flag_key` up in the store, evaluate it and record the event
    /// for the flag itself after any prerequisite events.
    ///
    /// `default` is served when the flag is unknown, the user has no key or
    /// the evaluation produced no value.
    pub async fn variation(
        &self,
        store: &dyn FeatureStore,
        flag_key: &str,
        user: &User,
        default: Value,
    ) -> VariationOutcome {
        if user.key.is_none() {
            return VariationOutcome {
                value: default,
                variation: None,
                events: Vec::new(),
                error: None,
            };
        }

        let Some(flag) = store.flag(flag_key).await else {
            debug!(flag = %flag_key, "Unknown flag, serving default");
            let event = FeatureEvent::new(
                flag_key,
                None,
                user,
                None,
                Some(default.clone()),
                Some(default.clone()),
                None,
            );
            return VariationOutcome {
                value: default,
                variation: None,
                events: vec![event],
                error: None,
            };
        };

        let result = self.evaluate(Some(flag.as_ref()), Some(user), store).await;
        let value = result
            .value
            .filter(|v| !v.is_null())
            .unwrap_or_else(|| default.clone());

        let mut events = result.events;
        events.push(FeatureEvent::new(
            flag_key,
            Some(flag.as_ref()),
            user,
            result.variation,
            Some(value.clone()),
            Some(default),
            None,
        ));

        VariationOutcome {
            value,
            variation: result.variation,
            events,
            error: result.error,
        }
    }

    /// Resolve prerequisites, then match targets and rules.
    ///
    /// `path` holds the keys of the flags currently being evaluated, outermost
    /// first.
    fn evaluate_internal<'a>(
        &'a self,
        flag: &'a FeatureFlag,
        user: &'a User,
        store: &'a dyn FeatureStore,
        events: &'a mut Vec<FeatureEvent>,
        path: &'a mut Vec<String>,
    ) -> BoxFuture<'a, Resolution> {
        async move {
            for prerequisite in &flag.prerequisites {
                let Some(prereq_flag) = store.flag(&prerequisite.key).await.filter(|f| f.on) else {
                    debug!(
                        flag = %flag.key,
                        prerequisite = %prerequisite.key,
                        "Prerequisite missing or off"
                    );
                    return Ok(None);
                };

                if path.contains(&prerequisite.key) {
                    let chain = format!("{} -> {}", path.join(" -> "), prerequisite.key);
                    warn!(flag = %flag.key, chain = %chain, "Cyclic prerequisite");
                    return Err(FlagError::CyclicPrerequisite {
                        flag: prerequisite.key.clone(),
                        chain,
                    });
                }
                if path.len() > self.config.max_prerequisite_depth {
                    warn!(
                        flag = %flag.key,
                        max_depth = self.config.max_prerequisite_depth,
                        "Prerequisite depth exceeded"
                    );
                    return Err(FlagError::PrerequisiteDepthExceeded {
                        flag: prerequisite.key.clone(),
                        max_depth: self.config.max_prerequisite_depth,
                    });
                }

                path.push(prerequisite.key.clone());
                let outcome = self
                    .evaluate_internal(&prereq_flag, user, store, events, path)
                    .await;
                path.pop();

                let (variation, value) = match &outcome {
                    Ok(Some((index, value))) => (Some(*index), Some(value.clone())),
                    _ => (None, None),
                };
                events.push(FeatureEvent::new(
                    &prereq_flag.key,
                    Some(prereq_flag.as_ref()),
                    user,
                    variation,
                    value,
                    None,
                    Some(flag.key.as_str()),
                ));

                match outcome {
                    Err(error) if error.aborts_chain() => return Err(error),
                    Ok(Some((index, value))) if index == prerequisite.variation && !value.is_null() => {
                        trace!(
                            flag = %flag.key,
                            prerequisite = %prerequisite.key,
                            "Prerequisite satisfied"
                        );
                    }
                    _ => {
                        debug!(
                            flag = %flag.key,
                            prerequisite = %prerequisite.key,
                            expected = prerequisite.variation,
                            served = ?variation,
                            "Prerequisite not satisfied"
                        );
                        return Ok(None);
                    }
                }
            }

            matcher::match_flag(flag, user, store, &self.operators)
                .await
                .map(Some)
        }
        .boxed()
    }
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}
