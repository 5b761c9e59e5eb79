//! Target, rule, clause and segment matching
//!
//! Everything here short-circuits in declaration order: the first target
//! containing the user wins, the first matching rule wins, a rule fails on
//! its first non-matching clause, and a `segmentMatch` clause stops at the
//! first segment the user belongs to. Store lookups are awaited one at a time.

use crate::bucketing::{DEFAULT_BUCKET_BY, WEIGHT_SCALE, bucket_user, variation_for_user};
use crate::error::{FlagError, FlagResult};
use crate::flag::{Clause, FeatureFlag, Rule, VariationOrRollout};
use crate::operators::{OperatorFn, OperatorRegistry};
use crate::segment::{Segment, SegmentRule};
use crate::stores::FeatureStore;
use crate::user::User;
use serde_json::Value;
use tracing::{trace, warn};

/// Resolve the variation `flag` serves to `user`, ignoring prerequisites.
///
/// Targets are checked first, then rules, then the fallthrough. A selected
/// index outside the flag's variations is an
/// [`UndefinedVariation`](FlagError::UndefinedVariation) error.
pub async fn match_flag(
    flag: &FeatureFlag,
    user: &User,
    store: &dyn FeatureStore,
    operators: &OperatorRegistry,
) -> FlagResult<(usize, Value)> {
    if let Some(index) = user.key().and_then(|key| target_variation(flag, key)) {
        trace!(flag = %flag.key, variation = index, "User is targeted");
        return resolve_index(flag, Some(index));
    }

    for (position, rule) in flag.rules.iter().enumerate() {
        if rule_matches(rule, user, store, operators).await {
            trace!(flag = %flag.key, rule = position, "Rule matched");
            return resolve(flag, &rule.variation_or_rollout, user);
        }
    }

    trace!(flag = %flag.key, "No rule matched, using fallthrough");
    resolve(flag, &flag.fallthrough, user)
}

/// Variation of the first target listing `user_key`
pub fn target_variation(flag: &FeatureFlag, user_key: &str) -> Option<usize> {
    flag.targets
        .iter()
        .find(|target| target.contains(user_key))
        .map(|target| target.variation)
}

fn resolve(flag: &FeatureFlag, target: &VariationOrRollout, user: &User) -> FlagResult<(usize, Value)> {
    resolve_index(flag, variation_for_user(target, user, flag))
}

fn resolve_index(flag: &FeatureFlag, index: Option<usize>) -> FlagResult<(usize, Value)> {
    match index.and_then(|i| flag.variation(i).map(|value| (i, value.clone()))) {
        Some(resolved) => Ok(resolved),
        None => {
            warn!(flag = %flag.key, variation = ?index, "Undefined variation");
            Err(FlagError::undefined_variation(&flag.key))
        }
    }
}

/// A rule matches when every clause matches
pub async fn rule_matches(
    rule: &Rule,
    user: &User,
    store: &dyn FeatureStore,
    operators: &OperatorRegistry,
) -> bool {
    for clause in &rule.clauses {
        if !clause_matches(clause, user, store, operators).await {
            return false;
        }
    }
    true
}

/// Match one clause, following `segmentMatch` into the store
pub async fn clause_matches(
    clause: &Clause,
    user: &User,
    store: &dyn FeatureStore,
    operators: &OperatorRegistry,
) -> bool {
    if !clause.is_segment_match() {
        return clause_matches_no_segments(clause, user, operators);
    }

    let mut matched = false;
    for segment_key in clause.values.iter().filter_map(Value::as_str) {
        if let Some(segment) = store.segment(segment_key).await
            && segment_matches(&segment, user, operators)
        {
            trace!(segment = %segment_key, "User is in segment");
            matched = true;
            break;
        }
    }

    clause.maybe_negate(matched)
}

/// Match a clause against the user's own attributes.
///
/// An absent (or null) attribute never matches, negated or not. A list
/// attribute matches when any of its elements matches any clause value.
pub fn clause_matches_no_segments(clause: &Clause, user: &User, operators: &OperatorRegistry) -> bool {
    let user_value = match user.value_of(&clause.attribute) {
        None | Some(Value::Null) => return false,
        Some(value) => value,
    };

    let op = operators.resolve(&clause.op);
    let matched = match &user_value {
        Value::Array(items) => items.iter().any(|item| match_any(op, item, &clause.values)),
        single => match_any(op, single, &clause.values),
    };

    clause.maybe_negate(matched)
}

fn match_any(op: &OperatorFn, user_value: &Value, clause_values: &[Value]) -> bool {
    clause_values.iter().any(|clause_value| op(user_value, clause_value))
}

/// Segment membership.
///
/// `included` wins over `excluded`, which wins over the rules. A user with
/// an empty key is never a member.
pub fn segment_matches(segment: &Segment, user: &User, operators: &OperatorRegistry) -> bool {
    let Some(key) = user.key().filter(|k| !k.is_empty()) else {
        return false;
    };

    if segment.included.contains(key) {
        return true;
    }
    if segment.excluded.contains(key) {
        return false;
    }

    segment
        .rules
        .iter()
        .any(|rule| segment_rule_matches(rule, user, segment, operators))
}

fn segment_rule_matches(
    rule: &SegmentRule,
    user: &User,
    segment: &Segment,
    operators: &OperatorRegistry,
) -> bool {
    if !rule
        .clauses
        .iter()
        .all(|clause| clause_matches_no_segments(clause, user, operators))
    {
        return false;
    }

    let Some(weight) = rule.weight else {
        return true;
    };

    let bucket_by = rule.bucket_by.as_deref().unwrap_or(DEFAULT_BUCKET_BY);
    let bucket = bucket_user(user, &segment.key, bucket_by, &segment.salt);
    bucket < weight as f64 / WEIGHT_SCALE
}
