//! Feature Flag Core
//!
//! Defines feature flags, their prerequisites, targets, rules and clauses.
//! Field names follow the JSON wire format (camelCase) so flags can be loaded
//! straight from a flag service payload.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

/// Operator name that turns a clause into a segment membership test
pub const SEGMENT_MATCH_OP: &str = "segmentMatch";

/// Feature flag
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FeatureFlag {
    /// Flag key/name
    pub key: String,

    /// Flag description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Data version, bumped on every change
    pub version: u64,

    /// Whether targeting is on. An off flag always serves `off_variation`.
    pub on: bool,

    /// Flags that must evaluate to a given variation first
    pub prerequisites: Vec<Prerequisite>,

    /// Salt mixed into the rollout bucketing hash
    pub salt: String,

    /// Explicit per-user overrides
    pub targets: Vec<Target>,

    /// Targeting rules, first match wins
    pub rules: Vec<Rule>,

    /// What to serve when no target or rule matches
    pub fallthrough: VariationOrRollout,

    /// Variation served while the flag is off or nothing else applies
    pub off_variation: Option<usize>,

    /// All available variations
    pub variations: Vec<Value>,

    /// Whether every evaluation should produce a full analytics event
    pub track_events: bool,

    /// Debug events are sent until this epoch-millisecond timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug_events_until_date: Option<i64>,
}

impl FeatureFlag {
    /// Create a flag that is on, serving variation 0 to everybody
    pub fn new(key: impl Into<String>, variations: Vec<Value>) -> Self {
        Self {
            key: key.into(),
            on: true,
            variations,
            fallthrough: VariationOrRollout::variation(0),
            ..Default::default()
        }
    }

    /// Create a boolean flag with variations `[false, true]`.
    ///
    /// The flag is on, falls through to `default_value` and serves `false`
    /// when switched off.
    ///
    /// # Examples
    ///
    /// ```
    /// use armature_flags::FeatureFlag;
    ///
    /// let flag = FeatureFlag::boolean("new-ui", true);
    /// assert_eq!(flag.variation(1), Some(&serde_json::json!(true)));
    /// ```
    pub fn boolean(key: impl Into<String>, default_value: bool) -> Self {
        Self::new(key, vec![Value::Bool(false), Value::Bool(true)])
            .with_fallthrough(VariationOrRollout::variation(default_value as usize))
            .with_off_variation(0)
    }

    /// Set description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Switch targeting on or off
    pub fn with_on(mut self, on: bool) -> Self {
        self.on = on;
        self
    }

    pub fn with_version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    pub fn with_salt(mut self, salt: impl Into<String>) -> Self {
        self.salt = salt.into();
        self
    }

    pub fn with_off_variation(mut self, index: usize) -> Self {
        self.off_variation = Some(index);
        self
    }

    pub fn with_fallthrough(mut self, fallthrough: VariationOrRollout) -> Self {
        self.fallthrough = fallthrough;
        self
    }

    /// Add a prerequisite
    pub fn with_prerequisite(mut self, key: impl Into<String>, variation: usize) -> Self {
        self.prerequisites.push(Prerequisite {
            key: key.into(),
            variation,
        });
        self
    }

    /// Add a target
    pub fn with_target(mut self, target: Target) -> Self {
        self.targets.push(target);
        self
    }

    /// Add targeting rule
    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn with_track_events(mut self, track_events: bool) -> Self {
        self.track_events = track_events;
        self
    }

    pub fn with_debug_events_until(mut self, epoch_millis: i64) -> Self {
        self.debug_events_until_date = Some(epoch_millis);
        self
    }

    /// Variation value at `index`, or `None` when the index is out of range
    pub fn variation(&self, index: usize) -> Option<&Value> {
        self.variations.get(index)
    }

    /// Like [`variation`](Self::variation) for an optional index
    pub fn variation_value(&self, index: Option<usize>) -> Option<Value> {
        index.and_then(|i| self.variation(i)).cloned()
    }
}

/// Another flag that must serve `variation` before this flag can match
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prerequisite {
    pub key: String,
    pub variation: usize,
}

/// Explicit user targeting
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Target {
    /// User keys that receive `variation`
    pub values: HashSet<String>,

    /// Variation index served to those keys
    pub variation: usize,
}

impl Target {
    pub fn new(variation: usize, keys: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            values: keys.into_iter().map(Into::into).collect(),
            variation,
        }
    }

    pub fn contains(&self, user_key: &str) -> bool {
        self.values.contains(user_key)
    }
}

/// Targeting rule
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Rule {
    /// Optional rule identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Rule clauses (all must match)
    pub clauses: Vec<Clause>,

    /// What to serve if the rule matches
    #[serde(flatten)]
    pub variation_or_rollout: VariationOrRollout,
}

impl Rule {
    pub fn new(variation_or_rollout: VariationOrRollout) -> Self {
        Self {
            id: None,
            clauses: Vec::new(),
            variation_or_rollout,
        }
    }

    pub fn with_clause(mut self, clause: Clause) -> Self {
        self.clauses.push(clause);
        self
    }
}

/// Targeting clause: `attribute op values`, optionally negated
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Clause {
    /// Attribute to check (ignored for `segmentMatch`)
    pub attribute: String,

    /// Operator name, resolved through the operator registry
    pub op: String,

    /// Values to compare against
    pub values: Vec<Value>,

    /// Invert the result
    pub negate: bool,
}

impl Clause {
    pub fn new(attribute: impl Into<String>, op: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            attribute: attribute.into(),
            op: op.into(),
            values,
            negate: false,
        }
    }

    /// Clause matching users in any of the given segments
    pub fn segment_match(segment_keys: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self::new(
            "",
            SEGMENT_MATCH_OP,
            segment_keys
                .into_iter()
                .map(|k| Value::String(k.into()))
                .collect(),
        )
    }

    pub fn negated(mut self) -> Self {
        self.negate = true;
        self
    }

    pub fn is_segment_match(&self) -> bool {
        self.op == SEGMENT_MATCH_OP
    }

    pub(crate) fn maybe_negate(&self, matched: bool) -> bool {
        if self.negate { !matched } else { matched }
    }
}

/// Either a fixed variation or a percentage rollout
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VariationOrRollout {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variation: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub rollout: Option<Rollout>,
}

impl VariationOrRollout {
    /// Fixed variation
    pub fn variation(index: usize) -> Self {
        Self {
            variation: Some(index),
            rollout: None,
        }
    }

    /// Percentage rollout
    pub fn rollout(rollout: Rollout) -> Self {
        Self {
            variation: None,
            rollout: Some(rollout),
        }
    }
}

/// Weighted split of users across variations
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Rollout {
    /// Buckets in order; weights are in thousandths of a percent (100000 = 100%)
    pub variations: Vec<WeightedVariation>,

    /// Attribute to use for bucketing (default: `key`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket_by: Option<String>,
}

impl Rollout {
    pub fn new(variations: Vec<WeightedVariation>) -> Self {
        Self {
            variations,
            bucket_by: None,
        }
    }

    pub fn with_bucket_by(mut self, attribute: impl Into<String>) -> Self {
        self.bucket_by = Some(attribute.into());
        self
    }
}

/// One rollout bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightedVariation {
    pub variation: usize,
    pub weight: u32,
}

impl WeightedVariation {
    pub fn new(variation: usize, weight: u32) -> Self {
        Self { variation, weight }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_boolean_flag() {
        let flag = FeatureFlag::boolean("test-flag", true);

        assert!(flag.on);
        assert_eq!(flag.off_variation, Some(0));
        assert_eq!(flag.fallthrough.variation, Some(1));
        assert_eq!(flag.variation(1), Some(&json!(true)));
        assert_eq!(flag.variation(2), None);
    }

    #[test]
    fn test_variation_value_out_of_range() {
        let flag = FeatureFlag::new("f", vec![json!("a")]);
        assert_eq!(flag.variation_value(Some(0)), Some(json!("a")));
        assert_eq!(flag.variation_value(Some(7)), None);
        assert_eq!(flag.variation_value(None), None);
    }

    #[test]
    fn test_clause_negation() {
        let clause = Clause::new("country", "in", vec![json!("US")]).negated();
        assert!(clause.maybe_negate(false));
        assert!(!clause.maybe_negate(true));
    }

    #[test]
    fn test_segment_match_clause() {
        let clause = Clause::segment_match(["beta-testers"]);
        assert!(clause.is_segment_match());
        assert_eq!(clause.values, vec![json!("beta-testers")]);
    }

    #[test]
    fn test_deserialize_wire_format() {
        let flag: FeatureFlag = serde_json::from_value(json!({
            "key": "checkout",
            "version": 3,
            "on": true,
            "salt": "abc",
            "offVariation": 0,
            "variations": ["old", "new"],
            "prerequisites": [{ "key": "payments", "variation": 1 }],
            "targets": [{ "values": ["alice"], "variation": 1 }],
            "rules": [{
                "clauses": [{ "attribute": "email", "op": "endsWith", "values": ["@corp.com"] }],
                "rollout": {
                    "variations": [
                        { "variation": 0, "weight": 40000 },
                        { "variation": 1, "weight": 60000 }
                    ],
                    "bucketBy": "email"
                }
            }],
            "fallthrough": { "variation": 0 },
            "trackEvents": true,
            "debugEventsUntilDate": 1700000000000i64
        }))
        .unwrap();

        assert_eq!(flag.prerequisites[0].key, "payments");
        assert!(flag.targets[0].contains("alice"));
        assert!(!flag.rules[0].clauses[0].negate);

        let rollout = flag.rules[0].variation_or_rollout.rollout.as_ref().unwrap();
        assert_eq!(rollout.bucket_by.as_deref(), Some("email"));
        assert_eq!(rollout.variations[1], WeightedVariation::new(1, 60000));
        assert_eq!(flag.fallthrough.variation, Some(0));
        assert!(flag.track_events);
        assert_eq!(flag.debug_events_until_date, Some(1_700_000_000_000));
    }

    #[test]
    fn test_missing_fields_default() {
        let flag: FeatureFlag = serde_json::from_value(json!({ "key": "bare" })).unwrap();
        assert!(!flag.on);
        assert!(flag.rules.is_empty());
        assert_eq!(flag.off_variation, None);
        assert_eq!(flag.fallthrough, VariationOrRollout::default());
    }
}
