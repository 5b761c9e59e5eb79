//! User segments
//!
//! A segment is a reusable, named set of users referenced from flag clauses
//! through the `segmentMatch` operator.

use crate::flag::Clause;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Named set of users
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Segment {
    pub key: String,

    pub version: u64,

    /// Salt mixed into the bucketing hash of weighted rules
    pub salt: String,

    /// User keys that are always members (checked before `excluded`)
    pub included: HashSet<String>,

    /// User keys that are never members
    pub excluded: HashSet<String>,

    /// Membership rules, first match wins
    pub rules: Vec<SegmentRule>,
}

impl Segment {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Default::default()
        }
    }

    pub fn with_salt(mut self, salt: impl Into<String>) -> Self {
        self.salt = salt.into();
        self
    }

    pub fn with_version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    pub fn include(mut self, user_key: impl Into<String>) -> Self {
        self.included.insert(user_key.into());
        self
    }

    pub fn exclude(mut self, user_key: impl Into<String>) -> Self {
        self.excluded.insert(user_key.into());
        self
    }

    pub fn with_rule(mut self, rule: SegmentRule) -> Self {
        self.rules.push(rule);
        self
    }
}

/// Segment membership rule
///
/// Clauses may not use `segmentMatch`; segments do not nest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SegmentRule {
    pub clauses: Vec<Clause>,

    /// Share of matching users admitted, in thousandths of a percent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<u32>,

    /// Attribute to use for bucketing (default: `key`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket_by: Option<String>,
}

impl SegmentRule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_clause(mut self, clause: Clause) -> Self {
        self.clauses.push(clause);
        self
    }

    pub fn with_weight(mut self, weight: u32) -> Self {
        self.weight = Some(weight);
        self
    }

    pub fn with_bucket_by(mut self, attribute: impl Into<String>) -> Self {
        self.bucket_by = Some(attribute.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_segment() {
        let segment: Segment = serde_json::from_value(json!({
            "key": "beta",
            "version": 2,
            "salt": "s1",
            "included": ["alice"],
            "excluded": ["bob"],
            "rules": [{
                "clauses": [{ "attribute": "email", "op": "endsWith", "values": ["@corp.com"] }],
                "weight": 25000,
                "bucketBy": "email"
            }]
        }))
        .unwrap();

        assert!(segment.included.contains("alice"));
        assert!(segment.excluded.contains("bob"));
        assert_eq!(segment.rules[0].weight, Some(25000));
        assert_eq!(segment.rules[0].bucket_by.as_deref(), Some("email"));
    }

    #[test]
    fn test_builder() {
        let segment = Segment::new("staff")
            .include("a")
            .exclude("b")
            .with_rule(SegmentRule::new().with_weight(100000));

        assert_eq!(segment.key, "staff");
        assert_eq!(segment.rules.len(), 1);
        assert!(segment.rules[0].clauses.is_empty());
    }
}
