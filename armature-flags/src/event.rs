//! Analytics events produced by evaluations

use crate::flag::FeatureFlag;
use crate::user::User;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Event kind of a flag evaluation
pub const FEATURE_EVENT_KIND: &str = "feature";

/// Record of one flag evaluation, handed to the analytics pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureEvent {
    /// Always `"feature"`
    pub kind: String,

    /// Key of the evaluated flag
    pub key: String,

    pub user: User,

    /// Variation index served, if any
    pub variation: Option<usize>,

    /// Value served, if any
    pub value: Option<Value>,

    /// Caller-supplied default
    pub default: Option<Value>,

    /// Epoch milliseconds
    pub creation_date: i64,

    pub version: Option<u64>,

    /// Key of the flag this one was a prerequisite of
    pub prereq_of: Option<String>,

    pub track_events: Option<bool>,

    pub debug_events_until_date: Option<i64>,
}

impl FeatureEvent {
    /// Build an event for an evaluation of `flag_key`.
    ///
    /// Version and tracking fields are taken from `flag` when it is known.
    pub fn new(
        flag_key: impl Into<String>,
        flag: Option<&FeatureFlag>,
        user: &User,
        variation: Option<usize>,
        value: Option<Value>,
        default: Option<Value>,
        prereq_of: Option<&str>,
    ) -> Self {
        Self {
            kind: FEATURE_EVENT_KIND.to_string(),
            key: flag_key.into(),
            user: user.clone(),
            variation,
            value,
            default,
            creation_date: Utc::now().timestamp_millis(),
            version: flag.map(|f| f.version),
            prereq_of: prereq_of.map(str::to_string),
            track_events: flag.map(|f| f.track_events),
            debug_events_until_date: flag.and_then(|f| f.debug_events_until_date),
        }
    }

    /// Whether this event records a prerequisite evaluation
    pub fn is_prerequisite(&self) -> bool {
        self.prereq_of.is_some()
    }
}
