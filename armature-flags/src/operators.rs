//! Clause operators
//!
//! Operators are looked up by name in an [`OperatorRegistry`]. The registry
//! is open: callers can register additional operators without touching the
//! matcher. Unknown operator names resolve to a predicate that never matches,
//! so a malformed rule degrades to "no match" instead of failing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Comparison predicate: `(user value, clause value) -> matched`
pub type OperatorFn = Arc<dyn Fn(&Value, &Value) -> bool + Send + Sync>;

/// Built-in comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operator {
    In,
    StartsWith,
    EndsWith,
    Contains,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    Before,
    After,
}

impl Operator {
    pub const ALL: [Operator; 10] = [
        Operator::In,
        Operator::StartsWith,
        Operator::EndsWith,
        Operator::Contains,
        Operator::LessThan,
        Operator::LessThanOrEqual,
        Operator::GreaterThan,
        Operator::GreaterThanOrEqual,
        Operator::Before,
        Operator::After,
    ];

    /// Wire name used in clauses
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::In => "in",
            Operator::StartsWith => "startsWith",
            Operator::EndsWith => "endsWith",
            Operator::Contains => "contains",
            Operator::LessThan => "lessThan",
            Operator::LessThanOrEqual => "lessThanOrEqual",
            Operator::GreaterThan => "greaterThan",
            Operator::GreaterThanOrEqual => "greaterThanOrEqual",
            Operator::Before => "before",
            Operator::After => "after",
        }
    }

    /// Apply the operator
    pub fn apply(&self, user_value: &Value, clause_value: &Value) -> bool {
        match self {
            Operator::In => equals(user_value, clause_value),
            Operator::StartsWith => strings(user_value, clause_value, |u, c| u.starts_with(c)),
            Operator::EndsWith => strings(user_value, clause_value, |u, c| u.ends_with(c)),
            Operator::Contains => strings(user_value, clause_value, |u, c| u.contains(c)),
            Operator::LessThan => numbers(user_value, clause_value, |u, c| u < c),
            Operator::LessThanOrEqual => numbers(user_value, clause_value, |u, c| u <= c),
            Operator::GreaterThan => numbers(user_value, clause_value, |u, c| u > c),
            Operator::GreaterThanOrEqual => numbers(user_value, clause_value, |u, c| u >= c),
            Operator::Before => dates(user_value, clause_value, |u, c| u < c),
            Operator::After => dates(user_value, clause_value, |u, c| u > c),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// JSON equality, except that numbers compare by value (`3 == 3.0`)
fn equals(user_value: &Value, clause_value: &Value) -> bool {
    match (user_value, clause_value) {
        (Value::Number(u), Value::Number(c)) => u == c || u.as_f64() == c.as_f64(),
        _ => user_value == clause_value,
    }
}

fn strings(user_value: &Value, clause_value: &Value, f: impl Fn(&str, &str) -> bool) -> bool {
    match (user_value.as_str(), clause_value.as_str()) {
        (Some(u), Some(c)) => f(u, c),
        _ => false,
    }
}

fn numbers(user_value: &Value, clause_value: &Value, f: impl Fn(f64, f64) -> bool) -> bool {
    match (user_value.as_f64(), clause_value.as_f64()) {
        (Some(u), Some(c)) => f(u, c),
        _ => false,
    }
}

fn dates(
    user_value: &Value,
    clause_value: &Value,
    f: impl Fn(DateTime<Utc>, DateTime<Utc>) -> bool,
) -> bool {
    match (parse_date(user_value), parse_date(clause_value)) {
        (Some(u), Some(c)) => f(u, c),
        _ => false,
    }
}

/// Epoch milliseconds or an RFC 3339 string
fn parse_date(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => DateTime::from_timestamp_millis(n.as_f64()? as i64),
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|d| d.with_timezone(&Utc)),
        _ => None,
    }
}

/// Registry mapping operator names to predicates
#[derive(Clone)]
pub struct OperatorRegistry {
    operators: HashMap<String, OperatorFn>,
    never: OperatorFn,
}

impl OperatorRegistry {
    /// Registry without any operators; every name resolves to "never matches"
    pub fn empty() -> Self {
        Self {
            operators: HashMap::new(),
            never: Arc::new(|_: &Value, _: &Value| false),
        }
    }

    /// Registry with the built-in [`Operator`] set
    pub fn new() -> Self {
        let mut registry = Self::empty();
        for op in Operator::ALL {
            registry.register(op.as_str(), move |u, c| op.apply(u, c));
        }
        registry
    }

    /// Register (or replace) an operator
    pub fn register<F>(&mut self, name: impl Into<String>, predicate: F)
    where
        F: Fn(&Value, &Value) -> bool + Send + Sync + 'static,
    {
        self.operators.insert(name.into(), Arc::new(predicate));
    }

    /// Builder-style [`register`](Self::register)
    pub fn with_operator<F>(mut self, name: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&Value, &Value) -> bool + Send + Sync + 'static,
    {
        self.register(name, predicate);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.operators.contains_key(name)
    }

    /// Resolve an operator by name; unknown names never match
    pub fn resolve(&self, name: &str) -> &OperatorFn {
        match self.operators.get(name) {
            Some(op) => op,
            None => {
                debug!(op = %name, "Unknown clause operator, treating as no match");
                &self.never
            }
        }
    }

    /// Names of all registered operators
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.operators.keys().map(String::as_str)
    }
}

impl Default for OperatorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for OperatorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.names().collect();
        names.sort_unstable();
        f.debug_struct("OperatorRegistry")
            .field("operators", &names)
            .finish()
    }
}
