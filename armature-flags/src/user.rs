//! Evaluation subject
//!
//! A user carries a fixed set of built-in attributes plus an open `custom`
//! map. Rules address both through one name space: [`User::value_of`] looks
//! at the built-in field first and falls back to `custom`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Names of the built-in user attributes
pub const BUILTIN_ATTRIBUTES: [&str; 9] = [
    "key",
    "ip",
    "country",
    "email",
    "firstName",
    "lastName",
    "avatar",
    "name",
    "anonymous",
];

/// The subject a flag is evaluated for
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Unique key. A user without a key is never evaluated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,

    /// Secondary key, mixed into the bucketing hash
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anonymous: Option<bool>,

    /// All other attributes
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub custom: HashMap<String, Value>,
}

impl User {
    /// Create a user with the given key
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
            ..Default::default()
        }
    }

    pub fn with_secondary(mut self, secondary: impl Into<String>) -> Self {
        self.secondary = Some(secondary.into());
        self
    }

    pub fn with_ip(mut self, ip: impl Into<String>) -> Self {
        self.ip = Some(ip.into());
        self
    }

    pub fn with_country(mut self, country: impl Into<String>) -> Self {
        self.country = Some(country.into());
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_first_name(mut self, first_name: impl Into<String>) -> Self {
        self.first_name = Some(first_name.into());
        self
    }

    pub fn with_last_name(mut self, last_name: impl Into<String>) -> Self {
        self.last_name = Some(last_name.into());
        self
    }

    pub fn with_avatar(mut self, avatar: impl Into<String>) -> Self {
        self.avatar = Some(avatar.into());
        self
    }

    pub fn with_anonymous(mut self, anonymous: bool) -> Self {
        self.anonymous = Some(anonymous);
        self
    }

    /// Set a custom attribute
    pub fn with_custom(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.custom.insert(name.into(), value.into());
        self
    }

    /// The user's key, if it has one
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// Look up an attribute by name.
    ///
    /// A built-in attribute that is set wins; otherwise the `custom` entry of
    /// the same name is returned. `None` means the attribute is absent.
    pub fn value_of(&self, attribute: &str) -> Option<Value> {
        self.builtin(attribute)
            .or_else(|| self.custom.get(attribute).cloned())
    }

    fn builtin(&self, attribute: &str) -> Option<Value> {
        let text = |field: &Option<String>| field.as_ref().map(|s| Value::String(s.clone()));

        match attribute {
            "key" => text(&self.key),
            "ip" => text(&self.ip),
            "country" => text(&self.country),
            "email" => text(&self.email),
            "firstName" => text(&self.first_name),
            "lastName" => text(&self.last_name),
            "avatar" => text(&self.avatar),
            "name" => text(&self.name),
            "anonymous" => self.anonymous.map(Value::Bool),
            _ => None,
        }
    }
}
