//! Feature Flag Evaluation for Armature
//!
//! Deterministic evaluation of feature flags against a user: prerequisite
//! flags, explicit targets, ordered targeting rules, reusable segments and
//! percentage rollouts with bit-stable hashing.
//!
//! # Features
//!
//! - 🔗 **Prerequisites** - Flags that depend on other flags, with cycle detection
//! - 🎯 **Targeting Rules** - Ordered rules over user attributes with negation
//! - 👥 **Segments** - Reusable user sets with include/exclude lists and weighted rules
//! - 🎲 **Percentage Rollout** - SHA-1 bucketing compatible with other SDKs
//! - 🧩 **Open Operators** - Register custom clause operators at runtime
//! - 📊 **Analytics Events** - One event per prerequisite evaluated
//!
//! # Quick Start
//!
//! ```
//! use armature_flags::*;
//!
//! # tokio_test::block_on(async {
//! let store = MemoryStore::new().with_flag(FeatureFlag::boolean("new-ui", true));
//! let evaluator = Evaluator::new();
//!
//! let user = User::new("user-123");
//! let outcome = evaluator
//!     .variation(&store, "new-ui", &user, serde_json::json!(false))
//!     .await;
//!
//! if outcome.value.as_bool().unwrap_or(false) {
//!     // Show new UI
//! }
//! # });
//! ```
//!
//! # Targeting Rules
//!
//! ```
//! use armature_flags::*;
//! use serde_json::json;
//!
//! // Serve `true` to company accounts
//! let rule = Rule::new(VariationOrRollout::variation(1))
//!     .with_clause(Clause::new("email", "endsWith", vec![json!("@company.com")]));
//!
//! let flag = FeatureFlag::boolean("beta-feature", false).with_rule(rule);
//! ```
//!
//! # Gradual Rollout
//!
//! ```
//! use armature_flags::*;
//!
//! // Roll `true` out to 25% of users
//! let rollout = Rollout::new(vec![
//!     WeightedVariation::new(0, 75_000),
//!     WeightedVariation::new(1, 25_000),
//! ]);
//! let flag = FeatureFlag::boolean("new-algorithm", false)
//!     .with_fallthrough(VariationOrRollout::rollout(rollout));
//! ```
//!
//! # Prerequisites
//!
//! ```
//! use armature_flags::*;
//!
//! # tokio_test::block_on(async {
//! let store = MemoryStore::new().with_flag(FeatureFlag::boolean("payments-v2", true));
//! let checkout = FeatureFlag::boolean("checkout-v2", true).with_prerequisite("payments-v2", 1);
//!
//! let result = Evaluator::new()
//!     .evaluate(Some(&checkout), Some(&User::new("user-123")), &store)
//!     .await;
//!
//! assert_eq!(result.variation, Some(1));
//! assert_eq!(result.events[0].prereq_of.as_deref(), Some("checkout-v2"));
//! # });
//! ```

pub mod bucketing;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod event;
pub mod flag;
pub mod matcher;
pub mod operators;
pub mod segment;
pub mod stores;
pub mod user;

pub use bucketing::{bucket_user, variation_for_user};
pub use config::{EvaluatorBuilder, EvaluatorConfig};
pub use error::{FlagError, FlagResult};
pub use evaluator::{EvaluationResult, Evaluator, VariationOutcome};
pub use event::FeatureEvent;
pub use flag::{
    Clause, FeatureFlag, Prerequisite, Rollout, Rule, Target, VariationOrRollout,
    WeightedVariation,
};
pub use operators::{Operator, OperatorFn, OperatorRegistry};
pub use segment::{Segment, SegmentRule};
pub use stores::{DataKind, FeatureStore, MemoryStore, StoreItem};
pub use user::User;
