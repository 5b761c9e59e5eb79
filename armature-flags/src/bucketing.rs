//! Percentage bucketing
//!
//! Users are hashed into `[0, 1]` with SHA-1 over `"<key>.<salt>.<id>"`.
//! The first 15 hex digits of the digest (60 bits) are divided by
//! `0xFFFFFFFFFFFFFFF`. Every SDK computes the same value for the same
//! input, so a user keeps its bucket across services and languages.

use crate::flag::{FeatureFlag, VariationOrRollout};
use crate::user::User;
use serde_json::Value;
use sha1::{Digest, Sha1};
use tracing::trace;

/// Divisor mapping 15 hex digits onto `[0, 1]`
const LONG_SCALE: f64 = 0xFFFFFFFFFFFFFFFu64 as f64;

/// Number of hex digits of the digest that are used
const HASH_HEX_DIGITS: usize = 15;

/// Rollout and segment weights are expressed against this total (100%)
pub const WEIGHT_SCALE: f64 = 100_000.0;

/// Attribute used for bucketing when none is configured
pub const DEFAULT_BUCKET_BY: &str = "key";

/// Compute the bucket of `user` for a flag or segment `key`.
///
/// The bucketing attribute must be a string or an integer. Any other value
/// (or a missing attribute) yields `0.0`, which sorts the user into the
/// first bucket of every split.
pub fn bucket_user(user: &User, key: &str, bucket_by: &str, salt: &str) -> f64 {
    let Some(mut id) = user.value_of(bucket_by).as_ref().and_then(bucketable_string) else {
        return 0.0;
    };

    if let Some(secondary) = user.secondary.as_deref().filter(|s| !s.is_empty()) {
        id.push('.');
        id.push_str(secondary);
    }

    let digest = hex::encode(Sha1::digest(format!("{key}.{salt}.{id}").as_bytes()));
    let bucket = u64::from_str_radix(&digest[..HASH_HEX_DIGITS], 16)
        .map(|n| n as f64 / LONG_SCALE)
        .unwrap_or(0.0);

    trace!(key = %key, bucket_by = %bucket_by, bucket = bucket, "Bucketed user");
    bucket
}

fn bucketable_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(i.to_string())
            } else if let Some(u) = n.as_u64() {
                Some(u.to_string())
            } else {
                // Display prints integral floats without exponent or fraction;
                // adding 0.0 turns -0.0 into 0.0
                n.as_f64()
                    .filter(|f| f.is_finite() && f.fract() == 0.0)
                    .map(|f| (f + 0.0).to_string())
            }
        }
        _ => None,
    }
}

/// Pick the variation index for `user` from a fixed variation or a rollout.
///
/// A rollout walks its buckets in order and returns the first whose
/// cumulative weight exceeds the user's bucket. When the weights add up to
/// less than the bucket, the result is `None`.
pub fn variation_for_user(
    target: &VariationOrRollout,
    user: &User,
    flag: &FeatureFlag,
) -> Option<usize> {
    if let Some(index) = target.variation {
        return Some(index);
    }

    let rollout = target.rollout.as_ref()?;
    let bucket_by = rollout.bucket_by.as_deref().unwrap_or(DEFAULT_BUCKET_BY);
    let bucket = bucket_user(user, &flag.key, bucket_by, &flag.salt);

    let mut sum = 0.0;
    for weighted in &rollout.variations {
        sum += weighted.weight as f64 / WEIGHT_SCALE;
        if bucket < sum {
            return Some(weighted.variation);
        }
    }

    None
}
