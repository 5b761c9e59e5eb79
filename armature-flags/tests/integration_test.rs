//! Integration tests for armature-flags

use armature_flags::*;
use rand::Rng;
use rand::distr::Alphanumeric;
use serde_json::{Value, json};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn user(key: &str) -> User {
    User::new(key)
}

fn rule_on(attribute: &str, values: Vec<Value>, variation: usize) -> Rule {
    Rule::new(VariationOrRollout::variation(variation)).with_clause(Clause::new(
        attribute,
        "in",
        values,
    ))
}

#[tokio::test]
async fn test_off_flag_always_serves_off_variation() {
    let evaluator = Evaluator::new();
    let store = MemoryStore::new();
    let flag = FeatureFlag::new("f", vec![json!("a"), json!("b"), json!("c")])
        .with_on(false)
        .with_off_variation(2)
        .with_target(Target::new(0, ["alice"]))
        .with_rule(rule_on("key", vec![json!("bob")], 1));

    for key in ["alice", "bob", "carol"] {
        let result = evaluator.evaluate(Some(&flag), Some(&user(key)), &store).await;
        assert_eq!(result.variation, Some(2));
        assert_eq!(result.value, Some(json!("c")));
    }
}

#[tokio::test]
async fn test_user_without_key_is_inert() {
    let evaluator = Evaluator::new();
    let store = MemoryStore::new();
    let flag = FeatureFlag::boolean("f", true).with_off_variation(0);
    let keyless: User = serde_json::from_value(json!({ "key": null, "email": "x@y.z" })).unwrap();

    let result = evaluator.evaluate(Some(&flag), Some(&keyless), &store).await;
    assert_eq!(result.variation, None);
    assert_eq!(result.value, None);
    assert!(result.events.is_empty());
    assert!(result.error.is_none());
}

#[tokio::test]
async fn test_target_overrides_earlier_rule() {
    let evaluator = Evaluator::new();
    let store = MemoryStore::new();
    let flag = FeatureFlag::new("f", vec![json!("a"), json!("b"), json!("c")])
        .with_rule(rule_on("key", vec![json!("alice")], 1))
        .with_target(Target::new(2, ["alice"]));

    let result = evaluator.evaluate(Some(&flag), Some(&user("alice")), &store).await;
    assert_eq!(result.variation, Some(2));
}

#[tokio::test]
async fn test_first_declared_rule_wins() {
    let evaluator = Evaluator::new();
    let store = MemoryStore::new();
    let flag = FeatureFlag::new("f", vec![json!("a"), json!("b"), json!("c")])
        .with_rule(rule_on("country", vec![json!("NZ")], 2))
        .with_rule(rule_on("country", vec![json!("NZ"), json!("AU")], 1));

    let result = evaluator
        .evaluate(Some(&flag), Some(&user("u").with_country("NZ")), &store)
        .await;
    assert_eq!(result.variation, Some(2));

    let result = evaluator
        .evaluate(Some(&flag), Some(&user("u").with_country("AU")), &store)
        .await;
    assert_eq!(result.variation, Some(1));
}

#[test]
fn test_bucketing_is_deterministic() {
    let subject = user("user-7").with_secondary("org-1");
    let first = bucket_user(&subject, "flag", "key", "salt");
    let second = bucket_user(&subject, "flag", "key", "salt");

    assert_eq!(first.to_bits(), second.to_bits());
    assert_ne!(first, bucket_user(&subject, "flag", "key", "pepper"));
}

#[tokio::test]
async fn test_even_rollout_splits_evenly() {
    let evaluator = Evaluator::new();
    let store = MemoryStore::new();
    let flag = FeatureFlag::new("split", vec![json!("a"), json!("b")])
        .with_salt("split-salt")
        .with_fallthrough(VariationOrRollout::rollout(Rollout::new(vec![
            WeightedVariation::new(0, 50_000),
            WeightedVariation::new(1, 50_000),
        ])));

    let mut rng = rand::rng();
    let samples = 10_000;
    let mut first = 0;
    for _ in 0..samples {
        let key: String = (&mut rng).sample_iter(&Alphanumeric).take(16).map(char::from).collect();
        let result = evaluator.evaluate(Some(&flag), Some(&user(&key)), &store).await;
        if result.variation == Some(0) {
            first += 1;
        }
    }

    // 5 standard deviations around 50%
    assert!((4_750..=5_250).contains(&first), "first bucket got {first}");
}

#[tokio::test]
async fn test_segment_included_and_excluded_is_member() {
    let evaluator = Evaluator::new();
    let store = MemoryStore::new().with_segment(Segment::new("vip").include("alice").exclude("alice"));
    let flag = FeatureFlag::boolean("f", false).with_rule(
        Rule::new(VariationOrRollout::variation(1)).with_clause(Clause::segment_match(["vip"])),
    );

    let result = evaluator.evaluate(Some(&flag), Some(&user("alice")), &store).await;
    assert_eq!(result.value, Some(json!(true)));

    let result = evaluator.evaluate(Some(&flag), Some(&user("bob")), &store).await;
    assert_eq!(result.value, Some(json!(false)));
}

#[tokio::test]
async fn test_prerequisite_chain() {
    init_tracing();
    let evaluator = Evaluator::new();
    let b = FeatureFlag::new("B", vec![json!("b0"), json!("b1")])
        .with_off_variation(1)
        .with_fallthrough(VariationOrRollout::variation(0));
    let a = FeatureFlag::new("A", vec![json!("a0"), json!("a1"), json!("a2")])
        .with_off_variation(1)
        .with_prerequisite("B", 0)
        .with_rule(rule_on("key", vec![json!("u")], 2));

    // B serves 0: A proceeds to its own rules
    let store = MemoryStore::new().with_flag(b.clone());
    let result = evaluator.evaluate(Some(&a), Some(&user("u")), &store).await;
    assert_eq!(result.variation, Some(2));
    assert_eq!(result.events.len(), 1);
    assert_eq!(result.events[0].key, "B");
    assert_eq!(result.events[0].prereq_of.as_deref(), Some("A"));
    assert_eq!(result.events[0].variation, Some(0));

    // B now serves 1: A falls back to its off variation
    let store = MemoryStore::new().with_flag(b.with_fallthrough(VariationOrRollout::variation(1)));
    let outcome = evaluator.variation(&store, "B", &user("u"), json!(null)).await;
    assert_eq!(outcome.variation, Some(1));

    store.upsert_flag(a);
    let outcome = evaluator.variation(&store, "A", &user("u"), json!("default")).await;
    assert_eq!(outcome.variation, Some(1));
    assert_eq!(outcome.value, json!("a1"));
    assert!(outcome.error.is_none());

    let trail: Vec<(&str, Option<&str>)> = outcome
        .events
        .iter()
        .map(|e| (e.key.as_str(), e.prereq_of.as_deref()))
        .collect();
    assert_eq!(trail, vec![("B", Some("A")), ("A", None)]);
}

#[tokio::test]
async fn test_undefined_fallthrough_variation() {
    init_tracing();
    let evaluator = Evaluator::new();
    let store = MemoryStore::new();
    let flag = FeatureFlag::new("f", vec![json!("a"), json!("b")])
        .with_fallthrough(VariationOrRollout::variation(7));

    let result = evaluator.evaluate(Some(&flag), Some(&user("u")), &store).await;
    let error = result.error.expect("undefined variation");
    assert!(error.is_undefined_variation());
    assert_eq!(error.to_string(), "Undefined variation for flag f");
    assert_eq!(result.value, None);
    assert_eq!(result.variation, None);
}

#[tokio::test]
async fn test_negated_country_clause() {
    let evaluator = Evaluator::new();
    let store = MemoryStore::new();
    let flag = FeatureFlag::boolean("not-us", false).with_rule(
        Rule::new(VariationOrRollout::variation(1))
            .with_clause(Clause::new("country", "in", vec![json!("US")]).negated()),
    );

    for (country, expected) in [("US", false), ("CA", true), ("DE", true), ("us", true)] {
        let result = evaluator
            .evaluate(Some(&flag), Some(&user("u").with_country(country)), &store)
            .await;
        assert_eq!(result.value, Some(json!(expected)), "country {country}");
    }
}

#[tokio::test]
async fn test_weighted_segment_rule_with_bucket_by() {
    let evaluator = Evaluator::new();
    let segment = Segment::new("half-of-orgs").with_salt("org-salt").with_rule(
        SegmentRule::new()
            .with_clause(Clause::new("plan", "in", vec![json!("pro")]))
            .with_weight(50_000)
            .with_bucket_by("org"),
    );
    let store = MemoryStore::new().with_segment(segment);
    let flag = FeatureFlag::boolean("f", false).with_rule(
        Rule::new(VariationOrRollout::variation(1))
            .with_clause(Clause::segment_match(["half-of-orgs"])),
    );

    // Users of the same org always land together
    for org in ["org-1", "org-2", "org-3", "org-4"] {
        let a = user("a").with_custom("plan", "pro").with_custom("org", org);
        let b = user("b").with_custom("plan", "pro").with_custom("org", org);
        let first = evaluator.evaluate(Some(&flag), Some(&a), &store).await;
        let second = evaluator.evaluate(Some(&flag), Some(&b), &store).await;
        assert_eq!(first.value, second.value, "{org}");
    }

    // Clause mismatch never reaches the weight check
    let free = user("a").with_custom("plan", "free").with_custom("org", "org-1");
    let result = evaluator.evaluate(Some(&flag), Some(&free), &store).await;
    assert_eq!(result.value, Some(json!(false)));
}

#[tokio::test]
async fn test_flags_from_json_snapshot() {
    init_tracing();
    let store = MemoryStore::from_json(
        r#"{
            "flags": {
                "dark-mode": {
                    "on": true,
                    "version": 2,
                    "salt": "dm",
                    "variations": ["light", "dark"],
                    "offVariation": 0,
                    "targets": [{ "values": ["designer"], "variation": 1 }],
                    "rules": [{
                        "clauses": [{ "op": "segmentMatch", "values": ["night-owls"] }],
                        "variation": 1
                    }],
                    "fallthrough": { "variation": 0 }
                }
            },
            "segments": {
                "night-owls": {
                    "rules": [{
                        "clauses": [{ "attribute": "timezone", "op": "in", "values": ["Pacific/Auckland"] }]
                    }]
                }
            }
        }"#,
    )
    .unwrap();
    let evaluator = Evaluator::new();

    let designer = evaluator.variation(&store, "dark-mode", &user("designer"), json!("light")).await;
    assert_eq!(designer.value, json!("dark"));

    let owl = user("kiwi").with_custom("timezone", "Pacific/Auckland");
    let owl = evaluator.variation(&store, "dark-mode", &owl, json!("light")).await;
    assert_eq!(owl.value, json!("dark"));

    let other = evaluator.variation(&store, "dark-mode", &user("x"), json!("light")).await;
    assert_eq!(other.value, json!("light"));
    assert_eq!(other.variation, Some(0));
    assert_eq!(other.events[0].version, Some(2));
}

#[tokio::test]
async fn test_cyclic_prerequisites_fail_fast() {
    init_tracing();
    let evaluator = Evaluator::new();
    let store = MemoryStore::new()
        .with_flag(FeatureFlag::boolean("a", true).with_prerequisite("b", 1))
        .with_flag(FeatureFlag::boolean("b", true).with_prerequisite("c", 1))
        .with_flag(FeatureFlag::boolean("c", true).with_prerequisite("a", 1));

    let outcome = evaluator.variation(&store, "a", &user("u"), json!(false)).await;
    let error = outcome.error.expect("cycle detected");
    assert!(error.is_cyclic_prerequisite());
    assert!(error.to_string().contains("a -> b -> c -> a"));
    assert_eq!(outcome.value, json!(false));
}
