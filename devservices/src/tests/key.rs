//! Tests for ComparableKey equality and hashing

use super::fixtures::*;
use crate::key::ComparableKey;
use shared::{ConfigError, LaunchMode, Owner};

#[test]
fn test_identical_keys_match_and_hash_equal() {
    let cmp = test_comparator();
    let a = ComparableKey::new(test_owner(), Some(global_settings()), Some(dummy_config("a", 1)));
    let b = ComparableKey::new(test_owner(), Some(global_settings()), Some(dummy_config("a", 1)));

    assert!(a.matches(&a, &cmp).unwrap());
    assert!(a.matches(&b, &cmp).unwrap());
    assert!(b.matches(&a, &cmp).unwrap());
    assert_eq!(a.structural_hash(&cmp).unwrap(), b.structural_hash(&cmp).unwrap());
}

#[test]
fn test_keys_never_match_across_owners() {
    let cmp = test_comparator();
    let settings = dummy_config("a", 1);
    let a = ComparableKey::new(Owner::new("svc", LaunchMode::Test, "cfg"), None, Some(settings.clone()));
    let b = ComparableKey::new(Owner::new("other", LaunchMode::Test, "cfg"), None, Some(settings.clone()));
    let c = ComparableKey::new(Owner::new("svc", LaunchMode::Test, "other"), None, Some(settings));

    assert!(!a.matches(&b, &cmp).unwrap());
    assert!(!a.matches(&c, &cmp).unwrap());
}

#[test]
fn test_launch_mode_is_part_of_the_key() {
    let cmp = test_comparator();
    let test = ComparableKey::new(
        Owner::new("svc", LaunchMode::Test, "cfg"),
        Some(global_settings()),
        Some(dummy_config("a", 1)),
    );
    let dev = ComparableKey::new(
        Owner::new("svc", LaunchMode::Development, "cfg"),
        Some(global_settings()),
        Some(dummy_config("a", 1)),
    );

    assert!(!test.matches(&dev, &cmp).unwrap());
}

#[test]
fn test_settings_differences_are_detected() {
    let cmp = test_comparator();
    let base = ComparableKey::new(test_owner(), Some(global_settings()), Some(dummy_config("a", 1)));
    let other_feature = ComparableKey::new(test_owner(), Some(global_settings()), Some(dummy_config("a", 2)));
    let no_global = ComparableKey::new(test_owner(), None, Some(dummy_config("a", 1)));

    assert!(!base.matches(&other_feature, &cmp).unwrap());
    assert!(!base.matches(&no_global, &cmp).unwrap());
}

#[test]
fn test_feature_settings_are_compared_first() {
    // The feature settings differ, so the broken global settings are never read
    let cmp = test_comparator();
    let a = ComparableKey::new(test_owner(), Some(unregistered_config()), Some(dummy_config("a", 1)));
    let b = ComparableKey::new(test_owner(), Some(unregistered_config()), Some(dummy_config("b", 1)));

    assert!(!a.matches(&b, &cmp).unwrap());
}

#[test]
fn test_comparison_errors_surface() {
    let cmp = test_comparator();
    let a = ComparableKey::new(test_owner(), None, Some(unregistered_config()));
    let b = ComparableKey::new(test_owner(), None, Some(unregistered_config()));

    assert!(matches!(a.matches(&b, &cmp), Err(ConfigError::UnknownShape { .. })));
    assert!(matches!(a.structural_hash(&cmp), Err(ConfigError::UnknownShape { .. })));
}
