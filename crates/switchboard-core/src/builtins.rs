//! Stock condition-set families registered by default.
//!
//! These cover the classic rollout vocabulary: user allow-lists and account
//! flags, IP targeting, host targeting, plain percentage rollout, and a
//! boolean literal for coarse kill-switches. Date-window targeting is
//! deliberately absent: it would pull a clock into evaluation, which stays
//! pure.

use std::sync::Arc;

use crate::condition::{EvaluatorRegistry, FieldMatcher, FieldSetEvaluator, SharedEvaluator};

/// `user` family: match on account identity or account flags, or roll out to
/// a percentage of identities.
#[must_use]
pub fn user_family() -> SharedEvaluator {
    Arc::new(
        FieldSetEvaluator::new("user", "User")
            .with_field("username", FieldMatcher::Exact)
            .with_field("email", FieldMatcher::Exact)
            .with_field("percent", FieldMatcher::Percent)
            .with_field("is_anonymous", FieldMatcher::Flag)
            .with_field("is_active", FieldMatcher::Flag)
            .with_field("is_staff", FieldMatcher::Flag)
            .with_field("is_superuser", FieldMatcher::Flag),
    )
}

/// `ip` family: match on the request address, an internal-network flag, or a
/// percentage of addresses.
#[must_use]
pub fn ip_family() -> SharedEvaluator {
    Arc::new(
        FieldSetEvaluator::new("ip", "IP Address")
            .with_field("address", FieldMatcher::Exact)
            .with_field("internal", FieldMatcher::Flag)
            .with_field("percent", FieldMatcher::Percent),
    )
}

/// `host` family: match on the serving hostname.
#[must_use]
pub fn host_family() -> SharedEvaluator {
    Arc::new(FieldSetEvaluator::new("host", "Host").with_field("hostname", FieldMatcher::Exact))
}

/// `percentage` family: identity-bucket rollout with no other constraint.
#[must_use]
pub fn percentage_family() -> SharedEvaluator {
    Arc::new(
        FieldSetEvaluator::new("percentage", "Percentage")
            .with_field("percent", FieldMatcher::Percent),
    )
}

/// `boolean` family: a stored literal that matches every context when truthy.
#[must_use]
pub fn boolean_family() -> SharedEvaluator {
    Arc::new(FieldSetEvaluator::new("boolean", "Boolean").with_field("value", FieldMatcher::Literal))
}

/// All stock families, in registration order.
#[must_use]
pub fn all_families() -> Vec<SharedEvaluator> {
    vec![
        user_family(),
        ip_family(),
        host_family(),
        percentage_family(),
        boolean_family(),
    ]
}

/// Registers every stock family, replacing any same-id registration.
pub fn install_builtins(registry: &mut EvaluatorRegistry) {
    for family in all_families() {
        registry.register(family);
    }
}

/// A registry preloaded with the stock families.
#[must_use]
pub fn builtin_registry() -> EvaluatorRegistry {
    let mut registry = EvaluatorRegistry::new();
    install_builtins(&mut registry);
    registry
}
