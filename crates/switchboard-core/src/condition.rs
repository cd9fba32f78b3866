//! Condition evaluation for switch rollout rules.
//!
//! - [`ConditionEvaluator`]: one implementation per condition-set family,
//!   interpreting that family's stored field values against a request context.
//! - [`FieldMatcher`]: the per-field matching strategies shared by the
//!   built-in families (exact attribute match, percentage bucket, context
//!   flag, boolean literal).
//! - [`EvaluatorRegistry`]: maps `set_id` to its evaluator; write-time
//!   validation goes through it, and unknown ids evaluate as non-matching.
//!
//! Everything here is fail-closed: a missing identity, missing attribute,
//! unparseable stored value, or unknown field or family all evaluate to
//! "no match", never to "on" and never to a panic.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use sha2::{Digest, Sha256};

use crate::error::{SwitchError, SwitchResult};
use crate::types::{ConditionSet, EvalContext};

// ─── Percentage buckets ─────────────────────────────────────────────────────

/// Stable percentage bucket (`0..100`) for an identity string.
///
/// The bucket is the first eight bytes of the identity's SHA-256 digest,
/// read big-endian, modulo 100. The same identity therefore always lands in
/// the same bucket, across processes and releases, so a percentage rollout
/// holds steady for each user instead of re-rolling per request.
#[must_use]
pub fn identity_bucket(identity: &str) -> u64 {
    let digest = Sha256::digest(identity.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(prefix) % 100
}

/// Half-open bucket interval `[lo, hi)` over the `0..100` bucket space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BucketRange {
    lo: u64,
    hi: u64,
}

impl BucketRange {
    fn contains(self, bucket: u64) -> bool {
        self.lo <= bucket && bucket < self.hi
    }
}

/// Parses a stored percentage value into a bucket interval.
///
/// Two forms are accepted: `"low-high"` covers buckets `low..=high`
/// (inclusive both ends, mirroring operator input like `"0-50"`), and a bare
/// `"n"` covers the first `n` buckets, i.e. n percent of identities. `"0"`
/// matches nobody; `"100"` and `"0-100"` match everybody.
fn parse_percent(value: &str) -> Result<BucketRange, String> {
    fn parse_bound(part: &str) -> Result<u64, String> {
        let n: u64 = part
            .trim()
            .parse()
            .map_err(|_| format!("\"{part}\" is not an integer"))?;
        if n > 100 {
            return Err(format!("{n} is out of range (0-100)"));
        }
        Ok(n)
    }

    if let Some((lo_part, hi_part)) = value.split_once('-') {
        let lo = parse_bound(lo_part)?;
        let hi = parse_bound(hi_part)?;
        if lo > hi {
            return Err(format!("range low {lo} exceeds high {hi}"));
        }
        Ok(BucketRange { lo, hi: hi + 1 })
    } else {
        let width = parse_bound(value)?;
        Ok(BucketRange { lo: 0, hi: width })
    }
}

// ─── Truthiness ─────────────────────────────────────────────────────────────

/// Truthy forms accepted for flag attributes and boolean literals. Anything
/// else, including absence, is falsy.
fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}

fn is_falsy_literal(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "false" | "0" | "no" | "off"
    )
}

// ─── Field matchers ─────────────────────────────────────────────────────────

/// Matching strategy for one field of a condition-set family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldMatcher {
    /// Matches when the context attribute of the same name equals the stored
    /// value exactly (case-sensitive).
    Exact,
    /// Matches when the context identity's bucket falls inside the stored
    /// percentage interval. No identity, no match.
    Percent,
    /// Matches when the context attribute of the same name is truthy. The
    /// stored value is only a marker and is ignored at evaluation time.
    Flag,
    /// The stored value alone decides: a truthy literal matches every
    /// context, a falsy one matches none.
    Literal,
}

impl FieldMatcher {
    /// Write-time validation of a stored value for this matcher.
    fn validate_value(self, value: &str) -> Result<(), String> {
        match self {
            Self::Exact | Self::Flag => Ok(()),
            Self::Percent => parse_percent(value).map(|_| ()),
            Self::Literal => {
                if is_truthy(value) || is_falsy_literal(value) {
                    Ok(())
                } else {
                    Err(format!(
                        "\"{value}\" is not a boolean literal (true/false, 1/0, yes/no, on/off)"
                    ))
                }
            }
        }
    }

    /// Whether one stored `(field, value)` entry matches the context.
    fn matches(self, field: &str, value: &str, context: &EvalContext) -> bool {
        match self {
            Self::Exact => context.attribute(field) == Some(value),
            Self::Percent => match (context.identity(), parse_percent(value)) {
                (Some(identity), Ok(range)) => range.contains(identity_bucket(identity)),
                _ => false,
            },
            Self::Flag => context.attribute(field).is_some_and(is_truthy),
            Self::Literal => is_truthy(value),
        }
    }
}

// ─── Evaluator trait ────────────────────────────────────────────────────────

/// One condition-set family: knows which fields it recognizes, how to
/// validate their stored values at write time, and how to match them against
/// a request context at evaluation time.
///
/// # Contract
///
/// - `set_id()` must be stable: it is persisted inside switches and used to
///   route both validation and evaluation.
/// - `matches()` must be pure and total. It may not panic on any stored
///   value, even one that would fail `validate()` today, because stored data
///   can outlive validation rules.
pub trait ConditionEvaluator: Send + Sync {
    /// Stable identifier of the family this evaluator serves (e.g. `"user"`).
    fn set_id(&self) -> &str;

    /// Operator-facing label for listing surfaces (e.g. `"User"`).
    fn label(&self) -> &str;

    /// Field names this family recognizes, in display order.
    fn field_names(&self) -> Vec<&str>;

    /// Validates a stored value for one field.
    ///
    /// # Errors
    ///
    /// Returns [`SwitchError::InvalidField`] when `field` is not recognized
    /// by this family or `value` cannot be interpreted for it.
    fn validate(&self, field: &str, value: &str) -> SwitchResult<()>;

    /// Whether one stored `(field, value)` entry matches the context.
    /// Unrecognized fields are non-matching, never an error.
    fn matches(&self, field: &str, value: &str, context: &EvalContext) -> bool;

    /// Whether a whole condition set matches: every stored field must match
    /// (AND within a set). An empty set matches nothing.
    fn evaluate_set(&self, set: &ConditionSet, context: &EvalContext) -> bool {
        if set.fields.is_empty() {
            return false;
        }
        set.fields
            .iter()
            .all(|(field, value)| self.matches(field, value, context))
    }
}

/// Shared handle for dynamically registered evaluators.
pub type SharedEvaluator = Arc<dyn ConditionEvaluator>;

// ─── Declarative evaluator ──────────────────────────────────────────────────

/// A [`ConditionEvaluator`] declared as a table of field matchers.
///
/// All built-in families are instances of this type; bespoke trait
/// implementations are only needed when a family's matching logic goes
/// beyond per-field strategies.
pub struct FieldSetEvaluator {
    set_id: String,
    label: String,
    fields: BTreeMap<String, FieldMatcher>,
}

impl FieldSetEvaluator {
    /// Creates an evaluator for a family with no fields yet.
    #[must_use]
    pub fn new(set_id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            set_id: set_id.into(),
            label: label.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Declares a field and its matching strategy.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, matcher: FieldMatcher) -> Self {
        self.fields.insert(name.into(), matcher);
        self
    }
}

impl fmt::Debug for FieldSetEvaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldSetEvaluator")
            .field("set_id", &self.set_id)
            .field("label", &self.label)
            .field("fields", &self.fields)
            .finish()
    }
}

impl ConditionEvaluator for FieldSetEvaluator {
    fn set_id(&self) -> &str {
        &self.set_id
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn field_names(&self) -> Vec<&str> {
        self.fields.keys().map(String::as_str).collect()
    }

    fn validate(&self, field: &str, value: &str) -> SwitchResult<()> {
        let Some(matcher) = self.fields.get(field) else {
            return Err(SwitchError::InvalidField {
                set_id: self.set_id.clone(),
                field: field.to_owned(),
                reason: format!(
                    "not a recognized field (expected one of: {})",
                    self.field_names().join(", ")
                ),
            });
        };
        matcher
            .validate_value(value)
            .map_err(|reason| SwitchError::InvalidField {
                set_id: self.set_id.clone(),
                field: field.to_owned(),
                reason,
            })
    }

    fn matches(&self, field: &str, value: &str, context: &EvalContext) -> bool {
        self.fields
            .get(field)
            .is_some_and(|matcher| matcher.matches(field, value, context))
    }
}

// ─── Evaluator registry ─────────────────────────────────────────────────────

/// Maps condition-set ids to their evaluators.
///
/// Mutation paths use [`EvaluatorRegistry::validate_fields`] to reject
/// unknown families and malformed values before they are stored; the
/// evaluation path treats a missing evaluator as non-matching instead, so a
/// family unregistered after data was written degrades to "off" rather than
/// failing requests.
#[derive(Default)]
pub struct EvaluatorRegistry {
    evaluators: BTreeMap<String, SharedEvaluator>,
}

impl EvaluatorRegistry {
    /// Creates an empty registry. See `builtins` for the stock families.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an evaluator under its own `set_id`, returning any
    /// evaluator it displaced.
    pub fn register(&mut self, evaluator: SharedEvaluator) -> Option<SharedEvaluator> {
        self.evaluators
            .insert(evaluator.set_id().to_owned(), evaluator)
    }

    /// Removes the evaluator for a family, if registered.
    pub fn unregister(&mut self, set_id: &str) -> Option<SharedEvaluator> {
        self.evaluators.remove(set_id)
    }

    /// The evaluator for a family, if registered.
    #[must_use]
    pub fn get(&self, set_id: &str) -> Option<SharedEvaluator> {
        self.evaluators.get(set_id).cloned()
    }

    /// Whether a family is registered.
    #[must_use]
    pub fn contains(&self, set_id: &str) -> bool {
        self.evaluators.contains_key(set_id)
    }

    /// Registered family ids, in sorted order.
    #[must_use]
    pub fn set_ids(&self) -> Vec<&str> {
        self.evaluators.keys().map(String::as_str).collect()
    }

    /// Number of registered families.
    #[must_use]
    pub fn len(&self) -> usize {
        self.evaluators.len()
    }

    /// Whether no families are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.evaluators.is_empty()
    }

    /// Write-time validation of a batch of stored fields for one family.
    ///
    /// # Errors
    ///
    /// Returns [`SwitchError::UnknownConditionType`] when no evaluator is
    /// registered for `set_id`, or the first [`SwitchError::InvalidField`]
    /// reported by the evaluator.
    pub fn validate_fields(
        &self,
        set_id: &str,
        fields: &BTreeMap<String, String>,
    ) -> SwitchResult<()> {
        let Some(evaluator) = self.evaluators.get(set_id) else {
            return Err(SwitchError::UnknownConditionType {
                set_id: set_id.to_owned(),
            });
        };
        for (field, value) in fields {
            evaluator.validate(field, value)?;
        }
        Ok(())
    }

    /// Whether a condition set matches the context. Families with no
    /// registered evaluator are non-matching.
    #[must_use]
    pub fn evaluate_set(&self, set: &ConditionSet, context: &EvalContext) -> bool {
        self.evaluators
            .get(&set.set_id)
            .is_some_and(|evaluator| evaluator.evaluate_set(set, context))
    }
}

impl fmt::Debug for EvaluatorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvaluatorRegistry")
            .field("set_ids", &self.set_ids())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn user_evaluator() -> FieldSetEvaluator {
        FieldSetEvaluator::new("user", "User")
            .with_field("username", FieldMatcher::Exact)
            .with_field("percent", FieldMatcher::Percent)
            .with_field("is_staff", FieldMatcher::Flag)
    }

    // ── Percentage parsing ──────────────────────────────────────────────

    #[test]
    fn percent_range_form_is_inclusive_on_both_ends() {
        let range = parse_percent("10-20").unwrap();
        assert!(!range.contains(9));
        assert!(range.contains(10));
        assert!(range.contains(20));
        assert!(!range.contains(21));
    }

    #[test]
    fn percent_bare_form_covers_first_n_buckets() {
        let range = parse_percent("10").unwrap();
        assert!(range.contains(0));
        assert!(range.contains(9));
        assert!(!range.contains(10));
    }

    #[test]
    fn percent_zero_matches_nothing() {
        let range = parse_percent("0").unwrap();
        for bucket in 0..100 {
            assert!(!range.contains(bucket));
        }
    }

    #[test]
    fn percent_full_forms_match_everything() {
        for form in ["100", "0-100", "0-99"] {
            let range = parse_percent(form).unwrap();
            for bucket in 0..100 {
                assert!(range.contains(bucket), "bucket {bucket} under {form:?}");
            }
        }
    }

    #[test]
    fn percent_accepts_surrounding_whitespace() {
        assert_eq!(parse_percent(" 10 - 20 ").unwrap(), parse_percent("10-20").unwrap());
    }

    #[test]
    fn percent_rejects_garbage() {
        for bad in ["", "abc", "10-", "-5", "10-5", "101", "0-101", "1-2-3", "1.5"] {
            assert!(parse_percent(bad).is_err(), "{bad:?} should not parse");
        }
    }

    // ── Identity buckets ────────────────────────────────────────────────

    #[test]
    fn bucket_is_stable_for_same_identity() {
        assert_eq!(identity_bucket("u1"), identity_bucket("u1"));
        assert_eq!(identity_bucket(""), identity_bucket(""));
    }

    #[test]
    fn bucket_is_always_below_one_hundred() {
        for id in ["u1", "u2", "alice@example.com", "10.0.0.1", ""] {
            assert!(identity_bucket(id) < 100);
        }
    }

    #[test]
    fn buckets_spread_across_identities() {
        // Not a distribution test, just a sanity check that the hash does
        // not collapse everything into one bucket.
        let buckets: std::collections::HashSet<u64> =
            (0..50).map(|i| identity_bucket(&format!("user-{i}"))).collect();
        assert!(buckets.len() > 10);
    }

    // ── Field matchers ──────────────────────────────────────────────────

    #[test]
    fn exact_matcher_compares_attribute() {
        let ctx = EvalContext::new().with_attribute("username", "alice");
        assert!(FieldMatcher::Exact.matches("username", "alice", &ctx));
        assert!(!FieldMatcher::Exact.matches("username", "bob", &ctx));
        assert!(!FieldMatcher::Exact.matches("username", "Alice", &ctx));
        assert!(!FieldMatcher::Exact.matches("email", "alice", &ctx));
    }

    #[test]
    fn percent_matcher_uses_identity_bucket() {
        let ctx = EvalContext::for_identity("u1");
        assert!(FieldMatcher::Percent.matches("percent", "0-100", &ctx));
        assert!(!FieldMatcher::Percent.matches("percent", "0", &ctx));

        let bucket = identity_bucket("u1");
        let exact = format!("{bucket}-{bucket}");
        assert!(FieldMatcher::Percent.matches("percent", &exact, &ctx));
    }

    #[test]
    fn percent_matcher_without_identity_never_matches() {
        let ctx = EvalContext::new().with_attribute("percent", "50");
        assert!(!FieldMatcher::Percent.matches("percent", "0-100", &ctx));
    }

    #[test]
    fn percent_matcher_fails_closed_on_bad_stored_value() {
        let ctx = EvalContext::for_identity("u1");
        assert!(!FieldMatcher::Percent.matches("percent", "not-a-range", &ctx));
    }

    #[test]
    fn flag_matcher_reads_context_truthiness() {
        for truthy in ["true", "1", "yes", "on", "TRUE", " On "] {
            let ctx = EvalContext::new().with_attribute("is_staff", truthy);
            assert!(FieldMatcher::Flag.matches("is_staff", "1", &ctx), "{truthy:?}");
        }
        for falsy in ["false", "0", "no", "off", "", "whatever"] {
            let ctx = EvalContext::new().with_attribute("is_staff", falsy);
            assert!(!FieldMatcher::Flag.matches("is_staff", "1", &ctx), "{falsy:?}");
        }
        assert!(!FieldMatcher::Flag.matches("is_staff", "1", &EvalContext::new()));
    }

    #[test]
    fn literal_matcher_reads_stored_value_only() {
        let empty = EvalContext::new();
        assert!(FieldMatcher::Literal.matches("value", "true", &empty));
        assert!(FieldMatcher::Literal.matches("value", "1", &empty));
        assert!(!FieldMatcher::Literal.matches("value", "false", &empty));
        assert!(!FieldMatcher::Literal.matches("value", "garbage", &empty));
    }

    #[test]
    fn matcher_validation_rules() {
        assert!(FieldMatcher::Exact.validate_value("anything").is_ok());
        assert!(FieldMatcher::Flag.validate_value("1").is_ok());
        assert!(FieldMatcher::Percent.validate_value("0-50").is_ok());
        assert!(FieldMatcher::Percent.validate_value("150").is_err());
        assert!(FieldMatcher::Literal.validate_value("true").is_ok());
        assert!(FieldMatcher::Literal.validate_value("off").is_ok());
        assert!(FieldMatcher::Literal.validate_value("maybe").is_err());
    }

    // ── FieldSetEvaluator ───────────────────────────────────────────────

    #[test]
    fn evaluator_reports_identity_and_fields() {
        let eval = user_evaluator();
        assert_eq!(eval.set_id(), "user");
        assert_eq!(eval.label(), "User");
        assert_eq!(eval.field_names(), vec!["is_staff", "percent", "username"]);
    }

    #[test]
    fn evaluator_validate_rejects_unknown_field() {
        let eval = user_evaluator();
        let err = eval.validate("hair_color", "red").unwrap_err();
        match err {
            SwitchError::InvalidField { set_id, field, reason } => {
                assert_eq!(set_id, "user");
                assert_eq!(field, "hair_color");
                assert!(reason.contains("username"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn evaluator_validate_delegates_to_matcher() {
        let eval = user_evaluator();
        assert!(eval.validate("percent", "0-50").is_ok());
        let err = eval.validate("percent", "banana").unwrap_err();
        assert!(matches!(err, SwitchError::InvalidField { .. }));
    }

    #[test]
    fn evaluate_set_is_and_across_fields() {
        let eval = user_evaluator();
        let set = ConditionSet::new("user")
            .with_field("username", "alice")
            .with_field("is_staff", "1");

        let both = EvalContext::new()
            .with_attribute("username", "alice")
            .with_attribute("is_staff", "true");
        assert!(eval.evaluate_set(&set, &both));

        let only_name = EvalContext::new().with_attribute("username", "alice");
        assert!(!eval.evaluate_set(&set, &only_name));
    }

    #[test]
    fn evaluate_set_empty_set_matches_nothing() {
        let eval = user_evaluator();
        let set = ConditionSet::new("user");
        let ctx = EvalContext::new().with_attribute("username", "alice");
        assert!(!eval.evaluate_set(&set, &ctx));
    }

    #[test]
    fn evaluate_set_unknown_field_fails_closed() {
        let eval = user_evaluator();
        let set = ConditionSet::new("user").with_field("hair_color", "red");
        let ctx = EvalContext::new().with_attribute("hair_color", "red");
        assert!(!eval.evaluate_set(&set, &ctx));
    }

    // ── Registry ────────────────────────────────────────────────────────

    #[test]
    fn registry_register_get_unregister() {
        let mut registry = EvaluatorRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.register(Arc::new(user_evaluator())).is_none());
        assert_eq!(registry.len(), 1);
        assert!(registry.contains("user"));
        assert_eq!(registry.get("user").unwrap().set_id(), "user");

        let displaced = registry
            .register(Arc::new(FieldSetEvaluator::new("user", "User v2")))
            .unwrap();
        assert_eq!(displaced.label(), "User");
        assert_eq!(registry.get("user").unwrap().label(), "User v2");

        assert!(registry.unregister("user").is_some());
        assert!(registry.unregister("user").is_none());
        assert!(registry.get("user").is_none());
    }

    #[test]
    fn registry_set_ids_are_sorted() {
        let mut registry = EvaluatorRegistry::new();
        registry.register(Arc::new(FieldSetEvaluator::new("zeta", "Z")));
        registry.register(Arc::new(FieldSetEvaluator::new("alpha", "A")));
        assert_eq!(registry.set_ids(), vec!["alpha", "zeta"]);
    }

    #[test]
    fn registry_validate_fields_unknown_family() {
        let registry = EvaluatorRegistry::new();
        let fields = BTreeMap::from([("username".to_owned(), "alice".to_owned())]);
        let err = registry.validate_fields("user", &fields).unwrap_err();
        assert!(matches!(err, SwitchError::UnknownConditionType { set_id } if set_id == "user"));
    }

    #[test]
    fn registry_validate_fields_surfaces_field_errors() {
        let mut registry = EvaluatorRegistry::new();
        registry.register(Arc::new(user_evaluator()));

        let good = BTreeMap::from([("username".to_owned(), "alice".to_owned())]);
        assert!(registry.validate_fields("user", &good).is_ok());

        let bad = BTreeMap::from([("percent".to_owned(), "200".to_owned())]);
        let err = registry.validate_fields("user", &bad).unwrap_err();
        assert!(matches!(err, SwitchError::InvalidField { .. }));
    }

    #[test]
    fn registry_evaluate_set_fails_closed_for_unknown_family() {
        let registry = EvaluatorRegistry::new();
        let set = ConditionSet::new("mystery").with_field("anything", "x");
        assert!(!registry.evaluate_set(&set, &EvalContext::for_identity("u1")));
    }

    #[test]
    fn registry_debug_lists_families_not_internals() {
        let mut registry = EvaluatorRegistry::new();
        registry.register(Arc::new(user_evaluator()));
        let rendered = format!("{registry:?}");
        assert!(rendered.contains("user"));
    }

    #[test]
    fn condition_evaluator_trait_is_object_safe() {
        fn _takes_dyn_evaluator(_: &dyn ConditionEvaluator) {}
    }

    // ── Properties ──────────────────────────────────────────────────────

    proptest! {
        #[test]
        fn parse_percent_never_panics(value in ".*") {
            let _ = parse_percent(&value);
        }

        #[test]
        fn identity_bucket_stays_in_range(identity in ".*") {
            prop_assert!(identity_bucket(&identity) < 100);
        }

        #[test]
        fn full_range_matches_every_identity(identity in ".+") {
            let ctx = EvalContext::for_identity(identity);
            prop_assert!(FieldMatcher::Percent.matches("percent", "0-100", &ctx));
        }

        #[test]
        fn valid_range_forms_parse(lo in 0u64..=100, hi in 0u64..=100) {
            let value = format!("{}-{}", lo.min(hi), lo.max(hi));
            prop_assert!(parse_percent(&value).is_ok());
        }
    }
}
