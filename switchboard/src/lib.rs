//! # switchboard
//!
//! Feature toggles ("switches") for Rust services: gate code paths at
//! runtime, roll them out to a deterministic percentage of users, target
//! individual accounts or hosts, and manage everything through one
//! thread-safe registry.
//!
//! A switch is either off for everyone, on for everyone, on for whoever
//! matches its **condition sets**, or deferring to a **parent** switch.
//! Evaluation is fail-closed: unknown keys, dangling parents, and
//! unrecognized condition families all read as off rather than erroring a
//! request path.
//!
//! # Quick Start
//!
//! ```rust
//! use std::collections::BTreeMap;
//! use switchboard::prelude::*;
//!
//! fn main() -> SwitchResult<()> {
//!     let registry = SwitchboardBuilder::new().build()?;
//!
//!     // Operator side: create and configure a rollout.
//!     registry.create("beta_ui", "Beta UI", "New dashboard")?;
//!     registry.set_status("beta_ui", SwitchStatus::ActiveForConditions)?;
//!     let mut fields = BTreeMap::new();
//!     fields.insert("percent".to_owned(), "10".to_owned());
//!     registry.add_condition("beta_ui", "percentage", fields)?;
//!
//!     // Request side: same identity, same verdict, every time.
//!     let ctx = EvalContext::for_identity("user-42");
//!     let first = registry.evaluate("beta_ui", &ctx)?;
//!     assert_eq!(registry.evaluate("beta_ui", &ctx)?, first);
//!     Ok(())
//! }
//! ```
//!
//! ## Crate Layout
//!
//! | Crate | Purpose |
//! |-------|---------|
//! | [`switchboard-core`](core) | Types, errors, status resolution, condition evaluators, fuzzy scorer, config |
//! | [`switchboard-registry`](registry) | [`SwitchRegistry`]: the concurrent store with versioning and cascades |
//! | `switchboard` | This facade: flat re-exports plus [`SwitchboardBuilder`] |
//!
//! ## Key Types
//!
//! - [`SwitchboardBuilder`]: wire config and condition families into a registry
//! - [`SwitchRegistry`]: create, update, delete, evaluate, and search switches
//! - [`Switch`] / [`SwitchStatus`]: the stored record and its four states
//! - [`EvalContext`]: per-request identity and attributes
//! - [`ConditionEvaluator`]: trait for custom condition-set families
//! - [`SwitchboardConfig`]: limits, autocreate, inheritance depth
//!
//! # Concurrency
//!
//! Every mutation is atomic and bumps the switch's `version` by exactly
//! one; concurrent edits are caught by `expected_version` on
//! [`SwitchRegistry::update`]. Reads hand out snapshot clones, never live
//! aliases.

// ─── Sub-crate module aliases (advanced access) ─────────────────────────

/// Domain types, errors, evaluation rules, scoring, and config.
pub use switchboard_core as core;
/// The concurrent switch store.
pub use switchboard_registry as registry;

// ─── Errors ─────────────────────────────────────────────────────────────

pub use switchboard_core::{SwitchError, SwitchResult};

// ─── Domain types ───────────────────────────────────────────────────────

pub use switchboard_core::{ConditionSet, EvalContext, Switch, SwitchStatus};

// ─── Conditions and evaluators ──────────────────────────────────────────

pub use switchboard_core::{
    ConditionEvaluator, EvaluatorRegistry, FieldMatcher, FieldSetEvaluator, SharedEvaluator,
    identity_bucket,
};

// Stock condition-set families.
pub use switchboard_core::{
    all_families, boolean_family, builtin_registry, host_family, install_builtins, ip_family,
    percentage_family, user_family,
};

// ─── Status resolution and evaluation ───────────────────────────────────

pub use switchboard_core::{
    DEFAULT_MAX_PARENT_DEPTH, SwitchLookup, conditions_match, evaluate_switch,
    resolve_effective_status,
};

// ─── Listing search ─────────────────────────────────────────────────────

pub use switchboard_core::{matches_query, rank_switches, score, switch_score};

// ─── Configuration ──────────────────────────────────────────────────────

pub use switchboard_core::SwitchboardConfig;

// ─── Registry ───────────────────────────────────────────────────────────

pub use switchboard_registry::SwitchRegistry;

// ─── Builder convenience API ────────────────────────────────────────────

mod builder;
pub use builder::SwitchboardBuilder;

// ─── Prelude ────────────────────────────────────────────────────────────

/// Convenience re-exports for common usage.
///
/// ```rust
/// use switchboard::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        ConditionEvaluator, EvalContext, Switch, SwitchError, SwitchRegistry, SwitchResult,
        SwitchStatus, SwitchboardBuilder, SwitchboardConfig,
    };
}
