//! Core model, evaluation, and scoring for the switchboard feature-toggle
//! library.
//!
//! This crate defines the switch domain model (`Switch`, `SwitchStatus`,
//! `ConditionSet`, `EvalContext`), the condition-evaluator machinery and its
//! built-in families, effective-status resolution across parent chains,
//! fuzzy scoring for listing search, the error type (`SwitchError`), and
//! runtime configuration.
//!
//! It has minimal external dependencies and is intended to be depended on by
//! every other crate in the workspace.

pub mod builtins;
pub mod condition;
pub mod config;
pub mod error;
pub mod eval;
pub mod score;
pub mod status;
pub mod tracing_config;
pub mod types;

pub use builtins::{
    all_families, boolean_family, builtin_registry, host_family, install_builtins, ip_family,
    percentage_family, user_family,
};
pub use condition::{
    ConditionEvaluator, EvaluatorRegistry, FieldMatcher, FieldSetEvaluator, SharedEvaluator,
    identity_bucket,
};
pub use config::SwitchboardConfig;
pub use error::{SwitchError, SwitchResult};
pub use eval::{conditions_match, evaluate_switch};
pub use score::{matches_query, rank_switches, score, switch_score};
pub use status::{DEFAULT_MAX_PARENT_DEPTH, SwitchLookup, resolve_effective_status};
pub use types::{ConditionSet, EvalContext, Switch, SwitchStatus};
