//! Whole-switch evaluation: effective status combined with rollout rules.
//!
//! [`evaluate_switch`] is the single entry point feature checks go through.
//! It resolves the parent-inheritance chain to a concrete status, then
//! applies that status: `Disabled` is off, `ActiveForEveryone` is on, and
//! `ActiveForConditions` consults the switch's own condition sets (OR across
//! sets, AND within a set). An inherited status only contributes the armed
//! state; the conditions evaluated are always the evaluated switch's own.

use crate::condition::EvaluatorRegistry;
use crate::error::SwitchResult;
use crate::status::{SwitchLookup, resolve_effective_status};
use crate::types::{EvalContext, Switch, SwitchStatus};

/// Whether any of the switch's condition sets matches the context.
///
/// OR across sets; a switch with no sets matches nothing. Sets whose family
/// has no registered evaluator are non-matching, so a stale family degrades
/// to "off" instead of failing the check.
#[must_use]
pub fn conditions_match(
    switch: &Switch,
    evaluators: &EvaluatorRegistry,
    context: &EvalContext,
) -> bool {
    switch
        .condition_sets
        .iter()
        .any(|set| evaluators.evaluate_set(set, context))
}

/// Evaluates a switch against a request context.
///
/// # Errors
///
/// Returns [`SwitchError::InheritanceCycle`] when the parent chain loops or
/// exceeds `max_depth`; no other error is possible, keeping rollout checks
/// total for well-formed hierarchies.
///
/// [`SwitchError::InheritanceCycle`]: crate::error::SwitchError::InheritanceCycle
pub fn evaluate_switch<L>(
    switch: &Switch,
    lookup: &L,
    evaluators: &EvaluatorRegistry,
    context: &EvalContext,
    max_depth: usize,
) -> SwitchResult<bool>
where
    L: SwitchLookup + ?Sized,
{
    let effective = resolve_effective_status(switch, lookup, max_depth)?;
    Ok(match effective {
        SwitchStatus::Disabled => false,
        SwitchStatus::ActiveForEveryone => true,
        SwitchStatus::ActiveForConditions => conditions_match(switch, evaluators, context),
        // The resolver only ever yields concrete statuses; stay off if that
        // invariant is ever broken.
        SwitchStatus::InheritFromParent => false,
    })
}
