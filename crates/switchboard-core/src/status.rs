//! Effective-status resolution across parent-inheritance chains.
//!
//! A switch whose status is [`SwitchStatus::InheritFromParent`] defers to its
//! parent, which may itself defer further up. [`resolve_effective_status`]
//! walks that chain until it reaches a concrete status, guarding against
//! loops and runaway depth. Broken links resolve to `Disabled` rather than
//! erroring: a dangling parent must never turn a feature on.

use std::collections::HashSet;

use crate::error::{SwitchError, SwitchResult};
use crate::types::{Switch, SwitchStatus};

/// Traversal bound applied when a caller has no configured limit. Operator
/// hierarchies are shallow in practice; anything deeper than this is treated
/// as a non-terminating chain.
pub const DEFAULT_MAX_PARENT_DEPTH: usize = 16;

/// Read-only switch lookup, as needed by inheritance resolution.
///
/// The registry implements this over its live store; tests implement it over
/// a plain map. Implementations return owned snapshots so resolution never
/// holds a reference into shared state across hops.
pub trait SwitchLookup {
    /// Snapshot of the switch stored under `key`, if any.
    fn snapshot(&self, key: &str) -> Option<Switch>;
}

impl SwitchLookup for std::collections::HashMap<String, Switch> {
    fn snapshot(&self, key: &str) -> Option<Switch> {
        self.get(key).cloned()
    }
}

/// Resolves the status a switch actually exhibits once any
/// `InheritFromParent` chain is followed.
///
/// Concrete statuses pass through untouched. For inheriting switches the
/// chain is walked parent by parent until a concrete status appears. Two
/// dead ends resolve fail-closed to [`SwitchStatus::Disabled`]: an inheriting
/// switch with no parent linked, and a parent key that no longer exists.
///
/// # Errors
///
/// Returns [`SwitchError::InheritanceCycle`] if the chain revisits a switch
/// or runs longer than `max_depth` hops. The registry refuses to create such
/// chains at write time, so hitting this during resolution means the store
/// was corrupted out-of-band.
pub fn resolve_effective_status<L>(
    switch: &Switch,
    lookup: &L,
    max_depth: usize,
) -> SwitchResult<SwitchStatus>
where
    L: SwitchLookup + ?Sized,
{
    if switch.status != SwitchStatus::InheritFromParent {
        return Ok(switch.status);
    }

    let mut visited: HashSet<String> = HashSet::new();
    visited.insert(switch.key.clone());

    let mut next = switch.parent_key.clone();
    let mut depth = 0usize;

    while let Some(key) = next {
        if !visited.insert(key.clone()) {
            return Err(SwitchError::InheritanceCycle { key });
        }
        depth += 1;
        if depth > max_depth {
            return Err(SwitchError::InheritanceCycle { key });
        }

        let Some(parent) = lookup.snapshot(&key) else {
            // Dangling reference: fail closed.
            return Ok(SwitchStatus::Disabled);
        };
        if parent.status != SwitchStatus::InheritFromParent {
            return Ok(parent.status);
        }
        next = parent.parent_key;
    }

    // Inherit requested but no parent linked: fail closed.
    Ok(SwitchStatus::Disabled)
}
