use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{SwitchError, SwitchResult};

// ---------------------------------------------------------------------------
// Switch status
// ---------------------------------------------------------------------------

/// Activation status of a switch.
///
/// The legacy transport speaks numeric codes `1..=4`; those survive only at
/// the wire boundary via [`SwitchStatus::from_code`] and [`SwitchStatus::code`].
/// Everywhere else the enum is matched exhaustively so an unhandled variant is
/// a compile error, not a runtime surprise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SwitchStatus {
    /// Off for every context, regardless of conditions.
    Disabled,
    /// On for contexts matching at least one condition set.
    ActiveForConditions,
    /// On for every context.
    ActiveForEveryone,
    /// Defers to the parent switch's effective status.
    InheritFromParent,
}

impl SwitchStatus {
    /// All four variants, in wire-code order. Handy for exhaustive tests and
    /// transport-side enumeration.
    pub const ALL: [Self; 4] = [
        Self::Disabled,
        Self::ActiveForConditions,
        Self::ActiveForEveryone,
        Self::InheritFromParent,
    ];

    /// Decode a legacy wire status code.
    ///
    /// # Errors
    ///
    /// Returns [`SwitchError::InvalidStatus`] for any code outside `1..=4`.
    pub fn from_code(code: u8) -> SwitchResult<Self> {
        match code {
            1 => Ok(Self::Disabled),
            2 => Ok(Self::ActiveForConditions),
            3 => Ok(Self::ActiveForEveryone),
            4 => Ok(Self::InheritFromParent),
            _ => Err(SwitchError::InvalidStatus { code }),
        }
    }

    /// The legacy wire code for this status.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Disabled => 1,
            Self::ActiveForConditions => 2,
            Self::ActiveForEveryone => 3,
            Self::InheritFromParent => 4,
        }
    }
}

impl fmt::Display for SwitchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => write!(f, "Disabled for everyone"),
            Self::ActiveForConditions => write!(f, "Active for conditions"),
            Self::ActiveForEveryone => write!(f, "Active for everyone"),
            Self::InheritFromParent => write!(f, "Inherit from parent"),
        }
    }
}

// ---------------------------------------------------------------------------
// Condition sets
// ---------------------------------------------------------------------------

/// One rollout rule attached to a switch: a condition-set family (`set_id`)
/// plus the stored field values for that family.
///
/// A switch holds at most one set per `set_id`; adding conditions for an
/// existing id merges field-by-field instead of appending a duplicate set.
/// Within a set all stored fields must match a context (AND); across sets any
/// match activates the switch (OR).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionSet {
    /// Identifies the condition-set type/operator family (e.g. `"user"`,
    /// `"percentage"`, `"boolean"`).
    pub set_id: String,
    /// Field name to stored value. Interpretation is delegated to the
    /// evaluator registered for `set_id`.
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
}

impl ConditionSet {
    /// Creates an empty set for the given family.
    #[must_use]
    pub fn new(set_id: impl Into<String>) -> Self {
        Self {
            set_id: set_id.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Adds (or overwrites) a stored field value.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Stored value for a field, if present.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// True when the set holds no field values. Empty sets never match and
    /// are dropped from switches rather than persisted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Switch
// ---------------------------------------------------------------------------

/// A named feature toggle: status, optional parent inheritance, and rollout
/// condition sets.
///
/// Values of this type handed out by the registry are snapshots (clones),
/// never live aliases; mutating a snapshot has no effect on registry state.
/// `version` increases by exactly 1 on every successful registry mutation and
/// backs the optimistic-concurrency check on metadata updates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Switch {
    /// Unique identifier. Changed only through the registry's rename path.
    pub key: String,
    /// Operator-facing display name.
    pub name: String,
    /// Free-text description.
    #[serde(default)]
    pub description: String,
    /// Activation status.
    pub status: SwitchStatus,
    /// Optional parent reference, consulted when `status` is
    /// [`SwitchStatus::InheritFromParent`].
    #[serde(default)]
    pub parent_key: Option<String>,
    /// Rollout rules, in display order. Evaluation is OR across sets.
    #[serde(default)]
    pub condition_sets: Vec<ConditionSet>,
    /// Monotonic mutation counter, starting at 1 on create.
    pub version: u64,
}

impl Switch {
    /// Creates a switch in its initial lifecycle state: `Disabled`, no
    /// parent, no conditions, version 1.
    #[must_use]
    pub fn new(
        key: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            description: description.into(),
            status: SwitchStatus::Disabled,
            parent_key: None,
            condition_sets: Vec::new(),
            version: 1,
        }
    }

    /// The condition set for a family, if one is attached.
    #[must_use]
    pub fn condition_set(&self, set_id: &str) -> Option<&ConditionSet> {
        self.condition_sets.iter().find(|set| set.set_id == set_id)
    }

    /// Mutable access to the condition set for a family.
    pub fn condition_set_mut(&mut self, set_id: &str) -> Option<&mut ConditionSet> {
        self.condition_sets
            .iter_mut()
            .find(|set| set.set_id == set_id)
    }

    /// Total number of stored `(field, value)` entries across all sets.
    #[must_use]
    pub fn condition_count(&self) -> usize {
        self.condition_sets.iter().map(|set| set.fields.len()).sum()
    }
}

// ---------------------------------------------------------------------------
// Evaluation context
// ---------------------------------------------------------------------------

/// Caller-supplied request context evaluated against a switch's conditions.
///
/// `identity` feeds percentage bucketing (the same identity always lands in
/// the same bucket); `attributes` feed exact-match and flag fields. Both are
/// plain strings: the evaluator for each condition-set family decides how to
/// interpret them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvalContext {
    /// Stable identifier (user id, session id, IP) for percentage rollout.
    #[serde(default)]
    pub identity: Option<String>,
    /// Named attributes consulted by condition fields.
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl EvalContext {
    /// An empty context: no identity, no attributes. Percentage and
    /// attribute conditions never match against it (fail-closed).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Shorthand for a context carrying only an identity.
    #[must_use]
    pub fn for_identity(identity: impl Into<String>) -> Self {
        Self::new().with_identity(identity)
    }

    /// Sets the bucketing identity.
    #[must_use]
    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = Some(identity.into());
        self
    }

    /// Adds a named attribute.
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// The attribute value for `name`, if present.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// The bucketing identity, if present.
    #[must_use]
    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }
}
