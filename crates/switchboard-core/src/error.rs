/// Unified error type covering all failure modes across the switchboard toggle core.
///
/// Every variant includes an actionable error message guiding the consumer toward
/// resolution. All mutations are all-or-nothing: any error here means the registry
/// state (and the switch's `version`) is exactly what it was before the call.
/// Evaluation never returns condition-level errors: unknown condition types and
/// malformed stored values are fail-closed non-matches so rollout checks stay total.
#[derive(Debug, thiserror::Error)]
pub enum SwitchError {
    // === Lookup errors ===
    /// No switch is registered under the given key.
    #[error("Switch \"{key}\" cannot be found. Create it first, or list() to inspect known keys.")]
    NotFound {
        /// The key that was requested.
        key: String,
    },

    /// A create or rename collided with an existing key.
    #[error("Switch with key \"{key}\" already exists. Choose another key or update the existing switch.")]
    DuplicateKey {
        /// The conflicting key.
        key: String,
    },

    // === Concurrency errors ===
    /// An optimistic write supplied a stale version.
    #[error(
        "Stale write to \"{key}\": expected version {expected}, current is {current}. Re-read the switch and retry."
    )]
    VersionConflict {
        /// The switch that was being written.
        key: String,
        /// The version the caller expected.
        expected: u64,
        /// The version actually stored.
        current: u64,
    },

    // === Status errors ===
    /// A wire status code outside `1..=4` was supplied.
    #[error(
        "Invalid status code {code}: expected 1 (disabled), 2 (active for conditions), 3 (active for everyone), or 4 (inherit)."
    )]
    InvalidStatus {
        /// The rejected code.
        code: u8,
    },

    // === Condition errors ===
    /// A field name or value was rejected by the evaluator for its condition set.
    #[error("Invalid condition field \"{field}\" for set \"{set_id}\": {reason}")]
    InvalidField {
        /// The condition-set family.
        set_id: String,
        /// The rejected field name.
        field: String,
        /// Why it was rejected.
        reason: String,
    },

    /// No evaluator is registered for the requested condition-set family.
    #[error(
        "No condition evaluator registered for set \"{set_id}\". Register one before adding conditions of this type."
    )]
    UnknownConditionType {
        /// The unrecognized family id.
        set_id: String,
    },

    /// A removal named a condition entry that is not present.
    #[error(
        "Condition {field}=\"{value}\" is not present in set \"{set_id}\". Client state may have drifted; re-read the switch."
    )]
    ConditionNotFound {
        /// The condition-set family.
        set_id: String,
        /// The field that was named.
        field: String,
        /// The value that was named.
        value: String,
    },

    // === Hierarchy errors ===
    /// Following (or creating) a parent chain revisits a switch or runs past
    /// the configured depth bound.
    #[error(
        "Inheritance cycle involving \"{key}\": the parent chain revisits this switch or never terminates. Break the loop before linking."
    )]
    InheritanceCycle {
        /// The switch at which the cycle was detected.
        key: String,
    },

    // === Validation errors ===
    /// A switch key failed validation (empty, over-long).
    #[error("Invalid switch key \"{key}\": {reason}")]
    InvalidKey {
        /// The rejected key.
        key: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A switch name failed validation.
    #[error("Invalid switch name: {reason}")]
    InvalidName {
        /// Why it was rejected.
        reason: String,
    },

    // === Configuration errors ===
    /// A configuration value is invalid.
    #[error("Invalid config value for {field} (\"{value}\"): {reason}")]
    InvalidConfig {
        /// Which config field.
        field: String,
        /// The invalid value.
        value: String,
        /// Why it is invalid.
        reason: String,
    },
}

/// Convenience alias used throughout the switchboard crate hierarchy.
pub type SwitchResult<T> = Result<T, SwitchError>;
