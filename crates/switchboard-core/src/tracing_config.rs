//! Tracing conventions for switchboard.
//!
//! Switchboard emits structured spans and events through `tracing` but never
//! installs a subscriber: the embedding application owns that. This module
//! pins the vocabulary (target prefix, span names, field names) so
//! subscribers, dashboards, and tests can match on stable strings.
//!
//! Filter switchboard output with:
//! ```text
//! RUST_LOG=switchboard=debug
//! ```

use tracing::Level;

/// Target prefix used by all switchboard tracing spans and events.
pub const TARGET_PREFIX: &str = "switchboard";

/// Standard tracing span names used across the registry.
///
/// These constants ensure consistent span naming so that consumers can
/// match on them in subscribers, dashboards, and tests.
pub mod span_names {
    /// Switch creation.
    pub const CREATE: &str = "switchboard::create";
    /// Metadata update, including renames.
    pub const UPDATE: &str = "switchboard::update";
    /// Switch deletion, including the child cascade.
    pub const DELETE: &str = "switchboard::delete";
    /// Status assignment.
    pub const SET_STATUS: &str = "switchboard::set_status";
    /// Parent linking and unlinking.
    pub const SET_PARENT: &str = "switchboard::set_parent";
    /// Condition-set addition or merge.
    pub const ADD_CONDITION: &str = "switchboard::add_condition";
    /// Condition entry removal, including demotion.
    pub const REMOVE_CONDITION: &str = "switchboard::remove_condition";
    /// Rollout evaluation of one switch against one context.
    pub const EVALUATE: &str = "switchboard::evaluate";
    /// Listing search.
    pub const SEARCH: &str = "switchboard::search";
}

/// Standard structured field names used in tracing events.
///
/// Using consistent field names enables structured log queries across
/// every registry operation.
pub mod field_names {
    pub const SWITCH_KEY: &str = "switch_key";
    pub const VERSION: &str = "version";
    pub const STATUS: &str = "status";
    pub const SET_ID: &str = "set_id";
    pub const FIELD: &str = "field";
    pub const CONDITION_COUNT: &str = "condition_count";
    pub const RESULT_COUNT: &str = "result_count";
    pub const QUERY_LEN: &str = "query_len";
    pub const PARENT_KEY: &str = "parent_key";
    pub const CHILD_COUNT: &str = "child_count";
}

/// Parse a log level string (case-insensitive).
///
/// Recognized values: `trace`, `debug`, `info`, `warn`, `error`.
/// Returns `None` for unrecognized strings.
#[must_use]
pub fn parse_level(s: &str) -> Option<Level> {
    match s.to_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

/// Returns the recommended `tracing::Level` for the given environment.
///
/// Checks `SWITCHBOARD_LOG_LEVEL` first, then falls back to the provided
/// default. Recognized values: `trace`, `debug`, `info`, `warn`, `error`.
#[must_use]
pub fn level_from_env(default: Level) -> Level {
    std::env::var("SWITCHBOARD_LOG_LEVEL")
        .ok()
        .and_then(|s| parse_level(&s))
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_prefix_is_switchboard() {
        assert_eq!(TARGET_PREFIX, "switchboard");
    }

    #[test]
    fn all_span_names_start_with_target_prefix() {
        let all_spans = [
            span_names::CREATE,
            span_names::UPDATE,
            span_names::DELETE,
            span_names::SET_STATUS,
            span_names::SET_PARENT,
            span_names::ADD_CONDITION,
            span_names::REMOVE_CONDITION,
            span_names::EVALUATE,
            span_names::SEARCH,
        ];
        for span in all_spans {
            assert!(
                span.starts_with(&format!("{TARGET_PREFIX}::")),
                "span {span:?} must start with \"{TARGET_PREFIX}::\"",
            );
        }
    }

    #[test]
    fn parse_level_recognizes_valid_levels() {
        assert_eq!(parse_level("trace"), Some(Level::TRACE));
        assert_eq!(parse_level("debug"), Some(Level::DEBUG));
        assert_eq!(parse_level("info"), Some(Level::INFO));
        assert_eq!(parse_level("warn"), Some(Level::WARN));
        assert_eq!(parse_level("error"), Some(Level::ERROR));
    }

    #[test]
    fn parse_level_case_insensitive() {
        assert_eq!(parse_level("TRACE"), Some(Level::TRACE));
        assert_eq!(parse_level("Debug"), Some(Level::DEBUG));
        assert_eq!(parse_level("WARN"), Some(Level::WARN));
    }

    #[test]
    fn parse_level_returns_none_for_invalid() {
        assert_eq!(parse_level("nonsense"), None);
        assert_eq!(parse_level(""), None);
        assert_eq!(parse_level(" info"), None);
        assert_eq!(parse_level("info "), None);
    }

    #[test]
    fn field_names_are_non_empty() {
        let all_fields = [
            field_names::SWITCH_KEY,
            field_names::VERSION,
            field_names::STATUS,
            field_names::SET_ID,
            field_names::FIELD,
            field_names::CONDITION_COUNT,
            field_names::RESULT_COUNT,
            field_names::QUERY_LEN,
            field_names::PARENT_KEY,
            field_names::CHILD_COUNT,
        ];
        for field in all_fields {
            assert!(!field.is_empty(), "field name must not be empty");
        }
    }

    #[test]
    fn level_from_env_uses_default_when_var_unset() {
        // Validate the fallback path with a key that is never set.
        fn level_from_custom_key(key: &str, default: Level) -> Level {
            std::env::var(key)
                .ok()
                .and_then(|s| parse_level(&s))
                .unwrap_or(default)
        }
        let level = level_from_custom_key("SWITCHBOARD_NEVER_SET_12345", Level::WARN);
        assert_eq!(level, Level::WARN);
    }
}
