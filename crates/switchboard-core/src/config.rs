//! Configuration for the switch registry.
//!
//! [`SwitchboardConfig`] carries the operational limits: identifier length
//! caps, the parent-chain depth bound, and whether unknown keys are created
//! on first evaluation.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{SwitchError, SwitchResult};
use crate::status::DEFAULT_MAX_PARENT_DEPTH;

/// Registry limits and policy knobs.
///
/// All fields have production defaults. Override selectively via the builder
/// methods, a TOML file, or environment variables.
///
/// # Environment Variable Overrides
///
/// | Variable                        | Field               | Default |
/// |---------------------------------|---------------------|---------|
/// | `SWITCHBOARD_MAX_KEY_LEN`       | `max_key_len`       | `64`    |
/// | `SWITCHBOARD_MAX_NAME_LEN`      | `max_name_len`      | `64`    |
/// | `SWITCHBOARD_AUTOCREATE`        | `autocreate_missing`| `false` |
/// | `SWITCHBOARD_MAX_PARENT_DEPTH`  | `max_parent_depth`  | `16`    |
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwitchboardConfig {
    /// Maximum switch key length, in characters.
    /// Default: 64.
    pub max_key_len: usize,

    /// Maximum switch display-name length, in characters.
    /// Default: 64.
    pub max_name_len: usize,

    /// Create unknown keys (disabled, empty) on first evaluation instead of
    /// returning `NotFound`.
    /// Default: false.
    pub autocreate_missing: bool,

    /// Upper bound on parent-chain traversal during status resolution.
    /// Default: 16.
    pub max_parent_depth: usize,
}

impl Default for SwitchboardConfig {
    fn default() -> Self {
        Self {
            max_key_len: 64,
            max_name_len: 64,
            autocreate_missing: false,
            max_parent_depth: DEFAULT_MAX_PARENT_DEPTH,
        }
    }
}

impl SwitchboardConfig {
    /// Loads configuration from a TOML file with flat keys matching the
    /// field names. A missing or unparseable file falls back to defaults;
    /// parse failures are logged, not raised, so a bad config file cannot
    /// take feature checks down with it.
    #[must_use]
    pub fn from_file(path: &Path) -> Self {
        std::fs::read_to_string(path).map_or_else(
            |_| Self::default(),
            |contents| match toml::from_str::<Self>(&contents) {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "failed to parse switchboard config, using defaults"
                    );
                    Self::default()
                }
            },
        )
    }

    /// Load overrides from environment variables.
    ///
    /// Only overrides fields for which environment variables are set.
    /// Invalid values are silently ignored (current values are kept).
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(val) = std::env::var("SWITCHBOARD_MAX_KEY_LEN")
            && let Ok(len) = val.parse::<usize>()
            && len > 0
        {
            self.max_key_len = len;
        }
        if let Ok(val) = std::env::var("SWITCHBOARD_MAX_NAME_LEN")
            && let Ok(len) = val.parse::<usize>()
            && len > 0
        {
            self.max_name_len = len;
        }
        if let Ok(val) = std::env::var("SWITCHBOARD_AUTOCREATE") {
            self.autocreate_missing = val == "true" || val == "1";
        }
        if let Ok(val) = std::env::var("SWITCHBOARD_MAX_PARENT_DEPTH")
            && let Ok(depth) = val.parse::<usize>()
            && depth > 0
        {
            self.max_parent_depth = depth;
        }
        self
    }

    /// Sets the maximum key length.
    #[must_use]
    pub fn with_max_key_len(mut self, len: usize) -> Self {
        self.max_key_len = len;
        self
    }

    /// Sets the maximum display-name length.
    #[must_use]
    pub fn with_max_name_len(mut self, len: usize) -> Self {
        self.max_name_len = len;
        self
    }

    /// Sets whether unknown keys are created on first evaluation.
    #[must_use]
    pub fn with_autocreate_missing(mut self, autocreate: bool) -> Self {
        self.autocreate_missing = autocreate;
        self
    }

    /// Sets the parent-chain traversal bound.
    #[must_use]
    pub fn with_max_parent_depth(mut self, depth: usize) -> Self {
        self.max_parent_depth = depth;
        self
    }

    /// Checks the configuration for values that would wedge the registry.
    ///
    /// # Errors
    ///
    /// Returns [`SwitchError::InvalidConfig`] when any limit is zero.
    pub fn validate(&self) -> SwitchResult<()> {
        if self.max_key_len == 0 {
            return Err(Self::zero_limit("max_key_len"));
        }
        if self.max_name_len == 0 {
            return Err(Self::zero_limit("max_name_len"));
        }
        if self.max_parent_depth == 0 {
            return Err(Self::zero_limit("max_parent_depth"));
        }
        Ok(())
    }

    fn zero_limit(field: &str) -> SwitchError {
        SwitchError::InvalidConfig {
            field: field.to_owned(),
            value: "0".to_owned(),
            reason: "must be at least 1".to_owned(),
        }
    }

    /// Validates a switch key against the configured limits.
    ///
    /// # Errors
    ///
    /// Returns [`SwitchError::InvalidKey`] when the key is blank or longer
    /// than `max_key_len` characters.
    pub fn validate_key(&self, key: &str) -> SwitchResult<()> {
        if key.trim().is_empty() {
            return Err(SwitchError::InvalidKey {
                key: key.to_owned(),
                reason: "must not be blank".to_owned(),
            });
        }
        let len = key.chars().count();
        if len > self.max_key_len {
            return Err(SwitchError::InvalidKey {
                key: key.to_owned(),
                reason: format!("{len} characters exceeds the {} limit", self.max_key_len),
            });
        }
        Ok(())
    }

    /// Validates a switch display name against the configured limits. Empty
    /// names are allowed; over-long ones are not.
    ///
    /// # Errors
    ///
    /// Returns [`SwitchError::InvalidName`] when the name is longer than
    /// `max_name_len` characters.
    pub fn validate_name(&self, name: &str) -> SwitchResult<()> {
        let len = name.chars().count();
        if len > self.max_name_len {
            return Err(SwitchError::InvalidName {
                reason: format!("{len} characters exceeds the {} limit", self.max_name_len),
            });
        }
        Ok(())
    }
}
