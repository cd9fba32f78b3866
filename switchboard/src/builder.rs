//! Convenience API for assembling a ready-to-use switch registry.
//!
//! [`SwitchboardBuilder`] wires limits, the stock condition-set families,
//! and any custom evaluators into a [`SwitchRegistry`] behind a fluent API.
//!
//! # Example
//!
//! ```rust
//! use switchboard::SwitchboardBuilder;
//!
//! let registry = SwitchboardBuilder::new()
//!     .build()
//!     .expect("default config is valid");
//! assert!(registry.evaluator_ids().contains(&"percentage".to_owned()));
//! ```

use std::path::Path;

use tracing::{info, instrument};

use switchboard_core::{
    EvaluatorRegistry, SharedEvaluator, SwitchResult, SwitchboardConfig, builtin_registry,
};
use switchboard_registry::SwitchRegistry;

/// Fluent builder for a configured [`SwitchRegistry`].
///
/// By default the built registry carries the stock condition-set families
/// (`user`, `ip`, `host`, `percentage`, `boolean`) and default limits.
pub struct SwitchboardBuilder {
    config: SwitchboardConfig,
    include_builtins: bool,
    evaluators: Vec<SharedEvaluator>,
}

impl SwitchboardBuilder {
    /// Starts from default limits with the stock families enabled.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: SwitchboardConfig::default(),
            include_builtins: true,
            evaluators: Vec::new(),
        }
    }

    /// Overrides the limits and behavior knobs.
    #[must_use]
    pub fn with_config(mut self, config: SwitchboardConfig) -> Self {
        self.config = config;
        self
    }

    /// Loads limits from a TOML file, keeping defaults for anything the
    /// file omits (or for the whole config if the file is absent or
    /// malformed). Environment overrides are not applied here; chain
    /// [`SwitchboardConfig::with_env_overrides`] through
    /// [`SwitchboardBuilder::with_config`] for that.
    #[must_use]
    pub fn with_config_file(self, path: impl AsRef<Path>) -> Self {
        self.with_config(SwitchboardConfig::from_file(path.as_ref()))
    }

    /// Starts the registry with no condition-set families at all. Every
    /// family must then come in through
    /// [`SwitchboardBuilder::with_evaluator`] or be registered at runtime.
    #[must_use]
    pub fn without_builtins(mut self) -> Self {
        self.include_builtins = false;
        self
    }

    /// Adds a condition-set family. Registered after the stock families,
    /// so a custom evaluator with a stock `set_id` replaces the builtin.
    #[must_use]
    pub fn with_evaluator(mut self, evaluator: SharedEvaluator) -> Self {
        self.evaluators.push(evaluator);
        self
    }

    /// Validates the config and assembles the registry.
    ///
    /// # Errors
    ///
    /// Returns [`switchboard_core::SwitchError::InvalidConfig`] if a limit
    /// is out of range (for example a zero key-length cap).
    #[instrument(skip_all, fields(custom_evaluators = self.evaluators.len()))]
    pub fn build(self) -> SwitchResult<SwitchRegistry> {
        self.config.validate()?;

        let mut evaluators = if self.include_builtins {
            builtin_registry()
        } else {
            EvaluatorRegistry::new()
        };
        for evaluator in self.evaluators {
            evaluators.register(evaluator);
        }

        info!(
            target: "switchboard.builder",
            family_count = evaluators.len(),
            autocreate = self.config.autocreate_missing,
            "switchboard assembled"
        );
        Ok(SwitchRegistry::new(self.config, evaluators))
    }
}

impl Default for SwitchboardBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SwitchboardBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SwitchboardBuilder")
            .field("config", &self.config)
            .field("include_builtins", &self.include_builtins)
            .field("custom_evaluator_count", &self.evaluators.len())
            .finish_non_exhaustive()
    }
}
