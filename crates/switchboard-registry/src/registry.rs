//! The authoritative switch store.
//!
//! [`SwitchRegistry`] owns every switch and is the only writer: callers get
//! snapshot clones back from each operation, never live aliases, so external
//! code cannot mutate registry state behind its back. All consistency rules
//! live here: optimistic versioning, the demotion rule, write-time condition
//! validation, cycle-free parent linking, and the delete cascade.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, RwLock};

use switchboard_core::{
    ConditionSet, EvalContext, EvaluatorRegistry, SharedEvaluator, Switch, SwitchError,
    SwitchLookup, SwitchResult, SwitchStatus, SwitchboardConfig, builtin_registry, evaluate_switch,
    rank_switches,
};
use tracing::{debug, info, instrument};

/// Map from switch key to its slot. The slot mutex serializes mutations to
/// one switch; the outer lock protects the key space.
type SwitchMap = HashMap<String, Arc<Mutex<Switch>>>;

/// Snapshot access over a locked switch map, as inheritance resolution
/// needs it. Locks one slot at a time, never two.
struct MapLookup<'a> {
    map: &'a SwitchMap,
}

impl SwitchLookup for MapLookup<'_> {
    fn snapshot(&self, key: &str) -> Option<Switch> {
        self.map
            .get(key)
            .map(|slot| slot.lock().expect("switch slot lock poisoned").clone())
    }
}

/// Thread-safe, in-memory registry of switches.
///
/// # Concurrency
///
/// Switches live behind a reader-writer map of per-switch mutexes. Per-key
/// mutations (status, conditions, metadata without rename) share the map
/// read lock and serialize on the target's slot mutex, so writes to
/// different keys proceed in parallel. Structural operations (create,
/// rename, delete, parent linking) take the map write lock and run
/// exclusively. Slot mutexes are only acquired while the map lock is held,
/// and outside the write lock never two at once, which rules out lock-order
/// inversions.
///
/// Every operation is all-or-nothing: validation happens before the first
/// field is touched, and `version` moves by exactly 1 per successful
/// mutating call (affected children count as their own mutations).
///
/// Operations panic only if an internal lock is poisoned, i.e. a previous
/// registry call panicked mid-operation.
pub struct SwitchRegistry {
    config: SwitchboardConfig,
    evaluators: RwLock<EvaluatorRegistry>,
    switches: RwLock<SwitchMap>,
}

impl SwitchRegistry {
    /// Creates an empty registry with the given limits and condition-set
    /// families. Call [`SwitchboardConfig::validate`] first if the config
    /// comes from an untrusted source.
    #[must_use]
    pub fn new(config: SwitchboardConfig, evaluators: EvaluatorRegistry) -> Self {
        Self {
            config,
            evaluators: RwLock::new(evaluators),
            switches: RwLock::new(SwitchMap::new()),
        }
    }

    /// The limits this registry enforces.
    #[must_use]
    pub fn config(&self) -> &SwitchboardConfig {
        &self.config
    }

    // ─── Lifecycle ──────────────────────────────────────────────────────

    /// Creates a switch in its initial state: `Disabled`, no conditions,
    /// version 1.
    ///
    /// # Errors
    ///
    /// [`SwitchError::InvalidKey`] / [`SwitchError::InvalidName`] for inputs
    /// over the configured limits, [`SwitchError::DuplicateKey`] if the key
    /// is taken.
    #[instrument(name = "switchboard::create", skip_all, fields(switch_key = %key))]
    pub fn create(&self, key: &str, name: &str, description: &str) -> SwitchResult<Switch> {
        self.config.validate_key(key)?;
        self.config.validate_name(name)?;

        let mut map = self.switches.write().expect("switch map lock poisoned");
        if map.contains_key(key) {
            return Err(SwitchError::DuplicateKey {
                key: key.to_owned(),
            });
        }
        let switch = Switch::new(key, name, description);
        map.insert(key.to_owned(), Arc::new(Mutex::new(switch.clone())));

        info!(target: "switchboard.audit", switch_key = %key, "switch created");
        Ok(switch)
    }

    /// Updates metadata under optimistic concurrency, renaming when
    /// `new_key` differs from `old_key`. A rename atomically re-indexes
    /// every switch whose parent pointed at `old_key` (each re-indexed
    /// child gets its own version bump).
    ///
    /// # Errors
    ///
    /// [`SwitchError::NotFound`] if `old_key` is absent,
    /// [`SwitchError::DuplicateKey`] if renaming onto an existing key,
    /// [`SwitchError::VersionConflict`] if `expected_version` is stale, and
    /// the validation errors from [`SwitchRegistry::create`].
    #[instrument(name = "switchboard::update", skip_all, fields(switch_key = %old_key))]
    pub fn update(
        &self,
        old_key: &str,
        new_key: &str,
        name: &str,
        description: &str,
        expected_version: u64,
    ) -> SwitchResult<Switch> {
        self.config.validate_key(old_key)?;
        self.config.validate_key(new_key)?;
        self.config.validate_name(name)?;

        if old_key == new_key {
            let updated = self.with_switch(old_key, |switch| {
                Self::check_version(switch, expected_version)?;
                switch.name = name.to_owned();
                switch.description = description.to_owned();
                switch.version += 1;
                Ok(switch.clone())
            })?;
            info!(
                target: "switchboard.audit",
                switch_key = %old_key,
                version = updated.version,
                "switch updated"
            );
            return Ok(updated);
        }

        // Rename changes the key space, so the whole map is locked.
        let mut map = self.switches.write().expect("switch map lock poisoned");
        let slot = map
            .get(old_key)
            .cloned()
            .ok_or_else(|| SwitchError::NotFound {
                key: old_key.to_owned(),
            })?;
        if map.contains_key(new_key) {
            return Err(SwitchError::DuplicateKey {
                key: new_key.to_owned(),
            });
        }

        let updated = {
            let mut switch = slot.lock().expect("switch slot lock poisoned");
            Self::check_version(&switch, expected_version)?;
            switch.key = new_key.to_owned();
            switch.name = name.to_owned();
            switch.description = description.to_owned();
            switch.version += 1;
            switch.clone()
        };
        map.remove(old_key);
        map.insert(new_key.to_owned(), slot);

        let mut child_count = 0usize;
        for (child_key, child_slot) in map.iter() {
            if child_key == new_key {
                continue;
            }
            let mut child = child_slot.lock().expect("switch slot lock poisoned");
            if child.parent_key.as_deref() == Some(old_key) {
                child.parent_key = Some(new_key.to_owned());
                child.version += 1;
                child_count += 1;
            }
        }

        info!(
            target: "switchboard.audit",
            switch_key = %old_key,
            renamed_to = %new_key,
            child_count,
            version = updated.version,
            "switch updated"
        );
        Ok(updated)
    }

    /// Deletes a switch. Any switch that inherited from it is rewritten to
    /// `Disabled` with no parent, as part of the same atomic operation, so
    /// no dangling reference can keep a feature on.
    ///
    /// # Errors
    ///
    /// [`SwitchError::NotFound`] if the key is absent.
    #[instrument(name = "switchboard::delete", skip_all, fields(switch_key = %key))]
    pub fn delete(&self, key: &str) -> SwitchResult<()> {
        let mut map = self.switches.write().expect("switch map lock poisoned");
        if map.remove(key).is_none() {
            return Err(SwitchError::NotFound {
                key: key.to_owned(),
            });
        }

        let mut child_count = 0usize;
        for slot in map.values() {
            let mut child = slot.lock().expect("switch slot lock poisoned");
            if child.parent_key.as_deref() == Some(key) {
                child.parent_key = None;
                child.status = SwitchStatus::Disabled;
                child.version += 1;
                child_count += 1;
            }
        }

        info!(
            target: "switchboard.audit",
            switch_key = %key,
            child_count,
            "switch deleted"
        );
        Ok(())
    }

    // ─── Status and hierarchy ───────────────────────────────────────────

    /// Assigns a status.
    ///
    /// Setting `ActiveForConditions` with zero condition sets is allowed
    /// (operators may arm the status before adding rules); such a switch
    /// evaluates to off until a condition matches.
    ///
    /// # Errors
    ///
    /// [`SwitchError::NotFound`] if the key is absent.
    #[instrument(name = "switchboard::set_status", skip_all, fields(switch_key = %key, status = %status))]
    pub fn set_status(&self, key: &str, status: SwitchStatus) -> SwitchResult<Switch> {
        let updated = self.with_switch(key, |switch| {
            switch.status = status;
            switch.version += 1;
            Ok(switch.clone())
        })?;
        info!(
            target: "switchboard.audit",
            switch_key = %key,
            status = %status,
            version = updated.version,
            "status changed"
        );
        Ok(updated)
    }

    /// Assigns a status from its legacy wire code (`1..=4`).
    ///
    /// # Errors
    ///
    /// [`SwitchError::InvalidStatus`] for codes outside `1..=4`, otherwise
    /// as [`SwitchRegistry::set_status`].
    pub fn set_status_code(&self, key: &str, code: u8) -> SwitchResult<Switch> {
        let status = SwitchStatus::from_code(code)?;
        self.set_status(key, status)
    }

    /// Links (or with `None`, unlinks) a parent for inheritance.
    ///
    /// The link itself does not change the switch's status; set
    /// [`SwitchStatus::InheritFromParent`] separately to defer to the
    /// parent.
    ///
    /// # Errors
    ///
    /// [`SwitchError::NotFound`] if either key is absent, and
    /// [`SwitchError::InheritanceCycle`] if the link would make the switch
    /// its own ancestor or the chain would exceed the configured depth.
    #[instrument(name = "switchboard::set_parent", skip_all, fields(switch_key = %key))]
    pub fn set_parent(&self, key: &str, parent_key: Option<&str>) -> SwitchResult<Switch> {
        // Hierarchy changes are structural: lock the whole map so the
        // cycle check and the link are one atomic step.
        let map = self.switches.write().expect("switch map lock poisoned");
        let slot = map.get(key).cloned().ok_or_else(|| SwitchError::NotFound {
            key: key.to_owned(),
        })?;

        if let Some(parent) = parent_key {
            if !map.contains_key(parent) {
                return Err(SwitchError::NotFound {
                    key: parent.to_owned(),
                });
            }
            // Walking up from the proposed parent must never reach `key`.
            let mut cursor = Some(parent.to_owned());
            let mut depth = 0usize;
            while let Some(current) = cursor {
                if current == key {
                    return Err(SwitchError::InheritanceCycle {
                        key: key.to_owned(),
                    });
                }
                depth += 1;
                if depth > self.config.max_parent_depth {
                    return Err(SwitchError::InheritanceCycle { key: current });
                }
                cursor = map.get(&current).and_then(|ancestor| {
                    ancestor
                        .lock()
                        .expect("switch slot lock poisoned")
                        .parent_key
                        .clone()
                });
            }
        }

        let updated = {
            let mut switch = slot.lock().expect("switch slot lock poisoned");
            switch.parent_key = parent_key.map(str::to_owned);
            switch.version += 1;
            switch.clone()
        };

        match parent_key {
            Some(parent) => info!(
                target: "switchboard.audit",
                switch_key = %key,
                parent_key = %parent,
                version = updated.version,
                "parent linked"
            ),
            None => info!(
                target: "switchboard.audit",
                switch_key = %key,
                version = updated.version,
                "parent unlinked"
            ),
        }
        Ok(updated)
    }

    // ─── Conditions ─────────────────────────────────────────────────────

    /// Adds rollout conditions, merging into the existing set for `set_id`
    /// if one is attached (field values for the same name are overwritten,
    /// never duplicated).
    ///
    /// # Errors
    ///
    /// [`SwitchError::NotFound`] if the key is absent,
    /// [`SwitchError::UnknownConditionType`] if no evaluator is registered
    /// for `set_id`, and [`SwitchError::InvalidField`] if the evaluator
    /// rejects a field name or value. Validation runs before any change, so
    /// a failed call leaves the switch untouched.
    #[instrument(name = "switchboard::add_condition", skip_all, fields(switch_key = %key, set_id = %set_id))]
    pub fn add_condition(
        &self,
        key: &str,
        set_id: &str,
        fields: BTreeMap<String, String>,
    ) -> SwitchResult<Switch> {
        {
            let evaluators = self.evaluators.read().expect("evaluator registry lock poisoned");
            evaluators.validate_fields(set_id, &fields)?;
        }

        let updated = self.with_switch(key, |switch| {
            if let Some(set) = switch.condition_set_mut(set_id) {
                for (field, value) in fields {
                    set.fields.insert(field, value);
                }
            } else if !fields.is_empty() {
                switch.condition_sets.push(ConditionSet {
                    set_id: set_id.to_owned(),
                    fields,
                });
            }
            switch.version += 1;
            Ok(switch.clone())
        })?;

        info!(
            target: "switchboard.audit",
            switch_key = %key,
            set_id = %set_id,
            condition_count = updated.condition_count(),
            version = updated.version,
            "condition added"
        );
        Ok(updated)
    }

    /// Removes one stored `(field, value)` entry from the named set. A set
    /// left empty is dropped entirely, and if that leaves the switch with
    /// no sets while its status is `ActiveForConditions`, the status is
    /// rewritten to `ActiveForEveryone` within the same mutation (one
    /// version bump covers both changes).
    ///
    /// # Errors
    ///
    /// [`SwitchError::NotFound`] if the key is absent, and
    /// [`SwitchError::ConditionNotFound`] if no exactly matching entry
    /// exists. The miss is an error, not a no-op, so client/server state
    /// drift cannot pass silently.
    #[instrument(
        name = "switchboard::remove_condition",
        skip_all,
        fields(switch_key = %key, set_id = %set_id, field = %field)
    )]
    pub fn remove_condition(
        &self,
        key: &str,
        set_id: &str,
        field: &str,
        value: &str,
    ) -> SwitchResult<Switch> {
        let (updated, demoted) = self.with_switch(key, |switch| {
            let position = switch
                .condition_sets
                .iter()
                .position(|set| set.set_id == set_id)
                .ok_or_else(|| Self::condition_not_found(set_id, field, value))?;

            let set = &mut switch.condition_sets[position];
            match set.fields.get(field) {
                Some(stored) if stored == value => {
                    set.fields.remove(field);
                }
                _ => return Err(Self::condition_not_found(set_id, field, value)),
            }
            if set.is_empty() {
                switch.condition_sets.remove(position);
            }

            let mut demoted = false;
            if switch.condition_sets.is_empty()
                && switch.status == SwitchStatus::ActiveForConditions
            {
                switch.status = SwitchStatus::ActiveForEveryone;
                demoted = true;
            }
            switch.version += 1;
            Ok((switch.clone(), demoted))
        })?;

        info!(
            target: "switchboard.audit",
            switch_key = %key,
            set_id = %set_id,
            field = %field,
            condition_count = updated.condition_count(),
            version = updated.version,
            demoted,
            "condition removed"
        );
        Ok(updated)
    }

    // ─── Reads and evaluation ───────────────────────────────────────────

    /// Snapshot of one switch.
    ///
    /// # Errors
    ///
    /// [`SwitchError::NotFound`] if the key is absent.
    pub fn get(&self, key: &str) -> SwitchResult<Switch> {
        let map = self.switches.read().expect("switch map lock poisoned");
        let slot = map.get(key).ok_or_else(|| SwitchError::NotFound {
            key: key.to_owned(),
        })?;
        Ok(slot.lock().expect("switch slot lock poisoned").clone())
    }

    /// Snapshots of every switch, in key order.
    #[must_use]
    pub fn list(&self) -> Vec<Switch> {
        let map = self.switches.read().expect("switch map lock poisoned");
        let mut all: Vec<Switch> = map
            .values()
            .map(|slot| slot.lock().expect("switch slot lock poisoned").clone())
            .collect();
        all.sort_by(|a, b| a.key.cmp(&b.key));
        all
    }

    /// Whether a switch exists under `key`.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.switches
            .read()
            .expect("switch map lock poisoned")
            .contains_key(key)
    }

    /// Number of switches.
    #[must_use]
    pub fn len(&self) -> usize {
        self.switches.read().expect("switch map lock poisoned").len()
    }

    /// Whether the registry holds no switches.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.switches
            .read()
            .expect("switch map lock poisoned")
            .is_empty()
    }

    /// Evaluates a switch against a request context: effective status after
    /// inheritance, then the switch's own condition sets.
    ///
    /// When the config enables `autocreate_missing`, an unknown key is
    /// created (`Disabled`, empty metadata, version 1) and the call returns
    /// `false` instead of erroring; the switch then shows up in listings for
    /// operators to configure.
    ///
    /// # Errors
    ///
    /// [`SwitchError::NotFound`] for unknown keys when autocreate is off,
    /// [`SwitchError::InheritanceCycle`] if stored state contains a parent
    /// loop.
    #[instrument(name = "switchboard::evaluate", skip_all, fields(switch_key = %key))]
    pub fn evaluate(&self, key: &str, context: &EvalContext) -> SwitchResult<bool> {
        loop {
            {
                let evaluators = self
                    .evaluators
                    .read()
                    .expect("evaluator registry lock poisoned");
                let map = self.switches.read().expect("switch map lock poisoned");
                if let Some(slot) = map.get(key) {
                    let switch = slot.lock().expect("switch slot lock poisoned").clone();
                    let lookup = MapLookup { map: &map };
                    let active = evaluate_switch(
                        &switch,
                        &lookup,
                        &evaluators,
                        context,
                        self.config.max_parent_depth,
                    )?;
                    debug!(
                        target: "switchboard.registry",
                        switch_key = %key,
                        active,
                        "switch evaluated"
                    );
                    return Ok(active);
                }
            }

            if !self.config.autocreate_missing {
                return Err(SwitchError::NotFound {
                    key: key.to_owned(),
                });
            }

            let mut map = self.switches.write().expect("switch map lock poisoned");
            if map.contains_key(key) {
                // Lost the race to another creator; evaluate what they made.
                continue;
            }
            self.config.validate_key(key)?;
            map.insert(key.to_owned(), Arc::new(Mutex::new(Switch::new(key, "", ""))));
            info!(target: "switchboard.audit", switch_key = %key, "switch autocreated");
            return Ok(false);
        }
    }

    /// Filters and ranks switches for a listing query: fuzzy-scored across
    /// key, name, and description, best matches first. An empty query
    /// returns everything in key order.
    #[instrument(name = "switchboard::search", skip_all, fields(query_len = query.len()))]
    #[must_use]
    pub fn search(&self, query: &str) -> Vec<Switch> {
        let results = rank_switches(self.list(), query);
        debug!(
            target: "switchboard.registry",
            result_count = results.len(),
            "listing searched"
        );
        results
    }

    // ─── Evaluator management ───────────────────────────────────────────

    /// Registers a condition-set family at runtime, returning any evaluator
    /// it displaced. Stored conditions for the family become live
    /// immediately.
    pub fn register_evaluator(&self, evaluator: SharedEvaluator) -> Option<SharedEvaluator> {
        let set_id = evaluator.set_id().to_owned();
        let displaced = self
            .evaluators
            .write()
            .expect("evaluator registry lock poisoned")
            .register(evaluator);
        info!(target: "switchboard.audit", set_id = %set_id, "evaluator registered");
        displaced
    }

    /// Unregisters a condition-set family. Switches keep their stored
    /// conditions, but sets for the family stop matching until the family
    /// is registered again.
    pub fn unregister_evaluator(&self, set_id: &str) -> Option<SharedEvaluator> {
        let removed = self
            .evaluators
            .write()
            .expect("evaluator registry lock poisoned")
            .unregister(set_id);
        if removed.is_some() {
            info!(target: "switchboard.audit", set_id = %set_id, "evaluator unregistered");
        }
        removed
    }

    /// Ids of the registered condition-set families, sorted.
    #[must_use]
    pub fn evaluator_ids(&self) -> Vec<String> {
        self.evaluators
            .read()
            .expect("evaluator registry lock poisoned")
            .set_ids()
            .into_iter()
            .map(str::to_owned)
            .collect()
    }

    // ─── Internals ──────────────────────────────────────────────────────

    /// Runs a closure against one switch under its slot mutex, with the map
    /// read lock held throughout so structural operations cannot interleave.
    fn with_switch<T>(
        &self,
        key: &str,
        f: impl FnOnce(&mut Switch) -> SwitchResult<T>,
    ) -> SwitchResult<T> {
        let map = self.switches.read().expect("switch map lock poisoned");
        let slot = map.get(key).cloned().ok_or_else(|| SwitchError::NotFound {
            key: key.to_owned(),
        })?;
        let mut switch = slot.lock().expect("switch slot lock poisoned");
        f(&mut switch)
    }

    fn check_version(switch: &Switch, expected: u64) -> SwitchResult<()> {
        if switch.version != expected {
            return Err(SwitchError::VersionConflict {
                key: switch.key.clone(),
                expected,
                current: switch.version,
            });
        }
        Ok(())
    }

    fn condition_not_found(set_id: &str, field: &str, value: &str) -> SwitchError {
        SwitchError::ConditionNotFound {
            set_id: set_id.to_owned(),
            field: field.to_owned(),
            value: value.to_owned(),
        }
    }
}

impl Default for SwitchRegistry {
    /// An empty registry with default limits and the stock condition-set
    /// families.
    fn default() -> Self {
        Self::new(SwitchboardConfig::default(), builtin_registry())
    }
}

impl fmt::Debug for SwitchRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SwitchRegistry")
            .field("config", &self.config)
            .field("switch_count", &self.len())
            .field("evaluators", &self.evaluator_ids())
            .finish_non_exhaustive()
    }
}
