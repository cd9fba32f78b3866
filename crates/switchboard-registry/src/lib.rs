//! The live switch store for switchboard.
//!
//! This crate provides:
//! - **[`SwitchRegistry`]**: thread-safe create/update/delete, status and
//!   parent management, condition editing, evaluation, and fuzzy search,
//!   with optimistic versioning on every mutation.
//!
//! Pure domain types and evaluation rules live in `switchboard-core`; this
//! crate adds the shared, concurrent store and its consistency guarantees.

pub mod registry;

pub use registry::SwitchRegistry;
