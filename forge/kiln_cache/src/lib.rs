//! Kiln Cache - Scope-Bound Single-Flight Generation
//!
//! This crate ties the emitter protocol to a concurrency-safe,
//! memory-scoped cache:
//! - `UnitKey`: type-erased, structurally-comparable identity keys
//! - `Recipe`: caller-supplied generation logic
//! - `NameTable` / `resolve`: deterministic unique-name resolution
//! - `Scope` / `ScopeDirectory` / `ScopeRegistry`: weakly-associated
//!   per-scope state, swept when the scope dies
//! - `GenerationCache`: at-most-one in-flight synthesis per key per
//!   scope, with waiters sharing the producer's outcome
//!
//! The only blocking operation is a waiter sleeping until its producer
//! publishes; everything else is non-blocking reads/writes on
//! concurrent maps. Scopes are fully independent of each other.

mod error;
mod key;
mod naming;
mod recipe;
mod registry;
mod scope;
mod single_flight;

pub use error::{GenError, GenResult};
pub use key::{KeySpec, UnitKey};
pub use naming::{normalize_prefix, resolve, NameTable, ACCESSOR_MARKER, GEN_MARKER};
pub use recipe::{FnRecipe, Recipe, UnitKind};
pub use registry::{ScopeDirectory, ScopeRegistry};
pub use scope::{Scope, ScopeId, WeakScope};
pub use single_flight::{CacheConfig, GenerationCache, Retention};
