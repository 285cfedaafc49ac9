//! Per-scope registries and the scope directory.
//!
//! One registry exists per live scope, holding the scope's reserved
//! names, its key-to-assigned-name memo, and its generation cache. The
//! directory memoizes scope → registry with a weak association: it
//! never extends a scope's lifetime, and registries of dead scopes are
//! swept on the write path (and by an explicit `sweep()`).

use crate::error::{GenError, GenResult};
use crate::key::UnitKey;
use crate::naming::NameTable;
use crate::recipe::Recipe;
use crate::scope::{Scope, ScopeId, WeakScope};
use crate::single_flight::{CacheConfig, GenerationCache};
use kiln_emit::UnitWriter;
use kiln_unit::Unit;
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use std::sync::{Arc, OnceLock};

/// Everything the core holds for one live scope.
pub struct ScopeRegistry {
    scope: WeakScope,
    label: String,
    names: NameTable,
    /// Key → assigned name. Survives artifact eviction so that a
    /// regenerated unit carries the name callers already bound to.
    assigned: Mutex<FxHashMap<UnitKey, String>>,
    units: GenerationCache,
}

impl ScopeRegistry {
    fn new(scope: &Scope, config: CacheConfig) -> Self {
        Self {
            scope: scope.downgrade(),
            label: scope.label().to_string(),
            names: NameTable::new(),
            assigned: Mutex::new(FxHashMap::default()),
            units: GenerationCache::new(config),
        }
    }

    /// Whether this registry's scope is still alive.
    pub fn is_alive(&self) -> bool {
        self.scope.is_alive()
    }

    /// The reserved-name table for this scope.
    pub fn names(&self) -> &NameTable {
        &self.names
    }

    /// The generation cache for this scope.
    pub fn units(&self) -> &GenerationCache {
        &self.units
    }

    /// The name assigned to `key`, resolving and reserving one on first
    /// use. Memoized for the registry's lifetime: eviction of the
    /// artifact never reassigns the name.
    fn assigned_name(&self, key: &UnitKey, recipe: &dyn Recipe) -> String {
        let mut assigned = self.assigned.lock();
        if let Some(name) = assigned.get(key) {
            return name.clone();
        }
        let name = self.names.reserve(recipe.prefix(), recipe.kind());
        assigned.insert(key.clone(), name.clone());
        name
    }

    /// Generate (or fetch) the unit identified by `key` in this scope.
    pub fn generate(&self, key: &UnitKey, recipe: &dyn Recipe) -> GenResult<Arc<Unit>> {
        self.units.get_or_generate(key, || {
            let name = self.assigned_name(key, recipe);
            tracing::debug!(scope = %self.label, unit = %name, "synthesizing unit");
            let mut writer = UnitWriter::new();
            recipe.emit(&name, &mut writer).map_err(GenError::Production)?;
            let unit = writer.finish().map_err(GenError::Production)?;
            Ok(Arc::new(unit))
        })
    }
}

struct DirEntry {
    scope: WeakScope,
    registry: Arc<ScopeRegistry>,
}

/// The scope → registry map.
///
/// A process normally uses one directory ([`ScopeDirectory::global`]),
/// created on first use and torn down only at process exit; tests
/// construct their own instances instead of touching the global.
pub struct ScopeDirectory {
    entries: RwLock<FxHashMap<ScopeId, DirEntry>>,
    config: CacheConfig,
}

impl ScopeDirectory {
    pub fn new() -> Self {
        Self::with_config(CacheConfig::new())
    }

    /// A directory whose registries use the given cache configuration.
    pub fn with_config(config: CacheConfig) -> Self {
        Self {
            entries: RwLock::new(FxHashMap::default()),
            config,
        }
    }

    /// The process-wide directory.
    pub fn global() -> &'static ScopeDirectory {
        static GLOBAL: OnceLock<ScopeDirectory> = OnceLock::new();
        GLOBAL.get_or_init(ScopeDirectory::new)
    }

    /// The registry for `scope`, created lazily on first use.
    ///
    /// Double-checked: an optimistic read-locked probe, then a
    /// write-locked re-check and insert, so concurrent first use of one
    /// scope yields a single registry. A hit is trusted only after
    /// re-verifying pointer identity: an entry whose recorded address
    /// was reused by a newer scope allocation is stale and replaced.
    pub fn registry_for(&self, scope: &Scope) -> Arc<ScopeRegistry> {
        {
            let entries = self.entries.read();
            if let Some(entry) = entries.get(&scope.id()) {
                if entry
                    .scope
                    .upgrade()
                    .is_some_and(|live| live.ptr_eq(scope))
                {
                    return Arc::clone(&entry.registry);
                }
            }
        }

        let mut entries = self.entries.write();
        if let Some(entry) = entries.get(&scope.id()) {
            if entry
                .scope
                .upgrade()
                .is_some_and(|live| live.ptr_eq(scope))
            {
                return Arc::clone(&entry.registry);
            }
        }
        Self::sweep_locked(&mut entries);
        tracing::debug!(scope = %scope.label(), "creating scope registry");
        let registry = Arc::new(ScopeRegistry::new(scope, self.config.clone()));
        entries.insert(
            scope.id(),
            DirEntry {
                scope: scope.downgrade(),
                registry: Arc::clone(&registry),
            },
        );
        registry
    }

    /// Generate (or fetch) the unit identified by `key` under `scope`.
    ///
    /// Errors propagate the recipe's original failure, never a generic
    /// cache error.
    pub fn generate(
        &self,
        scope: &Scope,
        key: &UnitKey,
        recipe: &dyn Recipe,
    ) -> GenResult<Arc<Unit>> {
        self.registry_for(scope).generate(key, recipe)
    }

    fn sweep_locked(entries: &mut FxHashMap<ScopeId, DirEntry>) {
        entries.retain(|_, entry| entry.scope.is_alive());
    }

    /// Drop registries whose scope has died. Returns how many were
    /// reclaimed.
    pub fn sweep(&self) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        Self::sweep_locked(&mut entries);
        let swept = before - entries.len();
        if swept > 0 {
            tracing::debug!(swept, "swept dead scope registries");
        }
        swept
    }

    /// Number of tracked scopes, counting not-yet-swept dead ones.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ScopeDirectory {
    fn default() -> Self {
        Self::new()
    }
}
