//! Single-flight generation cache.
//!
//! A concurrent map from identity key to generated artifact with an
//! at-most-once guarantee: of N concurrent callers for one key, exactly
//! one becomes the producer and runs the recipe; the rest block on a
//! shared in-progress placeholder until the producer publishes. A
//! producer failure broadcasts to every current waiter and clears the
//! entry; failures are never cached.
//!
//! The double-checked read-then-write locking below mirrors the rest of
//! the workspace: optimistic read-locked fast path, write-locked
//! insert-if-absent slow path.

use crate::error::GenResult;
use crate::key::UnitKey;
use kiln_unit::Unit;
use parking_lot::{Condvar, Mutex, RwLock};
use rustc_hash::FxHashMap;
use std::sync::{Arc, Weak};

/// How the cache holds a materialized artifact.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub enum Retention {
    /// The cache owns the artifact for the scope's lifetime.
    #[default]
    Strong,
    /// The cache holds the artifact weakly; it dies with its last
    /// external user and is transparently regenerated on next request.
    Weak,
}

/// Configuration for a generation cache.
#[derive(Clone, Debug, Default)]
pub struct CacheConfig {
    retention: Retention,
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the artifact retention mode.
    #[must_use]
    pub fn with_retention(mut self, retention: Retention) -> Self {
        self.retention = retention;
        self
    }

    pub fn retention(&self) -> Retention {
        self.retention
    }
}

/// A materialized artifact, held per the configured retention.
enum Stored {
    Strong(Arc<Unit>),
    Weak(Weak<Unit>),
}

impl Stored {
    fn get(&self) -> Option<Arc<Unit>> {
        match self {
            Stored::Strong(unit) => Some(Arc::clone(unit)),
            Stored::Weak(unit) => unit.upgrade(),
        }
    }
}

/// Shared in-progress placeholder: a once-published result plus the
/// condvar waiters sleep on.
struct Flight {
    result: Mutex<Option<GenResult<Arc<Unit>>>>,
    done: Condvar,
}

impl Flight {
    fn new() -> Self {
        Self {
            result: Mutex::new(None),
            done: Condvar::new(),
        }
    }

    /// Publish the producer's outcome and wake every waiter.
    fn publish(&self, result: GenResult<Arc<Unit>>) {
        let mut slot = self.result.lock();
        *slot = Some(result);
        self.done.notify_all();
    }

    /// Block until the producer publishes, then return its outcome.
    fn wait(&self) -> GenResult<Arc<Unit>> {
        let mut slot = self.result.lock();
        loop {
            if let Some(result) = slot.as_ref() {
                return result.clone();
            }
            self.done.wait(&mut slot);
        }
    }
}

/// One cache slot: in-progress placeholder or materialized artifact.
enum Slot {
    InFlight(Arc<Flight>),
    Ready(Stored),
}

/// Role a caller ends up with after the write-locked probe.
enum Role {
    Producer(Arc<Flight>),
    Waiter(Arc<Flight>),
}

/// Concurrent single-flight map from identity key to artifact.
pub struct GenerationCache {
    slots: RwLock<FxHashMap<UnitKey, Slot>>,
    config: CacheConfig,
}

impl GenerationCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            slots: RwLock::new(FxHashMap::default()),
            config,
        }
    }

    fn store(&self, unit: &Arc<Unit>) -> Stored {
        match self.config.retention() {
            Retention::Strong => Stored::Strong(Arc::clone(unit)),
            Retention::Weak => Stored::Weak(Arc::downgrade(unit)),
        }
    }

    /// Fetch the artifact for `key`, running `produce` if (and only if)
    /// no other caller is already producing it.
    ///
    /// `produce` runs with no cache lock held, so a producing recipe
    /// may recurse into the cache for a *different* key. Re-entering
    /// for the same key on one call stack is a caller contract
    /// violation and deadlocks by construction.
    pub fn get_or_generate(
        &self,
        key: &UnitKey,
        produce: impl FnOnce() -> GenResult<Arc<Unit>>,
    ) -> GenResult<Arc<Unit>> {
        // Fast path: read-locked probe.
        {
            let slots = self.slots.read();
            match slots.get(key) {
                Some(Slot::Ready(stored)) => {
                    if let Some(unit) = stored.get() {
                        return Ok(unit);
                    }
                    // Dead weak referent: never report a hit on it.
                }
                Some(Slot::InFlight(flight)) => {
                    let flight = Arc::clone(flight);
                    drop(slots);
                    return flight.wait();
                }
                None => {}
            }
        }

        // Slow path: write-locked double-check, then insert-if-absent.
        let role = {
            let mut slots = self.slots.write();
            match slots.get(key) {
                Some(Slot::Ready(stored)) => match stored.get() {
                    Some(unit) => return Ok(unit),
                    // Dead referent: replace the slot and regenerate.
                    None => Self::insert_flight(&mut slots, key),
                },
                Some(Slot::InFlight(flight)) => Role::Waiter(Arc::clone(flight)),
                None => Self::insert_flight(&mut slots, key),
            }
        };

        match role {
            Role::Waiter(flight) => flight.wait(),
            Role::Producer(flight) => {
                tracing::debug!(key = ?key, "cache miss, producing");
                let result = produce();
                flight.publish(result.clone());
                self.settle(key, &flight, &result);
                result
            }
        }
    }

    fn insert_flight(slots: &mut FxHashMap<UnitKey, Slot>, key: &UnitKey) -> Role {
        let flight = Arc::new(Flight::new());
        slots.insert(key.clone(), Slot::InFlight(Arc::clone(&flight)));
        Role::Producer(flight)
    }

    /// Replace the placeholder with the materialized artifact (or drop
    /// it on failure, so the next call retries). Best-effort: if a
    /// racing eviction already replaced this flight's slot, the newer
    /// state is left alone.
    fn settle(&self, key: &UnitKey, flight: &Arc<Flight>, result: &GenResult<Arc<Unit>>) {
        let mut slots = self.slots.write();
        let ours = matches!(
            slots.get(key),
            Some(Slot::InFlight(current)) if Arc::ptr_eq(current, flight)
        );
        if !ours {
            return;
        }
        match result {
            Ok(unit) => {
                slots.insert(key.clone(), Slot::Ready(self.store(unit)));
            }
            Err(error) => {
                tracing::debug!(key = ?key, %error, "production failed, clearing entry");
                slots.remove(key);
            }
        }
    }

    /// Drop the entry for `key`, if any. In-flight productions are
    /// unaffected: their waiters still receive the published result.
    pub fn evict(&self, key: &UnitKey) -> bool {
        self.slots.write().remove(key).is_some()
    }

    /// Number of slots, counting in-progress placeholders.
    pub fn len(&self) -> usize {
        self.slots.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for GenerationCache {
    fn default() -> Self {
        Self::new(CacheConfig::new())
    }
}
