//! Cross-thread single-flight behavior.

use kiln_cache::{
    CacheConfig, GenError, Recipe, Retention, Scope, ScopeDirectory, UnitKey, UnitKind,
};
use kiln_emit::{EmitError, EmitResult, UnitEmitter, UnitHeader};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

/// Recipe that counts invocations and optionally dawdles so that
/// concurrent callers overlap with the production window.
struct CountingRecipe {
    prefix: String,
    invocations: AtomicUsize,
    delay: Duration,
}

impl CountingRecipe {
    fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            invocations: AtomicUsize::new(0),
            delay: Duration::ZERO,
        }
    }

    fn slow(prefix: &str, delay: Duration) -> Self {
        Self {
            delay,
            ..Self::new(prefix)
        }
    }

    fn count(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }
}

impl Recipe for CountingRecipe {
    fn prefix(&self) -> &str {
        &self.prefix
    }

    fn emit(&self, name: &str, sink: &mut dyn UnitEmitter) -> EmitResult {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        sink.begin(UnitHeader::named(name))?;
        sink.end()
    }
}

#[test]
fn test_eight_concurrent_callers_one_invocation() {
    let directory = ScopeDirectory::new();
    let scope = Scope::new("app");
    let recipe = CountingRecipe::slow("acme/Foo", Duration::from_millis(50));
    let barrier = Barrier::new(8);

    let units: Vec<_> = thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                s.spawn(|| {
                    barrier.wait();
                    directory
                        .generate(&scope, &UnitKey::new("Foo"), &recipe)
                        .unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(recipe.count(), 1);
    let first = &units[0];
    for unit in &units {
        assert!(Arc::ptr_eq(first, unit));
    }
}

#[test]
fn test_structurally_equal_keys_share_one_production() {
    let directory = ScopeDirectory::new();
    let scope = Scope::new("app");
    let recipe = CountingRecipe::new("acme/Foo");

    // Two distinct key instances, equal by structure.
    let first = directory
        .generate(&scope, &UnitKey::new(("Foo", 1u32)), &recipe)
        .unwrap();
    let second = directory
        .generate(&scope, &UnitKey::new(("Foo", 1u32)), &recipe)
        .unwrap();

    assert_eq!(recipe.count(), 1);
    assert!(Arc::ptr_eq(&first, &second));
}

/// Fails on its first invocation, succeeds afterwards.
struct FlakyRecipe {
    invocations: AtomicUsize,
}

impl Recipe for FlakyRecipe {
    fn prefix(&self) -> &str {
        "acme/Flaky"
    }

    fn emit(&self, name: &str, sink: &mut dyn UnitEmitter) -> EmitResult {
        if self.invocations.fetch_add(1, Ordering::SeqCst) == 0 {
            return Err(EmitError::recipe("first attempt fails"));
        }
        sink.begin(UnitHeader::named(name))?;
        sink.end()
    }
}

#[test]
fn test_failure_is_not_cached() {
    let directory = ScopeDirectory::new();
    let scope = Scope::new("app");
    let recipe = FlakyRecipe {
        invocations: AtomicUsize::new(0),
    };
    let key = UnitKey::new("flaky");

    let err = directory.generate(&scope, &key, &recipe).unwrap_err();
    match &err {
        GenError::Production(cause) => {
            assert_eq!(cause, &EmitError::recipe("first attempt fails"));
        }
        other => panic!("expected production failure, got {other}"),
    }

    let unit = directory.generate(&scope, &key, &recipe).unwrap();
    assert_eq!(unit.name, "acme/Flaky$0");
    assert_eq!(recipe.invocations.load(Ordering::SeqCst), 2);
}

/// Blocks on a barrier inside production so a second caller is
/// guaranteed to arrive while the flight is in progress, then fails.
struct FailingProducer {
    started: Barrier,
}

impl Recipe for FailingProducer {
    fn prefix(&self) -> &str {
        "acme/Doomed"
    }

    fn emit(&self, _name: &str, _sink: &mut dyn UnitEmitter) -> EmitResult {
        self.started.wait();
        thread::sleep(Duration::from_millis(20));
        Err(EmitError::recipe("producer failed"))
    }
}

#[test]
fn test_producer_failure_reaches_waiters() {
    let directory = ScopeDirectory::new();
    let scope = Scope::new("app");
    let recipe = FailingProducer {
        started: Barrier::new(2),
    };
    let key = UnitKey::new("doomed");

    let (a, b) = thread::scope(|s| {
        let producer = s.spawn(|| directory.generate(&scope, &key, &recipe));
        let waiter = s.spawn(|| {
            // The barrier trips only once production has begun, so
            // this call finds the in-progress placeholder and waits.
            recipe.started.wait();
            directory.generate(&scope, &key, &recipe)
        });
        (producer.join().unwrap(), waiter.join().unwrap())
    });

    let a = a.unwrap_err();
    let b = b.unwrap_err();
    assert_eq!(a, b);
    assert!(matches!(a, GenError::Production(_)));
}

#[test]
fn test_weak_retention_regenerates_under_original_name() {
    let directory = ScopeDirectory::with_config(
        CacheConfig::new().with_retention(Retention::Weak),
    );
    let scope = Scope::new("app");
    let recipe = CountingRecipe::new("acme/Foo");
    let key = UnitKey::new("foo");

    let first = directory.generate(&scope, &key, &recipe).unwrap();
    let original_name = first.name.clone();
    drop(first);

    // The artifact died with its last user; regeneration must reuse
    // the originally assigned name, since callers may be bound to it.
    let second = directory.generate(&scope, &key, &recipe).unwrap();
    assert_eq!(second.name, original_name);
    assert_eq!(recipe.count(), 2);
    assert_eq!(directory.registry_for(&scope).names().len(), 1);
}

/// Generates a dependent accessor unit from inside its own production.
struct NestingRecipe<'a> {
    directory: &'a ScopeDirectory,
    scope: &'a Scope,
}

struct AccessorRecipe {
    prefix: String,
}

impl Recipe for AccessorRecipe {
    fn prefix(&self) -> &str {
        &self.prefix
    }

    fn kind(&self) -> UnitKind {
        UnitKind::Accessor
    }

    fn emit(&self, name: &str, sink: &mut dyn UnitEmitter) -> EmitResult {
        sink.begin(UnitHeader::named(name))?;
        sink.end()
    }
}

impl Recipe for NestingRecipe<'_> {
    fn prefix(&self) -> &str {
        "acme/Outer"
    }

    fn kind(&self) -> UnitKind {
        UnitKind::Accessor
    }

    fn emit(&self, name: &str, sink: &mut dyn UnitEmitter) -> EmitResult {
        // Re-entrant generation of a *different* key is permitted while
        // this key is producing. The dependent prefix derives from this
        // unit's assigned name, marker included.
        let stem = name.rsplit_once('$').map_or(name, |(stem, _)| stem);
        let inner = AccessorRecipe {
            prefix: stem.to_string(),
        };
        let dependent = self
            .directory
            .generate(self.scope, &UnitKey::new("inner"), &inner)
            .map_err(|err| EmitError::recipe(err.to_string()))?;
        assert_eq!(dependent.name.matches("$access").count(), 1);

        sink.begin(UnitHeader::named(name))?;
        sink.end()
    }
}

#[test]
fn test_nested_generation_keeps_single_accessor_marker() {
    let directory = ScopeDirectory::new();
    let scope = Scope::new("app");
    let recipe = NestingRecipe {
        directory: &directory,
        scope: &scope,
    };

    let outer = directory
        .generate(&scope, &UnitKey::new("outer"), &recipe)
        .unwrap();
    assert_eq!(outer.name, "acme/Outer$access$0");

    let registry = directory.registry_for(&scope);
    assert!(registry.names().is_reserved("acme/Outer$access$1"));
    assert_eq!(registry.units().len(), 2);
}
