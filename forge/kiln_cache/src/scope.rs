//! Scope handles.
//!
//! A scope is an external isolation boundary: the core never creates or
//! destroys scopes beyond handing out handles, and it observes liveness
//! only through weak references: holding a registry for a scope must
//! not extend the scope's lifetime. Identity is pointer identity: two
//! handles are the same scope iff they share the underlying allocation.

// Arc is the implementation: callers own strong handles, the directory
// holds only Weak observers.
use std::fmt;
use std::sync::{Arc, Weak};

#[derive(Debug)]
struct ScopeCore {
    label: String,
}

/// Identity of a scope while it is alive.
///
/// Derived from the allocation address, so an id may be reused after
/// its scope dies; holders must re-verify identity via
/// [`WeakScope::upgrade`] + [`Scope::ptr_eq`] before trusting a match.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct ScopeId(usize);

/// A caller-owned handle to an isolation scope.
///
/// Cloning is cheap and shares identity; the scope dies when the last
/// strong handle drops.
#[derive(Clone)]
pub struct Scope(Arc<ScopeCore>);

impl Scope {
    /// Create a fresh scope with a diagnostic label.
    pub fn new(label: impl Into<String>) -> Self {
        Scope(Arc::new(ScopeCore {
            label: label.into(),
        }))
    }

    /// The diagnostic label given at creation.
    pub fn label(&self) -> &str {
        &self.0.label
    }

    /// This scope's identity while alive.
    pub fn id(&self) -> ScopeId {
        ScopeId(Arc::as_ptr(&self.0) as usize)
    }

    /// Whether two handles denote the same scope.
    pub fn ptr_eq(&self, other: &Scope) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// A liveness observer that does not extend the scope's lifetime.
    pub fn downgrade(&self) -> WeakScope {
        WeakScope(Arc::downgrade(&self.0))
    }
}

impl PartialEq for Scope {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Scope {}

impl std::hash::Hash for Scope {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Scope({:?}, {:?})", self.0.label, self.id())
    }
}

/// Non-owning observer of a scope's liveness.
#[derive(Clone, Debug)]
pub struct WeakScope(Weak<ScopeCore>);

impl WeakScope {
    /// A strong handle, if the scope is still alive.
    pub fn upgrade(&self) -> Option<Scope> {
        self.0.upgrade().map(Scope)
    }

    /// Whether the scope is still alive.
    pub fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }
}
