//! Caller-supplied generation logic.
//!
//! A recipe drives the unit emitter protocol to produce one unit. The
//! cache invokes it at most once per (scope, key) at steady state, but
//! a recipe must be referentially transparent: given the same key,
//! repeated invocations (after a weak-retention eviction, say) must
//! produce a binary-equivalent artifact, because callers may already be
//! bound to the previously-assigned name. The assigned name is passed
//! back in, so regeneration emits under the same name.

use kiln_emit::{EmitResult, UnitEmitter};

/// Sub-kind hint for name resolution.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub enum UnitKind {
    /// An ordinary generated unit.
    #[default]
    Plain,
    /// A unit serving as a specialized accessor for another generated
    /// unit; its name carries the accessor marker segment.
    Accessor,
}

/// Generation logic for one kind of unit.
///
/// `emit` must drive the full protocol, `begin` through `end`, on the
/// given sink, declaring the unit under the `name` the resolver
/// assigned.
pub trait Recipe: Send + Sync {
    /// Desired name prefix; the resolver normalizes and uniquifies it.
    fn prefix(&self) -> &str;

    /// Sub-kind hint for the resolver.
    fn kind(&self) -> UnitKind {
        UnitKind::Plain
    }

    /// Perform the emission pass.
    fn emit(&self, name: &str, sink: &mut dyn UnitEmitter) -> EmitResult;
}

/// A recipe backed by a closure, for recipes with no state of their own.
pub struct FnRecipe<F> {
    prefix: String,
    kind: UnitKind,
    emit: F,
}

impl<F> FnRecipe<F>
where
    F: Fn(&str, &mut dyn UnitEmitter) -> EmitResult + Send + Sync,
{
    pub fn new(prefix: impl Into<String>, emit: F) -> Self {
        Self {
            prefix: prefix.into(),
            kind: UnitKind::Plain,
            emit,
        }
    }

    #[must_use]
    pub fn with_kind(mut self, kind: UnitKind) -> Self {
        self.kind = kind;
        self
    }
}

impl<F> Recipe for FnRecipe<F>
where
    F: Fn(&str, &mut dyn UnitEmitter) -> EmitResult + Send + Sync,
{
    fn prefix(&self) -> &str {
        &self.prefix
    }

    fn kind(&self) -> UnitKind {
        self.kind
    }

    fn emit(&self, name: &str, sink: &mut dyn UnitEmitter) -> EmitResult {
        (self.emit)(name, sink)
    }
}
