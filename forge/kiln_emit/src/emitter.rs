//! The unit emitter protocol.
//!
//! A recipe drives a sink through a fixed call order: `begin` once, then
//! any number of `declare_member`/`begin_body` calls, then `end` once.
//! Bodies are nested single-entry contexts with their own cursor.
//!
//! # Design
//!
//! Both traits are object-safe so a recipe written against
//! `&mut dyn UnitEmitter` runs unchanged against the real writer, a
//! trace decorator, or a recording sink. Decorators compose by holding
//! the next emitter and explicitly forwarding every call; there is no
//! inheritance chain, only composition.
//!
//! # Example
//!
//! ```text
//! sink.begin(header)?;
//! sink.declare_member(MemberFlags::PUBLIC, "value", &TypeDescriptor::Int, None)?;
//! let mut body = sink.begin_body(MemberFlags::PUBLIC, "get", &get_descriptor)?;
//! body.emit(Inst::GetMember { owner, name: "value".into() })?;
//! body.emit(Inst::RetValue)?;
//! body.end_body()?;
//! sink.end()?;
//! ```

use crate::error::EmitResult;
use kiln_unit::{Const, FrameDescriptor, Inst, Label, MemberFlags, TypeDescriptor, UnitFlags};

/// The header of a unit, recorded once by `begin`.
///
/// The name and super-name recorded here are authoritative for the whole
/// pass: inherited dispatch (`Inst::CallSuper`) resolves against
/// `super_name`, and member initializers store into `name`.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct UnitHeader {
    pub version: u16,
    pub flags: UnitFlags,
    pub name: String,
    pub super_name: String,
    pub interfaces: Vec<String>,
}

impl UnitHeader {
    /// Header with the given name, defaulting everything else.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            version: kiln_unit::encode::FORMAT_VERSION,
            flags: UnitFlags::PUBLIC,
            name: name.into(),
            super_name: "core/Object".to_string(),
            interfaces: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_flags(mut self, flags: UnitFlags) -> Self {
        self.flags = flags;
        self
    }

    #[must_use]
    pub fn with_super(mut self, super_name: impl Into<String>) -> Self {
        self.super_name = super_name.into();
        self
    }

    #[must_use]
    pub fn with_interface(mut self, interface: impl Into<String>) -> Self {
        self.interfaces.push(interface.into());
        self
    }
}

/// Sink for one unit emission pass.
///
/// Call order is a state machine: `begin` moves the sink from unopened
/// to header-set; member declarations and bodies are legal from then on;
/// `end` closes the unit. Calls outside that order fail fast with a
/// state-violation error rather than corrupting the output.
pub trait UnitEmitter {
    /// Open the unit and record its header. Legal only once, first.
    fn begin(&mut self, header: UnitHeader) -> EmitResult;

    /// Declare a member. Members are keyed by name: identical
    /// redeclaration is a no-op, incompatible redeclaration is an
    /// error. A member declared with an initial `constant` extends the
    /// unit's implicit initializer section.
    fn declare_member(
        &mut self,
        flags: MemberFlags,
        name: &str,
        descriptor: &TypeDescriptor,
        constant: Option<Const>,
    ) -> EmitResult;

    /// Open the executable body of one member and return its cursor.
    /// Only one body may be open at a time. A body opened with
    /// `MemberFlags::ABSTRACT` accepts the full cursor protocol but
    /// discards bookkeeping at `end_body` (no code section exists).
    fn begin_body(
        &mut self,
        flags: MemberFlags,
        name: &str,
        descriptor: &TypeDescriptor,
    ) -> EmitResult<Box<dyn BodyEmitter + '_>>;

    /// Close the unit. Finalizes the implicit initializer section (a
    /// terminating return is appended on the caller's behalf) before
    /// the unit becomes immutable. Every call after `end` is an error.
    fn end(&mut self) -> EmitResult;
}

/// Cursor over one member body.
///
/// Confined to the thread running the emission pass; never shared.
pub trait BodyEmitter {
    /// Create a fresh, unmarked label.
    fn new_label(&mut self) -> EmitResult<Label>;

    /// Mark `label` at the current cursor position. Marking twice in
    /// one pass is an error.
    fn mark_label(&mut self, label: Label) -> EmitResult;

    /// Allocate a local slot for a value of the given type, honoring
    /// wide types. Returns the slot index.
    fn alloc_local(&mut self, descriptor: &TypeDescriptor) -> EmitResult<u16>;

    /// Append one instruction. An instruction referencing a label that
    /// was never created is rejected here; a label that is created but
    /// not yet marked is accepted and resolves when the pass completes.
    fn emit(&mut self, inst: Inst) -> EmitResult;

    /// Record the type-state of locals and stack at the current cursor
    /// position. Identical back-to-back frames at one point are a
    /// no-op; incompatible ones are an error.
    fn frame(&mut self, frame: FrameDescriptor) -> EmitResult;

    /// Finalize the body: resolve labels, lower to bytes, close the
    /// cursor. For an abstract body this silently discards the
    /// bookkeeping instead.
    fn end_body(&mut self) -> EmitResult;
}
