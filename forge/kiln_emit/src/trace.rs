//! Human-readable reconstruction of an emission pass.
//!
//! `TraceEmitter` decorates any other emitter: it renders each protocol
//! call into a shared text buffer and forwards the call unchanged, so a
//! recipe can be traced against the real writer with no behavior
//! change. `RecordingSink` is a terminal sink that only records: it
//! accepts the full protocol without building anything, which is what
//! makes the protocol implementation-agnostic.
//!
//! Unmarked labels are always rendered by their symbolic identity
//! (`L3`); the trace never asks for a resolved position.

use crate::emitter::{BodyEmitter, UnitEmitter, UnitHeader};
use crate::error::EmitResult;
use kiln_unit::{Const, FrameDescriptor, Inst, Label, MemberFlags, TypeDescriptor};
use std::cell::RefCell;
use std::fmt::Write as _;
use std::rc::Rc;

/// Shared render buffer. Writing into a `String` is infallible, so the
/// formatting results below are discarded.
type Buffer = Rc<RefCell<String>>;

fn line(out: &Buffer, text: &str) {
    let mut buf = out.borrow_mut();
    buf.push_str(text);
    buf.push('\n');
}

fn render_member(
    kind: &str,
    flags: MemberFlags,
    name: &str,
    descriptor: &TypeDescriptor,
    constant: Option<&Const>,
) -> String {
    let mut text = format!("{kind} {name} {descriptor} flags={flags:?}");
    if let Some(constant) = constant {
        let _ = write!(text, " = {constant}");
    }
    text
}

/// Decorator that renders every call while forwarding to the next
/// emitter in the chain.
pub struct TraceEmitter<E> {
    next: E,
    out: Buffer,
}

impl<E> TraceEmitter<E> {
    pub fn new(next: E) -> Self {
        Self {
            next,
            out: Rc::new(RefCell::new(String::new())),
        }
    }

    /// The text rendered so far.
    pub fn rendered(&self) -> String {
        self.out.borrow().clone()
    }

    /// Unwrap the decorated emitter.
    pub fn into_inner(self) -> E {
        self.next
    }
}

impl<E: UnitEmitter> UnitEmitter for TraceEmitter<E> {
    fn begin(&mut self, header: UnitHeader) -> EmitResult {
        line(
            &self.out,
            &format!(
                "begin {} : {} flags={:?}",
                header.name, header.super_name, header.flags
            ),
        );
        for interface in &header.interfaces {
            line(&self.out, &format!("  implements {interface}"));
        }
        self.next.begin(header)
    }

    fn declare_member(
        &mut self,
        flags: MemberFlags,
        name: &str,
        descriptor: &TypeDescriptor,
        constant: Option<Const>,
    ) -> EmitResult {
        line(
            &self.out,
            &render_member("member", flags, name, descriptor, constant.as_ref()),
        );
        self.next.declare_member(flags, name, descriptor, constant)
    }

    fn begin_body(
        &mut self,
        flags: MemberFlags,
        name: &str,
        descriptor: &TypeDescriptor,
    ) -> EmitResult<Box<dyn BodyEmitter + '_>> {
        line(
            &self.out,
            &format!("{} {{", render_member("body", flags, name, descriptor, None)),
        );
        let inner = self.next.begin_body(flags, name, descriptor)?;
        Ok(Box::new(TraceBody {
            next: inner,
            out: Rc::clone(&self.out),
        }))
    }

    fn end(&mut self) -> EmitResult {
        line(&self.out, "end");
        self.next.end()
    }
}

/// Body cursor decorator paired with [`TraceEmitter`].
struct TraceBody<'a> {
    next: Box<dyn BodyEmitter + 'a>,
    out: Buffer,
}

impl BodyEmitter for TraceBody<'_> {
    fn new_label(&mut self) -> EmitResult<Label> {
        let label = self.next.new_label()?;
        line(&self.out, &format!("  declare {label}"));
        Ok(label)
    }

    fn mark_label(&mut self, label: Label) -> EmitResult {
        line(&self.out, &format!("  {label}:"));
        self.next.mark_label(label)
    }

    fn alloc_local(&mut self, descriptor: &TypeDescriptor) -> EmitResult<u16> {
        let slot = self.next.alloc_local(descriptor)?;
        line(&self.out, &format!("  local {slot} {descriptor}"));
        Ok(slot)
    }

    fn emit(&mut self, inst: Inst) -> EmitResult {
        line(&self.out, &format!("  {inst}"));
        self.next.emit(inst)
    }

    fn frame(&mut self, frame: FrameDescriptor) -> EmitResult {
        line(&self.out, &format!("  frame {frame}"));
        self.next.frame(frame)
    }

    fn end_body(&mut self) -> EmitResult {
        line(&self.out, "}");
        self.next.end_body()
    }
}

/// Terminal sink that accepts the full protocol and only records it.
///
/// Useful for diagnostics and tests that assert on the call sequence
/// without building a unit.
pub struct RecordingSink {
    out: Buffer,
    labels: u32,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self {
            out: Rc::new(RefCell::new(String::new())),
            labels: 0,
        }
    }

    /// The text rendered so far.
    pub fn rendered(&self) -> String {
        self.out.borrow().clone()
    }
}

impl Default for RecordingSink {
    fn default() -> Self {
        Self::new()
    }
}

impl UnitEmitter for RecordingSink {
    fn begin(&mut self, header: UnitHeader) -> EmitResult {
        line(
            &self.out,
            &format!(
                "begin {} : {} flags={:?}",
                header.name, header.super_name, header.flags
            ),
        );
        for interface in &header.interfaces {
            line(&self.out, &format!("  implements {interface}"));
        }
        Ok(())
    }

    fn declare_member(
        &mut self,
        flags: MemberFlags,
        name: &str,
        descriptor: &TypeDescriptor,
        constant: Option<Const>,
    ) -> EmitResult {
        line(
            &self.out,
            &render_member("member", flags, name, descriptor, constant.as_ref()),
        );
        Ok(())
    }

    fn begin_body(
        &mut self,
        flags: MemberFlags,
        name: &str,
        descriptor: &TypeDescriptor,
    ) -> EmitResult<Box<dyn BodyEmitter + '_>> {
        line(
            &self.out,
            &format!("{} {{", render_member("body", flags, name, descriptor, None)),
        );
        Ok(Box::new(RecordingBody {
            out: Rc::clone(&self.out),
            labels: &mut self.labels,
            slots: 0,
        }))
    }

    fn end(&mut self) -> EmitResult {
        line(&self.out, "end");
        Ok(())
    }
}

struct RecordingBody<'a> {
    out: Buffer,
    labels: &'a mut u32,
    slots: u16,
}

impl BodyEmitter for RecordingBody<'_> {
    fn new_label(&mut self) -> EmitResult<Label> {
        let label = Label(*self.labels);
        *self.labels += 1;
        line(&self.out, &format!("  declare {label}"));
        Ok(label)
    }

    fn mark_label(&mut self, label: Label) -> EmitResult {
        line(&self.out, &format!("  {label}:"));
        Ok(())
    }

    fn alloc_local(&mut self, descriptor: &TypeDescriptor) -> EmitResult<u16> {
        let slot = self.slots;
        self.slots = self.slots.saturating_add(descriptor.slot_width());
        line(&self.out, &format!("  local {slot} {descriptor}"));
        Ok(slot)
    }

    fn emit(&mut self, inst: Inst) -> EmitResult {
        line(&self.out, &format!("  {inst}"));
        Ok(())
    }

    fn frame(&mut self, frame: FrameDescriptor) -> EmitResult {
        line(&self.out, &format!("  frame {frame}"));
        Ok(())
    }

    fn end_body(&mut self) -> EmitResult {
        line(&self.out, "}");
        Ok(())
    }
}
