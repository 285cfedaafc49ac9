//! The terminal unit writer.
//!
//! `UnitWriter` is the sink that actually builds a `Unit`. It enforces
//! the protocol state machine, owns the member table and the implicit
//! initializer section, and lowers each finished body through the wire
//! encoder. Per-pass state is shared between the writer and its body
//! cursors through `Rc<RefCell<_>>`; a pass is confined to one thread.

use crate::emitter::{BodyEmitter, UnitEmitter, UnitHeader};
use crate::error::{EmitError, EmitResult};
use crate::frame::FrameTable;
use crate::label::LabelTable;
use kiln_unit::{
    encode, BodySection, Const, FrameDescriptor, Inst, Label, Member, MemberFlags, TypeDescriptor,
    Unit,
};
use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::mem;
use std::rc::Rc;

/// Member name of the implicit initializer section.
pub const INITIALIZER_MEMBER: &str = "@init";

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
enum Phase {
    Unopened,
    HeaderSet,
    Closed,
}

/// Per-pass state shared between the writer and its body cursors.
struct PassState {
    phase: Phase,
    header: Option<UnitHeader>,
    member_index: FxHashMap<String, usize>,
    members: Vec<Member>,
    bodies: Vec<BodySection>,
    /// Implicit initializer instructions accumulated from member
    /// declarations that carried an initial value.
    init_code: Vec<Inst>,
    has_initializer: bool,
    open_body: Option<String>,
}

impl PassState {
    fn new() -> Self {
        Self {
            phase: Phase::Unopened,
            header: None,
            member_index: FxHashMap::default(),
            members: Vec::new(),
            bodies: Vec::new(),
            init_code: Vec::new(),
            has_initializer: false,
            open_body: None,
        }
    }

    fn unit_name(&self) -> String {
        self.header.as_ref().map(|h| h.name.clone()).unwrap_or_default()
    }

    fn super_name(&self) -> String {
        self.header
            .as_ref()
            .map(|h| h.super_name.clone())
            .unwrap_or_default()
    }

    /// Insert or merge a member declaration. Members are keyed by name:
    /// an identical redeclaration is a no-op, an incompatible one is a
    /// clash. A fresh declaration with an initial value extends the
    /// implicit initializer.
    fn upsert_member(
        &mut self,
        flags: MemberFlags,
        name: &str,
        descriptor: &TypeDescriptor,
        constant: Option<Const>,
        has_body: bool,
    ) -> EmitResult {
        if let Some(&index) = self.member_index.get(name) {
            let existing = &mut self.members[index];
            if existing.flags == flags
                && existing.descriptor == *descriptor
                && existing.constant == constant
            {
                existing.has_body |= has_body;
                return Ok(());
            }
            return Err(EmitError::MemberClash {
                name: name.to_string(),
                existing: format!("{:?} {}", existing.flags, existing.descriptor),
                incoming: format!("{flags:?} {descriptor}"),
            });
        }

        if let Some(constant) = &constant {
            let owner = self.unit_name();
            self.init_code.push(Inst::Const(constant.clone()));
            self.init_code.push(Inst::SetMember {
                owner,
                name: name.to_string(),
            });
            self.has_initializer = true;
        }

        self.member_index.insert(name.to_string(), self.members.len());
        self.members.push(Member {
            flags,
            name: name.to_string(),
            descriptor: descriptor.clone(),
            constant,
            has_body,
        });
        Ok(())
    }

    /// Fail unless the pass is in member-emission position.
    fn check_member_position(&self, call: &'static str) -> EmitResult {
        match self.phase {
            Phase::Unopened => Err(EmitError::OutOfOrder {
                call,
                state: "unopened",
            }),
            Phase::Closed => Err(EmitError::AfterEnd { call }),
            Phase::HeaderSet => match &self.open_body {
                Some(member) => Err(EmitError::BodyOpen {
                    member: member.clone(),
                }),
                None => Ok(()),
            },
        }
    }
}

/// The terminal emitter: builds an immutable [`Unit`] over one pass.
pub struct UnitWriter {
    state: Rc<RefCell<PassState>>,
}

impl UnitWriter {
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(PassState::new())),
        }
    }

    /// Consume the writer and yield the finished unit. Legal only after
    /// `end()` has closed the pass.
    pub fn finish(self) -> EmitResult<Unit> {
        let mut state = self.state.borrow_mut();
        if state.phase != Phase::Closed {
            return Err(EmitError::OutOfOrder {
                call: "finish",
                state: "not yet closed by end()",
            });
        }
        let header = state.header.take().ok_or(EmitError::OutOfOrder {
            call: "finish",
            state: "unopened",
        })?;
        let members = mem::take(&mut state.members);
        let bodies = mem::take(&mut state.bodies);
        let has_initializer = state.has_initializer;

        let bytes = encode::unit_bytes(
            header.version,
            header.flags,
            &header.name,
            &header.super_name,
            &header.interfaces,
            &members,
            &bodies,
        )?;

        Ok(Unit {
            name: header.name,
            version: header.version,
            flags: header.flags,
            super_name: header.super_name,
            interfaces: header.interfaces,
            members,
            has_initializer,
            bytes,
        })
    }
}

impl Default for UnitWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl UnitEmitter for UnitWriter {
    fn begin(&mut self, header: UnitHeader) -> EmitResult {
        let mut state = self.state.borrow_mut();
        match state.phase {
            Phase::Unopened => {
                state.header = Some(header);
                state.phase = Phase::HeaderSet;
                Ok(())
            }
            Phase::HeaderSet => Err(EmitError::OutOfOrder {
                call: "begin",
                state: "already opened",
            }),
            Phase::Closed => Err(EmitError::AfterEnd { call: "begin" }),
        }
    }

    fn declare_member(
        &mut self,
        flags: MemberFlags,
        name: &str,
        descriptor: &TypeDescriptor,
        constant: Option<Const>,
    ) -> EmitResult {
        let mut state = self.state.borrow_mut();
        state.check_member_position("declare_member")?;
        state.upsert_member(flags, name, descriptor, constant, false)
    }

    fn begin_body(
        &mut self,
        flags: MemberFlags,
        name: &str,
        descriptor: &TypeDescriptor,
    ) -> EmitResult<Box<dyn BodyEmitter + '_>> {
        let is_abstract = flags.contains(MemberFlags::ABSTRACT);
        {
            let mut state = self.state.borrow_mut();
            state.check_member_position("begin_body")?;
            state.upsert_member(flags, name, descriptor, None, !is_abstract)?;
            state.open_body = Some(name.to_string());
        }
        Ok(Box::new(BodyWriter {
            state: Rc::clone(&self.state),
            member: name.to_string(),
            is_abstract,
            code: Vec::new(),
            labels: LabelTable::new(),
            frames: FrameTable::new(),
            next_slot: 0,
            ended: false,
        }))
    }

    fn end(&mut self) -> EmitResult {
        let mut state = self.state.borrow_mut();
        match state.phase {
            Phase::Unopened => {
                return Err(EmitError::OutOfOrder {
                    call: "end",
                    state: "unopened",
                })
            }
            Phase::Closed => return Err(EmitError::AfterEnd { call: "end" }),
            Phase::HeaderSet => {}
        }
        if let Some(member) = &state.open_body {
            return Err(EmitError::BodyOpen {
                member: member.clone(),
            });
        }

        // Finalize the implicit initializer: it must receive its
        // terminating instruction and close like any other body.
        if state.has_initializer {
            let mut code = mem::take(&mut state.init_code);
            code.push(Inst::Ret);
            let super_name = state.super_name();
            let bytes = encode::body_bytes(&code, &super_name, |_| None)?;
            state.upsert_member(
                MemberFlags::STATIC | MemberFlags::SYNTHETIC,
                INITIALIZER_MEMBER,
                &TypeDescriptor::Func {
                    params: vec![],
                    ret: None,
                },
                None,
                true,
            )?;
            state.bodies.push(BodySection {
                member: INITIALIZER_MEMBER.to_string(),
                max_locals: 0,
                code: bytes,
                frames: Vec::new(),
            });
        }

        state.phase = Phase::Closed;
        Ok(())
    }
}

/// Cursor over one member body, produced by [`UnitWriter::begin_body`].
struct BodyWriter {
    state: Rc<RefCell<PassState>>,
    member: String,
    is_abstract: bool,
    code: Vec<Inst>,
    labels: LabelTable,
    frames: FrameTable,
    next_slot: u16,
    ended: bool,
}

impl BodyWriter {
    fn check_open(&self, call: &'static str) -> EmitResult {
        if self.ended {
            return Err(EmitError::OutOfOrder {
                call,
                state: "body finalized",
            });
        }
        Ok(())
    }

    fn cursor(&self) -> u32 {
        u32::try_from(self.code.len()).unwrap_or(u32::MAX)
    }
}

impl BodyEmitter for BodyWriter {
    fn new_label(&mut self) -> EmitResult<Label> {
        self.check_open("new_label")?;
        Ok(self.labels.create())
    }

    fn mark_label(&mut self, label: Label) -> EmitResult {
        self.check_open("mark_label")?;
        self.labels.mark(label, self.cursor())
    }

    fn alloc_local(&mut self, descriptor: &TypeDescriptor) -> EmitResult<u16> {
        self.check_open("alloc_local")?;
        let slot = self.next_slot;
        let width = descriptor.slot_width();
        let next = u32::from(slot) + u32::from(width);
        self.next_slot = u16::try_from(next).map_err(|_| EmitError::SlotOverflow {
            requested: next,
        })?;
        Ok(slot)
    }

    fn emit(&mut self, inst: Inst) -> EmitResult {
        self.check_open("emit")?;
        match &inst {
            Inst::Jump(label) | Inst::JumpIf(_, label) => {
                if !self.labels.is_declared(*label) {
                    return Err(EmitError::LabelUndeclared { label: *label });
                }
            }
            _ => {}
        }
        self.code.push(inst);
        Ok(())
    }

    fn frame(&mut self, frame: FrameDescriptor) -> EmitResult {
        self.check_open("frame")?;
        self.frames.record(self.cursor(), frame)
    }

    fn end_body(&mut self) -> EmitResult {
        self.check_open("end_body")?;
        self.ended = true;
        let mut state = self.state.borrow_mut();
        state.open_body = None;

        if self.is_abstract {
            // No body exists to finalize; bookkeeping is discarded.
            return Ok(());
        }

        let super_name = state.super_name();
        let code = mem::take(&mut self.code);
        let bytes = encode::body_bytes(&code, &super_name, |label| self.labels.mark_of(label))?;

        // Frame positions were recorded as instruction indices; map
        // them to byte offsets in the lowered code.
        let offsets = encode::inst_offsets(&code, &super_name);
        let frames = mem::take(&mut self.frames)
            .into_frames()
            .into_iter()
            .map(|(index, frame)| {
                let at = offsets.get(index as usize).copied().unwrap_or(0);
                (at, frame)
            })
            .collect();

        state.bodies.push(BodySection {
            member: mem::take(&mut self.member),
            max_locals: self.next_slot,
            code: bytes,
            frames,
        });
        Ok(())
    }
}
