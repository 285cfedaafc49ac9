//! Wire encoding of finished units and bodies.
//!
//! This is the narrow encoding collaborator the emitter calls into. The
//! container layout is deliberately small and deterministic: a `KILN`
//! magic, a format version, length-prefixed strings, one-byte opcodes
//! and little-endian operands. Jump targets are absolute byte offsets
//! within the body's code section, backpatched from the resolved label
//! table; nothing above this module knows byte-level layout.

use crate::descriptor::TypeDescriptor;
use crate::flags::UnitFlags;
use crate::frame::ValueKind;
use crate::inst::{Const, Inst, Label};
use crate::unit::{BodySection, Member};
use std::fmt;

/// Container magic, first four bytes of every encoded unit.
pub const MAGIC: [u8; 4] = *b"KILN";

/// Current container format version.
pub const FORMAT_VERSION: u16 = 1;

/// Error during encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    /// A jump references a label that was never marked in the pass.
    UnmarkedLabel { label: Label },
    /// A label's mark lies outside the instruction stream.
    MarkOutOfRange { label: Label, index: u32, len: usize },
    /// A string field exceeds the u16 length prefix.
    StringTooLong { len: usize },
    /// A table has more entries than its count prefix can carry.
    TooManyEntries { count: usize },
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodeError::UnmarkedLabel { label } => {
                write!(f, "jump target {label} was never marked in this pass")
            }
            EncodeError::MarkOutOfRange { label, index, len } => write!(
                f,
                "label {label} marks instruction {index} but the body has {len} instructions"
            ),
            EncodeError::StringTooLong { len } => {
                write!(f, "string of {len} bytes exceeds the u16 length prefix")
            }
            EncodeError::TooManyEntries { count } => {
                write!(f, "table of {count} entries exceeds its count prefix")
            }
        }
    }
}

impl std::error::Error for EncodeError {}

fn push_u16(buf: &mut Vec<u8>, v: u16) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn push_u32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn push_str(buf: &mut Vec<u8>, s: &str) -> Result<(), EncodeError> {
    let len = u16::try_from(s.len()).map_err(|_| EncodeError::StringTooLong { len: s.len() })?;
    push_u16(buf, len);
    buf.extend_from_slice(s.as_bytes());
    Ok(())
}

fn str_len(s: &str) -> usize {
    2 + s.len()
}

// Opcodes. One byte each; operands follow little-endian.
const OP_NOP: u8 = 0x00;
const OP_CONST: u8 = 0x01;
const OP_LOAD: u8 = 0x02;
const OP_STORE: u8 = 0x03;
const OP_ADD: u8 = 0x04;
const OP_SUB: u8 = 0x05;
const OP_MUL: u8 = 0x06;
const OP_DIV: u8 = 0x07;
const OP_NEG: u8 = 0x08;
const OP_CMP: u8 = 0x09;
const OP_JUMP: u8 = 0x0A;
const OP_JUMP_IF: u8 = 0x0B;
const OP_CALL: u8 = 0x0C;
const OP_GET_MEMBER: u8 = 0x0D;
const OP_SET_MEMBER: u8 = 0x0E;
const OP_NEW: u8 = 0x0F;
const OP_RET: u8 = 0x10;
const OP_RET_VALUE: u8 = 0x11;

const CONST_INT: u8 = 0x00;
const CONST_FLOAT: u8 = 0x01;
const CONST_STR: u8 = 0x02;
const CONST_NULL: u8 = 0x03;

const KIND_INT: u8 = 0x00;
const KIND_LONG: u8 = 0x01;
const KIND_FLOAT: u8 = 0x02;
const KIND_DOUBLE: u8 = 0x03;
const KIND_BOOL: u8 = 0x04;
const KIND_BYTE: u8 = 0x05;
const KIND_STR: u8 = 0x06;
const KIND_REF: u8 = 0x07;
const KIND_TOP: u8 = 0x08;

fn push_value_kind(buf: &mut Vec<u8>, kind: &ValueKind) -> Result<(), EncodeError> {
    match kind {
        ValueKind::Int => buf.push(KIND_INT),
        ValueKind::Long => buf.push(KIND_LONG),
        ValueKind::Float => buf.push(KIND_FLOAT),
        ValueKind::Double => buf.push(KIND_DOUBLE),
        ValueKind::Bool => buf.push(KIND_BOOL),
        ValueKind::Byte => buf.push(KIND_BYTE),
        ValueKind::Str => buf.push(KIND_STR),
        ValueKind::Ref(name) => {
            buf.push(KIND_REF);
            push_str(buf, name)?;
        }
        ValueKind::Top => buf.push(KIND_TOP),
    }
    Ok(())
}

fn const_len(c: &Const) -> usize {
    1 + match c {
        Const::Int(_) | Const::Float(_) => 8,
        Const::Str(s) => str_len(s),
        Const::Null => 0,
    }
}

fn push_const(buf: &mut Vec<u8>, c: &Const) -> Result<(), EncodeError> {
    match c {
        Const::Int(v) => {
            buf.push(CONST_INT);
            buf.extend_from_slice(&v.to_le_bytes());
        }
        Const::Float(bits) => {
            buf.push(CONST_FLOAT);
            buf.extend_from_slice(&bits.to_le_bytes());
        }
        Const::Str(s) => {
            buf.push(CONST_STR);
            push_str(buf, s)?;
        }
        Const::Null => buf.push(CONST_NULL),
    }
    Ok(())
}

fn descriptor_len(d: &TypeDescriptor) -> usize {
    str_len(&d.to_string())
}

/// Encoded length of one instruction, independent of label resolution
/// (jump operands are fixed-width).
fn inst_len(inst: &Inst, super_name: &str) -> usize {
    match inst {
        Inst::Nop
        | Inst::Add
        | Inst::Sub
        | Inst::Mul
        | Inst::Div
        | Inst::Neg
        | Inst::Cmp
        | Inst::Ret
        | Inst::RetValue => 1,
        Inst::Const(c) => 1 + const_len(c),
        Inst::Load(_) | Inst::Store(_) => 1 + 2,
        Inst::Jump(_) => 1 + 4,
        Inst::JumpIf(_, _) => 1 + 1 + 4,
        Inst::Call {
            owner,
            name,
            descriptor,
        } => 1 + str_len(owner) + str_len(name) + descriptor_len(descriptor),
        Inst::CallSuper { name, descriptor } => {
            1 + str_len(super_name) + str_len(name) + descriptor_len(descriptor)
        }
        Inst::GetMember { owner, name } | Inst::SetMember { owner, name } => {
            1 + str_len(owner) + str_len(name)
        }
        Inst::New(name) => 1 + str_len(name),
    }
}

/// Byte offset of every instruction in the encoded stream, plus the
/// end-of-body offset as a final entry.
///
/// Instruction sizes do not depend on label resolution (jump operands
/// are fixed-width), so offsets are computable before labels resolve.
pub fn inst_offsets(insts: &[Inst], super_name: &str) -> Vec<u32> {
    let mut offsets = Vec::with_capacity(insts.len() + 1);
    let mut at = 0u32;
    for inst in insts {
        offsets.push(at);
        // A single instruction encodes to at most a few KiB; a body
        // overflowing u32 is unconstructible in practice.
        at = at.saturating_add(u32::try_from(inst_len(inst, super_name)).unwrap_or(u32::MAX));
    }
    offsets.push(at);
    offsets
}

/// Lower a symbolic instruction stream to encoded bytes.
///
/// `label_at` maps a label to the *instruction index* it marks (an index
/// equal to the stream length marks the end of the body). Jump operands
/// become absolute byte offsets within the returned code section.
/// `super_name` resolves [`Inst::CallSuper`] owners; it must be whatever
/// super-name the unit header carried.
pub fn body_bytes(
    insts: &[Inst],
    super_name: &str,
    label_at: impl Fn(Label) -> Option<u32>,
) -> Result<Vec<u8>, EncodeError> {
    let offsets = inst_offsets(insts, super_name);

    let resolve = |label: Label| -> Result<u32, EncodeError> {
        let index = label_at(label).ok_or(EncodeError::UnmarkedLabel { label })?;
        offsets
            .get(index as usize)
            .copied()
            .ok_or(EncodeError::MarkOutOfRange {
                label,
                index,
                len: insts.len(),
            })
    };

    let total = offsets.last().copied().unwrap_or(0) as usize;
    let mut buf = Vec::with_capacity(total);
    for inst in insts {
        match inst {
            Inst::Nop => buf.push(OP_NOP),
            Inst::Const(c) => {
                buf.push(OP_CONST);
                push_const(&mut buf, c)?;
            }
            Inst::Load(slot) => {
                buf.push(OP_LOAD);
                push_u16(&mut buf, *slot);
            }
            Inst::Store(slot) => {
                buf.push(OP_STORE);
                push_u16(&mut buf, *slot);
            }
            Inst::Add => buf.push(OP_ADD),
            Inst::Sub => buf.push(OP_SUB),
            Inst::Mul => buf.push(OP_MUL),
            Inst::Div => buf.push(OP_DIV),
            Inst::Neg => buf.push(OP_NEG),
            Inst::Cmp => buf.push(OP_CMP),
            Inst::Jump(label) => {
                buf.push(OP_JUMP);
                push_u32(&mut buf, resolve(*label)?);
            }
            Inst::JumpIf(cond, label) => {
                buf.push(OP_JUMP_IF);
                buf.push(*cond as u8);
                push_u32(&mut buf, resolve(*label)?);
            }
            Inst::Call {
                owner,
                name,
                descriptor,
            } => {
                buf.push(OP_CALL);
                push_str(&mut buf, owner)?;
                push_str(&mut buf, name)?;
                push_str(&mut buf, &descriptor.to_string())?;
            }
            Inst::CallSuper { name, descriptor } => {
                buf.push(OP_CALL);
                push_str(&mut buf, super_name)?;
                push_str(&mut buf, name)?;
                push_str(&mut buf, &descriptor.to_string())?;
            }
            Inst::GetMember { owner, name } => {
                buf.push(OP_GET_MEMBER);
                push_str(&mut buf, owner)?;
                push_str(&mut buf, name)?;
            }
            Inst::SetMember { owner, name } => {
                buf.push(OP_SET_MEMBER);
                push_str(&mut buf, owner)?;
                push_str(&mut buf, name)?;
            }
            Inst::New(name) => {
                buf.push(OP_NEW);
                push_str(&mut buf, name)?;
            }
            Inst::Ret => buf.push(OP_RET),
            Inst::RetValue => buf.push(OP_RET_VALUE),
        }
    }
    Ok(buf)
}

/// Assemble the complete container for a finished unit.
pub fn unit_bytes(
    version: u16,
    flags: UnitFlags,
    name: &str,
    super_name: &str,
    interfaces: &[String],
    members: &[Member],
    bodies: &[BodySection],
) -> Result<Vec<u8>, EncodeError> {
    let mut buf = Vec::new();
    buf.extend_from_slice(&MAGIC);
    push_u16(&mut buf, version);
    push_u16(&mut buf, flags.bits());
    push_str(&mut buf, name)?;
    push_str(&mut buf, super_name)?;

    let count = u16::try_from(interfaces.len()).map_err(|_| EncodeError::TooManyEntries {
        count: interfaces.len(),
    })?;
    push_u16(&mut buf, count);
    for iface in interfaces {
        push_str(&mut buf, iface)?;
    }

    let count = u16::try_from(members.len()).map_err(|_| EncodeError::TooManyEntries {
        count: members.len(),
    })?;
    push_u16(&mut buf, count);
    for member in members {
        push_u16(&mut buf, member.flags.bits());
        push_str(&mut buf, &member.name)?;
        push_str(&mut buf, &member.descriptor.to_string())?;
        match &member.constant {
            Some(c) => {
                buf.push(1);
                push_const(&mut buf, c)?;
            }
            None => buf.push(0),
        }
        buf.push(u8::from(member.has_body));
    }

    let count = u16::try_from(bodies.len()).map_err(|_| EncodeError::TooManyEntries {
        count: bodies.len(),
    })?;
    push_u16(&mut buf, count);
    for body in bodies {
        push_str(&mut buf, &body.member)?;
        push_u16(&mut buf, body.max_locals);
        let code_len =
            u32::try_from(body.code.len()).map_err(|_| EncodeError::TooManyEntries {
                count: body.code.len(),
            })?;
        push_u32(&mut buf, code_len);
        buf.extend_from_slice(&body.code);

        let frame_count =
            u16::try_from(body.frames.len()).map_err(|_| EncodeError::TooManyEntries {
                count: body.frames.len(),
            })?;
        push_u16(&mut buf, frame_count);
        for (at, frame) in &body.frames {
            push_u32(&mut buf, *at);
            buf.push(u8::try_from(frame.locals.len()).unwrap_or(u8::MAX));
            for kind in &frame.locals {
                push_value_kind(&mut buf, kind)?;
            }
            buf.push(u8::try_from(frame.stack.len()).unwrap_or(u8::MAX));
            for kind in &frame.stack {
                push_value_kind(&mut buf, kind)?;
            }
        }
    }

    Ok(buf)
}
