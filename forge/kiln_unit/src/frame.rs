//! Verification frame metadata.
//!
//! A frame describes the type-state of locals and the operand stack at a
//! branch target. Frames are metadata only: they never affect execution,
//! but a consumer verifying a body relies on them being monotonic per
//! program point (the emitter enforces that).

use crate::descriptor::TypeDescriptor;
use smallvec::SmallVec;
use std::fmt;

/// Coarse value category used in frame descriptions.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum ValueKind {
    Int,
    Long,
    Float,
    Double,
    Bool,
    Byte,
    Str,
    Ref(String),
    /// An uninitialized or padding slot (second half of a wide value).
    Top,
}

impl From<&TypeDescriptor> for ValueKind {
    fn from(descriptor: &TypeDescriptor) -> Self {
        match descriptor {
            TypeDescriptor::Long => ValueKind::Long,
            TypeDescriptor::Int => ValueKind::Int,
            TypeDescriptor::Double => ValueKind::Double,
            TypeDescriptor::Float => ValueKind::Float,
            TypeDescriptor::Bool => ValueKind::Bool,
            TypeDescriptor::Byte => ValueKind::Byte,
            TypeDescriptor::Str => ValueKind::Str,
            TypeDescriptor::Ref(name) => ValueKind::Ref(name.clone()),
            TypeDescriptor::Func { .. } => ValueKind::Top,
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueKind::Int => write!(f, "int"),
            ValueKind::Long => write!(f, "long"),
            ValueKind::Float => write!(f, "float"),
            ValueKind::Double => write!(f, "double"),
            ValueKind::Bool => write!(f, "bool"),
            ValueKind::Byte => write!(f, "byte"),
            ValueKind::Str => write!(f, "str"),
            ValueKind::Ref(name) => write!(f, "ref {name}"),
            ValueKind::Top => write!(f, "top"),
        }
    }
}

/// The type-state of locals and operand stack at one program point.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct FrameDescriptor {
    pub locals: SmallVec<[ValueKind; 4]>,
    pub stack: SmallVec<[ValueKind; 4]>,
}

impl FrameDescriptor {
    /// Build a frame from slices of value kinds.
    pub fn new(locals: &[ValueKind], stack: &[ValueKind]) -> Self {
        Self {
            locals: locals.iter().cloned().collect(),
            stack: stack.iter().cloned().collect(),
        }
    }
}

impl fmt::Display for FrameDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "locals=[")?;
        for (i, kind) in self.locals.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{kind}")?;
        }
        write!(f, "] stack=[")?;
        for (i, kind) in self.stack.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{kind}")?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_frame_structural_equality() {
        let a = FrameDescriptor::new(&[ValueKind::Int], &[ValueKind::Str]);
        let b = FrameDescriptor::new(&[ValueKind::Int], &[ValueKind::Str]);
        let c = FrameDescriptor::new(&[ValueKind::Long], &[]);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_value_kind_from_descriptor() {
        assert_eq!(ValueKind::from(&TypeDescriptor::Long), ValueKind::Long);
        assert_eq!(
            ValueKind::from(&TypeDescriptor::Ref("Foo".to_string())),
            ValueKind::Ref("Foo".to_string())
        );
    }

    #[test]
    fn test_frame_display() {
        let frame = FrameDescriptor::new(&[ValueKind::Int, ValueKind::Top], &[ValueKind::Bool]);
        assert_eq!(frame.to_string(), "locals=[int, top] stack=[bool]");
    }
}
