//! The finished unit artifact.
//!
//! A `Unit` is the immutable product of one complete emission pass:
//! the assigned name, the declared members, whether an initializer
//! section exists, and the encoded bytes. Nothing mutates a `Unit`
//! after the pass that built it completes.

use crate::descriptor::TypeDescriptor;
use crate::flags::{MemberFlags, UnitFlags};
use crate::frame::FrameDescriptor;
use crate::inst::Const;

/// One declared member of a unit.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Member {
    pub flags: MemberFlags,
    pub name: String,
    pub descriptor: TypeDescriptor,
    /// Initial value, if the member was declared with one.
    pub constant: Option<Const>,
    /// Whether an executable body was emitted for this member.
    pub has_body: bool,
}

/// An encoded executable body for one member.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct BodySection {
    /// Name of the member this body belongs to.
    pub member: String,
    /// Highest local slot index allocated, plus width.
    pub max_locals: u16,
    /// Encoded instruction stream with all labels resolved.
    pub code: Vec<u8>,
    /// Verification frames, one per recorded program point, by byte
    /// offset into `code`.
    pub frames: Vec<(u32, FrameDescriptor)>,
}

/// A generated binary unit: the artifact plus its metadata.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Unit {
    /// Name assigned by the naming resolver.
    pub name: String,
    /// Container format version.
    pub version: u16,
    pub flags: UnitFlags,
    /// Super-unit name recorded by the header; inherited dispatch
    /// resolves against this value.
    pub super_name: String,
    pub interfaces: Vec<String>,
    /// Members in declaration order.
    pub members: Vec<Member>,
    /// Whether the implicit initializer section was opened.
    pub has_initializer: bool,
    /// The complete encoded artifact.
    pub bytes: Vec<u8>,
}

impl Unit {
    /// Look up a declared member by name.
    pub fn member(&self, name: &str) -> Option<&Member> {
        self.members.iter().find(|m| m.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_unit() -> Unit {
        Unit {
            name: "acme/Gen$0".to_string(),
            version: 1,
            flags: UnitFlags::PUBLIC,
            super_name: "core/Object".to_string(),
            interfaces: vec![],
            members: vec![Member {
                flags: MemberFlags::PUBLIC,
                name: "value".to_string(),
                descriptor: TypeDescriptor::Int,
                constant: None,
                has_body: false,
            }],
            has_initializer: false,
            bytes: vec![],
        }
    }

    #[test]
    fn test_member_lookup() {
        let unit = sample_unit();
        assert!(unit.member("value").is_some());
        assert!(unit.member("missing").is_none());
    }
}
