//! Kiln Unit - Data Model and Wire Encoding
//!
//! This crate contains the shared data structures for the Kiln forge:
//! - Unit and member flags
//! - Type descriptors with slot widths
//! - The symbolic instruction set and label placeholders
//! - The immutable `Unit` artifact
//! - The narrow wire encoder (`encode`)
//!
//! It is standalone: embedders that only inspect finished units can
//! depend on this crate without pulling in the emitter or the cache.
//!
//! Types that contain floats store them as u64 bits for Hash
//! compatibility, so every value here is structurally comparable.

mod descriptor;
pub mod encode;
mod flags;
mod frame;
mod inst;
mod unit;

pub use descriptor::TypeDescriptor;
pub use flags::{MemberFlags, UnitFlags};
pub use frame::{FrameDescriptor, ValueKind};
pub use inst::{Cond, Const, Inst, Label};
pub use unit::{BodySection, Member, Unit};
