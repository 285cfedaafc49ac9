//! Kiln Emit - The Unit Emitter Protocol
//!
//! This crate provides the ordered emission protocol for building
//! binary units:
//! - `UnitEmitter` / `BodyEmitter`: the object-safe protocol traits
//! - `UnitWriter`: the terminal writer enforcing the state machine
//! - `LabelTable` / `FrameTable`: per-pass bookkeeping
//! - `TraceEmitter` / `RecordingSink`: the debug/introspection hook
//!
//! A pass is single-threaded: a recipe drives one sink from `begin` to
//! `end` on one thread, and only the finished, immutable `Unit` leaves
//! that thread. Malformed call sequences fail fast with `EmitError`
//! rather than corrupting output.

mod emitter;
mod error;
mod frame;
mod label;
mod trace;
mod writer;

pub use emitter::{BodyEmitter, UnitEmitter, UnitHeader};
pub use error::{EmitError, EmitResult};
pub use frame::FrameTable;
pub use label::LabelTable;
pub use trace::{RecordingSink, TraceEmitter};
pub use writer::{UnitWriter, INITIALIZER_MEMBER};
