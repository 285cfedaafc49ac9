//! Access and modifier flags for units and their members.
//!
//! Flags are fixed at declaration time and become part of the unit's
//! binary header, so both sets are `u16` to match the wire layout.

use bitflags::bitflags;

bitflags! {
    /// Modifier flags for a whole unit.
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
    pub struct UnitFlags: u16 {
        /// Visible outside its own scope.
        const PUBLIC = 1 << 0;
        /// May not be extended.
        const FINAL = 1 << 1;
        /// Declares members without bodies; cannot be instantiated.
        const ABSTRACT = 1 << 2;
        /// Pure contract unit (no state, all members abstract).
        const INTERFACE = 1 << 3;
        /// Produced by the framework rather than a user recipe.
        const SYNTHETIC = 1 << 4;
    }
}

bitflags! {
    /// Modifier flags for a single member (field/method equivalent).
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
    pub struct MemberFlags: u16 {
        /// Visible outside the declaring unit.
        const PUBLIC = 1 << 0;
        /// Visible only within the declaring unit.
        const PRIVATE = 1 << 1;
        /// Belongs to the unit, not an instance.
        const STATIC = 1 << 2;
        /// May not be reassigned or overridden.
        const FINAL = 1 << 3;
        /// Declared without a body.
        const ABSTRACT = 1 << 4;
        /// Produced by the framework rather than a user recipe.
        const SYNTHETIC = 1 << 5;
    }
}
