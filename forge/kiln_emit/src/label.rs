//! Label bookkeeping for one emission pass.
//!
//! Labels are created unresolved and resolve to a position only when the
//! cursor later passes their mark. Reading a position before the mark,
//! marking twice, or referencing a label that was never created are all
//! fail-fast protocol violations.

use crate::error::{EmitError, EmitResult};
use kiln_unit::Label;

/// Per-pass label table. Positions are instruction indices; the encoder
/// maps them to byte offsets when the pass is lowered.
#[derive(Debug, Default)]
pub struct LabelTable {
    marks: Vec<Option<u32>>,
}

impl LabelTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a fresh, unmarked label.
    pub fn create(&mut self) -> Label {
        // Label indices are dense; a pass with 4G labels is unconstructible.
        let id = u32::try_from(self.marks.len()).unwrap_or(u32::MAX);
        self.marks.push(None);
        Label(id)
    }

    /// Whether `label` was created in this pass.
    pub fn is_declared(&self, label: Label) -> bool {
        (label.0 as usize) < self.marks.len()
    }

    /// Mark `label` at instruction index `at`.
    pub fn mark(&mut self, label: Label, at: u32) -> EmitResult {
        let slot = self
            .marks
            .get_mut(label.0 as usize)
            .ok_or(EmitError::LabelUndeclared { label })?;
        if slot.is_some() {
            return Err(EmitError::LabelRemarked { label });
        }
        *slot = Some(at);
        Ok(())
    }

    /// The instruction index `label` marks, if it has been marked.
    pub fn mark_of(&self, label: Label) -> Option<u32> {
        self.marks.get(label.0 as usize).copied().flatten()
    }

    /// The instruction index `label` marks; an error if unmarked or
    /// undeclared (reading an unresolved position is a protocol
    /// violation).
    pub fn position(&self, label: Label) -> EmitResult<u32> {
        match self.marks.get(label.0 as usize) {
            None => Err(EmitError::LabelUndeclared { label }),
            Some(None) => Err(EmitError::LabelUnmarked { label }),
            Some(Some(at)) => Ok(*at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_create_then_mark_then_read() {
        let mut table = LabelTable::new();
        let label = table.create();
        assert_eq!(table.mark_of(label), None);
        table.mark(label, 3).unwrap();
        assert_eq!(table.position(label).unwrap(), 3);
    }

    #[test]
    fn test_mark_twice_is_error() {
        let mut table = LabelTable::new();
        let label = table.create();
        table.mark(label, 0).unwrap();
        assert_eq!(
            table.mark(label, 1).unwrap_err(),
            EmitError::LabelRemarked { label }
        );
    }

    #[test]
    fn test_read_before_mark_is_error() {
        let mut table = LabelTable::new();
        let label = table.create();
        assert_eq!(
            table.position(label).unwrap_err(),
            EmitError::LabelUnmarked { label }
        );
    }

    #[test]
    fn test_undeclared_label_is_error() {
        let mut table = LabelTable::new();
        let bogus = Label(42);
        assert!(!table.is_declared(bogus));
        assert_eq!(
            table.mark(bogus, 0).unwrap_err(),
            EmitError::LabelUndeclared { label: bogus }
        );
    }
}
