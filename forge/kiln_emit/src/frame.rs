//! Frame recording for one body pass.
//!
//! Frames are monotonic per program point: recording the same frame
//! twice at one point is a no-op from the consumer's perspective, but an
//! incompatible frame at an already-described point is a violation.

use crate::error::{EmitError, EmitResult};
use kiln_unit::FrameDescriptor;

/// Per-pass frame table, ordered by program point.
#[derive(Debug, Default)]
pub struct FrameTable {
    frames: Vec<(u32, FrameDescriptor)>,
}

impl FrameTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the frame at instruction index `at`.
    pub fn record(&mut self, at: u32, frame: FrameDescriptor) -> EmitResult {
        if let Some((last_at, last_frame)) = self.frames.last() {
            if *last_at == at {
                if *last_frame == frame {
                    // Structurally identical, back-to-back: a no-op.
                    return Ok(());
                }
                return Err(EmitError::FrameConflict { at });
            }
        }
        self.frames.push((at, frame));
        Ok(())
    }

    /// Consume the table, yielding frames in program order.
    pub fn into_frames(self) -> Vec<(u32, FrameDescriptor)> {
        self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}
