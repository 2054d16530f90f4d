//! Buffer exchange: the LIFO stack of stored optional-part contexts.
//!
//! A part file can *store* the current model state into a numbered buffer,
//! add some parts, and later *retrieve* the buffer again. Parts added while a
//! buffer is stored are only drawn when the rendered context matches the
//! exact stack they were added under.

use brickbook_ir::BufferId;
use serde::Serialize;

/// One stored buffer: which buffer, and the step it was stored in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct BufferEntry {
    /// Buffer id.
    pub buffer: BufferId,
    /// Step number that was current when the buffer was stored.
    pub step: u32,
}

/// An immutable copy of a buffer stack.
///
/// Placements, steps and CSIs each keep their own snapshot; later changes
/// to the live [`BufferStack`] never reach them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct BufferSnapshot(Vec<BufferEntry>);

impl BufferSnapshot {
    /// The empty context.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Snapshot holding exactly `entries`, bottom first.
    pub fn from_entries(entries: impl IntoIterator<Item = BufferEntry>) -> Self {
        Self(entries.into_iter().collect())
    }

    /// Entries, bottom of the stack first.
    pub fn entries(&self) -> &[BufferEntry] {
        &self.0
    }

    /// True when no buffer is stored.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of stored buffers.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Every prefix of this snapshot, shortest first: `[]`, `[b1]`, `[b1, b2]`, ...
    ///
    /// These are the buffer configurations a CSI compiles one list for.
    pub fn configurations(&self) -> Vec<BufferSnapshot> {
        (0..=self.0.len())
            .map(|n| BufferSnapshot(self.0[..n].to_vec()))
            .collect()
    }
}

/// Returned when a retrieve does not name the top of the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferMismatch {
    /// Buffer the retrieve named.
    pub requested: BufferId,
    /// Buffer actually on top, `None` for an empty stack.
    pub top: Option<BufferId>,
}

/// The live stack for one definition's parse.
#[derive(Debug, Clone, Default)]
pub struct BufferStack {
    entries: Vec<BufferEntry>,
}

impl BufferStack {
    /// Create an empty stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Push `buffer`, stored during step `step`.
    pub fn store(&mut self, buffer: BufferId, step: u32) {
        self.entries.push(BufferEntry { buffer, step });
    }

    /// Pop `buffer`. The stack is left untouched unless `buffer` is on top.
    pub fn retrieve(&mut self, buffer: BufferId) -> Result<BufferEntry, BufferMismatch> {
        let top = self.entries.last().map(|e| e.buffer);
        let mismatch = BufferMismatch {
            requested: buffer,
            top,
        };
        if top != Some(buffer) {
            return Err(mismatch);
        }
        self.entries.pop().ok_or(mismatch)
    }

    /// Copy of the current state.
    pub fn snapshot(&self) -> BufferSnapshot {
        BufferSnapshot(self.entries.clone())
    }

    /// Number of stored buffers.
    pub fn depth(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
