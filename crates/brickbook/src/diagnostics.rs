//! Recoverable problems found while building a book.
//!
//! Nothing here aborts a pass. Every entry is logged through `tracing` at the
//! moment it is recorded and kept for the final report.

use brickbook_ir::BufferId;
use serde::Serialize;
use thiserror::Error;

/// One recoverable problem.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// A retrieve named a buffer other than the most recently stored one.
    #[error("{file}: step {step} retrieves buffer {requested} but the last stored buffer is {}", top.map(|b| b.to_string()).unwrap_or_else(|| "none".into()))]
    BufferProtocol {
        /// Definition being parsed.
        file: String,
        /// Step number at the retrieve.
        step: u32,
        /// Buffer named by the retrieve.
        requested: BufferId,
        /// Buffer on top of the stack, if any.
        top: Option<BufferId>,
    },

    /// A buffer was retrieved after parts were already added to the step.
    #[error("{file}: buffer {buffer} restored in step {step} after adding parts; those parts will never be drawn")]
    BufferOrdering {
        /// Definition being parsed.
        file: String,
        /// Step number at the retrieve.
        step: u32,
        /// Buffer retrieved.
        buffer: BufferId,
    },

    /// A step boundary closed a step without parts; the step was dropped.
    #[error("{file}: empty step {step} ignored")]
    EmptyStep {
        /// Definition being parsed.
        file: String,
        /// Number of the dropped step.
        step: u32,
    },

    /// A nested reference could not be resolved; the placement was dropped.
    #[error("{file}: could not find {part}, ignoring")]
    MissingPart {
        /// Definition containing the reference.
        file: String,
        /// Missing filename.
        part: String,
    },

    /// Unbalanced PLI-ignore markers.
    #[error("{file}: {}", if *begin { "PLI ignore begun when already begun" } else { "PLI ignore ended when none had begun" })]
    PliIgnore {
        /// Definition being parsed.
        file: String,
        /// True for a redundant begin, false for a stray end.
        begin: bool,
    },

    /// An element touched the surface edge even at the largest tier.
    #[error("{element} does not fit in a {largest_surface}px surface; keeping degenerate dimensions")]
    MeasurementOverflow {
        /// Part filename or CSI label.
        element: String,
        /// Largest surface size tried.
        largest_surface: u32,
    },

    /// Rendering an element failed; it keeps degenerate dimensions.
    #[error("{element} could not be rendered: {message}")]
    RenderFailed {
        /// Part filename or CSI label.
        element: String,
        /// Backend error message.
        message: String,
    },

    /// The dimension cache was rejected and everything was re-measured.
    #[error("dimension cache rejected: {reason}")]
    StaleCache {
        /// Why the cache was rejected.
        reason: String,
    },

    /// A parts list contains a part with no measured dimensions.
    #[error("laying out unmeasured part {part}")]
    UnmeasuredPart {
        /// Part filename.
        part: String,
    },
}

/// Ordered collection of diagnostics for one session.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record and log a diagnostic.
    pub fn push(&mut self, diagnostic: Diagnostic) {
        tracing::warn!("{diagnostic}");
        self.entries.push(diagnostic);
    }

    /// All entries in the order they were recorded.
    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    /// Iterate over entries.
    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.entries.iter()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries matching `predicate`.
    pub fn count(&self, predicate: impl Fn(&Diagnostic) -> bool) -> usize {
        self.entries.iter().filter(|d| predicate(d)).count()
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
