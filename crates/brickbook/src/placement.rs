//! Part placements: one occurrence of a definition inside a parent.

use brickbook_ir::{ColorCode, PartLine, INHERIT_COLOR};
use brickbook_math::Transform;

use crate::buffer::BufferSnapshot;
use crate::part::PartId;

/// One instance of a part with its own color, transform and buffer context.
#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    /// Shared definition.
    pub part: PartId,
    /// Color override; `None` inherits the enclosing color.
    pub color: Option<ColorCode>,
    /// Placement transform; `None` keeps the parent's frame.
    pub transform: Option<Transform>,
    /// Drawn, but never listed or measured.
    pub ghost: bool,
    /// Drawn with inverted winding.
    pub inverted: bool,
    /// Inside a PLI-ignore block.
    pub pli_ignored: bool,
    /// Buffer stack active when the placement was added.
    pub buffers: BufferSnapshot,
}

impl Placement {
    /// Plain placement: inherited color, no transform, no buffers.
    pub fn new(part: PartId) -> Self {
        Self {
            part,
            color: None,
            transform: None,
            ghost: false,
            inverted: false,
            pli_ignored: false,
            buffers: BufferSnapshot::empty(),
        }
    }

    /// Build a placement from a classified part line.
    pub fn from_line(part: PartId, line: &PartLine, buffers: BufferSnapshot) -> Self {
        Self {
            part,
            color: (line.color != INHERIT_COLOR).then_some(line.color),
            transform: line.transform.map(|t| {
                Transform::from_placement([t.position.x, t.position.y, t.position.z], t.rows)
            }),
            ghost: line.ghost,
            inverted: line.invert,
            pli_ignored: false,
            buffers,
        }
    }

    /// Whether this placement is drawn under the `active` buffer context.
    ///
    /// Placements outside any buffer are always drawn; the others only when
    /// `active` is exactly the stack they were added under.
    pub fn should_render(&self, active: &BufferSnapshot) -> bool {
        self.buffers.is_empty() || self.buffers == *active
    }

    /// Whether the placement counts toward its step's parts list.
    pub fn is_listed(&self) -> bool {
        !self.ghost && !self.pli_ignored
    }
}
