//! Part definitions: the geometry and structure shared by every instance of a part.

use brickbook_ir::ColorCode;
use brickbook_math::Point3;
use brickbook_render::ListId;
use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

use crate::geometry::Point;
use crate::placement::Placement;
use crate::step::Step;

new_key_type! {
    /// Registry key of a [`PartDefinition`]. Two placements share a
    /// definition exactly when their ids are equal.
    pub struct PartId;
}

/// Kind of raw polygon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// Three corners.
    Triangle,
    /// Four corners.
    Quad,
}

/// A raw filled polygon owned by a definition.
#[derive(Debug, Clone, PartialEq)]
pub struct Primitive {
    /// Triangle or quad.
    pub shape: Shape,
    /// Color code; may be the inherit code.
    pub color: ColorCode,
    /// Corners in definition space.
    pub points: Vec<Point3>,
}

/// Measured pixel geometry of a part thumbnail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartDimensions {
    /// Width in pixels.
    pub width: i32,
    /// Height in pixels.
    pub height: i32,
    /// Offset of the image center from the surface center.
    pub center: Point,
    /// Empty pixels along the bottom row, from the left.
    pub left_inset: i32,
    /// Empty pixels along the left column, from the bottom.
    pub bottom_inset: i32,
}

impl PartDimensions {
    /// What an unmeasured part reads as.
    pub const DEGENERATE: Self = Self {
        width: 1,
        height: 1,
        center: Point::new(0, 0),
        left_inset: 0,
        bottom_inset: 0,
    };
}

impl Default for PartDimensions {
    fn default() -> Self {
        Self::DEGENERATE
    }
}

/// Everything identical across all instances of one part file.
#[derive(Debug, Clone)]
pub struct PartDefinition {
    /// Registry key (unique filename).
    pub filename: String,
    /// Display name.
    pub name: String,
    /// Primitives are never measured nor listed.
    pub primitive: bool,
    /// Raw polygons, in file order.
    pub primitives: Vec<Primitive>,
    /// Placements outside any step, in file order.
    pub placements: Vec<Placement>,
    /// Steps, numbered from 1.
    pub steps: Vec<Step>,
    pub(crate) list: Option<ListId>,
    pub(crate) dimensions: Option<PartDimensions>,
}

impl PartDefinition {
    /// An empty definition.
    pub fn new(filename: impl Into<String>) -> Self {
        let filename = filename.into();
        Self {
            name: filename.clone(),
            filename,
            primitive: false,
            primitives: Vec::new(),
            placements: Vec::new(),
            steps: Vec::new(),
            list: None,
            dimensions: None,
        }
    }

    /// Compiled display list, once [`compile_part`](crate::compile_part) ran.
    pub fn list(&self) -> Option<ListId> {
        self.list
    }

    /// True when the display list exists.
    pub fn is_compiled(&self) -> bool {
        self.list.is_some()
    }

    /// True for models and submodels.
    pub fn has_steps(&self) -> bool {
        !self.steps.is_empty()
    }

    /// Measured dimensions, if the solver (or a cache) provided them.
    pub fn measured(&self) -> Option<PartDimensions> {
        self.dimensions
    }

    /// Measured dimensions, or [`PartDimensions::DEGENERATE`].
    pub fn dimensions(&self) -> PartDimensions {
        self.dimensions.unwrap_or_default()
    }

    /// Record measured dimensions.
    pub fn set_dimensions(&mut self, dimensions: PartDimensions) {
        self.dimensions = Some(dimensions);
    }

    /// Every placement owned by this definition, step placements first.
    pub fn all_placements(&self) -> impl Iterator<Item = &Placement> {
        self.steps
            .iter()
            .flat_map(|s| s.placements.iter())
            .chain(self.placements.iter())
    }
}
