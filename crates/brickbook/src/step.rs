//! Steps and the two images each step owns: the construction-step image
//! (CSI) and the parts list (PLI).

use std::collections::HashMap;

use brickbook_render::ListId;
use serde::{Deserialize, Serialize};

use crate::buffer::BufferSnapshot;
use crate::geometry::{Font, Point, Rect};
use crate::part::PartId;
use crate::placement::Placement;

/// Whether a step belongs to the book or to its template page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepKind {
    /// A regular numbered step.
    Normal,
    /// The sample step shown on the template page.
    Template,
}

/// Measured pixel geometry of a CSI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsiDimensions {
    /// Width in pixels.
    pub width: i32,
    /// Height in pixels.
    pub height: i32,
    /// Offset of the image center from the surface center.
    pub center: Point,
}

impl CsiDimensions {
    /// What an unmeasured CSI reads as.
    pub const DEGENERATE: Self = Self {
        width: 1,
        height: 1,
        center: Point::new(0, 0),
    };
}

/// Construction-step image: the model as built through one step.
#[derive(Debug, Clone)]
pub struct Csi {
    /// Buffer stack active in the step, kept current while the step is parsed.
    pub buffers: BufferSnapshot,
    pub(crate) lists: Vec<(ListId, BufferSnapshot)>,
    pub(crate) cumulative: Option<ListId>,
    pub(crate) dimensions: Option<CsiDimensions>,
    /// Position on the page, once laid out.
    pub page_box: Option<Rect>,
}

impl Csi {
    fn new(buffers: BufferSnapshot) -> Self {
        Self {
            buffers,
            lists: Vec::new(),
            cumulative: None,
            dimensions: None,
            page_box: None,
        }
    }

    /// One `(list, configuration)` pair per buffer configuration.
    pub fn lists(&self) -> &[(ListId, BufferSnapshot)] {
        &self.lists
    }

    /// The list compiled for the empty buffer context.
    pub fn base_list(&self) -> Option<ListId> {
        self.lists.first().map(|(list, _)| *list)
    }

    /// The list compiled for exactly `config`.
    pub fn list_for(&self, config: &BufferSnapshot) -> Option<ListId> {
        if config.is_empty() {
            return self.base_list();
        }
        self.lists
            .iter()
            .find(|(_, buffers)| buffers == config)
            .map(|(list, _)| *list)
    }

    /// The list drawing every step up to and including this one.
    pub fn cumulative_list(&self) -> Option<ListId> {
        self.cumulative
    }

    /// Measured dimensions, if any.
    pub fn measured(&self) -> Option<CsiDimensions> {
        self.dimensions
    }

    /// Measured dimensions, or [`CsiDimensions::DEGENERATE`].
    pub fn dimensions(&self) -> CsiDimensions {
        self.dimensions.unwrap_or(CsiDimensions::DEGENERATE)
    }

    /// Record measured dimensions.
    pub fn set_dimensions(&mut self, dimensions: CsiDimensions) {
        self.dimensions = Some(dimensions);
    }
}

/// One distinct part in a parts list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PliEntry {
    /// Listed definition.
    pub part: PartId,
    /// How many listed placements reference it in this step (at least 1).
    pub count: u32,
    /// Bottom-left corner of the thumbnail.
    pub corner: Point,
    /// Baseline origin of the quantity label.
    pub label_corner: Point,
}

/// Parts list: the distinct parts a step adds, in first-seen order.
#[derive(Debug, Clone)]
pub struct Pli {
    entries: Vec<PliEntry>,
    index: HashMap<PartId, usize>,
    /// Bounding box; origin set by the owner before layout.
    pub bounds: Rect,
    /// Font of the `"<count>x"` labels.
    pub label_font: Font,
}

impl Pli {
    /// Empty list with its box at `origin`.
    pub fn new(origin: Point, label_font: Font) -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
            bounds: Rect::new(origin.x, origin.y, 0, 0),
            label_font,
        }
    }

    /// Count one more placement of `part`.
    pub fn add(&mut self, part: PartId) {
        match self.index.get(&part) {
            Some(&i) => self.entries[i].count += 1,
            None => {
                self.index.insert(part, self.entries.len());
                self.entries.push(PliEntry {
                    part,
                    count: 1,
                    corner: Point::default(),
                    label_corner: Point::default(),
                });
            }
        }
    }

    /// Entries in insertion order.
    pub fn entries(&self) -> &[PliEntry] {
        &self.entries
    }

    pub(crate) fn entries_mut(&mut self) -> &mut [PliEntry] {
        &mut self.entries
    }

    /// Count for `part`, 0 when absent.
    pub fn count(&self, part: PartId) -> u32 {
        self.index.get(&part).map(|&i| self.entries[i].count).unwrap_or(0)
    }

    /// Number of distinct parts.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the step lists no parts.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Layout constants a step is created with.
#[derive(Debug, Clone)]
pub struct StepStyle {
    /// Gap between page edge, PLI and step number.
    pub gap: i32,
    /// Step number font.
    pub number_font: Font,
    /// PLI quantity label font.
    pub label_font: Font,
}

impl Default for StepStyle {
    fn default() -> Self {
        Self {
            gap: 20,
            number_font: Font::new(20.0),
            label_font: Font::new(14.0).bold(),
        }
    }
}

/// One numbered stage of assembly.
///
/// The previous step is the one before it in the owning definition's list.
#[derive(Debug, Clone)]
pub struct Step {
    /// Sequence number; 1-based for normal steps, 0 for the template.
    pub number: u32,
    /// Normal or template, fixed at construction.
    pub kind: StepKind,
    /// Placements added in this step, in order.
    pub placements: Vec<Placement>,
    /// Buffer stack when the step was created.
    pub buffers: BufferSnapshot,
    /// The step's model image.
    pub csi: Csi,
    /// The step's parts list.
    pub pli: Pli,
    /// Baseline origin of the step number label.
    pub number_anchor: Point,
    /// Layout constants.
    pub style: StepStyle,
}

impl Step {
    /// A normal step.
    pub fn new(number: u32, buffers: BufferSnapshot) -> Self {
        Self::with_kind(number, StepKind::Normal, buffers, StepStyle::default())
    }

    /// A step of the given kind and style.
    pub fn with_kind(number: u32, kind: StepKind, buffers: BufferSnapshot, style: StepStyle) -> Self {
        let pli = Pli::new(Point::new(style.gap, style.gap), style.label_font.clone());
        Self {
            number,
            kind,
            placements: Vec::new(),
            csi: Csi::new(buffers.clone()),
            buffers,
            pli,
            number_anchor: Point::default(),
            style,
        }
    }

    /// Add a placement; listed placements of non-primitive parts enter the PLI.
    pub fn add_placement(&mut self, placement: Placement, listable: bool) {
        if listable && placement.is_listed() {
            self.pli.add(placement.part);
        }
        self.placements.push(placement);
    }

    /// True when nothing was added.
    pub fn is_empty(&self) -> bool {
        self.placements.is_empty()
    }

    /// True for the template sample step.
    pub fn is_template(&self) -> bool {
        self.kind == StepKind::Template
    }

    /// Label used for this step's CSI in logs and caches.
    pub fn label(&self, filename: &str) -> String {
        format!("{filename} - step {}", self.number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    fn ids(n: usize) -> Vec<PartId> {
        let mut map: SlotMap<PartId, ()> = SlotMap::with_key();
        (0..n).map(|_| map.insert(())).collect()
    }

    #[test]
    fn test_pli_counts_in_insertion_order() {
        let ids = ids(3);
        let mut step = Step::new(1, BufferSnapshot::empty());
        for &id in &[ids[2], ids[0], ids[2], ids[2]] {
            step.add_placement(Placement::new(id), true);
        }
        let mut ghost = Placement::new(ids[1]);
        ghost.ghost = true;
        step.add_placement(ghost, true);
        step.add_placement(Placement::new(ids[1]), false);

        assert_eq!(step.placements.len(), 6);
        let parts: Vec<_> = step.pli.entries().iter().map(|e| (e.part, e.count)).collect();
        assert_eq!(parts, vec![(ids[2], 3), (ids[0], 1)]);
        assert_eq!(step.pli.count(ids[1]), 0);
    }

    #[test]
    fn test_step_defaults() {
        let step = Step::new(4, BufferSnapshot::empty());
        assert_eq!(step.kind, StepKind::Normal);
        assert!(step.is_empty());
        assert_eq!(step.pli.bounds.origin(), Point::new(20, 20));
        assert_eq!(step.csi.dimensions(), CsiDimensions::DEGENERATE);
        assert_eq!(step.label("house.ldr"), "house.ldr - step 4");
    }

    #[test]
    fn test_csi_list_lookup() {
        use crate::buffer::BufferEntry;
        let mut csi = Csi::new(BufferSnapshot::empty());
        assert!(csi.base_list().is_none());
        let active = BufferSnapshot::from_entries([BufferEntry { buffer: 5, step: 2 }]);
        csi.lists = vec![(ListId(3), BufferSnapshot::empty()), (ListId(4), active.clone())];
        assert_eq!(csi.list_for(&BufferSnapshot::empty()), Some(ListId(3)));
        assert_eq!(csi.list_for(&active), Some(ListId(4)));
        let other = BufferSnapshot::from_entries([BufferEntry { buffer: 6, step: 2 }]);
        assert_eq!(csi.list_for(&other), None);
    }
}
