//! Serializable summary of a built book, for tooling and inspection.

use serde::Serialize;

use crate::diagnostics::Diagnostic;
use crate::error::Result;
use crate::geometry::{Point, Rect};
use crate::measure::MeasureReport;
use crate::part::PartDimensions;
use crate::registry::PartRegistry;
use crate::step::{CsiDimensions, Step, StepKind};

/// Everything known about a book after the passes that ran.
#[derive(Debug, Clone, Serialize)]
pub struct BookReport {
    /// Root model filename.
    pub model: String,
    /// Number of loaded definitions, primitives included.
    pub definitions: usize,
    /// Every measurable part.
    pub parts: Vec<PartReport>,
    /// Every step of every definition with steps, in CSI order.
    pub steps: Vec<StepReport>,
    /// Template sample step, if built.
    pub template: Option<StepReport>,
    /// Last solver pass, if dimensions were measured rather than cached.
    pub measure: Option<MeasureReport>,
    /// Every diagnostic recorded in the session.
    pub diagnostics: Vec<Diagnostic>,
}

impl BookReport {
    /// Pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// One part's thumbnail geometry.
#[derive(Debug, Clone, Serialize)]
pub struct PartReport {
    /// Filename.
    pub file: String,
    /// Display name.
    pub name: String,
    /// Measured dimensions; `None` when never measured.
    pub dimensions: Option<PartDimensions>,
}

/// One laid-out step.
#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    /// Owning definition.
    pub file: String,
    /// Step number.
    pub number: u32,
    /// Normal or template.
    pub kind: StepKind,
    /// Placements in the step.
    pub placements: usize,
    /// Measured CSI dimensions.
    pub csi: Option<CsiDimensions>,
    /// CSI position on the page.
    pub csi_box: Option<Rect>,
    /// Step number label origin.
    pub number_anchor: Point,
    /// PLI box.
    pub pli_box: Rect,
    /// PLI contents.
    pub pli: Vec<PliItemReport>,
}

/// One PLI entry.
#[derive(Debug, Clone, Serialize)]
pub struct PliItemReport {
    /// Part filename.
    pub part: String,
    /// Quantity.
    pub count: u32,
    /// Thumbnail bottom-left corner.
    pub corner: Point,
    /// Label origin.
    pub label_corner: Point,
}

impl StepReport {
    pub(crate) fn new(registry: &PartRegistry, file: &str, step: &Step) -> Self {
        Self {
            file: file.to_string(),
            number: step.number,
            kind: step.kind,
            placements: step.placements.len(),
            csi: step.csi.measured(),
            csi_box: step.csi.page_box,
            number_anchor: step.number_anchor,
            pli_box: step.pli.bounds,
            pli: step
                .pli
                .entries()
                .iter()
                .map(|entry| PliItemReport {
                    part: registry[entry.part].filename.clone(),
                    count: entry.count,
                    corner: entry.corner,
                    label_corner: entry.label_corner,
                })
                .collect(),
        }
    }
}
