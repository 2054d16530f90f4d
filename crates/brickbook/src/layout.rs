//! Page layout: parts-list thumbnails and labels, step numbers, CSI boxes.
//!
//! The PLI is a single left-to-right row. Each quantity label tucks into the
//! empty bottom-left corner of its thumbnail when the part's insets leave
//! room for it; otherwise the thumbnail is pushed right to make space.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use unicode_width::UnicodeWidthStr;

use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::error::{ModelError, Result};
use crate::geometry::{Font, Point, Rect};
use crate::part::{PartDimensions, PartId};
use crate::registry::PartRegistry;
use crate::step::{CsiDimensions, Step};

/// Ink extents of a piece of text, as reported by a text engine.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TextExtents {
    /// Offset from the pen position to the left edge of the ink.
    pub x_bearing: f64,
    /// Offset from the baseline to the top of the ink (negative above).
    pub y_bearing: f64,
    /// Ink width.
    pub width: f64,
    /// Ink height.
    pub height: f64,
}

/// Source of text extents.
pub trait TextMetrics {
    /// Extents of `text` set in `font`.
    fn extents(&self, font: &Font, text: &str) -> TextExtents;
}

/// Font-free text metrics estimated from the font size and terminal column
/// widths. Good enough for layout when no text engine is available.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApproximateMetrics;

impl TextMetrics for ApproximateMetrics {
    fn extents(&self, font: &Font, text: &str) -> TextExtents {
        let advance = if font.bold { 0.64 } else { 0.58 };
        let height = if !text.is_empty() && text.chars().all(|c| c.is_lowercase()) {
            font.size * 0.52
        } else {
            font.size * 0.72
        };
        TextExtents {
            x_bearing: font.size * 0.05,
            y_bearing: -height,
            width: text.width() as f64 * font.size * advance,
            height,
        }
    }
}

/// Page and parts-list layout parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutSettings {
    /// Page width in pixels.
    pub page_width: i32,
    /// Page height in pixels.
    pub page_height: i32,
    /// Gap inside the PLI box, and between thumbnails.
    pub pli_gap: i32,
    /// Extra space kept between a quantity label and its thumbnail.
    pub label_padding: f64,
}

impl Default for LayoutSettings {
    fn default() -> Self {
        Self {
            page_width: 800,
            page_height: 600,
            pli_gap: 10,
            label_padding: 3.0,
        }
    }
}

impl LayoutSettings {
    /// Validate settings.
    pub fn validate(&self) -> Result<()> {
        if self.page_width <= 0 || self.page_height <= 0 {
            return Err(ModelError::settings("page size must be positive"));
        }
        if self.pli_gap < 0 {
            return Err(ModelError::settings("pli_gap must not be negative"));
        }
        if !(self.label_padding >= 0.0 && self.label_padding.is_finite()) {
            return Err(ModelError::settings("label_padding must not be negative"));
        }
        Ok(())
    }
}

/// One thumbnail to place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PliItem {
    /// Quantity shown in the label.
    pub count: u32,
    /// Thumbnail geometry.
    pub dimensions: PartDimensions,
}

/// Where one thumbnail and its label ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PliSlot {
    /// Bottom-left corner of the thumbnail.
    pub corner: Point,
    /// Baseline origin of the label.
    pub label_corner: Point,
}

/// Result of laying out one PLI row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PliLayout {
    /// One slot per item, in order.
    pub slots: Vec<PliSlot>,
    /// Box width.
    pub width: i32,
    /// Box height.
    pub height: i32,
}

/// Horizontal room the empty bottom-left corner gives a label of the given
/// `x` height. Negative when there is none.
pub fn label_offset(dimensions: &PartDimensions, x_height: f64, padding: f64) -> f64 {
    let left = f64::from(dimensions.left_inset);
    let bottom = f64::from(dimensions.bottom_inset);
    if dimensions.left_inset == 0 || dimensions.bottom_inset == 0 {
        return -padding;
    }
    let slope = left / bottom;
    (left - x_height / 2.0) / slope - padding
}

/// Lay out a PLI row with its top-left corner at `origin`.
pub fn layout_pli_row(
    origin: Point,
    items: &[PliItem],
    font: &Font,
    gap: i32,
    padding: f64,
    metrics: &dyn TextMetrics,
) -> PliLayout {
    let x_height = metrics.extents(font, "x").height;
    let mut overall_x = origin.x + gap;
    let mut height = 0;
    let mut slots = Vec::with_capacity(items.len());

    for item in items {
        let d = item.dimensions;
        let mut corner = Point::new(overall_x, origin.y + gap + d.height);

        let label = metrics.extents(font, &format!("{}x", item.count));
        let dx = label_offset(&d, x_height, padding);
        let mut label_corner = Point::new(
            (f64::from(corner.x) - label.width + dx.max(0.0)) as i32,
            (f64::from(corner.y) + x_height / 2.0) as i32,
        );

        if label_corner.x < overall_x {
            let shift = overall_x - label_corner.x;
            overall_x += shift;
            label_corner.x += shift;
            corner.x += shift;
        }
        label_corner.x = (f64::from(label_corner.x) - label.x_bearing) as i32;

        overall_x += d.width + gap;
        height = height.max(d.height + (x_height / 2.0) as i32 + gap * 2);
        slots.push(PliSlot {
            corner,
            label_corner,
        });
    }

    PliLayout {
        slots,
        width: if items.is_empty() { 0 } else { overall_x - origin.x },
        height,
    }
}

/// Baseline origin of a step number label: under the PLI, or at the top
/// gap when the step lists nothing.
pub fn number_anchor(
    pli_bounds: Rect,
    pli_empty: bool,
    number: u32,
    font: &Font,
    gap: i32,
    metrics: &dyn TextMetrics,
) -> Point {
    let ext = metrics.extents(font, &number.to_string());
    let x = f64::from(pli_bounds.x) - ext.x_bearing;
    let y = if pli_empty {
        f64::from(gap) - ext.y_bearing
    } else {
        f64::from(gap * 2 + pli_bounds.height) - ext.y_bearing
    };
    Point::new(x as i32, y as i32)
}

/// Page box of a CSI: centered on the page, shifted by its center offset.
pub fn place_csi(dimensions: CsiDimensions, page_width: i32, page_height: i32) -> Rect {
    let x = f64::from(page_width) / 2.0 - f64::from(dimensions.width) / 2.0;
    let y = f64::from(page_height) / 2.0 - f64::from(dimensions.height) / 2.0;
    Rect::new(
        x as i32 + dimensions.center.x,
        y as i32 + dimensions.center.y,
        dimensions.width,
        dimensions.height,
    )
}

/// Lay out one step in place. Returns listed parts that had no measured
/// dimensions.
pub fn layout_step(
    registry: &PartRegistry,
    step: &mut Step,
    settings: &LayoutSettings,
    metrics: &dyn TextMetrics,
) -> Vec<PartId> {
    let mut unmeasured = Vec::new();
    let items: Vec<PliItem> = step
        .pli
        .entries()
        .iter()
        .map(|entry| {
            let def = &registry[entry.part];
            if def.measured().is_none() {
                unmeasured.push(entry.part);
            }
            PliItem {
                count: entry.count,
                dimensions: def.dimensions(),
            }
        })
        .collect();

    let origin = step.pli.bounds.origin();
    let row = layout_pli_row(
        origin,
        &items,
        &step.pli.label_font,
        settings.pli_gap,
        settings.label_padding,
        metrics,
    );
    for (entry, slot) in step.pli.entries_mut().iter_mut().zip(&row.slots) {
        entry.corner = slot.corner;
        entry.label_corner = slot.label_corner;
    }
    step.pli.bounds = Rect::new(origin.x, origin.y, row.width, row.height);

    step.number_anchor = number_anchor(
        step.pli.bounds,
        step.pli.is_empty(),
        step.number,
        &step.style.number_font,
        step.style.gap,
        metrics,
    );
    step.csi.page_box = Some(place_csi(
        step.csi.dimensions(),
        settings.page_width,
        settings.page_height,
    ));
    unmeasured
}

/// Lay out every step of every definition in the registry.
///
/// Each part without dimensions is reported once as
/// [`Diagnostic::UnmeasuredPart`] and laid out as degenerate.
pub fn layout_all(
    registry: &mut PartRegistry,
    settings: &LayoutSettings,
    metrics: &dyn TextMetrics,
    diagnostics: &mut Diagnostics,
) {
    let _span = tracing::info_span!("layout").entered();
    let ids: Vec<PartId> = registry
        .iter()
        .filter(|(_, def)| def.has_steps())
        .map(|(id, _)| id)
        .collect();

    let mut reported = HashSet::new();
    let mut laid_out = 0;
    for id in ids {
        let mut steps = std::mem::take(&mut registry[id].steps);
        for step in &mut steps {
            for part in layout_step(registry, step, settings, metrics) {
                if reported.insert(part) {
                    diagnostics.push(Diagnostic::UnmeasuredPart {
                        part: registry[part].filename.clone(),
                    });
                }
            }
        }
        laid_out += steps.len();
        registry[id].steps = steps;
    }
    tracing::debug!(steps = laid_out, "layout finished");
}
