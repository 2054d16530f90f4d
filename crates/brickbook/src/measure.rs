//! Dimension solver: measures parts and CSIs by rendering them offscreen.
//!
//! Every pending element is rendered, centered, to a square surface. Elements
//! whose image touches the surface edge are retried on the next, larger
//! surface; the rest get their pixel bounding box recorded. One surface is
//! alive at a time and it is released before the next tier starts.

use std::collections::HashSet;

use brickbook_render::{acquire_surface, ListId, PixelBuffer, RenderBackend, View};
use serde::{Deserialize, Serialize};

use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::error::{ModelError, Result};
use crate::geometry::Point;
use crate::part::{PartDimensions, PartId};
use crate::registry::PartRegistry;
use crate::step::CsiDimensions;

/// Dimension solver parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeasureSettings {
    /// Square surface sizes to try, ascending.
    pub surface_sizes: Vec<u32>,
    /// Camera elevation in degrees.
    pub view_x_degrees: f64,
    /// Camera azimuth in degrees.
    pub view_y_degrees: f64,
    /// Pixels per model unit.
    pub scale: f64,
}

impl Default for MeasureSettings {
    fn default() -> Self {
        Self {
            surface_sizes: vec![256, 512, 1024, 2048],
            view_x_degrees: brickbook_math::DEFAULT_VIEW_X_DEGREES,
            view_y_degrees: brickbook_math::DEFAULT_VIEW_Y_DEGREES,
            scale: 1.0,
        }
    }
}

impl MeasureSettings {
    /// Validate settings.
    pub fn validate(&self) -> Result<()> {
        validate_tiers("surface_sizes", &self.surface_sizes)?;
        if !(self.scale > 0.0 && self.scale.is_finite()) {
            return Err(ModelError::settings("scale must be positive"));
        }
        Ok(())
    }

    /// Camera described by these settings.
    pub fn view(&self) -> View {
        View::new(self.view_x_degrees, self.view_y_degrees, self.scale)
    }
}

/// Check a tier list is non-empty and strictly ascending.
pub(crate) fn validate_tiers(name: &str, sizes: &[u32]) -> Result<()> {
    if sizes.is_empty() {
        return Err(ModelError::settings(format!("{name} must not be empty")));
    }
    if sizes[0] == 0 {
        return Err(ModelError::settings(format!("{name} must be positive")));
    }
    if sizes.windows(2).any(|w| w[0] >= w[1]) {
        return Err(ModelError::settings(format!("{name} must be strictly ascending")));
    }
    Ok(())
}

/// Something the solver measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Element {
    /// A part thumbnail.
    Part(PartId),
    /// The CSI of `steps[step]` of definition `part`.
    Csi {
        /// Owning definition.
        part: PartId,
        /// Index into its steps.
        step: usize,
    },
}

impl Element {
    /// Human-readable name used in logs, diagnostics and the cache.
    pub fn label(&self, registry: &PartRegistry) -> String {
        match *self {
            Element::Part(id) => registry[id].filename.clone(),
            Element::Csi { part, step } => {
                let def = &registry[part];
                def.steps[step].label(&def.filename)
            }
        }
    }

    fn list(&self, registry: &PartRegistry) -> Option<ListId> {
        match *self {
            Element::Part(id) => registry[id].list(),
            Element::Csi { part, step } => registry[part].steps[step].csi.cumulative_list(),
        }
    }

    pub(crate) fn is_measured(&self, registry: &PartRegistry) -> bool {
        match *self {
            Element::Part(id) => registry[id].measured().is_some(),
            Element::Csi { part, step } => registry[part].steps[step].csi.measured().is_some(),
        }
    }

    pub(crate) fn apply(&self, registry: &mut PartRegistry, m: Measurement) {
        match *self {
            Element::Part(id) => registry[id].set_dimensions(m.part_dimensions()),
            Element::Csi { part, step } => {
                registry[part].steps[step].csi.set_dimensions(m.csi_dimensions())
            }
        }
    }
}

/// Pixel geometry read from one render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Measurement {
    /// Bounding box width.
    pub width: i32,
    /// Bounding box height.
    pub height: i32,
    /// Box center relative to the surface center.
    pub center: Point,
    /// Empty pixels along the bottom row, from the left.
    pub left_inset: i32,
    /// Empty pixels along the left column, from the bottom.
    pub bottom_inset: i32,
}

impl Measurement {
    /// Result recorded for a blank render.
    pub const DEGENERATE: Self = Self {
        width: 1,
        height: 1,
        center: Point::new(0, 0),
        left_inset: 0,
        bottom_inset: 0,
    };

    /// As part dimensions.
    pub fn part_dimensions(&self) -> PartDimensions {
        PartDimensions {
            width: self.width,
            height: self.height,
            center: self.center,
            left_inset: self.left_inset,
            bottom_inset: self.bottom_inset,
        }
    }

    /// As CSI dimensions (insets dropped).
    pub fn csi_dimensions(&self) -> CsiDimensions {
        CsiDimensions {
            width: self.width,
            height: self.height,
            center: self.center,
        }
    }
}

/// Outcome of inspecting one render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fit {
    /// No content at all.
    Blank,
    /// Content touches the surface edge.
    OutOfFrame,
    /// Content fits.
    Fits(Measurement),
}

/// Inspect a rendered surface. Insets are only computed when `insets` is set.
pub fn fit(pixels: &PixelBuffer, insets: bool) -> Fit {
    let Some(b) = pixels.content_bounds() else {
        return Fit::Blank;
    };
    let (w, h) = (pixels.width(), pixels.height());
    if b.x == 0 || b.y == 0 || b.right() >= w || b.bottom() >= h {
        return Fit::OutOfFrame;
    }

    let width = b.width as i32;
    let height = b.height as i32;
    let center = Point::new(
        b.x as i32 + width / 2 - w as i32 / 2,
        b.y as i32 + height / 2 - h as i32 / 2,
    );

    let (left_inset, bottom_inset) = if insets {
        let bottom_row = b.bottom() - 1;
        let left = (b.x..b.right())
            .take_while(|&x| pixels.is_background(x, bottom_row))
            .count();
        let bottom = (b.y..b.bottom())
            .rev()
            .take_while(|&y| pixels.is_background(b.x, y))
            .count();
        (left as i32, bottom as i32)
    } else {
        (0, 0)
    };

    Fit::Fits(Measurement {
        width,
        height,
        center,
        left_inset,
        bottom_inset,
    })
}

/// Summary of one solver pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MeasureReport {
    /// Surface sizes actually tried, in order.
    pub tiers: Vec<u32>,
    /// Elements that received dimensions.
    pub measured: usize,
    /// Labels of elements left with degenerate dimensions.
    pub failures: Vec<String>,
}

/// One list to measure.
pub(crate) struct Probe {
    pub label: String,
    pub list: ListId,
    pub insets: bool,
}

/// Run the tiered render-and-scan loop over `probes`.
pub(crate) fn solve<B: RenderBackend + ?Sized>(
    backend: &mut B,
    probes: &[Probe],
    sizes: &[u32],
    view: &View,
    diagnostics: &mut Diagnostics,
) -> (Vec<Option<Measurement>>, MeasureReport) {
    let mut results = vec![None; probes.len()];
    let mut report = MeasureReport::default();
    let mut pending: Vec<usize> = (0..probes.len()).collect();

    for &size in sizes {
        if pending.is_empty() {
            break;
        }
        let mut surface = match acquire_surface(backend, size, size) {
            Ok(surface) => surface,
            Err(err) => {
                tracing::warn!(size, %err, "cannot allocate measuring surface; stopping escalation");
                break;
            }
        };
        report.tiers.push(size);

        let mut deferred = Vec::new();
        for i in pending {
            let probe = &probes[i];
            match surface.capture(probe.list, view) {
                Ok(pixels) => match fit(&pixels, probe.insets) {
                    Fit::Fits(m) => results[i] = Some(m),
                    Fit::OutOfFrame => deferred.push(i),
                    Fit::Blank => {
                        tracing::debug!(element = %probe.label, "blank render, using degenerate size");
                        results[i] = Some(Measurement::DEGENERATE);
                    }
                },
                Err(err) => {
                    diagnostics.push(Diagnostic::RenderFailed {
                        element: probe.label.clone(),
                        message: err.to_string(),
                    });
                    report.failures.push(probe.label.clone());
                }
            }
        }
        drop(surface);
        tracing::debug!(size, deferred = deferred.len(), "measuring tier finished");
        pending = deferred;
    }

    let largest = report.tiers.last().copied().unwrap_or(0);
    for i in pending {
        diagnostics.push(Diagnostic::MeasurementOverflow {
            element: probes[i].label.clone(),
            largest_surface: largest,
        });
        report.failures.push(probes[i].label.clone());
    }
    report.measured = results.iter().filter(|r| r.is_some()).count();
    (results, report)
}

/// Every element of the book that needs dimensions.
///
/// Non-primitive definitions that are the root or referenced by a non-ghost
/// placement, then every CSI reachable from the root, a submodel's CSIs
/// ahead of the step that first uses it.
pub fn measurable_elements(registry: &PartRegistry, root: PartId) -> Vec<Element> {
    let mut listed = HashSet::from([root]);
    for (_, def) in registry.iter() {
        listed.extend(def.all_placements().filter(|p| !p.ghost).map(|p| p.part));
    }

    let mut elements: Vec<Element> = registry
        .iter()
        .filter(|(id, def)| !def.primitive && listed.contains(id))
        .map(|(id, _)| Element::Part(id))
        .collect();

    let mut visited = HashSet::new();
    collect_csis(registry, root, &mut visited, &mut elements);
    elements
}

fn collect_csis(
    registry: &PartRegistry,
    id: PartId,
    visited: &mut HashSet<PartId>,
    out: &mut Vec<Element>,
) {
    for (index, step) in registry[id].steps.iter().enumerate() {
        for placement in &step.placements {
            if visited.insert(placement.part) && registry[placement.part].has_steps() {
                collect_csis(registry, placement.part, visited, out);
            }
        }
        out.push(Element::Csi { part: id, step: index });
    }
}

/// Measure `elements`, writing dimensions back into the registry.
///
/// Elements must be compiled. Elements that never fit keep degenerate
/// dimensions and are listed in the report's failures.
pub fn measure_elements<B: RenderBackend + ?Sized>(
    registry: &mut PartRegistry,
    backend: &mut B,
    elements: &[Element],
    settings: &MeasureSettings,
    diagnostics: &mut Diagnostics,
) -> Result<MeasureReport> {
    let _span = tracing::info_span!("measure", elements = elements.len()).entered();

    let probes = elements
        .iter()
        .map(|element| {
            let label = element.label(registry);
            let list = element
                .list(registry)
                .ok_or_else(|| ModelError::Uncompiled(label.clone()))?;
            Ok(Probe {
                label,
                list,
                insets: matches!(element, Element::Part(_)),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let (results, report) = solve(
        backend,
        &probes,
        &settings.surface_sizes,
        &settings.view(),
        diagnostics,
    );
    for (element, result) in elements.iter().zip(results) {
        if let Some(m) = result {
            element.apply(registry, m);
        }
    }

    tracing::info!(
        measured = report.measured,
        failed = report.failures.len(),
        tiers = ?report.tiers,
        "dimensions measured"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use brickbook_math::{Point3, Transform};
    use brickbook_render::SoftwareRenderer;

    fn flat() -> View {
        View {
            rotation: Transform::identity(),
            scale: 1.0,
        }
    }

    fn polygon_list(r: &mut SoftwareRenderer, points: &[(f64, f64)]) -> ListId {
        let list = r.begin_list().unwrap();
        let pts: Vec<Point3> = points.iter().map(|&(x, y)| Point3::new(x, y, 0.0)).collect();
        r.draw_polygon(4, &pts);
        r.end_list().unwrap();
        list
    }

    fn probe(label: &str, list: ListId) -> Probe {
        Probe {
            label: label.into(),
            list,
            insets: true,
        }
    }

    #[test]
    fn test_fit_centered_rect() {
        let mut r = SoftwareRenderer::new();
        let list = polygon_list(&mut r, &[(-10.0, -5.0), (10.0, -5.0), (10.0, 5.0), (-10.0, 5.0)]);
        let s = r.create_surface(64, 64).unwrap();
        r.render(s, list, &flat()).unwrap();
        let pixels = r.read_pixels(s).unwrap();

        match fit(&pixels, true) {
            Fit::Fits(m) => {
                assert_eq!((m.width, m.height), (20, 10));
                assert_eq!(m.center, Point::new(0, 0));
                assert_eq!((m.left_inset, m.bottom_inset), (0, 0));
            }
            other => panic!("expected fit, got {other:?}"),
        }
    }

    #[test]
    fn test_fit_reports_empty_corner() {
        let mut r = SoftwareRenderer::new();
        // Top-left, top-right, bottom-right: the bottom-left corner is empty.
        let list = polygon_list(&mut r, &[(-10.0, -10.0), (10.0, -10.0), (10.0, 10.0)]);
        let s = r.create_surface(64, 64).unwrap();
        r.render(s, list, &flat()).unwrap();

        match fit(&r.read_pixels(s).unwrap(), true) {
            Fit::Fits(m) => {
                assert!(m.left_inset > 10, "left inset {}", m.left_inset);
                assert!(m.bottom_inset > 10, "bottom inset {}", m.bottom_inset);
            }
            other => panic!("expected fit, got {other:?}"),
        }
    }

    #[test]
    fn test_fit_blank_and_out_of_frame() {
        assert_eq!(fit(&PixelBuffer::new(8, 8), true), Fit::Blank);

        let mut pixels = PixelBuffer::new(8, 8);
        pixels.set_pixel(0, 4, [1, 1, 1, 255]);
        assert_eq!(fit(&pixels, false), Fit::OutOfFrame);
    }

    #[test]
    fn test_solve_escalates_in_order() {
        let mut r = SoftwareRenderer::new();
        let small = polygon_list(&mut r, &[(-4.0, -4.0), (4.0, -4.0), (4.0, 4.0), (-4.0, 4.0)]);
        let large = polygon_list(&mut r, &[(-20.0, -20.0), (20.0, -20.0), (20.0, 20.0), (-20.0, 20.0)]);
        let mut diags = Diagnostics::new();

        let probes = [probe("small", small), probe("large", large)];
        let (results, report) = solve(&mut r, &probes, &[16, 32, 64], &flat(), &mut diags);

        assert_eq!(report.tiers, vec![16, 32, 64]);
        assert_eq!(r.surface_history(), &[(16, 16), (32, 32), (64, 64)]);
        assert_eq!(r.live_surfaces(), 0);
        assert_eq!(results[0].map(|m| m.width), Some(8));
        assert_eq!(results[1].map(|m| m.width), Some(40));
        assert_eq!(report.measured, 2);
        assert!(diags.is_empty());
    }

    #[test]
    fn test_solve_overflow_keeps_others() {
        let mut r = SoftwareRenderer::new();
        let small = polygon_list(&mut r, &[(-4.0, -4.0), (4.0, -4.0), (4.0, 4.0), (-4.0, 4.0)]);
        let huge = polygon_list(&mut r, &[(-99.0, -99.0), (99.0, -99.0), (99.0, 99.0), (-99.0, 99.0)]);
        let mut diags = Diagnostics::new();

        let probes = [probe("huge.dat", huge), probe("small.dat", small)];
        let (results, report) = solve(&mut r, &probes, &[16, 32], &flat(), &mut diags);

        assert!(results[0].is_none());
        assert!(results[1].is_some());
        assert_eq!(report.failures, vec!["huge.dat".to_string()]);
        assert_eq!(
            diags.entries(),
            &[Diagnostic::MeasurementOverflow {
                element: "huge.dat".into(),
                largest_surface: 32
            }]
        );
        assert_eq!(r.live_surfaces(), 0);
    }

    #[test]
    fn test_validate_settings() {
        assert!(MeasureSettings::default().validate().is_ok());
        let mut s = MeasureSettings::default();
        s.surface_sizes = vec![512, 256];
        assert!(s.validate().is_err());
        s.surface_sizes = vec![];
        assert!(s.validate().is_err());
        s = MeasureSettings {
            scale: 0.0,
            ..Default::default()
        };
        assert!(s.validate().is_err());
    }
}
