//! The template page's sample step.

use brickbook_render::RenderBackend;

use crate::buffer::BufferSnapshot;
use crate::compile::compile_standalone_step;
use crate::diagnostics::Diagnostics;
use crate::error::{ModelError, Result};
use crate::layout::{layout_step, TextMetrics};
use crate::measure::{solve, Probe};
use crate::part::PartId;
use crate::registry::PartRegistry;
use crate::settings::BookSettings;
use crate::step::{Step, StepKind, StepStyle};

/// Sample step numbered 0 holding copies of the first `part_count`
/// placements of `root`. Copies carry no buffer membership.
pub fn template_step(registry: &PartRegistry, root: PartId, part_count: usize) -> Step {
    let mut step = Step::with_kind(
        0,
        StepKind::Template,
        BufferSnapshot::empty(),
        StepStyle::default(),
    );
    for placement in registry[root].all_placements().take(part_count) {
        let mut copy = placement.clone();
        copy.buffers = BufferSnapshot::empty();
        let listable = !registry[copy.part].primitive;
        step.add_placement(copy, listable);
    }
    step
}

/// Build, compile, measure and lay out the template step.
///
/// `registry` must already be compiled and measured.
pub fn build_template<B: RenderBackend + ?Sized>(
    registry: &PartRegistry,
    backend: &mut B,
    root: PartId,
    settings: &BookSettings,
    metrics: &dyn TextMetrics,
    diagnostics: &mut Diagnostics,
) -> Result<Step> {
    let _span = tracing::info_span!("template").entered();
    let mut step = template_step(registry, root, settings.template.part_count);
    compile_standalone_step(registry, backend, &mut step)?;

    let label = step.label(&registry[root].filename);
    let list = step
        .csi
        .cumulative_list()
        .ok_or_else(|| ModelError::Uncompiled(label.clone()))?;
    let probe = Probe {
        label,
        list,
        insets: false,
    };
    let (results, _) = solve(
        backend,
        std::slice::from_ref(&probe),
        &settings.template.surface_sizes,
        &settings.measure.view(),
        diagnostics,
    );
    if let Some(m) = results.into_iter().next().flatten() {
        step.csi.set_dimensions(m.csi_dimensions());
    }

    layout_step(registry, &mut step, &settings.layout, metrics);
    tracing::debug!(parts = step.placements.len(), "template step built");
    Ok(step)
}
