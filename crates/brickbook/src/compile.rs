//! Display-list compilation.
//!
//! Every definition and every CSI is compiled exactly once, dependencies
//! first, so geometry is issued once and called from everywhere it is used.

use std::collections::HashMap;

use brickbook_ir::ColorCode;
use brickbook_render::{ListId, RenderBackend, Winding};

use crate::buffer::BufferSnapshot;
use crate::error::{ModelError, Result};
use crate::part::PartId;
use crate::placement::Placement;
use crate::registry::PartRegistry;
use crate::step::Step;

/// Color and winding in effect for the list being recorded.
///
/// Each list starts from [`DrawState::default`]: everything inherited from
/// whoever calls it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrawState {
    /// Explicit color, `None` to inherit.
    pub color: Option<ColorCode>,
    /// Front-face winding.
    pub winding: Winding,
}

impl DrawState {
    /// State inside `placement`.
    pub fn enter(&self, placement: &Placement) -> DrawState {
        DrawState {
            color: placement.color.or(self.color),
            winding: if placement.inverted {
                self.winding.flipped()
            } else {
                self.winding
            },
        }
    }
}

/// Lists of already compiled definitions, looked up by id.
pub(crate) type ChildLists = HashMap<PartId, ListId>;

/// Record one list. The list is closed even when `body` fails.
fn record<B, F>(backend: &mut B, body: F) -> Result<ListId>
where
    B: RenderBackend + ?Sized,
    F: FnOnce(&mut B) -> Result<()>,
{
    let list = backend.begin_list()?;
    let result = body(backend);
    backend.end_list()?;
    result.map(|_| list)
}

/// Emit one placement: scoped state pushes around a call of its definition's list.
///
/// Nothing is pushed when the placement is not drawn under `active`.
pub(crate) fn emit_placement<B: RenderBackend + ?Sized>(
    backend: &mut B,
    registry: &PartRegistry,
    children: &ChildLists,
    placement: &Placement,
    active: &BufferSnapshot,
    state: DrawState,
) -> Result<()> {
    if !placement.should_render(active) {
        return Ok(());
    }
    let list = *children
        .get(&placement.part)
        .ok_or_else(|| ModelError::Uncompiled(registry[placement.part].filename.clone()))?;

    let inner = state.enter(placement);
    let push_color = inner.color != state.color;
    let push_winding = inner.winding != state.winding;

    if push_color {
        if let Some(color) = inner.color {
            backend.push_color(color);
        }
    }
    if push_winding {
        backend.push_winding(inner.winding);
    }
    if let Some(transform) = &placement.transform {
        backend.push_transform(transform);
    }

    backend.call_list(list);

    if placement.transform.is_some() {
        backend.pop_transform();
    }
    if push_winding {
        backend.pop_winding();
    }
    if push_color && inner.color.is_some() {
        backend.pop_color();
    }
    Ok(())
}

/// Compile the CSI of `steps[index]`: one list per buffer configuration of
/// its snapshot, then the cumulative list drawing every step up to it.
///
/// The cumulative list calls each earlier step's list for the current
/// configuration only. An earlier step compiled without that configuration
/// is left out entirely, so an image drawn while a buffer is active does not
/// contain steps from before the store. Steps drawn after the retrieve see
/// the full history again.
pub(crate) fn compile_csi<B: RenderBackend + ?Sized>(
    backend: &mut B,
    registry: &PartRegistry,
    children: &ChildLists,
    steps: &mut [Step],
    index: usize,
) -> Result<()> {
    if steps[index].csi.cumulative.is_some() {
        return Ok(());
    }

    let configurations = steps[index].csi.buffers.configurations();
    let mut lists = Vec::with_capacity(configurations.len());
    for config in configurations {
        let step = &steps[index];
        let list = record(backend, |b| {
            for placement in &step.placements {
                emit_placement(b, registry, children, placement, &config, DrawState::default())?;
            }
            Ok(())
        })?;
        lists.push((list, config));
    }
    steps[index].csi.lists = lists;

    let current = steps[index].csi.buffers.clone();
    let previous = &steps[..=index];
    let cumulative = record(backend, |b| {
        for step in previous {
            if let Some(list) = step.csi.list_for(&current) {
                b.call_list(list);
            }
        }
        Ok(())
    })?;
    steps[index].csi.cumulative = Some(cumulative);
    Ok(())
}

/// Ids of every definition `id` references directly.
fn referenced(registry: &PartRegistry, id: PartId) -> Vec<PartId> {
    let mut seen = Vec::new();
    for placement in registry[id].all_placements() {
        if !seen.contains(&placement.part) {
            seen.push(placement.part);
        }
    }
    seen
}

/// Compile a definition and everything it references.
///
/// Children first, then each step's CSI, then the definition's own
/// primitives, then the definition list itself. Compiling an already
/// compiled definition returns its existing list.
pub fn compile_part<B: RenderBackend + ?Sized>(
    registry: &mut PartRegistry,
    backend: &mut B,
    id: PartId,
) -> Result<ListId> {
    if let Some(list) = registry[id].list {
        return Ok(list);
    }

    let mut children = ChildLists::new();
    for child in referenced(registry, id) {
        let list = compile_part(registry, backend, child)?;
        children.insert(child, list);
    }

    let mut steps = std::mem::take(&mut registry[id].steps);
    let compiled: Result<()> = (0..steps.len())
        .try_for_each(|i| compile_csi(backend, registry, &children, &mut steps, i));
    registry[id].steps = steps;
    compiled?;

    let list = {
        let registry: &PartRegistry = registry;
        let def = &registry[id];
        let geometry = if def.primitives.is_empty() {
            None
        } else {
            Some(record(backend, |b| {
                for primitive in &def.primitives {
                    b.draw_polygon(primitive.color, &primitive.points);
                }
                Ok(())
            })?)
        };

        let list = record(backend, |b| {
            for step in &def.steps {
                if let Some(base) = step.csi.base_list() {
                    b.call_list(base);
                }
            }
            let none = BufferSnapshot::empty();
            for placement in &def.placements {
                emit_placement(b, registry, &children, placement, &none, DrawState::default())?;
            }
            if let Some(geometry) = geometry {
                b.call_list(geometry);
            }
            Ok(())
        })?;
        tracing::trace!(file = %def.filename, ?list, "definition compiled");
        list
    };
    registry[id].list = Some(list);
    Ok(list)
}

/// Compile a standalone step (the template) against an already compiled registry.
pub(crate) fn compile_standalone_step<B: RenderBackend + ?Sized>(
    registry: &PartRegistry,
    backend: &mut B,
    step: &mut Step,
) -> Result<()> {
    let mut children = ChildLists::new();
    for placement in &step.placements {
        let def = &registry[placement.part];
        let list = def
            .list
            .ok_or_else(|| ModelError::Uncompiled(def.filename.clone()))?;
        children.insert(placement.part, list);
    }
    compile_csi(backend, registry, &children, std::slice::from_mut(step), 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Diagnostics;
    use brickbook_ir::{ModelArchive, ModelFile, ModelLine, PartLine, INHERIT_COLOR};
    use brickbook_render::{Command, SoftwareRenderer};

    fn archive() -> ModelArchive {
        ModelArchive::new()
            .with_file(
                "3001.dat",
                ModelFile::new("Brick").with_lines(vec![ModelLine::rect(
                    INHERIT_COLOR,
                    -20.0,
                    -12.0,
                    20.0,
                    12.0,
                    0.0,
                )]),
            )
            .with_file(
                "m.ldr",
                ModelFile::new("M").with_lines(vec![
                    ModelLine::part(PartLine::new("3001.dat").with_color(4).at(0.0, 0.0, 0.0)),
                    ModelLine::part(PartLine::new("3001.dat").inverted()),
                    ModelLine::Step,
                    ModelLine::part(PartLine::new("3001.dat")),
                ]),
            )
    }

    fn load(archive: &ModelArchive) -> (PartRegistry, PartId) {
        let mut registry = PartRegistry::new();
        let mut diags = Diagnostics::new();
        let root = registry.load_model(archive, "m.ldr", &mut diags).unwrap();
        (registry, root)
    }

    #[test]
    fn test_compile_is_idempotent() {
        let archive = archive();
        let (mut registry, root) = load(&archive);
        let mut backend = SoftwareRenderer::new();

        let first = compile_part(&mut registry, &mut backend, root).unwrap();
        let count = backend.list_count();
        let second = compile_part(&mut registry, &mut backend, root).unwrap();
        assert_eq!(first, second);
        assert_eq!(backend.list_count(), count);
        assert!(registry.iter().all(|(_, def)| def.is_compiled()));
    }

    #[test]
    fn test_state_pushes_are_balanced() {
        let archive = archive();
        let (mut registry, root) = load(&archive);
        let mut backend = SoftwareRenderer::new();
        compile_part(&mut registry, &mut backend, root).unwrap();

        let base = registry[root].steps[0].csi.base_list().unwrap();
        let brick = registry[registry.lookup("3001.dat").unwrap()].list().unwrap();
        let commands = backend.commands(base).unwrap();
        assert_eq!(
            commands,
            &[
                Command::PushColor(4),
                Command::PushTransform(brickbook_math::Transform::identity()),
                Command::CallList(brick),
                Command::PopTransform,
                Command::PopColor,
                Command::PushWinding(Winding::Clockwise),
                Command::CallList(brick),
                Command::PopWinding,
            ]
        );
    }

    #[test]
    fn test_cumulative_chains_previous_steps() {
        let archive = archive();
        let (mut registry, root) = load(&archive);
        let mut backend = SoftwareRenderer::new();
        compile_part(&mut registry, &mut backend, root).unwrap();

        let steps = &registry[root].steps;
        let cumulative = steps[1].csi.cumulative_list().unwrap();
        assert_eq!(
            backend.commands(cumulative).unwrap(),
            &[
                Command::CallList(steps[0].csi.base_list().unwrap()),
                Command::CallList(steps[1].csi.base_list().unwrap()),
            ]
        );

        let def_list = registry[root].list().unwrap();
        assert_eq!(backend.commands(def_list).unwrap().len(), 2);
    }

    #[test]
    fn test_draw_state_enter() {
        let archive = archive();
        let (registry, root) = load(&archive);
        let placements = &registry[root].steps[0].placements;
        let base = DrawState::default();

        let red = base.enter(&placements[0]);
        assert_eq!(red.color, Some(4));
        assert_eq!(red.winding, Winding::CounterClockwise);

        let flipped = red.enter(&placements[1]);
        assert_eq!(flipped.color, Some(4));
        assert_eq!(flipped.winding, Winding::Clockwise);
        assert_eq!(flipped.enter(&placements[1]).winding, Winding::CounterClockwise);
    }
}
