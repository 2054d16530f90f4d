//! Turns a classified line stream into one [`PartDefinition`].
//!
//! Reference resolution is left to the registry; the builder only tracks
//! steps, buffer exchange and PLI-ignore state for the file being read.

use brickbook_ir::{BufferId, ColorCode, Vec3 as IrVec3};
use brickbook_math::Point3;

use crate::buffer::BufferStack;
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::part::{PartDefinition, Primitive, Shape};
use crate::placement::Placement;
use crate::step::Step;

pub(crate) struct DefinitionBuilder {
    def: PartDefinition,
    buffers: BufferStack,
    pli_ignore: bool,
}

impl DefinitionBuilder {
    /// Models and embedded submodels start with an implicit step 1.
    pub(crate) fn new(filename: &str, implicit_step: bool) -> Self {
        let mut def = PartDefinition::new(filename);
        if implicit_step {
            def.steps.push(Step::new(1, Default::default()));
        }
        Self {
            def,
            buffers: BufferStack::new(),
            pli_ignore: false,
        }
    }

    pub(crate) fn filename(&self) -> &str {
        &self.def.filename
    }

    fn current_step_number(&self) -> u32 {
        self.def.steps.last().map(|s| s.number).unwrap_or(0)
    }

    /// Close the current step and open the next one.
    pub(crate) fn step(&mut self, diagnostics: &mut Diagnostics) {
        if self.def.steps.last().is_some_and(Step::is_empty) {
            if let Some(empty) = self.def.steps.pop() {
                diagnostics.push(Diagnostic::EmptyStep {
                    file: self.def.filename.clone(),
                    step: empty.number,
                });
            }
        }
        let number = self.current_step_number() + 1;
        self.def.steps.push(Step::new(number, self.buffers.snapshot()));
    }

    /// Snapshot for a placement about to be added.
    pub(crate) fn buffer_snapshot(&self) -> crate::buffer::BufferSnapshot {
        self.buffers.snapshot()
    }

    /// Add a resolved placement to the current step, or to the definition
    /// itself when no step is open.
    pub(crate) fn place(&mut self, mut placement: Placement, primitive: bool) {
        placement.pli_ignored = self.pli_ignore;
        match self.def.steps.last_mut() {
            Some(step) => step.add_placement(placement, !primitive),
            None => self.def.placements.push(placement),
        }
    }

    pub(crate) fn store(&mut self, buffer: BufferId) {
        let step = self.current_step_number();
        self.buffers.store(buffer, step);
        self.sync_csi_buffers();
    }

    pub(crate) fn retrieve(&mut self, buffer: BufferId, diagnostics: &mut Diagnostics) {
        let step = self.current_step_number();
        match self.buffers.retrieve(buffer) {
            Ok(_) => {
                self.sync_csi_buffers();
                if self.def.steps.last().is_some_and(|s| !s.is_empty()) {
                    diagnostics.push(Diagnostic::BufferOrdering {
                        file: self.def.filename.clone(),
                        step,
                        buffer,
                    });
                }
            }
            Err(mismatch) => diagnostics.push(Diagnostic::BufferProtocol {
                file: self.def.filename.clone(),
                step,
                requested: mismatch.requested,
                top: mismatch.top,
            }),
        }
    }

    fn sync_csi_buffers(&mut self) {
        let snapshot = self.buffers.snapshot();
        if let Some(step) = self.def.steps.last_mut() {
            step.csi.buffers = snapshot;
        }
    }

    pub(crate) fn pli_ignore(&mut self, begin: bool, diagnostics: &mut Diagnostics) {
        if self.pli_ignore == begin {
            diagnostics.push(Diagnostic::PliIgnore {
                file: self.def.filename.clone(),
                begin,
            });
        } else {
            self.pli_ignore = begin;
        }
    }

    pub(crate) fn polygon(&mut self, shape: Shape, color: ColorCode, points: &[IrVec3]) {
        self.def.primitives.push(Primitive {
            shape,
            color,
            points: points.iter().map(|p| Point3::new(p.x, p.y, p.z)).collect(),
        });
    }

    /// Finish the definition, dropping a trailing empty step.
    pub(crate) fn finish(mut self, name: &str, primitive: bool) -> PartDefinition {
        if self.def.steps.last().is_some_and(Step::is_empty) {
            if let Some(step) = self.def.steps.pop() {
                tracing::debug!(file = %self.def.filename, step = step.number, "dropping trailing empty step");
            }
        }
        if !self.buffers.is_empty() {
            tracing::debug!(
                file = %self.def.filename,
                depth = self.buffers.depth(),
                "buffers still stored at end of file"
            );
        }
        self.def.name = name.to_string();
        self.def.primitive = primitive;
        self.def
    }
}
