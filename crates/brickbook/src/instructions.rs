//! A book-building session: one loaded model and everything derived from it.

use std::path::Path;

use brickbook_render::{ListId, RenderBackend};

use crate::cache::{apply_cache, cache_file_name, write_cache};
use crate::compile::compile_part;
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::error::{ModelError, Result};
use crate::layout::{layout_all, TextMetrics};
use crate::measure::{measurable_elements, measure_elements, Element, MeasureReport};
use crate::part::{PartDefinition, PartId};
use crate::registry::{PartRegistry, PartSource};
use crate::report::{BookReport, PartReport, StepReport};
use crate::settings::BookSettings;
use crate::step::Step;
use crate::template::build_template;

/// Where the current dimensions came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DimensionSource {
    /// Adopted from a cache file.
    Cache {
        /// Lines applied.
        entries: usize,
    },
    /// Measured by rendering.
    Measured,
}

/// One instruction book under construction.
///
/// Owns the part registry, so two sessions never share definitions.
#[derive(Debug)]
pub struct Instructions {
    registry: PartRegistry,
    root: PartId,
    settings: BookSettings,
    diagnostics: Diagnostics,
    template: Option<Step>,
    last_measure: Option<MeasureReport>,
}

impl Instructions {
    /// Load `filename` and everything it references from `source`.
    pub fn load(source: &dyn PartSource, filename: &str, settings: BookSettings) -> Result<Self> {
        settings.validate()?;
        let mut registry = PartRegistry::new();
        let mut diagnostics = Diagnostics::new();
        let root = registry.load_model(source, filename, &mut diagnostics)?;
        Ok(Self {
            registry,
            root,
            settings,
            diagnostics,
            template: None,
            last_measure: None,
        })
    }

    /// Id of the main model.
    pub fn root(&self) -> PartId {
        self.root
    }

    /// The main model's definition.
    pub fn model(&self) -> &PartDefinition {
        &self.registry[self.root]
    }

    /// All loaded definitions.
    pub fn registry(&self) -> &PartRegistry {
        &self.registry
    }

    /// Settings the session was created with.
    pub fn settings(&self) -> &BookSettings {
        &self.settings
    }

    /// Diagnostics recorded so far.
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Template sample step, once built.
    pub fn template(&self) -> Option<&Step> {
        self.template.as_ref()
    }

    /// Compile display lists for the whole model.
    pub fn compile<B: RenderBackend + ?Sized>(&mut self, backend: &mut B) -> Result<ListId> {
        let _span = tracing::info_span!("compile").entered();
        let list = compile_part(&mut self.registry, backend, self.root)?;
        tracing::info!(lists = backend.list_count(), "model compiled");
        Ok(list)
    }

    /// Every part and CSI that needs dimensions.
    pub fn elements(&self) -> Vec<Element> {
        measurable_elements(&self.registry, self.root)
    }

    /// Measure every element by rendering. The model must be compiled.
    pub fn measure<B: RenderBackend + ?Sized>(&mut self, backend: &mut B) -> Result<MeasureReport> {
        let elements = self.elements();
        let report = measure_elements(
            &mut self.registry,
            backend,
            &elements,
            &self.settings.measure,
            &mut self.diagnostics,
        )?;
        self.last_measure = Some(report.clone());
        Ok(report)
    }

    /// Adopt dimensions from cache text, all or nothing.
    pub fn load_dimension_cache(&mut self, text: &str) -> Result<usize> {
        let elements = self.elements();
        apply_cache(&mut self.registry, &elements, text)
    }

    /// Cache text for the current dimensions.
    pub fn dimension_cache(&self) -> String {
        write_cache(&self.registry, &self.elements())
    }

    /// Give every element dimensions: from the model's cache file in
    /// `cache_dir` when it is valid, otherwise by measuring (which rewrites
    /// the cache). Without a directory, always measures.
    pub fn init_dimensions<B: RenderBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        cache_dir: Option<&Path>,
    ) -> Result<DimensionSource> {
        let cache_path = cache_dir.map(|dir| dir.join(cache_file_name(&self.model().filename)));

        if let Some(path) = &cache_path {
            match std::fs::read_to_string(path) {
                Ok(text) => match self.load_dimension_cache(&text) {
                    Ok(entries) => {
                        tracing::info!(path = %path.display(), entries, "dimensions loaded from cache");
                        return Ok(DimensionSource::Cache { entries });
                    }
                    Err(ModelError::StaleCache(reason)) => {
                        self.diagnostics.push(Diagnostic::StaleCache { reason });
                    }
                    Err(err) => return Err(err),
                },
                Err(err) => {
                    tracing::debug!(path = %path.display(), %err, "no dimension cache");
                }
            }
        }

        self.measure(backend)?;

        if let Some(path) = &cache_path {
            match std::fs::write(path, self.dimension_cache()) {
                Ok(()) => tracing::debug!(path = %path.display(), "dimension cache written"),
                Err(err) => {
                    tracing::warn!(path = %path.display(), %err, "could not write dimension cache")
                }
            }
        }
        Ok(DimensionSource::Measured)
    }

    /// Lay out every step's PLI, number label and CSI box.
    pub fn init_layout(&mut self, metrics: &dyn TextMetrics) {
        layout_all(
            &mut self.registry,
            &self.settings.layout,
            metrics,
            &mut self.diagnostics,
        );
    }

    /// Build the template page's sample step. The model must be compiled and
    /// should be measured.
    pub fn build_template<B: RenderBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        metrics: &dyn TextMetrics,
    ) -> Result<&Step> {
        let step = build_template(
            &self.registry,
            backend,
            self.root,
            &self.settings,
            metrics,
            &mut self.diagnostics,
        )?;
        Ok(&*self.template.insert(step))
    }

    /// Summary of the session so far.
    pub fn report(&self) -> BookReport {
        let mut parts = Vec::new();
        let mut steps = Vec::new();
        for element in self.elements() {
            match element {
                Element::Part(id) => {
                    let def = &self.registry[id];
                    parts.push(PartReport {
                        file: def.filename.clone(),
                        name: def.name.clone(),
                        dimensions: def.measured(),
                    });
                }
                Element::Csi { part, step } => {
                    let def = &self.registry[part];
                    steps.push(StepReport::new(&self.registry, &def.filename, &def.steps[step]));
                }
            }
        }

        BookReport {
            model: self.model().filename.clone(),
            definitions: self.registry.len(),
            parts,
            steps,
            template: self
                .template
                .as_ref()
                .map(|step| StepReport::new(&self.registry, &self.model().filename, step)),
            measure: self.last_measure.clone(),
            diagnostics: self.diagnostics.entries().to_vec(),
        }
    }
}
