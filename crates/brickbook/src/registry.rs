//! The part registry: one [`PartDefinition`] per filename for a loaded model.

use std::collections::HashMap;
use std::ops::{Index, IndexMut};

use brickbook_ir::{ModelArchive, ModelFile, ModelLine};
use slotmap::SlotMap;

use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::error::{ModelError, Result};
use crate::loader::DefinitionBuilder;
use crate::part::{PartDefinition, PartId, Shape};
use crate::placement::Placement;

/// Where part files come from.
pub trait PartSource {
    /// The classified file stored under `filename`, if any.
    fn file(&self, filename: &str) -> Option<&ModelFile>;
}

impl PartSource for ModelArchive {
    fn file(&self, filename: &str) -> Option<&ModelFile> {
        self.get(filename)
    }
}

impl PartSource for HashMap<String, ModelFile> {
    fn file(&self, filename: &str) -> Option<&ModelFile> {
        self.get(filename)
    }
}

fn name_key(filename: &str) -> String {
    filename.to_ascii_lowercase()
}

/// Lines of one definition, and where nested references are looked up.
struct Located<'s> {
    lines: &'s [ModelLine],
    name: String,
    primitive: bool,
    implicit_step: bool,
    container: String,
}

/// Deduplicated store of part definitions, owned by one session.
#[derive(Debug, Default)]
pub struct PartRegistry {
    parts: SlotMap<PartId, PartDefinition>,
    by_name: HashMap<String, PartId>,
    loading: Vec<String>,
}

impl PartRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a root model. Missing files are fatal here.
    pub fn load_model(
        &mut self,
        source: &dyn PartSource,
        filename: &str,
        diagnostics: &mut Diagnostics,
    ) -> Result<PartId> {
        let _span = tracing::info_span!("load", model = filename).entered();
        if let Some(id) = self.lookup(filename) {
            return Ok(id);
        }
        let file = source
            .file(filename)
            .ok_or_else(|| ModelError::NotFound(filename.to_string()))?;
        let located = Located {
            lines: &file.lines,
            name: file.name.clone(),
            primitive: file.primitive,
            implicit_step: true,
            container: filename.to_string(),
        };
        let id = self.load(source, filename, located, diagnostics)?;
        tracing::info!(parts = self.len(), "model loaded");
        Ok(id)
    }

    /// Return the definition for `filename`, loading it (and everything it
    /// references) on first use.
    pub fn resolve(
        &mut self,
        source: &dyn PartSource,
        filename: &str,
        diagnostics: &mut Diagnostics,
    ) -> Result<PartId> {
        self.resolve_in(source, filename, None, diagnostics)
    }

    /// Resolve `filename`, preferring a submodel section embedded in `container`.
    fn resolve_in(
        &mut self,
        source: &dyn PartSource,
        filename: &str,
        container: Option<&str>,
        diagnostics: &mut Diagnostics,
    ) -> Result<PartId> {
        if let Some(id) = self.lookup(filename) {
            return Ok(id);
        }
        if self.loading.iter().any(|f| f.eq_ignore_ascii_case(filename)) {
            let mut chain = self.loading.clone();
            chain.push(filename.to_string());
            return Err(ModelError::CyclicReference(chain));
        }

        let embedded = container
            .and_then(|c| source.file(c).map(|f| (c, f)))
            .and_then(|(c, f)| f.submodel(filename).map(|lines| (c, lines)));

        let located = match embedded {
            Some((container, lines)) => Located {
                lines,
                name: filename.to_string(),
                primitive: false,
                implicit_step: true,
                container: container.to_string(),
            },
            None => {
                let file = source
                    .file(filename)
                    .ok_or_else(|| ModelError::NotFound(filename.to_string()))?;
                Located {
                    lines: &file.lines,
                    name: file.name.clone(),
                    primitive: file.primitive,
                    implicit_step: false,
                    container: filename.to_string(),
                }
            }
        };
        self.load(source, filename, located, diagnostics)
    }

    fn load(
        &mut self,
        source: &dyn PartSource,
        filename: &str,
        located: Located<'_>,
        diagnostics: &mut Diagnostics,
    ) -> Result<PartId> {
        self.loading.push(filename.to_string());
        let built = self.build(source, filename, &located, diagnostics);
        self.loading.pop();

        let def = built?;
        tracing::debug!(
            file = filename,
            steps = def.steps.len(),
            primitives = def.primitives.len(),
            "definition loaded"
        );
        let id = self.parts.insert(def);
        self.by_name.insert(name_key(filename), id);
        Ok(id)
    }

    fn build(
        &mut self,
        source: &dyn PartSource,
        filename: &str,
        located: &Located<'_>,
        diagnostics: &mut Diagnostics,
    ) -> Result<PartDefinition> {
        let mut builder = DefinitionBuilder::new(filename, located.implicit_step);

        for line in located.lines {
            match line {
                ModelLine::Part(part) => {
                    let id = match self.resolve_in(
                        source,
                        &part.filename,
                        Some(located.container.as_str()),
                        diagnostics,
                    ) {
                        Ok(id) => id,
                        Err(ModelError::NotFound(missing)) => {
                            diagnostics.push(Diagnostic::MissingPart {
                                file: builder.filename().to_string(),
                                part: missing,
                            });
                            continue;
                        }
                        Err(e) => return Err(e),
                    };
                    let primitive = self.parts[id].primitive;
                    let placement = Placement::from_line(id, part, builder.buffer_snapshot());
                    builder.place(placement, primitive);
                }
                ModelLine::Step => builder.step(diagnostics),
                ModelLine::BufferStore { buffer } => builder.store(*buffer),
                ModelLine::BufferRetrieve { buffer } => builder.retrieve(*buffer, diagnostics),
                ModelLine::PliIgnoreBegin => builder.pli_ignore(true, diagnostics),
                ModelLine::PliIgnoreEnd => builder.pli_ignore(false, diagnostics),
                ModelLine::Triangle { color, points } => {
                    builder.polygon(Shape::Triangle, *color, points)
                }
                ModelLine::Quad { color, points } => builder.polygon(Shape::Quad, *color, points),
            }
        }

        Ok(builder.finish(&located.name, located.primitive))
    }

    /// Id of an already loaded definition. Filenames compare
    /// case-insensitively.
    pub fn lookup(&self, filename: &str) -> Option<PartId> {
        self.by_name.get(&name_key(filename)).copied()
    }

    /// Definition by id.
    pub fn get(&self, id: PartId) -> Option<&PartDefinition> {
        self.parts.get(id)
    }

    /// Mutable definition by id.
    pub fn get_mut(&mut self, id: PartId) -> Option<&mut PartDefinition> {
        self.parts.get_mut(id)
    }

    /// All definitions, in load order (children before parents).
    pub fn iter(&self) -> impl Iterator<Item = (PartId, &PartDefinition)> {
        self.parts.iter()
    }

    /// Number of definitions.
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    /// True when nothing is loaded.
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

impl Index<PartId> for PartRegistry {
    type Output = PartDefinition;

    fn index(&self, id: PartId) -> &PartDefinition {
        &self.parts[id]
    }
}

impl IndexMut<PartId> for PartRegistry {
    fn index_mut(&mut self, id: PartId) -> &mut PartDefinition {
        &mut self.parts[id]
    }
}
