#![warn(missing_docs)]

//! brickbook: building instruction books for brick models.
//!
//! Loads a hierarchical model into deduplicated part definitions, compiles
//! per-step display lists (honoring buffer exchange), measures every part and
//! construction-step image by offscreen rendering, and lays out parts lists.
//!
//! # Example
//!
//! ```rust
//! use brickbook::{ApproximateMetrics, BookSettings, Instructions};
//! use brickbook_ir::{ModelArchive, ModelFile, ModelLine, PartLine, INHERIT_COLOR};
//! use brickbook_render::SoftwareRenderer;
//!
//! let archive = ModelArchive::new()
//!     .with_file(
//!         "3001.dat",
//!         ModelFile::new("Brick 2 x 4")
//!             .with_lines(vec![ModelLine::rect(INHERIT_COLOR, -40.0, -12.0, 40.0, 12.0, 0.0)]),
//!     )
//!     .with_file(
//!         "house.ldr",
//!         ModelFile::new("House").with_lines(vec![
//!             ModelLine::part(PartLine::new("3001.dat").with_color(4)),
//!             ModelLine::Step,
//!             ModelLine::part(PartLine::new("3001.dat").at(0.0, -24.0, 0.0)),
//!         ]),
//!     );
//!
//! let mut book = Instructions::load(&archive, "house.ldr", BookSettings::default()).unwrap();
//! let mut renderer = SoftwareRenderer::new();
//! book.compile(&mut renderer).unwrap();
//! book.init_dimensions(&mut renderer, None).unwrap();
//! book.init_layout(&ApproximateMetrics);
//!
//! assert_eq!(book.model().steps.len(), 2);
//! assert_eq!(book.model().steps[0].pli.len(), 1);
//! ```

pub mod buffer;
pub mod cache;
pub mod compile;
pub mod diagnostics;
pub mod error;
pub mod geometry;
pub mod instructions;
pub mod layout;
mod loader;
pub mod measure;
pub mod part;
pub mod placement;
pub mod registry;
pub mod report;
pub mod settings;
pub mod step;
pub mod template;

pub use buffer::{BufferEntry, BufferMismatch, BufferSnapshot, BufferStack};
pub use cache::{apply_cache, cache_file_name, parse_cache, write_cache, CacheEntry};
pub use compile::{compile_part, DrawState};
pub use diagnostics::{Diagnostic, Diagnostics};
pub use error::{ModelError, Result};
pub use geometry::{Font, Point, Rect};
pub use instructions::{DimensionSource, Instructions};
pub use layout::{
    layout_pli_row, ApproximateMetrics, LayoutSettings, PliItem, PliLayout, TextExtents,
    TextMetrics,
};
pub use measure::{
    measurable_elements, measure_elements, Element, MeasureReport, MeasureSettings, Measurement,
};
pub use part::{PartDefinition, PartDimensions, PartId, Primitive, Shape};
pub use placement::Placement;
pub use registry::{PartRegistry, PartSource};
pub use report::BookReport;
pub use settings::{BookSettings, TemplateSettings};
pub use step::{Csi, CsiDimensions, Pli, PliEntry, Step, StepKind, StepStyle};
