//! Book settings, loadable from TOML.
//!
//! ```toml
//! [measure]
//! surface_sizes = [256, 512, 1024, 2048]
//!
//! [layout]
//! page_width = 1024
//! page_height = 768
//!
//! [template]
//! part_count = 5
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};
use crate::layout::LayoutSettings;
use crate::measure::{validate_tiers, MeasureSettings};

/// Template page parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateSettings {
    /// How many of the main model's first placements the sample step shows.
    pub part_count: usize,
    /// Surface sizes used to measure the sample CSI.
    pub surface_sizes: Vec<u32>,
}

impl Default for TemplateSettings {
    fn default() -> Self {
        Self {
            part_count: 5,
            surface_sizes: vec![512, 1024, 2048],
        }
    }
}

/// All book-building settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BookSettings {
    /// Dimension solver.
    pub measure: MeasureSettings,
    /// Page layout.
    pub layout: LayoutSettings,
    /// Template page.
    pub template: TemplateSettings,
}

impl BookSettings {
    /// Validate every section.
    pub fn validate(&self) -> Result<()> {
        self.measure.validate()?;
        self.layout.validate()?;
        if self.template.part_count == 0 {
            return Err(ModelError::settings("template.part_count must be positive"));
        }
        validate_tiers("template.surface_sizes", &self.template.surface_sizes)
    }

    /// Parse and validate TOML. Missing keys take their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let settings: BookSettings = toml::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Read settings from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }
}
