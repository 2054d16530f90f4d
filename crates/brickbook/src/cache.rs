//! Dimension cache: measured sizes persisted as one text line per element.
//!
//! ```text
//! s <step> <filename> <width> <height> <center-x> <center-y>
//! p <filename> <width> <height> <center-x> <center-y> <left-inset> <bottom-inset>
//! ```
//!
//! A cache is adopted whole or not at all: every line is parsed and matched
//! against the loaded model before any dimension is written.

use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::error::{ModelError, Result};
use crate::geometry::Point;
use crate::measure::{Element, Measurement};
use crate::registry::PartRegistry;

/// Cache file name for a model file.
pub fn cache_file_name(model: &str) -> String {
    let name = Path::new(model)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(model);
    format!("PartDimensions_{name}.cache")
}

/// One parsed cache line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEntry {
    /// CSI of step `step` (1-based) of `filename`.
    Csi {
        /// Step number.
        step: u32,
        /// Owning definition.
        filename: String,
        /// Box width.
        width: i32,
        /// Box height.
        height: i32,
        /// Center offset.
        center: Point,
    },
    /// Part thumbnail.
    Part {
        /// Part filename.
        filename: String,
        /// Box width.
        width: i32,
        /// Box height.
        height: i32,
        /// Center offset.
        center: Point,
        /// Left inset.
        left_inset: i32,
        /// Bottom inset.
        bottom_inset: i32,
    },
}

impl CacheEntry {
    /// Dimensions carried by this line, widths and heights clamped to at least 1.
    pub fn measurement(&self) -> Measurement {
        match *self {
            CacheEntry::Csi {
                width,
                height,
                center,
                ..
            } => Measurement {
                width: width.max(1),
                height: height.max(1),
                center,
                left_inset: 0,
                bottom_inset: 0,
            },
            CacheEntry::Part {
                width,
                height,
                center,
                left_inset,
                bottom_inset,
                ..
            } => Measurement {
                width: width.max(1),
                height: height.max(1),
                center,
                left_inset,
                bottom_inset,
            },
        }
    }

    /// Cache line describing `element`'s current dimensions.
    pub fn from_element(registry: &PartRegistry, element: Element) -> Self {
        match element {
            Element::Part(id) => {
                let def = &registry[id];
                let d = def.dimensions();
                CacheEntry::Part {
                    filename: def.filename.clone(),
                    width: d.width,
                    height: d.height,
                    center: d.center,
                    left_inset: d.left_inset,
                    bottom_inset: d.bottom_inset,
                }
            }
            Element::Csi { part, step } => {
                let def = &registry[part];
                let step = &def.steps[step];
                let d = step.csi.dimensions();
                CacheEntry::Csi {
                    step: step.number,
                    filename: def.filename.clone(),
                    width: d.width,
                    height: d.height,
                    center: d.center,
                }
            }
        }
    }

    fn resolve(&self, registry: &PartRegistry) -> Result<Element> {
        match self {
            CacheEntry::Csi { step, filename, .. } => {
                let id = registry
                    .lookup(filename)
                    .ok_or_else(|| ModelError::stale(format!("unknown file {filename}")))?;
                let index = registry[id]
                    .steps
                    .iter()
                    .position(|s| s.number == *step)
                    .ok_or_else(|| ModelError::stale(format!("{filename} has no step {step}")))?;
                Ok(Element::Csi { part: id, step: index })
            }
            CacheEntry::Part { filename, .. } => {
                let id = registry
                    .lookup(filename)
                    .ok_or_else(|| ModelError::stale(format!("unknown part {filename}")))?;
                if registry[id].primitive {
                    return Err(ModelError::stale(format!("{filename} is a primitive")));
                }
                Ok(Element::Part(id))
            }
        }
    }
}

impl fmt::Display for CacheEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheEntry::Csi {
                step,
                filename,
                width,
                height,
                center,
            } => write!(
                f,
                "s {step} {filename} {width} {height} {} {}",
                center.x, center.y
            ),
            CacheEntry::Part {
                filename,
                width,
                height,
                center,
                left_inset,
                bottom_inset,
            } => write!(
                f,
                "p {filename} {width} {height} {} {} {left_inset} {bottom_inset}",
                center.x, center.y
            ),
        }
    }
}

fn field<T: FromStr>(line: &str, value: Option<&str>) -> Result<T> {
    value
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| ModelError::stale(format!("malformed line: {line}")))
}

impl FromStr for CacheEntry {
    type Err = ModelError;

    fn from_str(line: &str) -> Result<Self> {
        let mut fields = line.split_whitespace();
        let kind = fields.next();
        let entry = match kind {
            Some("s") => {
                let step: u32 = field(line, fields.next())?;
                let filename: String = field(line, fields.next())?;
                let width = field(line, fields.next())?;
                let height = field(line, fields.next())?;
                let center = Point::new(field(line, fields.next())?, field(line, fields.next())?);
                if step == 0 {
                    return Err(ModelError::stale(format!("step 0 in line: {line}")));
                }
                CacheEntry::Csi {
                    step,
                    filename,
                    width,
                    height,
                    center,
                }
            }
            Some("p") => CacheEntry::Part {
                filename: field(line, fields.next())?,
                width: field(line, fields.next())?,
                height: field(line, fields.next())?,
                center: Point::new(field(line, fields.next())?, field(line, fields.next())?),
                left_inset: field(line, fields.next())?,
                bottom_inset: field(line, fields.next())?,
            },
            _ => return Err(ModelError::stale(format!("unknown entry: {line}"))),
        };
        if fields.next().is_some() {
            return Err(ModelError::stale(format!("malformed line: {line}")));
        }
        Ok(entry)
    }
}

/// Parse every non-blank line of a cache file.
pub fn parse_cache(text: &str) -> Result<Vec<CacheEntry>> {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(str::parse)
        .collect()
}

/// Render cache text for the measured elements of `elements`, one line
/// each, in order.
///
/// Elements without dimensions are left out, so a cache written after a
/// failed measurement is stale on the next load.
pub fn write_cache(registry: &PartRegistry, elements: &[Element]) -> String {
    let mut out = String::new();
    for &element in elements.iter().filter(|e| e.is_measured(registry)) {
        out.push_str(&CacheEntry::from_element(registry, element).to_string());
        out.push('\n');
    }
    out
}

/// Validate `text` against the loaded model and adopt it.
///
/// Every element in `required` must be covered. On error nothing has been
/// written to the registry. Returns the number of lines applied.
pub fn apply_cache(registry: &mut PartRegistry, required: &[Element], text: &str) -> Result<usize> {
    let entries = parse_cache(text)?;
    let resolved = entries
        .iter()
        .map(|entry| Ok((entry.resolve(registry)?, entry.measurement())))
        .collect::<Result<Vec<_>>>()?;

    let covered: HashSet<Element> = resolved.iter().map(|(element, _)| *element).collect();
    if let Some(missing) = required.iter().find(|e| !covered.contains(e)) {
        return Err(ModelError::stale(format!(
            "no entry for {}",
            missing.label(registry)
        )));
    }

    for &(element, measurement) in &resolved {
        element.apply(registry, measurement);
    }
    tracing::debug!(entries = resolved.len(), "dimension cache applied");
    Ok(resolved.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Diagnostics;
    use crate::measure::measurable_elements;
    use crate::part::PartId;
    use brickbook_ir::{ModelArchive, ModelFile, ModelLine, PartLine, INHERIT_COLOR};

    fn load() -> (PartRegistry, PartId) {
        let archive = ModelArchive::new()
            .with_file(
                "3001.dat",
                ModelFile::new("Brick").with_lines(vec![
                    ModelLine::rect(INHERIT_COLOR, -20.0, -12.0, 20.0, 12.0, 0.0),
                    ModelLine::part(PartLine::new("stud.dat")),
                ]),
            )
            .with_file("stud.dat", ModelFile::primitive("Stud"))
            .with_file(
                "m.ldr",
                ModelFile::new("M").with_lines(vec![
                    ModelLine::part(PartLine::new("3001.dat")),
                    ModelLine::Step,
                    ModelLine::part(PartLine::new("3001.dat").at(0.0, -24.0, 0.0)),
                ]),
            );
        let mut registry = PartRegistry::new();
        let root = registry
            .load_model(&archive, "m.ldr", &mut Diagnostics::new())
            .unwrap();
        (registry, root)
    }

    const VALID: &str = "p 3001.dat 40 30 1 -2 6 4\np m.ldr 50 60 0 0 0 0\ns 1 m.ldr 40 30 0 0\ns 2 m.ldr 0 -5 3 4\n";

    #[test]
    fn test_cache_file_name() {
        assert_eq!(cache_file_name("house.ldr"), "PartDimensions_house.ldr.cache");
        assert_eq!(cache_file_name("models/car.mpd"), "PartDimensions_car.mpd.cache");
    }

    #[test]
    fn test_parse_lines() {
        let entries = parse_cache(VALID).unwrap();
        assert_eq!(entries.len(), 4);
        assert_eq!(
            entries[0],
            CacheEntry::Part {
                filename: "3001.dat".into(),
                width: 40,
                height: 30,
                center: Point::new(1, -2),
                left_inset: 6,
                bottom_inset: 4,
            }
        );
        assert_eq!(entries[0].to_string(), "p 3001.dat 40 30 1 -2 6 4");
        // Clamped on read.
        let m = entries[3].measurement();
        assert_eq!((m.width, m.height), (1, 1));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for bad in ["x 1 2 3", "p 3001.dat 40 30", "s 0 m.ldr 1 1 0 0", "s 1 m.ldr 1 1 0 0 9", "p a.dat w 1 0 0 0 0"] {
            let err = parse_cache(bad).unwrap_err();
            assert!(matches!(err, ModelError::StaleCache(_)), "{bad}");
        }
    }

    #[test]
    fn test_apply_valid_cache() {
        let (mut registry, root) = load();
        let elements = measurable_elements(&registry, root);
        assert_eq!(apply_cache(&mut registry, &elements, VALID).unwrap(), 4);

        let brick = registry.lookup("3001.dat").unwrap();
        assert_eq!(registry[brick].dimensions().left_inset, 6);
        assert_eq!(registry[root].steps[1].csi.dimensions().width, 1);
        assert_eq!(write_cache(&registry, &elements).lines().count(), elements.len());
    }

    #[test]
    fn test_stale_cache_applies_nothing() {
        let (mut registry, root) = load();
        let elements = measurable_elements(&registry, root);

        let unknown = format!("{VALID}p 9999.dat 1 1 0 0 0 0\n");
        let step_too_high = format!("{VALID}s 3 m.ldr 1 1 0 0\n");
        let primitive = format!("{VALID}p stud.dat 1 1 0 0 0 0\n");
        let missing = "p 3001.dat 40 30 1 -2 6 4\ns 1 m.ldr 40 30 0 0\n".to_string();

        for text in [unknown, step_too_high, primitive, missing] {
            assert!(apply_cache(&mut registry, &elements, &text).is_err());
            assert!(registry.iter().all(|(_, def)| def.measured().is_none()));
            assert!(registry[root].steps.iter().all(|s| s.csi.measured().is_none()));
        }
    }

    #[test]
    fn test_write_skips_unmeasured() {
        let (mut registry, root) = load();
        let elements = measurable_elements(&registry, root);
        assert_eq!(write_cache(&registry, &elements), "");

        let brick = registry.lookup("3001.dat").unwrap();
        Element::Part(brick).apply(&mut registry, Measurement::DEGENERATE);
        let text = write_cache(&registry, &elements);
        assert_eq!(text, "p 3001.dat 1 1 0 0 0 0\n");

        // The partial cache no longer covers the model.
        let err = apply_cache(&mut registry, &elements, &text).unwrap_err();
        assert!(matches!(err, ModelError::StaleCache(_)));
    }
}
