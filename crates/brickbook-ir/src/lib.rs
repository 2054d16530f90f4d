//! Classified model line stream for the brickbook ecosystem.
//!
//! This crate defines the boundary between the (external) part-file parser
//! and the instruction engine. A parser turns each raw file into a
//! [`ModelFile`]: an ordered list of already-classified [`ModelLine`]s plus
//! any submodel sections embedded in the same file. Files are gathered in a
//! [`ModelArchive`], which round-trips through JSON.
//!
//! The IR is purely declarative: no display lists, no measurements. Those
//! are produced by the engine.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Color code as used by part files.
pub type ColorCode = u32;

/// Identifier of an optional-part buffer (buffer exchange).
pub type BufferId = u32;

/// Color code meaning "inherit the color of the enclosing placement".
pub const INHERIT_COLOR: ColorCode = 16;

/// Color code meaning "use the edge color of the enclosing placement".
pub const EDGE_COLOR: ColorCode = 24;

/// 3D vector with f64 components (LDraw units).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    /// X component.
    pub x: f64,
    /// Y component (points down in part files).
    pub y: f64,
    /// Z component.
    pub z: f64,
}

impl Vec3 {
    /// Create a new Vec3.
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// Position plus row-major 3x3 rotation/scale of a part reference.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PartTransform {
    /// Translation of the referenced part's origin.
    pub position: Vec3,
    /// Rows `a b c`, `d e f`, `g h i` of the linear part.
    pub rows: [[f64; 3]; 3],
}

impl PartTransform {
    /// Pure translation.
    pub fn translation(x: f64, y: f64, z: f64) -> Self {
        Self {
            position: Vec3::new(x, y, z),
            rows: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
        }
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

fn default_color() -> ColorCode {
    INHERIT_COLOR
}

/// A reference to another part file, placed inside the current one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartLine {
    /// Filename of the referenced part or submodel.
    pub filename: String,
    /// Color code; [`INHERIT_COLOR`] keeps the enclosing color.
    #[serde(default = "default_color")]
    pub color: ColorCode,
    /// Placement transform; `None` places the part at the parent's origin.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<PartTransform>,
    /// Ghost parts are drawn but never listed or measured.
    #[serde(default, skip_serializing_if = "is_false")]
    pub ghost: bool,
    /// Draw the referenced part with inverted winding.
    #[serde(default, skip_serializing_if = "is_false")]
    pub invert: bool,
}

impl PartLine {
    /// Reference `filename` with inherited color and no transform.
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            color: INHERIT_COLOR,
            transform: None,
            ghost: false,
            invert: false,
        }
    }

    /// Set the color code.
    pub fn with_color(mut self, color: ColorCode) -> Self {
        self.color = color;
        self
    }

    /// Translate the reference to `(x, y, z)`.
    pub fn at(mut self, x: f64, y: f64, z: f64) -> Self {
        self.transform = Some(PartTransform::translation(x, y, z));
        self
    }

    /// Set a full placement transform.
    pub fn with_transform(mut self, transform: PartTransform) -> Self {
        self.transform = Some(transform);
        self
    }

    /// Mark the reference as a ghost.
    pub fn ghost(mut self) -> Self {
        self.ghost = true;
        self
    }

    /// Invert the winding of the referenced part.
    pub fn inverted(mut self) -> Self {
        self.invert = true;
        self
    }
}

/// One classified line of a part file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ModelLine {
    /// Reference to another part or submodel.
    Part(PartLine),
    /// Step boundary.
    Step,
    /// Push the current model state into buffer `buffer`.
    BufferStore {
        /// Buffer being stored.
        buffer: BufferId,
    },
    /// Pop buffer `buffer`; must name the most recently stored buffer.
    BufferRetrieve {
        /// Buffer being retrieved.
        buffer: BufferId,
    },
    /// Following part references are left out of the parts list.
    PliIgnoreBegin,
    /// Ends a [`ModelLine::PliIgnoreBegin`] block.
    PliIgnoreEnd,
    /// Filled triangle.
    Triangle {
        /// Color code.
        color: ColorCode,
        /// Corners, counter-clockwise.
        points: [Vec3; 3],
    },
    /// Filled quadrilateral.
    Quad {
        /// Color code.
        color: ColorCode,
        /// Corners, counter-clockwise.
        points: [Vec3; 4],
    },
}

impl ModelLine {
    /// Part reference line.
    pub fn part(line: PartLine) -> Self {
        ModelLine::Part(line)
    }

    /// Axis-aligned quad in the XY plane spanning `(x0, y0)` to `(x1, y1)` at depth `z`.
    pub fn rect(color: ColorCode, x0: f64, y0: f64, x1: f64, y1: f64, z: f64) -> Self {
        ModelLine::Quad {
            color,
            points: [
                Vec3::new(x0, y0, z),
                Vec3::new(x1, y0, z),
                Vec3::new(x1, y1, z),
                Vec3::new(x0, y1, z),
            ],
        }
    }
}

/// One part file, already classified into lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelFile {
    /// Human-readable name from the file header.
    pub name: String,
    /// Primitive files (studs, cylinders, …) are never measured or listed.
    #[serde(default, skip_serializing_if = "is_false")]
    pub primitive: bool,
    /// Lines of the file's first (or only) section.
    #[serde(default)]
    pub lines: Vec<ModelLine>,
    /// Further sections embedded in the same file, keyed by section filename.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub submodels: HashMap<String, Vec<ModelLine>>,
}

impl ModelFile {
    /// Create an empty, non-primitive file.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            primitive: false,
            lines: Vec::new(),
            submodels: HashMap::new(),
        }
    }

    /// Create an empty primitive file.
    pub fn primitive(name: impl Into<String>) -> Self {
        Self {
            primitive: true,
            ..Self::new(name)
        }
    }

    /// Replace the file's lines.
    pub fn with_lines(mut self, lines: Vec<ModelLine>) -> Self {
        self.lines = lines;
        self
    }

    /// Embed a submodel section.
    pub fn with_submodel(mut self, filename: impl Into<String>, lines: Vec<ModelLine>) -> Self {
        self.submodels.insert(filename.into(), lines);
        self
    }

    /// Lines of an embedded submodel, matching the name case-insensitively.
    pub fn submodel(&self, filename: &str) -> Option<&[ModelLine]> {
        lookup_ignore_case(&self.submodels, filename).map(Vec::as_slice)
    }
}

/// Exact match first, then any key equal up to ASCII case.
fn lookup_ignore_case<'a, V>(map: &'a HashMap<String, V>, name: &str) -> Option<&'a V> {
    map.get(name).or_else(|| {
        map.iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value)
    })
}

/// A set of classified part files, stored as a `.bbk.json` archive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArchive {
    /// Format version string (e.g. "0.1").
    pub version: String,
    /// Filename of the main model.
    #[serde(default)]
    pub main: String,
    /// All files, keyed by filename.
    pub files: HashMap<String, ModelFile>,
}

impl Default for ModelArchive {
    fn default() -> Self {
        Self {
            version: "0.1".to_string(),
            main: String::new(),
            files: HashMap::new(),
        }
    }
}

impl ModelArchive {
    /// Create a new empty archive.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a file.
    pub fn insert(&mut self, filename: impl Into<String>, file: ModelFile) {
        self.files.insert(filename.into(), file);
    }

    /// Builder form of [`ModelArchive::insert`].
    pub fn with_file(mut self, filename: impl Into<String>, file: ModelFile) -> Self {
        self.insert(filename, file);
        self
    }

    /// Set the main model filename.
    pub fn with_main(mut self, filename: impl Into<String>) -> Self {
        self.main = filename.into();
        self
    }

    /// Look up a file by name. Filenames are case-insensitive, as part
    /// libraries are written on case-insensitive file systems.
    pub fn get(&self, filename: &str) -> Option<&ModelFile> {
        lookup_ignore_case(&self.files, filename)
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn brick() -> ModelFile {
        ModelFile::new("Brick 2 x 4").with_lines(vec![
            ModelLine::rect(INHERIT_COLOR, -40.0, -24.0, 40.0, 0.0, -20.0),
            ModelLine::part(PartLine::new("stud.dat").at(-30.0, -24.0, -10.0)),
        ])
    }

    #[test]
    fn roundtrip_archive() {
        let archive = ModelArchive::new()
            .with_main("house.ldr")
            .with_file("3001.dat", brick())
            .with_file("stud.dat", ModelFile::primitive("Stud"))
            .with_file(
                "house.ldr",
                ModelFile::new("House")
                    .with_lines(vec![
                        ModelLine::part(PartLine::new("3001.dat").with_color(4)),
                        ModelLine::Step,
                        ModelLine::BufferStore { buffer: 5 },
                        ModelLine::part(PartLine::new("roof.ldr").ghost()),
                        ModelLine::BufferRetrieve { buffer: 5 },
                    ])
                    .with_submodel(
                        "roof.ldr",
                        vec![
                            ModelLine::part(PartLine::new("3001.dat").inverted()),
                            ModelLine::part(PartLine::new("3001.dat").with_transform(
                                PartTransform {
                                    position: Vec3::new(0.0, -24.0, 40.0),
                                    rows: [[0.0, 0.0, 1.0], [0.0, 1.0, 0.0], [-1.0, 0.0, 0.0]],
                                },
                            )),
                        ],
                    ),
            );

        let json = archive.to_json().expect("serialize");
        let restored = ModelArchive::from_json(&json).expect("deserialize");

        assert_eq!(archive, restored);
        assert_eq!(restored.files.len(), 3);
        assert!(restored.get("stud.dat").map(|f| f.primitive).unwrap_or(false));
        assert_eq!(restored.get("house.ldr").map(|f| f.submodels.len()), Some(1));
    }

    #[test]
    fn lookup_ignores_case() {
        let archive = ModelArchive::new().with_file(
            "3001.dat",
            brick().with_submodel("Wheel.ldr", vec![ModelLine::Step]),
        );
        assert!(archive.get("3001.DAT").is_some());
        assert!(archive.get("3002.dat").is_none());

        let file = archive.get("3001.dat").unwrap();
        assert_eq!(file.submodel("wheel.LDR").map(<[_]>::len), Some(1));
        assert!(file.submodel("tire.ldr").is_none());
    }

    #[test]
    fn empty_archive() {
        let archive = ModelArchive::new();
        assert_eq!(archive.version, "0.1");
        assert!(archive.main.is_empty());
        assert!(archive.files.is_empty());
    }

    #[test]
    fn serde_tagged_lines() {
        let line = ModelLine::BufferStore { buffer: 3 };
        let json = serde_json::to_string(&line).unwrap();
        assert!(json.contains(r#""type":"BufferStore""#));
        assert_eq!(serde_json::from_str::<ModelLine>(&json).unwrap(), line);
    }

    #[test]
    fn part_line_defaults() {
        let line: ModelLine =
            serde_json::from_str(r#"{"type":"Part","filename":"3001.dat"}"#).unwrap();
        match line {
            ModelLine::Part(part) => {
                assert_eq!(part.color, INHERIT_COLOR);
                assert!(part.transform.is_none());
                assert!(!part.ghost);
                assert!(!part.invert);
            }
            other => panic!("expected part line, got {other:?}"),
        }
    }
}
