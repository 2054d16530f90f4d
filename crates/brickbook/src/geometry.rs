//! Page-space points, boxes and fonts (pixels, y down).

use serde::{Deserialize, Serialize};

/// Integer page point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    /// X in pixels.
    pub x: i32,
    /// Y in pixels, growing downwards.
    pub y: i32,
}

impl Point {
    /// Create a point.
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Integer page rectangle; `(x, y)` is the top-left corner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    /// Left edge.
    pub x: i32,
    /// Top edge.
    pub y: i32,
    /// Width.
    pub width: i32,
    /// Height.
    pub height: i32,
}

impl Rect {
    /// Create a rectangle.
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Top-left corner.
    pub fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// Font used for a page label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Font {
    /// Face name.
    pub face: String,
    /// Size in pixels.
    pub size: f64,
    /// Bold weight.
    #[serde(default)]
    pub bold: bool,
}

impl Font {
    /// Regular font of the default face.
    pub fn new(size: f64) -> Self {
        Self {
            face: "Arial".to_string(),
            size,
            bold: false,
        }
    }

    /// Bold variant.
    pub fn bold(mut self) -> Self {
        self.bold = true;
        self
    }
}
