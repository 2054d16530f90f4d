#![warn(missing_docs)]

//! Math types for the brickbook instruction engine.
//!
//! Thin wrappers around nalgebra providing the handful of types the model
//! graph and the renderers share: points, vectors, and 4x4 placement
//! transforms in LDraw units (LDU).

use nalgebra::{Matrix4, Vector3, Vector4};

/// A point in 3D model space (LDU).
pub type Point3 = nalgebra::Point3<f64>;

/// A vector in 3D model space.
pub type Vec3 = Vector3<f64>;

/// Default elevation of the instruction-book camera, in degrees.
pub const DEFAULT_VIEW_X_DEGREES: f64 = 20.0;

/// Default azimuth of the instruction-book camera, in degrees.
pub const DEFAULT_VIEW_Y_DEGREES: f64 = 45.0;

/// A 4x4 affine transformation matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    /// The underlying 4x4 matrix.
    pub matrix: Matrix4<f64>,
}

impl Transform {
    /// Identity transform.
    pub fn identity() -> Self {
        Self {
            matrix: Matrix4::identity(),
        }
    }

    /// Translation by `(dx, dy, dz)`.
    pub fn translation(dx: f64, dy: f64, dz: f64) -> Self {
        let mut m = Matrix4::identity();
        m[(0, 3)] = dx;
        m[(1, 3)] = dy;
        m[(2, 3)] = dz;
        Self { matrix: m }
    }

    /// Rotation about the X axis by `angle` radians.
    pub fn rotation_x(angle: f64) -> Self {
        let (s, c) = angle.sin_cos();
        let mut m = Matrix4::identity();
        m[(1, 1)] = c;
        m[(1, 2)] = -s;
        m[(2, 1)] = s;
        m[(2, 2)] = c;
        Self { matrix: m }
    }

    /// Rotation about the Y axis by `angle` radians.
    pub fn rotation_y(angle: f64) -> Self {
        let (s, c) = angle.sin_cos();
        let mut m = Matrix4::identity();
        m[(0, 0)] = c;
        m[(0, 2)] = s;
        m[(2, 0)] = -s;
        m[(2, 2)] = c;
        Self { matrix: m }
    }

    /// Build a placement transform from a position and a row-major 3x3
    /// rotation/scale block, the way a part reference line stores it.
    pub fn from_placement(position: [f64; 3], rows: [[f64; 3]; 3]) -> Self {
        let mut m = Matrix4::identity();
        for (r, row) in rows.iter().enumerate() {
            for (c, value) in row.iter().enumerate() {
                m[(r, c)] = *value;
            }
            m[(r, 3)] = position[r];
        }
        Self { matrix: m }
    }

    /// The rotation used for every instruction-book view: elevate by
    /// `x_degrees`, then turn by `y_degrees`.
    pub fn view_rotation(x_degrees: f64, y_degrees: f64) -> Self {
        Self::rotation_x(x_degrees.to_radians()).then(&Self::rotation_y(y_degrees.to_radians()))
    }

    /// The standard instruction-book view rotation.
    pub fn default_view() -> Self {
        Self::view_rotation(DEFAULT_VIEW_X_DEGREES, DEFAULT_VIEW_Y_DEGREES)
    }

    /// Compose: `self` then `other` (self * other).
    pub fn then(&self, other: &Transform) -> Self {
        Self {
            matrix: self.matrix * other.matrix,
        }
    }

    /// Transform a point.
    pub fn apply_point(&self, p: &Point3) -> Point3 {
        let v = self.matrix * Vector4::new(p.x, p.y, p.z, 1.0);
        Point3::new(v.x, v.y, v.z)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

/// Unit normal of the plane through `a`, `b`, `c` (counter-clockwise).
///
/// Returns the zero vector for degenerate (collinear) input.
pub fn face_normal(a: &Point3, b: &Point3, c: &Point3) -> Vec3 {
    let n = (b - a).cross(&(c - a));
    let len = n.norm();
    if len > 0.0 {
        n / len
    } else {
        Vec3::zeros()
    }
}
