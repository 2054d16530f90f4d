//! The capability set the instruction engine needs from a renderer.

use brickbook_ir::ColorCode;
use brickbook_math::{Point3, Transform};

use crate::error::Result;
use crate::PixelBuffer;

/// Handle to a compiled display list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListId(pub u32);

/// Handle to an offscreen surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceId(pub u32);

/// Front-face winding order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Winding {
    /// Counter-clockwise polygons face the viewer.
    #[default]
    CounterClockwise,
    /// Clockwise polygons face the viewer (inverted or mirrored parts).
    Clockwise,
}

impl Winding {
    /// The opposite winding.
    pub fn flipped(self) -> Self {
        match self {
            Winding::CounterClockwise => Winding::Clockwise,
            Winding::Clockwise => Winding::CounterClockwise,
        }
    }
}

/// Camera used when rendering a list to a surface.
///
/// The model origin lands on the surface center; `scale` is pixels per LDU.
#[derive(Debug, Clone, PartialEq)]
pub struct View {
    /// Rotation applied before projection.
    pub rotation: Transform,
    /// Pixels per model unit.
    pub scale: f64,
}

impl View {
    /// View rotated by the given angles (degrees) with the given scale.
    pub fn new(x_degrees: f64, y_degrees: f64, scale: f64) -> Self {
        Self {
            rotation: Transform::view_rotation(x_degrees, y_degrees),
            scale,
        }
    }
}

impl Default for View {
    fn default() -> Self {
        Self {
            rotation: Transform::default_view(),
            scale: 1.0,
        }
    }
}

/// Display-list renderer.
///
/// Lists are recorded between [`begin_list`](RenderBackend::begin_list) and
/// [`end_list`](RenderBackend::end_list); state calls made while recording
/// become part of the list and are replayed every time the list is called.
/// Every push must be matched by the corresponding pop inside the same list.
pub trait RenderBackend {
    /// Allocate a new list handle and start recording into it.
    fn begin_list(&mut self) -> Result<ListId>;

    /// Finish the list being recorded.
    fn end_list(&mut self) -> Result<()>;

    /// Replay a previously compiled list.
    fn call_list(&mut self, list: ListId);

    /// Set the current color; [`brickbook_ir::INHERIT_COLOR`] keeps the enclosing one.
    fn push_color(&mut self, color: ColorCode);

    /// Restore the color active before the matching push.
    fn pop_color(&mut self);

    /// Set the front-face winding.
    fn push_winding(&mut self, winding: Winding);

    /// Restore the winding active before the matching push.
    fn pop_winding(&mut self);

    /// Multiply the current transform by `transform`.
    fn push_transform(&mut self, transform: &Transform);

    /// Restore the transform active before the matching push.
    fn pop_transform(&mut self);

    /// Draw a filled convex polygon. `color` may be an inherit code.
    fn draw_polygon(&mut self, color: ColorCode, points: &[Point3]);

    /// Allocate an offscreen surface.
    fn create_surface(&mut self, width: u32, height: u32) -> Result<SurfaceId>;

    /// Release a surface. Releasing an unknown surface is a no-op.
    fn release_surface(&mut self, surface: SurfaceId);

    /// Clear `surface` and render `list` into it, centered, through `view`.
    fn render(&mut self, surface: SurfaceId, list: ListId, view: &View) -> Result<()>;

    /// Read back the surface contents.
    fn read_pixels(&self, surface: SurfaceId) -> Result<PixelBuffer>;

    /// Number of display lists allocated so far.
    fn list_count(&self) -> usize;
}

/// An offscreen surface that is released when dropped.
///
/// Holds the backend mutably for its whole lifetime, so at most one scoped
/// surface exists per backend at a time.
pub struct ScopedSurface<'a, B: RenderBackend + ?Sized> {
    backend: &'a mut B,
    id: SurfaceId,
    size: (u32, u32),
}

impl<'a, B: RenderBackend + ?Sized> ScopedSurface<'a, B> {
    /// The underlying surface handle.
    pub fn id(&self) -> SurfaceId {
        self.id
    }

    /// Surface size in pixels.
    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    /// Render a list into this surface and read the result back.
    pub fn capture(&mut self, list: ListId, view: &View) -> Result<PixelBuffer> {
        self.backend.render(self.id, list, view)?;
        self.backend.read_pixels(self.id)
    }
}

impl<B: RenderBackend + ?Sized> Drop for ScopedSurface<'_, B> {
    fn drop(&mut self) {
        self.backend.release_surface(self.id);
    }
}

/// Create a surface on `backend` that is released when the guard drops.
pub fn acquire_surface<B: RenderBackend + ?Sized>(
    backend: &mut B,
    width: u32,
    height: u32,
) -> Result<ScopedSurface<'_, B>> {
    let id = backend.create_surface(width, height)?;
    Ok(ScopedSurface {
        backend,
        id,
        size: (width, height),
    })
}
