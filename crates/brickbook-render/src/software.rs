//! CPU display-list recorder and orthographic rasterizer.
//!
//! Good enough to measure silhouettes and export previews; no lighting model
//! beyond a single directional Lambert term, no anti-aliasing.

use std::collections::HashMap;

use brickbook_ir::{ColorCode, EDGE_COLOR, INHERIT_COLOR};
use brickbook_math::{face_normal, Point3, Transform, Vec3};

use crate::backend::{ListId, RenderBackend, SurfaceId, View, Winding};
use crate::error::{RenderError, Result};
use crate::palette::{self, DEFAULT_COLOR};
use crate::pixels::PixelBuffer;

/// Deepest chain of nested list calls replayed before giving up.
pub const MAX_CALL_DEPTH: usize = 64;

/// Largest surface edge accepted by default.
pub const DEFAULT_MAX_SURFACE_SIZE: u32 = 4096;

/// One recorded display-list command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Replay another list.
    CallList(ListId),
    /// Push a color.
    PushColor(ColorCode),
    /// Pop a color.
    PopColor,
    /// Push a winding.
    PushWinding(Winding),
    /// Pop a winding.
    PopWinding,
    /// Push a transform.
    PushTransform(Transform),
    /// Pop a transform.
    PopTransform,
    /// Filled polygon.
    Polygon {
        /// Color code, possibly an inherit code.
        color: ColorCode,
        /// Corners in model space.
        points: Vec<Point3>,
    },
}

struct Surface {
    pixels: PixelBuffer,
    depth: Vec<f64>,
}

impl Surface {
    fn new(width: u32, height: u32) -> Self {
        Self {
            pixels: PixelBuffer::new(width, height),
            depth: vec![f64::INFINITY; width as usize * height as usize],
        }
    }

    fn clear(&mut self) {
        self.pixels.clear();
        self.depth.fill(f64::INFINITY);
    }
}

/// Software implementation of [`RenderBackend`].
pub struct SoftwareRenderer {
    lists: Vec<Vec<Command>>,
    recording: Option<(ListId, Vec<Command>)>,
    surfaces: HashMap<SurfaceId, Surface>,
    next_surface: u32,
    surface_history: Vec<(u32, u32)>,
    max_surface_size: u32,
}

impl Default for SoftwareRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl SoftwareRenderer {
    /// Create a renderer with no lists and no surfaces.
    pub fn new() -> Self {
        Self {
            lists: Vec::new(),
            recording: None,
            surfaces: HashMap::new(),
            next_surface: 0,
            surface_history: Vec::new(),
            max_surface_size: DEFAULT_MAX_SURFACE_SIZE,
        }
    }

    /// Limit the edge length of surfaces this renderer will create.
    pub fn with_max_surface_size(mut self, max: u32) -> Self {
        self.max_surface_size = max;
        self
    }

    /// Commands recorded into `list`.
    pub fn commands(&self, list: ListId) -> Option<&[Command]> {
        self.lists.get(list.0 as usize).map(Vec::as_slice)
    }

    /// Surfaces created and not yet released.
    pub fn live_surfaces(&self) -> usize {
        self.surfaces.len()
    }

    /// Sizes of every surface ever created, in creation order.
    pub fn surface_history(&self) -> &[(u32, u32)] {
        &self.surface_history
    }

    fn record(&mut self, command: Command) {
        match &mut self.recording {
            Some((_, commands)) => commands.push(command),
            None => tracing::trace!(?command, "command issued outside a display list ignored"),
        }
    }
}

impl RenderBackend for SoftwareRenderer {
    fn begin_list(&mut self) -> Result<ListId> {
        if let Some((open, _)) = &self.recording {
            return Err(RenderError::ListAlreadyOpen(*open));
        }
        let id = ListId(self.lists.len() as u32);
        self.lists.push(Vec::new());
        self.recording = Some((id, Vec::new()));
        Ok(id)
    }

    fn end_list(&mut self) -> Result<()> {
        let (id, commands) = self.recording.take().ok_or(RenderError::NoOpenList)?;
        self.lists[id.0 as usize] = commands;
        Ok(())
    }

    fn call_list(&mut self, list: ListId) {
        self.record(Command::CallList(list));
    }

    fn push_color(&mut self, color: ColorCode) {
        self.record(Command::PushColor(color));
    }

    fn pop_color(&mut self) {
        self.record(Command::PopColor);
    }

    fn push_winding(&mut self, winding: Winding) {
        self.record(Command::PushWinding(winding));
    }

    fn pop_winding(&mut self) {
        self.record(Command::PopWinding);
    }

    fn push_transform(&mut self, transform: &Transform) {
        self.record(Command::PushTransform(transform.clone()));
    }

    fn pop_transform(&mut self) {
        self.record(Command::PopTransform);
    }

    fn draw_polygon(&mut self, color: ColorCode, points: &[Point3]) {
        self.record(Command::Polygon {
            color,
            points: points.to_vec(),
        });
    }

    fn create_surface(&mut self, width: u32, height: u32) -> Result<SurfaceId> {
        if width == 0 || height == 0 || width > self.max_surface_size || height > self.max_surface_size {
            return Err(RenderError::InvalidSurfaceSize {
                width,
                height,
                max: self.max_surface_size,
            });
        }
        let id = SurfaceId(self.next_surface);
        self.next_surface += 1;
        self.surfaces.insert(id, Surface::new(width, height));
        self.surface_history.push((width, height));
        tracing::debug!(?id, width, height, "offscreen surface created");
        Ok(id)
    }

    fn release_surface(&mut self, surface: SurfaceId) {
        if self.surfaces.remove(&surface).is_some() {
            tracing::debug!(id = ?surface, "offscreen surface released");
        }
    }

    fn render(&mut self, surface: SurfaceId, list: ListId, view: &View) -> Result<()> {
        let mut target = self
            .surfaces
            .remove(&surface)
            .ok_or(RenderError::UnknownSurface(surface))?;
        target.clear();

        let result = Replay::new(&self.lists, &mut target, view).run(list, 0);
        self.surfaces.insert(surface, target);
        result
    }

    fn read_pixels(&self, surface: SurfaceId) -> Result<PixelBuffer> {
        self.surfaces
            .get(&surface)
            .map(|s| s.pixels.clone())
            .ok_or(RenderError::UnknownSurface(surface))
    }

    fn list_count(&self) -> usize {
        self.lists.len()
    }
}

/// State of one list replay onto a surface.
struct Replay<'a> {
    lists: &'a [Vec<Command>],
    target: &'a mut Surface,
    view: &'a View,
    transforms: Vec<Transform>,
    colors: Vec<ColorCode>,
    windings: Vec<Winding>,
}

impl<'a> Replay<'a> {
    fn new(lists: &'a [Vec<Command>], target: &'a mut Surface, view: &'a View) -> Self {
        Self {
            lists,
            target,
            view,
            transforms: vec![Transform::identity()],
            colors: vec![DEFAULT_COLOR],
            windings: vec![Winding::CounterClockwise],
        }
    }

    fn color(&self) -> ColorCode {
        self.colors.last().copied().unwrap_or(DEFAULT_COLOR)
    }

    fn winding(&self) -> Winding {
        self.windings.last().copied().unwrap_or_default()
    }

    fn transform(&self) -> Transform {
        self.transforms.last().cloned().unwrap_or_default()
    }

    fn run(&mut self, list: ListId, depth: usize) -> Result<()> {
        if depth > MAX_CALL_DEPTH {
            return Err(RenderError::CallDepthExceeded(MAX_CALL_DEPTH));
        }
        let lists = self.lists;
        let commands = lists
            .get(list.0 as usize)
            .ok_or(RenderError::UnknownList(list))?;

        for command in commands {
            match command {
                Command::CallList(inner) => self.run(*inner, depth + 1)?,
                Command::PushColor(code) => {
                    let resolved = if *code == INHERIT_COLOR { self.color() } else { *code };
                    self.colors.push(resolved);
                }
                Command::PopColor => {
                    if self.colors.len() > 1 {
                        self.colors.pop();
                    }
                }
                Command::PushWinding(winding) => self.windings.push(*winding),
                Command::PopWinding => {
                    if self.windings.len() > 1 {
                        self.windings.pop();
                    }
                }
                Command::PushTransform(t) => {
                    let combined = self.transform().then(t);
                    self.transforms.push(combined);
                }
                Command::PopTransform => {
                    if self.transforms.len() > 1 {
                        self.transforms.pop();
                    }
                }
                Command::Polygon { color, points } => self.fill(*color, points),
            }
        }
        Ok(())
    }

    fn fill(&mut self, color: ColorCode, points: &[Point3]) {
        if points.len() < 3 {
            return;
        }
        let rgb = match color {
            INHERIT_COLOR => palette::rgb(self.color()),
            EDGE_COLOR => palette::edge_rgb(self.color()),
            code => palette::rgb(code),
        };

        let to_view = self.view.rotation.then(&self.transform());
        let projected: Vec<Point3> = points.iter().map(|p| to_view.apply_point(p)).collect();

        let mut normal = face_normal(&projected[0], &projected[1], &projected[2]);
        if self.winding() == Winding::Clockwise {
            normal = -normal;
        }
        let shade = 0.35 + 0.65 * normal.dot(&light_direction()).max(0.0);
        let rgba = [
            (rgb[0] as f64 * shade) as u8,
            (rgb[1] as f64 * shade) as u8,
            (rgb[2] as f64 * shade) as u8,
            255,
        ];

        let cx = self.target.pixels.width() as f64 / 2.0;
        let cy = self.target.pixels.height() as f64 / 2.0;
        let scale = self.view.scale;
        let screen: Vec<Point3> = projected
            .iter()
            .map(|p| Point3::new(cx + p.x * scale, cy + p.y * scale, p.z))
            .collect();

        for i in 1..screen.len() - 1 {
            raster_triangle(self.target, [screen[0], screen[i], screen[i + 1]], rgba);
        }
    }
}

fn light_direction() -> Vec3 {
    Vec3::new(-0.4, -0.7, -0.6).normalize()
}

fn edge(a: &Point3, b: &Point3, px: f64, py: f64) -> f64 {
    (b.x - a.x) * (py - a.y) - (b.y - a.y) * (px - a.x)
}

/// Fill a screen-space triangle with depth testing (smaller z is nearer).
fn raster_triangle(target: &mut Surface, [a, b, c]: [Point3; 3], rgba: [u8; 4]) {
    let area = edge(&a, &b, c.x, c.y);
    if area.abs() < 1e-12 {
        return;
    }
    let width = target.pixels.width() as i64;
    let height = target.pixels.height() as i64;

    let min_x = (a.x.min(b.x).min(c.x).floor() as i64).max(0);
    let max_x = (a.x.max(b.x).max(c.x).ceil() as i64).min(width - 1);
    let min_y = (a.y.min(b.y).min(c.y).floor() as i64).max(0);
    let max_y = (a.y.max(b.y).max(c.y).ceil() as i64).min(height - 1);
    if min_x > max_x || min_y > max_y {
        return;
    }

    for y in min_y..=max_y {
        for x in min_x..=max_x {
            let px = x as f64 + 0.5;
            let py = y as f64 + 0.5;
            let w0 = edge(&b, &c, px, py);
            let w1 = edge(&c, &a, px, py);
            let w2 = edge(&a, &b, px, py);
            let inside = (w0 >= 0.0 && w1 >= 0.0 && w2 >= 0.0) || (w0 <= 0.0 && w1 <= 0.0 && w2 <= 0.0);
            if !inside {
                continue;
            }
            let z = (w0 * a.z + w1 * b.z + w2 * c.z) / area;
            let idx = (y * width + x) as usize;
            if z < target.depth[idx] {
                target.depth[idx] = z;
                target.pixels.set_pixel(x as u32, y as u32, rgba);
            }
        }
    }
}
