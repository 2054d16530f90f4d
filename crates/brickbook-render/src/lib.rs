//! Display-list rendering for brickbook.
//!
//! This crate provides the render capabilities the instruction engine relies on:
//! - [`RenderBackend`]: record/call display lists, scoped color, winding and
//!   transform state, offscreen surfaces and pixel read-back
//! - [`ScopedSurface`]: surfaces released deterministically on drop
//! - [`SoftwareRenderer`]: a CPU implementation used for measurement and export
//!
//! # Example
//!
//! ```
//! use brickbook_math::Point3;
//! use brickbook_render::{acquire_surface, RenderBackend, SoftwareRenderer, View};
//!
//! let mut renderer = SoftwareRenderer::new();
//! let list = renderer.begin_list().unwrap();
//! renderer.draw_polygon(
//!     4,
//!     &[
//!         Point3::new(-5.0, -5.0, 0.0),
//!         Point3::new(5.0, -5.0, 0.0),
//!         Point3::new(0.0, 5.0, 0.0),
//!     ],
//! );
//! renderer.end_list().unwrap();
//!
//! let mut surface = acquire_surface(&mut renderer, 64, 64).unwrap();
//! let pixels = surface.capture(list, &View::default()).unwrap();
//! assert!(pixels.content_bounds().is_some());
//! ```

#![warn(missing_docs)]

mod backend;
mod error;
pub mod palette;
mod pixels;
mod software;

pub use backend::{acquire_surface, ListId, RenderBackend, ScopedSurface, SurfaceId, View, Winding};
pub use error::{RenderError, Result};
pub use pixels::{PixelBuffer, PixelRect};
pub use software::{Command, SoftwareRenderer, MAX_CALL_DEPTH};
