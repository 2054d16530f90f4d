//! Render backend errors.

use thiserror::Error;

use crate::{ListId, SurfaceId};

/// Errors that can occur while recording or replaying display lists.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// A list was opened while another one was still being recorded.
    #[error("Display list {0:?} is still being recorded")]
    ListAlreadyOpen(ListId),

    /// `end_list` was called with no list open.
    #[error("No display list is being recorded")]
    NoOpenList,

    /// The list handle was never allocated by this backend.
    #[error("Unknown display list {0:?}")]
    UnknownList(ListId),

    /// The surface handle is unknown or was already released.
    #[error("Unknown offscreen surface {0:?}")]
    UnknownSurface(SurfaceId),

    /// Requested surface has a zero dimension or exceeds the backend limit.
    #[error("Cannot create a {width}x{height} surface (limit {max})")]
    InvalidSurfaceSize {
        /// Requested width in pixels.
        width: u32,
        /// Requested height in pixels.
        height: u32,
        /// Largest supported edge length.
        max: u32,
    },

    /// Lists call each other deeper than the backend allows (usually a cycle).
    #[error("Display lists nested deeper than {0} calls")]
    CallDepthExceeded(usize),
}

/// Result type for render backend operations.
pub type Result<T> = std::result::Result<T, RenderError>;
