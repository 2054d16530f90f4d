//! Error types for model loading, compilation and measurement.

use brickbook_render::RenderError;
use thiserror::Error;

/// Fatal errors. Recoverable conditions are reported as
/// [`Diagnostic`](crate::Diagnostic)s instead.
#[derive(Error, Debug)]
pub enum ModelError {
    /// A referenced file or embedded section does not exist.
    #[error("part not found: {0}")]
    NotFound(String),

    /// A definition references itself, directly or through its children.
    #[error("cyclic part reference: {}", .0.join(" -> "))]
    CyclicReference(Vec<String>),

    /// A display list was needed before its definition was compiled.
    #[error("part {0} has not been compiled")]
    Uncompiled(String),

    /// The dimension cache does not match the loaded model.
    #[error("stale dimension cache: {0}")]
    StaleCache(String),

    /// Invalid book settings.
    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    /// Render backend failure.
    #[error("render error: {0}")]
    Render(#[from] RenderError),

    /// I/O error reading or writing a file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Malformed TOML settings.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl ModelError {
    /// Create a stale cache error.
    pub fn stale(reason: impl Into<String>) -> Self {
        Self::StaleCache(reason.into())
    }

    /// Create an invalid settings error.
    pub fn settings(message: impl Into<String>) -> Self {
        Self::InvalidSettings(message.into())
    }
}

/// Result type for brickbook operations.
pub type Result<T> = std::result::Result<T, ModelError>;
