use std::path::PathBuf;

use thiserror::Error;

/// Errors returned by checkpoint-strip operations.
#[derive(Error, Debug)]
pub enum StripError {
    /// A required configuration key was absent or empty.
    #[error("Missing required configuration value: {0}")]
    MissingConfig(String),

    /// A configuration value was present but unusable.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Filesystem failure with context (directory listing, reads, writes).
    #[error("{context}: {source}")]
    Io {
        context: String,
        source: std::io::Error,
    },

    /// The workflow template is missing a node or an `inputs` mapping.
    #[error("Workflow template error: {0}")]
    Template(String),

    /// ComfyUI returned a non-success HTTP status.
    #[error("ComfyUI returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// Network-level request failure with context.
    #[error("{context}: {source}")]
    Network {
        context: String,
        source: reqwest::Error,
    },

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Image decode or encode failure.
    #[error("Image error at {path}: {source}")]
    Image {
        path: PathBuf,
        source: image::ImageError,
    },

    /// The label font could not be loaded.
    #[error("Cannot load font {path}: {reason}")]
    Font { path: PathBuf, reason: String },

    /// An output image does not match the dimensions of the first panel.
    #[error("Image {path} is {actual_width}x{actual_height}, \
             expected {expected_width}x{expected_height}")]
    SizeMismatch {
        path: PathBuf,
        expected_width: u32,
        expected_height: u32,
        actual_width: u32,
        actual_height: u32,
    },

    /// Strict mode: some checkpoints had no usable output image.
    #[error("No usable output image for checkpoints {0:?}")]
    MissingImages(Vec<u64>),
}

impl StripError {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        StripError::Io {
            context: context.into(),
            source,
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, StripError>;
