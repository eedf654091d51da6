//! Error types for the docpipe-core library.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for the docpipe library.
#[derive(Error, Debug)]
pub enum DocpipeError {
    /// Pipeline setup or precondition error.
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Image loading error.
    #[error("load error: {0}")]
    Load(#[from] LoadError),

    /// Image processing error.
    #[error("processing error: {0}")]
    Processing(#[from] ProcessingError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file could not be parsed or written.
    #[error("configuration error: {0}")]
    Config(#[from] serde_json::Error),
}

/// Programmer and setup errors raised by the pipeline.
///
/// These never depend on the document being processed: retrying with a
/// different image will not help, the caller has to fix the setup.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// No image, an empty reference, or a zero-sized image was passed in.
    #[error("an image must be provided")]
    EmptyInput,

    /// A component with the same name is already registered.
    #[error("{kind} '{name}' is already in the pipeline")]
    DuplicateComponent { kind: &'static str, name: String },

    /// Another extractor already targets this document type.
    #[error("an extractor for document type '{0}' is already in the pipeline")]
    DuplicateTargetType(String),

    /// Classifier declares no supported document types.
    #[error("classifier '{0}' must support at least one document type")]
    NoSupportedTypes(String),
}

/// Errors resolving an image reference into a decoded image.
#[derive(Error, Debug)]
pub enum LoadError {
    /// The referenced file does not exist.
    #[error("image not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Reading the referenced file failed.
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The data could not be decoded as an image.
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
}

/// Errors raised inside a processor.
///
/// The pipeline never propagates these: processors are fail-open.
#[derive(Error, Debug)]
pub enum ProcessingError {
    /// The image has a zero width or height.
    #[error("image has no pixels ({width}x{height})")]
    EmptyImage { width: u32, height: u32 },

    /// Unknown colour format name.
    #[error("unsupported color format: {0}")]
    UnsupportedFormat(String),

    /// Transform-specific failure.
    #[error("{0}")]
    Failed(String),
}

/// Result type for the docpipe library.
pub type Result<T> = std::result::Result<T, DocpipeError>;
