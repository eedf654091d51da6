//! Image-to-image transforms applied before classification.

mod converter;
mod resizer;

pub use converter::{ColorFormat, FormatConverter};
pub use resizer::{ImageResizer, ResizeTier};

use image::DynamicImage;

use crate::error::ProcessingError;

/// Result type for processor operations.
pub type Result<T> = std::result::Result<T, ProcessingError>;

/// A cosmetic transform on a document image.
///
/// Processors are fail-open: an `Err` (or a panic) is logged by the pipeline
/// and the input image is passed to the next stage unchanged.
pub trait DocumentProcessor: Send + Sync {
    /// Unique name of this processor within a pipeline.
    fn name(&self) -> &str;

    /// Transform the image.
    fn process(&self, image: &DynamicImage) -> Result<DynamicImage>;
}
