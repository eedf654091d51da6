//! Document extractor contract.

use image::DynamicImage;

use crate::models::{DocumentType, ExtractedData, StageOutput};

/// Converts an image of a known document type into a structured record.
///
/// Like classifiers, extractors are total: failures are reported as a failed
/// [`StageOutput`], never through another channel.
pub trait DocumentExtractor: Send + Sync {
    /// Unique name of this extractor within a pipeline.
    fn name(&self) -> &str;

    /// The single document type this extractor handles.
    fn target_type(&self) -> &DocumentType;

    /// Extract structured data from the image.
    fn extract(&self, image: &DynamicImage) -> StageOutput<ExtractedData>;
}
