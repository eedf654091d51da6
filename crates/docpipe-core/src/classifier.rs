//! Document classifier contract.

use std::collections::BTreeMap;

use image::DynamicImage;

use crate::models::{DocumentType, StageOutput};

/// Judges which document type, if any, an image shows.
///
/// Implementations are total: every internal failure (bad input, upstream
/// service error, malformed response) must come back as a failed
/// [`StageOutput`], and an `Ok` verdict must be one of
/// [`supported_types`](Self::supported_types).
pub trait DocumentClassifier: Send + Sync {
    /// Unique name of this classifier within a pipeline.
    fn name(&self) -> &str;

    /// Document types this classifier can report.
    fn supported_types(&self) -> &[DocumentType];

    /// Classify the image.
    fn classify(&self, image: &DynamicImage) -> StageOutput<DocumentType>;

    /// Whether `document_type` is one of the supported types.
    fn supports_type(&self, document_type: &DocumentType) -> bool {
        self.supported_types().contains(document_type)
    }

    /// Describe the classifier configuration.
    fn summary(&self) -> BTreeMap<String, String> {
        let mut summary = BTreeMap::new();
        summary.insert("name".to_string(), self.name().to_string());
        summary.insert(
            "supported_document_types".to_string(),
            self.supported_types()
                .iter()
                .map(DocumentType::as_str)
                .collect::<Vec<_>>()
                .join(", "),
        );
        summary
    }
}
