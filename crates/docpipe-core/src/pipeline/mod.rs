//! Pipeline orchestrating processing, ensemble classification, routing and extraction.

mod vote;
#[cfg(test)]
mod tests;

pub use vote::plurality;

use std::any::Any;
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use image::{DynamicImage, GenericImageView};
use tracing::{debug, error, info, warn};

use crate::classifier::DocumentClassifier;
use crate::error::{DocpipeError, PipelineError};
use crate::extractor::DocumentExtractor;
use crate::loader::{FsImageLoader, ImageLoader, ImageSource};
use crate::models::config::DocpipeConfig;
use crate::models::{
    DocumentType, PipelineFailure, PipelineOutcome, PipelineStage, StageOutput,
    StatusCode,
};
use crate::processors::DocumentProcessor;

/// Routes one document image through processors, classifiers and an extractor.
///
/// The pipeline owns its components. Every classifier-supported document type
/// must have an extractor targeting it; this is checked again on every
/// [`process`](Self::process) call so that a pipeline mutated between calls
/// is always validated against its current state.
pub struct DocumentPipeline {
    loader: Box<dyn ImageLoader>,
    processors: Vec<Box<dyn DocumentProcessor>>,
    classifiers: Vec<Box<dyn DocumentClassifier>>,
    extractors: Vec<Box<dyn DocumentExtractor>>,
}

/// Builder for DocumentPipeline.
pub struct DocumentPipelineBuilder {
    loader: Box<dyn ImageLoader>,
    processors: Vec<Box<dyn DocumentProcessor>>,
    classifiers: Vec<Box<dyn DocumentClassifier>>,
    extractors: Vec<Box<dyn DocumentExtractor>>,
}

impl DocumentPipelineBuilder {
    /// Create a new builder with a filesystem loader and no components.
    pub fn new() -> Self {
        Self {
            loader: Box::new(FsImageLoader::new()),
            processors: Vec::new(),
            classifiers: Vec::new(),
            extractors: Vec::new(),
        }
    }

    /// Use the loader and processor chain described by `config`.
    pub fn with_config(mut self, config: &DocpipeConfig) -> Self {
        let mut loader = FsImageLoader::new();
        if let Some(dir) = &config.loader.input_dir {
            loader = loader.with_base_dir(dir);
        }
        self.loader = Box::new(loader);
        self.processors.extend(config.processing.build_processors());
        self
    }

    /// Set the image loader.
    pub fn with_loader(mut self, loader: impl ImageLoader + 'static) -> Self {
        self.loader = Box::new(loader);
        self
    }

    /// Append a processor.
    pub fn with_processor(mut self, processor: impl DocumentProcessor + 'static) -> Self {
        self.processors.push(Box::new(processor));
        self
    }

    /// Add a classifier.
    pub fn with_classifier(mut self, classifier: impl DocumentClassifier + 'static) -> Self {
        self.classifiers.push(Box::new(classifier));
        self
    }

    /// Add an extractor.
    pub fn with_extractor(mut self, extractor: impl DocumentExtractor + 'static) -> Self {
        self.extractors.push(Box::new(extractor));
        self
    }

    /// Build the pipeline, applying the same checks as the mutation API.
    pub fn build(self) -> Result<DocumentPipeline, PipelineError> {
        let mut pipeline = DocumentPipeline::with_loader(self.loader);
        pipeline.add_processors(self.processors)?;
        pipeline.add_classifiers(self.classifiers)?;
        pipeline.add_extractors(self.extractors)?;
        Ok(pipeline)
    }
}

impl Default for DocumentPipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentPipeline {
    /// Create an empty pipeline with a filesystem loader.
    pub fn new() -> Self {
        Self::with_loader(Box::new(FsImageLoader::new()))
    }

    /// Create an empty pipeline using `loader` to resolve image references.
    pub fn with_loader(loader: Box<dyn ImageLoader>) -> Self {
        Self {
            loader,
            processors: Vec::new(),
            classifiers: Vec::new(),
            extractors: Vec::new(),
        }
    }

    /// Create a new builder.
    pub fn builder() -> DocumentPipelineBuilder {
        DocumentPipelineBuilder::new()
    }

    /// Registered processors, in application order.
    pub fn processors(&self) -> &[Box<dyn DocumentProcessor>] {
        &self.processors
    }

    /// Registered classifiers, in registration order.
    pub fn classifiers(&self) -> &[Box<dyn DocumentClassifier>] {
        &self.classifiers
    }

    /// Registered extractors.
    pub fn extractors(&self) -> &[Box<dyn DocumentExtractor>] {
        &self.extractors
    }

    /// Replace the image loader.
    pub fn set_loader(&mut self, loader: Box<dyn ImageLoader>) {
        self.loader = loader;
    }

    /// Append a processor to the chain.
    pub fn add_processor(&mut self, processor: Box<dyn DocumentProcessor>) -> Result<(), PipelineError> {
        self.add_processors(vec![processor])
    }

    /// Append processors; nothing is added unless all of them are accepted.
    pub fn add_processors(
        &mut self,
        processors: Vec<Box<dyn DocumentProcessor>>,
    ) -> Result<(), PipelineError> {
        let mut names: HashSet<&str> = self.processors.iter().map(|p| p.name()).collect();
        for processor in &processors {
            if !names.insert(processor.name()) {
                return Err(PipelineError::DuplicateComponent {
                    kind: "processor",
                    name: processor.name().to_string(),
                });
            }
        }

        self.processors.extend(processors);
        Ok(())
    }

    /// Add a classifier to the ensemble.
    pub fn add_classifier(
        &mut self,
        classifier: Box<dyn DocumentClassifier>,
    ) -> Result<(), PipelineError> {
        self.add_classifiers(vec![classifier])
    }

    /// Add classifiers; nothing is added unless all of them are accepted.
    pub fn add_classifiers(
        &mut self,
        classifiers: Vec<Box<dyn DocumentClassifier>>,
    ) -> Result<(), PipelineError> {
        let mut names: HashSet<&str> = self.classifiers.iter().map(|c| c.name()).collect();
        for classifier in &classifiers {
            if !names.insert(classifier.name()) {
                return Err(PipelineError::DuplicateComponent {
                    kind: "classifier",
                    name: classifier.name().to_string(),
                });
            }
            if classifier.supported_types().is_empty() {
                return Err(PipelineError::NoSupportedTypes(classifier.name().to_string()));
            }
        }

        self.classifiers.extend(classifiers);
        Ok(())
    }

    /// Add an extractor.
    pub fn add_extractor(
        &mut self,
        extractor: Box<dyn DocumentExtractor>,
    ) -> Result<(), PipelineError> {
        self.add_extractors(vec![extractor])
    }

    /// Add extractors; nothing is added unless all of them are accepted.
    pub fn add_extractors(
        &mut self,
        extractors: Vec<Box<dyn DocumentExtractor>>,
    ) -> Result<(), PipelineError> {
        let mut names: HashSet<&str> = self.extractors.iter().map(|e| e.name()).collect();
        let mut targets: HashSet<&DocumentType> =
            self.extractors.iter().map(|e| e.target_type()).collect();

        for extractor in &extractors {
            if !names.insert(extractor.name()) {
                return Err(PipelineError::DuplicateComponent {
                    kind: "extractor",
                    name: extractor.name().to_string(),
                });
            }
            if !targets.insert(extractor.target_type()) {
                return Err(PipelineError::DuplicateTargetType(
                    extractor.target_type().to_string(),
                ));
            }
        }

        self.extractors.extend(extractors);
        Ok(())
    }

    /// Classifier-supported document types that no extractor targets.
    pub fn missing_extractor_types(&self) -> BTreeSet<DocumentType> {
        let targets: HashSet<&DocumentType> =
            self.extractors.iter().map(|e| e.target_type()).collect();

        self.classifiers
            .iter()
            .flat_map(|c| c.supported_types())
            .filter(|t| !targets.contains(t))
            .cloned()
            .collect()
    }

    /// Whether the pipeline can currently process documents.
    pub fn is_valid(&self) -> bool {
        self.configuration_failure().is_none()
    }

    fn configuration_failure(&self) -> Option<PipelineFailure> {
        if self.classifiers.is_empty() {
            return Some(PipelineFailure::new(
                PipelineStage::Validating,
                StatusCode::UnsupportedType,
                "Pipeline has no classifiers",
            ));
        }

        let missing = self.missing_extractor_types();
        if missing.is_empty() {
            return None;
        }

        let missing = missing
            .iter()
            .map(DocumentType::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        Some(PipelineFailure::new(
            PipelineStage::Validating,
            StatusCode::UnsupportedType,
            format!("Missing extractors for document types: {}", missing),
        ))
    }

    /// Process one document image.
    ///
    /// Returns `Err` only for programmer errors (an empty image reference).
    /// Every data-driven failure, including an invalid pipeline configuration,
    /// is reported as [`PipelineOutcome::Error`].
    pub fn process(
        &self,
        source: impl Into<ImageSource>,
    ) -> Result<PipelineOutcome, PipelineError> {
        let source = source.into();
        if source.is_empty() {
            return Err(PipelineError::EmptyInput);
        }

        let start = Instant::now();
        let outcome = self.run(source);

        match &outcome {
            PipelineOutcome::Success(_) => {
                info!("Document processed in {}ms", start.elapsed().as_millis());
            }
            PipelineOutcome::Error(failure) => {
                warn!("Document processing failed: {}", failure);
            }
        }

        Ok(outcome)
    }

    fn run(&self, source: ImageSource) -> PipelineOutcome {
        if let Some(failure) = self.configuration_failure() {
            return PipelineOutcome::Error(failure);
        }

        let image = match self.loader.resolve(source) {
            Ok(image) => image,
            Err(e) => {
                return PipelineOutcome::failed(
                    PipelineStage::Loading,
                    StatusCode::InvalidInput,
                    format!("Error in reading image: {}", e),
                );
            }
        };

        let (width, height) = image.dimensions();
        info!("Processing document image: {}x{}", width, height);

        let image = self.apply_processors(image);

        let verdicts = self.classify(&image);
        let Some((winner, votes)) = plurality(&verdicts) else {
            return PipelineOutcome::failed(
                PipelineStage::Classifying,
                StatusCode::UnknownError,
                "No classifier verdicts",
            );
        };
        debug!(
            "Ensemble verdict {} with {}/{} votes",
            winner.status(),
            votes,
            verdicts.len()
        );

        let document_type = match winner {
            StageOutput::Ok(document_type) => document_type,
            StageOutput::Failed(failure) => {
                return PipelineOutcome::failed(
                    PipelineStage::Classifying,
                    failure.status(),
                    format!("Error in classifying document type: {}", failure.message()),
                );
            }
        };

        let Some(extractor) = self
            .extractors
            .iter()
            .find(|e| e.target_type() == document_type)
        else {
            return PipelineOutcome::failed(
                PipelineStage::Routing,
                StatusCode::UnsupportedType,
                format!("No extractor found for document type: {}", document_type),
            );
        };
        debug!(
            "Routing '{}' document to extractor '{}'",
            document_type,
            extractor.name()
        );

        let output = guarded(extractor.name(), || extractor.extract(&image));
        match output {
            StageOutput::Ok(data) => PipelineOutcome::Success(data),
            StageOutput::Failed(failure) => PipelineOutcome::failed(
                PipelineStage::Extracting,
                failure.status(),
                format!("Error in extracting document data: {}", failure.message()),
            ),
        }
    }

    /// Load an image and run it through the processor chain only.
    pub fn preprocess(&self, source: impl Into<ImageSource>) -> Result<DynamicImage, DocpipeError> {
        let source = source.into();
        if source.is_empty() {
            return Err(PipelineError::EmptyInput.into());
        }

        let image = self.loader.resolve(source)?;
        Ok(self.apply_processors(image))
    }

    fn apply_processors(&self, mut image: DynamicImage) -> DynamicImage {
        for processor in &self.processors {
            let result = panic::catch_unwind(AssertUnwindSafe(|| processor.process(&image)));
            match result {
                Ok(Ok(processed)) => image = processed,
                Ok(Err(e)) => {
                    warn!(
                        "Processor '{}' failed, passing image through: {}",
                        processor.name(),
                        e
                    );
                }
                Err(payload) => {
                    warn!(
                        "Processor '{}' panicked, passing image through: {}",
                        processor.name(),
                        panic_message(payload.as_ref())
                    );
                }
            }
        }
        image
    }

    fn classify(&self, image: &DynamicImage) -> Vec<StageOutput<DocumentType>> {
        self.classifiers
            .iter()
            .map(|classifier| {
                let verdict = guarded(classifier.name(), || classifier.classify(image));
                if let StageOutput::Ok(document_type) = &verdict {
                    if !classifier.supports_type(document_type) {
                        warn!(
                            "Classifier '{}' reported undeclared document type '{}'",
                            classifier.name(),
                            document_type
                        );
                    }
                }
                debug!("Classifier '{}' verdict: {}", classifier.name(), verdict.status());
                verdict
            })
            .collect()
    }
}

impl Default for DocumentPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DocumentPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentPipeline")
            .field(
                "processors",
                &self.processors.iter().map(|p| p.name()).collect::<Vec<_>>(),
            )
            .field(
                "classifiers",
                &self.classifiers.iter().map(|c| c.name()).collect::<Vec<_>>(),
            )
            .field(
                "extractors",
                &self
                    .extractors
                    .iter()
                    .map(|e| (e.name(), e.target_type().as_str()))
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Run a component call, turning a panic into an `UNKNOWN_ERROR` output.
fn guarded<T>(name: &str, call: impl FnOnce() -> StageOutput<T>) -> StageOutput<T> {
    panic::catch_unwind(AssertUnwindSafe(call)).unwrap_or_else(|payload| {
        let message = panic_message(payload.as_ref());
        error!("Component '{}' panicked: {}", name, message);
        StageOutput::failed(
            StatusCode::UnknownError,
            format!("Component '{}' panicked: {}", name, message),
        )
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

