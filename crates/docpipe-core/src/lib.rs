//! Core library for document image pipelines.
//!
//! This crate provides:
//! - The stage contracts: processors, classifiers and extractors
//! - A pipeline running one image through processing, ensemble classification,
//!   type routing and extraction
//! - A unified per-stage success/error model and the pipeline outcome
//! - Built-in format conversion and resizing processors
//! - The receipt record schema

pub mod classifier;
pub mod error;
pub mod extractor;
pub mod loader;
pub mod models;
pub mod pipeline;
pub mod processors;

pub use classifier::DocumentClassifier;
pub use error::{DocpipeError, LoadError, PipelineError, ProcessingError, Result};
pub use extractor::DocumentExtractor;
pub use loader::{FsImageLoader, ImageLoader, ImageSource};
pub use models::config::DocpipeConfig;
pub use models::{
    DocumentType, ExtractedData, PipelineFailure, PipelineOutcome, PipelineStage, PipelineStatus,
    Receipt, StageFailure, StageOutput, StatusCode,
};
pub use pipeline::{DocumentPipeline, DocumentPipelineBuilder};
pub use processors::{ColorFormat, DocumentProcessor, FormatConverter, ImageResizer, ResizeTier};
