//! Data models shared by every pipeline stage.

pub mod config;
pub mod document;
pub mod outcome;
pub mod receipt;

pub use config::{DocpipeConfig, LoaderConfig, ProcessingConfig};
pub use document::{DocumentType, StageFailure, StageOutput, StatusCode, RECEIPT};
pub use outcome::{ExtractedData, PipelineFailure, PipelineOutcome, PipelineStage, PipelineStatus};
pub use receipt::{Discount, PaymentMethod, Receipt, ReceiptItem, TaxBreakdown};
