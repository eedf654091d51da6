//! Extracted records and the pipeline's final outcome.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::document::{StageOutput, StatusCode};
use super::receipt::Receipt;

/// Structured record produced by an extractor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExtractedData {
    /// A parsed expense receipt.
    Receipt(Receipt),
    /// Implementation-defined record for any other document type.
    Other(serde_json::Value),
}

impl ExtractedData {
    /// Get the receipt, if this record is one.
    pub fn as_receipt(&self) -> Option<&Receipt> {
        match self {
            ExtractedData::Receipt(receipt) => Some(receipt),
            ExtractedData::Other(_) => None,
        }
    }
}

impl From<Receipt> for ExtractedData {
    fn from(receipt: Receipt) -> Self {
        ExtractedData::Receipt(receipt)
    }
}

/// Top-level status returned to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineStatus {
    #[serde(rename = "PIPELINE_OK")]
    Ok,
    #[serde(rename = "PIPELINE_ERROR")]
    Error,
}

/// Stage of the pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    /// Checking classifier/extractor consistency.
    Validating,
    /// Resolving the image reference.
    Loading,
    /// Running the processor chain.
    Processing,
    /// Running the classifier ensemble and voting.
    Classifying,
    /// Selecting the extractor for the winning type.
    Routing,
    /// Running the selected extractor.
    Extracting,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::Validating => "validating",
            PipelineStage::Loading => "loading",
            PipelineStage::Processing => "processing",
            PipelineStage::Classifying => "classifying",
            PipelineStage::Routing => "routing",
            PipelineStage::Extracting => "extracting",
        };
        f.write_str(name)
    }
}

/// Why a pipeline run failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineFailure {
    /// Stage that failed.
    pub stage: PipelineStage,

    /// Status reported by (or assigned to) the failing stage.
    pub status: StatusCode,

    /// Human-readable reason.
    pub message: String,
}

impl PipelineFailure {
    pub fn new(stage: PipelineStage, status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            stage,
            status,
            message: message.into(),
        }
    }

    /// Whether the failure comes from the pipeline setup rather than the document.
    pub fn is_configuration_error(&self) -> bool {
        self.stage == PipelineStage::Validating
    }
}

impl fmt::Display for PipelineFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed ({}): {}", self.stage, self.status, self.message)
    }
}

/// Final result of processing one document.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutcome {
    /// The document was classified and its data extracted.
    Success(ExtractedData),
    /// Some stage failed.
    Error(PipelineFailure),
}

impl PipelineOutcome {
    pub(crate) fn failed(
        stage: PipelineStage,
        status: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        PipelineOutcome::Error(PipelineFailure::new(stage, status, message))
    }

    /// Top-level status.
    pub fn status(&self) -> PipelineStatus {
        match self {
            PipelineOutcome::Success(_) => PipelineStatus::Ok,
            PipelineOutcome::Error(_) => PipelineStatus::Error,
        }
    }

    /// Whether the run succeeded.
    pub fn is_success(&self) -> bool {
        matches!(self, PipelineOutcome::Success(_))
    }

    /// The extractor's output on success.
    pub fn details(&self) -> Option<StageOutput<&ExtractedData>> {
        match self {
            PipelineOutcome::Success(data) => Some(StageOutput::Ok(data)),
            PipelineOutcome::Error(_) => None,
        }
    }

    /// The extracted record on success.
    pub fn data(&self) -> Option<&ExtractedData> {
        match self {
            PipelineOutcome::Success(data) => Some(data),
            PipelineOutcome::Error(_) => None,
        }
    }

    /// The failure, if the run failed.
    pub fn failure(&self) -> Option<&PipelineFailure> {
        match self {
            PipelineOutcome::Success(_) => None,
            PipelineOutcome::Error(failure) => Some(failure),
        }
    }
}

impl Serialize for PipelineOutcome {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Wire<'a> {
            status: PipelineStatus,
            details: WireDetails<'a>,
            #[serde(skip_serializing_if = "Option::is_none")]
            stage: Option<PipelineStage>,
            #[serde(skip_serializing_if = "Option::is_none")]
            error_status: Option<StatusCode>,
        }

        #[derive(Serialize)]
        #[serde(untagged)]
        enum WireDetails<'a> {
            Output(StageOutput<&'a ExtractedData>),
            Message(&'a str),
        }

        let wire = match self {
            PipelineOutcome::Success(data) => Wire {
                status: PipelineStatus::Ok,
                details: WireDetails::Output(StageOutput::Ok(data)),
                stage: None,
                error_status: None,
            },
            PipelineOutcome::Error(failure) => Wire {
                status: PipelineStatus::Error,
                details: WireDetails::Message(&failure.message),
                stage: Some(failure.stage),
                error_status: Some(failure.status),
            },
        };
        wire.serialize(serializer)
    }
}
