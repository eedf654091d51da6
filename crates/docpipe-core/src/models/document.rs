//! Document type tags, status codes and the per-stage output model.

use std::fmt;

use serde::de::{self, DeserializeOwned, Deserializer};
use serde::ser::{SerializeStruct, Serializer};
use serde::{Deserialize, Serialize};

/// Tag of the receipt document type handled by the shipped record schema.
pub const RECEIPT: &str = "receipt";

/// Identifies a category of document (e.g. a receipt).
///
/// Never empty: surrounding whitespace is trimmed and blank tags are rejected.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocumentType(String);

impl DocumentType {
    /// Create a document type tag, returning `None` for a blank tag.
    pub fn new(tag: impl Into<String>) -> Option<Self> {
        let tag = tag.into();
        let trimmed = tag.trim();
        if trimmed.is_empty() {
            return None;
        }
        if trimmed.len() == tag.len() {
            Some(Self(tag))
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    /// The receipt document type.
    pub fn receipt() -> Self {
        Self(RECEIPT.to_string())
    }

    /// Get the tag as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for DocumentType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| "document type must not be empty".to_string())
    }
}

impl From<DocumentType> for String {
    fn from(value: DocumentType) -> Self {
        value.0
    }
}

impl AsRef<str> for DocumentType {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Status reported by a classifier or extractor.
///
/// `Ok` is the only success value; every other code is terminal for its stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusCode {
    /// The stage succeeded.
    Ok,
    /// The image is missing, unreadable or in an unsupported format.
    InvalidInput,
    /// No text or other content was detected.
    NoContentDetected,
    /// Content was found, but no document.
    NoDocumentDetected,
    /// The document is not one of the supported types.
    UnsupportedType,
    /// The document was recognized but its data could not be extracted.
    ExtractionFailed,
    /// The document appears to be forged.
    FakeDocument,
    /// Anything else.
    UnknownError,
}

impl StatusCode {
    /// All status codes, `Ok` first.
    pub const ALL: [StatusCode; 8] = [
        StatusCode::Ok,
        StatusCode::InvalidInput,
        StatusCode::NoContentDetected,
        StatusCode::NoDocumentDetected,
        StatusCode::UnsupportedType,
        StatusCode::ExtractionFailed,
        StatusCode::FakeDocument,
        StatusCode::UnknownError,
    ];

    /// Whether this is the success status.
    pub fn is_ok(self) -> bool {
        self == StatusCode::Ok
    }

    /// Wire name of the status (e.g. `UNSUPPORTED_TYPE`).
    pub fn as_str(self) -> &'static str {
        match self {
            StatusCode::Ok => "OK",
            StatusCode::InvalidInput => "INVALID_INPUT",
            StatusCode::NoContentDetected => "NO_CONTENT_DETECTED",
            StatusCode::NoDocumentDetected => "NO_DOCUMENT_DETECTED",
            StatusCode::UnsupportedType => "UNSUPPORTED_TYPE",
            StatusCode::ExtractionFailed => "EXTRACTION_FAILED",
            StatusCode::FakeDocument => "FAKE_DOCUMENT",
            StatusCode::UnknownError => "UNKNOWN_ERROR",
        }
    }

    /// Canonical user-facing message for this status.
    ///
    /// `document_types` lists the types the reporting component handles; it is
    /// mentioned in the messages that guide the user towards a valid document.
    pub fn describe(self, document_types: &[DocumentType]) -> String {
        let expected = if document_types.is_empty() {
            "a supported document".to_string()
        } else {
            document_types
                .iter()
                .map(DocumentType::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        };

        match self {
            StatusCode::Ok => "Document processed successfully.".to_string(),
            StatusCode::InvalidInput => {
                "Invalid image format. Please provide an image in JPEG or PNG format.".to_string()
            }
            StatusCode::NoContentDetected => {
                "No text detected in the image. Please provide an image with visible text."
                    .to_string()
            }
            StatusCode::NoDocumentDetected => format!(
                "No document detected in the image. Please provide an image containing one of the following: {}.",
                expected
            ),
            StatusCode::UnsupportedType => format!(
                "Unsupported document type. Please provide an image of one of the following: {}.",
                expected
            ),
            StatusCode::ExtractionFailed => {
                "Failed to extract data from the document. Please try again.".to_string()
            }
            StatusCode::FakeDocument => {
                "Fake document detected. Please provide an image of a real document.".to_string()
            }
            StatusCode::UnknownError => {
                "An unknown error occurred. Please try again later.".to_string()
            }
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A non-OK stage result: status plus error message.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StageFailure {
    status: StatusCode,
    message: String,
}

impl StageFailure {
    /// Create a failure. A status of `Ok` is downgraded to `UnknownError`.
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        let status = if status.is_ok() {
            StatusCode::UnknownError
        } else {
            status
        };
        Self {
            status,
            message: message.into(),
        }
    }

    /// Failure carrying the canonical message of its status.
    pub fn from_status(status: StatusCode, document_types: &[DocumentType]) -> Self {
        Self::new(status, status.describe(document_types))
    }

    /// The failure status (never `Ok`).
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// The error message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for StageFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.status, self.message)
    }
}

/// Result of one stage: a payload on success, a failure otherwise.
///
/// Serialized as `{"status": "OK", "details": <payload>}` or
/// `{"status": "<CODE>", "details": "<message>"}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StageOutput<T> {
    /// Stage succeeded with a payload.
    Ok(T),
    /// Stage failed.
    Failed(StageFailure),
}

impl<T> StageOutput<T> {
    /// Shorthand for a failed output.
    pub fn failed(status: StatusCode, message: impl Into<String>) -> Self {
        StageOutput::Failed(StageFailure::new(status, message))
    }

    /// Whether the stage succeeded.
    pub fn is_ok(&self) -> bool {
        matches!(self, StageOutput::Ok(_))
    }

    /// Status of the output.
    pub fn status(&self) -> StatusCode {
        match self {
            StageOutput::Ok(_) => StatusCode::Ok,
            StageOutput::Failed(failure) => failure.status(),
        }
    }

    /// Success payload, if any.
    pub fn payload(&self) -> Option<&T> {
        match self {
            StageOutput::Ok(payload) => Some(payload),
            StageOutput::Failed(_) => None,
        }
    }

    /// Error message, if any.
    pub fn message(&self) -> Option<&str> {
        match self {
            StageOutput::Ok(_) => None,
            StageOutput::Failed(failure) => Some(failure.message()),
        }
    }

    /// Convert into a standard `Result`.
    pub fn into_result(self) -> Result<T, StageFailure> {
        match self {
            StageOutput::Ok(payload) => Ok(payload),
            StageOutput::Failed(failure) => Err(failure),
        }
    }

    /// Map the success payload.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> StageOutput<U> {
        match self {
            StageOutput::Ok(payload) => StageOutput::Ok(f(payload)),
            StageOutput::Failed(failure) => StageOutput::Failed(failure),
        }
    }
}

impl<T> From<StageFailure> for StageOutput<T> {
    fn from(failure: StageFailure) -> Self {
        StageOutput::Failed(failure)
    }
}

impl<T: Serialize> Serialize for StageOutput<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("StageOutput", 2)?;
        match self {
            StageOutput::Ok(payload) => {
                state.serialize_field("status", &StatusCode::Ok)?;
                state.serialize_field("details", payload)?;
            }
            StageOutput::Failed(failure) => {
                state.serialize_field("status", &failure.status)?;
                state.serialize_field("details", &failure.message)?;
            }
        }
        state.end()
    }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for StageOutput<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Raw {
            status: StatusCode,
            #[serde(default)]
            details: serde_json::Value,
        }

        let raw = Raw::deserialize(deserializer)?;
        match raw.status {
            StatusCode::Ok => T::deserialize(raw.details)
                .map(StageOutput::Ok)
                .map_err(de::Error::custom),
            status => {
                let message = match raw.details {
                    serde_json::Value::String(message) => message,
                    serde_json::Value::Null => status.describe(&[]),
                    other => other.to_string(),
                };
                Ok(StageOutput::failed(status, message))
            }
        }
    }
}
