//! Error types for the PeakPerformance domain

use thiserror::Error;

/// A stored document did not match the expected shape
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    #[error("Document is missing")]
    Missing,

    #[error("Document is not a JSON object")]
    NotAnObject,

    #[error("Malformed document: {0}")]
    Malformed(String),
}

impl From<serde_json::Error> for DecodeError {
    fn from(err: serde_json::Error) -> Self {
        DecodeError::Malformed(err.to_string())
    }
}

/// Input validation failure
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("{field}: {message}")]
    Field { field: String, message: String },

    #[error("Validation failed: {0}")]
    Invalid(String),
}

impl ValidationError {
    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        ValidationError::Field {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl From<validator::ValidationErrors> for ValidationError {
    fn from(errors: validator::ValidationErrors) -> Self {
        // First offending field only
        let first = errors
            .field_errors()
            .into_iter()
            .next()
            .map(|(field, errs)| {
                let message = errs
                    .first()
                    .and_then(|e| e.message.as_ref().map(|m| m.to_string()))
                    .unwrap_or_else(|| "is invalid".to_string());
                ValidationError::field(field.to_string(), message)
            });

        first.unwrap_or_else(|| ValidationError::Invalid(errors.to_string()))
    }
}
