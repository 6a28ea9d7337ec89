//! Error handling for the data-access layer
//!
//! `StoreError` covers failures at the document-store boundary and
//! `ServiceError` is what the entry and stats flows report to the UI layer.
//! Every variant carries a stable code and a message safe to show a user.

use crate::store::Collection;
use peak_performance_shared::{DecodeError, ValidationError};
use thiserror::Error;

/// Failure reported by a [`crate::store::DocumentStore`]
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Document not found: {collection}/{id}")]
    NotFound { collection: Collection, id: String },

    #[error("Version conflict on {collection}/{id}")]
    Conflict { collection: Collection, id: String },

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Undecodable document {collection}/{id}: {source}")]
    Malformed {
        collection: Collection,
        id: String,
        source: DecodeError,
    },

    #[error("Database error")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    pub fn not_found(collection: Collection, id: impl Into<String>) -> Self {
        StoreError::NotFound {
            collection,
            id: id.into(),
        }
    }

    pub fn conflict(collection: Collection, id: impl Into<String>) -> Self {
        StoreError::Conflict {
            collection,
            id: id.into(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            StoreError::NotFound { .. } => "NOT_FOUND",
            StoreError::Conflict { .. } => "CONFLICT",
            StoreError::Unavailable(_) => "STORE_UNAVAILABLE",
            StoreError::Serialization(_) | StoreError::Malformed { .. } => "SERIALIZATION_ERROR",
            StoreError::Database(_) => "DATABASE_ERROR",
        }
    }

    /// Whether a transaction should re-read and try again
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }
}

/// Error surfaced by the services and the view model
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Transaction failed after {attempts} attempts")]
    TransactionFailed {
        attempts: u32,
        #[source]
        source: StoreError,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Internal error")]
    Internal(#[from] anyhow::Error),
}

impl ServiceError {
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::Validation(_) => "VALIDATION_ERROR",
            ServiceError::NotFound(_) => "NOT_FOUND",
            ServiceError::TransactionFailed { .. } => "TRANSACTION_FAILED",
            ServiceError::Store(err) => err.code(),
            ServiceError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether the target of the operation does not exist (any more)
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ServiceError::NotFound(_) | ServiceError::Store(StoreError::NotFound { .. })
        )
    }

    /// Message suitable for display
    pub fn user_message(&self) -> String {
        match self {
            ServiceError::Validation(err) => err.to_string(),
            ServiceError::NotFound(what) => format!("{} could not be found", what),
            ServiceError::TransactionFailed { .. } => {
                "Your stats could not be updated. Please try again.".to_string()
            }
            ServiceError::Store(StoreError::NotFound { .. }) => {
                "The requested item no longer exists".to_string()
            }
            ServiceError::Store(StoreError::Unavailable(_))
            | ServiceError::Store(StoreError::Database(_)) => {
                "Unable to reach the server. Check your connection and try again.".to_string()
            }
            ServiceError::Store(_) | ServiceError::Internal(_) => {
                "Something went wrong. Please try again.".to_string()
            }
        }
    }
}

/// Result type alias for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;
