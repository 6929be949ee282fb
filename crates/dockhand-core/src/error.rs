//! Error types for Dockhand Core.

use dockhand_registry::RegistryError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Core error type for service operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The path identifier is not a positive integer.
    #[error("Invalid registry identifier: {0:?}")]
    InvalidIdentifier(String),

    /// The request body is not a valid update payload.
    #[error("Invalid request payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),

    /// Registry error passthrough.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// The request did not finish within the configured timeout.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// The four outcomes a caller can distinguish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Malformed identifier or payload.
    BadRequest,
    /// The target registry does not exist.
    NotFound,
    /// The requested URL is used by another registry.
    Conflict,
    /// Anything that went wrong while reading or writing records.
    StorageError,
}

impl ErrorKind {
    /// HTTP status code for this kind.
    pub fn status_code(self) -> u16 {
        match self {
            ErrorKind::BadRequest => 400,
            ErrorKind::NotFound => 404,
            ErrorKind::Conflict => 409,
            ErrorKind::StorageError => 500,
        }
    }
}

impl ServiceError {
    /// Classifies the error for the caller.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::InvalidIdentifier(_) | ServiceError::InvalidPayload(_) => ErrorKind::BadRequest,
            ServiceError::Registry(err) => match err {
                RegistryError::ReservedId => ErrorKind::BadRequest,
                RegistryError::NotFound(_) => ErrorKind::NotFound,
                RegistryError::UrlConflict { .. } | RegistryError::AlreadyExists(_) => ErrorKind::Conflict,
                RegistryError::Database(_) | RegistryError::Serialization(_) | RegistryError::CorruptKey => {
                    ErrorKind::StorageError
                }
                RegistryError::Cancelled => ErrorKind::StorageError,
            },
            ServiceError::Timeout(_) | ServiceError::Config(_) | ServiceError::Internal(_) => {
                ErrorKind::StorageError
            }
        }
    }

    /// HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        self.kind().status_code()
    }

    /// Short caller-facing summary. Details come from `Display`.
    pub fn message(&self) -> &'static str {
        match self {
            ServiceError::InvalidIdentifier(_) | ServiceError::Registry(RegistryError::ReservedId) => {
                "Invalid registry identifier route variable"
            }
            ServiceError::InvalidPayload(_) => "Invalid request payload",
            ServiceError::Registry(RegistryError::NotFound(_)) => {
                "Unable to find a registry with the specified identifier inside the database"
            }
            ServiceError::Registry(RegistryError::UrlConflict { .. }) => {
                "Another registry with the same URL already exists"
            }
            ServiceError::Registry(RegistryError::AlreadyExists(_)) => {
                "A registry with the same identifier already exists"
            }
            ServiceError::Registry(_) | ServiceError::Timeout(_) => {
                "Unable to persist registry changes inside the database"
            }
            ServiceError::Config(_) | ServiceError::Internal(_) => "Internal server error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(ServiceError::InvalidIdentifier("x".into()).status_code(), 400);
        assert_eq!(ServiceError::from(RegistryError::NotFound(3)).status_code(), 404);
        assert_eq!(
            ServiceError::from(RegistryError::UrlConflict {
                url: "http://x".into(),
                existing: 1,
            })
            .status_code(),
            409
        );
        assert_eq!(ServiceError::from(RegistryError::CorruptKey).status_code(), 500);
        assert_eq!(ServiceError::from(RegistryError::Cancelled).status_code(), 500);
        assert_eq!(ServiceError::Timeout(Duration::from_millis(5)).status_code(), 500);
    }

    #[test]
    fn test_store_failures_are_storage_errors() {
        let corrupt = serde_json::from_str::<serde_json::Value>("{").unwrap_err();

        for err in [RegistryError::CorruptKey, RegistryError::Serialization(corrupt)] {
            assert!(err.is_storage());
            let err = ServiceError::from(err);
            assert_eq!(err.kind(), ErrorKind::StorageError);
            assert_eq!(err.message(), "Unable to persist registry changes inside the database");
        }

        for err in [RegistryError::NotFound(1), RegistryError::ReservedId, RegistryError::AlreadyExists(1)] {
            assert!(!err.is_storage());
            assert_ne!(ServiceError::from(err).kind(), ErrorKind::StorageError);
        }
    }

    #[test]
    fn test_payload_errors_are_bad_requests() {
        let err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = ServiceError::from(err);

        assert_eq!(err.kind(), ErrorKind::BadRequest);
        assert_eq!(err.message(), "Invalid request payload");
    }

    #[test]
    fn test_registry_errors_display_transparently() {
        let err = ServiceError::from(RegistryError::NotFound(12));
        assert_eq!(err.to_string(), "Registry not found: 12");
    }
}
