// Error types for the request pipeline

use crate::HttpStatus;
use thiserror::Error;

/// Boxed error from a collaborator (database, session store, ...).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Method not allowed: {0}")]
    MethodNotAllowed(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Payload Too Large: {0}")]
    PayloadTooLarge(String),

    #[error("Unprocessable Entity: {0}")]
    UnprocessableEntity(String),

    /// Field-level validation failure; the list ends up in the envelope's `errors`.
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        errors: Vec<String>,
    },

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Upstream error: {0}")]
    Upstream(#[source] BoxError),
}

impl Error {
    /// Wrap a collaborator error (e.g. a database error) for propagation.
    pub fn upstream<E>(err: E) -> Self
    where
        E: Into<BoxError>,
    {
        Error::Upstream(err.into())
    }

    /// Validation failure with per-field messages.
    pub fn validation(message: impl Into<String>, errors: Vec<String>) -> Self {
        Error::Validation {
            message: message.into(),
            errors,
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        self.http_status().code()
    }

    /// Get the HttpStatus enum for this error
    pub fn http_status(&self) -> HttpStatus {
        match self {
            Error::BadRequest(_) | Error::Deserialization(_) => HttpStatus::BadRequest,
            Error::Unauthorized(_) => HttpStatus::Unauthorized,
            Error::Forbidden(_) => HttpStatus::Forbidden,
            Error::NotFound(_) => HttpStatus::NotFound,
            Error::MethodNotAllowed(_) => HttpStatus::MethodNotAllowed,
            Error::Conflict(_) => HttpStatus::Conflict,
            Error::PayloadTooLarge(_) => HttpStatus::PayloadTooLarge,
            Error::UnprocessableEntity(_) | Error::Validation { .. } => {
                HttpStatus::UnprocessableEntity
            }
            Error::Serialization(_) | Error::Internal(_) | Error::Io(_) | Error::Upstream(_) => {
                HttpStatus::InternalServerError
            }
        }
    }

    /// Field messages carried by the error, if any.
    pub fn details(&self) -> Vec<String> {
        match self {
            Error::Validation { errors, .. } => errors.clone(),
            _ => Vec::new(),
        }
    }

    /// Check if this is a client error (4xx)
    pub fn is_client_error(&self) -> bool {
        self.http_status().is_client_error()
    }

    /// Check if this is a server error (5xx)
    pub fn is_server_error(&self) -> bool {
        self.http_status().is_server_error()
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Deserialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(Error::NotFound("x".into()).status_code(), 404);
        assert_eq!(Error::MethodNotAllowed("x".into()).status_code(), 405);
        assert_eq!(Error::PayloadTooLarge("x".into()).status_code(), 413);
        assert_eq!(Error::validation("bad", vec![]).status_code(), 422);
        assert_eq!(Error::Internal("x".into()).status_code(), 500);
    }

    #[test]
    fn test_upstream_is_server_error() {
        let err = Error::upstream("database is locked");
        assert!(err.is_server_error());
        assert!(!err.is_client_error());
        assert!(err.to_string().contains("database is locked"));
    }

    #[test]
    fn test_validation_details() {
        let err = Error::validation(
            "Invalid influencer",
            vec!["name is required".into(), "followers must be >= 0".into()],
        );
        assert_eq!(err.details().len(), 2);
        assert!(Error::BadRequest("x".into()).details().is_empty());
    }
}
