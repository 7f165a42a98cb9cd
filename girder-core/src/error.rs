// Error types for the girder dispatch core

use crate::Status;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Route collision: {0}")]
    RouteCollision(String),

    #[error("Invalid route template '{template}': {reason}")]
    InvalidTemplate { template: String, reason: String },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// An HTTP error raised deliberately by an endpoint.
    #[error("{code} {description}")]
    Status { code: u16, description: String },

    #[error("Endpoint creation failed: {0}")]
    EndpointCreation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl Error {
    /// Create an endpoint-raised HTTP error.
    pub fn status(code: u16, description: impl Into<String>) -> Self {
        Error::Status {
            code,
            description: description.into(),
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Error::Status { code, .. } => *code,
            Error::UnsupportedMediaType(_) => Status::UNSUPPORTED_MEDIA_TYPE.code,
            Error::Deserialization(_) => Status::BAD_REQUEST.code,
            _ => Status::INTERNAL_SERVER_ERROR.code,
        }
    }

    /// The status a client should see when this error reaches the dispatcher.
    ///
    /// Only endpoint-raised HTTP errors keep their own description; anything
    /// else is reported as a bare 500 so internals never leak.
    pub fn client_status(&self) -> Status {
        match self {
            Error::Status { code, description } => Status::new(*code, description.clone()),
            _ => Status::INTERNAL_SERVER_ERROR,
        }
    }

    /// Check if this error stems from a broken endpoint set rather than a request.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Error::RouteCollision(_) | Error::InvalidTemplate { .. } | Error::Configuration(_)
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        if err.is_io() {
            Error::Io(err.into())
        } else if err.is_data() || err.is_syntax() || err.is_eof() {
            Error::Deserialization(err.to_string())
        } else {
            Error::Serialization(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_keeps_code() {
        let err = Error::status(404, "No such order");
        assert_eq!(err.status_code(), 404);

        let status = err.client_status();
        assert_eq!(status.code, 404);
        assert_eq!(status.description, "No such order");
    }

    #[test]
    fn test_internal_errors_are_masked() {
        let err = Error::Internal("database password rejected".to_string());
        let status = err.client_status();
        assert_eq!(status.code, 500);
        assert_eq!(status.description, "Internal server error.");
    }

    #[test]
    fn test_configuration_errors() {
        assert!(Error::RouteCollision("GET /a".into()).is_configuration_error());
        assert!(
            Error::InvalidTemplate {
                template: "/{".into(),
                reason: "unclosed".into()
            }
            .is_configuration_error()
        );
        assert!(!Error::Internal("x".into()).is_configuration_error());
    }

    #[test]
    fn test_mapped_status_codes() {
        assert_eq!(Error::UnsupportedMediaType("x".into()).status_code(), 415);
        assert_eq!(Error::Deserialization("x".into()).status_code(), 400);
        assert_eq!(Error::Serialization("x".into()).status_code(), 500);
    }
}
