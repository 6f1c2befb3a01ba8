//! Error handling module
//!
//! This module defines the error types and result type aliases used in the application.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use std::io;
use thiserror::Error;

/// Browser TLS audit error type
#[derive(Error, Debug)]
pub enum AuditError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// OpenSSL error
    #[error("OpenSSL error: {0}")]
    Ssl(#[from] openssl::error::ErrorStack),

    /// TLS handshake error
    #[error("TLS handshake error: {0}")]
    TlsHandshake(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Certificate error
    #[error("Certificate error: {0}")]
    Certificate(String),

    /// Record decoding error
    #[error("Decode error: {0}")]
    Decode(#[from] crate::audit::codec::DecodeError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The correlation engine task is gone
    #[error("Correlation engine unavailable: {0}")]
    ChannelClosed(String),

    /// Other error
    #[error("Other error: {0}")]
    Other(String),
}

/// Result type alias
///
/// This is a `Result` type alias that uses our custom `AuditError`.
pub type Result<T> = std::result::Result<T, AuditError>;

/// Error response body for the HTTP endpoints
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error message
    pub message: String,

    /// Optional detailed error information
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl IntoResponse for AuditError {
    fn into_response(self) -> Response {
        let message = match &self {
            AuditError::Io(_) => "IO error",
            AuditError::Decode(_) | AuditError::Serialization(_) => "Serialization error",
            AuditError::ChannelClosed(_) => "Service unavailable",
            _ => "Internal server error",
        };

        let status = match &self {
            AuditError::ChannelClosed(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = ErrorResponse {
            message: message.to_string(),
            details: Some(self.to_string()),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "File not found");
        let audit_err: AuditError = io_err.into();

        match audit_err {
            AuditError::Io(_) => {}
            _ => panic!("Should convert to IO error"),
        }
    }

    #[test]
    fn test_error_display() {
        let err = AuditError::Config("Invalid configuration".to_string());
        let err_str = format!("{}", err);
        assert!(err_str.contains("Invalid configuration"));
    }

    #[test]
    fn test_channel_closed_maps_to_unavailable() {
        let response = AuditError::ChannelClosed("stopped".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let response = AuditError::Other("boom".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
