//! Application error types
//!
//! Process-level failures: configuration, binding, serving, and collaborator
//! lookups. Protocol failures never reach this type; they become close codes.

use concord_core::DomainError;
use serde::Serialize;
use std::fmt;

use crate::config::ConfigError;

/// Application-wide error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Server(#[source] std::io::Error),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Gateway is not accepting clients")]
    Unavailable,

    // Domain errors
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("Internal server error")]
    Internal(#[source] anyhow::Error),
}

impl AppError {
    /// Get HTTP status code for this error
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Unauthorized => 401,
            Self::Unavailable => 503,
            Self::Domain(e) if e.is_not_found() => 404,
            Self::Domain(DomainError::ValidationError(_)) => 400,
            Self::Config(_)
            | Self::Bind { .. }
            | Self::Server(_)
            | Self::Store(_)
            | Self::Domain(_)
            | Self::Internal(_) => 500,
        }
    }

    /// Get error code for HTTP responses and logs
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Config(_) => "CONFIG_ERROR",
            Self::Bind { .. } => "BIND_ERROR",
            Self::Server(_) => "SERVER_ERROR",
            Self::Store(_) => "STORE_ERROR",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Unavailable => "UNAVAILABLE",
            Self::Domain(e) => e.code(),
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Create a store error from anything displayable
    #[must_use]
    pub fn store(msg: impl fmt::Display) -> Self {
        Self::Store(msg.to_string())
    }

    /// Create an internal error from any error
    pub fn internal(err: impl Into<anyhow::Error>) -> Self {
        Self::Internal(err.into())
    }
}

/// Error body returned by the HTTP endpoints
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl From<&AppError> for ErrorResponse {
    fn from(err: &AppError) -> Self {
        Self {
            code: err.error_code().to_string(),
            message: err.to_string(),
        }
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;
