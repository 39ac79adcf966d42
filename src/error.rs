//! Error types and handling for barry-price
//!
//! This module defines the error types used throughout the service,
//! providing consistent error handling and reporting.

use thiserror::Error;

/// Result type alias for barry-price operations
pub type Result<T> = std::result::Result<T, BarryError>;

/// Main error type for barry-price
#[derive(Debug, Clone, Error)]
pub enum BarryError {
    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Serialization/deserialization errors
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// File I/O errors
    #[error("I/O error: {message}")]
    Io { message: String },

    /// Network-related errors (connect failures, broken transport)
    #[error("Network error: {message}")]
    Network { message: String },

    /// Barry API errors (HTTP status, JSON-RPC error object, missing data)
    #[error("API error: {message}")]
    Api { message: String },

    /// Authentication/authorization errors
    #[error("Authentication error: {message}")]
    Auth { message: String },

    /// Validation errors
    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    /// Timeout errors
    #[error("Timeout error: {message}")]
    Timeout { message: String },

    /// A refresh cycle failed; the previous price snapshot stays in service
    #[error("Update failed: {message}")]
    UpdateFailed { message: String },

    /// HTTP server errors
    #[error("Web server error: {message}")]
    Web { message: String },

    /// Generic errors with context
    #[error("Error: {message}")]
    Generic { message: String },
}

impl BarryError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        BarryError::Config {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(field: S, message: S) -> Self {
        BarryError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a new I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        BarryError::Io {
            message: message.into(),
        }
    }

    /// Create a new network error
    pub fn network<S: Into<String>>(message: S) -> Self {
        BarryError::Network {
            message: message.into(),
        }
    }

    /// Create a new API error
    pub fn api<S: Into<String>>(message: S) -> Self {
        BarryError::Api {
            message: message.into(),
        }
    }

    /// Create a new auth error
    pub fn auth<S: Into<String>>(message: S) -> Self {
        BarryError::Auth {
            message: message.into(),
        }
    }

    /// Create a new timeout error
    pub fn timeout<S: Into<String>>(message: S) -> Self {
        BarryError::Timeout {
            message: message.into(),
        }
    }

    /// Create a new update-failed error
    pub fn update_failed<S: Into<String>>(message: S) -> Self {
        BarryError::UpdateFailed {
            message: message.into(),
        }
    }

    /// Create a new web error
    pub fn web<S: Into<String>>(message: S) -> Self {
        BarryError::Web {
            message: message.into(),
        }
    }

    /// Create a new generic error
    pub fn generic<S: Into<String>>(message: S) -> Self {
        BarryError::Generic {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for BarryError {
    fn from(err: std::io::Error) -> Self {
        BarryError::io(err.to_string())
    }
}

impl From<serde_yaml::Error> for BarryError {
    fn from(err: serde_yaml::Error) -> Self {
        BarryError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for BarryError {
    fn from(err: serde_json::Error) -> Self {
        BarryError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for BarryError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return BarryError::timeout(err.to_string());
        }
        if let Some(status) = err.status()
            && (status == reqwest::StatusCode::UNAUTHORIZED
                || status == reqwest::StatusCode::FORBIDDEN)
        {
            return BarryError::auth(err.to_string());
        }
        if err.is_decode() {
            return BarryError::Serialization {
                message: err.to_string(),
            };
        }
        BarryError::network(err.to_string())
    }
}

impl From<chrono::ParseError> for BarryError {
    fn from(err: chrono::ParseError) -> Self {
        BarryError::Validation {
            field: "datetime".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<tokio::time::error::Elapsed> for BarryError {
    fn from(err: tokio::time::error::Elapsed) -> Self {
        BarryError::timeout(err.to_string())
    }
}
