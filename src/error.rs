// src/error.rs

//! Unified error handling for the monitor.
//!
//! Every failure carries an [`ErrorKind`] so callers can tell "degrade and
//! continue" apart from "abort this unit of work" without string inspection.

use std::fmt;

use thiserror::Error;

/// Result type alias for monitor operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Coarse classification of failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Page unreachable, timed out, or answered with an error status.
    FetchFailure,
    /// Cleaning or metadata extraction failed.
    ProcessingFailure,
    /// A storage backend is unavailable.
    PersistenceFailure,
    /// Webhook transport failure or non-success response.
    DeliveryFailure,
    /// Configuration, parsing and everything else.
    Other,
}

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// Page could not be reached (connection error, timeout)
    #[error("Fetch error for {url}: {message}")]
    Fetch { url: String, message: String },

    /// Page answered with an error status
    #[error("Fetch error for {url}: server returned status {status}")]
    Status { url: String, status: u16 },

    /// Cleaning or extraction failed
    #[error("Processing error for {url}: {message}")]
    Processing { url: String, message: String },

    /// Storage backend failure
    #[error("Persistence error in {backend} backend: {message}")]
    Persistence { backend: String, message: String },

    /// Webhook delivery failure
    #[error("Delivery error for {target}: {message}")]
    Delivery { target: String, message: String },

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

impl AppError {
    /// Create a fetch error for an unreachable page.
    pub fn fetch(url: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Fetch {
            url: url.into(),
            message: message.to_string(),
        }
    }

    /// Create a fetch error for an error status.
    pub fn status(url: impl Into<String>, status: u16) -> Self {
        Self::Status {
            url: url.into(),
            status,
        }
    }

    /// Create a processing error.
    pub fn processing(url: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Processing {
            url: url.into(),
            message: message.to_string(),
        }
    }

    /// Create a persistence error tagged with the failing backend.
    pub fn persistence(backend: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Persistence {
            backend: backend.into(),
            message: message.to_string(),
        }
    }

    /// Create a delivery error.
    pub fn delivery(target: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Delivery {
            target: target.into(),
            message: message.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Fetch { .. } | Self::Status { .. } => ErrorKind::FetchFailure,
            Self::Http(e) if e.is_timeout() || e.is_connect() || e.is_request() => {
                ErrorKind::FetchFailure
            }
            Self::Processing { .. } => ErrorKind::ProcessingFailure,
            Self::Persistence { .. } | Self::Io(_) => ErrorKind::PersistenceFailure,
            Self::Delivery { .. } => ErrorKind::DeliveryFailure,
            _ => ErrorKind::Other,
        }
    }
}
