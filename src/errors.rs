//! Error types for the mpesa-gateway library.
//!
//! These errors are internal plumbing: transaction operations catch them at the
//! boundary and surface a normalized [`crate::types::GatewayResponse`] instead,
//! so nothing here ever crosses into the host platform.

use thiserror::Error;

/// Main error type for gateway operations.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Error during HTTP request/response handling
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Error during JSON serialization/deserialization
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error parsing or joining an endpoint URL
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// The upstream token endpoint did not yield an access token
    #[error("Access token unavailable: {0}")]
    Token(String),

    /// A required field was absent from configuration or a payload
    #[error("Missing required field: {0}")]
    MissingField(String),

    /// Invalid or incomplete gateway configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Upstream rejected the request with an error body
    #[error("Upstream error: {0}")]
    Upstream(String),
}

/// Result type alias for gateway operations.
pub type Result<T> = std::result::Result<T, GatewayError>;
