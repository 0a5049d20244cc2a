//! Error types for geocoding.

use thiserror::Error;

/// Result type for geocoder operations.
pub type Result<T> = std::result::Result<T, GeocodeError>;

/// Errors that can occur while resolving a place name.
#[derive(Debug, Error)]
pub enum GeocodeError {
    /// HTTP request failed (connect, timeout, TLS).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// A provider returned a payload that did not parse.
    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),

    /// The request URL could not be constructed.
    #[error("Invalid request URL: {0}")]
    InvalidUrl(String),
}
