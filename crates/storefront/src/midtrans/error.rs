//! Midtrans-related errors.

use thiserror::Error;

/// Errors that can occur when interacting with Midtrans.
#[derive(Debug, Error)]
pub enum MidtransError {
    /// HTTP request failed (connect, timeout, TLS).
    #[error("Midtrans request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Midtrans returned an error status.
    #[error("Midtrans API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Response body did not have the expected shape.
    #[error("Midtrans response error: {0}")]
    Parse(String),

    /// Endpoint URL could not be built.
    #[error("Invalid Midtrans URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Notification signature did not match.
    #[error("Invalid Midtrans signature: {0}")]
    InvalidSignature(String),
}
