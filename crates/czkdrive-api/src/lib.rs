//! CZK Drive API - client and storage driver for the CZK cloud drive
//!
//! Provides an async client for:
//! - API-key authentication with token refresh and re-authentication fallback
//! - Folder listing, download links, create/move/rename/delete
//! - Two-phase (initiate + complete) file upload
//!
//! ## Modules
//!
//! - [`auth`] - Session manager (authenticate / refresh / ensure-valid)
//! - [`client`] - HTTP client with per-call request profiles
//! - [`envelope`] - Response envelope decoding per endpoint family
//! - [`model`] - Mapping of remote JSON items to [`RemoteObject`](czkdrive_core::domain::RemoteObject)
//! - [`provider`] - [`CzkDriver`](provider::CzkDriver), the `IStorageDriver` implementation
//! - [`upload`] - Two-phase upload protocol

pub mod auth;
pub mod client;
pub mod envelope;
pub mod model;
pub mod provider;
pub mod upload;

use thiserror::Error;

/// Errors that can occur when talking to the CZK API
///
/// Port methods wrap these in `anyhow::Error` with operation context;
/// use `downcast_ref::<CzkError>()` to inspect the kind.
#[derive(Debug, Error)]
pub enum CzkError {
    /// Required configuration (credentials) is missing
    #[error("Configuration error: {0}")]
    Config(String),

    /// A network-level error occurred
    #[error("Network error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server answered with a non-success HTTP status
    #[error("HTTP {status}: {body}")]
    Http {
        /// HTTP status code
        status: u16,
        /// Response body, for diagnostics
        body: String,
    },

    /// Authentication or token refresh was rejected
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// The envelope carried a non-success application code
    #[error("API error: code={code}, message={message}")]
    Application {
        /// Remote status/error code
        code: i64,
        /// Remote message, or "unknown error"
        message: String,
    },

    /// The response body could not be parsed
    #[error("Invalid response: {0}")]
    Decode(String),

    /// The link endpoint returned no usable URL
    #[error("No download link in response")]
    LinkUnavailable,

    /// The upload initiation response lacked transfer credentials
    #[error("Upload initialisation failed: {0}")]
    UploadInit(String),

    /// The operation is not offered by this storage
    #[error("Not supported: {0}")]
    NotSupported(&'static str),

    /// Local I/O failed while spooling upload content
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Shortens a secret for logging: the first 10 characters followed by `***`
pub(crate) fn mask_secret(secret: &str) -> String {
    let prefix: String = secret.chars().take(10).collect();
    format!("{prefix}***")
}
