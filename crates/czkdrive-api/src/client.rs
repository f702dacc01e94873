//! CZK API HTTP client
//!
//! Thin wrapper around `reqwest::Client` that owns the base URL, the
//! User-Agent and the timeouts. Timeouts are chosen per request through a
//! [`CallProfile`], so an upload never changes the timeout another call sees.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use czkdrive_api::client::{CallProfile, CzkClient};
//! use czkdrive_api::envelope::EnvelopeKind;
//! use reqwest::Method;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = CzkClient::with_base_url("http://127.0.0.1:8080/czkapi");
//! let request = client
//!     .request(Method::GET, "/list_files", CallProfile::Standard)
//!     .bearer_auth("access-token")
//!     .query(&[("folder_id", "0")]);
//! let envelope = client.execute(request, EnvelopeKind::Operation).await?;
//! println!("{}", envelope.data());
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use czkdrive_core::config::{DriverConfig, DEFAULT_USER_AGENT};
use reqwest::{Client, Method, RequestBuilder};
use tracing::debug;

use crate::envelope::{Envelope, EnvelopeKind};
use crate::CzkError;

/// Default timeout for regular API calls
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default timeout for upload calls
const DEFAULT_UPLOAD_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Per-request transport settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallProfile {
    /// Listing, metadata and authentication calls
    Standard,
    /// Upload initiate/complete calls, which may take much longer
    Upload,
}

/// HTTP client for CZK API calls
#[derive(Debug, Clone)]
pub struct CzkClient {
    /// The underlying HTTP client
    client: Client,
    /// Base URL for API requests (no trailing slash)
    base_url: String,
    /// Timeout for [`CallProfile::Standard`]
    request_timeout: Duration,
    /// Timeout for [`CallProfile::Upload`]
    upload_timeout: Duration,
}

impl CzkClient {
    /// Creates a client from the storage configuration
    ///
    /// # Errors
    /// Returns [`CzkError::Transport`] if the HTTP client cannot be built
    pub fn new(config: &DriverConfig) -> Result<Self, CzkError> {
        let client = Client::builder()
            .user_agent(config.http.user_agent.clone())
            .build()?;

        Ok(Self {
            client,
            base_url: config.http.base_url.trim_end_matches('/').to_string(),
            request_timeout: config.request_timeout(),
            upload_timeout: config.upload_timeout(),
        })
    }

    /// Creates a client with default settings and a custom base URL (useful for testing)
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .user_agent(DEFAULT_USER_AGENT)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            upload_timeout: DEFAULT_UPLOAD_TIMEOUT,
        }
    }

    /// Returns the base URL for API requests
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Timeout applied to requests built with `profile`
    pub fn timeout_for(&self, profile: CallProfile) -> Duration {
        match profile {
            CallProfile::Standard => self.request_timeout,
            CallProfile::Upload => self.upload_timeout,
        }
    }

    /// Creates a request builder for the given method and API path
    ///
    /// The base URL is prepended and the profile's timeout is attached to
    /// this request only. Authorization is left to the caller.
    ///
    /// # Arguments
    /// * `method` - HTTP method
    /// * `path` - API path relative to the base URL (e.g. "/list_files")
    /// * `profile` - Which timeout applies
    pub fn request(&self, method: Method, path: &str, profile: CallProfile) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        self.client
            .request(method, url)
            .timeout(self.timeout_for(profile))
    }

    /// Sends a request and decodes the response envelope
    ///
    /// Fails on transport errors, non-success HTTP status and malformed
    /// JSON. The application code is *not* checked; see [`execute`](Self::execute).
    pub async fn fetch(
        &self,
        request: RequestBuilder,
        kind: EnvelopeKind,
    ) -> Result<Envelope, CzkError> {
        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read error body".to_string());
            debug!(status = status.as_u16(), "CZK API returned error status");
            return Err(CzkError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.bytes().await?;
        Envelope::decode(&body, kind)
    }

    /// Sends a request, decodes the envelope and checks the application code
    pub async fn execute(
        &self,
        request: RequestBuilder,
        kind: EnvelopeKind,
    ) -> Result<Envelope, CzkError> {
        self.fetch(request, kind).await?.check()
    }
}
