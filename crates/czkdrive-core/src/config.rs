//! Configuration module for the CZK drive adapter.
//!
//! Provides typed configuration structs that map to the YAML storage
//! configuration, with loading, validation, defaults, and a builder pattern
//! for programmatic use.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::RemoteId;

/// Production API base URL.
pub const DEFAULT_BASE_URL: &str = "https://pan.szczk.top/czkapi";

/// User-Agent the remote expects on API and download requests.
pub const DEFAULT_USER_AGENT: &str = "openlist";

// ---------------------------------------------------------------------------
// DriverConfig struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for one mounted CZK storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    pub credentials: CredentialsConfig,
    /// Identifier of the folder mounted as the storage root (`"0"` is the drive root).
    pub root_id: String,
    pub http: HttpConfig,
}

/// API credentials issued by the remote service.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialsConfig {
    pub api_key: String,
    pub api_secret: String,
}

impl std::fmt::Debug for CredentialsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialsConfig")
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .finish()
    }
}

/// Transport settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// API base URL, without a trailing slash.
    pub base_url: String,
    /// User-Agent sent with every request.
    pub user_agent: String,
    /// Timeout in seconds for regular API calls.
    pub request_timeout_secs: u64,
    /// Timeout in seconds for the upload initiate/complete calls.
    pub upload_timeout_secs: u64,
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl DriverConfig {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: DriverConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`DriverConfig::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/czkdrive/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("czkdrive")
            .join("config.yaml")
    }

    /// Timeout for regular API calls.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.http.request_timeout_secs)
    }

    /// Timeout for upload calls.
    pub fn upload_timeout(&self) -> Duration {
        Duration::from_secs(self.http.upload_timeout_secs)
    }

    /// The configured root folder.
    ///
    /// # Errors
    /// Fails when `root_id` is not a usable identifier; [`validate`](Self::validate)
    /// reports the same problem.
    pub fn root(&self) -> anyhow::Result<RemoteId> {
        Ok(RemoteId::new(self.root_id.clone())?)
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            credentials: CredentialsConfig::default(),
            root_id: "0".to_string(),
            http: HttpConfig::default(),
        }
    }
}

// CredentialsConfig derives Default (empty strings, rejected by validate()).

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            request_timeout_secs: 30,
            upload_timeout_secs: 600,
        }
    }
}

// ---------------------------------------------------------------------------
// DriverConfig::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"http.base_url"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl DriverConfig {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- credentials ---
        if self.credentials.api_key.trim().is_empty() {
            errors.push(ValidationError {
                field: "credentials.api_key".into(),
                message: "must not be empty".into(),
            });
        }
        if self.credentials.api_secret.trim().is_empty() {
            errors.push(ValidationError {
                field: "credentials.api_secret".into(),
                message: "must not be empty".into(),
            });
        }

        // --- root ---
        if let Err(e) = RemoteId::new(self.root_id.clone()) {
            errors.push(ValidationError {
                field: "root_id".into(),
                message: e.to_string(),
            });
        }

        // --- http ---
        let base_url = &self.http.base_url;
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            errors.push(ValidationError {
                field: "http.base_url".into(),
                message: format!("must be an http(s) URL, got '{}'", self.http.base_url),
            });
        }
        if base_url.ends_with('/') {
            errors.push(ValidationError {
                field: "http.base_url".into(),
                message: "must not end with '/'".into(),
            });
        }
        if self.http.user_agent.trim().is_empty() {
            errors.push(ValidationError {
                field: "http.user_agent".into(),
                message: "must not be empty".into(),
            });
        }
        if self.http.request_timeout_secs == 0 {
            errors.push(ValidationError {
                field: "http.request_timeout_secs".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.http.upload_timeout_secs < self.http.request_timeout_secs {
            errors.push(ValidationError {
                field: "http.upload_timeout_secs".into(),
                message: format!(
                    "upload_timeout_secs ({}) must not be shorter than request_timeout_secs ({})",
                    self.http.upload_timeout_secs, self.http.request_timeout_secs
                ),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// DriverConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`DriverConfig`] programmatically.
///
/// Starts from [`DriverConfig::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust
/// use czkdrive_core::config::DriverConfigBuilder;
///
/// let config = DriverConfigBuilder::new()
///     .api_key("key")
///     .api_secret("secret")
///     .root_id("42")
///     .build();
/// assert_eq!(config.root_id, "42");
/// ```
#[derive(Debug, Clone)]
pub struct DriverConfigBuilder {
    config: DriverConfig,
}

impl DriverConfigBuilder {
    /// Create a new builder initialised with [`DriverConfig::default`] values.
    pub fn new() -> Self {
        Self {
            config: DriverConfig::default(),
        }
    }

    // --- credentials ---

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.credentials.api_key = key.into();
        self
    }

    pub fn api_secret(mut self, secret: impl Into<String>) -> Self {
        self.config.credentials.api_secret = secret.into();
        self
    }

    // --- root ---

    pub fn root_id(mut self, id: impl Into<String>) -> Self {
        self.config.root_id = id.into();
        self
    }

    // --- http ---

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.http.base_url = url.into();
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.config.http.user_agent = agent.into();
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.http.request_timeout_secs = secs;
        self
    }

    pub fn upload_timeout_secs(mut self, secs: u64) -> Self {
        self.config.http.upload_timeout_secs = secs;
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`DriverConfig`].
    pub fn build(self) -> DriverConfig {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<DriverConfig, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for DriverConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
