//! Storage driver port (driven/secondary port)
//!
//! This module defines the fixed set of filesystem-like operations the host
//! runtime expects from a remote-storage driver. The host only deals in
//! opaque identifiers and [`RemoteObject`] records; everything
//! provider-specific (authentication, wire formats, error codes) lives in
//! the adapter crate that implements [`IStorageDriver`].
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because errors at port boundaries are
//!   adapter-specific; adapters attach operation context and keep their
//!   typed error downcastable.
//! - Uses `#[async_trait]` for async trait methods.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncRead;

use crate::domain::{RemoteId, RemoteObject};

// ============================================================================
// Tokens
// ============================================================================

/// Credentials held by an authenticated driver session
///
/// Contains the bearer token for API requests, an optional refresh token
/// for obtaining new bearer tokens, and the estimated expiration time.
#[derive(Clone, Serialize, Deserialize)]
pub struct Tokens {
    /// Bearer token for authenticating API requests
    pub access_token: String,
    /// Longer-lived token used to obtain a new bearer token
    pub refresh_token: Option<String>,
    /// When the access token expires (local clock estimate)
    pub expires_at: DateTime<Utc>,
}

impl Tokens {
    /// Returns true if the access token has expired
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

impl fmt::Debug for Tokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tokens")
            .field("access_token", &"<redacted>")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "<redacted>"),
            )
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

// ============================================================================
// Link
// ============================================================================

/// A resolved, time-limited download location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    /// Direct download URL
    pub url: String,
    /// Headers the downloader must send along with the request
    pub headers: Vec<(String, String)>,
}

// ============================================================================
// Upload input
// ============================================================================

/// Progress callback invoked as `(bytes_processed, total_bytes)`
pub type ProgressCallback = Box<dyn Fn(u64, u64) + Send + Sync>;

/// A file supplied by the host for upload
pub struct FileStream {
    /// Name the file will have on the remote drive
    pub name: String,
    /// Declared size in bytes (0 when unknown)
    pub size: u64,
    /// Content reader; consumed exactly once by the driver
    pub reader: Box<dyn AsyncRead + Send + Unpin>,
}

impl FileStream {
    /// Creates a stream over an arbitrary async reader
    pub fn new(
        name: impl Into<String>,
        size: u64,
        reader: impl AsyncRead + Send + Unpin + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            size,
            reader: Box::new(reader),
        }
    }

    /// Creates a stream over an in-memory buffer
    pub fn from_bytes(name: impl Into<String>, data: Vec<u8>) -> Self {
        let size = data.len() as u64;
        Self::new(name, size, std::io::Cursor::new(data))
    }
}

impl fmt::Debug for FileStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileStream")
            .field("name", &self.name)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Archive / details placeholders
// ============================================================================

/// Metadata describing an archive file's contents
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArchiveMeta {
    /// Optional archive comment
    pub comment: Option<String>,
    /// Whether the archive is password protected
    pub encrypted: bool,
    /// Top-level entries, when the provider reports them
    pub entries: Vec<RemoteObject>,
}

/// Storage capacity information
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageDetails {
    /// Total space in bytes
    pub total_space: u64,
    /// Free space in bytes
    pub free_space: u64,
}

// ============================================================================
// IStorageDriver trait
// ============================================================================

/// Port trait for a remote storage driver
///
/// This is the full operation contract the host expects. Implementations
/// handle authentication, request signing and response decoding
/// internally; the host calls these methods with identifiers it obtained
/// from earlier listings.
///
/// ## Implementation Notes
///
/// - `init` is called once before any other method; `shutdown` once when the
///   host unloads the storage.
/// - Operations a provider does not offer should fail with a
///   provider-specific "not supported" error rather than panic.
/// - The `progress` callback in `put` is called with
///   `(bytes_processed, total_bytes)`.
#[async_trait::async_trait]
pub trait IStorageDriver: Send + Sync {
    /// Identifier of the folder the host mounts as this storage's root
    fn root_id(&self) -> RemoteId;

    /// Prepares the driver (e.g. acquires credentials)
    async fn init(&self) -> anyhow::Result<()>;

    /// Releases driver state when the host unloads the storage
    async fn shutdown(&self) -> anyhow::Result<()>;

    /// Lists the direct children of a folder
    ///
    /// An empty folder yields an empty vector, not an error.
    async fn list(&self, dir: &RemoteId) -> anyhow::Result<Vec<RemoteObject>>;

    /// Resolves a time-limited download link for a file
    async fn link(&self, file: &RemoteId) -> anyhow::Result<Link>;

    /// Creates a folder under `parent`
    async fn make_dir(&self, parent: &RemoteId, name: &str) -> anyhow::Result<RemoteObject>;

    /// Moves an object into another folder
    ///
    /// # Returns
    /// The moved object as the driver now knows it
    async fn move_object(
        &self,
        obj: &RemoteObject,
        dst_dir: &RemoteId,
    ) -> anyhow::Result<RemoteObject>;

    /// Renames an object in place
    async fn rename(&self, obj: &RemoteObject, new_name: &str) -> anyhow::Result<RemoteObject>;

    /// Deletes an object
    async fn remove(&self, obj: &RemoteObject) -> anyhow::Result<()>;

    /// Uploads a new file into `dst_dir`
    async fn put(
        &self,
        dst_dir: &RemoteId,
        file: FileStream,
        progress: Option<ProgressCallback>,
    ) -> anyhow::Result<RemoteObject>;

    /// Reads archive metadata for an archive file
    async fn get_archive_meta(&self, obj: &RemoteObject) -> anyhow::Result<ArchiveMeta>;

    /// Lists entries inside an archive file
    async fn list_archive(
        &self,
        obj: &RemoteObject,
        inner_path: &str,
    ) -> anyhow::Result<Vec<RemoteObject>>;

    /// Resolves a link to a single entry inside an archive file
    async fn extract(&self, obj: &RemoteObject, inner_path: &str) -> anyhow::Result<Link>;

    /// Decompresses an archive file into `dst_dir`
    async fn archive_decompress(
        &self,
        obj: &RemoteObject,
        dst_dir: &RemoteId,
    ) -> anyhow::Result<Vec<RemoteObject>>;

    /// Reports storage capacity
    async fn get_details(&self) -> anyhow::Result<StorageDetails>;
}
