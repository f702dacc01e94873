//! Two-phase file upload
//!
//! Uploading to CZK is a handshake rather than a byte transfer on our side:
//!
//! 1. The content is spooled to a temporary file while its MD5 digest is
//!    computed (the digest is the content fingerprint the server keys on).
//! 2. `first_upload` announces hash, name, size and target folder and returns
//!    a `csrf_token` and `file_key`.
//! 3. `ok_upload` confirms the upload with the same fields plus both
//!    credentials.
//!
//! Both calls use the [`CallProfile::Upload`] timeout.

use std::io::SeekFrom;

use chrono::Utc;
use czkdrive_core::domain::{RemoteId, RemoteObject};
use czkdrive_core::ports::{FileStream, ProgressCallback};
use md5::{Digest, Md5};
use reqwest::multipart::Form;
use reqwest::Method;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tracing::{debug, info, warn};

use crate::client::{CallProfile, CzkClient};
use crate::envelope::EnvelopeKind;
use crate::model::{extract_id, render_id};
use crate::CzkError;

/// Path of the upload initiation endpoint
pub const UPLOAD_INIT_PATH: &str = "/first_upload";

/// Path of the upload completion endpoint
pub const UPLOAD_COMPLETE_PATH: &str = "/ok_upload";

/// Read buffer size while spooling
const SPOOL_CHUNK_SIZE: usize = 64 * 1024;

// ============================================================================
// Spooling
// ============================================================================

/// Upload content cached on local disk
#[derive(Debug)]
pub struct SpooledFile {
    /// Temporary file, rewound to the start
    pub file: File,
    /// Lowercase hex MD5 digest of the content
    pub hash: String,
    /// Number of bytes cached
    pub size: u64,
}

/// Copies `stream` into an anonymous temporary file while hashing it
///
/// Progress is reported as `(bytes_cached, total)`, where `total` is the
/// declared size, raised to the bytes cached so far when the stream runs
/// past it (or the size is unknown).
///
/// # Errors
/// Returns [`CzkError::Io`] if reading the stream or writing the spool fails
pub async fn spool_and_hash(
    mut stream: FileStream,
    progress: Option<&ProgressCallback>,
) -> Result<SpooledFile, CzkError> {
    let mut file = File::from_std(tempfile::tempfile()?);
    let mut hasher = Md5::new();
    let mut buffer = vec![0u8; SPOOL_CHUNK_SIZE];
    let mut cached: u64 = 0;

    loop {
        let read = stream.reader.read(&mut buffer).await?;
        if read == 0 {
            break;
        }
        let chunk = &buffer[..read];
        hasher.update(chunk);
        file.write_all(chunk).await?;
        cached += read as u64;

        if let Some(report) = progress {
            report(cached, stream.size.max(cached));
        }
    }

    file.flush().await?;
    file.seek(SeekFrom::Start(0)).await?;

    if stream.size > 0 && stream.size != cached {
        warn!(
            name = %stream.name,
            declared = stream.size,
            actual = cached,
            "Upload stream size differs from declared size"
        );
    }

    Ok(SpooledFile {
        file,
        hash: hex::encode(hasher.finalize()),
        size: cached,
    })
}

// ============================================================================
// Protocol
// ============================================================================

/// What the server knows about a file being uploaded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadDescriptor {
    /// MD5 hex digest of the content
    pub hash: String,
    /// Remote file name
    pub filename: String,
    /// Size in bytes
    pub filesize: u64,
    /// Destination folder
    pub folder: RemoteId,
}

impl UploadDescriptor {
    /// Describes spooled content for upload into `folder`
    pub fn new(filename: impl Into<String>, folder: &RemoteId, spooled: &SpooledFile) -> Self {
        Self {
            hash: spooled.hash.clone(),
            filename: filename.into(),
            filesize: spooled.size,
            folder: folder.clone(),
        }
    }

    fn form(&self) -> Form {
        Form::new()
            .text("hash", self.hash.clone())
            .text("filename", self.filename.clone())
            .text("filesize", self.filesize.to_string())
            .text("folder", self.folder.as_str().to_string())
    }
}

/// Transfer credentials returned by the initiation step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTicket {
    /// Anti-forgery token for the completion call
    pub csrf_token: String,
    /// Server-side key for the pending file
    pub file_key: String,
}

/// Announces an upload and obtains its transfer credentials
///
/// # Errors
/// - [`CzkError::Application`] if the server reports a failure code
/// - [`CzkError::UploadInit`] if `csrf_token` or `file_key` is missing
pub async fn initiate(
    client: &CzkClient,
    access_token: &str,
    descriptor: &UploadDescriptor,
) -> Result<UploadTicket, CzkError> {
    debug!(
        name = %descriptor.filename,
        folder = %descriptor.folder,
        hash = %descriptor.hash,
        "Initiating upload"
    );

    let request = client
        .request(Method::POST, UPLOAD_INIT_PATH, CallProfile::Upload)
        .bearer_auth(access_token)
        .multipart(descriptor.form());
    let envelope = client.execute(request, EnvelopeKind::Upload).await?;

    let csrf_token = envelope.data_str("csrf_token");
    let file_key = envelope.data_str("file_key");

    match (csrf_token, file_key) {
        (Some(csrf_token), Some(file_key)) => Ok(UploadTicket {
            csrf_token: csrf_token.to_string(),
            file_key: file_key.to_string(),
        }),
        (None, _) => Err(CzkError::UploadInit("response has no csrf_token".to_string())),
        (_, None) => Err(CzkError::UploadInit("response has no file_key".to_string())),
    }
}

/// Confirms an initiated upload
///
/// The returned object takes its id from `data.file_id`, `data.id` or a
/// top-level `file_id`; when the server sends none the id is left empty.
pub async fn complete(
    client: &CzkClient,
    access_token: &str,
    descriptor: &UploadDescriptor,
    ticket: &UploadTicket,
) -> Result<RemoteObject, CzkError> {
    let form = descriptor
        .form()
        .text("csrf_token", ticket.csrf_token.clone())
        .text("file_key", ticket.file_key.clone());

    let request = client
        .request(Method::POST, UPLOAD_COMPLETE_PATH, CallProfile::Upload)
        .bearer_auth(access_token)
        .multipart(form);
    let envelope = client.execute(request, EnvelopeKind::Upload).await?;

    let id = extract_id(envelope.data(), &["file_id", "id"])
        .or_else(|| render_id(envelope.field("file_id")))
        .unwrap_or_default();

    if id.is_empty() {
        warn!(name = %descriptor.filename, "Upload completed without a file id");
    }

    Ok(RemoteObject::file(
        id,
        descriptor.filename.clone(),
        descriptor.filesize,
        Utc::now(),
    ))
}

/// Runs the handshake for spooled content: initiate, then complete
///
/// The caller spools first and fetches the access token afterwards, so a
/// long spool cannot outlive the token.
pub async fn transfer(
    client: &CzkClient,
    access_token: &str,
    descriptor: &UploadDescriptor,
) -> Result<RemoteObject, CzkError> {
    let ticket = initiate(client, access_token, descriptor).await?;
    let object = complete(client, access_token, descriptor, &ticket).await?;

    info!(
        name = %descriptor.filename,
        size = descriptor.filesize,
        id = %object.id(),
        "Upload completed"
    );
    Ok(object)
}
