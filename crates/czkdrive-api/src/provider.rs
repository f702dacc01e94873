//! CzkDriver - IStorageDriver implementation for the CZK cloud drive
//!
//! Wraps a [`CzkClient`] and a [`SessionManager`] and fulfils the
//! [`IStorageDriver`] port contract: listing, links, folder creation,
//! move/rename/delete and two-phase upload.
//!
//! ## Design Notes
//!
//! - The session lives behind a `tokio::sync::Mutex`. Each operation holds the
//!   lock only while obtaining a valid token, so two callers seeing an expired
//!   token never refresh twice; the request itself runs without the lock.
//! - Every error is wrapped with operation context. The underlying
//!   [`CzkError`] can be recovered with `downcast_ref`.
//! - Archive operations and storage details are not offered by the remote and
//!   fail with [`CzkError::NotSupported`].

use anyhow::{Context, Result};
use chrono::Utc;
use reqwest::multipart::Form;
use reqwest::Method;
use tokio::sync::Mutex;
use tracing::{debug, info};

use czkdrive_core::config::DriverConfig;
use czkdrive_core::domain::{validate_name, DomainError, RemoteId, RemoteObject};
use czkdrive_core::ports::{
    ArchiveMeta, FileStream, IStorageDriver, Link, ProgressCallback, StorageDetails, Tokens,
};

use crate::auth::{SessionManager, SessionState};
use crate::client::{CallProfile, CzkClient};
use crate::envelope::{Envelope, EnvelopeKind};
use crate::model::{self, extract_id};
use crate::upload;
use crate::CzkError;

const LIST_PATH: &str = "/list_files";
const LINK_PATH: &str = "/get_download_url";
const CREATE_FOLDER_PATH: &str = "/create_folder";
const MOVE_PATH: &str = "/move_item";
const RENAME_PATH: &str = "/rename_item";
const DELETE_PATH: &str = "/delete_item";

// ============================================================================
// CzkDriver
// ============================================================================

/// Storage driver backed by the CZK API
pub struct CzkDriver {
    client: CzkClient,
    session: Mutex<SessionManager>,
    root: RemoteId,
    user_agent: String,
}

impl CzkDriver {
    /// Creates a driver from configuration
    ///
    /// No network call is made; authentication happens in
    /// [`init`](IStorageDriver::init) or lazily before the first operation.
    ///
    /// # Errors
    /// Fails if the configuration does not validate or the HTTP client
    /// cannot be built
    pub fn new(config: &DriverConfig) -> Result<Self> {
        let problems = config.validate();
        if !problems.is_empty() {
            let joined = problems
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ");
            return Err(anyhow::Error::new(DomainError::ValidationFailed(joined))
                .context("invalid driver configuration"));
        }

        let root = config.root().context("invalid root_id")?;
        let client = CzkClient::new(config).context("failed to build HTTP client")?;
        let session = SessionManager::new(client.clone(), config.credentials.clone());

        Ok(Self {
            client,
            session: Mutex::new(session),
            root,
            user_agent: config.http.user_agent.clone(),
        })
    }

    /// Seeds the driver with previously obtained tokens
    pub fn with_tokens(mut self, tokens: Tokens) -> Self {
        self.session.get_mut().set_tokens(tokens);
        self
    }

    /// Current session state
    pub async fn session_state(&self) -> SessionState {
        self.session.lock().await.state()
    }

    /// Returns a valid access token, serialized across callers
    async fn access_token(&self) -> Result<String> {
        let mut session = self.session.lock().await;
        session
            .ensure_valid()
            .await
            .context("failed to obtain a valid access token")
    }

    /// Sends an authenticated multipart POST for an object operation
    async fn post_form(&self, path: &str, form: Form) -> Result<Envelope> {
        let token = self.access_token().await?;
        let request = self
            .client
            .request(Method::POST, path, CallProfile::Standard)
            .bearer_auth(token)
            .multipart(form);
        Ok(self.client.execute(request, EnvelopeKind::Operation).await?)
    }
}

impl std::fmt::Debug for CzkDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CzkDriver")
            .field("base_url", &self.client.base_url())
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

/// Multipart body identifying an object by id and type tag
fn object_form(obj: &RemoteObject) -> Form {
    Form::new()
        .text("id", obj.id().to_string())
        .text("type", obj.type_tag())
}

#[async_trait::async_trait]
impl IStorageDriver for CzkDriver {
    fn root_id(&self) -> RemoteId {
        self.root.clone()
    }

    async fn init(&self) -> Result<()> {
        self.session
            .lock()
            .await
            .authenticate()
            .await
            .context("failed to authenticate")?;
        info!(root = %self.root, "CZK storage initialised");
        Ok(())
    }

    async fn shutdown(&self) -> Result<()> {
        self.session.lock().await.invalidate();
        Ok(())
    }

    async fn list(&self, dir: &RemoteId) -> Result<Vec<RemoteObject>> {
        let token = self.access_token().await?;
        debug!(folder = %dir, "CzkDriver::list");

        let request = self
            .client
            .request(Method::GET, LIST_PATH, CallProfile::Standard)
            .bearer_auth(token)
            .query(&[("folder_id", dir.as_str())]);
        let envelope = self
            .client
            .execute(request, EnvelopeKind::Operation)
            .await
            .with_context(|| format!("failed to list folder {dir}"))?;

        let objects = model::map_items(&envelope.data()["items"]);
        debug!(folder = %dir, count = objects.len(), "Listed folder");
        Ok(objects)
    }

    async fn link(&self, file: &RemoteId) -> Result<Link> {
        let token = self.access_token().await?;
        debug!(id = %file, "CzkDriver::link");

        let request = self
            .client
            .request(Method::GET, LINK_PATH, CallProfile::Standard)
            .bearer_auth(token)
            .query(&[("file_id", file.as_str())]);
        let envelope = self
            .client
            .execute(request, EnvelopeKind::Service)
            .await
            .with_context(|| format!("failed to get download link for {file}"))?;

        let url = envelope
            .data_str("download_link")
            .or_else(|| envelope.data_str("url"))
            .ok_or(CzkError::LinkUnavailable)
            .with_context(|| format!("failed to get download link for {file}"))?;

        Ok(Link {
            url: url.to_string(),
            headers: vec![("User-Agent".to_string(), self.user_agent.clone())],
        })
    }

    async fn make_dir(&self, parent: &RemoteId, name: &str) -> Result<RemoteObject> {
        validate_name(name)?;
        debug!(parent = %parent, name = %name, "CzkDriver::make_dir");

        let form = Form::new()
            .text("parent_id", parent.as_str().to_string())
            .text("name", name.to_string());
        let envelope = self
            .post_form(CREATE_FOLDER_PATH, form)
            .await
            .with_context(|| format!("failed to create folder '{name}' in {parent}"))?;

        let id = extract_id(envelope.data(), &["folder_id", "id"]).unwrap_or_default();
        info!(id = %id, name = %name, "Folder created");
        Ok(RemoteObject::folder(id, name, Utc::now()))
    }

    async fn move_object(&self, obj: &RemoteObject, dst_dir: &RemoteId) -> Result<RemoteObject> {
        debug!(id = %obj.id(), target = %dst_dir, "CzkDriver::move_object");

        let form = object_form(obj).text("target_id", dst_dir.as_str().to_string());
        let envelope = self
            .post_form(MOVE_PATH, form)
            .await
            .with_context(|| format!("failed to move {} to {dst_dir}", obj.id()))?;

        let mut moved = obj.with_modified(Utc::now());
        let echoed = envelope.data()["items"].as_array().and_then(|items| {
            items
                .iter()
                .find(|item| model::render_id(&item["id"]).as_deref() == Some(obj.id()))
        });
        if let Some(item) = echoed {
            if let Some(name) = item["name"].as_str().filter(|n| !n.is_empty()) {
                moved = moved.with_name(name);
            }
            if let Some(ts) = item["created_at"]
                .as_str()
                .and_then(model::try_parse_timestamp)
            {
                moved = moved.with_modified(ts);
            }
        }

        Ok(moved)
    }

    async fn rename(&self, obj: &RemoteObject, new_name: &str) -> Result<RemoteObject> {
        validate_name(new_name)?;
        debug!(id = %obj.id(), new_name = %new_name, "CzkDriver::rename");

        let form = object_form(obj).text("new_name", new_name.to_string());
        self.post_form(RENAME_PATH, form)
            .await
            .with_context(|| format!("failed to rename {} to '{new_name}'", obj.id()))?;

        Ok(obj.with_name(new_name).with_modified(Utc::now()))
    }

    async fn remove(&self, obj: &RemoteObject) -> Result<()> {
        debug!(id = %obj.id(), kind = obj.type_tag(), "CzkDriver::remove");

        self.post_form(DELETE_PATH, object_form(obj))
            .await
            .with_context(|| format!("failed to delete {}", obj.id()))?;

        info!(id = %obj.id(), "Object deleted");
        Ok(())
    }

    async fn put(
        &self,
        dst_dir: &RemoteId,
        file: FileStream,
        progress: Option<ProgressCallback>,
    ) -> Result<RemoteObject> {
        validate_name(&file.name)?;
        let name = file.name.clone();
        debug!(folder = %dst_dir, name = %name, size = file.size, "CzkDriver::put");

        let spooled = upload::spool_and_hash(file, progress.as_ref())
            .await
            .with_context(|| format!("failed to read '{name}' for upload"))?;
        let descriptor = upload::UploadDescriptor::new(name.as_str(), dst_dir, &spooled);

        let token = self.access_token().await?;
        upload::transfer(&self.client, &token, &descriptor)
            .await
            .with_context(|| format!("failed to upload '{name}' to {dst_dir}"))
    }

    async fn get_archive_meta(&self, _obj: &RemoteObject) -> Result<ArchiveMeta> {
        Err(CzkError::NotSupported("get_archive_meta").into())
    }

    async fn list_archive(
        &self,
        _obj: &RemoteObject,
        _inner_path: &str,
    ) -> Result<Vec<RemoteObject>> {
        Err(CzkError::NotSupported("list_archive").into())
    }

    async fn extract(&self, _obj: &RemoteObject, _inner_path: &str) -> Result<Link> {
        Err(CzkError::NotSupported("extract").into())
    }

    async fn archive_decompress(
        &self,
        _obj: &RemoteObject,
        _dst_dir: &RemoteId,
    ) -> Result<Vec<RemoteObject>> {
        Err(CzkError::NotSupported("archive_decompress").into())
    }

    async fn get_details(&self) -> Result<StorageDetails> {
        Err(CzkError::NotSupported("get_details").into())
    }
}
