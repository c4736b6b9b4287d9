//! Remote backend over a Drive-style document store.
//!
//! The provider logic here only deals in document ids and parent links; the
//! wire protocol lives behind [`DriveTransport`].

mod http;

pub use http::HttpDriveTransport;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use notes_platform::path::{creation_segments, split_segments};
use notes_platform::{
    AuthSession, BackendRef, ChildEntry, EntryKind, RemoteHandle, StorageError, StorageProvider,
    StorageType,
};

pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";
pub const TEXT_MIME_TYPE: &str = "text/plain";

/// Account root alias accepted as a parent id
pub const ROOT_ALIAS: &str = "root";

/// File metadata as returned by the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    #[serde(default)]
    pub parents: Vec<String>,
    #[serde(default)]
    pub trashed: bool,
}

impl DriveFile {
    pub fn is_folder(&self) -> bool {
        self.mime_type == FOLDER_MIME_TYPE
    }

    fn handle(&self) -> RemoteHandle {
        RemoteHandle {
            id: self.id.clone(),
            mime_type: self.mime_type.clone(),
            kind: if self.is_folder() {
                EntryKind::Directory
            } else {
                EntryKind::File
            },
        }
    }
}

/// Raw document store calls, each authorized by a bearer token
#[async_trait]
pub trait DriveTransport: Send + Sync {
    /// Non-trashed children of `parent_id`, folders first then by name
    async fn list_children(&self, token: &str, parent_id: &str)
        -> Result<Vec<DriveFile>, StorageError>;

    /// First non-trashed child of `parent_id` called `name`
    async fn find_child(
        &self,
        token: &str,
        parent_id: &str,
        name: &str,
    ) -> Result<Option<DriveFile>, StorageError>;

    async fn download(&self, token: &str, file_id: &str) -> Result<String, StorageError>;

    async fn update_content(&self, token: &str, file_id: &str, text: &str)
        -> Result<(), StorageError>;

    /// Upload a new text document under `parent_id`
    async fn create_file(
        &self,
        token: &str,
        parent_id: &str,
        name: &str,
        text: &str,
    ) -> Result<DriveFile, StorageError>;

    async fn create_folder(
        &self,
        token: &str,
        parent_id: &str,
        name: &str,
    ) -> Result<DriveFile, StorageError>;

    /// Move a document or folder to the trash
    async fn trash(&self, token: &str, file_id: &str) -> Result<(), StorageError>;
}

/// Storage provider rooted at the application folder of a remote account
pub struct RemoteProvider {
    transport: Arc<dyn DriveTransport>,
    session: Arc<dyn AuthSession>,
    root: RemoteHandle,
}

impl RemoteProvider {
    /// Locate the application folder `folder_name` in the account root,
    /// creating it on first use.
    pub async fn connect(
        transport: Arc<dyn DriveTransport>,
        session: Arc<dyn AuthSession>,
        folder_name: &str,
    ) -> Result<Self, StorageError> {
        let token = bearer(session.as_ref())?;
        let folder = match transport.find_child(&token, ROOT_ALIAS, folder_name).await? {
            Some(existing) if existing.is_folder() => existing,
            _ => {
                info!("creating app folder {:?}", folder_name);
                transport.create_folder(&token, ROOT_ALIAS, folder_name).await?
            }
        };
        info!("remote tree rooted at {} ({})", folder.name, folder.id);
        Ok(Self {
            transport,
            session,
            root: folder.handle(),
        })
    }

    pub fn root_id(&self) -> &str {
        &self.root.id
    }

    fn token(&self) -> Result<String, StorageError> {
        bearer(self.session.as_ref())
    }

    /// Find `name` under `parent_id` as a folder, creating it when missing
    async fn ensure_folder(
        &self,
        token: &str,
        parent_id: &str,
        name: &str,
    ) -> Result<DriveFile, StorageError> {
        match self.transport.find_child(token, parent_id, name).await? {
            Some(existing) if existing.is_folder() => Ok(existing),
            Some(existing) => Err(StorageError::io(
                format!("create folder {}", name),
                format!("a file named {:?} already exists ({})", name, existing.id),
            )),
            None => {
                debug!("creating folder {:?} under {}", name, parent_id);
                self.transport.create_folder(token, parent_id, name).await
            }
        }
    }
}

/// Token for the next call; an unauthenticated session never reaches the wire
fn bearer(session: &dyn AuthSession) -> Result<String, StorageError> {
    if !session.is_authenticated() {
        return Err(StorageError::NotAuthenticated);
    }
    session.access_token().ok_or(StorageError::NotAuthenticated)
}

fn remote_handle(reference: &BackendRef) -> Result<&RemoteHandle, StorageError> {
    match reference {
        BackendRef::Remote(handle) => Ok(handle),
        other => Err(StorageError::foreign_ref(StorageType::Remote, other)),
    }
}

#[async_trait]
impl StorageProvider for RemoteProvider {
    fn storage_type(&self) -> StorageType {
        StorageType::Remote
    }

    fn root(&self) -> BackendRef {
        BackendRef::Remote(self.root.clone())
    }

    async fn list_children(&self, container: &BackendRef) -> Result<Vec<ChildEntry>, StorageError> {
        let handle = remote_handle(container)?;
        let token = self.token()?;
        let files = self.transport.list_children(&token, &handle.id).await?;
        Ok(files
            .into_iter()
            .filter(|f| !f.trashed)
            .map(|f| ChildEntry {
                is_container: f.is_folder(),
                backend: BackendRef::Remote(f.handle()),
                name: f.name,
            })
            .collect())
    }

    async fn read_file(&self, file: &BackendRef) -> Result<String, StorageError> {
        let handle = remote_handle(file)?;
        let token = self.token()?;
        self.transport.download(&token, &handle.id).await
    }

    async fn write_file(&self, file: &BackendRef, text: &str) -> Result<(), StorageError> {
        let handle = remote_handle(file)?;
        let token = self.token()?;
        self.transport.update_content(&token, &handle.id, text).await?;
        debug!("wrote {} bytes to {}", text.len(), handle.id);
        Ok(())
    }

    async fn create_file(
        &self,
        container: &BackendRef,
        relative_path: &str,
    ) -> Result<BackendRef, StorageError> {
        let segments = creation_segments(relative_path)?;
        let handle = remote_handle(container)?;
        let token = self.token()?;

        let (leaf, folders) = match segments.split_last() {
            Some(split) => split,
            None => return Err(StorageError::InvalidName(relative_path.to_string())),
        };
        let mut parent_id = handle.id.clone();
        for name in folders {
            parent_id = self.ensure_folder(&token, &parent_id, name).await?.id;
        }

        match self.transport.find_child(&token, &parent_id, leaf).await? {
            Some(existing) if existing.is_folder() => Err(StorageError::io(
                format!("create file {}", relative_path),
                format!("a folder named {:?} already exists", leaf),
            )),
            Some(existing) => {
                debug!("reusing existing document {} for {}", existing.id, relative_path);
                Ok(BackendRef::Remote(existing.handle()))
            }
            None => {
                let created = self.transport.create_file(&token, &parent_id, leaf, "").await?;
                info!("created remote file {} ({})", relative_path, created.id);
                Ok(BackendRef::Remote(created.handle()))
            }
        }
    }

    async fn create_directory(
        &self,
        container: &BackendRef,
        relative_path: &str,
    ) -> Result<BackendRef, StorageError> {
        let segments = creation_segments(relative_path)?;
        let handle = remote_handle(container)?;
        let token = self.token()?;

        let mut current = None;
        let mut parent_id = handle.id.clone();
        for name in segments {
            let folder = self.ensure_folder(&token, &parent_id, name).await?;
            parent_id = folder.id.clone();
            current = Some(folder);
        }
        match current {
            Some(folder) => Ok(BackendRef::Remote(folder.handle())),
            None => Err(StorageError::InvalidName(relative_path.to_string())),
        }
    }

    /// Trashes the entry. Folders go to the trash with their contents, so
    /// `recursive` makes no difference here.
    async fn delete_entry(
        &self,
        container: &BackendRef,
        name: &str,
        _recursive: bool,
    ) -> Result<(), StorageError> {
        let handle = remote_handle(container)?;
        let token = self.token()?;
        let Some(target) = self.transport.find_child(&token, &handle.id, name).await? else {
            return Err(StorageError::NotFound(name.to_string()));
        };
        self.transport.trash(&token, &target.id).await?;
        info!("trashed remote entry {:?} ({})", name, target.id);
        Ok(())
    }

    async fn resolve_path(
        &self,
        root: &BackendRef,
        path: &str,
    ) -> Result<Option<BackendRef>, StorageError> {
        let handle = remote_handle(root)?;
        let segments = split_segments(path);
        if segments.is_empty() {
            return Ok(Some(root.clone()));
        }
        let token = self.token()?;

        let mut current = handle.clone();
        for name in segments {
            if name == "." || name == ".." || current.kind != EntryKind::Directory {
                return Ok(None);
            }
            match self.transport.find_child(&token, &current.id, name).await? {
                Some(found) => current = found.handle(),
                None => return Ok(None),
            }
        }
        Ok(Some(BackendRef::Remote(current)))
    }
}
