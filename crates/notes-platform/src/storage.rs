use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Boxed error carried as the source of an I/O failure
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Which storage substrate a node or provider belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    Local,
    Remote,
}

impl fmt::Display for StorageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageType::Local => f.write_str("local"),
            StorageType::Remote => f.write_str("remote"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
}

/// Handle into a granted local directory. `path` is relative to the granted
/// root and uses the platform separator; the root itself is the empty path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocalHandle {
    pub path: PathBuf,
    pub kind: EntryKind,
}

/// Identity of a document in the remote store
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RemoteHandle {
    pub id: String,
    /// Content-type hint reported by the store
    pub mime_type: String,
    pub kind: EntryKind,
}

/// Backend identity of one entry. The variant doubles as the storage type
/// discriminant, so a reference can never carry both identities.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "storage", rename_all = "lowercase")]
pub enum BackendRef {
    Local(LocalHandle),
    Remote(RemoteHandle),
}

impl BackendRef {
    pub fn storage_type(&self) -> StorageType {
        match self {
            BackendRef::Local(_) => StorageType::Local,
            BackendRef::Remote(_) => StorageType::Remote,
        }
    }

    pub fn kind(&self) -> EntryKind {
        match self {
            BackendRef::Local(handle) => handle.kind,
            BackendRef::Remote(handle) => handle.kind,
        }
    }

    pub fn is_directory(&self) -> bool {
        self.kind() == EntryKind::Directory
    }

    /// Stable string identifying the entry within its backend, used as the
    /// resource id of operation records.
    pub fn resource_id(&self) -> String {
        match self {
            BackendRef::Local(handle) => handle
                .path
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/"),
            BackendRef::Remote(handle) => handle.id.clone(),
        }
    }
}

/// One direct child of a container as reported by a provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildEntry {
    pub name: String,
    pub is_container: bool,
    pub backend: BackendRef,
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("not authenticated with the remote document store")]
    NotAuthenticated,

    #[error("{context}: {source}")]
    IoFailure {
        context: String,
        #[source]
        source: BoxError,
    },

    #[error("invalid name: {0:?}")]
    InvalidName(String),

    #[error("not found: {0}")]
    NotFound(String),
}

impl StorageError {
    pub fn io(context: impl Into<String>, source: impl Into<BoxError>) -> Self {
        StorageError::IoFailure {
            context: context.into(),
            source: source.into(),
        }
    }

    /// A reference from another backend was handed to this provider
    pub fn foreign_ref(expected: StorageType, got: &BackendRef) -> Self {
        StorageError::io(
            format!("expected a {} handle", expected),
            format!("got a {} handle for {}", got.storage_type(), got.resource_id()),
        )
    }
}

/// Capability set every storage backend implements.
///
/// Tree building and the editing session only ever talk to this trait; all
/// behavioral differences between backends stay inside the implementations.
#[async_trait]
pub trait StorageProvider: Send + Sync {
    /// Storage type of every reference this provider hands out
    fn storage_type(&self) -> StorageType;

    /// Root container of the tree this provider exposes
    fn root(&self) -> BackendRef;

    /// Direct children of a container, in the backend's native order
    async fn list_children(&self, container: &BackendRef) -> Result<Vec<ChildEntry>, StorageError>;

    /// Whole content of a file decoded as text
    async fn read_file(&self, file: &BackendRef) -> Result<String, StorageError>;

    /// Replace the whole content of a file
    async fn write_file(&self, file: &BackendRef, text: &str) -> Result<(), StorageError>;

    /// Create a file at a `/`-separated path below `container`, creating
    /// missing intermediate directories.
    async fn create_file(
        &self,
        container: &BackendRef,
        relative_path: &str,
    ) -> Result<BackendRef, StorageError>;

    /// Create every segment of a `/`-separated path as a directory
    async fn create_directory(
        &self,
        container: &BackendRef,
        relative_path: &str,
    ) -> Result<BackendRef, StorageError>;

    /// Remove the child `name` of `container`
    async fn delete_entry(
        &self,
        container: &BackendRef,
        name: &str,
        recursive: bool,
    ) -> Result<(), StorageError>;

    /// Walk a `/`-separated path from `root`. `Ok(None)` when nothing lives there.
    async fn resolve_path(
        &self,
        root: &BackendRef,
        path: &str,
    ) -> Result<Option<BackendRef>, StorageError>;
}
