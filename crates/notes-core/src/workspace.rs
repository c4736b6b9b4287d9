use std::path::Path;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{watch, RwLock};
use tracing::{info, warn};

use notes_local::LocalProvider;
use notes_platform::path::{normalize, split_parent};
use notes_platform::{AuthSession, EntryKind, StorageError, StorageProvider, StorageType};

use crate::drive::{DriveTransport, RemoteProvider};
use crate::filename::{default_file_name, MAX_FILE_SIZE};
use crate::node::FileNode;
use crate::operations::{OperationKind, OperationTracker};
use crate::store::Store;
use crate::tabs::{TabId, TabManager};
use crate::tree::build_tree;

#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("no {0} storage is connected")]
    NoBackend(StorageType),

    #[error("no open tab {0}")]
    TabNotFound(TabId),

    #[error("a save of {0} is already running")]
    SaveInFlight(String),

    #[error("{0} is not a file")]
    NotAFile(String),

    #[error("{path} is {size} bytes, over the {limit} byte limit")]
    FileTooLarge {
        path: String,
        size: usize,
        limit: usize,
    },
}

/// One storage backend slot and the tree mirrored from it
#[derive(Default)]
struct BackendSlot {
    provider: RwLock<Option<Arc<dyn StorageProvider>>>,
    tree: Store<Vec<FileNode>>,
}

/// Editing workspace over the local and remote storage trees.
///
/// Storage work runs first and is bracketed by the operation tracker; the
/// tab session is only touched once the storage call has succeeded.
#[derive(Default)]
pub struct Workspace {
    tracker: OperationTracker,
    tabs: TabManager,
    local: BackendSlot,
    remote: BackendSlot,
}

impl Workspace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tracker(&self) -> &OperationTracker {
        &self.tracker
    }

    pub fn tabs(&self) -> &TabManager {
        &self.tabs
    }

    fn slot(&self, storage_type: StorageType) -> &BackendSlot {
        match storage_type {
            StorageType::Local => &self.local,
            StorageType::Remote => &self.remote,
        }
    }

    async fn provider(
        &self,
        storage_type: StorageType,
    ) -> Result<Arc<dyn StorageProvider>, WorkspaceError> {
        self.slot(storage_type)
            .provider
            .read()
            .await
            .clone()
            .ok_or(WorkspaceError::NoBackend(storage_type))
    }

    pub async fn is_connected(&self, storage_type: StorageType) -> bool {
        self.slot(storage_type).provider.read().await.is_some()
    }

    /// Install a provider in the slot for its storage type and load its tree
    pub async fn attach(&self, provider: Arc<dyn StorageProvider>) -> Vec<FileNode> {
        let storage_type = provider.storage_type();
        let previous = self
            .slot(storage_type)
            .provider
            .write()
            .await
            .replace(provider);
        if previous.is_some() {
            info!("replacing connected {} storage", storage_type);
        }
        self.reload(storage_type).await.unwrap_or_default()
    }

    /// Connect the directory at `root` as the local tree
    pub async fn connect_local(&self, root: &Path) -> Result<Vec<FileNode>, WorkspaceError> {
        let provider = LocalProvider::grant(root).await?;
        info!("connected local storage at {}", provider.root_path().display());
        Ok(self.attach(Arc::new(provider)).await)
    }

    /// Connect the remote document store rooted at `folder_name`
    pub async fn connect_remote(
        &self,
        transport: Arc<dyn DriveTransport>,
        session: Arc<dyn AuthSession>,
        folder_name: &str,
    ) -> Result<Vec<FileNode>, WorkspaceError> {
        let provider = {
            let _op = self.tracker.track(
                OperationKind::DriveConnect,
                None,
                Some(folder_name.to_string()),
            );
            RemoteProvider::connect(transport, session, folder_name).await?
        };
        Ok(self.attach(Arc::new(provider)).await)
    }

    /// Drop the provider for `storage_type`, clear its tree and close the
    /// tabs bound to it. Returns whether anything was connected.
    pub async fn disconnect(&self, storage_type: StorageType) -> bool {
        let _op = (storage_type == StorageType::Remote)
            .then(|| self.tracker.track(OperationKind::DriveDisconnect, None, None));
        let slot = self.slot(storage_type);
        let previous = slot.provider.write().await.take();
        slot.tree.set(Vec::new());
        let closed = self.tabs.close_tabs_by_storage_type(storage_type);
        if previous.is_some() {
            info!("disconnected {} storage, closed {} tab(s)", storage_type, closed);
        }
        previous.is_some()
    }

    /// Rebuild the tree of `storage_type` and publish it
    pub async fn refresh_tree(
        &self,
        storage_type: StorageType,
    ) -> Result<Vec<FileNode>, WorkspaceError> {
        self.reload(storage_type).await
    }

    async fn reload(&self, storage_type: StorageType) -> Result<Vec<FileNode>, WorkspaceError> {
        let provider = self.provider(storage_type).await?;
        let nodes = build_tree(provider.as_ref(), &provider.root(), &self.tracker).await;
        self.slot(storage_type).tree.set(nodes.clone());
        Ok(nodes)
    }

    /// Last published tree of `storage_type`
    pub fn tree(&self, storage_type: StorageType) -> Vec<FileNode> {
        self.slot(storage_type).tree.get()
    }

    pub fn subscribe_tree(&self, storage_type: StorageType) -> watch::Receiver<Vec<FileNode>> {
        self.slot(storage_type).tree.subscribe()
    }

    /// Open `node` in a tab. A node that is already open is only activated,
    /// its content is not read again.
    pub async fn open_file(&self, node: &FileNode) -> Result<TabId, WorkspaceError> {
        if node.is_directory() {
            return Err(WorkspaceError::NotAFile(node.path.clone()));
        }
        if let Some(tab) = self.tabs.find_by_path(&node.path) {
            self.tabs.set_active(tab.id);
            return Ok(tab.id);
        }

        let provider = self.provider(node.storage_type()).await?;
        let content = {
            let _op = self.tracker.track(
                OperationKind::FileLoad,
                Some(node.backend.resource_id()),
                Some(node.name.clone()),
            );
            provider.read_file(&node.backend).await?
        };
        if content.len() > MAX_FILE_SIZE {
            return Err(WorkspaceError::FileTooLarge {
                path: node.path.clone(),
                size: content.len(),
                limit: MAX_FILE_SIZE,
            });
        }
        Ok(self.tabs.open_tab(node.clone(), content))
    }

    /// Persist a tab. Bound tabs are written in place. Unsaved tabs are
    /// created under their default name at the root of `target`, written,
    /// then bound to the new file.
    pub async fn save_tab(
        &self,
        id: TabId,
        target: StorageType,
    ) -> Result<FileNode, WorkspaceError> {
        let tab = self.tabs.tab(id).ok_or(WorkspaceError::TabNotFound(id))?;

        if let Some(file) = tab.file.clone() {
            let provider = self.provider(file.storage_type()).await?;
            {
                let _op = self
                    .tracker
                    .try_track(
                        OperationKind::FileSave,
                        file.backend.resource_id(),
                        Some(file.name.clone()),
                    )
                    .ok_or_else(|| WorkspaceError::SaveInFlight(file.path.clone()))?;
                provider.write_file(&file.backend, &tab.content).await?;
            }
            self.tabs.mark_tab_saved(id);
            info!("saved {} ({})", file.path, file.storage_type());
            return Ok(file);
        }

        let name = tab.default_file_name.clone().unwrap_or_else(default_file_name);
        let provider = self.provider(target).await?;
        let node = {
            let _op = self
                .tracker
                .try_track(OperationKind::FileCreate, id.to_string(), Some(name.clone()))
                .ok_or_else(|| WorkspaceError::SaveInFlight(tab.title().to_string()))?;
            let backend = provider.create_file(&provider.root(), &name).await?;
            provider.write_file(&backend, &tab.content).await?;
            FileNode::from_resolved(&name, backend)
        };
        self.tabs.update_tab_file(id, node.clone());
        info!("saved new document as {} ({})", node.path, target);
        if let Err(e) = self.reload(target).await {
            warn!("tree refresh after save failed: {}", e);
        }
        Ok(node)
    }

    /// Create a file or directory at `path` and refresh the tree
    pub async fn create_entry(
        &self,
        storage_type: StorageType,
        path: &str,
        kind: EntryKind,
    ) -> Result<FileNode, WorkspaceError> {
        let provider = self.provider(storage_type).await?;
        let root = provider.root();
        let backend = {
            let _op = self.tracker.track(
                OperationKind::FileCreate,
                None,
                Some(normalize(path)),
            );
            match kind {
                EntryKind::File => provider.create_file(&root, path).await?,
                EntryKind::Directory => provider.create_directory(&root, path).await?,
            }
        };
        self.reload(storage_type).await?;
        Ok(FileNode::from_resolved(path, backend))
    }

    /// Delete the entry at `path`. Open tabs on it are left alone.
    pub async fn delete_entry(
        &self,
        storage_type: StorageType,
        path: &str,
        recursive: bool,
    ) -> Result<(), WorkspaceError> {
        let Some((parent, name)) = split_parent(path) else {
            return Err(StorageError::InvalidName(path.to_string()).into());
        };
        let provider = self.provider(storage_type).await?;
        let container = provider
            .resolve_path(&provider.root(), &parent)
            .await?
            .ok_or_else(|| StorageError::NotFound(parent.clone()))?;
        provider.delete_entry(&container, name, recursive).await?;
        info!("deleted {} ({})", normalize(path), storage_type);
        self.reload(storage_type).await?;
        Ok(())
    }

    /// Node at `path` in the `storage_type` tree, looked up in the backend
    pub async fn resolve(
        &self,
        storage_type: StorageType,
        path: &str,
    ) -> Result<Option<FileNode>, WorkspaceError> {
        let provider = self.provider(storage_type).await?;
        let resolved = provider.resolve_path(&provider.root(), path).await?;
        Ok(resolved.map(|backend| FileNode::from_resolved(path, backend)))
    }
}
