use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use notes_platform::path::{creation_segments, split_segments};
use notes_platform::{
    BackendRef, ChildEntry, EntryKind, LocalHandle, StorageError, StorageProvider, StorageType,
};

/// Storage backend confined to one user-granted directory.
///
/// Handles are paths relative to the granted root. Anything that would step
/// outside it (`..`, absolute components, symlinks) is treated as absent.
pub struct LocalProvider {
    root: PathBuf,
}

impl LocalProvider {
    /// Grant access to `dir`, which must be an existing directory
    pub async fn grant(dir: impl AsRef<Path>) -> Result<Self, StorageError> {
        let dir = dir.as_ref();
        let root = fs::canonicalize(dir)
            .await
            .map_err(|e| map_io(format!("failed to open directory {}", dir.display()), e))?;
        let meta = fs::metadata(&root)
            .await
            .map_err(|e| map_io(format!("failed to stat {}", root.display()), e))?;
        if !meta.is_dir() {
            return Err(StorageError::io(
                format!("cannot grant {}", root.display()),
                "not a directory",
            ));
        }
        info!("granted local directory {}", root.display());
        Ok(Self { root })
    }

    /// Absolute path of the granted directory
    pub fn root_path(&self) -> &Path {
        &self.root
    }

    fn handle<'a>(&self, backend: &'a BackendRef) -> Result<&'a LocalHandle, StorageError> {
        match backend {
            BackendRef::Local(handle) => Ok(handle),
            other => Err(StorageError::foreign_ref(StorageType::Local, other)),
        }
    }

    fn absolute(&self, relative: &Path) -> Result<PathBuf, StorageError> {
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(StorageError::InvalidName(relative.display().to_string()));
        }
        Ok(self.root.join(relative))
    }

    fn container<'a>(&self, backend: &'a BackendRef) -> Result<&'a LocalHandle, StorageError> {
        let handle = self.handle(backend)?;
        if handle.kind != EntryKind::Directory {
            return Err(StorageError::io(
                format!("cannot use {} as a container", handle.path.display()),
                "not a directory",
            ));
        }
        Ok(handle)
    }

    async fn ensure_directory(&self, relative: &Path) -> Result<(), StorageError> {
        let abs = self.absolute(relative)?;
        match fs::create_dir(&abs).await {
            Ok(()) => {
                debug!("created directory {}", abs.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                let meta = fs::symlink_metadata(&abs)
                    .await
                    .map_err(|e| map_io(format!("failed to stat {}", abs.display()), e))?;
                if meta.is_dir() {
                    Ok(())
                } else {
                    Err(StorageError::io(
                        format!("failed to create directory {}", abs.display()),
                        "a file with that name already exists",
                    ))
                }
            }
            Err(e) => Err(map_io(
                format!("failed to create directory {}", abs.display()),
                e,
            )),
        }
    }
}

#[async_trait]
impl StorageProvider for LocalProvider {
    fn storage_type(&self) -> StorageType {
        StorageType::Local
    }

    fn root(&self) -> BackendRef {
        BackendRef::Local(LocalHandle {
            path: PathBuf::new(),
            kind: EntryKind::Directory,
        })
    }

    async fn list_children(&self, container: &BackendRef) -> Result<Vec<ChildEntry>, StorageError> {
        let handle = self.container(container)?;
        let abs = self.absolute(&handle.path)?;
        let mut entries = fs::read_dir(&abs)
            .await
            .map_err(|e| map_io(format!("failed to read directory {}", abs.display()), e))?;

        let mut result = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| map_io(format!("failed to read directory {}", abs.display()), e))?
        {
            let file_type = match entry.file_type().await {
                Ok(t) => t,
                Err(e) => {
                    warn!("skipping {}: {}", entry.path().display(), e);
                    continue;
                }
            };
            let name = match entry.file_name().into_string() {
                Ok(name) => name,
                Err(raw) => {
                    warn!("skipping non UTF-8 entry {:?}", raw);
                    continue;
                }
            };
            let kind = if file_type.is_dir() {
                EntryKind::Directory
            } else if file_type.is_file() {
                EntryKind::File
            } else {
                debug!("skipping special entry {}", entry.path().display());
                continue;
            };

            result.push(ChildEntry {
                backend: BackendRef::Local(LocalHandle {
                    path: handle.path.join(&name),
                    kind,
                }),
                is_container: kind == EntryKind::Directory,
                name,
            });
        }

        Ok(result)
    }

    async fn read_file(&self, file: &BackendRef) -> Result<String, StorageError> {
        let handle = self.handle(file)?;
        let abs = self.absolute(&handle.path)?;
        fs::read_to_string(&abs)
            .await
            .map_err(|e| map_io(format!("failed to read file {}", abs.display()), e))
    }

    async fn write_file(&self, file: &BackendRef, text: &str) -> Result<(), StorageError> {
        let handle = self.handle(file)?;
        let abs = self.absolute(&handle.path)?;

        // The handle is dropped on every exit path, which closes it.
        let mut writable = OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(&abs)
            .await
            .map_err(|e| map_io(format!("failed to open {} for writing", abs.display()), e))?;
        writable
            .write_all(text.as_bytes())
            .await
            .map_err(|e| map_io(format!("failed to write file {}", abs.display()), e))?;
        writable
            .flush()
            .await
            .map_err(|e| map_io(format!("failed to flush file {}", abs.display()), e))?;

        debug!("wrote {} bytes to {}", text.len(), abs.display());
        Ok(())
    }

    async fn create_file(
        &self,
        container: &BackendRef,
        relative_path: &str,
    ) -> Result<BackendRef, StorageError> {
        let base = self.container(container)?;
        let segments = creation_segments(relative_path)?;
        let Some((file_name, dirs)) = segments.split_last() else {
            return Err(StorageError::InvalidName(relative_path.to_string()));
        };

        let mut relative = base.path.clone();
        for dir in dirs {
            relative.push(dir);
            self.ensure_directory(&relative).await?;
        }
        relative.push(file_name);

        let abs = self.absolute(&relative)?;
        // An existing file is opened as is, never truncated.
        OpenOptions::new()
            .write(true)
            .create(true)
            .open(&abs)
            .await
            .map_err(|e| map_io(format!("failed to create file {}", abs.display()), e))?;

        info!("created file {}", abs.display());
        Ok(BackendRef::Local(LocalHandle {
            path: relative,
            kind: EntryKind::File,
        }))
    }

    async fn create_directory(
        &self,
        container: &BackendRef,
        relative_path: &str,
    ) -> Result<BackendRef, StorageError> {
        let base = self.container(container)?;
        let segments = creation_segments(relative_path)?;

        let mut relative = base.path.clone();
        for dir in segments {
            relative.push(dir);
            self.ensure_directory(&relative).await?;
        }

        Ok(BackendRef::Local(LocalHandle {
            path: relative,
            kind: EntryKind::Directory,
        }))
    }

    async fn delete_entry(
        &self,
        container: &BackendRef,
        name: &str,
        recursive: bool,
    ) -> Result<(), StorageError> {
        let base = self.container(container)?;
        let segments = creation_segments(name)?;
        if segments.len() != 1 {
            return Err(StorageError::InvalidName(name.to_string()));
        }

        let abs = self.absolute(&base.path.join(segments[0]))?;
        let meta = fs::symlink_metadata(&abs)
            .await
            .map_err(|e| map_io(format!("failed to stat {}", abs.display()), e))?;

        if meta.is_dir() {
            let removed = if recursive {
                fs::remove_dir_all(&abs).await
            } else {
                fs::remove_dir(&abs).await
            };
            removed
                .map_err(|e| map_io(format!("failed to delete directory {}", abs.display()), e))?;
        } else {
            fs::remove_file(&abs)
                .await
                .map_err(|e| map_io(format!("failed to delete file {}", abs.display()), e))?;
        }

        info!("deleted {}", abs.display());
        Ok(())
    }

    async fn resolve_path(
        &self,
        root: &BackendRef,
        path: &str,
    ) -> Result<Option<BackendRef>, StorageError> {
        let base = self.container(root)?;
        let segments = split_segments(path);
        let mut current = base.path.clone();

        for (i, segment) in segments.iter().enumerate() {
            if *segment == "." || *segment == ".." {
                return Ok(None);
            }
            let is_last = i == segments.len() - 1;
            let candidate = current.join(segment);
            let abs = self.absolute(&candidate)?;

            match fs::symlink_metadata(&abs).await {
                Ok(meta) if meta.is_dir() => current = candidate,
                Ok(meta) if meta.is_file() && is_last => {
                    return Ok(Some(BackendRef::Local(LocalHandle {
                        path: candidate,
                        kind: EntryKind::File,
                    })));
                }
                Ok(_) => return Ok(None),
                Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
                Err(e) => return Err(map_io(format!("failed to stat {}", abs.display()), e)),
            }
        }

        Ok(Some(BackendRef::Local(LocalHandle {
            path: current,
            kind: EntryKind::Directory,
        })))
    }
}

fn map_io(context: String, err: std::io::Error) -> StorageError {
    if err.kind() == ErrorKind::NotFound {
        StorageError::NotFound(context)
    } else {
        StorageError::io(context, err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn provider() -> (tempfile::TempDir, LocalProvider) {
        let dir = tempdir().unwrap();
        let provider = LocalProvider::grant(dir.path()).await.unwrap();
        (dir, provider)
    }

    #[tokio::test]
    async fn test_create_then_resolve_roundtrip() {
        let (_dir, provider) = provider().await;
        let root = provider.root();

        let created = provider.create_file(&root, "a/b/c.txt").await.unwrap();
        let resolved = provider.resolve_path(&root, "a/b/c.txt").await.unwrap();
        assert_eq!(resolved, Some(created.clone()));
        assert_eq!(created.resource_id(), "a/b/c.txt");
        assert_eq!(created.kind(), EntryKind::File);

        let dir = provider.resolve_path(&root, "a/b").await.unwrap().unwrap();
        assert!(dir.is_directory());
    }

    #[tokio::test]
    async fn test_resolve_missing_returns_none() {
        let (_dir, provider) = provider().await;
        let root = provider.root();
        provider.create_file(&root, "a/c.txt").await.unwrap();

        assert_eq!(provider.resolve_path(&root, "missing/c.txt").await.unwrap(), None);
        assert_eq!(provider.resolve_path(&root, "a/missing.txt").await.unwrap(), None);
        // a file cannot be walked through
        assert_eq!(provider.resolve_path(&root, "a/c.txt/d").await.unwrap(), None);
        assert_eq!(provider.resolve_path(&root, "../etc").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_resolve_empty_path_is_root() {
        let (_dir, provider) = provider().await;
        let root = provider.root();
        assert_eq!(provider.resolve_path(&root, "").await.unwrap(), Some(root));
    }

    #[tokio::test]
    async fn test_write_truncates_previous_content() {
        let (dir, provider) = provider().await;
        let root = provider.root();
        let file = provider.create_file(&root, "notes.txt").await.unwrap();

        provider.write_file(&file, "a much longer first version").await.unwrap();
        provider.write_file(&file, "short").await.unwrap();

        assert_eq!(provider.read_file(&file).await.unwrap(), "short");
        let on_disk = std::fs::read_to_string(dir.path().join("notes.txt")).unwrap();
        assert_eq!(on_disk, "short");
    }

    #[tokio::test]
    async fn test_create_existing_file_keeps_content() {
        let (_dir, provider) = provider().await;
        let root = provider.root();
        let file = provider.create_file(&root, "keep.txt").await.unwrap();
        provider.write_file(&file, "kept").await.unwrap();

        let again = provider.create_file(&root, "keep.txt").await.unwrap();
        assert_eq!(again, file);
        assert_eq!(provider.read_file(&again).await.unwrap(), "kept");
    }

    #[tokio::test]
    async fn test_create_rejects_empty_names() {
        let (_dir, provider) = provider().await;
        let root = provider.root();
        assert!(matches!(
            provider.create_file(&root, "//").await,
            Err(StorageError::InvalidName(_))
        ));
        assert!(matches!(
            provider.create_directory(&root, "").await,
            Err(StorageError::InvalidName(_))
        ));
        assert!(matches!(
            provider.create_file(&root, "../escape.txt").await,
            Err(StorageError::InvalidName(_))
        ));
    }

    #[tokio::test]
    async fn test_create_through_existing_file_fails() {
        let (_dir, provider) = provider().await;
        let root = provider.root();
        provider.create_file(&root, "a").await.unwrap();
        assert!(matches!(
            provider.create_file(&root, "a/b.txt").await,
            Err(StorageError::IoFailure { .. })
        ));
    }

    #[tokio::test]
    async fn test_create_directory_nested() {
        let (dir, provider) = provider().await;
        let root = provider.root();
        let created = provider.create_directory(&root, "x/y/z").await.unwrap();
        assert!(created.is_directory());
        assert!(dir.path().join("x").join("y").join("z").is_dir());
    }

    #[tokio::test]
    async fn test_list_children_reports_kinds() {
        let (_dir, provider) = provider().await;
        let root = provider.root();
        provider.create_file(&root, "docs/readme.md").await.unwrap();
        provider.create_file(&root, "todo.txt").await.unwrap();

        let mut children = provider.list_children(&root).await.unwrap();
        children.sort_by(|a, b| a.name.cmp(&b.name));
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].name, "docs");
        assert!(children[0].is_container);
        assert_eq!(children[1].name, "todo.txt");
        assert!(!children[1].is_container);

        let docs = provider.list_children(&children[0].backend).await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].backend.resource_id(), "docs/readme.md");
    }

    #[tokio::test]
    async fn test_delete_non_empty_directory_requires_recursive() {
        let (dir, provider) = provider().await;
        let root = provider.root();
        provider.create_file(&root, "full/inner.txt").await.unwrap();

        assert!(matches!(
            provider.delete_entry(&root, "full", false).await,
            Err(StorageError::IoFailure { .. })
        ));
        assert!(dir.path().join("full").exists());

        provider.delete_entry(&root, "full", true).await.unwrap();
        assert!(!dir.path().join("full").exists());
    }

    #[tokio::test]
    async fn test_delete_missing_entry_is_not_found() {
        let (_dir, provider) = provider().await;
        let root = provider.root();
        assert!(matches!(
            provider.delete_entry(&root, "ghost.txt", false).await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_read_missing_file_is_not_found() {
        let (_dir, provider) = provider().await;
        let ghost = BackendRef::Local(LocalHandle {
            path: PathBuf::from("ghost.txt"),
            kind: EntryKind::File,
        });
        assert!(matches!(
            provider.read_file(&ghost).await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_grant_rejects_regular_file() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("plain.txt");
        std::fs::write(&file, "x").unwrap();
        assert!(LocalProvider::grant(&file).await.is_err());
    }
}
