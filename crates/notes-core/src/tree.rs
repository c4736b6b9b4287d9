use std::cmp::Ordering;

use futures_util::future::{BoxFuture, FutureExt};
use tracing::{error, info, warn};

use notes_platform::{BackendRef, StorageProvider};

use crate::node::FileNode;
use crate::operations::{OperationKind, OperationTracker};

/// Build the sorted tree below `root`.
///
/// Best effort: a container that cannot be listed contributes no children and
/// the error is logged, so one unreadable directory never blanks the whole
/// tree. One `FileTreeLoad` record brackets the entire build.
pub async fn build_tree(
    provider: &dyn StorageProvider,
    root: &BackendRef,
    tracker: &OperationTracker,
) -> Vec<FileNode> {
    let _op = tracker.track(OperationKind::FileTreeLoad, Some(root.resource_id()), None);
    let nodes = build_level(provider, root.clone(), String::new()).await;
    info!(
        "built {} tree ({} top-level entries)",
        provider.storage_type(),
        nodes.len()
    );
    nodes
}

fn build_level<'a>(
    provider: &'a dyn StorageProvider,
    container: BackendRef,
    parent_path: String,
) -> BoxFuture<'a, Vec<FileNode>> {
    async move {
        let entries = match provider.list_children(&container).await {
            Ok(entries) => entries,
            Err(e) => {
                error!(
                    "failed to list {} directory {:?}: {}",
                    provider.storage_type(),
                    parent_path,
                    e
                );
                return Vec::new();
            }
        };

        let mut nodes = Vec::with_capacity(entries.len());
        for entry in entries {
            if entry.backend.storage_type() != provider.storage_type() {
                warn!(
                    "skipping {} entry {:?} from a {} listing",
                    entry.backend.storage_type(),
                    entry.name,
                    provider.storage_type()
                );
                continue;
            }
            let mut node = FileNode::from_entry(entry, &parent_path);
            if node.is_directory() {
                let children =
                    build_level(provider, node.backend.clone(), node.path.clone()).await;
                node.children = Some(children);
            }
            nodes.push(node);
        }

        sort_nodes(&mut nodes);
        nodes
    }
    .boxed()
}

/// Directories first, then by name
pub fn sort_nodes(nodes: &mut [FileNode]) {
    nodes.sort_by(compare_nodes);
}

pub fn compare_nodes(a: &FileNode, b: &FileNode) -> Ordering {
    match (a.is_directory(), b.is_directory()) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        _ => compare_names(&a.name, &b.name),
    }
}

/// Collation-style name order: letters compare case-insensitively first,
/// then lowercase sorts before uppercase, then raw code points decide.
pub fn compare_names(a: &str, b: &str) -> Ordering {
    let folded = a
        .chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase));

    folded
        .then_with(|| {
            a.chars()
                .map(char::is_uppercase)
                .cmp(b.chars().map(char::is_uppercase))
        })
        .then_with(|| a.cmp(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use notes_platform::{ChildEntry, EntryKind, LocalHandle, StorageError, StorageType};
    use std::collections::HashMap;
    use std::path::PathBuf;

    /// In-memory provider keyed by container path. Containers listed in
    /// `broken` fail to enumerate.
    struct FakeProvider {
        dirs: HashMap<String, Vec<(String, bool)>>,
        broken: Vec<String>,
    }

    fn local(path: &str, kind: EntryKind) -> BackendRef {
        BackendRef::Local(LocalHandle {
            path: PathBuf::from(path),
            kind,
        })
    }

    fn path_of(backend: &BackendRef) -> String {
        backend.resource_id()
    }

    #[async_trait]
    impl StorageProvider for FakeProvider {
        fn storage_type(&self) -> StorageType {
            StorageType::Local
        }

        fn root(&self) -> BackendRef {
            local("", EntryKind::Directory)
        }

        async fn list_children(
            &self,
            container: &BackendRef,
        ) -> Result<Vec<ChildEntry>, StorageError> {
            let path = path_of(container);
            if self.broken.contains(&path) {
                return Err(StorageError::io(format!("list {}", path), "permission denied"));
            }
            let entries = self.dirs.get(&path).cloned().unwrap_or_default();
            Ok(entries
                .into_iter()
                .map(|(name, is_dir)| {
                    let child = if path.is_empty() {
                        name.clone()
                    } else {
                        format!("{}/{}", path, name)
                    };
                    let kind = if is_dir {
                        EntryKind::Directory
                    } else {
                        EntryKind::File
                    };
                    ChildEntry {
                        name,
                        is_container: is_dir,
                        backend: local(&child, kind),
                    }
                })
                .collect())
        }

        async fn read_file(&self, _file: &BackendRef) -> Result<String, StorageError> {
            Ok(String::new())
        }

        async fn write_file(&self, _file: &BackendRef, _text: &str) -> Result<(), StorageError> {
            Ok(())
        }

        async fn create_file(&self, _c: &BackendRef, p: &str) -> Result<BackendRef, StorageError> {
            Ok(local(p, EntryKind::File))
        }

        async fn create_directory(
            &self,
            _c: &BackendRef,
            p: &str,
        ) -> Result<BackendRef, StorageError> {
            Ok(local(p, EntryKind::Directory))
        }

        async fn delete_entry(
            &self,
            _c: &BackendRef,
            _n: &str,
            _r: bool,
        ) -> Result<(), StorageError> {
            Ok(())
        }

        async fn resolve_path(
            &self,
            _r: &BackendRef,
            _p: &str,
        ) -> Result<Option<BackendRef>, StorageError> {
            Ok(None)
        }
    }

    fn fake(dirs: Vec<(&str, Vec<(&str, bool)>)>, broken: &[&str]) -> FakeProvider {
        FakeProvider {
            dirs: dirs
                .into_iter()
                .map(|(dir, entries)| {
                    (
                        dir.to_string(),
                        entries.into_iter().map(|(n, d)| (n.to_string(), d)).collect(),
                    )
                })
                .collect(),
            broken: broken.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn assert_sorted(nodes: &[FileNode]) {
        for pair in nodes.windows(2) {
            assert_ne!(
                compare_nodes(&pair[0], &pair[1]),
                Ordering::Greater,
                "{} should not precede {}",
                pair[0].path,
                pair[1].path
            );
        }
        for node in nodes {
            if let Some(children) = &node.children {
                assert_sorted(children);
            }
        }
    }

    #[tokio::test]
    async fn test_every_level_is_sorted() {
        let provider = fake(
            vec![
                (
                    "",
                    vec![
                        ("zeta.txt", false),
                        ("beta", true),
                        ("Alpha.md", false),
                        ("alpha", true),
                    ],
                ),
                ("beta", vec![("b.txt", false), ("A.txt", false), ("nested", true)]),
                ("alpha", vec![("z", true), ("a.txt", false)]),
            ],
            &[],
        );
        let tracker = OperationTracker::new();
        let tree = build_tree(&provider, &provider.root(), &tracker).await;

        let names: Vec<_> = tree.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "beta", "Alpha.md", "zeta.txt"]);
        assert_sorted(&tree);

        let beta = &tree[1];
        let beta_children: Vec<_> = beta
            .children
            .as_ref()
            .unwrap()
            .iter()
            .map(|n| n.path.as_str())
            .collect();
        assert_eq!(beta_children, vec!["beta/nested", "beta/A.txt", "beta/b.txt"]);
    }

    #[tokio::test]
    async fn test_broken_subtree_yields_empty_children() {
        let provider = fake(
            vec![
                ("", vec![("ok", true), ("locked", true), ("file.txt", false)]),
                ("ok", vec![("inside.txt", false)]),
            ],
            &["locked"],
        );
        let tracker = OperationTracker::new();
        let tree = build_tree(&provider, &provider.root(), &tracker).await;

        assert_eq!(tree.len(), 3);
        let locked = tree.iter().find(|n| n.name == "locked").unwrap();
        assert_eq!(locked.children, Some(Vec::new()));
        let ok = tree.iter().find(|n| n.name == "ok").unwrap();
        assert_eq!(ok.children.as_ref().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_broken_root_yields_empty_tree() {
        let provider = fake(Vec::new(), &[""]);
        let tracker = OperationTracker::new();
        let tree = build_tree(&provider, &provider.root(), &tracker).await;
        assert!(tree.is_empty());
        assert!(tracker.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_build_brackets_one_tracker_record() {
        let provider = fake(vec![("", vec![("d", true)]), ("d", vec![("e", true)])], &[]);
        let tracker = OperationTracker::new();
        let mut rx = tracker.subscribe();

        build_tree(&provider, &provider.root(), &tracker).await;

        // one start and one end: the receiver sees the final empty list and
        // nothing is left behind
        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().is_empty());
        assert!(tracker.snapshot().is_empty());
    }

    #[test]
    fn test_compare_names_is_case_aware() {
        assert_eq!(compare_names("apple", "Banana"), Ordering::Less);
        assert_eq!(compare_names("a", "A"), Ordering::Less);
        assert_eq!(compare_names("A", "b"), Ordering::Less);
        assert_eq!(compare_names("same", "same"), Ordering::Equal);
        assert_eq!(compare_names("file10", "file2"), Ordering::Less);
    }

    #[test]
    fn test_paths_are_unique_and_relative() {
        let node = FileNode::from_entry(
            ChildEntry {
                name: "x".to_string(),
                is_container: false,
                backend: local("x", EntryKind::File),
            },
            "",
        );
        assert_eq!(node.path, "x");
        assert!(!node.path.starts_with('/'));
    }
}
