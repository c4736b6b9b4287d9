use serde::{Deserialize, Serialize};

use notes_platform::path::{join_path, split_segments};
use notes_platform::{BackendRef, ChildEntry, EntryKind, StorageType};

/// One entry of the in-memory mirror of a backend tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileNode {
    pub name: String,
    /// `/`-joined path from the tree root, never starting or ending with `/`
    pub path: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub backend: BackendRef,
    /// Sorted children, present for directories only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<FileNode>>,
}

impl FileNode {
    /// Leaf node for a provider entry found under `parent_path`
    pub fn from_entry(entry: ChildEntry, parent_path: &str) -> Self {
        let kind = if entry.is_container {
            EntryKind::Directory
        } else {
            EntryKind::File
        };
        Self {
            path: join_path(parent_path, &entry.name),
            name: entry.name,
            kind,
            backend: entry.backend,
            children: None,
        }
    }

    /// Node for a reference resolved from a tree path
    pub fn from_resolved(path: &str, backend: BackendRef) -> Self {
        let segments = split_segments(path);
        Self {
            name: segments.last().map(|s| s.to_string()).unwrap_or_default(),
            path: segments.join("/"),
            kind: backend.kind(),
            backend,
            children: None,
        }
    }

    pub fn storage_type(&self) -> StorageType {
        self.backend.storage_type()
    }

    pub fn is_directory(&self) -> bool {
        self.kind == EntryKind::Directory
    }
}

/// Depth-first lookup of `path` in a tree snapshot
pub fn find_node<'a>(nodes: &'a [FileNode], path: &str) -> Option<&'a FileNode> {
    for node in nodes {
        if node.path == path {
            return Some(node);
        }
        if let Some(children) = &node.children {
            if path.starts_with(&format!("{}/", node.path)) {
                return find_node(children, path);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use notes_platform::RemoteHandle;

    fn remote(id: &str, kind: EntryKind) -> BackendRef {
        BackendRef::Remote(RemoteHandle {
            id: id.to_string(),
            mime_type: "text/plain".to_string(),
            kind,
        })
    }

    #[test]
    fn test_from_entry_joins_parent_path() {
        let entry = ChildEntry {
            name: "c.txt".to_string(),
            is_container: false,
            backend: remote("c", EntryKind::File),
        };
        let node = FileNode::from_entry(entry, "a/b");
        assert_eq!(node.path, "a/b/c.txt");
        assert_eq!(node.kind, EntryKind::File);
        assert_eq!(node.storage_type(), StorageType::Remote);
    }

    #[test]
    fn test_from_resolved_normalizes_path() {
        let node = FileNode::from_resolved("/docs//todo.txt", remote("t", EntryKind::File));
        assert_eq!(node.name, "todo.txt");
        assert_eq!(node.path, "docs/todo.txt");
    }

    #[test]
    fn test_find_node_descends() {
        let leaf = FileNode {
            name: "x.txt".to_string(),
            path: "dir/x.txt".to_string(),
            kind: EntryKind::File,
            backend: remote("x", EntryKind::File),
            children: None,
        };
        let tree = vec![FileNode {
            name: "dir".to_string(),
            path: "dir".to_string(),
            kind: EntryKind::Directory,
            backend: remote("d", EntryKind::Directory),
            children: Some(vec![leaf.clone()]),
        }];
        assert_eq!(find_node(&tree, "dir/x.txt"), Some(&leaf));
        assert!(find_node(&tree, "dir/y.txt").is_none());
        assert!(find_node(&tree, "dirx").is_none());
    }
}
