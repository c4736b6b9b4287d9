//! Helpers for the `/`-separated, backend-relative paths used across the tree.

use crate::storage::StorageError;

/// Non-empty segments of a `/`-separated path
pub fn split_segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Segments of a path handed to a create operation. Fails when nothing is
/// left after dropping empty segments, or when a segment is `.` or `..`.
pub fn creation_segments(path: &str) -> Result<Vec<&str>, StorageError> {
    let segments = split_segments(path);
    if segments.is_empty() {
        return Err(StorageError::InvalidName(path.to_string()));
    }
    if segments.iter().any(|s| *s == "." || *s == "..") {
        return Err(StorageError::InvalidName(path.to_string()));
    }
    Ok(segments)
}

/// Join a child name onto a tree path. The root is the empty path.
pub fn join_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", parent, name)
    }
}

/// Split a path into (parent path, leaf name)
pub fn split_parent(path: &str) -> Option<(String, &str)> {
    let mut segments = split_segments(path);
    let leaf = segments.pop()?;
    Some((segments.join("/"), leaf))
}

/// Canonical form of a tree path: no leading, trailing or doubled separators
pub fn normalize(path: &str) -> String {
    split_segments(path).join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_segments_drops_empty() {
        assert_eq!(split_segments("/a//b/c.txt/"), vec!["a", "b", "c.txt"]);
        assert!(split_segments("").is_empty());
        assert!(split_segments("///").is_empty());
    }

    #[test]
    fn test_creation_segments_rejects_degenerate_paths() {
        assert!(matches!(creation_segments(""), Err(StorageError::InvalidName(_))));
        assert!(matches!(creation_segments("//"), Err(StorageError::InvalidName(_))));
        assert!(matches!(creation_segments("a/../b"), Err(StorageError::InvalidName(_))));
        assert_eq!(creation_segments("a/b.txt").unwrap(), vec!["a", "b.txt"]);
    }

    #[test]
    fn test_join_path_at_root() {
        assert_eq!(join_path("", "notes.txt"), "notes.txt");
        assert_eq!(join_path("docs", "notes.txt"), "docs/notes.txt");
    }

    #[test]
    fn test_split_parent() {
        assert_eq!(split_parent("a/b/c.txt"), Some(("a/b".to_string(), "c.txt")));
        assert_eq!(split_parent("c.txt"), Some((String::new(), "c.txt")));
        assert_eq!(split_parent("/"), None);
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("/a//b/"), "a/b");
    }
}
