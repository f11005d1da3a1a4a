//! The store: an in-memory group tree with optional JSON file backing.
//!
//! A single writer is assumed. Changes live in memory until
//! [`TreeStore::flush`], which writes a sibling temp file and renames it
//! over the backing file, so a crash leaves either the previous or the new
//! document on disk.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::StoreError;
use crate::node::GroupNode;
use crate::path::GroupPath;

/// Hierarchical attribute and array store.
#[derive(Debug, Clone, Default)]
pub struct TreeStore {
    root: GroupNode,
    backing: Option<PathBuf>,
}

impl TreeStore {
    /// A store that is never written to disk.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Open a file-backed store. A missing file yields an empty store that
    /// is created on the first flush.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the file exists but cannot be read, or
    /// [`StoreError::Serialization`] if it is not a valid store document.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let root = match fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "Store file not found, starting empty");
                GroupNode::new()
            }
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        tracing::debug!(path = %path.display(), "Opened store");
        Ok(Self {
            root,
            backing: Some(path),
        })
    }

    /// Backing file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.backing.as_deref()
    }

    /// Write the tree to the backing file. No-op for in-memory stores.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] or [`StoreError::Serialization`].
    pub fn flush(&self) -> Result<(), StoreError> {
        let Some(path) = &self.backing else {
            return Ok(());
        };
        let bytes = serde_json::to_vec(&self.root)?;
        let mut tmp = path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, &bytes).map_err(|source| StoreError::Io {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, path).map_err(|source| StoreError::Io {
            path: path.clone(),
            source,
        })?;
        tracing::debug!(path = %path.display(), bytes = bytes.len(), "Flushed store");
        Ok(())
    }

    /// The root group (top-level attributes live here).
    pub const fn root(&self) -> &GroupNode {
        &self.root
    }

    /// Mutable root group.
    pub const fn root_mut(&mut self) -> &mut GroupNode {
        &mut self.root
    }

    /// Whether a group exists at `path`.
    pub fn contains(&self, path: &GroupPath) -> bool {
        self.find(path).is_some()
    }

    /// Group at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`].
    pub fn group(&self, path: &GroupPath) -> Result<&GroupNode, StoreError> {
        self.find(path).ok_or_else(|| not_found(path))
    }

    /// Mutable group at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`].
    pub fn group_mut(&mut self, path: &GroupPath) -> Result<&mut GroupNode, StoreError> {
        let mut node = &mut self.root;
        for seg in path.segments() {
            node = node.child_mut(seg).ok_or_else(|| not_found(path))?;
        }
        Ok(node)
    }

    /// Create an empty group whose parent exists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NameCollision`] if the group exists (the root
    /// always does) or [`StoreError::ParentNotFound`].
    pub fn create_group(&mut self, path: &GroupPath) -> Result<&mut GroupNode, StoreError> {
        self.insert_group(path, GroupNode::new())?;
        self.group_mut(path)
    }

    /// Attach a fully built group, so that readers see either nothing or
    /// the complete group.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NameCollision`] or [`StoreError::ParentNotFound`].
    pub fn insert_group(&mut self, path: &GroupPath, node: GroupNode) -> Result<(), StoreError> {
        let (Some(parent), Some(name)) = (path.parent(), path.name()) else {
            return Err(collision(path));
        };
        let parent_node = self
            .group_mut(&parent)
            .map_err(|_| StoreError::ParentNotFound {
                path: path.to_string(),
            })?;
        if !parent_node.attach(name, node) {
            return Err(collision(path));
        }
        tracing::debug!(path = %path, "Created group");
        Ok(())
    }

    /// Detach and return the group at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`]; the root cannot be removed.
    pub fn remove_group(&mut self, path: &GroupPath) -> Result<GroupNode, StoreError> {
        let (Some(parent), Some(name)) = (path.parent(), path.name()) else {
            return Err(not_found(path));
        };
        let removed = self
            .group_mut(&parent)
            .ok()
            .and_then(|p| p.detach(name))
            .ok_or_else(|| not_found(path))?;
        tracing::debug!(path = %path, "Removed group");
        Ok(removed)
    }

    fn find(&self, path: &GroupPath) -> Option<&GroupNode> {
        path.segments()
            .iter()
            .try_fold(&self.root, |node, seg| node.child(seg))
    }
}

fn not_found(path: &GroupPath) -> StoreError {
    StoreError::NotFound {
        path: path.to_string(),
    }
}

fn collision(path: &GroupPath) -> StoreError {
    StoreError::NameCollision {
        path: path.to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::dataset::Dataset;

    fn path(s: &str) -> GroupPath {
        GroupPath::parse(s).unwrap()
    }

    #[test]
    fn create_nested_groups() {
        let mut store = TreeStore::in_memory();
        store.create_group(&path("Eikonal_run_0")).unwrap();
        store.create_group(&path("Eikonal_run_0/10_sec")).unwrap();
        assert!(store.contains(&path("Eikonal_run_0/10_sec")));
        assert!(!store.contains(&path("Eikonal_run_1")));
        assert_eq!(
            store.root().child_names().collect::<Vec<_>>(),
            vec!["Eikonal_run_0"]
        );
    }

    #[test]
    fn duplicate_group_collides() {
        let mut store = TreeStore::in_memory();
        store.create_group(&path("run")).unwrap();
        assert!(matches!(
            store.create_group(&path("run")),
            Err(StoreError::NameCollision { .. })
        ));
        assert!(matches!(
            store.create_group(&GroupPath::root()),
            Err(StoreError::NameCollision { .. })
        ));
    }

    #[test]
    fn missing_parent_is_reported() {
        let mut store = TreeStore::in_memory();
        assert!(matches!(
            store.create_group(&path("run/10_sec")),
            Err(StoreError::ParentNotFound { .. })
        ));
        assert!(matches!(
            store.group(&path("run")),
            Err(StoreError::NotFound { .. })
        ));
    }

    #[test]
    fn insert_and_remove_whole_group() {
        let mut store = TreeStore::in_memory();
        store.create_group(&path("run")).unwrap();
        let mut record = GroupNode::new();
        record.set_attr("evlo", 240.0).unwrap();
        record
            .create_dataset("appV", Dataset::new(1, 2, vec![3.0, 3.5]).unwrap())
            .unwrap();
        store.insert_group(&path("run/TA.A04A"), record.clone()).unwrap();
        assert_eq!(store.group(&path("run/TA.A04A")).unwrap(), &record);

        let removed = store.remove_group(&path("run/TA.A04A")).unwrap();
        assert_eq!(removed, record);
        assert!(!store.contains(&path("run/TA.A04A")));
        assert!(store.remove_group(&path("run/TA.A04A")).is_err());
        assert!(store.remove_group(&GroupPath::root()).is_err());
    }

    #[test]
    fn in_memory_flush_is_noop() {
        let store = TreeStore::in_memory();
        assert!(store.path().is_none());
        assert!(store.flush().is_ok());
    }
}
