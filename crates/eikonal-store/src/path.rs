//! Slash-separated group paths.

use std::fmt;

use crate::error::StoreError;

/// Check that a group, dataset or attribute name is usable as a path
/// segment.
///
/// # Errors
///
/// Returns [`StoreError::InvalidName`] for empty names or names containing
/// `/`.
pub fn validate_name(name: &str) -> Result<(), StoreError> {
    if name.is_empty() || name.contains('/') {
        return Err(StoreError::InvalidName {
            name: name.to_owned(),
        });
    }
    Ok(())
}

/// Location of a group in a [`TreeStore`](crate::TreeStore).
///
/// The empty path is the root group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupPath {
    segments: Vec<String>,
}

impl GroupPath {
    /// The root group.
    pub const fn root() -> Self {
        Self {
            segments: Vec::new(),
        }
    }

    /// Parse `"a/b/c"`. Leading and trailing slashes are ignored; `""` and
    /// `"/"` are the root.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidName`] if a segment is empty (`"a//b"`).
    pub fn parse(path: &str) -> Result<Self, StoreError> {
        let trimmed = path.trim_matches('/');
        if trimmed.is_empty() {
            return Ok(Self::root());
        }
        trimmed.split('/').try_fold(Self::root(), |acc, seg| acc.join(seg))
    }

    /// Path of the child `name` under this path.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidName`] if `name` is not a valid segment.
    pub fn join(&self, name: impl AsRef<str>) -> Result<Self, StoreError> {
        let name = name.as_ref();
        validate_name(name)?;
        let mut segments = self.segments.clone();
        segments.push(name.to_owned());
        Ok(Self { segments })
    }

    /// The parent path, or `None` for the root.
    pub fn parent(&self) -> Option<Self> {
        let (_, head) = self.segments.split_last()?;
        Some(Self {
            segments: head.to_vec(),
        })
    }

    /// Last segment, or `None` for the root.
    pub fn name(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// All segments from the root down.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Whether this is the root path.
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }
}

impl fmt::Display for GroupPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.segments.join("/"))
    }
}
