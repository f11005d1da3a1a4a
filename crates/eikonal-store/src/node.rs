//! Groups and their attributes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::dataset::Dataset;
use crate::error::StoreError;
use crate::path::validate_name;

/// A scalar or vector attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttrValue {
    /// A single float.
    Float(f64),
    /// A vector of floats.
    Floats(Vec<f64>),
    /// A signed integer.
    Int(i64),
    /// A string.
    Text(String),
}

impl AttrValue {
    const fn kind(&self) -> &'static str {
        match self {
            Self::Float(_) => "a float",
            Self::Floats(_) => "a float vector",
            Self::Int(_) => "an integer",
            Self::Text(_) => "text",
        }
    }
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<Vec<f64>> for AttrValue {
    fn from(v: Vec<f64>) -> Self {
        Self::Floats(v)
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<u32> for AttrValue {
    fn from(v: u32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_owned())
    }
}

impl From<String> for AttrValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

/// One group: attributes, datasets and child groups.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupNode {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    attrs: BTreeMap<String, AttrValue>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    datasets: BTreeMap<String, Dataset>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    children: BTreeMap<String, GroupNode>,
}

impl GroupNode {
    /// An empty group.
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Attributes
    // =========================================================================

    /// Set (or overwrite) an attribute.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidName`] for an empty or slashed name.
    pub fn set_attr(
        &mut self,
        name: impl Into<String>,
        value: impl Into<AttrValue>,
    ) -> Result<(), StoreError> {
        let name = name.into();
        validate_name(&name)?;
        self.attrs.insert(name, value.into());
        Ok(())
    }

    /// Raw attribute lookup.
    pub fn attr(&self, name: &str) -> Option<&AttrValue> {
        self.attrs.get(name)
    }

    /// All attributes, ordered by name.
    pub const fn attrs(&self) -> &BTreeMap<String, AttrValue> {
        &self.attrs
    }

    fn require(&self, name: &str) -> Result<&AttrValue, StoreError> {
        self.attrs.get(name).ok_or_else(|| StoreError::MissingAttr {
            name: name.to_owned(),
        })
    }

    fn mismatch(name: &str, expected: &'static str) -> StoreError {
        StoreError::AttrType {
            name: name.to_owned(),
            expected,
        }
    }

    /// Float attribute. Integer attributes are widened.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::MissingAttr`] or [`StoreError::AttrType`].
    #[allow(clippy::cast_precision_loss)]
    pub fn attr_f64(&self, name: &str) -> Result<f64, StoreError> {
        match self.require(name)? {
            AttrValue::Float(v) => Ok(*v),
            AttrValue::Int(v) => Ok(*v as f64),
            other => {
                tracing::debug!(name, found = other.kind(), "attribute type mismatch");
                Err(Self::mismatch(name, "a float"))
            }
        }
    }

    /// Float-vector attribute.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::MissingAttr`] or [`StoreError::AttrType`].
    pub fn attr_floats(&self, name: &str) -> Result<&[f64], StoreError> {
        match self.require(name)? {
            AttrValue::Floats(v) => Ok(v),
            _ => Err(Self::mismatch(name, "a float vector")),
        }
    }

    /// Integer attribute.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::MissingAttr`] or [`StoreError::AttrType`].
    pub fn attr_int(&self, name: &str) -> Result<i64, StoreError> {
        match self.require(name)? {
            AttrValue::Int(v) => Ok(*v),
            _ => Err(Self::mismatch(name, "an integer")),
        }
    }

    /// Text attribute.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::MissingAttr`] or [`StoreError::AttrType`].
    pub fn attr_text(&self, name: &str) -> Result<&str, StoreError> {
        match self.require(name)? {
            AttrValue::Text(v) => Ok(v),
            _ => Err(Self::mismatch(name, "text")),
        }
    }

    // =========================================================================
    // Datasets
    // =========================================================================

    /// Add a dataset that must not exist yet.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NameCollision`] if `name` is taken, or
    /// [`StoreError::InvalidName`].
    pub fn create_dataset(
        &mut self,
        name: impl Into<String>,
        data: Dataset,
    ) -> Result<(), StoreError> {
        let name = name.into();
        validate_name(&name)?;
        if self.datasets.contains_key(&name) {
            return Err(StoreError::NameCollision { path: name });
        }
        self.datasets.insert(name, data);
        Ok(())
    }

    /// Add or replace a dataset, returning the previous one.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidName`].
    pub fn replace_dataset(
        &mut self,
        name: impl Into<String>,
        data: Dataset,
    ) -> Result<Option<Dataset>, StoreError> {
        let name = name.into();
        validate_name(&name)?;
        Ok(self.datasets.insert(name, data))
    }

    /// Dataset lookup.
    pub fn dataset(&self, name: &str) -> Option<&Dataset> {
        self.datasets.get(name)
    }

    /// Names of all datasets, in order.
    pub fn dataset_names(&self) -> impl Iterator<Item = &str> {
        self.datasets.keys().map(String::as_str)
    }

    // =========================================================================
    // Children
    // =========================================================================

    /// Child group lookup.
    pub fn child(&self, name: &str) -> Option<&Self> {
        self.children.get(name)
    }

    /// Mutable child group lookup.
    pub fn child_mut(&mut self, name: &str) -> Option<&mut Self> {
        self.children.get_mut(name)
    }

    /// Names of all child groups, in order.
    pub fn child_names(&self) -> impl Iterator<Item = &str> {
        self.children.keys().map(String::as_str)
    }

    /// Child groups with their names, in order.
    pub fn children(&self) -> impl Iterator<Item = (&str, &Self)> {
        self.children.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub(crate) fn attach(&mut self, name: &str, node: Self) -> bool {
        if self.children.contains_key(name) {
            return false;
        }
        self.children.insert(name.to_owned(), node);
        true
    }

    pub(crate) fn detach(&mut self, name: &str) -> Option<Self> {
        self.children.remove(name)
    }
}
