// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Content objects as the catalog sees them.

use serde_json::{Map, Value};

/// Anything the catalog can index.
///
/// `attribute` is the value-extraction hook: indexes and metadata columns
/// read the object through it.
pub trait Indexable: Send + Sync {
    /// Stable unique identifier, if the object has one yet.
    fn uid(&self) -> Option<String>;

    /// Physical path segments, root first (`["site", "news", "item"]`).
    fn path(&self) -> Vec<String>;

    fn attribute(&self, name: &str) -> Option<Value>;
}

/// A plain content object backed by an attribute map.
///
/// # Example
///
/// ```
/// use catalog_sync::catalog::{ContentObject, Indexable};
///
/// let doc = ContentObject::new("doc-1", "/site/news/doc-1")
///     .with("title", "Hello")
///     .with("review_state", "published");
///
/// assert_eq!(doc.uid().as_deref(), Some("doc-1"));
/// assert_eq!(doc.path(), vec!["site", "news", "doc-1"]);
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ContentObject {
    uid: Option<String>,
    path: Vec<String>,
    attributes: Map<String, Value>,
}

impl ContentObject {
    pub fn new(uid: impl Into<String>, path: &str) -> Self {
        Self {
            uid: Some(uid.into()),
            path: split_path(path),
            attributes: Map::new(),
        }
    }

    /// An object that has not been assigned a UID.
    pub fn anonymous(path: &str) -> Self {
        Self {
            uid: None,
            path: split_path(path),
            attributes: Map::new(),
        }
    }

    /// Set an attribute (builder style).
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.attributes.insert(name.into(), value.into());
    }

    /// Physical path as a single string (`/site/news/doc-1`).
    #[must_use]
    pub fn path_string(&self) -> String {
        format!("/{}", self.path.join("/"))
    }
}

impl Indexable for ContentObject {
    fn uid(&self) -> Option<String> {
        self.uid.clone()
    }

    fn path(&self) -> Vec<String> {
        self.path.clone()
    }

    fn attribute(&self, name: &str) -> Option<Value> {
        self.attributes.get(name).cloned()
    }
}

pub(crate) fn split_path(path: &str) -> Vec<String> {
    path.split('/').filter(|s| !s.is_empty()).map(str::to_string).collect()
}
