// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::config::ConnectionSettings;

/// A stored document body: field name → value.
pub type Document = Map<String, Value>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    #[error("document not found")]
    DocumentNotFound,
    #[error("index '{0}' not found")]
    IndexNotFound(String),
    #[error("index '{0}' already exists")]
    IndexAlreadyExists(String),
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    #[error("backend request timed out")]
    Timeout,
    #[error("backend rejected request: {0}")]
    Rejected(String),
}

impl BackendError {
    /// Expected, recoverable "nothing there" conditions.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::DocumentNotFound | Self::IndexNotFound(_))
    }

    /// Failures worth retrying when `retry_on_timeout` is set.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout)
    }

    /// Short label for metrics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DocumentNotFound | Self::IndexNotFound(_) => "not_found",
            Self::IndexAlreadyExists(_) => "exists",
            Self::Unavailable(_) => "unavailable",
            Self::Timeout => "timeout",
            Self::Rejected(_) => "rejected",
        }
    }
}

/// Where a catalog's documents live in the backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentLocation {
    /// Index identifier (e.g., "plone-portal_catalog")
    pub index: String,
    /// Document type identifier (e.g., "portal_catalog")
    pub doc_type: String,
}

/// One entry of a sort specification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: String,
    pub descending: bool,
}

impl SortSpec {
    pub fn asc(field: impl Into<String>) -> Self {
        Self { field: field.into(), descending: false }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self { field: field.into(), descending: true }
    }

    /// Wire form: `{"field": {"order": "asc"}}`
    #[must_use]
    pub fn to_json(&self) -> Value {
        let order = if self.descending { "desc" } else { "asc" };
        json!({ self.field.clone(): { "order": order } })
    }
}

/// Search request against one index and document type.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub location: DocumentLocation,
    /// Request body, `{"query": <translated-query>}`
    pub body: Value,
    pub sort: Vec<SortSpec>,
    /// Stored fields to return with each hit
    pub fields: Vec<String>,
    pub from: usize,
    pub size: Option<usize>,
}

/// One raw search hit.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    /// Document id (the object's UID)
    pub id: String,
    pub score: Option<f64>,
    /// Requested stored fields present on the document
    pub fields: Document,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SearchResponse {
    /// Total number of matches (not just this page)
    pub total: usize,
    pub hits: Vec<SearchHit>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct IndexStats {
    pub doc_count: u64,
    pub deleted: u64,
}

/// Remote document-search backend.
///
/// Upserts have full-document semantics: callers merge before writing.
pub trait SearchBackend: Send + Sync {
    fn ping(&self) -> bool;

    /// Fails with [`BackendError::IndexAlreadyExists`] if present.
    fn create_index(&self, index: &str) -> Result<(), BackendError>;

    /// Fails with [`BackendError::IndexNotFound`] if absent.
    fn delete_index(&self, index: &str) -> Result<(), BackendError>;

    /// Install `{"properties": {...}}` for a document type.
    fn put_mapping(&self, location: &DocumentLocation, mapping: &Value) -> Result<(), BackendError>;

    /// `Ok(None)` when the document (or its index) does not exist.
    fn get_document(&self, location: &DocumentLocation, id: &str) -> Result<Option<Document>, BackendError>;

    fn index_document(&self, location: &DocumentLocation, id: &str, body: &Document) -> Result<(), BackendError>;

    /// Fails with [`BackendError::DocumentNotFound`] if absent.
    fn delete_document(&self, location: &DocumentLocation, id: &str) -> Result<(), BackendError>;

    fn search(&self, request: &SearchRequest) -> Result<SearchResponse, BackendError>;

    /// Make all writes so far visible to search.
    fn refresh(&self, index: &str) -> Result<(), BackendError>;

    fn stats(&self, index: &str) -> Result<IndexStats, BackendError>;
}

/// Opens backend connections. Called at most once per unit of work.
pub trait BackendConnector: Send + Sync {
    fn connect(&self, settings: &ConnectionSettings) -> Result<Arc<dyn SearchBackend>, BackendError>;
}
