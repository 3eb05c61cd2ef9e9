// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use super::index::IndexDefinition;
use super::object::Indexable;
use crate::search::{CatalogQuery, SearchResults};

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("no catalog record for '{0}'")]
    UnknownRecord(String),
    #[error("catalog unavailable: {0}")]
    Unavailable(String),
    #[error("reindex failed: {0}")]
    Reindex(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Internal record index of the legacy catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct RecordId(pub u64);

/// One legacy catalog record with its metadata columns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogRecord {
    pub rid: RecordId,
    pub uid: String,
    pub path: String,
    pub metadata: Map<String, Value>,
}

/// The caller a unit of work acts for.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Principal {
    pub user_id: Option<String>,
    pub roles: Vec<String>,
    /// Holds the permission to see content outside its effective range
    pub can_access_inactive: bool,
}

impl Principal {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn user(user_id: impl Into<String>, roles: &[&str]) -> Self {
        Self {
            user_id: Some(user_id.into()),
            roles: roles.iter().map(|r| r.to_string()).collect(),
            can_access_inactive: false,
        }
    }

    #[must_use]
    pub fn with_inactive_access(mut self) -> Self {
        self.can_access_inactive = true;
        self
    }
}

/// Callback the legacy catalog's rebuild feeds every content object through.
pub type ReindexFn<'a> = dyn FnMut(&str, &dyn Indexable) -> Result<(), CatalogError> + 'a;

/// The legacy catalog's calling surface.
///
/// The engine never replaces the legacy catalog. It calls the methods here
/// directly wherever the host would have reached the catalog's own behaviour.
pub trait LegacyCatalog: Send + Sync {
    /// Catalog identifier (e.g., "portal_catalog")
    fn catalog_id(&self) -> String;

    /// Physical path segments of the catalog, root first
    fn physical_path(&self) -> Vec<String>;

    /// Whether the catalog has been migrated to the remote index.
    fn is_converted(&self) -> bool;

    /// Set the migration flag. Idempotent.
    fn mark_converted(&self);

    fn index_names(&self) -> Vec<String>;

    fn index_definition(&self, name: &str) -> Option<IndexDefinition>;

    /// Number of catalog records
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn record_id(&self, uid: &str) -> Option<RecordId>;

    fn record(&self, rid: RecordId) -> Option<CatalogRecord>;

    /// Allocate a record slot for `uid`, or return the existing one.
    fn create_record(&self, uid: &str, path: &str) -> RecordId;

    /// Refresh a record's metadata columns from the object.
    fn update_metadata(&self, object: &dyn Indexable, rid: RecordId) -> Result<(), CatalogError>;

    /// Role and user tokens the principal may see content for.
    fn allowed_roles_and_users(&self, principal: &Principal) -> Vec<String> {
        let mut tokens = principal.roles.clone();
        if let Some(user) = &principal.user_id {
            tokens.push(format!("user:{}", user));
        }
        tokens.push("Anonymous".to_string());
        tokens
    }

    fn can_access_inactive(&self, principal: &Principal) -> bool {
        principal.can_access_inactive
    }

    /// The catalog's own indexing. Empty `index_names` means all indexes.
    fn catalog_object(
        &self,
        object: &dyn Indexable,
        uid: &str,
        index_names: &[String],
        update_metadata: bool,
    ) -> Result<(), CatalogError>;

    /// Remove the record for `uid`.
    fn uncatalog_object(&self, uid: &str) -> Result<(), CatalogError>;

    /// The catalog's own search.
    fn search_results(&self, query: &CatalogQuery) -> Result<SearchResults, CatalogError>;

    /// Drop all records and feed every content object through `reindex`.
    /// Returns the number of objects fed.
    fn rebuild(&self, reindex: &mut ReindexFn<'_>) -> Result<usize, CatalogError>;

    /// Drop all records.
    fn clear(&self) -> Result<(), CatalogError>;
}
