// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Sync engine coordinator.
//!
//! The [`SyncEngine`] sits in front of the legacy catalog and decides, per
//! call, which stores an operation touches:
//!
//! ```text
//!                 ┌──────────── mode::resolve(converted, settings) ────────────┐
//!                 │                                                             │
//!   index ────────┼── Disable ──► legacy                                        │
//!   unindex       ├── Dual ─────► legacy, then remote (write buffer + backend)  │
//!                 └── SearchOnly ► remote                                       │
//!                                                                               │
//!   search ───────┬── Disable ──► legacy                                        │
//!                 ├── Dual ─────► remote, legacy on failure (or the reverse)    │
//!                 └── SearchOnly ► remote, empty result on failure              │
//! ```
//!
//! Every call runs inside a [`UnitOfWork`], which owns the backend
//! connection and the transaction's write buffer.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use catalog_sync::{Mode, SharedSettings, SyncEngine, SyncSettings};
//! use catalog_sync::backend::InMemoryConnector;
//! use catalog_sync::catalog::{ContentObject, IndexDefinition, InMemoryCatalog, Principal};
//!
//! let catalog = Arc::new(
//!     InMemoryCatalog::builder("portal_catalog", "/plone")
//!         .index(IndexDefinition::text("title"))
//!         .build(),
//! );
//! let settings = SharedSettings::new(SyncSettings::with_mode(Mode::Dual));
//! let engine = SyncEngine::new(catalog, Arc::new(settings), Arc::new(InMemoryConnector::default()));
//!
//! let uow = engine.begin(Principal::anonymous());
//! engine.provision_schema(&uow).unwrap();
//! assert_eq!(engine.mode(), Mode::Dual);
//!
//! let doc = ContentObject::new("doc-1", "/plone/doc-1").with("title", "Hello");
//! engine.index(&uow, &doc, "doc-1", &[], true).unwrap();
//! uow.commit().unwrap();
//! ```

mod api;
mod schema_api;
mod search_api;
mod types;

pub use types::{EngineStatus, SyncError};

use std::sync::Arc;

use tracing::debug;

use crate::backend::{remote_call, BackendConnector, BackendError, DocumentLocation, SearchBackend};
use crate::catalog::{LegacyCatalog, Principal};
use crate::config::{SettingsSource, SyncSettings};
use crate::mode::{self, Mode};
use crate::schema::{CatalogMappingProvider, MappingProvider};
use crate::search::{BrainFactory, DslTranslator, QueryTranslator, ResultMaterializer};
use crate::transaction::UnitOfWork;

/// Catalog/search synchronization engine.
///
/// Holds no per-request state; it is `Send + Sync` and shared by every
/// request thread. Mode and settings are re-read on every call.
pub struct SyncEngine {
    pub(super) catalog: Arc<dyn LegacyCatalog>,
    pub(super) settings: Arc<dyn SettingsSource>,
    pub(super) connector: Arc<dyn BackendConnector>,
    pub(super) translator: Arc<dyn QueryTranslator>,
    pub(super) mappings: Arc<dyn MappingProvider>,
    pub(super) materializer: Arc<dyn ResultMaterializer>,
}

impl SyncEngine {
    /// Create an engine with the default translator, mapping provider and
    /// materializer.
    pub fn new(
        catalog: Arc<dyn LegacyCatalog>,
        settings: Arc<dyn SettingsSource>,
        connector: Arc<dyn BackendConnector>,
    ) -> Self {
        let materializer = Arc::new(BrainFactory::new(Arc::clone(&catalog)));
        Self {
            catalog,
            settings,
            connector,
            translator: Arc::new(DslTranslator),
            mappings: Arc::new(CatalogMappingProvider),
            materializer,
        }
    }

    #[must_use]
    pub fn with_translator(mut self, translator: Arc<dyn QueryTranslator>) -> Self {
        self.translator = translator;
        self
    }

    #[must_use]
    pub fn with_mapping_provider(mut self, mappings: Arc<dyn MappingProvider>) -> Self {
        self.mappings = mappings;
        self
    }

    #[must_use]
    pub fn with_materializer(mut self, materializer: Arc<dyn ResultMaterializer>) -> Self {
        self.materializer = materializer;
        self
    }

    /// Start a unit of work for one request or transaction.
    pub fn begin(&self, principal: Principal) -> UnitOfWork {
        UnitOfWork::new(principal)
    }

    pub fn catalog(&self) -> &Arc<dyn LegacyCatalog> {
        &self.catalog
    }

    /// Effective mode right now.
    #[must_use]
    pub fn mode(&self) -> Mode {
        self.current().0
    }

    /// Mode plus the settings it was derived from, read once.
    pub(super) fn current(&self) -> (Mode, Option<SyncSettings>) {
        let settings = self.settings.current();
        let mode = mode::resolve(self.catalog.is_converted(), settings.as_ref());
        (mode, settings)
    }

    /// Remote index identifier for this catalog.
    #[must_use]
    pub fn index_name(&self) -> String {
        index_identifier(&self.catalog.physical_path())
    }

    /// Remote document type for this catalog.
    #[must_use]
    pub fn doc_type(&self) -> String {
        doc_type_identifier(&self.catalog.catalog_id())
    }

    #[must_use]
    pub fn location(&self) -> DocumentLocation {
        DocumentLocation {
            index: self.index_name(),
            doc_type: self.doc_type(),
        }
    }

    /// The unit of work's backend connection, opened on first use.
    pub(super) fn connection(
        &self,
        uow: &UnitOfWork,
        settings: &SyncSettings,
    ) -> Result<(Arc<dyn SearchBackend>, bool), BackendError> {
        uow.connection(settings.retry_on_timeout, || {
            let params = settings.connection();
            debug!(hosts = ?params.hosts, timeout = ?params.timeout, "Connecting to search backend");
            remote_call("connect", params.retry_on_timeout, || self.connector.connect(&params))
        })
    }

    /// Report mode, identifiers and backend reachability.
    ///
    /// Never opens a connection under DISABLE.
    pub fn status(&self, uow: &UnitOfWork) -> EngineStatus {
        let (mode, settings) = self.current();
        let mut status = EngineStatus {
            mode,
            converted: self.catalog.is_converted(),
            index_name: self.index_name(),
            doc_type: self.doc_type(),
            catalog_records: self.catalog.len(),
            backend_reachable: false,
            remote: None,
        };
        if mode == Mode::Disable {
            return status;
        }
        let Some(settings) = settings else {
            return status;
        };
        if let Ok((backend, retry)) = self.connection(uow, &settings) {
            status.backend_reachable = backend.ping();
            if status.backend_reachable {
                status.remote = remote_call("stats", retry, || backend.stats(&status.index_name)).ok();
            }
        }
        status
    }
}

/// Remote index identifier: lower-cased, hyphen-joined path segments,
/// without the root.
///
/// ```
/// use catalog_sync::coordinator::index_identifier;
///
/// let path = ["".to_string(), "Plone".to_string(), "portal_catalog".to_string()];
/// assert_eq!(index_identifier(&path), "plone-portal_catalog");
/// ```
pub fn index_identifier(path: &[String]) -> String {
    path.iter()
        .filter(|segment| !segment.is_empty())
        .map(|segment| segment.to_lowercase())
        .collect::<Vec<_>>()
        .join("-")
}

/// Remote document type: the lower-cased catalog identifier.
pub fn doc_type_identifier(catalog_id: &str) -> String {
    catalog_id.to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifiers() {
        let path: Vec<String> = vec!["Site".into(), "Sub".into(), "portal_catalog".into()];
        assert_eq!(index_identifier(&path), "site-sub-portal_catalog");
        assert_eq!(index_identifier(&[]), "");
        assert_eq!(doc_type_identifier("Portal_Catalog"), "portal_catalog");
    }
}
