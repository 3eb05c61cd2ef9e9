// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Schema management API: remote index provisioning, rebuild and clear.

use tracing::{debug, error, info};

use crate::backend::{remote_call, BackendError};
use crate::catalog::{CatalogError, Indexable};
use crate::config::SyncSettings;
use crate::metrics;
use crate::mode::Mode;
use crate::schema;
use crate::transaction::UnitOfWork;

use super::api::legacy_call;
use super::{SyncEngine, SyncError};

impl SyncEngine {
    /// Migrate the catalog to the remote index.
    ///
    /// Builds the mapping for every registered index, sets the catalog's
    /// migration flag, creates the remote index (an existing one is fine)
    /// and installs the mapping. Safe to call repeatedly.
    ///
    /// # Errors
    ///
    /// Fails without touching the catalog or backend if any registered index
    /// has no mapping. Backend failures are returned.
    ///
    /// # Example
    ///
    /// ```rust
    /// # use std::sync::Arc;
    /// # use catalog_sync::{SharedSettings, SyncEngine, SyncSettings};
    /// # use catalog_sync::backend::InMemoryConnector;
    /// # use catalog_sync::catalog::{IndexDefinition, InMemoryCatalog, LegacyCatalog, Principal};
    /// let catalog = Arc::new(
    ///     InMemoryCatalog::builder("portal_catalog", "/plone")
    ///         .index(IndexDefinition::field("review_state"))
    ///         .build(),
    /// );
    /// let connector = Arc::new(InMemoryConnector::default());
    /// let engine = SyncEngine::new(
    ///     catalog.clone(),
    ///     Arc::new(SharedSettings::new(SyncSettings::default())),
    ///     connector.clone(),
    /// );
    ///
    /// let uow = engine.begin(Principal::anonymous());
    /// engine.provision_schema(&uow).unwrap();
    /// engine.provision_schema(&uow).unwrap();
    ///
    /// assert!(catalog.is_converted());
    /// assert!(connector.backend().has_index("plone"));
    /// ```
    #[tracing::instrument(skip(self, uow))]
    pub fn provision_schema(&self, uow: &UnitOfWork) -> Result<(), SyncError> {
        let mapping = schema::build_mapping(self.catalog.as_ref(), self.mappings.as_ref()).map_err(|e| {
            error!(error = %e, "Cannot provision remote schema");
            metrics::record_schema_provision(false);
            e
        })?;

        self.catalog.mark_converted();

        let settings = self.settings.current().unwrap_or_default();
        let location = self.location();
        let result = self.connection(uow, &settings).and_then(|(backend, retry)| {
            match remote_call("create_index", retry, || backend.create_index(&location.index)) {
                Ok(()) => info!(index = %location.index, "Created remote index"),
                Err(BackendError::IndexAlreadyExists(_)) => debug!(index = %location.index, "Remote index exists"),
                Err(e) => return Err(e),
            }
            let body = mapping.to_json();
            remote_call("put_mapping", retry, || backend.put_mapping(&location, &body))
        });

        metrics::record_schema_provision(result.is_ok());
        result?;
        info!(
            index = %location.index,
            doc_type = %location.doc_type,
            fields = mapping.len(),
            "Remote schema provisioned"
        );
        Ok(())
    }

    /// Delete the remote index (if any) and provision it again.
    fn recreate_index(&self, uow: &UnitOfWork, settings: &SyncSettings) -> Result<(), SyncError> {
        let index = self.index_name();
        let (backend, retry) = self.connection(uow, settings)?;
        match remote_call("delete_index", retry, || backend.delete_index(&index)) {
            Ok(()) => info!(index = %index, "Deleted remote index"),
            Err(e) if e.is_not_found() => debug!(index = %index, "No remote index to delete"),
            Err(e) => return Err(e.into()),
        }
        self.provision_schema(uow)
    }

    /// Rebuild the catalog from its content.
    ///
    /// Outside DISABLE the remote index is recreated first, and every object
    /// the legacy catalog walks is indexed through [`SyncEngine::index`], so
    /// both stores are repopulated for the current mode.
    #[tracing::instrument(skip(self, uow), fields(mode))]
    pub fn rebuild(&self, uow: &UnitOfWork) -> Result<(), SyncError> {
        let (mode, settings) = self.current();
        tracing::Span::current().record("mode", mode.as_str());

        let count = match (mode, settings) {
            (Mode::Disable, _) | (_, None) => legacy_call("rebuild", || {
                self.catalog.rebuild(&mut |uid: &str, object: &dyn Indexable| {
                    self.catalog.catalog_object(object, uid, &[], true)
                })
            })?,
            (_, Some(settings)) => {
                self.recreate_index(uow, &settings)?;
                legacy_call("rebuild", || {
                    self.catalog.rebuild(&mut |uid: &str, object: &dyn Indexable| {
                        self.index(uow, object, uid, &[], true)
                            .map_err(|e| CatalogError::Reindex(Box::new(e)))
                    })
                })?
            }
        };

        metrics::record_maintenance("rebuild", mode.as_str(), count);
        info!(objects = count, mode = %mode, "Catalog rebuilt");
        Ok(())
    }

    /// Empty the catalog.
    ///
    /// Outside DISABLE the remote index is recreated empty; the legacy
    /// catalog is cleared under DISABLE and DUAL only.
    #[tracing::instrument(skip(self, uow), fields(mode))]
    pub fn clear(&self, uow: &UnitOfWork) -> Result<(), SyncError> {
        let (mode, settings) = self.current();
        tracing::Span::current().record("mode", mode.as_str());

        if let (true, Some(settings)) = (mode.writes_remote(), settings) {
            self.recreate_index(uow, &settings)?;
        }
        if mode.writes_legacy() {
            legacy_call("clear", || self.catalog.clear())?;
        }

        metrics::record_maintenance("clear", mode.as_str(), 0);
        info!(mode = %mode, "Catalog cleared");
        Ok(())
    }
}
