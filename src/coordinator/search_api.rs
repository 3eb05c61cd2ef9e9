// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Search API for SyncEngine
//!
//! # Architecture
//!
//! ```text
//! search(query, check_permissions)
//!       │
//!       ├─→ check_permissions? + allowedRolesAndUsers
//!       │                      + effectiveRange (unless inactive allowed)
//!       │
//!       ├─→ Disable? legacy search_results
//!       │
//!       ├─→ translate → backend search → lazy brains
//!       │        │
//!       │        └─→ failed? Dual: legacy search
//!       │                    SearchOnly: empty result (logged)
//!       │
//!       └─→ Dual + legacy_first: legacy, remote on legacy failure
//! ```

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::backend::{remote_call, SearchRequest};
use crate::catalog::Principal;
use crate::config::{DualRead, SyncSettings};
use crate::metrics;
use crate::mode::Mode;
use crate::search::{CatalogQuery, Criterion, SearchResults, ALLOWED_ROLES_AND_USERS, EFFECTIVE_RANGE};
use crate::transaction::UnitOfWork;

use super::api::legacy_call;
use super::{SyncEngine, SyncError};

/// Stored field requested with every hit so it can be mapped to a record
const PATH_FIELD: &str = "path";

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
}

impl SyncEngine {
    /// Search the catalog.
    ///
    /// Remote failures are never returned: under DUAL they fall back to the
    /// legacy catalog and under SEARCH-ONLY they yield an empty result.
    ///
    /// # Errors
    ///
    /// Only a failing legacy search (DISABLE, or DUAL after fallback).
    #[tracing::instrument(skip(self, uow, query), fields(mode))]
    pub fn search(
        &self,
        uow: &UnitOfWork,
        query: &CatalogQuery,
        check_permissions: bool,
    ) -> Result<SearchResults, SyncError> {
        let (mode, settings) = self.current();
        tracing::Span::current().record("mode", mode.as_str());
        metrics::record_mode("search", mode.as_str());

        let query = if check_permissions {
            self.with_permissions(uow.principal(), query)
        } else {
            query.clone()
        };

        let settings = match (mode, settings) {
            (Mode::Disable, _) | (_, None) => return self.legacy_search(&query),
            (_, Some(settings)) => settings,
        };

        if mode == Mode::Dual && settings.dual_read == DualRead::LegacyFirst {
            return match self.legacy_search(&query) {
                Ok(results) => Ok(results),
                Err(legacy_err) => {
                    warn!(error = %legacy_err, query = ?query, "Legacy search failed, trying remote");
                    metrics::record_search_fallback(mode.as_str());
                    self.remote_search(uow, &settings, &query).map_err(|remote_err| {
                        warn!(error = %remote_err, "Remote search failed too");
                        legacy_err
                    })
                }
            };
        }

        match self.remote_search(uow, &settings, &query) {
            Ok(results) => Ok(results),
            Err(e) => {
                warn!(error = %e, query = ?query, mode = mode.as_str(), "Remote search failed");
                metrics::record_search_query("remote", "error");
                metrics::record_search_fallback(mode.as_str());
                if mode == Mode::Dual {
                    self.legacy_search(&query)
                } else {
                    Ok(SearchResults::empty())
                }
            }
        }
    }

    /// Add the principal's visibility constraints to a query.
    ///
    /// The "active now" constraint is skipped only when the query asks for
    /// inactive content and the principal may see it.
    pub fn with_permissions(&self, principal: &Principal, query: &CatalogQuery) -> CatalogQuery {
        let mut query = query.clone();
        let tokens: Vec<Value> = self
            .catalog
            .allowed_roles_and_users(principal)
            .into_iter()
            .map(Value::String)
            .collect();
        query
            .criteria
            .insert(ALLOWED_ROLES_AND_USERS.to_string(), Criterion::AnyOf(tokens));
        if !(query.show_inactive && self.catalog.can_access_inactive(principal)) {
            query
                .criteria
                .insert(EFFECTIVE_RANGE.to_string(), Criterion::ActiveAt(now_millis()));
        }
        query
    }

    fn legacy_search(&self, query: &CatalogQuery) -> Result<SearchResults, SyncError> {
        let result = legacy_call("search", || self.catalog.search_results(query));
        metrics::record_search_query("legacy", if result.is_ok() { "success" } else { "error" });
        Ok(result?)
    }

    fn remote_search(
        &self,
        uow: &UnitOfWork,
        settings: &SyncSettings,
        query: &CatalogQuery,
    ) -> Result<SearchResults, SyncError> {
        let translated = self.translator.translate(self.catalog.as_ref(), query)?;
        let (backend, retry) = self.connection(uow, settings)?;

        let request = SearchRequest {
            location: self.location(),
            body: json!({"query": translated.query}),
            sort: translated.sort,
            fields: vec![PATH_FIELD.to_string()],
            from: translated.from,
            size: translated.size,
        };
        let response = remote_call("search", retry, || backend.search(&request))?;

        debug!(total = response.total, hits = response.hits.len(), "Remote search");
        metrics::record_search_query("remote", "success");
        metrics::record_search_results(response.hits.len());
        Ok(SearchResults::lazy(response.hits, response.total, Arc::clone(&self.materializer)))
    }
}
