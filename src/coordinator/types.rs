// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Public types for the sync engine coordinator.

use serde::Serialize;
use thiserror::Error;

use crate::backend::{BackendError, IndexStats};
use crate::catalog::CatalogError;
use crate::mode::Mode;
use crate::schema::SchemaError;
use crate::search::TranslateError;
use crate::transaction::PendingOperation;

/// Errors surfaced by engine operations.
///
/// Writes never swallow errors. Search only returns an error when the
/// legacy catalog itself fails.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("query translation failed: {0}")]
    Translate(#[from] TranslateError),

    #[error("object has no resolvable UID")]
    UnresolvableUid,

    /// A deferred flush stopped part-way; earlier writes stay applied.
    #[error("commit failed after {flushed}/{total} queued writes: {source}")]
    Commit {
        flushed: usize,
        total: usize,
        #[source]
        source: BackendError,
        /// Queued writes that never reached the backend, in order.
        /// Hand them to [`SyncEngine::requeue`](super::SyncEngine::requeue) to retry.
        remaining: Vec<PendingOperation>,
    },
}

impl SyncError {
    /// A remote-store failure (as opposed to a legacy or local one).
    #[must_use]
    pub fn is_backend(&self) -> bool {
        matches!(self, Self::Backend(_) | Self::Commit { .. })
    }
}

/// Snapshot of the engine's view of both stores.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineStatus {
    pub mode: Mode,
    /// Catalog migration flag
    pub converted: bool,
    pub index_name: String,
    pub doc_type: String,
    /// Legacy record count
    pub catalog_records: usize,
    /// Backend answered a ping; always false under DISABLE
    pub backend_reachable: bool,
    /// Remote index counters, when reachable and the index exists
    pub remote: Option<IndexStats>,
}

impl std::fmt::Display for EngineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} (converted={}, index={}, records={}, reachable={}",
            self.mode, self.converted, self.index_name, self.catalog_records, self.backend_reachable
        )?;
        if let Some(stats) = &self.remote {
            write!(f, ", docs={}, deleted={}", stats.doc_count, stats.deleted)?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SyncError::from(BackendError::Timeout);
        assert!(err.is_backend());
        assert_eq!(err.to_string(), "backend error: backend request timed out");

        let err = SyncError::from(SchemaError::MissingMapping { index: "SearchableText".into() });
        assert!(!err.is_backend());
        assert!(err.to_string().contains("SearchableText"));

        let err = SyncError::Commit {
            flushed: 1,
            total: 3,
            source: BackendError::Timeout,
            remaining: Vec::new(),
        };
        assert!(err.to_string().starts_with("commit failed after 1/3"));
    }

    #[test]
    fn test_status_display() {
        let status = EngineStatus {
            mode: Mode::Dual,
            converted: true,
            index_name: "plone".into(),
            doc_type: "portal_catalog".into(),
            catalog_records: 4,
            backend_reachable: true,
            remote: Some(IndexStats { doc_count: 4, deleted: 1 }),
        };
        assert_eq!(status.to_string(), "dual (converted=true, index=plone, records=4, reachable=true, docs=4, deleted=1)");
    }
}
