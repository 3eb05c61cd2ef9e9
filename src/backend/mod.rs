// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Remote search backend.
//!
//! The engine talks to the backend only through [`SearchBackend`]; the
//! HTTP client behind a production implementation is the host's concern.
//! [`InMemoryBackend`] implements the same contract for embedding and tests.
//!
//! # Wire contract
//!
//! ```text
//! create_index     already exists → IndexAlreadyExists (callers treat as success)
//! put_mapping      {"properties": {field: fragment, ...}}
//! index_document   full-document upsert by (index, doc_type, id)
//! get_document     missing → Ok(None)
//! delete_document  missing → DocumentNotFound (callers treat as success)
//! search           {"query": ...} + sort + fields → hits + total
//! refresh          make prior writes visible to search
//! ```

pub mod matcher;
pub mod memory;
pub mod traits;

pub use memory::{InMemoryBackend, InMemoryConnector};
pub use traits::{
    BackendConnector, BackendError, Document, DocumentLocation, IndexStats, SearchBackend,
    SearchHit, SearchRequest, SearchResponse, SortSpec,
};

use std::time::Instant;

use crate::metrics;
use crate::resilience::retry::{retry, RetryConfig};

/// Run one backend call with metrics, retrying timeouts when asked to.
pub(crate) fn remote_call<T>(
    operation: &'static str,
    retry_on_timeout: bool,
    mut call: impl FnMut() -> Result<T, BackendError>,
) -> Result<T, BackendError> {
    let start = Instant::now();
    let result = if retry_on_timeout {
        retry(operation, &RetryConfig::query(), BackendError::is_transient, call)
    } else {
        call()
    };
    let status = match &result {
        Ok(_) => "success",
        Err(e) => e.kind(),
    };
    metrics::record_operation("remote", operation, status);
    metrics::record_latency("remote", operation, start.elapsed());
    result
}
