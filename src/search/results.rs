// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Search results as catalog-compatible records ("brains").
//!
//! Remote hits are turned into brains one at a time as the caller iterates,
//! so a large result set never materializes more than it is asked for.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::backend::SearchHit;
use crate::catalog::{LegacyCatalog, RecordId};

/// A catalog-compatible view of one search result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Brain {
    /// Legacy record, if the catalog knows the object
    pub rid: Option<RecordId>,
    pub uid: String,
    pub path: String,
    /// Metadata columns from the legacy record
    pub metadata: Map<String, Value>,
    pub score: Option<f64>,
}

impl Brain {
    /// A metadata column, `None` if absent.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.metadata.get(column)
    }
}

/// Where a result set came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultSource {
    Legacy,
    Remote,
    /// Degraded search-only result after a swallowed failure
    Empty,
}

/// Raw backend hit → brain.
pub trait ResultMaterializer: Send + Sync {
    fn materialize(&self, hit: SearchHit) -> Brain;
}

/// Materializes hits against the legacy catalog's record store.
pub struct BrainFactory {
    catalog: Arc<dyn LegacyCatalog>,
}

impl BrainFactory {
    pub fn new(catalog: Arc<dyn LegacyCatalog>) -> Self {
        Self { catalog }
    }
}

impl ResultMaterializer for BrainFactory {
    fn materialize(&self, hit: SearchHit) -> Brain {
        let hit_path = || {
            hit.fields
                .get("path")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_default()
        };
        // records may be keyed by the object's UID or by its path
        let record = self
            .catalog
            .record_id(&hit.id)
            .or_else(|| self.catalog.record_id(&hit_path()))
            .and_then(|rid| self.catalog.record(rid));
        match record {
            Some(record) => Brain {
                rid: Some(record.rid),
                uid: record.uid,
                path: record.path,
                metadata: record.metadata,
                score: hit.score,
            },
            None => Brain {
                rid: None,
                path: hit_path(),
                uid: hit.id,
                metadata: Map::new(),
                score: hit.score,
            },
        }
    }
}

/// A finite, lazily produced sequence of brains plus the total match count.
///
/// `total` counts all matches, not just the page being iterated.
pub struct SearchResults {
    pub total: usize,
    pub source: ResultSource,
    items: Box<dyn Iterator<Item = Brain> + Send>,
}

impl SearchResults {
    /// Zero count, empty sequence.
    pub fn empty() -> Self {
        Self {
            total: 0,
            source: ResultSource::Empty,
            items: Box::new(std::iter::empty()),
        }
    }

    /// Already materialized brains (legacy catalog results).
    pub fn from_brains(total: usize, brains: Vec<Brain>) -> Self {
        Self {
            total,
            source: ResultSource::Legacy,
            items: Box::new(brains.into_iter()),
        }
    }

    /// Remote hits, materialized on iteration.
    pub fn lazy(hits: Vec<SearchHit>, total: usize, materializer: Arc<dyn ResultMaterializer>) -> Self {
        Self {
            total,
            source: ResultSource::Remote,
            items: Box::new(hits.into_iter().map(move |hit| materializer.materialize(hit))),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// UIDs of the remaining results (consumes the sequence).
    pub fn uids(self) -> Vec<String> {
        self.map(|brain| brain.uid).collect()
    }
}

impl Iterator for SearchResults {
    type Item = Brain;

    fn next(&mut self) -> Option<Brain> {
        self.items.next()
    }
}

impl fmt::Debug for SearchResults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchResults")
            .field("total", &self.total)
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}
