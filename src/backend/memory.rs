// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! In-memory search backend.
//!
//! Mirrors the remote backend's visibility model: reads by id see every
//! write immediately, searches only see writes made before the last
//! [`refresh`](SearchBackend::refresh).

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;

use crate::config::ConnectionSettings;

use super::matcher::{compare_values, lookup, matches};
use super::traits::{
    BackendConnector, BackendError, Document, DocumentLocation, IndexStats, SearchBackend,
    SearchHit, SearchRequest, SearchResponse, SortSpec,
};

type DocKey = (String, String); // (doc_type, id)

#[derive(Debug, Default, Clone)]
struct IndexState {
    /// doc_type → {"properties": {...}}
    mappings: BTreeMap<String, Value>,
    live: BTreeMap<DocKey, Document>,
    searchable: BTreeMap<DocKey, Document>,
    deleted: u64,
}

pub struct InMemoryBackend {
    indices: DashMap<String, IndexState>,
}

impl InMemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self {
            indices: DashMap::new(),
        }
    }

    /// Whether an index exists
    #[must_use]
    pub fn has_index(&self, index: &str) -> bool {
        self.indices.contains_key(index)
    }

    /// Installed mapping for a document type
    #[must_use]
    pub fn mapping(&self, location: &DocumentLocation) -> Option<Value> {
        self.indices
            .get(&location.index)
            .and_then(|state| state.mappings.get(&location.doc_type).cloned())
    }

    /// Live document count across all indices
    #[must_use]
    pub fn len(&self) -> usize {
        self.indices.iter().map(|state| state.live.len()).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn key(location: &DocumentLocation, id: &str) -> DocKey {
    (location.doc_type.clone(), id.to_string())
}

fn sort_documents(docs: &mut [(String, Document)], sort: &[SortSpec]) {
    if sort.is_empty() {
        return;
    }
    docs.sort_by(|(_, a), (_, b)| {
        for spec in sort {
            let ordering = match (lookup(a, &spec.field), lookup(b, &spec.field)) {
                (Some(x), Some(y)) if !x.is_null() && !y.is_null() => {
                    let ord = compare_values(x, y).unwrap_or(Ordering::Equal);
                    if spec.descending { ord.reverse() } else { ord }
                }
                // missing values sort last in either direction
                (Some(x), _) if !x.is_null() => Ordering::Less,
                (_, Some(y)) if !y.is_null() => Ordering::Greater,
                _ => Ordering::Equal,
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
}

impl SearchBackend for InMemoryBackend {
    fn ping(&self) -> bool {
        true
    }

    fn create_index(&self, index: &str) -> Result<(), BackendError> {
        match self.indices.entry(index.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                Err(BackendError::IndexAlreadyExists(index.to_string()))
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(IndexState::default());
                Ok(())
            }
        }
    }

    fn delete_index(&self, index: &str) -> Result<(), BackendError> {
        self.indices
            .remove(index)
            .map(|_| ())
            .ok_or_else(|| BackendError::IndexNotFound(index.to_string()))
    }

    fn put_mapping(&self, location: &DocumentLocation, mapping: &Value) -> Result<(), BackendError> {
        let properties = mapping
            .get("properties")
            .and_then(Value::as_object)
            .ok_or_else(|| BackendError::Rejected("mapping has no properties".into()))?;
        let mut state = self
            .indices
            .get_mut(&location.index)
            .ok_or_else(|| BackendError::IndexNotFound(location.index.clone()))?;
        let installed = state
            .mappings
            .entry(location.doc_type.clone())
            .or_insert_with(|| serde_json::json!({"properties": {}}));
        if let Some(existing) = installed.get_mut("properties").and_then(Value::as_object_mut) {
            for (field, fragment) in properties {
                existing.insert(field.clone(), fragment.clone());
            }
        }
        Ok(())
    }

    fn get_document(&self, location: &DocumentLocation, id: &str) -> Result<Option<Document>, BackendError> {
        Ok(self
            .indices
            .get(&location.index)
            .and_then(|state| state.live.get(&key(location, id)).cloned()))
    }

    fn index_document(&self, location: &DocumentLocation, id: &str, body: &Document) -> Result<(), BackendError> {
        // writes auto-create the index, as the remote backend does
        let mut state = self.indices.entry(location.index.clone()).or_default();
        state.live.insert(key(location, id), body.clone());
        Ok(())
    }

    fn delete_document(&self, location: &DocumentLocation, id: &str) -> Result<(), BackendError> {
        let mut state = self
            .indices
            .get_mut(&location.index)
            .ok_or(BackendError::DocumentNotFound)?;
        match state.live.remove(&key(location, id)) {
            Some(_) => {
                state.deleted += 1;
                Ok(())
            }
            None => Err(BackendError::DocumentNotFound),
        }
    }

    fn search(&self, request: &SearchRequest) -> Result<SearchResponse, BackendError> {
        let state = self
            .indices
            .get(&request.location.index)
            .ok_or_else(|| BackendError::IndexNotFound(request.location.index.clone()))?;
        let query = request
            .body
            .get("query")
            .cloned()
            .unwrap_or_else(|| serde_json::json!({"match_all": {}}));

        let mut matched = Vec::new();
        for ((doc_type, id), doc) in &state.searchable {
            if doc_type == &request.location.doc_type && matches(&query, doc)? {
                matched.push((id.clone(), doc.clone()));
            }
        }
        drop(state);

        sort_documents(&mut matched, &request.sort);
        let total = matched.len();
        let size = request.size.unwrap_or(usize::MAX);
        let hits = matched
            .into_iter()
            .skip(request.from)
            .take(size)
            .map(|(id, doc)| SearchHit {
                id,
                score: Some(1.0),
                fields: request
                    .fields
                    .iter()
                    .filter_map(|f| doc.get(f).map(|v| (f.clone(), v.clone())))
                    .collect(),
            })
            .collect();

        Ok(SearchResponse { total, hits })
    }

    fn refresh(&self, index: &str) -> Result<(), BackendError> {
        let mut state = self
            .indices
            .get_mut(index)
            .ok_or_else(|| BackendError::IndexNotFound(index.to_string()))?;
        state.searchable = state.live.clone();
        Ok(())
    }

    fn stats(&self, index: &str) -> Result<IndexStats, BackendError> {
        let state = self
            .indices
            .get(index)
            .ok_or_else(|| BackendError::IndexNotFound(index.to_string()))?;
        Ok(IndexStats {
            doc_count: state.live.len() as u64,
            deleted: state.deleted,
        })
    }
}

/// Connector handing out one shared [`InMemoryBackend`].
///
/// Counts connections so callers can verify when one was opened.
pub struct InMemoryConnector {
    backend: Arc<InMemoryBackend>,
    connects: AtomicUsize,
}

impl InMemoryConnector {
    #[must_use]
    pub fn new(backend: Arc<InMemoryBackend>) -> Self {
        Self {
            backend,
            connects: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn backend(&self) -> &Arc<InMemoryBackend> {
        &self.backend
    }

    /// Number of connections opened so far
    #[must_use]
    pub fn connections(&self) -> usize {
        self.connects.load(AtomicOrdering::Acquire)
    }
}

impl Default for InMemoryConnector {
    fn default() -> Self {
        Self::new(Arc::new(InMemoryBackend::new()))
    }
}

impl BackendConnector for InMemoryConnector {
    fn connect(&self, _settings: &ConnectionSettings) -> Result<Arc<dyn SearchBackend>, BackendError> {
        self.connects.fetch_add(1, AtomicOrdering::AcqRel);
        Ok(self.backend.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn loc() -> DocumentLocation {
        DocumentLocation {
            index: "plone".into(),
            doc_type: "portal_catalog".into(),
        }
    }

    fn body(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    fn search_all(backend: &InMemoryBackend, sort: Vec<SortSpec>) -> SearchResponse {
        backend
            .search(&SearchRequest {
                location: loc(),
                body: json!({"query": {"match_all": {}}}),
                sort,
                fields: vec!["title".into()],
                from: 0,
                size: None,
            })
            .unwrap()
    }

    #[test]
    fn test_create_index_twice() {
        let backend = InMemoryBackend::new();
        backend.create_index("plone").unwrap();
        assert_eq!(
            backend.create_index("plone"),
            Err(BackendError::IndexAlreadyExists("plone".into()))
        );
    }

    #[test]
    fn test_delete_missing_index() {
        let backend = InMemoryBackend::new();
        assert!(backend.delete_index("nope").unwrap_err().is_not_found());
    }

    #[test]
    fn test_put_mapping_merges_properties() {
        let backend = InMemoryBackend::new();
        backend.create_index("plone").unwrap();
        backend.put_mapping(&loc(), &json!({"properties": {"title": {"type": "text"}}})).unwrap();
        backend.put_mapping(&loc(), &json!({"properties": {"UID": {"type": "keyword"}}})).unwrap();

        let mapping = backend.mapping(&loc()).unwrap();
        assert_eq!(mapping["properties"]["title"]["type"], "text");
        assert_eq!(mapping["properties"]["UID"]["type"], "keyword");
    }

    #[test]
    fn test_get_put_delete() {
        let backend = InMemoryBackend::new();
        assert!(backend.get_document(&loc(), "doc-1").unwrap().is_none());

        backend.index_document(&loc(), "doc-1", &body(json!({"title": "Hello"}))).unwrap();
        assert_eq!(backend.get_document(&loc(), "doc-1").unwrap().unwrap()["title"], "Hello");

        backend.delete_document(&loc(), "doc-1").unwrap();
        assert!(backend.get_document(&loc(), "doc-1").unwrap().is_none());
        assert_eq!(backend.delete_document(&loc(), "doc-1"), Err(BackendError::DocumentNotFound));
        assert_eq!(backend.stats("plone").unwrap(), IndexStats { doc_count: 0, deleted: 1 });
    }

    #[test]
    fn test_search_sees_writes_after_refresh() {
        let backend = InMemoryBackend::new();
        backend.index_document(&loc(), "doc-1", &body(json!({"title": "Hello"}))).unwrap();
        assert_eq!(search_all(&backend, vec![]).total, 0);

        backend.refresh("plone").unwrap();
        let response = search_all(&backend, vec![]);
        assert_eq!(response.total, 1);
        assert_eq!(response.hits[0].id, "doc-1");
        assert_eq!(response.hits[0].fields["title"], "Hello");
    }

    #[test]
    fn test_search_sort_and_window() {
        let backend = InMemoryBackend::new();
        for (id, title) in [("a", "Charlie"), ("b", "Alpha"), ("c", "Bravo")] {
            backend.index_document(&loc(), id, &body(json!({"title": title}))).unwrap();
        }
        backend.index_document(&loc(), "d", &body(json!({}))).unwrap();
        backend.refresh("plone").unwrap();

        let asc: Vec<String> = search_all(&backend, vec![SortSpec::asc("title")]).hits.into_iter().map(|h| h.id).collect();
        assert_eq!(asc, vec!["b", "c", "a", "d"]);

        let desc: Vec<String> = search_all(&backend, vec![SortSpec::desc("title")]).hits.into_iter().map(|h| h.id).collect();
        assert_eq!(desc, vec!["a", "c", "b", "d"]);

        let page = backend
            .search(&SearchRequest {
                location: loc(),
                body: json!({"query": {"match_all": {}}}),
                sort: vec![SortSpec::asc("title")],
                fields: vec![],
                from: 1,
                size: Some(2),
            })
            .unwrap();
        assert_eq!(page.total, 4);
        assert_eq!(page.hits.iter().map(|h| h.id.as_str()).collect::<Vec<_>>(), vec!["c", "a"]);
    }

    #[test]
    fn test_search_missing_index_fails() {
        let backend = InMemoryBackend::new();
        let err = backend
            .search(&SearchRequest {
                location: loc(),
                body: json!({}),
                sort: vec![],
                fields: vec![],
                from: 0,
                size: None,
            })
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_connector_counts_connections() {
        let connector = InMemoryConnector::default();
        assert_eq!(connector.connections(), 0);
        let conn = connector.connect(&crate::SyncSettings::default().connection()).unwrap();
        assert!(conn.ping());
        assert_eq!(connector.connections(), 1);
    }
}
