// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! In-memory legacy catalog.
//!
//! Keeps records, index values and metadata columns in process, plus a
//! registry of published content that `rebuild` walks.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::{Map, Value};

use super::index::{IndexDefinition, IndexRegistry};
use super::object::{split_path, Indexable};
use super::traits::{CatalogError, CatalogRecord, LegacyCatalog, RecordId, ReindexFn};
use crate::backend::matcher::compare_values;
use crate::search::{Brain, CatalogQuery, SearchResults, SortOrder};

struct Entry {
    uid: String,
    path: String,
    metadata: Map<String, Value>,
    /// Index name → stored value
    values: Map<String, Value>,
}

#[derive(Default)]
struct Records {
    uids: HashMap<String, RecordId>,
    entries: BTreeMap<RecordId, Entry>,
    next_rid: u64,
}

pub struct InMemoryCatalog {
    id: String,
    path: Vec<String>,
    converted: AtomicBool,
    indexes: RwLock<IndexRegistry>,
    metadata_columns: RwLock<Vec<String>>,
    records: RwLock<Records>,
    /// Published content by UID
    content: RwLock<BTreeMap<String, Arc<dyn Indexable>>>,
}

/// Builder for [`InMemoryCatalog`].
pub struct InMemoryCatalogBuilder {
    id: String,
    path: String,
    indexes: IndexRegistry,
    metadata: Vec<String>,
}

impl InMemoryCatalogBuilder {
    #[must_use]
    pub fn index(mut self, index: IndexDefinition) -> Self {
        self.indexes.register(index);
        self
    }

    #[must_use]
    pub fn metadata(mut self, column: impl Into<String>) -> Self {
        self.metadata.push(column.into());
        self
    }

    pub fn build(self) -> InMemoryCatalog {
        InMemoryCatalog {
            id: self.id,
            path: split_path(&self.path),
            converted: AtomicBool::new(false),
            indexes: RwLock::new(self.indexes),
            metadata_columns: RwLock::new(self.metadata),
            records: RwLock::new(Records::default()),
            content: RwLock::new(BTreeMap::new()),
        }
    }
}

impl InMemoryCatalog {
    /// Start building a catalog with the given id, located at `path`.
    pub fn builder(id: impl Into<String>, path: &str) -> InMemoryCatalogBuilder {
        InMemoryCatalogBuilder {
            id: id.into(),
            path: path.to_string(),
            indexes: IndexRegistry::new(),
            metadata: Vec::new(),
        }
    }

    pub fn add_index(&self, index: IndexDefinition) {
        self.indexes.write().register(index);
    }

    pub fn add_metadata(&self, column: impl Into<String>) {
        self.metadata_columns.write().push(column.into());
    }

    /// Register content so `rebuild` can find it.
    pub fn publish(&self, object: Arc<dyn Indexable>) -> Result<(), CatalogError> {
        let uid = object
            .uid()
            .ok_or_else(|| CatalogError::UnknownRecord(format!("/{}", object.path().join("/"))))?;
        self.content.write().insert(uid, object);
        Ok(())
    }

    pub fn unpublish(&self, uid: &str) -> Option<Arc<dyn Indexable>> {
        self.content.write().remove(uid)
    }

    /// Stored value of an index for a UID.
    pub fn index_value(&self, uid: &str, index: &str) -> Option<Value> {
        let records = self.records.read();
        let rid = records.uids.get(uid)?;
        records.entries.get(rid)?.values.get(index).cloned()
    }

    fn brain(rid: RecordId, entry: &Entry) -> Brain {
        Brain {
            rid: Some(rid),
            uid: entry.uid.clone(),
            path: entry.path.clone(),
            metadata: entry.metadata.clone(),
            score: None,
        }
    }
}

fn allocate(records: &mut Records, uid: &str, path: &str) -> RecordId {
    if let Some(rid) = records.uids.get(uid) {
        return *rid;
    }
    records.next_rid += 1;
    let rid = RecordId(records.next_rid);
    records.uids.insert(uid.to_string(), rid);
    records.entries.insert(
        rid,
        Entry {
            uid: uid.to_string(),
            path: path.to_string(),
            metadata: Map::new(),
            values: Map::new(),
        },
    );
    rid
}

fn sort_key<'a>(entry: &'a Entry, index: &str) -> Option<&'a Value> {
    match entry.values.get(index) {
        Some(Value::Array(items)) => items.first(),
        Some(Value::Null) | None => None,
        Some(value) => Some(value),
    }
}

impl LegacyCatalog for InMemoryCatalog {
    fn catalog_id(&self) -> String {
        self.id.clone()
    }

    fn physical_path(&self) -> Vec<String> {
        self.path.clone()
    }

    fn is_converted(&self) -> bool {
        self.converted.load(AtomicOrdering::SeqCst)
    }

    fn mark_converted(&self) {
        self.converted.store(true, AtomicOrdering::SeqCst);
    }

    fn index_names(&self) -> Vec<String> {
        self.indexes.read().names()
    }

    fn index_definition(&self, name: &str) -> Option<IndexDefinition> {
        self.indexes.read().get(name).cloned()
    }

    fn len(&self) -> usize {
        self.records.read().entries.len()
    }

    fn record_id(&self, uid: &str) -> Option<RecordId> {
        self.records.read().uids.get(uid).copied()
    }

    fn record(&self, rid: RecordId) -> Option<CatalogRecord> {
        self.records.read().entries.get(&rid).map(|entry| CatalogRecord {
            rid,
            uid: entry.uid.clone(),
            path: entry.path.clone(),
            metadata: entry.metadata.clone(),
        })
    }

    fn create_record(&self, uid: &str, path: &str) -> RecordId {
        allocate(&mut self.records.write(), uid, path)
    }

    fn update_metadata(&self, object: &dyn Indexable, rid: RecordId) -> Result<(), CatalogError> {
        let columns = self.metadata_columns.read().clone();
        let mut records = self.records.write();
        let entry = records
            .entries
            .get_mut(&rid)
            .ok_or_else(|| CatalogError::UnknownRecord(rid.0.to_string()))?;
        for column in columns {
            let value = object.attribute(&column).unwrap_or(Value::Null);
            entry.metadata.insert(column, value);
        }
        Ok(())
    }

    fn catalog_object(
        &self,
        object: &dyn Indexable,
        uid: &str,
        index_names: &[String],
        update_metadata: bool,
    ) -> Result<(), CatalogError> {
        let names = if index_names.is_empty() {
            self.index_names()
        } else {
            index_names.to_vec()
        };
        let values: Vec<(String, Option<Value>)> = {
            let indexes = self.indexes.read();
            names
                .into_iter()
                .filter_map(|name| {
                    let value = indexes.get(&name)?.get_value(object);
                    Some((name, value))
                })
                .collect()
        };

        let path = format!("/{}", object.path().join("/"));
        let rid = {
            let mut records = self.records.write();
            let rid = allocate(&mut records, uid, &path);
            if let Some(entry) = records.entries.get_mut(&rid) {
                entry.path = path;
                for (name, value) in values {
                    match value {
                        Some(value) => entry.values.insert(name, value),
                        None => entry.values.remove(&name),
                    };
                }
            }
            rid
        };

        if update_metadata {
            self.update_metadata(object, rid)?;
        }
        Ok(())
    }

    fn uncatalog_object(&self, uid: &str) -> Result<(), CatalogError> {
        let mut records = self.records.write();
        if let Some(rid) = records.uids.remove(uid) {
            records.entries.remove(&rid);
        }
        Ok(())
    }

    fn search_results(&self, query: &CatalogQuery) -> Result<SearchResults, CatalogError> {
        let known = self.indexes.read().names();
        let records = self.records.read();

        let mut matched: Vec<(&RecordId, &Entry)> = records
            .entries
            .iter()
            .filter(|(_, entry)| {
                query
                    .criteria
                    .iter()
                    .filter(|(index, _)| known.contains(*index))
                    .all(|(index, criterion)| criterion.matches(entry.values.get(index)))
            })
            .collect();

        if let Some(sort_on) = &query.sort_on {
            matched.sort_by(|(_, a), (_, b)| {
                let ordering = match (sort_key(a, sort_on), sort_key(b, sort_on)) {
                    (Some(x), Some(y)) => compare_values(x, y).unwrap_or(Ordering::Equal),
                    (Some(_), None) => Ordering::Less,
                    (None, Some(_)) => Ordering::Greater,
                    (None, None) => Ordering::Equal,
                };
                match query.sort_order {
                    SortOrder::Ascending => ordering,
                    SortOrder::Descending => ordering.reverse(),
                }
            });
        }

        let total = matched.len();
        let brains = matched
            .into_iter()
            .skip(query.start)
            .take(query.sort_limit.unwrap_or(usize::MAX))
            .map(|(rid, entry)| Self::brain(*rid, entry))
            .collect();
        Ok(SearchResults::from_brains(total, brains))
    }

    fn rebuild(&self, reindex: &mut ReindexFn<'_>) -> Result<usize, CatalogError> {
        let content: Vec<(String, Arc<dyn Indexable>)> = self
            .content
            .read()
            .iter()
            .map(|(uid, object)| (uid.clone(), Arc::clone(object)))
            .collect();

        self.clear()?;
        for (uid, object) in &content {
            reindex(uid, object.as_ref())?;
        }
        Ok(content.len())
    }

    fn clear(&self) -> Result<(), CatalogError> {
        let mut records = self.records.write();
        records.uids.clear();
        records.entries.clear();
        Ok(())
    }
}
