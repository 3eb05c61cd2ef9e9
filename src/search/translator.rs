// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Query Translator
//!
//! Translates a [`CatalogQuery`] into the backend query DSL plus sort and
//! paging.
//!
//! # Translation
//!
//! ```text
//! Eq(v)                  {"term":  {f: v}}
//! AnyOf([..])            {"terms": {f: [..]}}
//! AllOf([a, b])          {"bool": {"must": [term a, term b]}}
//! NoneOf([..])           {"bool": {"must_not": [terms ..]}}
//! Range{min, max}        {"range": {f: {"gte": min, "lte": max}}}
//! Text(t)                {"match": {f: {"query": t, "operator": "and"}}}
//! Path{p, None}          {"bool": {"should": [term p, prefix "p/"]}}
//! Path{p, Some(0)}       {"term": {f: p}}
//! Path{p, Some(n)}       {"bool": {"must": [path subtree, range f_depth <= depth(p) + n]}}
//! ActiveAt(t)            {"bool": {"must_not": [f.start > t, f.end < t]}}
//!
//! criteria               {"bool": {"filter": [...]}}   (or match_all)
//! ```
//!
//! Criteria on indexes the catalog does not know are dropped, matching the
//! legacy catalog's own behaviour.

use serde_json::{json, Value};
use thiserror::Error;

use super::query::{CatalogQuery, Criterion, SortOrder};
use crate::backend::SortSpec;
use crate::catalog::{path_depth, path_depth_field, LegacyCatalog};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TranslateError {
    #[error("cannot sort on unknown index '{0}'")]
    UnknownSortIndex(String),
    #[error("criterion on '{0}' has no values")]
    EmptyValues(String),
    #[error("range on '{0}' has neither bound")]
    UnboundedRange(String),
    #[error("unsupported criterion on '{index}': {reason}")]
    Unsupported { index: String, reason: String },
}

/// Backend-native query plus sort and paging.
#[derive(Debug, Clone, PartialEq)]
pub struct TranslatedQuery {
    pub query: Value,
    pub sort: Vec<SortSpec>,
    pub from: usize,
    pub size: Option<usize>,
}

/// Generic query → backend query.
pub trait QueryTranslator: Send + Sync {
    fn translate(&self, catalog: &dyn LegacyCatalog, query: &CatalogQuery) -> Result<TranslatedQuery, TranslateError>;
}

/// Translator for the bool/term query DSL.
#[derive(Debug, Clone, Copy, Default)]
pub struct DslTranslator;

impl DslTranslator {
    fn translate_criterion(field: &str, criterion: &Criterion) -> Result<Value, TranslateError> {
        let empty = || TranslateError::EmptyValues(field.to_string());
        let clause = match criterion {
            Criterion::Eq(value) => json!({"term": {field: value}}),
            Criterion::AnyOf(values) => {
                if values.is_empty() {
                    return Err(empty());
                }
                json!({"terms": {field: values}})
            }
            Criterion::AllOf(values) => {
                if values.is_empty() {
                    return Err(empty());
                }
                let must: Vec<Value> = values.iter().map(|v| json!({"term": {field: v}})).collect();
                json!({"bool": {"must": must}})
            }
            Criterion::NoneOf(values) => {
                if values.is_empty() {
                    return Err(empty());
                }
                json!({"bool": {"must_not": [{"terms": {field: values}}]}})
            }
            Criterion::Range { min, max } => {
                let mut bounds = serde_json::Map::new();
                if let Some(min) = min {
                    bounds.insert("gte".into(), min.clone());
                }
                if let Some(max) = max {
                    bounds.insert("lte".into(), max.clone());
                }
                if bounds.is_empty() {
                    return Err(TranslateError::UnboundedRange(field.to_string()));
                }
                json!({"range": {field: bounds}})
            }
            Criterion::Text(text) => {
                if text.trim().is_empty() {
                    return Err(empty());
                }
                json!({"match": {field: {"query": text, "operator": "and"}}})
            }
            Criterion::Path { path, depth } => {
                let base = path.trim_end_matches('/');
                let subtree = json!({"bool": {"should": [
                    {"term": {field: base}},
                    {"prefix": {field: format!("{}/", base)}}
                ]}});
                match depth {
                    Some(0) => json!({"term": {field: base}}),
                    None => subtree,
                    Some(n) => {
                        let limit = path_depth(base) as u64 + u64::from(*n);
                        json!({"bool": {"must": [
                            subtree,
                            {"range": {path_depth_field(field): {"lte": limit}}}
                        ]}})
                    }
                }
            }
            Criterion::ActiveAt(instant) => json!({"bool": {"must_not": [
                {"range": {format!("{}.start", field): {"gt": instant}}},
                {"range": {format!("{}.end", field): {"lt": instant}}}
            ]}}),
        };
        Ok(clause)
    }
}

impl QueryTranslator for DslTranslator {
    fn translate(&self, catalog: &dyn LegacyCatalog, query: &CatalogQuery) -> Result<TranslatedQuery, TranslateError> {
        let mut filters = Vec::with_capacity(query.criteria.len());
        for (index, criterion) in &query.criteria {
            if catalog.index_definition(index).is_none() {
                continue;
            }
            filters.push(Self::translate_criterion(index, criterion)?);
        }

        let sort = match &query.sort_on {
            Some(index) => {
                if catalog.index_definition(index).is_none() {
                    return Err(TranslateError::UnknownSortIndex(index.clone()));
                }
                vec![match query.sort_order {
                    SortOrder::Ascending => SortSpec::asc(index.clone()),
                    SortOrder::Descending => SortSpec::desc(index.clone()),
                }]
            }
            None => Vec::new(),
        };

        let body = if filters.is_empty() {
            json!({"match_all": {}})
        } else {
            json!({"bool": {"filter": filters}})
        };

        Ok(TranslatedQuery {
            query: body,
            sort,
            from: query.start,
            size: query.sort_limit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{IndexDefinition, InMemoryCatalog};

    fn catalog() -> InMemoryCatalog {
        InMemoryCatalog::builder("portal_catalog", "/plone")
            .index(IndexDefinition::field("portal_type"))
            .index(IndexDefinition::keyword("Subject"))
            .index(IndexDefinition::path("path"))
            .index(IndexDefinition::text("SearchableText"))
            .index(IndexDefinition::date("modified"))
            .index(IndexDefinition::date_range("effectiveRange", "effective", "expires"))
            .build()
    }

    fn translate(query: &CatalogQuery) -> Result<TranslatedQuery, TranslateError> {
        DslTranslator.translate(&catalog(), query)
    }

    #[test]
    fn test_empty_query_matches_all() {
        let t = translate(&CatalogQuery::new()).unwrap();
        assert_eq!(t.query, json!({"match_all": {}}));
        assert!(t.sort.is_empty());
        assert_eq!(t.from, 0);
        assert_eq!(t.size, None);
    }

    #[test]
    fn test_field_criteria() {
        let query = CatalogQuery::new()
            .eq("portal_type", "Document")
            .any_of("Subject", ["rust", "go"])
            .text("SearchableText", "hello world");
        let t = translate(&query).unwrap();

        // BTreeMap order: SearchableText, Subject, portal_type
        assert_eq!(
            t.query,
            json!({"bool": {"filter": [
                {"match": {"SearchableText": {"query": "hello world", "operator": "and"}}},
                {"terms": {"Subject": ["rust", "go"]}},
                {"term": {"portal_type": "Document"}}
            ]}})
        );
    }

    #[test]
    fn test_path_translation() {
        let t = translate(&CatalogQuery::new().path("/plone/news/", None)).unwrap();
        assert_eq!(
            t.query["bool"]["filter"][0],
            json!({"bool": {"should": [
                {"term": {"path": "/plone/news"}},
                {"prefix": {"path": "/plone/news/"}}
            ]}})
        );

        let t = translate(&CatalogQuery::new().path("/plone/news", Some(0))).unwrap();
        assert_eq!(t.query["bool"]["filter"][0], json!({"term": {"path": "/plone/news"}}));

        let t = translate(&CatalogQuery::new().path("/plone/news", Some(1))).unwrap();
        assert_eq!(
            t.query["bool"]["filter"][0],
            json!({"bool": {"must": [
                {"bool": {"should": [
                    {"term": {"path": "/plone/news"}},
                    {"prefix": {"path": "/plone/news/"}}
                ]}},
                {"range": {"path_depth": {"lte": 3}}}
            ]}})
        );
    }

    #[test]
    fn test_active_at_translation() {
        let query = CatalogQuery::new().with("effectiveRange", Criterion::ActiveAt(1000));
        let t = translate(&query).unwrap();
        assert_eq!(
            t.query["bool"]["filter"][0],
            json!({"bool": {"must_not": [
                {"range": {"effectiveRange.start": {"gt": 1000}}},
                {"range": {"effectiveRange.end": {"lt": 1000}}}
            ]}})
        );
    }

    #[test]
    fn test_sort_and_paging() {
        let query = CatalogQuery::new()
            .sort_on("modified", SortOrder::Descending)
            .start(20)
            .limit(10);
        let t = translate(&query).unwrap();
        assert_eq!(t.sort, vec![SortSpec::desc("modified")]);
        assert_eq!(t.from, 20);
        assert_eq!(t.size, Some(10));
    }

    #[test]
    fn test_translation_errors() {
        let unknown_sort = CatalogQuery::new().sort_on("nope", SortOrder::Ascending);
        assert_eq!(translate(&unknown_sort).unwrap_err(), TranslateError::UnknownSortIndex("nope".into()));

        let empty = CatalogQuery::new().with("Subject", Criterion::AnyOf(vec![]));
        assert_eq!(translate(&empty).unwrap_err(), TranslateError::EmptyValues("Subject".into()));

        let unbounded = CatalogQuery::new().range("modified", None, None);
        assert_eq!(translate(&unbounded).unwrap_err(), TranslateError::UnboundedRange("modified".into()));
    }

    #[test]
    fn test_unknown_index_dropped() {
        let t = translate(&CatalogQuery::new().eq("not_an_index", "x")).unwrap();
        assert_eq!(t.query, json!({"match_all": {}}));
    }
}
