// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Catalog Query - the generic structured query both stores answer.
//!
//! A query is a set of per-index criteria plus sort and paging. The legacy
//! catalog evaluates it directly; the remote store gets it through a
//! [`QueryTranslator`](super::QueryTranslator).
//!
//! # Example
//!
//! ```rust
//! use catalog_sync::search::{CatalogQuery, Criterion, SortOrder};
//!
//! let query = CatalogQuery::new()
//!     .eq("portal_type", "Document")
//!     .any_of("Subject", ["rust", "search"])
//!     .path("/site/news", None)
//!     .sort_on("modified", SortOrder::Descending)
//!     .limit(20);
//!
//! assert_eq!(query.criteria.len(), 3);
//! assert!(matches!(query.criteria["path"], Criterion::Path { .. }));
//! ```

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::backend::matcher::{compare_values, field_values};

/// Index holding the role/user tokens allowed to view an object
pub const ALLOWED_ROLES_AND_USERS: &str = "allowedRolesAndUsers";

/// Index holding an object's effective/expiry range
pub const EFFECTIVE_RANGE: &str = "effectiveRange";

/// Constraint on one index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Criterion {
    /// Some value equals
    Eq(Value),
    /// Some value is one of
    AnyOf(Vec<Value>),
    /// Values include all of
    AllOf(Vec<Value>),
    /// No value is one of
    NoneOf(Vec<Value>),
    /// Inclusive range, either end open
    Range { min: Option<Value>, max: Option<Value> },
    /// Every word of the text occurs
    Text(String),
    /// At or below a path; `depth: Some(0)` is the path itself
    Path { path: String, depth: Option<u32> },
    /// `{start, end}` range containing the instant (epoch millis);
    /// a missing end is open
    ActiveAt(i64),
}

impl Criterion {
    /// Evaluate against an object's stored index value.
    pub fn matches(&self, value: Option<&Value>) -> bool {
        match self {
            Self::Eq(expected) => field_values(value).any(|v| v == expected),
            Self::AnyOf(expected) => field_values(value).any(|v| expected.contains(v)),
            Self::AllOf(expected) => {
                let present: Vec<&Value> = field_values(value).collect();
                !expected.is_empty() && expected.iter().all(|e| present.contains(&e))
            }
            Self::NoneOf(excluded) => !field_values(value).any(|v| excluded.contains(v)),
            Self::Range { min, max } => field_values(value).any(|v| {
                let above = min
                    .as_ref()
                    .map_or(true, |m| compare_values(v, m).is_some_and(|o| o != Ordering::Less));
                let below = max
                    .as_ref()
                    .map_or(true, |m| compare_values(v, m).is_some_and(|o| o != Ordering::Greater));
                above && below
            }),
            Self::Text(text) => {
                let haystack: Vec<String> = field_values(value)
                    .filter_map(Value::as_str)
                    .flat_map(words)
                    .collect();
                let terms = words(text);
                !terms.is_empty() && terms.iter().all(|t| haystack.contains(t))
            }
            Self::Path { path, depth } => field_values(value)
                .filter_map(Value::as_str)
                .any(|candidate| path_matches(candidate, path, *depth)),
            Self::ActiveAt(instant) => {
                let Some(Value::Object(range)) = value else {
                    return true;
                };
                let at = Value::from(*instant);
                let started = range
                    .get("start")
                    .and_then(|s| compare_values(s, &at))
                    .map_or(true, |o| o != Ordering::Greater);
                let not_ended = range
                    .get("end")
                    .and_then(|e| compare_values(e, &at))
                    .map_or(true, |o| o != Ordering::Less);
                started && not_ended
            }
        }
    }
}

fn words(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

fn path_matches(candidate: &str, path: &str, depth: Option<u32>) -> bool {
    let base = path.trim_end_matches('/');
    if candidate == base {
        return true;
    }
    let Some(rest) = candidate.strip_prefix(base).and_then(|r| r.strip_prefix('/')) else {
        return false;
    };
    match depth {
        None => true,
        Some(limit) => rest.split('/').filter(|s| !s.is_empty()).count() as u64 <= u64::from(limit),
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ascending" | "asc" => Ok(Self::Ascending),
            "descending" | "desc" | "reverse" => Ok(Self::Descending),
            other => Err(format!("unknown sort order '{}'", other)),
        }
    }
}

/// Generic catalog query.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CatalogQuery {
    /// Index name → constraint (all must hold)
    #[serde(default)]
    pub criteria: BTreeMap<String, Criterion>,
    #[serde(default)]
    pub sort_on: Option<String>,
    #[serde(default)]
    pub sort_order: SortOrder,
    /// Maximum number of results
    #[serde(default)]
    pub sort_limit: Option<usize>,
    /// Offset of the first result
    #[serde(default)]
    pub start: usize,
    /// Caller asks for content outside its effective range
    #[serde(default)]
    pub show_inactive: bool,
}

impl CatalogQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a constraint.
    #[must_use]
    pub fn with(mut self, index: impl Into<String>, criterion: Criterion) -> Self {
        self.criteria.insert(index.into(), criterion);
        self
    }

    #[must_use]
    pub fn eq(self, index: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(index, Criterion::Eq(value.into()))
    }

    #[must_use]
    pub fn any_of<V: Into<Value>>(self, index: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        self.with(index, Criterion::AnyOf(values.into_iter().map(Into::into).collect()))
    }

    #[must_use]
    pub fn text(self, index: impl Into<String>, text: impl Into<String>) -> Self {
        self.with(index, Criterion::Text(text.into()))
    }

    #[must_use]
    pub fn range(self, index: impl Into<String>, min: Option<Value>, max: Option<Value>) -> Self {
        self.with(index, Criterion::Range { min, max })
    }

    /// Constrain the `path` index.
    #[must_use]
    pub fn path(self, path: impl Into<String>, depth: Option<u32>) -> Self {
        self.with("path", Criterion::Path { path: path.into(), depth })
    }

    #[must_use]
    pub fn sort_on(mut self, index: impl Into<String>, order: SortOrder) -> Self {
        self.sort_on = Some(index.into());
        self.sort_order = order;
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.sort_limit = Some(limit);
        self
    }

    #[must_use]
    pub fn start(mut self, start: usize) -> Self {
        self.start = start;
        self
    }

    #[must_use]
    pub fn show_inactive(mut self) -> Self {
        self.show_inactive = true;
        self
    }

    /// Merge extra constraints, replacing any on the same index.
    #[must_use]
    pub fn extend(mut self, extra: impl IntoIterator<Item = (String, Criterion)>) -> Self {
        self.criteria.extend(extra);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_value_criteria() {
        let subjects = json!(["rust", "search"]);
        assert!(Criterion::Eq(json!("rust")).matches(Some(&subjects)));
        assert!(Criterion::AnyOf(vec![json!("go"), json!("search")]).matches(Some(&subjects)));
        assert!(Criterion::AllOf(vec![json!("rust"), json!("search")]).matches(Some(&subjects)));
        assert!(!Criterion::AllOf(vec![json!("rust"), json!("go")]).matches(Some(&subjects)));
        assert!(Criterion::NoneOf(vec![json!("go")]).matches(Some(&subjects)));
        assert!(!Criterion::Eq(json!("rust")).matches(None));
        assert!(Criterion::NoneOf(vec![json!("go")]).matches(None));
    }

    #[test]
    fn test_range_and_text() {
        let range = Criterion::Range { min: Some(json!(10)), max: Some(json!(20)) };
        assert!(range.matches(Some(&json!(10))));
        assert!(range.matches(Some(&json!(20))));
        assert!(!range.matches(Some(&json!(21))));
        assert!(!range.matches(Some(&json!("15"))));

        let text = Criterion::Text("hello world".into());
        assert!(text.matches(Some(&json!("Hello, big World"))));
        assert!(!text.matches(Some(&json!("Hello"))));
        assert!(!Criterion::Text("  ".into()).matches(Some(&json!("anything"))));
    }

    #[test]
    fn test_path_depth() {
        let below = Criterion::Path { path: "/site/news".into(), depth: None };
        assert!(below.matches(Some(&json!("/site/news"))));
        assert!(below.matches(Some(&json!("/site/news/a/b"))));
        assert!(!below.matches(Some(&json!("/site/newsletter"))));

        let exact = Criterion::Path { path: "/site/news/".into(), depth: Some(0) };
        assert!(exact.matches(Some(&json!("/site/news"))));
        assert!(!exact.matches(Some(&json!("/site/news/a"))));

        let children = Criterion::Path { path: "/site/news".into(), depth: Some(1) };
        assert!(children.matches(Some(&json!("/site/news/a"))));
        assert!(!children.matches(Some(&json!("/site/news/a/b"))));

        let root = Criterion::Path { path: "/".into(), depth: None };
        assert!(root.matches(Some(&json!("/anything"))));
    }

    #[test]
    fn test_active_at() {
        let active = Criterion::ActiveAt(150);
        assert!(active.matches(Some(&json!({"start": 100, "end": 200}))));
        assert!(active.matches(Some(&json!({"start": 100, "end": null}))));
        assert!(active.matches(None));
        assert!(!active.matches(Some(&json!({"start": 160, "end": null}))));
        assert!(!active.matches(Some(&json!({"start": 100, "end": 140}))));
    }

    #[test]
    fn test_sort_order_parse() {
        assert_eq!("reverse".parse::<SortOrder>().unwrap(), SortOrder::Descending);
        assert_eq!("Ascending".parse::<SortOrder>().unwrap(), SortOrder::Ascending);
        assert!("sideways".parse::<SortOrder>().is_err());
    }

    #[test]
    fn test_query_builder() {
        let query = CatalogQuery::new()
            .eq("portal_type", "Document")
            .text("SearchableText", "rust")
            .extend([("portal_type".to_string(), Criterion::Eq(json!("News Item")))])
            .start(10)
            .limit(5);

        assert_eq!(query.criteria["portal_type"], Criterion::Eq(json!("News Item")));
        assert_eq!(query.start, 10);
        assert_eq!(query.sort_limit, Some(5));
        assert!(!query.show_inactive);
    }

    #[test]
    fn test_query_from_json() {
        let query: CatalogQuery = serde_json::from_value(json!({
            "criteria": {"review_state": {"any_of": ["published"]}},
            "sort_on": "sortable_title",
            "sort_order": "descending"
        }))
        .unwrap();
        assert_eq!(query.sort_order, SortOrder::Descending);
        assert_eq!(query.criteria["review_state"], Criterion::AnyOf(vec![json!("published")]));
    }
}
