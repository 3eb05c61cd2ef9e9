// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Query DSL evaluation for the in-memory backend.
//!
//! Supports the subset of the search DSL the query translator emits:
//!
//! ```text
//! {"match_all": {}}
//! {"term":   {"field": value}}
//! {"terms":  {"field": [v1, v2]}}
//! {"range":  {"field": {"gte": a, "lt": b}}}
//! {"match":  {"field": {"query": "text", "operator": "and"}}}
//! {"prefix": {"field": "/site/news/"}}
//! {"bool":   {"must": [..], "filter": [..], "should": [..], "must_not": [..],
//!             "minimum_should_match": n}}
//! ```

use std::cmp::Ordering;

use serde_json::Value;

use super::traits::{BackendError, Document};

/// Evaluate a query clause against a document.
pub fn matches(query: &Value, doc: &Document) -> Result<bool, BackendError> {
    let (kind, body) = query
        .as_object()
        .filter(|obj| obj.len() == 1)
        .and_then(|obj| obj.iter().next())
        .ok_or_else(|| BackendError::Rejected(format!("malformed query clause: {}", query)))?;

    match kind.as_str() {
        "match_all" => Ok(true),
        "term" => {
            let (field, expected) = single_field(kind, body)?;
            Ok(field_values(lookup(doc, field)).any(|v| v == expected))
        }
        "terms" => {
            let (field, expected) = single_field(kind, body)?;
            let expected = expected
                .as_array()
                .ok_or_else(|| BackendError::Rejected("terms expects an array".into()))?;
            Ok(field_values(lookup(doc, field)).any(|v| expected.contains(v)))
        }
        "range" => {
            let (field, bounds) = single_field(kind, body)?;
            Ok(field_values(lookup(doc, field)).any(|v| in_range(v, bounds)))
        }
        "match" => {
            let (field, spec) = single_field(kind, body)?;
            let (text, all) = match spec {
                Value::String(s) => (s.as_str(), false),
                Value::Object(obj) => (
                    obj.get("query").and_then(Value::as_str).unwrap_or_default(),
                    obj.get("operator").and_then(Value::as_str) == Some("and"),
                ),
                _ => return Err(BackendError::Rejected("match expects text".into())),
            };
            Ok(text_matches(lookup(doc, field), text, all))
        }
        "prefix" => {
            let (field, prefix) = single_field(kind, body)?;
            let prefix = prefix
                .as_str()
                .ok_or_else(|| BackendError::Rejected("prefix expects a string".into()))?;
            Ok(field_values(lookup(doc, field))
                .any(|v| v.as_str().is_some_and(|s| s.starts_with(prefix))))
        }
        "bool" => bool_matches(body, doc),
        other => Err(BackendError::Rejected(format!("unsupported query clause '{}'", other))),
    }
}

fn bool_matches(body: &Value, doc: &Document) -> Result<bool, BackendError> {
    let clauses = |name: &str| -> Vec<&Value> {
        match body.get(name) {
            Some(Value::Array(items)) => items.iter().collect(),
            Some(item @ Value::Object(_)) => vec![item],
            _ => Vec::new(),
        }
    };

    let required: Vec<&Value> = clauses("must").into_iter().chain(clauses("filter")).collect();
    for clause in &required {
        if !matches(clause, doc)? {
            return Ok(false);
        }
    }
    for clause in clauses("must_not") {
        if matches(clause, doc)? {
            return Ok(false);
        }
    }

    let should = clauses("should");
    let minimum = body
        .get("minimum_should_match")
        .and_then(Value::as_u64)
        .map(|n| n as usize)
        .unwrap_or(if required.is_empty() && !should.is_empty() { 1 } else { 0 });
    if minimum == 0 {
        return Ok(true);
    }
    let mut hits = 0;
    for clause in should {
        if matches(clause, doc)? {
            hits += 1;
            if hits >= minimum {
                return Ok(true);
            }
        }
    }
    Ok(false)
}

fn single_field<'a>(kind: &str, body: &'a Value) -> Result<(&'a str, &'a Value), BackendError> {
    body.as_object()
        .filter(|obj| obj.len() == 1)
        .and_then(|obj| obj.iter().next())
        .map(|(k, v)| (k.as_str(), v))
        .ok_or_else(|| BackendError::Rejected(format!("{} expects exactly one field", kind)))
}

fn in_range(value: &Value, bounds: &Value) -> bool {
    let check = |op: &str, accept: fn(Ordering) -> bool| -> bool {
        match bounds.get(op) {
            None | Some(Value::Null) => true,
            Some(bound) => compare_values(value, bound).is_some_and(accept),
        }
    };
    check("gte", |o| o != Ordering::Less)
        && check("gt", |o| o == Ordering::Greater)
        && check("lte", |o| o != Ordering::Greater)
        && check("lt", |o| o == Ordering::Less)
}

fn text_matches(value: Option<&Value>, text: &str, all: bool) -> bool {
    let haystack: String = field_values(value)
        .filter_map(Value::as_str)
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    let words: Vec<&str> = haystack.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()).collect();
    let query = text.to_lowercase();
    let mut terms = query.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty()).peekable();
    if terms.peek().is_none() {
        return false;
    }
    if all {
        terms.all(|t| words.contains(&t))
    } else {
        terms.any(|t| words.contains(&t))
    }
}

/// Resolve a dotted field path (`effectiveRange.start`) in a document.
pub(crate) fn lookup<'a>(doc: &'a Document, field: &str) -> Option<&'a Value> {
    let mut parts = field.split('.');
    let mut current = doc.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

/// A scalar field yields itself; an array yields its elements; null yields nothing.
pub(crate) fn field_values(value: Option<&Value>) -> Box<dyn Iterator<Item = &Value> + '_> {
    match value {
        None | Some(Value::Null) => Box::new(std::iter::empty()),
        Some(Value::Array(items)) => Box::new(items.iter()),
        Some(other) => Box::new(std::iter::once(other)),
    }
}

/// Order two JSON scalars of the same kind; `None` if incomparable.
pub(crate) fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}
