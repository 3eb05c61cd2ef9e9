// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Catalog index registry.
//!
//! Each named index knows how to pull its value out of a content object and
//! which backend field mapping stores that value.
//!
//! ```text
//! name              kind        mapping
//! ────────────────  ──────────  ───────────────────────────────────────
//! UID               uuid        {"type": "keyword"}
//! path              path        {"type": "keyword"}
//! Title             text        {"type": "text"}
//! review_state      field       {"type": "keyword"}
//! is_folderish      boolean     {"type": "boolean"}
//! modified          date        {"type": "date"}
//! effectiveRange    date_range  {"properties": {"start": date, "end": date}}
//! ```
//!
//! A path index also stores `<name>_depth`, the segment count of the path,
//! so depth-limited path queries can be answered by a range.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::object::Indexable;

/// Index kinds the catalog knows how to map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum IndexKind {
    /// Exact-value field index
    Field,
    /// Multi-valued keyword index (subjects, roles)
    Keyword,
    Boolean,
    /// Epoch milliseconds
    Date,
    /// Start/end pair read from two attributes
    DateRange { since: String, until: String },
    /// Full-text index
    Text,
    /// Physical path
    Path,
    /// Object UID
    Uuid,
    /// Position in parent folder
    Position,
    /// An index type without a mapping
    Unknown { type_name: String },
}

impl IndexKind {
    /// Backend field mapping fragment, `None` if the kind has none.
    #[must_use]
    pub fn mapping(&self) -> Option<Value> {
        let fragment = match self {
            Self::Field | Self::Keyword | Self::Path | Self::Uuid => json!({"type": "keyword"}),
            Self::Boolean => json!({"type": "boolean"}),
            Self::Date => json!({"type": "date"}),
            Self::Text => json!({"type": "text"}),
            Self::Position => json!({"type": "integer"}),
            Self::DateRange { .. } => json!({
                "properties": {
                    "start": {"type": "date"},
                    "end": {"type": "date"}
                }
            }),
            Self::Unknown { .. } => return None,
        };
        Some(fragment)
    }
}

/// Stored field holding the segment count of a path index's value.
pub fn path_depth_field(index: &str) -> String {
    format!("{}_depth", index)
}

/// Number of non-empty segments in a path.
pub fn path_depth(path: &str) -> usize {
    path.split('/').filter(|segment| !segment.is_empty()).count()
}

/// A named index registered with the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDefinition {
    pub name: String,
    #[serde(flatten)]
    pub kind: IndexKind,
    /// Attribute to read (defaults to the index name)
    #[serde(default)]
    pub attribute: Option<String>,
}

impl IndexDefinition {
    pub fn new(name: impl Into<String>, kind: IndexKind) -> Self {
        Self {
            name: name.into(),
            kind,
            attribute: None,
        }
    }

    pub fn field(name: impl Into<String>) -> Self {
        Self::new(name, IndexKind::Field)
    }

    pub fn keyword(name: impl Into<String>) -> Self {
        Self::new(name, IndexKind::Keyword)
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, IndexKind::Boolean)
    }

    pub fn date(name: impl Into<String>) -> Self {
        Self::new(name, IndexKind::Date)
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, IndexKind::Text)
    }

    pub fn path(name: impl Into<String>) -> Self {
        Self::new(name, IndexKind::Path)
    }

    pub fn uuid(name: impl Into<String>) -> Self {
        Self::new(name, IndexKind::Uuid)
    }

    pub fn date_range(name: impl Into<String>, since: impl Into<String>, until: impl Into<String>) -> Self {
        Self::new(
            name,
            IndexKind::DateRange {
                since: since.into(),
                until: until.into(),
            },
        )
    }

    /// Read from a differently named attribute.
    #[must_use]
    pub fn from_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = Some(attribute.into());
        self
    }

    fn source(&self) -> &str {
        self.attribute.as_deref().unwrap_or(&self.name)
    }

    /// Extra backend fields stored next to this index, as (name, mapping).
    pub fn companion_mappings(&self) -> Vec<(String, Value)> {
        match &self.kind {
            IndexKind::Path => vec![(path_depth_field(&self.name), json!({"type": "integer"}))],
            _ => Vec::new(),
        }
    }

    /// Companion field values derived from this index's stored value.
    pub fn companion_values(&self, value: &Value) -> Vec<(String, Value)> {
        match &self.kind {
            IndexKind::Path => {
                let depth = value.as_str().map_or(Value::Null, |path| Value::from(path_depth(path)));
                vec![(path_depth_field(&self.name), depth)]
            }
            _ => Vec::new(),
        }
    }

    /// Extract this index's value from an object.
    ///
    /// Path and UUID indexes fall back to the object's own path and UID
    /// when the attribute is absent.
    pub fn get_value(&self, object: &dyn Indexable) -> Option<Value> {
        match &self.kind {
            IndexKind::DateRange { since, until } => {
                let start = object.attribute(since);
                let end = object.attribute(until);
                if start.is_none() && end.is_none() {
                    return None;
                }
                Some(json!({
                    "start": start.unwrap_or(Value::Null),
                    "end": end.unwrap_or(Value::Null),
                }))
            }
            IndexKind::Path => object
                .attribute(self.source())
                .or_else(|| Some(Value::String(format!("/{}", object.path().join("/"))))),
            IndexKind::Uuid => object
                .attribute(self.source())
                .or_else(|| object.uid().map(Value::String)),
            _ => object.attribute(self.source()),
        }
    }
}

/// Named indexes of one catalog, in name order.
#[derive(Debug, Clone, Default)]
pub struct IndexRegistry {
    indexes: BTreeMap<String, IndexDefinition>,
}

impl IndexRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) an index definition.
    pub fn register(&mut self, index: IndexDefinition) {
        self.indexes.insert(index.name.clone(), index);
    }

    pub fn get(&self, name: &str) -> Option<&IndexDefinition> {
        self.indexes.get(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.indexes.keys().cloned().collect()
    }

    pub fn all(&self) -> impl Iterator<Item = &IndexDefinition> {
        self.indexes.values()
    }

    pub fn len(&self) -> usize {
        self.indexes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty()
    }
}
