// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Field schema for the remote index.
//!
//! A [`MappingProvider`] resolves a catalog index name to a [`FieldIndex`]:
//! the backend mapping fragment for the field plus the extractor that reads
//! its value from a content object. Provisioning combines every registered
//! index's fragment into one [`MappingDocument`].
//!
//! # Example
//!
//! ```rust
//! use catalog_sync::catalog::{IndexDefinition, InMemoryCatalog};
//! use catalog_sync::schema::{build_mapping, CatalogMappingProvider};
//!
//! let catalog = InMemoryCatalog::builder("portal_catalog", "/plone")
//!     .index(IndexDefinition::text("Title"))
//!     .index(IndexDefinition::field("review_state"))
//!     .build();
//!
//! let mapping = build_mapping(&catalog, &CatalogMappingProvider).unwrap();
//! assert_eq!(mapping.to_json()["properties"]["Title"]["type"], "text");
//! ```
//!
//! # Design
//!
//! - **All or nothing**: one index without a fragment fails the whole build
//! - **Explicit empty**: an extractor's "no value" is stored as `null`

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::backend::Document;
use crate::catalog::{IndexDefinition, Indexable, LegacyCatalog};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    #[error("index '{index}' has no mapping")]
    MissingMapping { index: String },
}

/// One catalog index as the remote store sees it.
pub trait FieldIndex: Send + Sync {
    fn name(&self) -> &str;

    /// Mapping fragment, `None` if the index cannot be mapped.
    fn mapping(&self) -> Option<Value>;

    fn get_value(&self, object: &dyn Indexable) -> Option<Value>;

    /// Extra fields stored next to this one, as (name, mapping fragment).
    fn companion_mappings(&self) -> Vec<(String, Value)> {
        Vec::new()
    }

    /// Companion values derived from this field's stored value.
    fn companion_values(&self, _value: &Value) -> Vec<(String, Value)> {
        Vec::new()
    }
}

/// Index name → [`FieldIndex`].
pub trait MappingProvider: Send + Sync {
    /// `None` if the name does not resolve to an index.
    fn field_index(&self, catalog: &dyn LegacyCatalog, name: &str) -> Option<Box<dyn FieldIndex>>;
}

/// Maps indexes by their catalog definition.
#[derive(Debug, Clone, Copy, Default)]
pub struct CatalogMappingProvider;

/// A catalog index definition exposed as a [`FieldIndex`].
#[derive(Debug, Clone)]
pub struct MappedIndex(pub IndexDefinition);

impl FieldIndex for MappedIndex {
    fn name(&self) -> &str {
        &self.0.name
    }

    fn mapping(&self) -> Option<Value> {
        self.0.kind.mapping()
    }

    fn get_value(&self, object: &dyn Indexable) -> Option<Value> {
        self.0.get_value(object)
    }

    fn companion_mappings(&self) -> Vec<(String, Value)> {
        self.0.companion_mappings()
    }

    fn companion_values(&self, value: &Value) -> Vec<(String, Value)> {
        self.0.companion_values(value)
    }
}

impl MappingProvider for CatalogMappingProvider {
    fn field_index(&self, catalog: &dyn LegacyCatalog, name: &str) -> Option<Box<dyn FieldIndex>> {
        catalog
            .index_definition(name)
            .map(|def| Box::new(MappedIndex(def)) as Box<dyn FieldIndex>)
    }
}

/// Combined field mapping for one document type.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MappingDocument {
    pub properties: BTreeMap<String, Value>,
}

impl MappingDocument {
    /// Wire form: `{"properties": {field: fragment, ...}}`
    #[must_use]
    pub fn to_json(&self) -> Value {
        let properties: Map<String, Value> = self
            .properties
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let mut body = Map::new();
        body.insert("properties".to_string(), Value::Object(properties));
        Value::Object(body)
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}

/// Build the mapping for every registered index.
///
/// Fails on the first index that does not resolve or has no fragment.
pub fn build_mapping(
    catalog: &dyn LegacyCatalog,
    provider: &dyn MappingProvider,
) -> Result<MappingDocument, SchemaError> {
    let mut mapping = MappingDocument::default();
    for name in catalog.index_names() {
        let missing = || SchemaError::MissingMapping { index: name.clone() };
        let field = provider.field_index(catalog, &name).ok_or_else(missing)?;
        let fragment = field.mapping().ok_or_else(missing)?;
        mapping.properties.extend(field.companion_mappings());
        mapping.properties.insert(name, fragment);
    }
    Ok(mapping)
}

/// Stored form of an extracted value.
///
/// "No value" and the literal string `"None"` become `null`, so an object
/// indexed as empty is told apart from one never indexed.
pub fn normalize_value(value: Option<Value>) -> Value {
    match value {
        None => Value::Null,
        Some(Value::String(s)) if s == "None" => Value::Null,
        Some(value) => value,
    }
}

/// Partial document with the values of the named indexes.
///
/// Names that do not resolve to an index are left out.
pub fn extract_fields(
    catalog: &dyn LegacyCatalog,
    provider: &dyn MappingProvider,
    object: &dyn Indexable,
    index_names: &[String],
) -> Document {
    let mut fields = Document::new();
    for name in index_names {
        if let Some(field) = provider.field_index(catalog, name) {
            let value = normalize_value(field.get_value(object));
            fields.extend(field.companion_values(&value));
            fields.insert(name.clone(), value);
        }
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ContentObject, IndexKind, InMemoryCatalog};
    use serde_json::json;

    fn catalog() -> InMemoryCatalog {
        InMemoryCatalog::builder("portal_catalog", "/plone")
            .index(IndexDefinition::text("title"))
            .index(IndexDefinition::field("review_state"))
            .index(IndexDefinition::date_range("effectiveRange", "effective", "expires"))
            .build()
    }

    #[test]
    fn test_build_mapping() {
        let mapping = build_mapping(&catalog(), &CatalogMappingProvider).unwrap();
        assert_eq!(mapping.len(), 3);
        let json = mapping.to_json();
        assert_eq!(json["properties"]["title"], json!({"type": "text"}));
        assert_eq!(json["properties"]["review_state"], json!({"type": "keyword"}));
        assert_eq!(json["properties"]["effectiveRange"]["properties"]["start"], json!({"type": "date"}));
    }

    #[test]
    fn test_path_index_stores_depth() {
        let catalog = catalog();
        catalog.add_index(IndexDefinition::path("path"));

        let mapping = build_mapping(&catalog, &CatalogMappingProvider).unwrap().to_json();
        assert_eq!(mapping["properties"]["path"], json!({"type": "keyword"}));
        assert_eq!(mapping["properties"]["path_depth"], json!({"type": "integer"}));

        let obj = ContentObject::new("doc-1", "/plone/news/doc-1");
        let fields = extract_fields(&catalog, &CatalogMappingProvider, &obj, &["path".to_string()]);
        assert_eq!(fields.get("path"), Some(&json!("/plone/news/doc-1")));
        assert_eq!(fields.get("path_depth"), Some(&json!(3)));
    }

    #[test]
    fn test_missing_mapping_is_fatal() {
        let catalog = catalog();
        catalog.add_index(IndexDefinition::new(
            "SearchableText",
            IndexKind::Unknown { type_name: "ZCTextIndex".into() },
        ));
        let err = build_mapping(&catalog, &CatalogMappingProvider).unwrap_err();
        assert_eq!(err, SchemaError::MissingMapping { index: "SearchableText".into() });
    }

    #[test]
    fn test_normalize_value() {
        assert_eq!(normalize_value(None), Value::Null);
        assert_eq!(normalize_value(Some(json!("None"))), Value::Null);
        assert_eq!(normalize_value(Some(json!("none"))), json!("none"));
        assert_eq!(normalize_value(Some(json!(false))), json!(false));
    }

    #[test]
    fn test_extract_fields() {
        let catalog = catalog();
        let obj = ContentObject::new("doc-1", "/plone/doc-1")
            .with("title", "Hello")
            .with("review_state", "None");

        let fields = extract_fields(
            &catalog,
            &CatalogMappingProvider,
            &obj,
            &["title".to_string(), "review_state".to_string(), "bogus".to_string(), "effectiveRange".to_string()],
        );
        assert_eq!(fields.get("title"), Some(&json!("Hello")));
        assert_eq!(fields.get("review_state"), Some(&Value::Null));
        assert_eq!(fields.get("effectiveRange"), Some(&Value::Null));
        assert!(!fields.contains_key("bogus"));
    }
}
