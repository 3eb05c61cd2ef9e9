// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Property-based tests (fuzzing) for catalog sync resilience.
//!
//! Uses proptest to generate random/malformed inputs and verify the engine
//! never panics, only returns clean errors, and that its pure derivations
//! hold for any input.
//!
//! Run with: `cargo test --test proptest_fuzz`

use std::sync::Arc;

use proptest::prelude::*;
use serde_json::{json, Map, Value};

use catalog_sync::backend::matcher::matches;
use catalog_sync::backend::{Document, InMemoryConnector};
use catalog_sync::catalog::{ContentObject, IndexDefinition, InMemoryCatalog, LegacyCatalog, Principal};
use catalog_sync::coordinator::{doc_type_identifier, index_identifier};
use catalog_sync::mode::resolve;
use catalog_sync::schema::normalize_value;
use catalog_sync::search::{CatalogQuery, Criterion, DslTranslator, QueryTranslator};
use catalog_sync::transaction::{merge_fields, Action};
use catalog_sync::{Mode, SharedSettings, SyncEngine, SyncSettings};

// =============================================================================
// Strategies for generating test data
// =============================================================================

/// Generate arbitrary JSON values (including invalid structures)
fn arbitrary_json_strategy() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|n| Value::Number(n.into())),
        ".*".prop_map(Value::String),
    ];

    leaf.prop_recursive(
        4,  // depth
        64, // max nodes
        10, // items per collection
        |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..10).prop_map(Value::Array),
                prop::collection::hash_map(".*", inner, 0..10)
                    .prop_map(|m| Value::Object(m.into_iter().collect())),
            ]
        },
    )
}

fn mode_strategy() -> impl Strategy<Value = Mode> {
    prop_oneof![Just(Mode::Disable), Just(Mode::Dual), Just(Mode::SearchOnly)]
}

/// Flat document with a handful of field names
fn document_strategy() -> impl Strategy<Value = Document> {
    prop::collection::btree_map("[a-e]", arbitrary_json_strategy(), 0..5)
        .prop_map(|m| m.into_iter().collect::<Map<String, Value>>())
}

/// Physical path segments, including empty and mixed-case ones
fn path_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[A-Za-z_]{0,8}", 0..6)
}

fn criterion_strategy() -> impl Strategy<Value = Criterion> {
    let scalar = prop_oneof![
        any::<i64>().prop_map(Value::from),
        "[a-z ]{0,10}".prop_map(Value::String),
    ];
    prop_oneof![
        scalar.clone().prop_map(Criterion::Eq),
        prop::collection::vec(scalar.clone(), 0..4).prop_map(Criterion::AnyOf),
        prop::collection::vec(scalar.clone(), 0..4).prop_map(Criterion::AllOf),
        prop::collection::vec(scalar.clone(), 0..4).prop_map(Criterion::NoneOf),
        (prop::option::of(scalar.clone()), prop::option::of(scalar))
            .prop_map(|(min, max)| Criterion::Range { min, max }),
        "[a-z ]{0,20}".prop_map(Criterion::Text),
        ("(/[a-z]{1,5}){0,3}", prop::option::of(0u32..3))
            .prop_map(|(path, depth)| Criterion::Path { path, depth }),
        any::<i64>().prop_map(Criterion::ActiveAt),
    ]
}

fn catalog() -> InMemoryCatalog {
    InMemoryCatalog::builder("portal_catalog", "/site")
        .index(IndexDefinition::field("a"))
        .index(IndexDefinition::keyword("b"))
        .index(IndexDefinition::text("c"))
        .index(IndexDefinition::date_range("d", "start", "end"))
        .index(IndexDefinition::path("path"))
        .build()
}

// =============================================================================
// Deserialization Fuzz Tests
// =============================================================================

proptest! {
    /// Settings records from the host store are never trusted
    #[test]
    fn fuzz_settings_from_random_bytes(bytes in prop::collection::vec(any::<u8>(), 0..2000)) {
        let result: Result<SyncSettings, _> = serde_json::from_slice(&bytes);
        let _ = result;
    }

    #[test]
    fn fuzz_settings_from_arbitrary_json(json in arbitrary_json_strategy()) {
        let result: Result<SyncSettings, _> = serde_json::from_value(json);
        if let Ok(settings) = result {
            // whatever parsed must still produce usable connection parameters
            let _ = settings.connection();
        }
    }

    #[test]
    fn fuzz_query_from_arbitrary_json(json in arbitrary_json_strategy()) {
        let result: Result<CatalogQuery, _> = serde_json::from_value(json);
        let _ = result;
    }

    /// The in-memory matcher rejects malformed queries instead of panicking
    #[test]
    fn fuzz_matcher_arbitrary_query(query in arbitrary_json_strategy(), doc in document_strategy()) {
        let _ = matches(&query, &doc);
    }
}

// =============================================================================
// Mode and Identifier Properties
// =============================================================================

proptest! {
    #[test]
    fn prop_unconverted_is_always_disabled(mode in mode_strategy()) {
        let settings = SyncSettings::with_mode(mode);
        prop_assert_eq!(resolve(false, Some(&settings)), Mode::Disable);
        prop_assert_eq!(resolve(false, None), Mode::Disable);
    }

    #[test]
    fn prop_converted_follows_settings(mode in mode_strategy()) {
        let settings = SyncSettings::with_mode(mode);
        prop_assert_eq!(resolve(true, Some(&settings)), mode);
        prop_assert_eq!(resolve(true, Some(&settings)), resolve(true, Some(&settings)));
    }

    #[test]
    fn prop_mode_label_round_trips(mode in mode_strategy()) {
        prop_assert_eq!(mode.as_str().parse::<Mode>().unwrap(), mode);
        prop_assert!(mode.writes_legacy() || mode.writes_remote());
    }

    #[test]
    fn prop_index_identifier_normalized(path in path_strategy()) {
        let id = index_identifier(&path);
        prop_assert_eq!(id.clone(), id.to_lowercase());
        prop_assert!(!id.starts_with('-') && !id.ends_with('-'));
        prop_assert!(!id.contains("--"));

        let segments = path.iter().filter(|s| !s.is_empty()).count();
        let parts = if id.is_empty() { 0 } else { id.split('-').count() };
        prop_assert_eq!(parts, segments);
    }

    #[test]
    fn prop_index_identifier_ignores_case(path in path_strategy()) {
        let upper: Vec<String> = path.iter().map(|s| s.to_uppercase()).collect();
        prop_assert_eq!(index_identifier(&path), index_identifier(&upper));
    }

    #[test]
    fn prop_doc_type_lowercase(id in "[A-Za-z_]{1,20}") {
        prop_assert_eq!(doc_type_identifier(&id), id.to_lowercase());
    }
}

// =============================================================================
// Merge and Normalization Properties
// =============================================================================

proptest! {
    #[test]
    fn prop_merge_is_union_with_new_fields_winning(
        previous in prop::option::of(document_strategy()),
        fields in document_strategy(),
    ) {
        let (action, merged) = merge_fields(previous.as_ref(), fields.clone());

        prop_assert_eq!(action, if previous.is_some() { Action::Modify } else { Action::Add });
        for (name, value) in &fields {
            prop_assert_eq!(merged.get(name), Some(value));
        }
        if let Some(previous) = &previous {
            for (name, value) in previous {
                if !fields.contains_key(name) {
                    prop_assert_eq!(merged.get(name), Some(value));
                }
            }
        }
        let expected_len = previous
            .as_ref()
            .map_or(0, |p| p.keys().filter(|k| !fields.contains_key(*k)).count())
            + fields.len();
        prop_assert_eq!(merged.len(), expected_len);
    }

    #[test]
    fn prop_normalize_never_yields_none_literal(value in prop::option::of(arbitrary_json_strategy())) {
        let normalized = normalize_value(value.clone());
        prop_assert_ne!(normalized.clone(), json!("None"));
        if let Some(v) = value {
            if v != json!("None") {
                prop_assert_eq!(normalized, v);
            }
        }
    }
}

// =============================================================================
// Translation Fuzz Tests
// =============================================================================

proptest! {
    /// Any criteria on known indexes translate cleanly or fail with an error
    #[test]
    fn fuzz_translate_random_criteria(
        criteria in prop::collection::btree_map(
            prop_oneof![Just("a"), Just("b"), Just("c"), Just("d"), Just("path"), Just("unknown")],
            criterion_strategy(),
            0..5,
        ),
        start in 0usize..50,
        limit in prop::option::of(0usize..50),
    ) {
        let catalog = catalog();
        let mut query = CatalogQuery::new().start(start);
        if let Some(limit) = limit {
            query = query.limit(limit);
        }
        for (index, criterion) in criteria {
            query = query.with(index, criterion);
        }

        if let Ok(translated) = DslTranslator.translate(&catalog, &query) {
            prop_assert_eq!(translated.from, start);
            prop_assert_eq!(translated.size, limit);
            // the backend can always evaluate what the translator produced
            let doc: Document = Map::new();
            prop_assert!(matches(&translated.query, &doc).is_ok());
        }
    }
}

// =============================================================================
// Engine Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Whatever sequence of index/unindex calls runs, both stores end up
    /// holding the same set of objects under DUAL.
    #[test]
    fn prop_dual_stores_converge(ops in prop::collection::vec((0u8..6, any::<bool>()), 1..30)) {
        let catalog = Arc::new(catalog());
        let engine = SyncEngine::new(
            catalog.clone(),
            Arc::new(SharedSettings::new(SyncSettings::with_mode(Mode::Dual))),
            Arc::new(InMemoryConnector::default()),
        );
        let uow = engine.begin(Principal::anonymous());
        engine.provision_schema(&uow).unwrap();

        for (n, add) in ops {
            let uid = format!("obj-{}", n);
            if add {
                let obj = ContentObject::new(uid.clone(), &format!("/site/{}", uid)).with("a", n as i64);
                engine.index(&uow, &obj, &uid, &[], false).unwrap();
            } else {
                engine.unindex(&uow, &uid, None).unwrap();
            }
        }

        let mut remote = engine.search(&uow, &CatalogQuery::new(), false).unwrap().uids();
        let mut legacy = catalog.search_results(&CatalogQuery::new()).unwrap().uids();
        remote.sort();
        legacy.sort();
        prop_assert_eq!(remote, legacy);
        uow.commit().unwrap();
    }
}
