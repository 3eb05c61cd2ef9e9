// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Basic catalog-sync usage example.
//!
//! Demonstrates a full migration against the in-memory stores:
//! 1. Indexing with the remote index disabled
//! 2. Provisioning the remote schema
//! 3. Dual writes and a rebuild that backfills the remote index
//! 4. Switching to search-only and querying with permissions
//! 5. Deferred writes committed with the unit of work
//!
//! # Run
//!
//! ```bash
//! RUST_LOG=catalog_sync=debug cargo run --example basic_usage
//! ```

use std::sync::Arc;

use catalog_sync::backend::InMemoryConnector;
use catalog_sync::catalog::{ContentObject, IndexDefinition, InMemoryCatalog, LegacyCatalog, Principal};
use catalog_sync::search::{CatalogQuery, SortOrder};
use catalog_sync::{Mode, SharedSettings, SyncEngine, SyncError, SyncSettings, WritePolicy};
use serde_json::json;
use tracing_subscriber::EnvFilter;

fn page(uid: &str, title: &str, roles: &[&str]) -> ContentObject {
    ContentObject::new(uid, &format!("/site/{}", uid))
        .with("Title", title)
        .with("SearchableText", format!("{} body text", title))
        .with("portal_type", "Document")
        .with("allowedRolesAndUsers", json!(roles))
}

fn main() -> Result<(), SyncError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("catalog_sync=info")))
        .init();

    let catalog = Arc::new(
        InMemoryCatalog::builder("portal_catalog", "/site/portal_catalog")
            .index(IndexDefinition::uuid("UID"))
            .index(IndexDefinition::text("Title"))
            .index(IndexDefinition::text("SearchableText"))
            .index(IndexDefinition::field("portal_type"))
            .index(IndexDefinition::field("sortable_title").from_attribute("Title"))
            .index(IndexDefinition::keyword("allowedRolesAndUsers"))
            .index(IndexDefinition::date_range("effectiveRange", "effective", "expires"))
            .index(IndexDefinition::path("path"))
            .metadata("Title")
            .build(),
    );
    let settings = SharedSettings::new(SyncSettings::with_mode(Mode::Dual));
    let connector = Arc::new(InMemoryConnector::default());
    let engine = SyncEngine::new(catalog.clone(), Arc::new(settings.clone()), connector.clone());

    // 1. Not migrated yet: everything stays in the legacy catalog
    let uow = engine.begin(Principal::anonymous());
    for (uid, title, roles) in [
        ("welcome", "Welcome", &["Anonymous"][..]),
        ("roadmap", "Roadmap", &["Manager"][..]),
        ("release-notes", "Release notes", &["Anonymous"][..]),
    ] {
        let object = Arc::new(page(uid, title, roles));
        catalog.publish(object.clone())?;
        engine.index(&uow, object.as_ref(), uid, &[], true)?;
    }
    println!("before migration: {}", engine.status(&uow));
    uow.commit()?;

    // 2 + 3. Provision, then backfill through a rebuild under DUAL
    let uow = engine.begin(Principal::anonymous());
    engine.provision_schema(&uow)?;
    engine.rebuild(&uow)?;
    println!("after rebuild:    {}", engine.status(&uow));
    uow.commit()?;

    // 4. Remote index is authoritative from here on
    settings.update(|s| s.mode = Mode::SearchOnly);

    let query = CatalogQuery::new()
        .eq("portal_type", "Document")
        .sort_on("sortable_title", SortOrder::Ascending);

    let anonymous = engine.begin(Principal::anonymous());
    println!("\nanonymous sees:");
    for brain in engine.search(&anonymous, &query, true)? {
        println!("  {} {} {:?}", brain.uid, brain.path, brain.get("Title"));
    }
    anonymous.commit()?;

    let manager = engine.begin(Principal::user("admin", &["Manager"]));
    let results = engine.search(&manager, &query, true)?;
    println!("\nmanager sees {} of {} documents", results.total, catalog_len(&engine));
    manager.commit()?;

    // 5. Deferred writes land on commit
    settings.update(|s| s.write_policy = WritePolicy::Deferred);
    let uow = engine.begin(Principal::anonymous());
    engine.index(&uow, &page("faq", "FAQ", &["Anonymous"]), "faq", &[], true)?;
    engine.unindex(&uow, "release-notes", None)?;
    println!("\nqueued operations:");
    for op in uow.pending() {
        println!("  {} {}", op.action.as_str(), op.uid);
    }
    let report = uow.commit()?;
    println!("committed: flushed={} audited={}", report.flushed, report.audited);

    let uow = engine.begin(Principal::anonymous());
    let hits = engine.search(&uow, &CatalogQuery::new().text("SearchableText", "body"), true)?;
    println!("\nfull-text 'body': {:?}", hits.uids());
    println!("final:            {}", engine.status(&uow));
    uow.commit()?;

    Ok(())
}

fn catalog_len(engine: &SyncEngine) -> usize {
    engine.catalog().len()
}
