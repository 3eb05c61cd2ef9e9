// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! # Catalog Sync
//!
//! Keeps a legacy object catalog and a remote document-search index
//! consistent while content is indexed, unindexed and searched.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Host runtime (call sites)                  │
//! │  • index / unindex / search / rebuild / clear              │
//! │  • one UnitOfWork per request or transaction               │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  SyncEngine (coordinator)                   │
//! │  • Mode re-derived per call: Disable / Dual / SearchOnly   │
//! │  • Field extraction + merge into stored remote document    │
//! │  • Query translation, fallback, lazy result brains         │
//! └─────────────────────────────────────────────────────────────┘
//!                 │                              │
//!                 ▼                              ▼
//! ┌──────────────────────────────┐  ┌──────────────────────────────┐
//! │       LegacyCatalog          │  │   UnitOfWork                 │
//! │  • authoritative records     │  │  • lazy backend connection   │
//! │  • its own index/search      │  │  • write buffer (audit or    │
//! │  • rebuild / clear           │  │    queued until commit)      │
//! └──────────────────────────────┘  └──────────────────────────────┘
//!                                                │
//!                                                ▼
//!                                   ┌──────────────────────────────┐
//!                                   │   SearchBackend              │
//!                                   │  • index / mapping / docs    │
//!                                   │  • search / refresh          │
//!                                   └──────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use catalog_sync::{Mode, SharedSettings, SyncEngine, SyncSettings};
//! use catalog_sync::backend::InMemoryConnector;
//! use catalog_sync::catalog::{ContentObject, IndexDefinition, InMemoryCatalog, Principal};
//! use catalog_sync::search::CatalogQuery;
//!
//! let catalog = Arc::new(
//!     InMemoryCatalog::builder("portal_catalog", "/plone")
//!         .index(IndexDefinition::text("title"))
//!         .index(IndexDefinition::path("path"))
//!         .build(),
//! );
//! let settings = SharedSettings::new(SyncSettings::with_mode(Mode::SearchOnly));
//! let engine = SyncEngine::new(catalog, Arc::new(settings), Arc::new(InMemoryConnector::default()));
//!
//! let uow = engine.begin(Principal::anonymous());
//! engine.provision_schema(&uow).unwrap();
//!
//! let doc = ContentObject::new("doc-1", "/plone/doc-1").with("title", "Hello World");
//! engine.index(&uow, &doc, "doc-1", &[], true).unwrap();
//!
//! let results = engine.search(&uow, &CatalogQuery::new().text("title", "hello"), false).unwrap();
//! assert_eq!(results.total, 1);
//! assert_eq!(results.uids(), vec!["doc-1"]);
//!
//! uow.commit().unwrap();
//! ```
//!
//! ## Modules
//!
//! - [`coordinator`]: The [`SyncEngine`] dispatching every operation by mode
//! - [`mode`]: Mode derivation from the migration flag and settings
//! - [`config`]: [`SyncSettings`] and the settings source
//! - [`catalog`]: The [`LegacyCatalog`](catalog::LegacyCatalog) surface and an in-memory catalog
//! - [`backend`]: The remote [`SearchBackend`](backend::SearchBackend) contract and an in-memory backend
//! - [`search`]: Generic queries, translation and result materialization
//! - [`schema`]: Mapping provider and combined field mapping
//! - [`transaction`]: Write buffer and unit of work
//! - [`resilience`]: Retry with exponential backoff

pub mod backend;
pub mod catalog;
pub mod config;
pub mod coordinator;
pub mod metrics;
pub mod mode;
pub mod resilience;
pub mod schema;
pub mod search;
pub mod transaction;

pub use config::{DualRead, SettingsSource, SharedSettings, SyncSettings, WritePolicy};
pub use coordinator::{EngineStatus, SyncEngine, SyncError};
pub use mode::Mode;
pub use resilience::retry::RetryConfig;
pub use transaction::{CommitReport, UnitOfWork};
pub use metrics::LatencyTimer;
