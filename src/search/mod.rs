// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Search Infrastructure
//!
//! One generic query model answered by both stores.
//!
//! # Architecture
//!
//! ```text
//! CatalogQuery (criteria + sort + paging)
//!     ↓
//!     ├─→ LegacyCatalog::search_results   → SearchResults (legacy brains)
//!     └─→ QueryTranslator → backend DSL   → SearchHit list
//!                                              ↓
//!                                   ResultMaterializer (lazy)
//!                                              ↓
//!                                         SearchResults
//! ```

mod query;
mod results;
mod translator;

pub use query::{CatalogQuery, Criterion, SortOrder, ALLOWED_ROLES_AND_USERS, EFFECTIVE_RANGE};
pub use results::{Brain, BrainFactory, ResultMaterializer, ResultSource, SearchResults};
pub use translator::{DslTranslator, QueryTranslator, TranslateError, TranslatedQuery};
