// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! The legacy catalog.
//!
//! The engine reaches the catalog only through [`LegacyCatalog`]. The host
//! supplies its own implementation; [`InMemoryCatalog`] is a complete
//! in-process one.

mod index;
mod memory;
mod object;
mod traits;

pub use index::{path_depth, path_depth_field, IndexDefinition, IndexKind, IndexRegistry};
pub use memory::{InMemoryCatalog, InMemoryCatalogBuilder};
pub use object::{ContentObject, Indexable};
pub use traits::{CatalogError, CatalogRecord, LegacyCatalog, Principal, RecordId, ReindexFn};
