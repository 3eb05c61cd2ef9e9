// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Transaction-scoped state: the write buffer and the unit of work that owns it.

mod buffer;
mod unit_of_work;

pub use buffer::{merge_fields, Action, PendingOperation, Registration, WriteBuffer};
pub use unit_of_work::{CommitReport, UnitOfWork};
