// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Per-transaction write buffer.
//!
//! An ordered log of remote-store mutations for one unit of work. Under the
//! immediate write policy every entry is already applied and the log is an
//! audit trail; under the deferred policy entries wait here for commit.

use serde::Serialize;

use crate::backend::{Document, DocumentLocation};
use crate::config::WritePolicy;

/// Kind of remote mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Add,
    Modify,
    Delete,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Modify => "modify",
            Self::Delete => "delete",
        }
    }
}

/// One remote mutation tied to a transaction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PendingOperation {
    pub action: Action,
    pub uid: String,
    pub location: DocumentLocation,
    /// Stored body before this operation, if there was one
    pub previous: Option<Document>,
    /// Body to write; `None` for deletes
    pub document: Option<Document>,
    /// Written at call time rather than queued for commit
    pub applied: bool,
    /// Refresh the index after writing
    pub refresh: bool,
}

/// Merge freshly extracted fields into the stored body.
///
/// Fields not in `fields` keep their stored values. Returns `Modify` when
/// there was a stored body, `Add` otherwise.
pub fn merge_fields(previous: Option<&Document>, fields: Document) -> (Action, Document) {
    match previous {
        Some(stored) => {
            let mut merged = stored.clone();
            merged.extend(fields);
            (Action::Modify, merged)
        }
        None => (Action::Add, fields),
    }
}

/// Attachment of the buffer to an engine's document location.
#[derive(Debug, Clone, PartialEq)]
pub struct Registration {
    pub location: DocumentLocation,
    pub policy: WritePolicy,
}

#[derive(Debug, Default)]
pub struct WriteBuffer {
    registration: Option<Registration>,
    operations: Vec<PendingOperation>,
}

impl WriteBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach to the transaction. Returns `false` if already attached.
    pub fn register(&mut self, location: DocumentLocation, policy: WritePolicy) -> bool {
        if self.registration.is_some() {
            return false;
        }
        self.registration = Some(Registration { location, policy });
        true
    }

    pub fn registration(&self) -> Option<&Registration> {
        self.registration.as_ref()
    }

    pub fn append(&mut self, operation: PendingOperation) {
        self.operations.push(operation);
    }

    /// Latest unapplied body for a document in this transaction.
    ///
    /// `Some(None)` means a delete is queued; `None` means nothing is queued.
    pub fn pending_body(&self, location: &DocumentLocation, uid: &str) -> Option<Option<&Document>> {
        self.operations
            .iter()
            .rev()
            .find(|op| !op.applied && op.uid == uid && &op.location == location)
            .map(|op| op.document.as_ref())
    }

    pub fn operations(&self) -> &[PendingOperation] {
        &self.operations
    }

    /// Operations not yet written to the backend.
    pub fn unapplied(&self) -> usize {
        self.operations.iter().filter(|op| !op.applied).count()
    }

    pub fn drain(&mut self) -> Vec<PendingOperation> {
        std::mem::take(&mut self.operations)
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}
