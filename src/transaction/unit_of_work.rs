// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Unit of work: the per-request context the engine runs in.
//!
//! Holds the caller's principal, the lazily opened backend connection and
//! the transaction's write buffer. A unit of work ends exactly once, by
//! `commit`, `abort` or drop.
//!
//! ```text
//! begin ──► index / unindex / search ... ──┬──► commit  (flush queued writes)
//!                                          ├──► abort   (discard queued writes)
//!                                          └──► drop    (discard, with a warning)
//! ```

use std::collections::BTreeSet;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::buffer::{Action, PendingOperation, WriteBuffer};
use crate::backend::{remote_call, BackendError, SearchBackend};
use crate::catalog::Principal;
use crate::coordinator::SyncError;
use crate::metrics;

#[derive(Clone)]
struct Connection {
    backend: Arc<dyn SearchBackend>,
    retry_on_timeout: bool,
}

/// Outcome of a successful commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CommitReport {
    /// Queued operations written at commit
    pub flushed: usize,
    /// Operations already applied at call time
    pub audited: usize,
}

pub struct UnitOfWork {
    id: Uuid,
    principal: Principal,
    connection: Mutex<Option<Connection>>,
    buffer: Mutex<WriteBuffer>,
    finished: bool,
}

impl UnitOfWork {
    pub fn new(principal: Principal) -> Self {
        Self {
            id: Uuid::new_v4(),
            principal,
            connection: Mutex::new(None),
            buffer: Mutex::new(WriteBuffer::new()),
            finished: false,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    /// Whether a backend connection has been opened.
    pub fn is_connected(&self) -> bool {
        self.connection.lock().is_some()
    }

    /// The unit's connection, opened by `open` on first use.
    pub(crate) fn connection(
        &self,
        retry_on_timeout: bool,
        open: impl FnOnce() -> Result<Arc<dyn SearchBackend>, BackendError>,
    ) -> Result<(Arc<dyn SearchBackend>, bool), BackendError> {
        let mut slot = self.connection.lock();
        if let Some(conn) = slot.as_ref() {
            return Ok((Arc::clone(&conn.backend), conn.retry_on_timeout));
        }
        let backend = open()?;
        debug!(unit = %self.id, "Opened backend connection");
        *slot = Some(Connection {
            backend: Arc::clone(&backend),
            retry_on_timeout,
        });
        Ok((backend, retry_on_timeout))
    }

    pub(crate) fn with_buffer<R>(&self, f: impl FnOnce(&mut WriteBuffer) -> R) -> R {
        f(&mut self.buffer.lock())
    }

    /// Snapshot of the operations recorded so far, in order.
    pub fn pending(&self) -> Vec<PendingOperation> {
        self.buffer.lock().operations().to_vec()
    }

    /// End the unit of work, writing every queued operation in order.
    ///
    /// Deletes of documents that are already gone count as written. Indexes
    /// touched by operations that asked for a refresh are refreshed once,
    /// after all writes.
    pub fn commit(mut self) -> Result<CommitReport, SyncError> {
        self.finished = true;
        let operations = self.buffer.lock().drain();
        let audited = operations.iter().filter(|op| op.applied).count();
        metrics::set_pending_operations(operations.len());
        let mut queued: Vec<PendingOperation> = operations.into_iter().filter(|op| !op.applied).collect();
        let total = queued.len();

        if total == 0 {
            metrics::record_transaction("committed");
            debug!(unit = %self.id, audited, "Committed unit of work");
            return Ok(CommitReport { flushed: 0, audited });
        }

        let Some(conn) = self.connection.lock().clone() else {
            metrics::record_transaction("failed");
            return Err(SyncError::Commit {
                flushed: 0,
                total,
                source: BackendError::Unavailable("no connection for queued writes".into()),
                remaining: queued,
            });
        };

        let mut flushed = 0;
        let mut refresh = BTreeSet::new();
        let mut failure = None;
        for (position, op) in queued.iter().enumerate() {
            let result = match (op.action, &op.document) {
                (Action::Delete, _) | (_, None) => {
                    match remote_call("delete", conn.retry_on_timeout, || {
                        conn.backend.delete_document(&op.location, &op.uid)
                    }) {
                        Err(e) if e.is_not_found() => Ok(()),
                        other => other,
                    }
                }
                (_, Some(body)) => remote_call("index", conn.retry_on_timeout, || {
                    conn.backend.index_document(&op.location, &op.uid, body)
                }),
            };
            if let Err(source) = result {
                error!(unit = %self.id, uid = %op.uid, action = op.action.as_str(), flushed, total, error = %source, "Commit failed");
                failure = Some((position, source));
                break;
            }
            flushed += 1;
            if op.refresh {
                refresh.insert(op.location.index.clone());
            }
        }

        if let Some((position, source)) = failure {
            metrics::record_transaction("failed");
            let remaining = queued.split_off(position);
            return Err(SyncError::Commit { flushed, total, source, remaining });
        }

        for index in refresh {
            if let Err(source) = remote_call("refresh", conn.retry_on_timeout, || conn.backend.refresh(&index)) {
                metrics::record_transaction("failed");
                return Err(SyncError::Commit {
                    flushed,
                    total,
                    source,
                    remaining: Vec::new(),
                });
            }
        }

        metrics::record_transaction("committed");
        info!(unit = %self.id, flushed, audited, "Committed unit of work");
        Ok(CommitReport { flushed, audited })
    }

    /// End the unit of work, discarding queued operations.
    ///
    /// Returns everything recorded. Operations already applied stay in the
    /// remote store.
    pub fn abort(mut self) -> Vec<PendingOperation> {
        self.finished = true;
        let operations = self.buffer.lock().drain();
        let discarded = operations.iter().filter(|op| !op.applied).count();
        let applied = operations.len() - discarded;
        metrics::set_pending_operations(operations.len());
        metrics::record_transaction("aborted");
        if applied > 0 {
            warn!(unit = %self.id, applied, "Aborted unit of work leaves remote writes applied");
        }
        debug!(unit = %self.id, discarded, "Aborted unit of work");
        operations
    }
}

impl Drop for UnitOfWork {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let discarded = self.buffer.lock().unapplied();
        if discarded > 0 {
            warn!(unit = %self.id, discarded, "Unit of work dropped without commit, discarding queued writes");
        }
        metrics::record_transaction("dropped");
    }
}

impl std::fmt::Debug for UnitOfWork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnitOfWork")
            .field("id", &self.id)
            .field("principal", &self.principal)
            .field("connected", &self.is_connected())
            .field("operations", &self.buffer.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{DocumentLocation, InMemoryBackend};
    use crate::config::WritePolicy;
    use serde_json::json;

    fn location() -> DocumentLocation {
        DocumentLocation {
            index: "plone".into(),
            doc_type: "portal_catalog".into(),
        }
    }

    fn queued(action: Action, uid: &str, body: Option<serde_json::Value>) -> PendingOperation {
        PendingOperation {
            action,
            uid: uid.into(),
            location: location(),
            previous: None,
            document: body.and_then(|b| b.as_object().cloned()),
            applied: false,
            refresh: true,
        }
    }

    #[test]
    fn test_connection_opened_once() {
        let uow = UnitOfWork::new(Principal::anonymous());
        let backend: Arc<dyn SearchBackend> = Arc::new(InMemoryBackend::new());
        let mut opens = 0;

        for _ in 0..3 {
            uow.connection(false, || {
                opens += 1;
                Ok(Arc::clone(&backend))
            })
            .unwrap();
        }
        assert_eq!(opens, 1);
        assert!(uow.is_connected());
    }

    #[test]
    fn test_commit_flushes_in_order() {
        let backend = Arc::new(InMemoryBackend::new());
        let uow = UnitOfWork::new(Principal::anonymous());
        let shared: Arc<dyn SearchBackend> = backend.clone();
        uow.connection(false, || Ok(shared)).unwrap();
        uow.with_buffer(|buffer| {
            buffer.register(location(), WritePolicy::Deferred);
            buffer.append(queued(Action::Add, "a", Some(json!({"title": "A"}))));
            buffer.append(queued(Action::Add, "b", Some(json!({"title": "B"}))));
            buffer.append(queued(Action::Delete, "b", None));
            buffer.append(queued(Action::Delete, "never-written", None));
        });

        let report = uow.commit().unwrap();
        assert_eq!(report, CommitReport { flushed: 4, audited: 0 });
        assert!(backend.get_document(&location(), "a").unwrap().is_some());
        assert!(backend.get_document(&location(), "b").unwrap().is_none());
    }

    #[test]
    fn test_commit_without_connection_fails() {
        let uow = UnitOfWork::new(Principal::anonymous());
        uow.with_buffer(|buffer| buffer.append(queued(Action::Add, "a", Some(json!({})))));
        let err = uow.commit().unwrap_err();
        match err {
            SyncError::Commit { flushed, total, remaining, .. } => {
                assert_eq!((flushed, total), (0, 1));
                assert_eq!(remaining.len(), 1);
                assert_eq!(remaining[0].uid, "a");
            }
            other => panic!("expected commit failure, got {:?}", other),
        }
    }

    #[test]
    fn test_abort_returns_operations() {
        let uow = UnitOfWork::new(Principal::anonymous());
        uow.with_buffer(|buffer| buffer.append(queued(Action::Add, "a", Some(json!({})))));
        assert_eq!(uow.pending().len(), 1);
        let discarded = uow.abort();
        assert_eq!(discarded.len(), 1);
        assert_eq!(discarded[0].uid, "a");
    }

    #[test]
    fn test_empty_commit() {
        let uow = UnitOfWork::new(Principal::user("alice", &["Member"]));
        assert_eq!(uow.principal().roles, vec!["Member"]);
        assert_eq!(uow.commit().unwrap(), CommitReport::default());
    }
}
